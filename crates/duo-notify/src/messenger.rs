/// The messaging-provider seam. Jobs are generic over [`Messenger`] so tests
/// run against a recording fake and production runs against FCM.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::{NotifyError, NotifyResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Opaque key/value payload delivered alongside the notification.
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The endpoint is permanently gone and must be pruned.
    InvalidToken,
    /// Transient provider-side failure; keep the token.
    Failed,
}

pub trait Messenger: Send + Sync {
    /// Send one notification to up to [`crate::MAX_TOKENS_PER_SEND`]
    /// endpoints; returns one outcome per token, in order.
    fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> impl Future<Output = NotifyResult<Vec<SendOutcome>>> + Send;
}

const FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Error codes FCM uses for endpoints that will never work again.
const PERMANENT_ERRORS: &[&str] = &["NotRegistered", "InvalidRegistration", "MismatchSenderId"];

pub struct FcmMessenger {
    client: reqwest::Client,
    server_key: String,
    endpoint: String,
}

impl FcmMessenger {
    pub fn new(server_key: String) -> Self {
        FcmMessenger {
            client: reqwest::Client::new(),
            server_key,
            endpoint: FCM_ENDPOINT.to_string(),
        }
    }

    /// Point at a different endpoint (local stub server).
    pub fn with_endpoint(server_key: String, endpoint: String) -> Self {
        FcmMessenger { client: reqwest::Client::new(), server_key, endpoint }
    }
}

#[derive(Deserialize)]
struct FcmResponse {
    results: Vec<FcmResult>,
}

#[derive(Deserialize)]
struct FcmResult {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Messenger for FcmMessenger {
    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> NotifyResult<Vec<SendOutcome>> {
        let payload = json!({
            "registration_ids": tokens,
            "notification": {
                "title": notification.title,
                "body": notification.body,
            },
            "data": notification.data,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Provider(format!(
                "multicast rejected with status {}",
                response.status()
            )));
        }

        let parsed: FcmResponse = response.json().await?;
        if parsed.results.len() != tokens.len() {
            warn!(
                expected = tokens.len(),
                got = parsed.results.len(),
                "provider returned a short result list"
            );
        }

        let outcomes = parsed
            .results
            .into_iter()
            .map(|result| match (result.message_id, result.error) {
                (Some(_), _) => SendOutcome::Delivered,
                (None, Some(code)) if PERMANENT_ERRORS.contains(&code.as_str()) => {
                    SendOutcome::InvalidToken
                }
                _ => SendOutcome::Failed,
            })
            .collect();
        Ok(outcomes)
    }
}
