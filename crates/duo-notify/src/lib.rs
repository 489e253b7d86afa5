//! Notification dispatcher: watches the store's change feed for playlist
//! additions and runs the two daily scheduled sweeps (daily unlock, J-14),
//! pushing to each room's registered endpoints through a [`Messenger`].

pub mod messenger;
pub mod playlist;
pub mod schedule;

pub use messenger::{FcmMessenger, Messenger, Notification, SendOutcome};

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use duo_store::{RoomStore, StoreError};

/// Provider limit on recipients per multicast call.
pub const MAX_TOKENS_PER_SEND: usize = 500;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("messaging transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("messaging provider error: {0}")]
    Provider(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Push a notification to every endpoint registered for the room, chunked
/// to the provider maximum. Endpoints the provider reports as permanently
/// invalid are deleted from the room's sub-collection. Returns how many
/// endpoints were delivered to.
pub async fn send_to_room<M: Messenger>(
    store: &RoomStore,
    messenger: &M,
    code: &str,
    notification: &Notification,
) -> NotifyResult<usize> {
    let tokens = store.push_tokens(code)?;
    if tokens.is_empty() {
        return Ok(0);
    }

    let mut delivered = 0;
    let mut invalid = Vec::new();
    for chunk in tokens.chunks(MAX_TOKENS_PER_SEND) {
        let outcomes = messenger.send_multicast(chunk, notification).await?;
        for (token, outcome) in chunk.iter().zip(outcomes) {
            match outcome {
                SendOutcome::Delivered => delivered += 1,
                SendOutcome::InvalidToken => invalid.push(token.clone()),
                // Transient failures are left alone; the next send retries.
                SendOutcome::Failed => {}
            }
        }
    }

    if !invalid.is_empty() {
        debug!(code = %code, count = invalid.len(), "pruning invalid push tokens");
        store.remove_push_tokens(code, &invalid)?;
    }
    Ok(delivered)
}

pub(crate) fn data_payload(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
