/// WebSocket subscription: the initial room snapshot followed by every
/// committed state, as JSON text frames. The client never sends anything
/// but close frames; writes go through the REST surface.

use axum::{
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use duo_store::StoreError;
use duo_types::codes;
use duo_types::events::RoomSnapshot;

use crate::routes::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeParams {
    who: String,
}

pub async fn subscribe(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<SubscribeParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let code = codes::normalize(&code);
    match store.subscribe(&code, &params.who) {
        Ok((initial, rx)) => {
            ws.on_upgrade(move |socket| stream_snapshots(socket, initial, rx))
        }
        Err(StoreError::PermissionDenied) => StatusCode::FORBIDDEN.into_response(),
        Err(err) => {
            warn!(code = %code, "subscribe failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn stream_snapshots(
    mut socket: WebSocket,
    initial: RoomSnapshot,
    mut rx: broadcast::Receiver<RoomSnapshot>,
) {
    let code = initial.code.clone();
    if send_snapshot(&mut socket, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            committed = rx.recv() => match committed {
                Ok(snapshot) => {
                    if send_snapshot(&mut socket, &snapshot).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Only the latest state is promised; keep going.
                    warn!(code = %code, "subscriber lagged by {n} snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // Clients only ever close; drop anything else.
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!(code = %code, "subscriber disconnected");
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: &RoomSnapshot) -> Result<(), axum::Error> {
    let text = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(text.into())).await
}
