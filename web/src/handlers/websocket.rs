//! Websocket observer connections.
//!
//! Each connection registers one observer with the [`EventHub`](fleetops_runtime::EventHub),
//! scoped to the caller's tenant, and forwards every broadcast as a text frame:
//!
//! ```json
//! { "type": "cargo_assigned", "data": { ... } }
//! ```
//!
//! The connection is receive-only from the client's point of view; inbound
//! frames are read only to notice a close. If the hub evicts the observer
//! (its queue filled up), the connection is closed.
//!
//! ```text
//! Client          Handler                EventHub
//!   │                │                       │
//!   ├─ Upgrade ─────>│                       │
//!   │                ├─ subscribe(tenant) ──>│
//!   │                │<── broadcast ─────────┤
//!   │<─ Text frame ──┤                       │
//!   ├─ Close ───────>│                       │
//!   │                ├─ drop subscription ──>│  (unregister)
//! ```

use crate::{extractors::Actor, state::AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use fleetops_core::TenantId;
use fleetops_runtime::Subscription;
use futures::{stream::StreamExt, SinkExt};
use tracing::{debug, error, info};

/// Upgrade to a websocket observing the caller's tenant.
///
/// ```text
/// GET /ws
/// ```
#[allow(clippy::unused_async)]
pub async fn handle(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Response {
    let tenant_id = actor.tenant_id;
    info!(tenant_id = %tenant_id, user_id = %actor.user_id, "WebSocket connection requested");

    // Register before the upgrade completes so no broadcast after the
    // handshake is missed.
    let subscription = state.hub.subscribe(tenant_id);
    ws.on_upgrade(move |socket| handle_socket(socket, subscription, tenant_id))
}

/// Pump hub messages to the socket until either side goes away.
async fn handle_socket(socket: WebSocket, mut subscription: Subscription, tenant_id: TenantId) {
    let observer_id = subscription.id();
    info!(tenant_id = %tenant_id, observer_id = %observer_id, "WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            let text = match message.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, kind = %message.kind, "Failed to serialize broadcast");
                    continue;
                }
            };

            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }

        // The hub dropped us (evicted) or the client went away; either way
        // the subscription is dropped here and the observer unregistered.
        let _ = sender.send(Message::Close(None)).await;
        debug!("WebSocket send task terminated");
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
        debug!("WebSocket receive task terminated");
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            send_task.abort();
        },
    }

    info!(tenant_id = %tenant_id, observer_id = %observer_id, "WebSocket connection closed");
}
