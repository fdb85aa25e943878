//! Relay broker: a websocket front end over a [`Hub`].
//!
//! DESIGN
//! ======
//! Tiles that are not in the same process reach each other through this
//! broker. Each websocket connection registers one hub subscriber and then
//! enters a `select!` loop:
//! - Incoming client text → parse a [`RelayCommand`] → apply to the hub
//! - Deliveries queued for this subscriber → serialize → send to client
//!
//! The broker never looks inside payloads. All sends to one client go
//! through its single loop, so per-channel order is preserved end to end.
//!
//! WIRE
//! ====
//! Client → broker: `{"op":"subscribe","channel":..}`,
//! `{"op":"unsubscribe","channel":..}`, `{"op":"close","channel":..}`,
//! `{"op":"publish","channel":..,"payload":..}`.
//! Broker → client: `{"channel":..,"payload":..}`.

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::transport::Delivery;
use crate::transport::hub::Hub;

/// One client request to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RelayCommand {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Publish { channel: String, payload: String },
    Close { channel: String },
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn app(hub: Hub) -> Router {
    Router::new()
        .route("/ws", get(handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn handle_ws(State(hub): State<Hub>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, hub))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, hub: Hub) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
    let conn_id = hub.register(tx);
    info!(%conn_id, "relay: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => apply_command(&hub, conn_id, text.as_str()),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(delivery) = rx.recv() => {
                let text = match serde_json::to_string(&delivery) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%conn_id, error = %e, "relay: delivery encode failed");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.remove_subscriber(conn_id);
    info!(%conn_id, "relay: client disconnected");
}

/// Parse one client command and apply it to the hub. Bad input is logged
/// and dropped; the connection stays up.
fn apply_command(hub: &Hub, conn_id: Uuid, text: &str) {
    let command: RelayCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            warn!(%conn_id, error = %e, "relay: invalid command");
            return;
        }
    };

    match command {
        RelayCommand::Subscribe { channel } => {
            debug!(%conn_id, %channel, "relay: subscribe");
            hub.subscribe(conn_id, &channel);
        }
        RelayCommand::Unsubscribe { channel } => {
            debug!(%conn_id, %channel, "relay: unsubscribe");
            hub.unsubscribe(conn_id, &channel);
        }
        RelayCommand::Close { channel } => {
            debug!(%conn_id, %channel, "relay: close");
            hub.close_channel(&channel);
        }
        RelayCommand::Publish { channel, payload } => {
            let delivered = hub.publish(&channel, &payload);
            debug!(%conn_id, %channel, delivered, "relay: publish");
        }
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
