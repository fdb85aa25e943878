//! Websocket client of the relay broker.
//!
//! DESIGN
//! ======
//! `connect` splits the socket and spawns two tasks. The writer drains an
//! unbounded queue of [`RelayCommand`]s, so every `Transport` call is a
//! non-blocking enqueue. The reader parses broker frames into
//! [`Delivery`] values and forwards them to the receiver returned by
//! `connect`. Dropping the transport closes the queue, which ends the
//! writer and sends a websocket close; the reader is aborted.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::{Delivery, Transport, TransportError};
use crate::message::Message;
use crate::relay::RelayCommand;

pub struct WsTransport {
    outbound: mpsc::UnboundedSender<RelayCommand>,
    reader: AbortHandle,
}

impl WsTransport {
    /// Connect to the broker at `url` (for example `ws://127.0.0.1:3000/ws`).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] if the websocket handshake fails.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<Delivery>), TransportError> {
        let (stream, _) = connect_async(url).await.map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut sink, mut source) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RelayCommand>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Delivery>();
        info!(%url, "ws transport: connected");

        tokio::spawn(async move {
            while let Some(command) = out_rx.recv().await {
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "ws transport: command encode failed");
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
                    warn!(error = %e, "ws transport: send failed");
                    return;
                }
            }
            if let Err(e) = sink.close().await {
                debug!(error = %e, "ws transport: close failed");
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<Delivery>(text.as_str()) {
                        Ok(delivery) => {
                            if in_tx.send(delivery).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "ws transport: invalid delivery"),
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "ws transport: receive failed");
                        break;
                    }
                }
            }
            info!("ws transport: disconnected");
        });

        Ok((Self { outbound: out_tx, reader: reader.abort_handle() }, in_rx))
    }

    fn send(&self, command: RelayCommand) -> Result<(), TransportError> {
        self.outbound.send(command).map_err(|_| TransportError::Disconnected)
    }
}

impl Transport for WsTransport {
    fn publish(&self, channel: &str, message: &Message) -> Result<(), TransportError> {
        let payload = message.encode()?;
        self.send(RelayCommand::Publish { channel: channel.to_string(), payload })
    }

    fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.send(RelayCommand::Subscribe { channel: channel.to_string() })
    }

    fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.send(RelayCommand::Unsubscribe { channel: channel.to_string() })
    }

    fn close(&self, channel: &str) -> Result<(), TransportError> {
        self.send(RelayCommand::Close { channel: channel.to_string() })
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
