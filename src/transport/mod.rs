//! Publish/subscribe collaborator the protocol runs over.
//!
//! DESIGN
//! ======
//! The core needs named channels with ordered, reliable delivery per
//! channel, plus the ability to create and tear channels down at runtime.
//! `Transport` is that surface. Every operation is synchronous and
//! non-blocking (sends go onto unbounded queues), so callers may invoke it
//! while holding a short `std::sync::Mutex` and the generation worker never
//! stalls on the network.
//!
//! Inbound traffic is handed over as raw [`Delivery`] text on an unbounded
//! tokio channel created alongside the transport; decoding belongs to the
//! router.
//!
//! Two implementations share one fan-out registry ([`hub::Hub`]):
//! [`memory::MemoryBus`] for in-process tiles and [`ws::WsTransport`] for
//! tiles talking to the relay broker.

pub mod hub;
pub mod memory;
pub mod ws;

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageError};

/// One message as it arrived on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub channel: String,
    pub payload: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is disconnected")]
    Disconnected,
    #[error("encode failed: {0}")]
    Encode(#[from] MessageError),
    #[error("connect failed: {0}")]
    Connect(String),
}

pub trait Transport: Send + Sync {
    /// Send `message` to every current subscriber of `channel`, including
    /// the sender if it is subscribed.
    ///
    /// # Errors
    ///
    /// Fails when the message cannot be encoded or the transport is gone.
    fn publish(&self, channel: &str, message: &Message) -> Result<(), TransportError>;

    /// Start receiving deliveries for `channel`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Fails when the transport is gone.
    fn subscribe(&self, channel: &str) -> Result<(), TransportError>;

    /// Stop receiving deliveries for `channel`.
    ///
    /// # Errors
    ///
    /// Fails when the transport is gone.
    fn unsubscribe(&self, channel: &str) -> Result<(), TransportError>;

    /// Tear `channel` down for every subscriber.
    ///
    /// # Errors
    ///
    /// Fails when the transport is gone.
    fn close(&self, channel: &str) -> Result<(), TransportError>;
}
