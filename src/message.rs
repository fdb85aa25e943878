//! Wire messages exchanged between tiles.
//!
//! DESIGN
//! ======
//! Every message is a JSON object with a `type` tag and camelCase fields.
//! Decoding happens once, where text leaves the transport; everything past
//! that point matches exhaustively on [`Message`].
//!
//! An unrecognised `type` is reported as [`MessageError::UnknownType`] rather
//! than a parse failure so the router can drop it quietly. Newer tiles may
//! speak kinds older ones do not know.

use serde::{Deserialize, Serialize};

use crate::config::DeviceId;
use crate::geometry::GestureSample;

/// Every message kind this crate understands.
pub const KNOWN_KINDS: [&str; 7] = ["pinch", "close", "start", "pause", "reset", "cells", "ready"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// A swipe toward a screen edge, offered for pairing.
    Pinch(GestureSample),
    /// The sender is tearing down its link with every recipient.
    #[serde(rename_all = "camelCase")]
    Close { sender_id: DeviceId },
    #[serde(rename_all = "camelCase")]
    Start { sender_id: DeviceId },
    #[serde(rename_all = "camelCase")]
    Pause { sender_id: DeviceId },
    /// `nonce` identifies one user reset as it spreads across the network.
    #[serde(rename_all = "camelCase")]
    Reset {
        sender_id: DeviceId,
        #[serde(default)]
        nonce: u64,
    },
    /// Border cells for one round, in the sender's range order.
    #[serde(rename_all = "camelCase")]
    Cells { sender_id: DeviceId, cells_list: Vec<bool> },
    /// The sender has consumed this round's cells and stepped.
    #[serde(rename_all = "camelCase")]
    Ready { sender_id: DeviceId },
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("message has no string `type` field")]
    MissingType,
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("pinch field `{0}` is not a finite number")]
    NonFinite(&'static str),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Message {
    /// Decode one message from JSON text.
    ///
    /// # Errors
    ///
    /// [`MessageError::Malformed`] for invalid JSON or missing fields,
    /// [`MessageError::MissingType`] when there is no `type` tag, and
    /// [`MessageError::UnknownType`] for a tag this crate does not know.
    pub fn decode(text: &str) -> Result<Self, MessageError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let kind = value.get("type").and_then(serde_json::Value::as_str).ok_or(MessageError::MissingType)?;
        if !KNOWN_KINDS.contains(&kind) {
            return Err(MessageError::UnknownType(kind.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Encode as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::NonFinite`] for a pinch carrying NaN or an
    /// infinity, which JSON would silently write as `null`, and
    /// [`MessageError::Malformed`] if serialization fails.
    pub fn encode(&self) -> Result<String, MessageError> {
        if let Self::Pinch(sample) = self {
            if let Some(field) = sample.non_finite_field() {
                return Err(MessageError::NonFinite(field));
            }
        }
        Ok(serde_json::to_string(self)?)
    }

    /// Wire tag of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pinch(_) => "pinch",
            Self::Close { .. } => "close",
            Self::Start { .. } => "start",
            Self::Pause { .. } => "pause",
            Self::Reset { .. } => "reset",
            Self::Cells { .. } => "cells",
            Self::Ready { .. } => "ready",
        }
    }

    #[must_use]
    pub fn sender(&self) -> &DeviceId {
        match self {
            Self::Pinch(sample) => &sample.originator,
            Self::Close { sender_id }
            | Self::Start { sender_id }
            | Self::Pause { sender_id }
            | Self::Reset { sender_id, .. }
            | Self::Cells { sender_id, .. }
            | Self::Ready { sender_id } => sender_id,
        }
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
