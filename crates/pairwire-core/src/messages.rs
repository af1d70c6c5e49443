//! JSON message types for the pairwire signaling channel.
//!
//! Every frame is a JSON object discriminated by a string `type` field.
//! Signaling frames (`offer`, `answer`, `ice`) are opaque: the server keeps
//! the whole inbound object and forwards it to the partner untouched.

use crate::error::{PairwireError, PairwireResult};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Nickname used when a client does not supply one.
pub const DEFAULT_NICKNAME: &str = "Anonymous";

/// Informational text carried by `waiting` messages.
pub const WAITING_TEXT: &str = "Searching for a partner...";

/// Server-assigned identity of one connection.
///
/// Serialized as a decimal string so clients can treat it as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl Serialize for ParticipantId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Kinds of signaling payload relayed between paired participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    Ice,
}

impl SignalKind {
    /// Wire name of this kind (the value of the `type` field).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Ice => "ice",
        }
    }

    fn from_type(t: &str) -> Option<Self> {
        match t {
            "offer" => Some(Self::Offer),
            "answer" => Some(Self::Answer),
            "ice" => Some(Self::Ice),
            _ => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded client -> server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Enter matchmaking.
    FindPartner { nickname: Option<String> },
    /// Abandon the current partner and enter matchmaking again.
    Next { nickname: Option<String> },
    /// Opaque signaling frame; `body` is the complete inbound object.
    Signal { kind: SignalKind, body: Value },
}

impl ClientMessage {
    /// Decode a text frame.
    ///
    /// Empty or non-string nicknames decode as `None`.
    pub fn parse(text: &str) -> PairwireResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON value.
    pub fn from_value(value: Value) -> PairwireResult<Self> {
        let msg_type = value
            .as_object()
            .ok_or_else(|| PairwireError::Protocol("frame is not a JSON object".into()))?
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| PairwireError::Protocol("missing message type".into()))?;

        match msg_type {
            "find_partner" => Ok(Self::FindPartner {
                nickname: nickname_field(&value),
            }),
            "next" => Ok(Self::Next {
                nickname: nickname_field(&value),
            }),
            other => match SignalKind::from_type(other) {
                Some(kind) => Ok(Self::Signal { kind, body: value }),
                None => Err(PairwireError::Protocol(format!(
                    "unknown message type: {other}"
                ))),
            },
        }
    }
}

fn nickname_field(value: &Value) -> Option<String> {
    value
        .get("nickname")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// A server -> client frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Waiting {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Matched {
        partner_id: ParticipantId,
        partner_nickname: String,
        initiator: bool,
    },
    PartnerDisconnected,
    /// Relayed signaling frame, serialized exactly as received.
    #[serde(untagged)]
    Signal(Value),
}

impl ServerMessage {
    pub fn waiting() -> Self {
        Self::Waiting {
            message: WAITING_TEXT.to_string(),
        }
    }

    pub fn matched(partner_id: ParticipantId, partner_nickname: &str, initiator: bool) -> Self {
        Self::Matched {
            partner_id,
            partner_nickname: partner_nickname.to_string(),
            initiator,
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> PairwireResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
