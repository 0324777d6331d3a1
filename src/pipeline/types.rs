//! Shared types for the classification and dispatch pipeline.

use serde_json::{Map, Value};

use crate::error::DecodeError;

// ── Inbound event ───────────────────────────────────────────────────

/// A delivery as handed over by the broker. Consumed exactly once.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Broker-assigned tag used to ack/nack this delivery.
    pub delivery_tag: u64,
    /// Routing key the message was published with, if any.
    pub routing_key: Option<String>,
    /// Undecoded message body.
    pub payload: Vec<u8>,
}

impl RawEvent {
    pub fn new(delivery_tag: u64, routing_key: Option<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_tag,
            routing_key,
            payload: payload.into(),
        }
    }

    /// Body as text for log records. Invalid UTF-8 is replaced, not rejected.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// A fully decoded event payload.
pub type DecodedEvent = Map<String, Value>;

/// Decode a raw payload into a JSON object.
///
/// Anything that is not a complete JSON object is rejected here, so the
/// classifier only ever sees whole objects.
pub fn decode(payload: &[u8]) -> Result<DecodedEvent, DecodeError> {
    match serde_json::from_slice::<Value>(payload)? {
        Value::Object(map) => Ok(map),
        Value::Null => Err(DecodeError::NotAnObject("null")),
        Value::Bool(_) => Err(DecodeError::NotAnObject("a boolean")),
        Value::Number(_) => Err(DecodeError::NotAnObject("a number")),
        Value::String(_) => Err(DecodeError::NotAnObject("a string")),
        Value::Array(_) => Err(DecodeError::NotAnObject("an array")),
    }
}

/// Read a field as text.
///
/// Non-empty strings are returned as-is and numbers as their JSON text.
/// `null`, booleans, arrays, objects and empty strings count as absent.
pub fn text_field(event: &DecodedEvent, key: &str) -> Option<String> {
    match event.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ── Classification result ───────────────────────────────────────────

/// Everything needed to send one SMS. Only built through [`DispatchIntent::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchIntent {
    recipient: String,
    body: String,
    event_type: Option<String>,
}

impl DispatchIntent {
    /// Returns `None` if either recipient or body is empty.
    pub fn new(
        recipient: impl Into<String>,
        body: impl Into<String>,
        event_type: Option<String>,
    ) -> Option<Self> {
        let recipient = recipient.into().trim().to_string();
        let body = body.into();
        if recipient.is_empty() || body.trim().is_empty() {
            return None;
        }
        Some(Self {
            recipient,
            body,
            event_type,
        })
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }
}

/// Why a decoded event could not be turned into a [`DispatchIntent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Service alert, but no alert recipient source yielded a value.
    NoAlertRecipient,
    /// Known notification type without a `recipient` field.
    MissingRecipient,
    /// Generic payload lacking a recipient or a body.
    UnrecognizedStructure,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAlertRecipient => "no recipient configured for alerts",
            Self::MissingRecipient => "missing recipient",
            Self::UnrecognizedStructure => "unrecognized message structure",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal classification failure. Logged, never retried.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct ClassificationFailure {
    pub reason: FailureReason,
    pub original_payload: DecodedEvent,
}

impl ClassificationFailure {
    pub fn new(reason: FailureReason, original_payload: &DecodedEvent) -> Self {
        Self {
            reason,
            original_payload: original_payload.clone(),
        }
    }
}

// ── Dispatch result ─────────────────────────────────────────────────

/// Which kind of failure a dispatch ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchFailureKind {
    /// The gateway answered with an error.
    Gateway,
    /// Transport or response-handling failure.
    Unexpected,
}

/// Outcome of dispatching one intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Accepted by the gateway.
    Sent {
        to: String,
        external_id: Option<String>,
    },
    /// No gateway configured; the send was only logged.
    Simulated { to: String },
    /// The gateway call failed.
    Failed {
        to: String,
        kind: DispatchFailureKind,
        detail: String,
    },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Normalized recipient the dispatch was addressed to.
    pub fn recipient(&self) -> &str {
        match self {
            Self::Sent { to, .. } | Self::Simulated { to } | Self::Failed { to, .. } => to,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sent { .. } => "sent",
            Self::Simulated { .. } => "simulated",
            Self::Failed { .. } => "failed",
        }
    }
}
