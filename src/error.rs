//! Error types for the SMS relay.

/// Errors that stop the relay. Gateway and discovery failures never do:
/// the former become dispatch outcomes, the latter are logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Health server error: {0}")]
    HealthServer(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Broker transport errors. All of these are fatal to the consumer.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Failed to connect to broker at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Topology setup failed ({step}): {reason}")]
    Topology { step: String, reason: String },

    #[error("Delivery stream failed: {0}")]
    Receive(String),

    #[error("Delivery stream closed by broker")]
    StreamClosed,

    #[error("Failed to acknowledge delivery {tag}: {reason}")]
    Ack { tag: u64, reason: String },

    #[error("Failed to reject delivery {tag}: {reason}")]
    Nack { tag: u64, reason: String },

    #[error("Failed to close broker connection: {0}")]
    Close(String),
}

/// SMS gateway errors.
///
/// `Provider` is the gateway-specific failure (the API answered with an
/// error document). Everything else is treated as an unexpected failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("{provider} rejected the request (HTTP {status}): {message}")]
    Provider {
        provider: String,
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("{provider} request failed: {reason}")]
    Transport { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl GatewayError {
    /// Whether this is an error reported by the gateway itself.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

/// Failure to turn a raw payload into a JSON object.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Service discovery errors. Never fatal.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Discovery agent request failed: {0}")]
    Request(String),

    #[error("Discovery agent returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, Error>;
