//! Outbound SMS gateway abstraction.

pub mod twilio;

pub use twilio::TwilioClient;

use async_trait::async_trait;

use crate::error::GatewayError;

/// One outbound SMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundSms {
    pub body: String,
    /// Sender number. `None` leaves it to the gateway to reject or default.
    pub from: Option<String>,
    /// Normalized recipient.
    pub to: String,
}

/// A message accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Gateway-assigned identifier, when the gateway returned one.
    pub external_id: Option<String>,
}

/// Trait for SMS gateways. Pure I/O, no classification logic.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Gateway name for logs (e.g. "twilio").
    fn name(&self) -> &str;

    /// Submit one message.
    async fn send(&self, sms: &OutboundSms) -> Result<SentMessage, GatewayError>;

    /// Fetch account details as a connectivity check.
    async fn check_account(&self) -> Result<(), GatewayError>;
}
