//! Normalizes the recipient and hands the message to the gateway, or
//! logs a simulated send when no gateway is configured.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::gateway::{OutboundSms, SmsGateway};
use crate::pipeline::phone;
use crate::pipeline::types::{DispatchFailureKind, DispatchIntent, DispatchOutcome};

/// Sends intents through the configured gateway.
pub struct Dispatcher {
    gateway: Option<Arc<dyn SmsGateway>>,
    from_number: Option<String>,
}

impl Dispatcher {
    /// Dispatcher backed by a real gateway.
    pub fn new(gateway: Arc<dyn SmsGateway>, from_number: Option<String>) -> Self {
        Self {
            gateway: Some(gateway),
            from_number,
        }
    }

    /// Dispatcher that only logs what it would have sent.
    pub fn simulated() -> Self {
        Self {
            gateway: None,
            from_number: None,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.gateway.is_none()
    }

    /// Dispatch one intent. Gateway failures are reported, never propagated.
    pub async fn dispatch(&self, intent: &DispatchIntent) -> DispatchOutcome {
        let normalized = phone::normalize(intent.recipient());
        if let Some(warning) = &normalized.warning {
            warn!(
                recipient = %warning.original,
                normalized = %normalized.recipient,
                "Recipient lacks international format"
            );
        }
        let to = normalized.recipient.into_inner();

        let Some(gateway) = &self.gateway else {
            info!(
                to = %to,
                body = %intent.body(),
                event_type = ?intent.event_type(),
                "SMS simulated"
            );
            return DispatchOutcome::Simulated { to };
        };

        let sms = OutboundSms {
            body: intent.body().to_string(),
            from: self.from_number.clone(),
            to,
        };

        match gateway.send(&sms).await {
            Ok(sent) => {
                info!(
                    to = %sms.to,
                    sid = ?sent.external_id,
                    event_type = ?intent.event_type(),
                    gateway = gateway.name(),
                    "SMS sent"
                );
                DispatchOutcome::Sent {
                    to: sms.to,
                    external_id: sent.external_id,
                }
            }
            Err(e) if e.is_provider_error() => {
                error!(to = %sms.to, error = %e, gateway = gateway.name(), "Gateway rejected SMS");
                DispatchOutcome::Failed {
                    to: sms.to,
                    kind: DispatchFailureKind::Gateway,
                    detail: e.to_string(),
                }
            }
            Err(e) => {
                error!(to = %sms.to, error = %e, gateway = gateway.name(), "Unexpected error sending SMS");
                DispatchOutcome::Failed {
                    to: sms.to,
                    kind: DispatchFailureKind::Unexpected,
                    detail: format!("unexpected error: {e}"),
                }
            }
        }
    }
}
