//! Maps a decoded payload to a dispatch intent.
//!
//! Three mutually exclusive cases, tried in order:
//! - `service.alert` (type or routing key) → configured alert recipient, alert template
//! - known notification types → payload recipient, payload message or per-type template
//! - anything else → `recipient`/`to` and `message`/`body`/`text` from the payload
//!
//! Classification is a pure function of the payload, the routing key and
//! the recipient configuration.

use tracing::debug;

use crate::config::{FALLBACK_ALERT_RECIPIENT, RecipientConfig, SERVICE_ALERT_ROUTING_KEY};
use crate::pipeline::types::{
    ClassificationFailure, DecodedEvent, DispatchIntent, FailureReason, text_field,
};

/// Notification types with a recipient taken from the payload and a
/// built-in body template.
pub const KNOWN_NOTIFICATION_TYPES: [&str; 3] =
    ["account.created", "security.login", "security.password_change"];

const WELCOME_BODY: &str = "¡Bienvenido! Tu cuenta ha sido creada exitosamente.";
const PASSWORD_CHANGED_BODY: &str = "Tu contraseña ha sido cambiada exitosamente";
const UNKNOWN_IP: &str = "IP desconocida";

/// Recipient fields for generic payloads, in precedence order.
const GENERIC_RECIPIENT_FIELDS: [&str; 2] = ["recipient", "to"];
/// Body fields for generic payloads, in precedence order.
const GENERIC_BODY_FIELDS: [&str; 3] = ["message", "body", "text"];

/// A named place an alert recipient can come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientSource {
    /// Name used in logs (the setting it came from).
    pub name: &'static str,
    pub value: Option<String>,
}

/// Which classification case matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ServiceAlert,
    KnownNotification,
    Direct,
}

impl EventKind {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ServiceAlert => "service_alert",
            Self::KnownNotification => "known_notification",
            Self::Direct => "direct",
        }
    }
}

/// Stateless classifier configured once at startup.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    alert_sources: Vec<RecipientSource>,
}

impl EventClassifier {
    /// Build the alert recipient chain from configuration.
    ///
    /// Precedence: `ALERT_SMS_RECIPIENT`, then `SMS_DEFAULT_RECIPIENT`,
    /// then the built-in fallback number (unless disabled).
    pub fn new(config: &RecipientConfig) -> Self {
        let mut alert_sources = vec![
            RecipientSource {
                name: "ALERT_SMS_RECIPIENT",
                value: config.alert_override.clone(),
            },
            RecipientSource {
                name: "SMS_DEFAULT_RECIPIENT",
                value: config.default_recipient.clone(),
            },
        ];
        if config.alert_fallback_enabled {
            alert_sources.push(RecipientSource {
                name: "fallback",
                value: Some(FALLBACK_ALERT_RECIPIENT.to_string()),
            });
        }
        Self { alert_sources }
    }

    /// Alert recipient sources in the order they are tried.
    pub fn alert_sources(&self) -> &[RecipientSource] {
        &self.alert_sources
    }

    /// Decide which case a payload falls into.
    pub fn kind(event: &DecodedEvent, routing_key: Option<&str>) -> EventKind {
        let event_type = event_type(event, routing_key);
        if event_type.as_deref() == Some(SERVICE_ALERT_ROUTING_KEY)
            || routing_key == Some(SERVICE_ALERT_ROUTING_KEY)
        {
            EventKind::ServiceAlert
        } else if event_type
            .as_deref()
            .is_some_and(|t| KNOWN_NOTIFICATION_TYPES.contains(&t))
        {
            EventKind::KnownNotification
        } else {
            EventKind::Direct
        }
    }

    /// Classify a decoded event.
    pub fn classify(
        &self,
        event: &DecodedEvent,
        routing_key: Option<&str>,
    ) -> Result<DispatchIntent, ClassificationFailure> {
        let kind = Self::kind(event, routing_key);
        let event_type = match kind {
            EventKind::ServiceAlert => Some(SERVICE_ALERT_ROUTING_KEY.to_string()),
            _ => event_type(event, routing_key),
        };
        debug!(kind = kind.label(), event_type = ?event_type, "Classifying event");

        let (recipient, body, reason) = match kind {
            EventKind::ServiceAlert => (
                self.alert_recipient(),
                Some(render_alert(event)),
                FailureReason::NoAlertRecipient,
            ),
            EventKind::KnownNotification => {
                let t = event_type.as_deref().unwrap_or_default();
                (
                    text_field(event, "recipient"),
                    text_field(event, "message").or_else(|| notification_template(t, event)),
                    FailureReason::MissingRecipient,
                )
            }
            EventKind::Direct => (
                first_field(event, &GENERIC_RECIPIENT_FIELDS),
                first_field(event, &GENERIC_BODY_FIELDS),
                FailureReason::UnrecognizedStructure,
            ),
        };

        let (Some(recipient), Some(body)) = (recipient, body) else {
            return Err(ClassificationFailure::new(reason, event));
        };
        DispatchIntent::new(recipient, body, event_type)
            .ok_or_else(|| ClassificationFailure::new(reason, event))
    }

    fn alert_recipient(&self) -> Option<String> {
        self.alert_sources.iter().find_map(|source| {
            let value = source
                .value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())?;
            debug!(source = source.name, "Resolved alert recipient");
            Some(value.to_string())
        })
    }
}

/// The payload `type`, falling back to the routing key.
fn event_type(event: &DecodedEvent, routing_key: Option<&str>) -> Option<String> {
    text_field(event, "type").or_else(|| routing_key.map(str::to_string))
}

fn first_field(event: &DecodedEvent, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text_field(event, key))
}

fn field_or(event: &DecodedEvent, key: &str, default: &str) -> String {
    text_field(event, key).unwrap_or_else(|| default.to_string())
}

fn render_alert(event: &DecodedEvent) -> String {
    format!(
        "🚨 ALERTA: {}\nServicio: {}\nSeveridad: {}\nInstancia: {}\nTiempo: {}",
        field_or(event, "alert_name", "Alert"),
        field_or(event, "service", "unknown"),
        field_or(event, "severity", ""),
        field_or(event, "instance", ""),
        field_or(event, "timestamp", ""),
    )
}

fn notification_template(event_type: &str, event: &DecodedEvent) -> Option<String> {
    match event_type {
        "account.created" => Some(WELCOME_BODY.to_string()),
        "security.login" => Some(format!(
            "Alerta: Nuevo acceso a tu cuenta desde {}",
            field_or(event, "ip", UNKNOWN_IP)
        )),
        "security.password_change" => Some(PASSWORD_CHANGED_BODY.to_string()),
        _ => None,
    }
}
