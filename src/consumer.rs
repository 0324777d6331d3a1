//! Consumer loop. One delivery at a time, fully settled before the next.
//!
//! `Received → Decoded → Classified → Dispatched → Acked`, or on any
//! failure `Nacked(requeue = false)`. Nothing is ever requeued.

use std::future::Future;

use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::broker::Broker;
use crate::error::BrokerError;
use crate::pipeline::types::{DispatchOutcome, decode};
use crate::pipeline::{ClassificationFailure, Dispatcher, EventClassifier, RawEvent};

/// What happened to one delivery.
#[derive(Debug, Clone)]
pub enum MessageOutcome {
    /// Classified and handed to the dispatcher (which may still have failed).
    Dispatched(DispatchOutcome),
    /// Payload was not a JSON object.
    DecodeFailed { error: String },
    /// Decoded, but unusable.
    Unclassified(ClassificationFailure),
}

impl MessageOutcome {
    /// Only successful (or simulated) dispatches are acked.
    pub fn should_ack(&self) -> bool {
        matches!(self, Self::Dispatched(outcome) if outcome.is_success())
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dispatched(outcome) => outcome.label(),
            Self::DecodeFailed { .. } => "decode_failed",
            Self::Unclassified(_) => "unclassified",
        }
    }
}

/// Running totals, reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub acked: u64,
    pub rejected: u64,
}

/// The consumer loop.
pub struct Consumer<B> {
    broker: B,
    classifier: EventClassifier,
    dispatcher: Dispatcher,
    stats: ConsumerStats,
}

impl<B: Broker> Consumer<B> {
    pub fn new(broker: B, classifier: EventClassifier, dispatcher: Dispatcher) -> Self {
        Self {
            broker,
            classifier,
            dispatcher,
            stats: ConsumerStats::default(),
        }
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Decode, classify and dispatch one event. Never touches the broker.
    pub async fn process(&self, event: &RawEvent) -> MessageOutcome {
        info!(
            routing_key = ?event.routing_key,
            raw = %event.payload_lossy(),
            "Message received"
        );

        let decoded = match decode(&event.payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!(error = %e, body = %event.payload_lossy(), "Payload decode error");
                return MessageOutcome::DecodeFailed {
                    error: e.to_string(),
                };
            }
        };

        let intent = match self
            .classifier
            .classify(&decoded, event.routing_key.as_deref())
        {
            Ok(intent) => intent,
            Err(failure) => {
                error!(
                    reason = %failure.reason,
                    payload = %serde_json::Value::Object(failure.original_payload.clone()),
                    "Message could not be classified"
                );
                return MessageOutcome::Unclassified(failure);
            }
        };

        MessageOutcome::Dispatched(self.dispatcher.dispatch(&intent).await)
    }

    /// Receive, process and settle the next delivery.
    pub async fn handle_next(&mut self) -> Result<MessageOutcome, BrokerError> {
        let event = self.broker.receive().await?;
        self.settle(event).await
    }

    async fn settle(&mut self, event: RawEvent) -> Result<MessageOutcome, BrokerError> {
        let span = info_span!(
            "sms_message",
            message_id = %Uuid::new_v4(),
            delivery_tag = event.delivery_tag
        );
        let outcome = self.process(&event).instrument(span.clone()).await;

        let tag = event.delivery_tag;
        let label = outcome.label();
        if outcome.should_ack() {
            self.broker.ack(tag).instrument(span.clone()).await?;
            self.stats.acked += 1;
            span.in_scope(|| debug!(outcome = label, "Message acked"));
        } else {
            self.broker.nack(tag, false).instrument(span.clone()).await?;
            self.stats.rejected += 1;
            span.in_scope(|| warn!(outcome = label, "Message rejected without requeue"));
        }
        Ok(outcome)
    }

    /// Consume until `shutdown` resolves or the broker fails.
    ///
    /// A delivery already received when `shutdown` fires is settled first.
    /// Broker errors end the loop and are returned to the caller.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<ConsumerStats, BrokerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let event = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping consumer");
                    break;
                }
                received = self.broker.receive() => received?,
            };
            self.settle(event).await?;
        }

        if let Err(e) = self.broker.close().await {
            warn!(error = %e, "Broker close failed");
        }
        info!(
            acked = self.stats.acked,
            rejected = self.stats.rejected,
            "Consumer stopped"
        );
        Ok(self.stats)
    }
}
