//! Message broker abstraction for the consumer loop.

pub mod amqp;

pub use amqp::{AmqpBroker, AmqpProbe};

use async_trait::async_trait;

use crate::error::BrokerError;
use crate::pipeline::RawEvent;

/// Trait for brokers delivering one message at a time with manual acks.
///
/// Every error is a transport failure and is fatal to the consumer.
#[async_trait]
pub trait Broker: Send {
    /// Wait for the next delivery.
    async fn receive(&mut self) -> Result<RawEvent, BrokerError>;

    /// Acknowledge a processed delivery.
    async fn ack(&mut self, delivery_tag: u64) -> Result<(), BrokerError>;

    /// Reject a delivery, optionally asking the broker to redeliver it.
    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), BrokerError>;
}
