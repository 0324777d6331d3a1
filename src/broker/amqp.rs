//! AMQP 0-9-1 broker (RabbitMQ) via lapin.
//!
//! Topology: durable topic exchange, durable queue bound to the configured
//! send key and `service.alert`, manual acks, prefetch 1.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, info};
use uuid::Uuid;

use crate::broker::Broker;
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::health::{ConnectivityProbe, ProbeStatus};
use crate::pipeline::RawEvent;

/// Messages held unacknowledged at once.
const PREFETCH_COUNT: u16 = 1;

const REPLY_SUCCESS: u16 = 200;

async fn connect(url: &str) -> Result<Connection, BrokerError> {
    Connection::connect(url, ConnectionProperties::default())
        .await
        .map_err(|e| BrokerError::Connect {
            url: redact(url),
            reason: e.to_string(),
        })
}

/// Strip credentials from an AMQP URL for logging.
pub fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

fn topology(step: &str) -> impl FnOnce(lapin::Error) -> BrokerError + '_ {
    move |e| BrokerError::Topology {
        step: step.to_string(),
        reason: e.to_string(),
    }
}

/// Connected AMQP consumer.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
    consumer: lapin::Consumer,
}

impl AmqpBroker {
    /// Connect, declare the topology and start consuming.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        info!(url = %redact(&config.url), "Connecting to RabbitMQ");
        let connection = connect(&config.url).await?;
        let channel = connection
            .create_channel()
            .await
            .map_err(topology("create channel"))?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(topology("declare exchange"))?;

        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(topology("declare queue"))?;

        for key in config.bindings() {
            channel
                .queue_bind(
                    &config.queue,
                    &config.exchange,
                    key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(topology("bind queue"))?;
            debug!(queue = %config.queue, routing_key = key, "Queue bound");
        }

        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await
            .map_err(topology("set prefetch"))?;

        let consumer_tag = format!("sms-relay-{}", Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                &config.queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(topology("start consumer"))?;

        info!(
            queue = %config.queue,
            exchange = %config.exchange,
            bindings = ?config.bindings(),
            "Waiting for SMS messages"
        );

        Ok(Self {
            connection,
            channel,
            consumer,
        })
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn receive(&mut self) -> Result<RawEvent, BrokerError> {
        match self.consumer.next().await {
            Some(Ok(delivery)) => {
                let routing_key = Some(delivery.routing_key.as_str())
                    .filter(|k| !k.is_empty())
                    .map(str::to_string);
                Ok(RawEvent::new(delivery.delivery_tag, routing_key, delivery.data))
            }
            Some(Err(e)) => Err(BrokerError::Receive(e.to_string())),
            None => Err(BrokerError::StreamClosed),
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Ack {
                tag: delivery_tag,
                reason: e.to_string(),
            })
    }

    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue,
                    ..BasicNackOptions::default()
                },
            )
            .await
            .map_err(|e| BrokerError::Nack {
                tag: delivery_tag,
                reason: e.to_string(),
            })
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.connection
            .close(REPLY_SUCCESS, "consumer shutting down")
            .await
            .map_err(|e| BrokerError::Close(e.to_string()))
    }
}

/// Readiness probe: one fresh connect-and-close per call.
pub struct AmqpProbe {
    url: String,
}

impl AmqpProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ConnectivityProbe for AmqpProbe {
    fn name(&self) -> &str {
        "RabbitMQ"
    }

    async fn probe(&self) -> ProbeStatus {
        let connection = match connect(&self.url).await {
            Ok(connection) => connection,
            Err(e) => return ProbeStatus::down(format!("disconnected: {e}")),
        };
        if let Err(e) = connection.close(REPLY_SUCCESS, "health check").await {
            debug!(error = %e, "Probe connection close failed");
        }
        ProbeStatus::up("connected")
    }
}
