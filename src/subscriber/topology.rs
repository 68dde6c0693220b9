//! Declare the exchange and queues a subscriber consumes from.
use amq_protocol_types::FieldTable;
use anyhow::Context;
use lapin::options::{ExchangeDeclareOptions, QueueDeclareOptions};
use lapin::ExchangeKind;

use crate::addressing::{
    subscriber_queue_routing_key, MessagingConfiguration, WORK_QUEUE_ROUTING_KEY,
};
use crate::transport::BrokerChannel;

/// The broker objects backing one subscriber instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Topology {
    pub(crate) exchange_name: String,
    pub(crate) exchange_kind: ExchangeKind,
    pub(crate) work_queue_name: String,
    pub(crate) subscriber_queue_name: String,
    pub(crate) subscriber_id: String,
    pub(crate) durable_work_queue: bool,
}

impl Topology {
    pub(crate) fn new(
        configuration: &MessagingConfiguration,
        exchange_kind: ExchangeKind,
        service_name: &str,
        subscriber_id: &str,
    ) -> Self {
        Self {
            exchange_name: configuration.exchange_name(service_name),
            exchange_kind,
            work_queue_name: configuration.work_queue_name(service_name),
            subscriber_queue_name: crate::addressing::subscriber_queue_name(
                service_name,
                subscriber_id,
            ),
            subscriber_id: subscriber_id.to_owned(),
            durable_work_queue: configuration.durable_work_queue,
        }
    }

    /// Kinds the subscriber knows how to bind queues on.
    pub(crate) fn is_supported(kind: &ExchangeKind) -> bool {
        matches!(
            kind,
            ExchangeKind::Direct | ExchangeKind::Topic | ExchangeKind::Fanout
        )
    }

    /// Declare the exchange and both queues, then bind the queues to the exchange.
    ///
    /// Declarations are idempotent on the broker side: this runs on every restart.
    pub(crate) async fn declare(&self, channel: &dyn BrokerChannel) -> Result<(), anyhow::Error> {
        channel
            .exchange_declare(
                &self.exchange_name,
                self.exchange_kind.clone(),
                ExchangeDeclareOptions {
                    durable: self.durable_work_queue,
                    ..ExchangeDeclareOptions::default()
                },
            )
            .await
            .with_context(|| format!("Failed to declare exchange {}", self.exchange_name))?;

        channel
            .queue_declare(
                &self.work_queue_name,
                QueueDeclareOptions {
                    durable: self.durable_work_queue,
                    ..QueueDeclareOptions::default()
                },
            )
            .await
            .with_context(|| format!("Failed to declare queue {}", self.work_queue_name))?;

        channel
            .queue_declare(
                &self.subscriber_queue_name,
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..QueueDeclareOptions::default()
                },
            )
            .await
            .with_context(|| format!("Failed to declare queue {}", self.subscriber_queue_name))?;

        channel
            .queue_bind(
                &self.work_queue_name,
                &self.exchange_name,
                WORK_QUEUE_ROUTING_KEY,
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to bind queue {}", self.work_queue_name))?;

        channel
            .queue_bind(
                &self.subscriber_queue_name,
                &self.exchange_name,
                subscriber_queue_routing_key(&self.subscriber_id),
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to bind queue {}", self.subscriber_queue_name))?;

        Ok(())
    }
}
