//! [`lapin`]-backed implementations of the transport traits.
use crate::consumers::Delivery;
use crate::transport::{self, BrokerChannel, BrokerConnection, DeliveryStream, ShutdownCallback};
use amq_protocol_types::{DeliveryTag, FieldTable};
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
    BasicQosOptions, BasicRejectOptions, ConfirmSelectOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::{BasicProperties, ExchangeKind};
use std::sync::Arc;
use tracing::warn;

/// AMQP reply code for a normal shutdown.
const REPLY_SUCCESS: u16 = 200;

/// A [`lapin::Connection`] exposed as a [`BrokerConnection`].
pub struct AmqpConnection {
    inner: lapin::Connection,
    display_name: String,
}

impl AmqpConnection {
    pub(crate) fn new(inner: lapin::Connection, display_name: String) -> Self {
        Self {
            inner,
            display_name,
        }
    }
}

#[async_trait::async_trait]
impl BrokerConnection for AmqpConnection {
    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>, transport::Error> {
        let channel = self.inner.create_channel().await?;
        Ok(Arc::new(AmqpChannel(channel)))
    }

    /// `lapin` keeps a single error handler per connection: registering a callback
    /// replaces the previous one.
    fn on_shutdown(&self, callback: ShutdownCallback) {
        let display_name = self.display_name.clone();
        self.inner.on_error(move |e| {
            warn!(broker = %display_name, "RabbitMQ broken connection: {:?}", e);
            callback();
        });
    }

    async fn close(&self) -> Result<(), transport::Error> {
        self.inner.close(REPLY_SUCCESS, "closing").await?;
        Ok(())
    }
}

/// A [`lapin::Channel`] exposed as a [`BrokerChannel`].
pub struct AmqpChannel(lapin::Channel);

#[async_trait::async_trait]
impl BrokerChannel for AmqpChannel {
    fn is_open(&self) -> bool {
        self.0.status().connected()
    }

    async fn confirm_select(&self) -> Result<(), transport::Error> {
        self.0
            .confirm_select(ConfirmSelectOptions { nowait: false })
            .await?;
        Ok(())
    }

    async fn basic_qos(&self, prefetch_count: u16) -> Result<(), transport::Error> {
        self.0
            .basic_qos(prefetch_count, BasicQosOptions { global: false })
            .await?;
        Ok(())
    }

    async fn exchange_declare(
        &self,
        exchange: &str,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
    ) -> Result<(), transport::Error> {
        self.0
            .exchange_declare(exchange, kind, options, FieldTable::default())
            .await?;
        Ok(())
    }

    async fn queue_declare(
        &self,
        queue: &str,
        options: QueueDeclareOptions,
    ) -> Result<(), transport::Error> {
        self.0
            .queue_declare(queue, options, FieldTable::default())
            .await?;
        Ok(())
    }

    async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), transport::Error> {
        self.0
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions { nowait: false },
                arguments,
            )
            .await?;
        Ok(())
    }

    async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        no_ack: bool,
    ) -> Result<DeliveryStream, transport::Error> {
        let consumer = self
            .0
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(consumer
            .map(|delivery| {
                delivery
                    .map(Delivery::from)
                    .map_err(transport::Error::from)
            })
            .boxed())
    }

    async fn basic_cancel(&self, consumer_tag: &str) -> Result<(), transport::Error> {
        self.0
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await?;
        Ok(())
    }

    async fn basic_ack(&self, delivery_tag: DeliveryTag) -> Result<(), transport::Error> {
        self.0
            .basic_ack(delivery_tag, BasicAckOptions { multiple: false })
            .await?;
        Ok(())
    }

    async fn basic_reject(
        &self,
        delivery_tag: DeliveryTag,
        requeue: bool,
    ) -> Result<(), transport::Error> {
        self.0
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await?;
        Ok(())
    }

    /// Publish a payload, waiting for the broker confirmation if the channel is in
    /// confirm mode.
    #[tracing::instrument(level = "debug", skip(self, payload, properties))]
    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<(), transport::Error> {
        let confirm = self
            .0
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?
            .await?;

        match confirm {
            Confirmation::Nack(_) => Err(transport::Error::msg(
                "The RabbitMq broker nacked the publishing of the message",
            )),
            Confirmation::Ack(_) | Confirmation::NotRequested => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), transport::Error> {
        self.0.close(REPLY_SUCCESS, "closing").await?;
        Ok(())
    }
}
