//! The broker operations the subscriber runtime relies on.
//!
//! [`Transport`] opens connections, [`BrokerConnection`] multiplexes channels and
//! [`BrokerChannel`] carries the AMQP methods (declare, consume, ack, publish, ...).
//!
//! The production implementation lives in [`crate::amqp`] and is backed by [`lapin`].
//! Everything above this module (pool, consumers, subscriber) only talks to these traits.
use std::sync::Arc;

use amq_protocol_types::{DeliveryTag, FieldTable};
use futures_util::stream::BoxStream;
use lapin::options::{ExchangeDeclareOptions, QueueDeclareOptions};
use lapin::{BasicProperties, ExchangeKind};

use crate::consumers::Delivery;

mod error;

pub use error::Error;

/// The stream of deliveries pushed by the broker for a single consumer registration.
///
/// The stream ends when the consumer is cancelled, either by us or server-side.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, Error>>;

/// Callback invoked when a connection is lost.
pub type ShutdownCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Opens connections to a broker.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establish a new connection.
    ///
    /// Fails if the broker is unreachable. Implementations must not retry internally.
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, Error>;
}

/// A physical connection to the broker.
#[async_trait::async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    /// Open a new channel on top of this connection.
    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>, Error>;

    /// Register `callback` to be invoked when the connection breaks.
    fn on_shutdown(&self, callback: ShutdownCallback);

    async fn close(&self) -> Result<(), Error>;
}

/// A channel multiplexed over a [`BrokerConnection`].
///
/// Operations on a single channel may be issued concurrently from multiple tasks:
/// implementations serialize them.
#[async_trait::async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    fn is_open(&self) -> bool;

    /// Put the channel in publisher confirms mode.
    async fn confirm_select(&self) -> Result<(), Error>;

    /// Limit the number of unacknowledged deliveries on this channel.
    async fn basic_qos(&self, prefetch_count: u16) -> Result<(), Error>;

    async fn exchange_declare(
        &self,
        exchange: &str,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
    ) -> Result<(), Error>;

    async fn queue_declare(&self, queue: &str, options: QueueDeclareOptions) -> Result<(), Error>;

    async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error>;

    /// Start consuming from `queue`.
    ///
    /// With `no_ack` set the broker considers deliveries acknowledged as soon as they
    /// are sent.
    async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        no_ack: bool,
    ) -> Result<DeliveryStream, Error>;

    async fn basic_cancel(&self, consumer_tag: &str) -> Result<(), Error>;

    async fn basic_ack(&self, delivery_tag: DeliveryTag) -> Result<(), Error>;

    async fn basic_reject(&self, delivery_tag: DeliveryTag, requeue: bool) -> Result<(), Error>;

    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<(), Error>;

    async fn close(&self) -> Result<(), Error>;
}
