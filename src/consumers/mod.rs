//! Facilities to consume messages from a RabbitMq queue. Check out [`QueueingConsumer`] as a
//! starting point.
pub use delivery::Delivery;
pub use queueing_consumer::QueueingConsumer;

mod delivery;
mod queueing_consumer;
