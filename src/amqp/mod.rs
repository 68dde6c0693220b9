//! Helpers for connecting to a rabbitmq broker

mod channel;
pub mod configuration;
mod factory;

pub use channel::{AmqpChannel, AmqpConnection};
pub use factory::ConnectionFactory;

pub use lapin::{options, types, BasicProperties, ExchangeKind};
