//! `carrot-rpc` serves HTTP-shaped requests delivered through RabbitMQ, built on top of
//! [`lapin`].
//!
//! Every instance of a service consumes from two queues: a work queue shared with its
//! siblings and an exclusive queue reserved to the instance. [`Subscriber`](crate::subscriber::Subscriber)
//! alternates fairly between the two, survives connection losses and publishes responses
//! to the address each caller asked for.
//!
//! [`Host`](crate::host::Host) and the [`Application`](crate::host::Application) trait are
//! the quickest way to get a service running.
//!
//! ## Examples
//!
//! Check the `demos` directory to see the library in action.

pub mod addressing;
pub mod amqp;
pub mod consumers;
pub mod host;
pub mod messages;
pub mod pool;
pub mod subscriber;
pub mod transport;
