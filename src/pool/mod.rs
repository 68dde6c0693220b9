//! Channel pooling on top of a single broker connection, using [`deadpool`] for the
//! short-lived publishing channels.
//!
//! A [`ChannelPool`] provides two guarantees:
//! - consumer channels live until the pool is closed, publish channels are leased and
//!   returned to the pool (or discarded if unhealthy) when the lease is dropped;
//! - closing the pool closes every channel it ever handed out, then the connection.
//!
//! ```rust,no_run
//! use carrot_rpc::pool::{ChannelPool, ChannelPurpose};
//! use carrot_rpc::transport::Transport;
//!
//! async fn example(transport: &dyn Transport) -> anyhow::Result<()> {
//!     let pool = ChannelPool::builder(transport.connect().await?)
//!         .max_publish_channels(4)
//!         .build()?;
//!
//!     // Lease a channel for a single publish: it goes back to the pool when dropped.
//!     let channel = pool.get_channel(ChannelPurpose::Publish).await?;
//!     channel.basic_publish("", "some-queue", b"payload", Default::default()).await?;
//!     drop(channel);
//!
//!     pool.close().await;
//!     Ok(())
//! }
//! ```

mod channel;
mod error;

use std::ops::Deref;
use std::sync::Arc;

use deadpool::managed::{Object, Pool};
use tracing::debug;

use crate::transport::{BrokerChannel, BrokerConnection};
use channel::ChannelRegistry;

pub use channel::ChannelManager;
pub use error::Error;

const DEFAULT_MAX_PUBLISH_CHANNELS: usize = 16;

/// What a leased channel is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPurpose {
    /// A long-lived channel hosting one consumer registration.
    Consumer,
    /// A short-lived channel used for publishing.
    Publish,
}

/// A channel leased from a [`ChannelPool`].
pub enum ChannelLease {
    Consumer(Arc<dyn BrokerChannel>),
    Publish(Object<ChannelManager>),
}

impl ChannelLease {
    /// A shared handle to the underlying channel.
    ///
    /// For publish leases the channel still goes back to the pool when the lease is dropped.
    pub fn to_shared(&self) -> Arc<dyn BrokerChannel> {
        match self {
            Self::Consumer(channel) => Arc::clone(channel),
            Self::Publish(channel) => Arc::clone(&**channel),
        }
    }
}

impl Deref for ChannelLease {
    type Target = dyn BrokerChannel;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Consumer(channel) => &**channel,
            Self::Publish(channel) => &***channel,
        }
    }
}

/// Owns one broker connection and every channel multiplexed over it.
pub struct ChannelPool {
    connection: Arc<dyn BrokerConnection>,
    publish_channels: Pool<ChannelManager>,
    registry: Arc<ChannelRegistry>,
}

impl ChannelPool {
    /// Start building a [`ChannelPool`] that owns `connection`.
    pub fn builder(connection: Arc<dyn BrokerConnection>) -> ChannelPoolBuilder {
        ChannelPoolBuilder {
            connection,
            max_publish_channels: DEFAULT_MAX_PUBLISH_CHANNELS,
            publisher_confirms: false,
        }
    }

    /// Lease a channel for `purpose`.
    ///
    /// Consumer channels are always freshly opened. Publish channels are reused when a
    /// healthy idle one is available.
    pub async fn get_channel(&self, purpose: ChannelPurpose) -> Result<ChannelLease, Error> {
        match purpose {
            ChannelPurpose::Consumer => {
                let channel = self.connection.create_channel().await?;
                self.registry.track(&channel);
                Ok(ChannelLease::Consumer(channel))
            }
            ChannelPurpose::Publish => Ok(ChannelLease::Publish(
                self.publish_channels.get().await?,
            )),
        }
    }

    /// Close every channel handed out by the pool, then the connection.
    ///
    /// Errors are swallowed: the connection is being abandoned anyway.
    pub async fn close(&self) {
        self.publish_channels.close();
        for channel in self.registry.drain() {
            if !channel.is_open() {
                continue;
            }
            if let Err(e) = channel.close().await {
                debug!("Failed to close channel: {}", e);
            }
        }
        if let Err(e) = self.connection.close().await {
            debug!("Failed to close connection: {}", e);
        }
    }
}

/// A builder for [`ChannelPool`].
///
/// Use [`ChannelPool::builder`] as entrypoint.
pub struct ChannelPoolBuilder {
    connection: Arc<dyn BrokerConnection>,
    max_publish_channels: usize,
    publisher_confirms: bool,
}

impl ChannelPoolBuilder {
    /// Maximum number of publish channels leased at the same time.
    /// Defaults to 16 if left unspecified.
    #[must_use]
    pub fn max_publish_channels(mut self, max_publish_channels: usize) -> Self {
        self.max_publish_channels = max_publish_channels;
        self
    }

    /// Put publish channels in confirm mode, so that publishing waits for the broker ack.
    #[must_use]
    pub fn with_publisher_confirms(mut self, publisher_confirms: bool) -> Self {
        self.publisher_confirms = publisher_confirms;
        self
    }

    pub fn build(self) -> Result<ChannelPool, Error> {
        let registry = Arc::new(ChannelRegistry::default());
        let manager = ChannelManager::new(
            Arc::clone(&self.connection),
            Arc::clone(&registry),
            self.publisher_confirms,
        );
        let publish_channels = Pool::builder(manager)
            .max_size(self.max_publish_channels)
            .build()
            .map_err(|e| Error::from(anyhow::Error::msg(e.to_string())))?;

        Ok(ChannelPool {
            connection: self.connection,
            publish_channels,
            registry,
        })
    }
}
