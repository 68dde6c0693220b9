//! Implements [`Manager`] for broker channels.
use deadpool::managed::{self, Manager};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::transport::{BrokerChannel, BrokerConnection};

/// `ChannelManager` implements [`Manager`] to pool the short-lived channels used to publish.
///
/// All channels are opened on the single connection owned by the surrounding
/// [`ChannelPool`](super::ChannelPool).
pub struct ChannelManager {
    connection: Arc<dyn BrokerConnection>,
    registry: Arc<ChannelRegistry>,
    pub(crate) publisher_confirms: bool,
}

impl ChannelManager {
    pub(super) fn new(
        connection: Arc<dyn BrokerConnection>,
        registry: Arc<ChannelRegistry>,
        publisher_confirms: bool,
    ) -> Self {
        Self {
            connection,
            registry,
            publisher_confirms,
        }
    }
}

#[async_trait::async_trait]
impl Manager for ChannelManager {
    type Type = Arc<dyn BrokerChannel>;
    type Error = super::Error;

    async fn create(&self) -> Result<Arc<dyn BrokerChannel>, super::Error> {
        let channel = self.connection.create_channel().await?;
        if self.publisher_confirms {
            channel.confirm_select().await?;
        }
        self.registry.track(&channel);
        Ok(channel)
    }

    async fn recycle(
        &self,
        obj: &mut Arc<dyn BrokerChannel>,
    ) -> managed::RecycleResult<super::Error> {
        if obj.is_open() {
            Ok(())
        } else {
            Err(managed::RecycleError::Message(
                "Channel is not in an healthy state".into(),
            ))
        }
    }
}

/// Every channel opened by a pool, so they can all be closed together.
#[derive(Default)]
pub(super) struct ChannelRegistry(Mutex<Vec<Weak<dyn BrokerChannel>>>);

impl ChannelRegistry {
    pub(super) fn track(&self, channel: &Arc<dyn BrokerChannel>) {
        let mut channels = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        channels.retain(|c| c.strong_count() > 0);
        channels.push(Arc::downgrade(channel));
    }

    /// Take every channel that is still alive out of the registry.
    pub(super) fn drain(&self) -> Vec<Arc<dyn BrokerChannel>> {
        let mut channels = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        channels.drain(..).filter_map(|c| c.upgrade()).collect()
    }
}
