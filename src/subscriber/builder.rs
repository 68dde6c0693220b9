use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::addressing::{new_subscriber_id, AddressMapper};
use crate::amqp::configuration::ConnectionSettings;
use crate::amqp::ConnectionFactory;
use crate::subscriber::topology::Topology;
use crate::subscriber::{Subscriber, SubscriberError, SubscriberSettings};
use crate::transport::Transport;

/// A builder for [`Subscriber`].
///
/// Use [`Subscriber::builder`] as entrypoint.
pub struct SubscriberBuilder {
    mapper: Arc<dyn AddressMapper>,
    settings: SubscriberSettings,
    connection_settings: ConnectionSettings,
    transport: Option<Arc<dyn Transport>>,
}

impl SubscriberBuilder {
    pub(super) fn new(mapper: Arc<dyn AddressMapper>) -> Self {
        Self {
            mapper,
            settings: SubscriberSettings::default(),
            connection_settings: ConnectionSettings::default(),
            transport: None,
        }
    }

    /// Prefetch count, acknowledgment behaviour and reconnection tuning.
    /// [`SubscriberSettings::default`] is used if left unspecified.
    #[must_use]
    pub fn settings(mut self, settings: SubscriberSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Timeout, heartbeat and TLS settings for the broker connection.
    ///
    /// Ignored if a custom transport is provided with [`SubscriberBuilder::transport`].
    #[must_use]
    pub fn connection_settings(mut self, connection_settings: ConnectionSettings) -> Self {
        self.connection_settings = connection_settings;
        self
    }

    /// Connect through `transport` instead of the broker described by the address mapper.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and build the [`Subscriber`].
    ///
    /// Nothing is sent to the broker until [`Subscriber::start`] is called.
    pub fn build(self) -> Result<Subscriber, SubscriberError> {
        let exchange_kind = self.mapper.supported_exchange_kind();
        if !Topology::is_supported(&exchange_kind) {
            return Err(SubscriberError::Configuration(format!(
                "Exchange kind {exchange_kind:?} is not supported"
            )));
        }

        let service_name = self.mapper.service_name().trim().to_owned();
        if service_name.is_empty() {
            return Err(SubscriberError::Configuration(
                "The service name must not be blank".into(),
            ));
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let descriptor = self.mapper.connection_descriptors().first().ok_or_else(|| {
                    SubscriberError::Configuration("No broker connection descriptor".into())
                })?;
                let factory = ConnectionFactory::new(descriptor, &self.connection_settings)
                    .map_err(|e| SubscriberError::Configuration(format!("{e:#}")))?;
                Arc::new(factory)
            }
        };

        let id = new_subscriber_id();
        let topology = Topology::new(
            self.mapper.messaging_configuration(),
            exchange_kind,
            &service_name,
            &id,
        );

        Ok(Subscriber {
            id,
            service_name,
            settings: self.settings,
            transport,
            topology,
            started: Default::default(),
            disposed: CancellationToken::new(),
            item_queued: Default::default(),
            restart_lock: Default::default(),
            session: Default::default(),
            generation: Default::default(),
            last_served: Mutex::new(None),
        })
    }
}
