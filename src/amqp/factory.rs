use crate::addressing::ConnectionDescriptor;
use crate::amqp::channel::AmqpConnection;
use crate::amqp::configuration::ConnectionSettings;
use crate::transport::{self, BrokerConnection, Transport};
use lapin::{
    tcp::{AMQPUriTcpExt, NativeTlsConnector},
    uri::{AMQPScheme, AMQPUri, AMQPUserInfo},
    ConnectionProperties,
};
use std::sync::Arc;
use tokio::time::timeout;

#[derive(Clone)]
/// All the information required to connect to a RabbitMq broker.
pub struct ConnectionFactory {
    uri: AMQPUri,
    /// Credential-free identifier of the broker, safe to log.
    display_name: String,
    /// The timeout observed when trying to connect to RabbitMq.
    connection_timeout: std::time::Duration,
    /// TLS configuration for `amqps` connections.
    /// If `None`, `lapin` negotiates TLS with the system trust root.
    tls: Option<Arc<Tls>>,
}

#[derive(Clone)]
struct Tls {
    connector: NativeTlsConnector,
    domain_name: String,
}

impl ConnectionFactory {
    /// Create a new connection factory for the broker described by `descriptor`.
    ///
    /// Explicit credentials on the descriptor take precedence over the user-info embedded
    /// in its URI.
    pub fn new(
        descriptor: &ConnectionDescriptor,
        settings: &ConnectionSettings,
    ) -> Result<Self, anyhow::Error> {
        let mut uri: AMQPUri = descriptor
            .uri()
            .parse()
            .map_err(anyhow::Error::msg)?;
        if let Some(username) = descriptor.username() {
            uri.authority.userinfo = AMQPUserInfo {
                username: username.to_owned(),
                password: descriptor.password().unwrap_or_default().to_owned(),
            };
        }
        uri.query.heartbeat = Some(settings.heartbeat_seconds);

        let tls = match (&uri.scheme, &settings.tls) {
            (AMQPScheme::AMQPS, Some(tls_settings)) => {
                let domain_name = tls_settings
                    .domain
                    .clone()
                    .unwrap_or_else(|| uri.authority.host.clone());

                let mut connector_builder = NativeTlsConnector::builder();
                if let Some(certificate) = tls_settings.ca_certificate_chain()? {
                    connector_builder.add_root_certificate(certificate);
                }
                let connector = connector_builder.build()?;
                Some(Arc::new(Tls {
                    connector,
                    domain_name,
                }))
            }
            _ => None,
        };

        Ok(Self {
            uri,
            display_name: descriptor.display_name().to_owned(),
            connection_timeout: settings.connection_timeout(),
            tls,
        })
    }

    /// Replaces the TLS Connector for the connection factory, along with the expected domain name for the certificate
    pub fn set_tls_connector_with_domain(
        &mut self,
        connector: NativeTlsConnector,
        domain_name: String,
    ) {
        self.tls = Some(Arc::new(Tls {
            connector,
            domain_name,
        }));
    }

    /// The credential-free name of the broker this factory connects to.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Create a new connection to a RabbitMq broker.
    ///
    /// It uses the custom TLS connector if one was configured.
    #[tracing::instrument(name = "rabbitmq_connect", skip(self), fields(broker = %self.display_name))]
    pub async fn new_connection(&self) -> Result<lapin::Connection, anyhow::Error> {
        let properties = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_connection_name(self.display_name.clone().into());
        let connection = timeout(self.connection_timeout, async {
            match &self.tls {
                None => lapin::Connection::connect_uri(self.uri.clone(), properties).await,
                Some(tls) => self.connect_with_tls(properties, Arc::clone(tls)).await,
            }
        })
        .await??;
        Ok(connection)
    }

    /// Establish a new TLS connection to a RabbitMq broker.
    async fn connect_with_tls(
        &self,
        properties: ConnectionProperties,
        tls_configuration: Arc<Tls>,
    ) -> Result<lapin::Connection, lapin::Error> {
        lapin::Connection::connector(
            self.uri.clone(),
            Box::new(move |uri| {
                // First establish a plain TCP connection using the AMQP protocol
                let mut amqp_uri = uri.clone();
                amqp_uri.scheme = AMQPScheme::AMQP;
                amqp_uri
                    .connect()
                    // Then perform a TLS handshake with custom settings
                    // including customisation of the expected domain for the server certificate
                    .and_then(|tcp| {
                        tcp.into_native_tls(
                            &tls_configuration.connector,
                            &tls_configuration.domain_name,
                        )
                    })
            }),
            properties,
        )
        .await
    }
}

#[async_trait::async_trait]
impl Transport for ConnectionFactory {
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, transport::Error> {
        let connection = self.new_connection().await?;
        Ok(Arc::new(AmqpConnection::new(
            connection,
            self.display_name.clone(),
        )))
    }
}
