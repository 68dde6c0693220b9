//! Configuration types holding the parameters used when connecting to a RabbitMq broker.
//!
//! The broker address itself comes from a [`ConnectionDescriptor`](crate::addressing::ConnectionDescriptor),
//! these settings only tune how the connection is established.
use anyhow::Context;
use native_tls::Certificate;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

const DEFAULT_CONNECTION_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_HEARTBEAT_SECONDS: u16 = 30;

#[derive(Debug, Deserialize, Clone)]
/// Connection-level knobs for the RabbitMq client.
///
/// `ConnectionSettings::default()` works out of the box against a local RabbitMq
/// installation (e.g. launched via the official Docker image).
pub struct ConnectionSettings {
    /// How long you should wait when trying to connect to a RabbitMq broker before giving up,
    /// in seconds.
    #[serde(default)]
    pub connection_timeout_seconds: Option<u64>,
    /// The heartbeat interval negotiated with the broker, in seconds.
    ///
    /// A missed heartbeat is how a silently dropped TCP connection gets detected.
    #[serde(
        default = "default_heartbeat_seconds",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub heartbeat_seconds: u16,
    /// Configuration to establish an encrypted connection with the RabbitMq broker.
    /// Only used for `amqps://` URIs.
    #[serde(default)]
    pub tls: Option<RabbitMqTlsSettings>,
}

fn default_heartbeat_seconds() -> u16 {
    DEFAULT_HEARTBEAT_SECONDS
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_seconds: Some(DEFAULT_CONNECTION_TIMEOUT_SECONDS),
            heartbeat_seconds: DEFAULT_HEARTBEAT_SECONDS,
            tls: None,
        }
    }
}

impl ConnectionSettings {
    /// Retrieve the timeout observed when trying to connect to RabbitMq.
    /// Defaults to 10 seconds if left unspecified.
    pub fn connection_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.connection_timeout_seconds
                .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECONDS),
        )
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
/// Configuration to establish an encrypted connection with a RabbitMq broker.
pub struct RabbitMqTlsSettings {
    /// The domain we expect as CN on the server certificate.
    /// If left unspecified, it defaults to the uri host.
    pub domain: Option<String>,
    /// Root certificate chain to be trusted when validating server certificates.
    ///
    /// To be specified in PEM format.
    ///
    /// If set to `None`, the system's trust root will be used by default.
    ///
    /// ```text
    /// -----BEGIN CERTIFICATE-----
    /// <-- OMITTED -->
    /// -----END CERTIFICATE-----
    /// ```
    pub ca_certificate_chain_pem: Option<String>,
}

impl RabbitMqTlsSettings {
    /// It parses the CA certificate chain and returns it in the strongly-typed format
    /// provided by the `native_tls` crate.
    pub fn ca_certificate_chain(&self) -> Result<Option<Certificate>, anyhow::Error> {
        self.ca_certificate_chain_pem
            .as_ref()
            .map(String::as_bytes)
            .map(Certificate::from_pem)
            .transpose()
            .context("Failed to decode PEM certificate chain for RabbitMQ TLS.")
    }
}
