use serde::Deserialize;
use uuid::Uuid;

/// Prefix of every subscriber queue, whatever the [`MessagingConfiguration`].
pub const SUBSCRIBER_QUEUE_PREFIX: &str = "carrot";

/// Routing key binding the work queue to the service exchange.
pub const WORK_QUEUE_ROUTING_KEY: &str = "";

const DEFAULT_NAME_PREFIX: &str = "carrot";

/// How exchange and work queue names are derived from a service name.
///
/// ```
/// use carrot_rpc::addressing::MessagingConfiguration;
///
/// let configuration = MessagingConfiguration::default();
/// assert_eq!(configuration.exchange_name("billing"), "carrot.ex.billing");
/// assert_eq!(configuration.work_queue_name("billing"), "carrot.wq.billing");
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessagingConfiguration {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    /// Whether the shared work queue survives a broker restart.
    #[serde(default)]
    pub durable_work_queue: bool,
}

impl Default for MessagingConfiguration {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            durable_work_queue: false,
        }
    }
}

fn default_name_prefix() -> String {
    DEFAULT_NAME_PREFIX.to_owned()
}

impl MessagingConfiguration {
    pub fn exchange_name(&self, service_name: &str) -> String {
        format!("{}.ex.{}", self.name_prefix, service_name)
    }

    pub fn work_queue_name(&self, service_name: &str) -> String {
        format!("{}.wq.{}", self.name_prefix, service_name)
    }
}

/// Name of the exclusive queue owned by one subscriber instance.
pub fn subscriber_queue_name(service_name: &str, subscriber_id: &str) -> String {
    format!("{SUBSCRIBER_QUEUE_PREFIX}.sq.{service_name}.{subscriber_id}")
}

/// Routing key binding a subscriber queue to the service exchange.
pub fn subscriber_queue_routing_key(subscriber_id: &str) -> &str {
    subscriber_id
}

/// A fresh subscriber instance id.
pub fn new_subscriber_id() -> String {
    Uuid::new_v4().simple().to_string()
}
