use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

const DEFAULT_PREFETCH_COUNT: u16 = 50;
const DEFAULT_RECONNECT_INTERVAL_MILLIS: u64 = 100;

/// When deliveries are acknowledged to the broker.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckBehavior {
    /// The broker considers a delivery acknowledged as soon as it sends it.
    Automatic,
    /// Deliveries are acknowledged once their response has been handed to
    /// [`Subscriber::send_response`](super::Subscriber::send_response).
    #[default]
    Manual,
}

/// Tuning knobs for a [`Subscriber`](super::Subscriber).
///
/// Settings are moved into the subscriber they configure: clone them explicitly if two
/// subscribers need the same values.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriberSettings {
    /// Maximum number of unacknowledged deliveries per consumer.
    #[serde(default = "default_prefetch_count")]
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub prefetch_count: u16,
    #[serde(default)]
    pub ack_behavior: AckBehavior,
    /// Pause between two failed reconnection attempts.
    #[serde(default = "default_reconnect_interval_millis")]
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub reconnect_interval_millis: u64,
    /// Wait for the broker to confirm every published response.
    #[serde(default)]
    pub publisher_confirms: bool,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            prefetch_count: DEFAULT_PREFETCH_COUNT,
            ack_behavior: AckBehavior::default(),
            reconnect_interval_millis: DEFAULT_RECONNECT_INTERVAL_MILLIS,
            publisher_confirms: false,
        }
    }
}

impl SubscriberSettings {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_millis)
    }

    pub(crate) fn auto_ack(&self) -> bool {
        self.ack_behavior == AckBehavior::Automatic
    }
}

fn default_prefetch_count() -> u16 {
    DEFAULT_PREFETCH_COUNT
}

fn default_reconnect_interval_millis() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_MILLIS
}
