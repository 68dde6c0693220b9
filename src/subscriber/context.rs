use std::sync::Arc;

use crate::consumers::{Delivery, QueueingConsumer};
use crate::messages::RequestPacket;

/// A delivery together with the consumer that received it.
///
/// Acknowledging a delivery must happen on the channel it arrived on: the consumer is
/// kept around so its channel can still be reached after a reconnection replaced it.
pub struct Dispatch {
    pub(crate) consumer: Arc<QueueingConsumer>,
    pub(crate) delivery: Delivery,
}

impl Dispatch {
    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    /// The queue the delivery was consumed from.
    pub fn queue_name(&self) -> &str {
        self.consumer.queue_name()
    }
}

/// A decoded request, with everything needed to answer it.
///
/// Not `Clone`: a delivery is settled once, by a single [`Subscriber::send_response`](super::Subscriber::send_response).
pub struct MessageContext {
    pub request: RequestPacket,
    /// Where the response should be published. `None` for fire-and-forget requests.
    pub reply_to: Option<String>,
    pub correlation_id: Option<String>,
    pub dispatch: Dispatch,
}

impl std::fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageContext")
            .field("request", &self.request)
            .field("reply_to", &self.reply_to)
            .field("correlation_id", &self.correlation_id)
            .field("queue_name", &self.dispatch.queue_name())
            .field("delivery_tag", &self.dispatch.delivery.delivery_tag)
            .finish()
    }
}
