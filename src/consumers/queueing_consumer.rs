use crate::consumers::Delivery;
use crate::transport::{self, BrokerChannel};
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};
use uuid::Uuid;

type Buffer = Mutex<VecDeque<Delivery>>;

/// A broker consumer registration whose deliveries are buffered for polling.
///
/// The broker pushes deliveries on its own schedule; a background task moves them into an
/// in-memory queue and raises the shared `item_queued` signal. The subscriber then pulls
/// from the queue with [`QueueingConsumer::try_dequeue`], which never waits.
///
/// Deliveries come out in the order the broker pushed them.
pub struct QueueingConsumer {
    /// The channel the consumer was registered on.
    /// Acks and rejects for buffered deliveries must go through it.
    channel: Arc<dyn BrokerChannel>,
    queue_name: String,
    consumer_tag: String,
    buffer: Arc<Buffer>,
    /// Fired when the delivery stream ends: the consumer was cancelled (server-side or by
    /// us) or its channel went away.
    cancelled: CancellationToken,
    pump: JoinHandle<()>,
}

impl QueueingConsumer {
    /// Register a consumer on `queue_name` and start buffering its deliveries.
    #[tracing::instrument(skip(channel, item_queued), name = "queueing_consumer_start")]
    pub async fn start(
        channel: Arc<dyn BrokerChannel>,
        queue_name: &str,
        no_ack: bool,
        item_queued: Arc<Notify>,
    ) -> Result<Self, transport::Error> {
        let consumer_tag = Uuid::new_v4().to_string();
        let mut deliveries = channel
            .basic_consume(queue_name, &consumer_tag, no_ack)
            .await?;

        let buffer: Arc<Buffer> = Arc::default();
        let cancelled = CancellationToken::new();

        let pump = tokio::spawn({
            let buffer = Arc::clone(&buffer);
            let cancelled = cancelled.clone();
            let queue_name = queue_name.to_owned();
            async move {
                while let Some(delivery) = deliveries.next().await {
                    match delivery {
                        Ok(delivery) => {
                            lock(&buffer).push_back(delivery);
                            item_queued.notify_one();
                        }
                        Err(e) => {
                            warn!(queue_name = %queue_name, "Consumer error: {}", e);
                            break;
                        }
                    }
                }
                debug!(queue_name = %queue_name, "Consumer stopped receiving deliveries");
                cancelled.cancel();
            }
        });

        Ok(Self {
            channel,
            queue_name: queue_name.to_owned(),
            consumer_tag,
            buffer,
            cancelled,
            pump,
        })
    }

    /// Pop the oldest buffered delivery, if any. Returns immediately.
    pub fn try_dequeue(&self) -> Option<Delivery> {
        lock(&self.buffer).pop_front()
    }

    /// Resolves once the consumer has stopped receiving deliveries.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancelled.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    /// The channel this consumer receives deliveries on.
    pub fn channel(&self) -> &Arc<dyn BrokerChannel> {
        &self.channel
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Ask the broker to stop pushing deliveries.
    ///
    /// Failures are logged and swallowed: this is only called while tearing things down.
    pub async fn cancel(&self) {
        if let Err(e) = self.channel.basic_cancel(&self.consumer_tag).await {
            debug!(queue_name = %self.queue_name, "Failed to cancel consumer: {}", e);
        }
    }
}

impl Drop for QueueingConsumer {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

fn lock(buffer: &Buffer) -> MutexGuard<'_, VecDeque<Delivery>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}
