//! Wire an [`Application`] to a [`Subscriber`].
//!
//! A [`Host`] pulls requests out of the subscriber, processes each of them on its own task
//! and hands the responses back for publication, until it is told to shut down.
use std::sync::Arc;

use futures_util::{stream::FuturesUnordered, FutureExt, StreamExt};
use shutdown_handler::ShutdownHandler;
use tracing::{error, info, warn};

use crate::messages::{RequestPacket, ResponsePacket};
use crate::subscriber::{MessageContext, Subscriber, SubscriberError};

/// The service logic: turn a request into a response.
///
/// Errors are not sent back as such: the caller receives a `500` response instead.
#[async_trait::async_trait]
pub trait Application: Send + Sync + 'static {
    async fn process(&self, request: &RequestPacket) -> Result<ResponsePacket, anyhow::Error>;
}

pub struct Host {
    application: Arc<dyn Application>,
    subscriber: Arc<Subscriber>,
}

impl Host {
    /// Serve `application` through `subscriber`.
    ///
    /// If `subscriber` is an `Arc` pointer already, it won't be "double-wrapped".
    pub fn new(application: impl Application, subscriber: impl Into<Arc<Subscriber>>) -> Self {
        Self {
            application: Arc::new(application),
            subscriber: subscriber.into(),
        }
    }

    /// Start the subscriber, if needed, and serve requests until SIGTERM.
    pub async fn run_until_sigterm(self) -> Result<(), anyhow::Error> {
        self.run_until_shutdown(ShutdownHandler::sigterm()?).await
    }

    /// Start the subscriber, if needed, and serve requests until:
    /// - the shutdown handler fires;
    /// - the subscriber is disposed;
    /// - the subscriber fails with an error it cannot recover from.
    ///
    /// A message that could not be rejected only costs the dequeue call that hit it.
    ///
    /// Requests in flight are always completed before the subscriber is disposed and this
    /// returns.
    #[tracing::instrument(skip_all, name = "host_run", fields(service_name = %self.subscriber.service_name()))]
    pub async fn run_until_shutdown(
        self,
        shutdown: Arc<ShutdownHandler>,
    ) -> Result<(), anyhow::Error> {
        match self.subscriber.start().await {
            Ok(()) | Err(SubscriberError::AlreadyStarted) => {}
            Err(SubscriberError::Disposed) => return Ok(()),
            // Dequeueing keeps reconnecting until the broker is reachable.
            Err(e) => warn!("Failed to start the subscriber: {:?}", e),
        }

        let mut in_flight = FuturesUnordered::new();

        let signal = shutdown.wait_for_signal().fuse();
        tokio::pin!(signal);

        let next_request = self.subscriber.dequeue().fuse();
        tokio::pin!(next_request);

        let result = loop {
            tokio::select! {
                biased;

                _ = &mut signal => {
                    info!("Host received shutdown event");
                    break Ok(());
                }

                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                    if let Err(e) = outcome {
                        error!("Request processing task failed: {}", e);
                    }
                }

                context = &mut next_request => {
                    match context {
                        Ok(context) => {
                            in_flight.push(tokio::spawn(Self::process(
                                Arc::clone(&self.application),
                                Arc::clone(&self.subscriber),
                                context,
                            )));
                            next_request.set(self.subscriber.dequeue().fuse());
                        }
                        Err(SubscriberError::Disposed) => break Ok(()),
                        Err(e @ SubscriberError::Scan { .. }) => {
                            error!("Skipping a message that could not be rejected: {}", e);
                            next_request.set(self.subscriber.dequeue().fuse());
                        }
                        Err(e) => {
                            error!("Failed to dequeue: {}", e);
                            break Err(anyhow::Error::from(e));
                        }
                    }
                }
            }
        };

        while in_flight.next().await.is_some() {}
        self.subscriber.dispose().await;
        result
    }

    #[tracing::instrument(
        name = "process_request",
        skip_all,
        fields(method = %context.request.method, resource = %context.request.resource),
        level = tracing::Level::DEBUG
    )]
    async fn process(
        application: Arc<dyn Application>,
        subscriber: Arc<Subscriber>,
        context: MessageContext,
    ) {
        let response = match application.process(&context.request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Application failed to process the request: {:?}", e);
                ResponsePacket::new(500, "Internal Server Error")
            }
        };
        if let Err(e) = subscriber.send_response(&context, response).await {
            error!("Failed to send the response: {}", e);
        }
    }
}
