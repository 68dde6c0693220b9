use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carrot_rpc::amqp::BasicProperties;
use carrot_rpc::host::{Application, Host};
use carrot_rpc::messages::{RequestPacket, ResponsePacket};
use carrot_rpc::subscriber::{SubscriberError, SubscriberSettings};
use shutdown_handler::ShutdownHandler;
use tokio::sync::Mutex;

use crate::helpers::{eventually, get_subscriber, request, FakeBroker};

struct Echo;

#[async_trait]
impl Application for Echo {
    async fn process(&self, request: &RequestPacket) -> Result<ResponsePacket, anyhow::Error> {
        Ok(ResponsePacket::new(200, "OK").with_body(request.resource.clone()))
    }
}

struct AlwaysFails;

#[async_trait]
impl Application for AlwaysFails {
    async fn process(&self, _request: &RequestPacket) -> Result<ResponsePacket, anyhow::Error> {
        Err(anyhow::anyhow!("Boom"))
    }
}

fn with_reply_to(reply_to: &str) -> BasicProperties {
    BasicProperties::default().with_reply_to(reply_to.to_owned().into())
}

#[tokio::test]
async fn the_host_answers_requests_until_shutdown() {
    // Arrange
    let broker = FakeBroker::new();
    let subscriber = Arc::new(get_subscriber(&broker, SubscriberSettings::default()));
    broker.publish("carrot.wq.echo", request("/hello"), with_reply_to("caller"));
    let shutdown = Arc::new(ShutdownHandler::new());

    // Act
    let handle = tokio::spawn(
        Host::new(Echo, Arc::clone(&subscriber)).run_until_shutdown(shutdown.clone()),
    );
    eventually(|| broker.published().len() == 1).await;
    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Assert
    let published = broker.published();
    assert_eq!(published[0].routing_key, "caller");
    let response = ResponsePacket::deserialize(&published[0].payload).unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, b"/hello");
    assert_eq!(broker.acks().len(), 1);

    assert!(subscriber.is_disposed());
    assert!(matches!(
        subscriber.dequeue().await,
        Err(SubscriberError::Disposed)
    ));
}

#[tokio::test]
async fn application_errors_become_internal_server_errors() {
    // Arrange
    let broker = FakeBroker::new();
    let subscriber = get_subscriber(&broker, SubscriberSettings::default());
    broker.publish("carrot.wq.echo", request("/boom"), with_reply_to("caller"));
    let shutdown = Arc::new(ShutdownHandler::new());

    // Act
    let handle = tokio::spawn(Host::new(AlwaysFails, subscriber).run_until_shutdown(shutdown.clone()));
    eventually(|| broker.published().len() == 1).await;
    shutdown.shutdown();
    handle.await.unwrap().unwrap();

    // Assert
    let response = ResponsePacket::deserialize(&broker.published()[0].payload).unwrap();
    assert_eq!(response.status_code, 500);
    assert_eq!(broker.acks().len(), 1);
}

#[tokio::test]
async fn the_host_waits_for_in_flight_requests_before_exiting() {
    struct Slow {
        completed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl Application for Slow {
        async fn process(&self, _request: &RequestPacket) -> Result<ResponsePacket, anyhow::Error> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            *self.completed.lock().await = true;
            Ok(ResponsePacket::new(200, "OK"))
        }
    }

    // Arrange
    let broker = FakeBroker::new();
    let subscriber = get_subscriber(&broker, SubscriberSettings::default());
    let completed = Arc::new(Mutex::new(false));
    broker.publish("carrot.wq.echo", request("/slow"), with_reply_to("caller"));
    let shutdown = Arc::new(ShutdownHandler::new());

    // Act
    let handle = tokio::spawn(
        Host::new(
            Slow {
                completed: Arc::clone(&completed),
            },
            subscriber,
        )
        .run_until_shutdown(shutdown.clone()),
    );
    eventually(|| broker.consumer_count("carrot.wq.echo") == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.shutdown();
    handle.await.unwrap().unwrap();

    // Assert
    assert!(*completed.lock().await);
    assert_eq!(broker.published().len(), 1);
}

#[tokio::test]
async fn the_host_keeps_serving_across_reconnections() {
    // Arrange
    let broker = FakeBroker::new();
    let subscriber = get_subscriber(&broker, SubscriberSettings::default());
    broker.publish("carrot.wq.echo", request("/one"), with_reply_to("caller"));
    let shutdown = Arc::new(ShutdownHandler::new());
    let handle = tokio::spawn(Host::new(Echo, subscriber).run_until_shutdown(shutdown.clone()));
    eventually(|| broker.published().len() == 1).await;

    // Act
    broker.kill_connections();
    broker.publish("carrot.wq.echo", request("/two"), with_reply_to("caller"));
    eventually(|| broker.published().len() == 2).await;
    shutdown.shutdown();
    handle.await.unwrap().unwrap();

    // Assert
    assert_eq!(broker.connection_attempts(), 2);
    let response = ResponsePacket::deserialize(&broker.published()[1].payload).unwrap();
    assert_eq!(response.body, b"/two");
}

#[tokio::test]
async fn a_message_that_cannot_be_rejected_does_not_stop_the_host() {
    // Arrange
    let broker = FakeBroker::new();
    let subscriber = Arc::new(get_subscriber(&broker, SubscriberSettings::default()));
    broker.fail_rejects();
    broker.publish("carrot.wq.echo", b"garbage".to_vec(), <_>::default());
    broker.publish("carrot.wq.echo", request("/valid"), with_reply_to("caller"));
    let shutdown = Arc::new(ShutdownHandler::new());

    // Act
    let handle = tokio::spawn(
        Host::new(Echo, Arc::clone(&subscriber)).run_until_shutdown(shutdown.clone()),
    );
    eventually(|| broker.published().len() == 1).await;
    assert!(!subscriber.is_disposed());
    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Assert
    let response = ResponsePacket::deserialize(&broker.published()[0].payload).unwrap();
    assert_eq!(response.body, b"/valid");
}
