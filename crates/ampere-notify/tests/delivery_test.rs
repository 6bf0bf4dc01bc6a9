//! Delivery against a local mock HTTP destination

use std::sync::Arc;
use std::time::Duration;

use ampere_common::SUBSCRIPTION_HREF_HEADER;
use ampere_notify::{
    DeliveryAttempt, DeliveryOutcome, DeliveryWorker, InMemoryTaskQueue, NotificationTask,
    ReqwestTransport, RetryPolicy, TaskQueue, WorkerPool,
};
use bytes::Bytes;
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay_ms: 10,
        max_delay_ms: 50,
        multiplier: 2.0,
        jitter: 0.0,
    }
}

fn worker(max_attempts: u32, timeout: Duration) -> DeliveryWorker {
    let transport = ReqwestTransport::new(timeout).unwrap();
    DeliveryWorker::new(Arc::new(transport), fast_policy(max_attempts))
}

fn attempt(server: &MockServer) -> DeliveryAttempt {
    DeliveryAttempt {
        destination: format!("{}/notify", server.uri()),
        payload: Bytes::from_static(br#"{"resource":{"all":1}}"#),
        subscription_href: "/edev/3/sub/7".to_string(),
        attempt: 1,
    }
}

#[tokio::test]
async fn test_delivered_with_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(header(SUBSCRIPTION_HREF_HEADER, "/edev/3/sub/7"))
        .and(header("content-type", "application/json"))
        .and(body_bytes(br#"{"resource":{"all":1}}"#.to_vec()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = worker(3, Duration::from_secs(5))
        .attempt(&attempt(&server))
        .await;
    assert_eq!(outcome, DeliveryOutcome::Delivered { status: 201 });
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = worker(3, Duration::from_secs(5))
        .attempt(&attempt(&server))
        .await;
    assert_eq!(outcome, DeliveryOutcome::Rejected { status: Some(404) });
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(
            ResponseTemplate::new(307).insert_header("location", "/elsewhere"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = worker(3, Duration::from_secs(5))
        .attempt(&attempt(&server))
        .await;
    assert_eq!(outcome, DeliveryOutcome::Rejected { status: Some(307) });
}

#[tokio::test]
async fn test_timeout_schedules_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let outcome = worker(3, Duration::from_millis(100))
        .attempt(&attempt(&server))
        .await;
    match outcome {
        DeliveryOutcome::Retry { next, delay } => {
            assert_eq!(next.attempt, 2);
            assert_eq!(delay, Duration::from_millis(10));
        }
        other => panic!("expected retry, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_destination_is_abandoned_at_ceiling() {
    // Nothing listens on the discard port
    let mut last = DeliveryAttempt {
        destination: "http://127.0.0.1:9/notify".to_string(),
        payload: Bytes::from_static(b"{}"),
        subscription_href: "/sub/1".to_string(),
        attempt: 1,
    };
    let worker = worker(2, Duration::from_secs(2));

    let first = worker.attempt(&last).await;
    if let DeliveryOutcome::Retry { next, .. } = first {
        last = next;
    } else {
        panic!("expected retry, got {:?}", first);
    }
    assert_eq!(worker.attempt(&last).await, DeliveryOutcome::Abandoned);
}

#[tokio::test]
async fn test_pool_retries_until_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let queue = Arc::new(InMemoryTaskQueue::new(16));
    let pool = WorkerPool::start(
        2,
        queue.clone(),
        Arc::new(worker(3, Duration::from_secs(5))),
    );
    queue
        .enqueue(NotificationTask::Transmit(attempt(&server)), None)
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= 3 || tokio::time::Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    queue.close();
    pool.shutdown(Duration::from_secs(1)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
