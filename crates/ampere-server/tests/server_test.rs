//! HTTP trigger through to delivery against a mock aggregator

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, http::StatusCode, test, web};
use ampere_common::{ResourceKind, SUBSCRIPTION_HREF_HEADER};
use ampere_notify::{
    DeliveryWorker, DispatchEngine, InMemoryTaskQueue, ReqwestTransport, RetryPolicy, WorkerPool,
};
use ampere_persistence::entity::{site, subscription};
use ampere_persistence::{ExternalDbPersistService, create_schema};
use ampere_server::{AppState, api};
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn batch_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_717_000_000, 0).unwrap()
}

async fn seed(notification_uri: String) -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    create_schema(&db).await.unwrap();

    for site_id in [1, 2, 3] {
        site::ActiveModel {
            site_id: Set(site_id),
            aggregator_id: Set(7),
            nmi: Set(Some(format!("NMI{}", site_id))),
            lfdi: Set(format!("lfdi-{}", site_id)),
            sfdi: Set(site_id),
            device_category: Set(0),
            timezone_id: Set("Australia/Brisbane".to_string()),
            created_time: Set(batch_time()),
            changed_time: Set(batch_time()),
        }
        .insert(&db)
        .await
        .unwrap();
    }

    subscription::ActiveModel {
        subscription_id: Set(5),
        aggregator_id: Set(7),
        changed_time: Set(batch_time()),
        resource_type: Set(ResourceKind::Site.code()),
        scoped_site_id: Set(None),
        notification_uri: Set(notification_uri),
        entity_limit: Set(2),
    }
    .insert(&db)
    .await
    .unwrap();

    db
}

#[actix_web::test]
async fn test_trigger_delivers_every_page() {
    let aggregator = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(header(SUBSCRIPTION_HREF_HEADER, "/sub/5"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&aggregator)
        .await;

    let db = seed(format!("{}/notify", aggregator.uri())).await;
    let persistence = Arc::new(ExternalDbPersistService::new(db));
    let queue = Arc::new(InMemoryTaskQueue::new(16));
    let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(5)).unwrap());
    let policy = RetryPolicy {
        max_attempts: 2,
        initial_delay_ms: 10,
        max_delay_ms: 10,
        multiplier: 1.0,
        jitter: 0.0,
    };
    let pool = WorkerPool::start(
        2,
        queue.clone(),
        Arc::new(DeliveryWorker::new(transport, policy)),
    );

    let state = Arc::new(AppState {
        persistence: persistence.clone(),
        dispatch: Arc::new(DispatchEngine::new(persistence, queue.clone())),
        prometheus: None,
    });
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(state))
            .configure(api::routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/v1/notify")
        .set_json(serde_json::json!({
            "resourceKind": "site",
            "timestamp": batch_time().to_rfc3339(),
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["enqueued"], 2);

    let mut received = Vec::new();
    for _ in 0..100 {
        received = aggregator.received_requests().await.unwrap_or_default();
        if received.len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(received.len(), 2);

    let mut item_counts: Vec<u64> = received
        .iter()
        .map(|request| {
            let json: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            assert_eq!(json["subscriptionHref"], "/sub/5");
            json["resource"]["all"].as_u64().unwrap()
        })
        .collect();
    item_counts.sort();
    assert_eq!(item_counts, vec![1, 2]);

    queue.close();
    pool.shutdown(Duration::from_secs(1)).await;
}
