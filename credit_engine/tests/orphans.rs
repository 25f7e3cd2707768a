use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration as StdDuration,
};

use chrono::{Duration, Utc};
use credit_engine::{
    db_types::NewTenant,
    events::{EventHandlers, EventHooks, EventProducers},
    webhooks::WebhookTopic,
    OrphanAlerts,
    OrphanApi,
    TenantApi,
    TenantGuardApi,
};
use serde_json::json;

use crate::support::TestDb;

mod support;

const GHOST: &str = "ghost-shop.myshopify.com";

#[tokio::test]
async fn one_alert_per_order() {
    let test = TestDb::new().await;
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let mut hooks = EventHooks::default();
    hooks.on_orphan_order(move |ev| {
        assert_eq!(ev.order_id, "1001");
        counter.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let api = OrphanApi::new(test.db.clone(), producers);

    assert!(api.record_once(GHOST, "orders/create", "1001", "d-1").await.unwrap());
    assert!(!api.record_once(GHOST, "orders/paid", "1001", "d-2").await.unwrap());
    assert!(!api.record_once(GHOST, "orders/paid", "1001", "d-3").await.unwrap());
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    let record = api.fetch(GHOST, "1001").await.unwrap().expect("orphan recorded");
    assert_eq!(record.topics, vec!["orders/create", "orders/paid"]);
    assert_eq!(record.first_delivery_id, "d-1");
    assert!(record.last_seen_at >= record.first_seen_at);
    test.tear_down().await;
}

#[tokio::test]
async fn expired_records_start_over() {
    let test = TestDb::new().await;
    let now = Utc::now();
    let expired = now - Duration::minutes(1);
    let first = test.db.record_orphan_sighting(GHOST, "7", "orders/create", "d-1", now - Duration::days(31), expired);
    assert!(first.await.unwrap().first_sighting);

    let api = OrphanApi::new(test.db.clone(), EventProducers::default());
    assert!(api.record_once(GHOST, "orders/paid", "7", "d-2").await.unwrap());
    let record = api.fetch(GHOST, "7").await.unwrap().unwrap();
    assert_eq!(record.topics, vec!["orders/paid"]);
    assert_eq!(record.first_delivery_id, "d-2");
    test.tear_down().await;
}

#[tokio::test]
async fn pruning_removes_only_expired_records() {
    let test = TestDb::new().await;
    let now = Utc::now();
    test.db.record_orphan_sighting(GHOST, "1", "orders/create", "d-1", now, now - Duration::seconds(1)).await.unwrap();
    test.db.record_orphan_sighting(GHOST, "2", "orders/create", "d-2", now, now + Duration::days(30)).await.unwrap();
    let api = OrphanApi::new(test.db.clone(), EventProducers::default());
    assert_eq!(api.prune_expired().await.unwrap(), 1);
    assert!(api.fetch(GHOST, "1").await.unwrap().is_none());
    assert!(api.fetch(GHOST, "2").await.unwrap().is_some());
    test.tear_down().await;
}

#[tokio::test]
async fn guard_rejects_inactive_shops() {
    let test = TestDb::new().await;
    test.activate("live-shop.myshopify.com").await;
    let orphans = OrphanApi::new(test.db.clone(), EventProducers::default());
    let guard = TenantGuardApi::new(test.db.clone(), orphans.clone());
    let topic = "orders/paid".into();
    let payload = json!({ "id": 55, "admin_graphql_api_id": "gid://shopify/Order/55" });

    assert!(guard.ensure_active("live-shop.myshopify.com", &topic, &payload, Some("d-1")).await.is_ok());
    assert!(orphans.fetch("live-shop.myshopify.com", "55").await.unwrap().is_none());

    let err = guard.ensure_active(GHOST, &topic, &payload, Some("d-1")).await.unwrap_err();
    assert_eq!(err.to_string(), format!("Shop not onboarded/active: {GHOST}"));
    let record = orphans.fetch(GHOST, "55").await.unwrap().expect("orphan recorded");
    assert_eq!(record.topics, vec!["orders/paid"]);

    let no_id = json!({ "note": "nothing here" });
    assert!(guard.ensure_active(GHOST, &topic, &no_id, None).await.is_err());
    test.tear_down().await;
}

#[tokio::test]
async fn offboarded_shops_are_guarded() {
    let test = TestDb::new().await;
    let tenants = TenantApi::new(test.db.clone());
    let shop = "leaving.myshopify.com";
    let onboard = NewTenant { shop_id: shop.into(), active: true, access_token: None, webhook_secret: None };
    assert!(tenants.upsert_tenant(&onboard).await.unwrap().active);
    let guard = TenantGuardApi::new(test.db.clone(), OrphanApi::new(test.db.clone(), EventProducers::default()));
    let topic = "orders/create".into();
    let payload = json!({ "id": 77 });
    assert!(guard.ensure_active(shop, &topic, &payload, Some("d-1")).await.is_ok());

    let offboard = NewTenant { active: false, ..onboard };
    let tenant = tenants.upsert_tenant(&offboard).await.unwrap();
    assert!(!tenant.active);
    assert!(guard.ensure_active(shop, &topic, &payload, Some("d-2")).await.is_err());
    assert!(tenants.fetch_tenant("unknown.myshopify.com").await.unwrap().is_none());

    let nameless = NewTenant { shop_id: "  ".into(), active: true, access_token: None, webhook_secret: None };
    assert!(tenants.upsert_tenant(&nameless).await.is_err());
    test.tear_down().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_raise_one_alert() {
    let test = TestDb::new().await;
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let mut hooks = EventHooks::default();
    hooks.on_orphan_order(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let guard = TenantGuardApi::new(test.db.clone(), OrphanApi::new(test.db.clone(), producers.clone()));
    let topics = ["orders/create", "orders/paid", "orders/updated", "orders/cancelled"];
    let payload = json!({ "id": 88, "admin_graphql_api_id": "gid://shopify/Order/88" });
    let deliveries = (0..8).map(|n| {
        let (guard, payload) = (&guard, &payload);
        async move {
            let topic: WebhookTopic = topics[n % topics.len()].into();
            let delivery_id = format!("d-{n}");
            guard.ensure_active(GHOST, &topic, payload, Some(delivery_id.as_str())).await
        }
    });
    let results = futures_util::future::join_all(deliveries).await;
    assert!(results.iter().all(|r| r.is_err()));
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    let orphans = OrphanApi::new(test.db.clone(), producers);
    let record = orphans.fetch(GHOST, "88").await.unwrap().expect("orphan recorded");
    let mut seen = record.topics.clone();
    seen.sort();
    let mut expected = topics.map(String::from).to_vec();
    expected.sort();
    assert_eq!(seen, expected);
    test.tear_down().await;
}
