use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use credit_common::Secret;
use credit_engine::{
    db_types::{NewTenant, OrderId},
    events::EventProducers,
    test_utils::prepare_env::{drop_database, fresh_database},
    traits::NoOrderSource,
    OrderLedger,
    OrphanAlerts,
    OrphanApi,
    SqliteDatabase,
    TenantGuardApi,
    TenantManagement,
    WebhookApi,
};
use serde_json::json;

use super::helpers::{send, TestResponse};
use crate::{
    helpers::calculate_hmac,
    middleware::{HmacMiddlewareFactory, HMAC_HEADER, SHOP_HEADER},
    routes::{ShopifyWebhookRoute, TOPIC_HEADER, WEBHOOK_ID_HEADER},
};

const SHOP: &str = "sqwad-demo.myshopify.com";
const SHOP_SECRET: &str = "shop-webhook-secret";
const GLOBAL_SECRET: &str = "global-webhook-secret";

fn configure(db: SqliteDatabase, checks: bool) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let orphans = OrphanApi::new(db.clone(), EventProducers::default());
        let guard = TenantGuardApi::new(db.clone(), orphans);
        let api = WebhookApi::new(db.clone(), guard, NoOrderSource);
        let scope = web::scope("/shopify")
            .wrap(HmacMiddlewareFactory::new(db, Secret::new(GLOBAL_SECRET.to_string()), checks))
            .service(ShopifyWebhookRoute::<SqliteDatabase, NoOrderSource>::new());
        cfg.service(scope).app_data(web::Data::new(api));
    }
}

async fn onboard(db: &SqliteDatabase, shop: &str, active: bool, secret: Option<&str>) {
    let tenant = NewTenant {
        shop_id: shop.to_string(),
        active,
        access_token: None,
        webhook_secret: secret.map(String::from),
    };
    db.upsert_tenant(&tenant).await.expect("Error creating tenant");
}

fn order_payload(id: u64) -> String {
    json!({
        "id": id,
        "admin_graphql_api_id": format!("gid://shopify/Order/{id}"),
        "name": format!("#{id}"),
        "email": "alice@example.com",
        "currency": "USD",
        "subtotal_price": "50.00",
        "total_price": "54.50",
        "financial_status": "pending",
        "note_attributes": [{ "name": "sqwad_credit_opt_in", "value": "true" }]
    })
    .to_string()
}

async fn deliver(db: &SqliteDatabase, shop: &str, body: &str, signature: Option<String>, checks: bool) -> TestResponse {
    let mut req = TestRequest::post()
        .uri("/shopify/webhook")
        .insert_header((TOPIC_HEADER, "orders/create"))
        .insert_header((SHOP_HEADER, shop))
        .insert_header((WEBHOOK_ID_HEADER, "delivery-1"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    if let Some(signature) = signature {
        req = req.insert_header((HMAC_HEADER, signature));
    }
    send(req, configure(db.clone(), checks)).await
}

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let (url, db) = fresh_database().await;
    onboard(&db, SHOP, true, Some(SHOP_SECRET)).await;
    let res = deliver(&db, SHOP, &order_payload(1001), None, true).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"], "Authentication Error. No HMAC signature found.");
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn bad_signatures_are_rejected() {
    let (url, db) = fresh_database().await;
    onboard(&db, SHOP, true, Some(SHOP_SECRET)).await;
    let body = order_payload(1001);
    // Signed with the global secret, but the shop has its own
    let signature = calculate_hmac(GLOBAL_SECRET, body.as_bytes());
    let res = deliver(&db, SHOP, &body, Some(signature), true).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"], "Authentication Error. Invalid HMAC signature.");
    // Signed correctly, but the body was tampered with
    let signature = calculate_hmac(SHOP_SECRET, body.as_bytes());
    let res = deliver(&db, SHOP, &order_payload(1002), Some(signature), true).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let order = db.fetch_order(SHOP, &OrderId::from_number(1002)).await.unwrap();
    assert!(order.is_none());
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn signed_webhook_is_ingested() {
    let (url, db) = fresh_database().await;
    onboard(&db, SHOP, true, Some(SHOP_SECRET)).await;
    let body = order_payload(1001);
    let signature = calculate_hmac(SHOP_SECRET, body.as_bytes());
    // Shop domains are case-insensitive
    let res = deliver(&db, "SQWAD-demo.myshopify.com", &body, Some(signature), true).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.json()["result"], "recorded");
    let order = db.fetch_order(SHOP, &OrderId::from_number(1001)).await.unwrap().expect("order stored");
    assert!(order.opt_in);
    assert!(!order.eligible_pending);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn global_secret_is_the_fallback() {
    let (url, db) = fresh_database().await;
    onboard(&db, SHOP, true, None).await;
    let body = order_payload(1001);
    let signature = calculate_hmac(GLOBAL_SECRET, body.as_bytes());
    let res = deliver(&db, SHOP, &body, Some(signature), true).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn inactive_shops_get_a_conflict_and_an_orphan_record() {
    let (url, db) = fresh_database().await;
    let ghost = "ghost-shop.myshopify.com";
    let body = order_payload(55);
    let signature = calculate_hmac(GLOBAL_SECRET, body.as_bytes());
    let res = deliver(&db, ghost, &body, Some(signature.clone()), true).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json()["error"], format!("Shop not onboarded/active: {ghost}"));
    // Offboarded shops are treated the same way
    onboard(&db, SHOP, false, None).await;
    let res = deliver(&db, SHOP, &body, Some(signature), true).await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    assert!(db.fetch_orphan(ghost, "55").await.unwrap().is_some());
    assert!(db.fetch_order(ghost, &OrderId::from_number(55)).await.unwrap().is_none());
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn undeliverable_payloads_are_acknowledged() {
    let (url, db) = fresh_database().await;
    onboard(&db, SHOP, true, Some(SHOP_SECRET)).await;
    for body in ["{ not json", r#"{"name": "no id here"}"#] {
        let signature = calculate_hmac(SHOP_SECRET, body.as_bytes());
        let res = deliver(&db, SHOP, body, Some(signature), true).await;
        assert_eq!(res.status, StatusCode::OK, "{body}");
        assert_eq!(res.json()["success"], false, "{body}");
    }
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn missing_topic_is_a_bad_request() {
    let (url, db) = fresh_database().await;
    onboard(&db, SHOP, true, Some(SHOP_SECRET)).await;
    let body = order_payload(1001);
    let req = TestRequest::post()
        .uri("/shopify/webhook")
        .insert_header((SHOP_HEADER, SHOP))
        .insert_header((HMAC_HEADER, calculate_hmac(SHOP_SECRET, body.as_bytes())))
        .set_payload(body);
    let res = send(req, configure(db.clone(), true)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn disabled_checks_let_everything_through() {
    let (url, db) = fresh_database().await;
    onboard(&db, SHOP, true, Some(SHOP_SECRET)).await;
    let res = deliver(&db, SHOP, &order_payload(1001), None, false).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    drop_database(&url, db).await;
}
