use credit_common::Amount;
use credit_engine::{
    db_types::{FinancialStatus, OrderId, OrderPatch, UpsertOutcome},
    LedgerApi,
    RegisterOptions,
};

use crate::support::{TestDb, GAME, SHOP};

mod support;

#[tokio::test]
async fn upsert_merges_without_erasing() {
    let test = TestDb::with_active_game().await;
    let api = LedgerApi::new(test.db.clone());
    let id = OrderId::from_number(1001);
    let first = OrderPatch { customer_email: Some("alice@example.com".into()), ..Default::default() }.with_amounts(
        "USD",
        Amount::from_cents(5000),
        Amount::from_cents(5450),
    );
    assert_eq!(api.upsert(SHOP, &id, Some(GAME), &first).await.unwrap(), UpsertOutcome::Created);

    let second = OrderPatch::default().with_financial_status(FinancialStatus::Paid);
    assert_eq!(api.upsert(SHOP, &id, None, &second).await.unwrap(), UpsertOutcome::Updated);

    let order = api.get(SHOP, &id).await.unwrap().expect("order exists");
    assert_eq!(order.customer_email.as_deref(), Some("alice@example.com"));
    assert_eq!(order.subtotal, Some(Amount::from_cents(5000)));
    assert_eq!(order.financial_status, Some(FinancialStatus::Paid));
    assert_eq!(order.game_id.as_deref(), Some(GAME));
    assert_eq!(order.order_gid, "gid://shopify/Order/1001");
    assert!(!order.credited);
    test.tear_down().await;
}

#[tokio::test]
async fn update_without_context_does_not_create() {
    let test = TestDb::with_active_game().await;
    let api = LedgerApi::new(test.db.clone());
    let id = OrderId::from_number(2002);
    let patch = OrderPatch::default().with_financial_status(FinancialStatus::Refunded);
    assert_eq!(api.upsert(SHOP, &id, None, &patch).await.unwrap(), UpsertOutcome::Skipped);
    assert!(api.get(SHOP, &id).await.unwrap().is_none());
    test.tear_down().await;
}

#[tokio::test]
async fn both_identity_forms_reach_the_same_record() {
    let test = TestDb::with_active_game().await;
    let api = LedgerApi::new(test.db.clone());
    let numeric = "1001".parse::<OrderId>().unwrap();
    let global = "gid://shopify/Order/1001".parse::<OrderId>().unwrap();
    let patch = OrderPatch { order_name: Some("#1001".into()), ..Default::default() };
    api.upsert(SHOP, &numeric, Some(GAME), &patch).await.unwrap();
    let patch = OrderPatch::default().with_eligible_pending(true);
    assert_eq!(api.upsert(SHOP, &global, None, &patch).await.unwrap(), UpsertOutcome::Updated);
    let order = api.get(SHOP, &numeric).await.unwrap().unwrap();
    assert_eq!(order.order_name.as_deref(), Some("#1001"));
    assert!(order.eligible_pending);
    test.tear_down().await;
}

#[tokio::test]
async fn unregistering_clears_eligibility_by_default() {
    let test = TestDb::with_active_game().await;
    let api = LedgerApi::new(test.db.clone());
    let id = test.eligible_order(3003, "pred-1", "40.00").await;

    assert!(api.mark_registered(SHOP, &id, true, RegisterOptions::default()).await.unwrap());
    let order = api.get(SHOP, &id).await.unwrap().unwrap();
    assert!(order.registered);
    assert!(order.eligible_pending);

    assert!(api.mark_registered(SHOP, &id, false, RegisterOptions::default()).await.unwrap());
    let order = api.get(SHOP, &id).await.unwrap().unwrap();
    assert!(!order.registered);
    assert!(!order.eligible_pending);

    let missing = OrderId::from_number(9);
    assert!(!api.mark_registered(SHOP, &missing, true, RegisterOptions::default()).await.unwrap());
    test.tear_down().await;
}

#[tokio::test]
async fn shops_do_not_share_orders() {
    let test = TestDb::with_active_game().await;
    let api = LedgerApi::new(test.db.clone());
    let id = test.eligible_order(1001, "pred-1", "40.00").await;
    assert!(api.get("other-shop.myshopify.com", &id).await.unwrap().is_none());
    test.tear_down().await;
}
