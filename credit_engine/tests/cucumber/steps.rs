use std::time::Duration;

use credit_common::Amount;
use credit_engine::{
    credit_objects::{AmountRule, CreditOptions, CreditRequest, WinnersRequest},
    db_types::{credit_key, CreditStatus, OrderId},
    CreditLedger,
    IngestError,
    OrderLedger,
};
use cucumber::{then, when};
use serde_json::json;

use crate::cucumber::CreditWorld;

#[when(expr = "order {int} is paid on {string} by {string} for {word} {word} predicting {string}")]
async fn order_paid(
    world: &mut CreditWorld,
    order: u64,
    shop_id: String,
    email: String,
    subtotal: String,
    currency: String,
    prediction_id: String,
) {
    let body = json!({
        "id": order,
        "admin_graphql_api_id": format!("gid://shopify/Order/{order}"),
        "name": format!("#{order}"),
        "email": email,
        "currency": currency,
        "subtotal_price": subtotal,
        "total_price": subtotal,
        "financial_status": "paid",
        "created_at": "2025-03-01T10:00:00Z",
        "note_attributes": [
            { "name": "sqwad_credit_opt_in", "value": "true" },
            { "name": "sqwad_predictionId", "value": prediction_id }
        ]
    });
    let delivery = format!("paid-{order}");
    let body = body.to_string();
    let api = &world.system().webhooks;
    api.ingest(&shop_id, "orders/paid", body.as_bytes(), Some(&delivery)).await.expect("Error ingesting webhook");
}

#[when(expr = "{string} is delivered to {string} for order {int}")]
async fn orphan_delivery(world: &mut CreditWorld, topic: String, shop_id: String, order: u64) {
    let gid = format!("gid://shopify/Order/{order}");
    let body = json!({ "id": order, "order_id": order, "admin_graphql_api_id": gid });
    let delivery = format!("{topic}-{order}");
    let api = &world.system().webhooks;
    let result = api.ingest(&shop_id, &topic, body.to_string().as_bytes(), Some(&delivery)).await;
    assert!(matches!(result, Err(IngestError::TenantInactive(_))), "Expected rejection, got {result:?}");
}

#[when(expr = "I credit the winners of {string} on {string} with a minimum spend of {int} and a cap of {int}")]
async fn credit_winners(world: &mut CreditWorld, event_id: String, shop_id: String, min_spend: i64, cap: i64) {
    let options = CreditOptions {
        amounts: AmountRule {
            min_spend: Some(Amount::from_whole_units(min_spend)),
            cap: Some(Amount::from_whole_units(cap)),
            ..Default::default()
        },
        ..Default::default()
    };
    let request = CreditRequest::Winners(WinnersRequest { shop_id, event_id, options });
    let report = world.system().credits.process(&request).await.expect("Error running credits");
    world.system_mut().last_report = Some(report);
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut CreditWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "order {int} on {string} is credited {word} {word}")]
async fn check_credit(world: &mut CreditWorld, order: u64, shop_id: String, amount: String, currency: String) {
    let order_id = OrderId::from_number(order);
    let db = &world.system().db;
    let credit = db.fetch_credit(&credit_key(&shop_id, &order_id)).await.unwrap().expect("No credit record");
    assert_eq!(credit.status, CreditStatus::Issued);
    assert_eq!(credit.amount, amount.parse::<Amount>().unwrap());
    assert_eq!(credit.currency.as_deref(), Some(currency.as_str()));
    let record = db.fetch_order(&shop_id, &order_id).await.unwrap().expect("Order is missing");
    assert!(record.credited, "Order is not marked as credited");
    assert!(!record.eligible_pending);
}

#[then(expr = "the credit report shows {int} credited")]
async fn check_report(world: &mut CreditWorld, credited: usize) {
    let report = world.system().last_report.as_ref().expect("No credit run");
    assert_eq!(report.credited, credited, "{report:?}");
}

#[then(expr = "the store received {int} credit request(s)")]
async fn check_gateway(world: &mut CreditWorld, count: usize) {
    assert_eq!(world.system().gateway.credit_calls(), count);
}

#[then(expr = "order {int} is not in the ledger of {string}")]
async fn check_not_stored(world: &mut CreditWorld, order: u64, shop_id: String) {
    let record = world.system().db.fetch_order(&shop_id, &OrderId::from_number(order)).await.unwrap();
    assert!(record.is_none());
}

#[then(expr = "the orphan record for order {int} on {string} has topics {string}")]
async fn check_orphan(world: &mut CreditWorld, order: u64, shop_id: String, topics: String) {
    let record = world.system().orphans.fetch(&shop_id, &order.to_string()).await.unwrap().expect("No orphan record");
    let expected = topics.split(',').map(str::trim).collect::<Vec<_>>();
    assert_eq!(record.topics, expected);
}

#[then(expr = "{int} orphan alert(s) was/were raised")]
async fn check_alerts(world: &mut CreditWorld, count: usize) {
    assert_eq!(world.system().alerts_raised(), count);
}
