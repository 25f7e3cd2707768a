use serde_json::Value;

use super::WebhookTopic;
use crate::db_types::{IdentityError, OrderId};

const ORDER_GID_PREFIX: &str = "gid://shopify/Order/";

/// A scalar id field. Numbers and non-blank strings qualify.
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn numeric_candidates<'a>(topic: &WebhookTopic, payload: &'a Value) -> Vec<Option<&'a Value>> {
    let nested = payload.get("order").and_then(|o| o.get("id"));
    if topic.is_refund() {
        // `id` is the refund's own id on this topic
        vec![payload.get("order_id"), nested]
    } else {
        vec![payload.get("id"), payload.get("order_id"), nested]
    }
}

/// Extracts the canonical order id from a webhook payload.
///
/// An order-typed global id (`admin_graphql_api_id` or `admin_graphql_id`) wins. Failing that, the first numeric id
/// field is used. Global ids of other resources, such as refunds, are skipped.
pub fn order_identity(topic: &WebhookTopic, payload: &Value) -> Result<OrderId, IdentityError> {
    let gid = ["admin_graphql_api_id", "admin_graphql_id"]
        .into_iter()
        .filter_map(|k| payload.get(k).and_then(Value::as_str))
        .find(|s| s.starts_with(ORDER_GID_PREFIX));
    if let Some(gid) = gid {
        return gid.parse();
    }
    match numeric_candidates(topic, payload).into_iter().find_map(scalar) {
        Some(id) => id.parse(),
        None => Err(IdentityError::Missing),
    }
}

/// Like [`order_identity`], but never fails. Used to label orphan alerts, where a raw id is better than none.
pub fn best_effort_order_id(topic: &WebhookTopic, payload: &Value) -> Option<String> {
    if let Ok(id) = order_identity(topic, payload) {
        return Some(id.to_string());
    }
    numeric_candidates(topic, payload).into_iter().find_map(scalar)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn id(topic: WebhookTopic, payload: Value) -> Result<String, IdentityError> {
        order_identity(&topic, &payload).map(|i| i.to_string())
    }

    #[test]
    fn gid_is_preferred() {
        let p = json!({"id": 1, "admin_graphql_api_id": "gid://shopify/Order/1001"});
        assert_eq!(id(WebhookTopic::OrdersPaid, p).unwrap(), "1001");
        let p = json!({"admin_graphql_id": "gid://shopify/Order/7"});
        assert_eq!(id(WebhookTopic::OrdersCreate, p).unwrap(), "7");
    }

    #[test]
    fn numeric_fallbacks() {
        assert_eq!(id(WebhookTopic::OrdersCreate, json!({"id": 1001})).unwrap(), "1001");
        assert_eq!(id(WebhookTopic::OrdersCreate, json!({"order_id": "1002"})).unwrap(), "1002");
        assert_eq!(id(WebhookTopic::OrdersCreate, json!({"order": {"id": 1003}})).unwrap(), "1003");
    }

    #[test]
    fn refunds_use_the_order_id() {
        let p = json!({"id": 9, "order_id": 1001, "admin_graphql_api_id": "gid://shopify/Refund/9"});
        assert_eq!(id(WebhookTopic::RefundsCreate, p).unwrap(), "1001");
        assert_eq!(id(WebhookTopic::RefundsCreate, json!({"id": 9})), Err(IdentityError::Missing));
    }

    #[test]
    fn missing_and_malformed() {
        assert_eq!(id(WebhookTopic::OrdersPaid, json!({})), Err(IdentityError::Missing));
        assert_eq!(id(WebhookTopic::OrdersPaid, json!({"id": "  "})), Err(IdentityError::Missing));
        assert!(matches!(id(WebhookTopic::OrdersPaid, json!({"id": "abc"})), Err(IdentityError::Malformed(_))));
    }

    #[test]
    fn best_effort_keeps_raw_ids() {
        let topic = WebhookTopic::Other("orders/edited".into());
        assert_eq!(best_effort_order_id(&topic, &json!({"id": "55"})).as_deref(), Some("55"));
        assert_eq!(best_effort_order_id(&topic, &json!({"id": "ord-55"})).as_deref(), Some("ord-55"));
        assert_eq!(best_effort_order_id(&topic, &json!({"name": "#55"})), None);
    }
}
