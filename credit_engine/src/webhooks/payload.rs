use chrono::{DateTime, Utc};
use credit_common::Amount;
use serde_json::Value;

use crate::db_types::{FinancialStatus, OrderId};

/// The body of an order-related webhook, with its canonical identity already resolved.
#[derive(Debug, Clone)]
pub struct OrderPayload {
    order_id: OrderId,
    raw: Value,
}

fn text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn amount(value: Option<&Value>) -> Option<Amount> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64().and_then(|f| Amount::try_from_f64(f).ok()),
        _ => None,
    }
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value.and_then(Value::as_str).and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|d| d.with_timezone(&Utc))
}

impl OrderPayload {
    pub fn new(order_id: OrderId, raw: Value) -> Self {
        Self { order_id, raw }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn name(&self) -> Option<String> {
        text(self.raw.get("name"))
    }

    /// The customer's global id. Payloads carry either the numeric id or the gid.
    pub fn customer_id(&self) -> Option<String> {
        let customer = self.raw.get("customer")?;
        if let Some(gid) = text(customer.get("admin_graphql_api_id")) {
            return Some(gid);
        }
        match customer.get("id")? {
            Value::Number(n) => Some(format!("gid://shopify/Customer/{n}")),
            Value::String(s) if s.starts_with("gid://") => Some(s.clone()),
            Value::String(s) if !s.trim().is_empty() => Some(format!("gid://shopify/Customer/{}", s.trim())),
            _ => None,
        }
    }

    pub fn email(&self) -> Option<String> {
        text(self.raw.get("email"))
            .or_else(|| text(self.raw.get("contact_email")))
            .or_else(|| text(self.raw.get("customer").and_then(|c| c.get("email"))))
    }

    pub fn currency(&self) -> Option<String> {
        text(self.raw.get("currency")).or_else(|| text(self.raw.get("presentment_currency")))
    }

    pub fn subtotal_price(&self) -> Option<Amount> {
        amount(self.raw.get("subtotal_price"))
    }

    pub fn total_price(&self) -> Option<Amount> {
        amount(self.raw.get("total_price"))
    }

    pub fn financial_status(&self) -> Option<FinancialStatus> {
        text(self.raw.get("financial_status")).map(|s| FinancialStatus::from(s.as_str()))
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.raw.get("cancelled_at"))
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.raw.get("created_at"))
    }

    /// Checkout note attributes as (name, value) pairs. Older payloads use `key` instead of `name`.
    pub fn note_attributes(&self) -> Vec<(String, String)> {
        let Some(attrs) = self.raw.get("note_attributes").and_then(Value::as_array) else {
            return Vec::new();
        };
        attrs
            .iter()
            .filter_map(|a| {
                let key = text(a.get("name")).or_else(|| text(a.get("key")))?;
                let value = match a.get("value") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(v) => v.to_string(),
                };
                Some((key, value))
            })
            .collect()
    }

    pub fn note_attribute(&self, key: &str) -> Option<String> {
        self.note_attributes().into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}
