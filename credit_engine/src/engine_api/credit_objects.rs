use credit_common::Amount;
use serde::{Deserialize, Serialize};

use crate::db_types::{CreditMode, OrderId, OrderRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountBasis {
    #[default]
    Subtotal,
    Total,
}

/// How much to credit for an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRule {
    #[serde(default)]
    pub basis: AmountBasis,
    /// Orders below this amount are skipped. Ignored unless positive.
    #[serde(default)]
    pub min_spend: Option<Amount>,
    /// The credit never exceeds this amount. Ignored unless positive.
    #[serde(default)]
    pub cap: Option<Amount>,
}

impl AmountRule {
    pub fn basis_of(&self, order: &OrderRecord) -> Option<Amount> {
        match self.basis {
            AmountBasis::Subtotal => order.subtotal,
            AmountBasis::Total => order.total,
        }
    }

    /// The credit amount for `base`, or the reason no credit is due.
    pub fn apply(&self, base: Option<Amount>) -> Result<Amount, String> {
        let amount = base.unwrap_or(Amount::ZERO);
        if let Some(min) = self.min_spend.filter(Amount::is_positive) {
            if amount < min {
                return Err(format!("Below minimum spend of {min}"));
            }
        }
        let amount = match self.cap.filter(Amount::is_positive) {
            Some(cap) if amount > cap => cap,
            _ => amount,
        };
        if amount.is_positive() {
            Ok(amount)
        } else {
            Err("Nothing to credit".to_string())
        }
    }
}

/// Options shared by both credit paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditOptions {
    #[serde(default)]
    pub mode: CreditMode,
    #[serde(flatten)]
    pub amounts: AmountRule,
    /// Orders placed more recently than this many hours ago are left for a later run.
    #[serde(default)]
    pub wait_hours: Option<f64>,
    /// ISO-8601 expiry for store credit
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Credit every eligible order whose prediction won `event_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnersRequest {
    pub shop_id: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(flatten)]
    pub options: CreditOptions,
}

/// One operator-selected order. Every field is optional on the wire so that a bad entry is reported as a per-item
/// failure instead of rejecting the whole request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualCreditEntry {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subtotal: Option<Amount>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualCreditRequest {
    pub shop_id: String,
    pub orders: Vec<ManualCreditEntry>,
    #[serde(flatten)]
    pub options: CreditOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreditRequest {
    Manual(ManualCreditRequest),
    Winners(WinnersRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreditOutcome {
    #[serde(rename_all = "camelCase")]
    Issued { amount: Amount, currency: String, external_ref: String },
    /// Dry-run result: what would have been attempted
    #[serde(rename_all = "camelCase")]
    WouldIssue { amount: Amount, currency: Option<String> },
    Skipped { reason: String },
    AlreadyCredited,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditItem {
    pub order_id: String,
    #[serde(flatten)]
    pub outcome: CreditOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditFailureItem {
    pub order_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditReport {
    pub ok: bool,
    pub credited: usize,
    pub skipped: usize,
    pub already_credited: usize,
    pub failures: Vec<CreditFailureItem>,
    pub items: Vec<CreditItem>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_eligible: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CreditReport {
    pub fn new(dry_run: bool) -> Self {
        Self { ok: true, dry_run, ..Default::default() }
    }

    /// A report that rejects the whole request with a single itemized failure.
    pub fn rejected(order_id: &str, error: &str) -> Self {
        let failure = CreditFailureItem { order_id: order_id.to_string(), error: error.to_string() };
        Self { ok: false, failures: vec![failure], ..Default::default() }
    }

    pub fn push(&mut self, order_id: &str, outcome: CreditOutcome) {
        match &outcome {
            CreditOutcome::Issued { .. } | CreditOutcome::WouldIssue { .. } => self.credited += 1,
            CreditOutcome::Skipped { .. } => self.skipped += 1,
            CreditOutcome::AlreadyCredited => self.already_credited += 1,
            CreditOutcome::Failed { reason } => self
                .failures
                .push(CreditFailureItem { order_id: order_id.to_string(), error: reason.clone() }),
        }
        self.items.push(CreditItem { order_id: order_id.to_string(), outcome });
    }
}

/// A credit candidate: the order as the engine will see it, the amount, and the idempotency key.
#[derive(Debug, Clone)]
pub struct CreditCandidate {
    pub order: OrderRecord,
    pub amount: Amount,
    pub idempotency_key: String,
    pub require_eligible: bool,
}

impl CreditCandidate {
    pub fn order_id(&self) -> &OrderId {
        &self.order.order_id
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rule(min: Option<i64>, cap: Option<i64>) -> AmountRule {
        AmountRule {
            basis: AmountBasis::Subtotal,
            min_spend: min.map(Amount::from_whole_units),
            cap: cap.map(Amount::from_whole_units),
        }
    }

    #[test]
    fn cap_truncates() {
        let amount = rule(Some(10), Some(40)).apply(Some(Amount::from_whole_units(50))).unwrap();
        assert_eq!(amount, Amount::from_whole_units(40));
    }

    #[test]
    fn floor_skips() {
        let reason = rule(Some(10), Some(40)).apply(Some(Amount::from_cents(999))).unwrap_err();
        assert_eq!(reason, "Below minimum spend of 10.00");
        assert!(rule(Some(10), None).apply(Some(Amount::from_whole_units(10))).is_ok());
    }

    #[test]
    fn non_positive_skips() {
        assert!(rule(None, None).apply(None).is_err());
        assert!(rule(None, None).apply(Some(Amount::ZERO)).is_err());
        assert!(rule(None, None).apply(Some(Amount::from_cents(-100))).is_err());
    }

    #[test]
    fn zero_limits_are_ignored() {
        let amount = rule(Some(0), Some(0)).apply(Some(Amount::from_cents(1234))).unwrap();
        assert_eq!(amount, Amount::from_cents(1234));
    }

    #[test]
    fn requests_deserialize_by_shape() {
        let winners: CreditRequest = serde_json::from_str(
            r#"{"shopId": "s", "eventId": "ev-1", "mode": "gift_card", "basis": "total", "cap": 40, "minSpend": "10"}"#,
        )
        .unwrap();
        let CreditRequest::Winners(w) = winners else { panic!("expected the winners shape") };
        assert_eq!(w.options.mode, CreditMode::GiftCard);
        assert_eq!(w.options.amounts.basis, AmountBasis::Total);
        assert_eq!(w.options.amounts.cap, Some(Amount::from_whole_units(40)));
        assert!(!w.options.dry_run);

        let manual: CreditRequest = serde_json::from_str(
            r#"{
                "shopId": "s",
                "dryRun": true,
                "orders": [{"orderId": "1001", "email": "a@b.c", "subtotal": 50, "currencyCode": "USD"}]
            }"#,
        )
        .unwrap();
        let CreditRequest::Manual(m) = manual else { panic!("expected the manual shape") };
        assert!(m.options.dry_run);
        assert_eq!(m.orders[0].subtotal, Some(Amount::from_whole_units(50)));
    }

    #[test]
    fn outcomes_serialize_with_a_status_tag() {
        let item = CreditItem {
            order_id: "1001".into(),
            outcome: CreditOutcome::Issued {
                amount: Amount::from_whole_units(40),
                currency: "USD".into(),
                external_ref: "gid://shopify/StoreCreditAccountTransaction/1".into(),
            },
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "issued");
        assert_eq!(json["amount"], "40.00");
        assert_eq!(json["externalRef"], "gid://shopify/StoreCreditAccountTransaction/1");
        assert_eq!(json["orderId"], "1001");
    }
}
