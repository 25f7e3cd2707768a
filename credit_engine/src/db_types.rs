use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use credit_common::Amount;
use log::error;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::{FromRow, Type};
use thiserror::Error;

const ORDER_GID_PREFIX: &str = "gid://shopify/Order/";

static ORDER_GID_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^gid://shopify/Order/(?P<id>\d+)(\?.*)?$").expect("static regex is valid")
});

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("The payload does not carry an order identity")]
    Missing,
    #[error("'{0}' is not a valid order identity")]
    Malformed(String),
}

/// The canonical identity of an order: the short numeric form of the Shopify order id.
///
/// Either the numeric form (`1001`) or the global form (`gid://shopify/Order/1001`) parse to the same value, so
/// webhook deliveries that carry either one converge on the same ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type)]
#[sqlx(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn from_number(id: u64) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The globally qualified form of this order id.
    pub fn gid(&self) -> String {
        format!("{ORDER_GID_PREFIX}{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdentityError::Missing);
        }
        if s.starts_with("gid://") {
            return ORDER_GID_REGEX
                .captures(s)
                .and_then(|c| c.name("id"))
                .map(|m| Self(m.as_str().to_string()))
                .ok_or_else(|| IdentityError::Malformed(s.to_string()));
        }
        if s.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(IdentityError::Malformed(s.to_string()))
        }
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for OrderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }
        match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Ok(Self::from_number(n)),
            RawId::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

//--------------------------------------   FinancialStatus     ---------------------------------------------------------
/// The order's financial status as reported by the store. Unrecognised values are kept as `Unknown` rather than
/// rejected, so a new status on the store side never blocks ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    Pending,
    Authorized,
    PartiallyPaid,
    Paid,
    PartiallyRefunded,
    Refunded,
    Voided,
    Expired,
    Cancelled,
    Unknown,
}

impl FinancialStatus {
    /// Statuses that take an order out of the eligibility pool for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Refunded | Self::Voided | Self::Cancelled | Self::Expired)
    }
}

impl FromStr for FinancialStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "authorized" => Ok(Self::Authorized),
            "partially_paid" => Ok(Self::PartiallyPaid),
            "paid" => Ok(Self::Paid),
            "partially_refunded" => Ok(Self::PartiallyRefunded),
            "refunded" => Ok(Self::Refunded),
            "voided" => Ok(Self::Voided),
            "expired" => Ok(Self::Expired),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid financial status: {s}"))),
        }
    }
}

impl From<&str> for FinancialStatus {
    fn from(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Unrecognised financial status: {value}. Storing it as unknown");
            FinancialStatus::Unknown
        })
    }
}

impl Display for FinancialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::PartiallyPaid => "partially_paid",
            Self::Paid => "paid",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
            Self::Voided => "voided",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(String);

//--------------------------------------     OrderRecord       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub shop_id: String,
    pub order_id: OrderId,
    pub order_gid: String,
    pub game_id: Option<String>,
    pub order_name: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub currency: Option<String>,
    pub subtotal: Option<Amount>,
    pub total: Option<Amount>,
    pub financial_status: Option<FinancialStatus>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub opt_in: bool,
    pub prediction_id: Option<String>,
    pub user_id: Option<String>,
    pub eligible_pending: bool,
    pub registered: bool,
    pub credited: bool,
    pub credit_error: Option<String>,
    /// When the store says the order was placed
    pub order_created_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A field-level patch for an [`OrderRecord`]. `None` means "leave the stored value alone"; only `Some` values
/// overwrite. There is deliberately no `credited` field: only the credit ledger may set it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub order_name: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub currency: Option<String>,
    pub subtotal: Option<Amount>,
    pub total: Option<Amount>,
    pub financial_status: Option<FinancialStatus>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub opt_in: Option<bool>,
    pub prediction_id: Option<String>,
    pub user_id: Option<String>,
    pub eligible_pending: Option<bool>,
    pub registered: Option<bool>,
    pub order_created_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    pub fn with_financial_status(mut self, status: FinancialStatus) -> Self {
        self.financial_status = Some(status);
        self
    }

    pub fn with_eligible_pending(mut self, pending: bool) -> Self {
        self.eligible_pending = Some(pending);
        self
    }

    pub fn with_registered(mut self, registered: bool) -> Self {
        self.registered = Some(registered);
        self
    }

    pub fn with_amounts(mut self, currency: &str, subtotal: Amount, total: Amount) -> Self {
        self.currency = Some(currency.to_string());
        self.subtotal = Some(subtotal);
        self.total = Some(total);
        self
    }

    pub fn with_customer(mut self, customer_id: Option<String>, email: Option<String>) -> Self {
        self.customer_id = customer_id;
        self.customer_email = email;
        self
    }

    pub fn with_prediction(mut self, opt_in: bool, prediction_id: Option<String>, user_id: Option<String>) -> Self {
        self.opt_in = Some(opt_in);
        self.prediction_id = prediction_id;
        self.user_id = user_id;
        self
    }

    /// Fills every field that is `None` in `self` from `other`.
    pub fn or(mut self, other: OrderPatch) -> Self {
        macro_rules! fill {
            ($($field:ident),+) => { $( if self.$field.is_none() { self.$field = other.$field; } )+ };
        }
        fill!(
            order_name,
            customer_id,
            customer_email,
            currency,
            subtotal,
            total,
            financial_status,
            cancelled_at,
            opt_in,
            prediction_id,
            user_id,
            eligible_pending,
            registered,
            order_created_at
        );
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// No record exists for the order and no game was supplied to file it under, so nothing was written.
    Skipped,
}

//--------------------------------------        Tenant         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub shop_id: String,
    pub active: bool,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTenant {
    pub shop_id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

//--------------------------------------         Game          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub active: bool,
}

//--------------------------------------      Prediction       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: String,
    pub event_id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub user_id: Option<String>,
}

//--------------------------------------        Credits        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreditMode {
    #[default]
    StoreCredit,
    GiftCard,
}

impl Display for CreditMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreCredit => f.write_str("store_credit"),
            Self::GiftCard => f.write_str("gift_card"),
        }
    }
}

/// `Pending` marks a claimed key whose external call has not finished yet. Only `Issued` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Pending,
    Issued,
    Failed,
}

impl Display for CreditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Issued => f.write_str("issued"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditRecord {
    pub idempotency_key: String,
    pub shop_id: String,
    pub order_id: OrderId,
    pub prediction_id: Option<String>,
    pub user_id: Option<String>,
    pub amount: Amount,
    pub currency: Option<String>,
    pub mode: CreditMode,
    pub external_ref: Option<String>,
    pub status: CreditStatus,
    pub error: Option<String>,
    #[serde(skip_serializing)]
    pub claim_token: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The deterministic idempotency key for crediting an order.
pub fn credit_key(shop_id: &str, order_id: &OrderId) -> String {
    format!("cred_{shop_id}_{order_id}")
}

//--------------------------------------        Orphans        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanRecord {
    pub shop_id: String,
    pub order_id: String,
    pub topics: Vec<String>,
    pub first_delivery_id: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}
