use chrono::{DateTime, Utc};
use credit_common::Amount;
use thiserror::Error;

use crate::db_types::{CreditMode, CreditRecord, OrderId, OrderRecord, OrphanRecord};

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Query rejected: {0}")]
    QueryError(String),
    #[error("Order {0} was not found")]
    OrderNotFound(String),
    #[error("The record changed underneath us: {0}")]
    Conflict(String),
    #[error("Stored data is corrupt: {0}")]
    CorruptData(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}

/// Everything the credit ledger needs to claim an idempotency key before any external call is made.
#[derive(Debug, Clone)]
pub struct CreditClaim {
    pub idempotency_key: String,
    pub shop_id: String,
    pub order_id: OrderId,
    pub prediction_id: Option<String>,
    pub user_id: Option<String>,
    pub amount: Amount,
    pub currency: Option<String>,
    pub mode: CreditMode,
    /// When true the order must still be `eligible_pending` at claim time. Manual credits skip this check.
    pub require_eligible: bool,
    /// A pending claim younger than this is considered in flight and is left alone.
    pub lease: chrono::Duration,
}

#[derive(Debug, Clone)]
pub enum ClaimResult {
    /// The key is ours. `order` is a fresh read taken inside the claim transaction.
    Claimed { token: String, order: OrderRecord },
    AlreadyIssued(CreditRecord),
    OrderAlreadyCredited,
    /// Another invocation holds an unexpired claim on this key.
    InFlight { claimed_at: Option<DateTime<Utc>> },
    OrderMissing,
    NotEligible,
    /// The key is already recorded against a different order.
    KeyInUse { shop_id: String, order_id: OrderId },
}

#[derive(Debug, Clone)]
pub struct OrphanSighting {
    pub first_sighting: bool,
    pub record: OrphanRecord,
}
