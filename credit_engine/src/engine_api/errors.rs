use thiserror::Error;

use crate::{
    db_types::IdentityError,
    traits::{GatewayError, StorageError},
    webhooks::WebhookParseError,
};

#[derive(Debug, Clone, Error)]
pub enum GuardError {
    #[error("Shop not onboarded/active: {0}")]
    TenantInactive(String),
    #[error("Could not determine whether the shop is active. {0}")]
    StorageError(#[from] StorageError),
}

#[derive(Debug, Clone, Error)]
pub enum IngestError {
    #[error("Shop not onboarded/active: {0}")]
    TenantInactive(String),
    #[error("The webhook payload could not be read. {0}")]
    InvalidPayload(String),
    #[error("The webhook payload does not identify an order. {0}")]
    Identity(#[from] IdentityError),
    #[error("Storage failure while ingesting webhook. {0}")]
    StorageError(#[from] StorageError),
    #[error("The store could not be queried for the order. {0}")]
    Upstream(#[from] GatewayError),
}

impl From<GuardError> for IngestError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::TenantInactive(shop) => Self::TenantInactive(shop),
            GuardError::StorageError(e) => Self::StorageError(e),
        }
    }
}

impl From<WebhookParseError> for IngestError {
    fn from(e: WebhookParseError) -> Self {
        match e {
            WebhookParseError::InvalidJson(s) => Self::InvalidPayload(s),
            WebhookParseError::Identity(e) => Self::Identity(e),
        }
    }
}

impl IngestError {
    /// Whether the store should redeliver the webhook. Only transient failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageError(_) | Self::Upstream(_))
    }
}

/// Errors that abort a whole credit run, as opposed to failures of individual orders, which are reported per item.
#[derive(Debug, Clone, Error)]
pub enum CreditApiError {
    #[error("Invalid credit request: {0}")]
    InvalidRequest(String),
    #[error("Storage failure during credit run. {0}")]
    StorageError(#[from] StorageError),
}
