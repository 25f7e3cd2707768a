use credit_common::Amount;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The store did not respond in time: {0}")]
    Timeout(String),
    #[error("The store rejected the request: {0}")]
    Rejected(String),
    #[error("Could not reach the store: {0}")]
    Transport(String),
    #[error("The store accepted the request but returned no reference")]
    MissingReference,
    #[error("The shop {0} has no credentials configured")]
    NotConfigured(String),
}

#[derive(Debug, Clone)]
pub struct StoreCreditIssue {
    /// The customer gid whose store-credit account receives the funds
    pub customer_id: String,
    pub amount: Amount,
    pub currency: String,
    /// ISO-8601 expiry for the credited funds, if the store should expire them
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GiftCardIssue {
    pub amount: Amount,
    pub currency: String,
    pub customer_email: String,
    pub note: String,
    pub idempotency_key: String,
}

/// The store operations needed to deliver a credit. Every method is scoped to a single shop.
#[allow(async_fn_in_trait)]
pub trait CreditGateway: Clone {
    async fn find_customer_by_email(&self, shop_id: &str, email: &str) -> Result<Option<String>, GatewayError>;

    async fn create_customer(&self, shop_id: &str, email: &str) -> Result<String, GatewayError>;

    async fn customer_email(&self, shop_id: &str, customer_id: &str) -> Result<Option<String>, GatewayError>;

    /// Returns the store's reference for the credit transaction.
    async fn credit_store_account(&self, shop_id: &str, issue: &StoreCreditIssue) -> Result<String, GatewayError>;

    /// Returns the id of the new gift card.
    async fn create_gift_card(&self, shop_id: &str, issue: &GiftCardIssue) -> Result<String, GatewayError>;
}
