//! The store side of credit delivery, backed by the Shopify Admin GraphQL API.
//!
//! The server serves many shops, and each has its own Admin API access token on its tenant record. A client is
//! built for the shop named in each call.
use std::time::Duration;

use credit_common::Secret;
use credit_engine::{
    db_types::OrderId,
    traits::{AuthoritativeOrder, GatewayError, GiftCardIssue, StoreCreditIssue},
    CreditGateway,
    OrderSource,
    TenantManagement,
};
use log::*;
use shopify_tools::{GiftCardRequest, OrderDetails, ShopifyApi, ShopifyApiError, ShopifyConfig};

#[derive(Clone)]
pub struct ShopifyGateway<B> {
    tenants: B,
    api_version: String,
    timeout: Duration,
}

impl<B> ShopifyGateway<B>
where B: TenantManagement
{
    pub fn new(tenants: B, api_version: &str, timeout: Duration) -> Self {
        Self { tenants, api_version: api_version.to_string(), timeout }
    }

    async fn api_for(&self, shop_id: &str) -> Result<ShopifyApi, GatewayError> {
        let tenant = self
            .tenants
            .fetch_tenant(shop_id)
            .await
            .map_err(|e| GatewayError::Transport(format!("Could not load credentials for {shop_id}. {e}")))?;
        let token = tenant
            .and_then(|t| t.access_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GatewayError::NotConfigured(shop_id.to_string()))?;
        let config = ShopifyConfig::new(shop_id, Secret::new(token), &self.api_version).with_timeout(self.timeout);
        ShopifyApi::new(config).map_err(gateway_error)
    }
}

impl<B> CreditGateway for ShopifyGateway<B>
where B: TenantManagement
{
    async fn find_customer_by_email(&self, shop_id: &str, email: &str) -> Result<Option<String>, GatewayError> {
        self.api_for(shop_id).await?.find_customer_by_email(email).await.map_err(gateway_error)
    }

    async fn create_customer(&self, shop_id: &str, email: &str) -> Result<String, GatewayError> {
        self.api_for(shop_id).await?.create_customer(email).await.map_err(gateway_error)
    }

    async fn customer_email(&self, shop_id: &str, customer_id: &str) -> Result<Option<String>, GatewayError> {
        self.api_for(shop_id).await?.customer_email(customer_id).await.map_err(gateway_error)
    }

    async fn credit_store_account(&self, shop_id: &str, issue: &StoreCreditIssue) -> Result<String, GatewayError> {
        let api = self.api_for(shop_id).await?;
        let tx = api
            .credit_store_account(&issue.customer_id, issue.amount, &issue.currency, issue.expires_at.as_deref())
            .await
            .map_err(gateway_error)?;
        info!("🛍️ Store credit of {} {} issued on {shop_id}. Transaction {}", issue.amount, issue.currency, tx.id);
        Ok(tx.id)
    }

    async fn create_gift_card(&self, shop_id: &str, issue: &GiftCardIssue) -> Result<String, GatewayError> {
        let api = self.api_for(shop_id).await?;
        let request = GiftCardRequest {
            initial_value: issue.amount,
            currency: issue.currency.clone(),
            customer_email: issue.customer_email.clone(),
            note: issue.note.clone(),
            idempotency_key: issue.idempotency_key.clone(),
        };
        let card = api.create_gift_card(&request).await.map_err(gateway_error)?;
        info!("🛍️ Gift card {} of {} {} created on {shop_id}", card.id, issue.amount, issue.currency);
        Ok(card.id)
    }
}

impl<B> OrderSource for ShopifyGateway<B>
where B: TenantManagement
{
    async fn fetch_order(&self, shop_id: &str, order_id: &OrderId) -> Result<Option<AuthoritativeOrder>, GatewayError> {
        let api = match self.api_for(shop_id).await {
            Ok(api) => api,
            // Without credentials the payload is all there is
            Err(GatewayError::NotConfigured(_)) => {
                debug!("🛍️ {shop_id} has no access token. Using the webhook payload for order {order_id}.");
                return Ok(None);
            },
            Err(e) => return Err(e),
        };
        let order = api.fetch_order(&order_id.gid()).await.map_err(gateway_error)?;
        if order.is_none() {
            debug!("🛍️ Order {order_id} is not known to {shop_id}. Using the webhook payload.");
        }
        Ok(order.map(authoritative_order))
    }
}

pub fn authoritative_order(order: OrderDetails) -> AuthoritativeOrder {
    let subtotal = order.subtotal();
    let total = order.total();
    let (customer_id, customer_email) = match order.customer {
        Some(c) => (Some(c.id), c.email),
        None => (None, None),
    };
    let metafields = order.metafields.edges.into_iter().filter_map(|e| e.node.value.map(|v| (e.node.key, v))).collect();
    let custom_attributes = order.custom_attributes.into_iter().filter_map(|a| a.value.map(|v| (a.key, v))).collect();
    AuthoritativeOrder {
        name: order.name,
        customer_id,
        customer_email,
        currency: order.currency_code,
        subtotal,
        total,
        financial_status: order.display_financial_status,
        cancelled_at: order.cancelled_at,
        created_at: order.created_at,
        metafields,
        custom_attributes,
    }
}

fn gateway_error(e: ShopifyApiError) -> GatewayError {
    match e {
        ShopifyApiError::Timeout(s) => GatewayError::Timeout(s),
        ShopifyApiError::MissingField(_) => GatewayError::MissingReference,
        e if e.is_transient() => GatewayError::Transport(e.to_string()),
        e => GatewayError::Rejected(e.to_string()),
    }
}
