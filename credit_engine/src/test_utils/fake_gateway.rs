//! An in-memory stand-in for the store, for tests that exercise credit delivery and ingestion without a network.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    db_types::OrderId,
    traits::{AuthoritativeOrder, CreditGateway, GatewayError, GiftCardIssue, OrderSource, StoreCreditIssue},
};

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    FindCustomer(String),
    CreateCustomer(String),
    CustomerEmail(String),
    StoreCredit(StoreCreditCall),
    GiftCard(GiftCardCall),
    FetchOrder(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreCreditCall {
    pub shop_id: String,
    pub customer_id: String,
    pub amount: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GiftCardCall {
    pub shop_id: String,
    pub customer_email: String,
    pub amount: String,
    pub idempotency_key: String,
}

#[derive(Debug, Default)]
struct FakeStore {
    customers: HashMap<String, String>,
    emails: HashMap<String, String>,
    orders: HashMap<String, AuthoritativeOrder>,
    calls: Vec<GatewayCall>,
    failure: Option<GatewayError>,
    next_ref: u64,
}

/// Records every call and answers from in-memory maps. Cloned handles share state.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    inner: Arc<Mutex<FakeStore>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer(self, email: &str, customer_id: &str) -> Self {
        {
            let mut store = self.inner.lock().unwrap();
            store.customers.insert(email.to_lowercase(), customer_id.to_string());
            store.emails.insert(customer_id.to_string(), email.to_string());
        }
        self
    }

    pub fn with_order(self, order_id: &OrderId, order: AuthoritativeOrder) -> Self {
        self.inner.lock().unwrap().orders.insert(order_id.to_string(), order);
        self
    }

    /// Makes every subsequent delivery call fail with `error`, until [`FakeGateway::recover`] is called.
    pub fn fail_with(&self, error: GatewayError) {
        self.inner.lock().unwrap().failure = Some(error);
    }

    pub fn recover(&self) {
        self.inner.lock().unwrap().failure = None;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn credit_calls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, GatewayCall::StoreCredit(_) | GatewayCall::GiftCard(_))).count()
    }

    fn record(&self, call: GatewayCall) -> Result<(), GatewayError> {
        let mut store = self.inner.lock().unwrap();
        store.calls.push(call);
        match store.failure.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn next_ref(&self, prefix: &str) -> String {
        let mut store = self.inner.lock().unwrap();
        store.next_ref += 1;
        format!("gid://shopify/{prefix}/{}", store.next_ref)
    }
}

impl CreditGateway for FakeGateway {
    async fn find_customer_by_email(&self, _shop_id: &str, email: &str) -> Result<Option<String>, GatewayError> {
        self.record(GatewayCall::FindCustomer(email.to_string()))?;
        Ok(self.inner.lock().unwrap().customers.get(&email.to_lowercase()).cloned())
    }

    async fn create_customer(&self, _shop_id: &str, email: &str) -> Result<String, GatewayError> {
        self.record(GatewayCall::CreateCustomer(email.to_string()))?;
        let id = self.next_ref("Customer");
        let mut store = self.inner.lock().unwrap();
        store.customers.insert(email.to_lowercase(), id.clone());
        store.emails.insert(id.clone(), email.to_string());
        Ok(id)
    }

    async fn customer_email(&self, _shop_id: &str, customer_id: &str) -> Result<Option<String>, GatewayError> {
        self.record(GatewayCall::CustomerEmail(customer_id.to_string()))?;
        Ok(self.inner.lock().unwrap().emails.get(customer_id).cloned())
    }

    async fn credit_store_account(&self, shop_id: &str, issue: &StoreCreditIssue) -> Result<String, GatewayError> {
        self.record(GatewayCall::StoreCredit(StoreCreditCall {
            shop_id: shop_id.to_string(),
            customer_id: issue.customer_id.clone(),
            amount: issue.amount.to_string(),
            currency: issue.currency.clone(),
        }))?;
        Ok(self.next_ref("StoreCreditAccountCreditTransaction"))
    }

    async fn create_gift_card(&self, shop_id: &str, issue: &GiftCardIssue) -> Result<String, GatewayError> {
        self.record(GatewayCall::GiftCard(GiftCardCall {
            shop_id: shop_id.to_string(),
            customer_email: issue.customer_email.clone(),
            amount: issue.amount.to_string(),
            idempotency_key: issue.idempotency_key.clone(),
        }))?;
        Ok(self.next_ref("GiftCard"))
    }
}

impl OrderSource for FakeGateway {
    async fn fetch_order(
        &self,
        _shop_id: &str,
        order_id: &OrderId,
    ) -> Result<Option<AuthoritativeOrder>, GatewayError> {
        self.record(GatewayCall::FetchOrder(order_id.to_string()))?;
        Ok(self.inner.lock().unwrap().orders.get(order_id.as_str()).cloned())
    }
}
