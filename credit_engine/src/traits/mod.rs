//! # Backend and collaborator contracts
//!
//! The engine is written against the traits in this module, never against a concrete database or HTTP client.
//!
//! Storage traits (implemented by [`crate::SqliteDatabase`]):
//! * [`OrderLedger`] stores the per-order state machine, keyed by (shop, order).
//! * [`TenantManagement`] knows which shops are onboarded and holds their credentials.
//! * [`GameManagement`] stores reward contexts ("games") and resolves the active one.
//! * [`OrphanAlerts`] deduplicates orders seen for shops that are not active.
//! * [`EligibilityQueries`] stores prediction outcomes and runs the eligibility query.
//! * [`CreditLedger`] provides the transactional claim and finalize steps of credit issuance.
//!
//! External collaborators (implemented by the server on top of the Shopify Admin API):
//! * [`CreditGateway`] issues store credit and gift cards.
//! * [`OrderSource`] fetches the authoritative copy of an order.
mod credit_gateway;
mod credit_ledger;
mod data_objects;
mod eligibility_queries;
mod game_management;
mod order_ledger;
mod order_source;
mod orphan_alerts;
mod tenant_management;

pub use credit_gateway::{CreditGateway, GatewayError, GiftCardIssue, StoreCreditIssue};
pub use credit_ledger::CreditLedger;
pub use data_objects::{ClaimResult, CreditClaim, OrphanSighting, StorageError};
pub use eligibility_queries::{EligibilityQueries, MAX_IN_QUERY_VALUES};
pub use game_management::GameManagement;
pub use order_ledger::OrderLedger;
pub use order_source::{AuthoritativeOrder, NoOrderSource, OrderSource};
pub use orphan_alerts::OrphanAlerts;
pub use tenant_management::TenantManagement;
