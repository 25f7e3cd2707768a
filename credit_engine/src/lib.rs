//! Outcome Credit Engine
//!
//! The engine turns a shop's order stream into store credit for customers whose predictions came true. It is
//! storage-agnostic and knows nothing about HTTP: the server crate supplies the transport, the webhook signature
//! check and a [`traits::CreditGateway`] that talks to the store.
//!
//! The library is divided into three main sections:
//! 1. Storage contracts ([`mod@traits`]) and a SQLite implementation of them ([`SqliteDatabase`]). The data types
//!    stored in the database are defined in [`mod@db_types`] and are public.
//! 2. Webhook parsing ([`mod@webhooks`]), which resolves the canonical order identity of every delivery.
//! 3. The public API ([`mod@engine_api`]): ingestion, tenant guarding, orphan alerts, eligibility and credit
//!    issuance.
//!
//! The engine also emits events ([`mod@events`]) when an orphaned order is first seen and when a credit is issued.
//! Hooks can subscribe to these to send alerts or notifications.
pub mod db_types;
pub mod engine_api;
pub mod events;
pub mod traits;
pub mod webhooks;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use engine_api::{
    credit_api::{CreditApi, CreditConfig},
    credit_objects,
    eligibility_api::EligibilityApi,
    errors::{CreditApiError, GuardError, IngestError},
    game_api::GameApi,
    ledger_api::{LedgerApi, RegisterOptions},
    orphan_api::OrphanApi,
    tenant_api::TenantApi,
    tenant_guard::TenantGuardApi,
    webhook_api::{IngestOutcome, RewardContext, WebhookApi},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CreditGateway,
    CreditLedger,
    EligibilityQueries,
    GameManagement,
    OrderLedger,
    OrderSource,
    OrphanAlerts,
    StorageError,
    TenantManagement,
};
