//! # Outcome credit engine public API
//!
//! The `engine_api` module exposes the programmatic API of the engine. It is modular, so that clients can pick the
//! parts they need:
//!
//! * [`webhook_api`] turns webhook deliveries into ledger writes.
//! * [`tenant_guard`] rejects deliveries for shops that are not active, and hands them to the orphan aggregator.
//! * [`orphan_api`] deduplicates orphaned orders and raises one alert per order.
//! * [`ledger_api`] reads and writes order records directly.
//! * [`game_api`] resolves the active game of a shop.
//! * [`tenant_api`] onboards and offboards shops.
//! * [`eligibility_api`] matches winning predictions to eligible orders.
//! * [`credit_api`] issues credits with exactly-once semantics.
//!
//! # API usage
//!
//! Every API is created by supplying a backend that implements the storage traits it needs:
//!
//! ```rust,ignore
//! use credit_engine::{GameApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements GameManagement
//! let api = GameApi::new(db);
//! let game = api.active_game("my-shop.myshopify.com").await?;
//! ```
pub mod credit_api;
pub mod credit_objects;
pub mod eligibility_api;
pub mod errors;
pub mod game_api;
pub mod ledger_api;
pub mod orphan_api;
pub mod tenant_api;
pub mod tenant_guard;
pub mod webhook_api;
