//! # Outcome credit server
//! The HTTP face of the outcome credit engine. It is responsible for:
//! * Receiving order webhooks from Shopify, checking their signatures and handing them to the engine for ingestion.
//! * Telling storefront scripts whether a shop has a game running.
//! * Running credit batches for a resolved event, or manual credits for named orders.
//! * Alerting operators when orders arrive for shops that are not onboarded.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/shopify/webhook`: Every Shopify order webhook topic.
//! * `/api/active-game?shop=`: The shop's active game, if any. Public, with CORS.
//! * `/api/credits`, `/api/tenants`, `/api/games`, `/api/predictions`, `/api/orders`, `/api/orphans`: Operator routes.
//!   These need the admin token.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod prune_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
