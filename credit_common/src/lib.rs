//! Value types shared by the engine, the Shopify client and the server.
mod amount;

pub mod helpers;
pub mod op;
mod secret;

pub use amount::{Amount, AmountConversionError};
pub use secret::Secret;
