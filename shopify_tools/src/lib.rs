//! A thin client for the parts of the Shopify Admin GraphQL API that the credit server needs: reading orders,
//! resolving customers, crediting store-credit accounts and creating gift cards.
mod api;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;

pub use api::ShopifyApi;
pub use config::{ShopifyConfig, DEFAULT_API_VERSION, DEFAULT_REQUEST_TIMEOUT};
pub use data_objects::{CustomerRef, GiftCard, GiftCardRequest, MoneyV2, OrderDetails, StoreCreditTransaction};
pub use error::ShopifyApiError;
