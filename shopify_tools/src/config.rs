use std::time::Duration;

use credit_common::Secret;
use log::*;

pub const DEFAULT_API_VERSION: &str = "2025-10";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection details for one shop. The credit server serves many shops, so a config is built per tenant from the
/// access token stored alongside the tenant record.
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// The shop domain, e.g. "my-shop.myshopify.com"
    pub shop: String,
    pub admin_access_token: Secret<String>,
    pub api_version: String,
    pub timeout: Duration,
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self {
            shop: String::default(),
            admin_access_token: Secret::default(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ShopifyConfig {
    pub fn new(shop: &str, admin_access_token: Secret<String>, api_version: &str) -> Self {
        Self { shop: shop.to_string(), admin_access_token, api_version: api_version.to_string(), ..Default::default() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_version_from_env_or_default() -> String {
        std::env::var("OCS_SHOPIFY_API_VERSION").unwrap_or_else(|_| {
            warn!("OCS_SHOPIFY_API_VERSION not set, using {DEFAULT_API_VERSION} as default");
            DEFAULT_API_VERSION.to_string()
        })
    }
}
