use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use credit_common::{helpers::parse_boolean_flag, Secret};
use credit_engine::{
    engine_api::{
        credit_api::{DEFAULT_CLAIM_LEASE_MINS, DEFAULT_EXTERNAL_TIMEOUT_SECS},
        orphan_api::DEFAULT_ORPHAN_RETENTION_DAYS,
    },
    CreditConfig,
};
use log::*;
use shopify_tools::ShopifyConfig;

const DEFAULT_OCS_HOST: &str = "127.0.0.1";
const DEFAULT_OCS_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/outcome_credits.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ORPHAN_PRUNE_INTERVAL_MINS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// The secret used to verify webhook signatures for shops that do not have a secret of their own
    pub hmac_secret: Secret<String>,
    /// If false, webhook signatures are not checked at all. **DANGER**
    pub hmac_checks: bool,
    pub shopify_api_version: String,
    /// Callers of the `/api` admin scope must present this token in the `X-Admin-Token` header. If empty, the admin
    /// scope rejects every request.
    pub admin_token: Secret<String>,
    /// How long an orphan record suppresses further alerts for the same order.
    pub orphan_retention: Duration,
    pub orphan_prune_interval: StdDuration,
    /// A pending credit claim younger than this is treated as in flight.
    pub claim_lease: Duration,
    /// Upper bound for every call to the Shopify Admin API and to Mailgun.
    pub external_timeout: StdDuration,
    /// Orphan alerts are only emailed when this is configured.
    pub mailgun: Option<MailgunConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OCS_HOST.to_string(),
            port: DEFAULT_OCS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            hmac_secret: Secret::default(),
            hmac_checks: true,
            shopify_api_version: shopify_tools::DEFAULT_API_VERSION.to_string(),
            admin_token: Secret::default(),
            orphan_retention: Duration::days(DEFAULT_ORPHAN_RETENTION_DAYS),
            orphan_prune_interval: StdDuration::from_secs(DEFAULT_ORPHAN_PRUNE_INTERVAL_MINS * 60),
            claim_lease: Duration::minutes(DEFAULT_CLAIM_LEASE_MINS),
            external_timeout: StdDuration::from_secs(DEFAULT_EXTERNAL_TIMEOUT_SECS),
            mailgun: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("OCS_HOST").ok().unwrap_or_else(|| DEFAULT_OCS_HOST.into());
        let port = parse_env_or("OCS_PORT", DEFAULT_OCS_PORT);
        let database_url = env::var("OCS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ OCS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let db_max_connections = parse_env_or("OCS_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
        let hmac_secret = env::var("OCS_SHOPIFY_HMAC_SECRET").ok().unwrap_or_else(|| {
            warn!(
                "🪛️ OCS_SHOPIFY_HMAC_SECRET is not set. Webhooks will only be accepted from shops that have their own \
                 webhook secret configured."
            );
            String::default()
        });
        let hmac_checks = parse_boolean_flag(env::var("OCS_SHOPIFY_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are DISABLED. Do not run a production server like this.");
        }
        let admin_token = env::var("OCS_ADMIN_TOKEN").ok().unwrap_or_else(|| {
            warn!("🪛️ OCS_ADMIN_TOKEN is not set. All admin endpoints will reject requests.");
            String::default()
        });
        let retention_days = parse_env_or("OCS_ORPHAN_RETENTION_DAYS", DEFAULT_ORPHAN_RETENTION_DAYS);
        let prune_mins = parse_env_or("OCS_ORPHAN_PRUNE_INTERVAL_MINS", DEFAULT_ORPHAN_PRUNE_INTERVAL_MINS);
        let lease_mins = parse_env_or("OCS_CREDIT_CLAIM_LEASE_MINS", DEFAULT_CLAIM_LEASE_MINS);
        let timeout_secs = parse_env_or("OCS_EXTERNAL_TIMEOUT_SECS", DEFAULT_EXTERNAL_TIMEOUT_SECS);
        let mailgun = MailgunConfig::from_env();
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            hmac_secret: Secret::new(hmac_secret),
            hmac_checks,
            shopify_api_version: ShopifyConfig::api_version_from_env_or_default(),
            admin_token: Secret::new(admin_token),
            orphan_retention: Duration::days(retention_days),
            orphan_prune_interval: StdDuration::from_secs(prune_mins.max(1) * 60),
            claim_lease: Duration::minutes(lease_mins),
            external_timeout: StdDuration::from_secs(timeout_secs.max(1)),
            mailgun,
        }
    }

    pub fn credit_config(&self) -> CreditConfig {
        CreditConfig { claim_lease: self.claim_lease, external_timeout: self.external_timeout, ..Default::default() }
    }
}

/// Reads and parses `name`, logging and falling back to `default` if it is missing or invalid.
fn parse_env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  MailgunConfig  ----------------------------------------------------
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MailgunRegion {
    #[default]
    Us,
    Eu,
}

impl MailgunRegion {
    pub fn api_host(&self) -> &'static str {
        match self {
            Self::Us => "https://api.mailgun.net",
            Self::Eu => "https://api.eu.mailgun.net",
        }
    }
}

impl FromStr for MailgunRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "US" | "" => Ok(Self::Us),
            "EU" => Ok(Self::Eu),
            other => Err(format!("Unknown Mailgun region: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MailgunConfig {
    pub domain: String,
    pub api_key: Secret<String>,
    pub from: String,
    pub to: Vec<String>,
    pub region: MailgunRegion,
}

impl MailgunConfig {
    /// Returns `None` (and logs why) unless the domain, key and at least one recipient are all set.
    pub fn from_env() -> Option<Self> {
        let domain = env::var("OCS_MAILGUN_DOMAIN").ok().filter(|s| !s.trim().is_empty());
        let api_key = env::var("OCS_MAILGUN_API_KEY").ok().filter(|s| !s.trim().is_empty());
        let to = env::var("OCS_MAILGUN_TO")
            .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect::<Vec<_>>())
            .unwrap_or_default();
        let (Some(domain), Some(api_key)) = (domain, api_key) else {
            info!("🪛️ Mailgun is not configured. Orphaned order alerts will only be logged.");
            return None;
        };
        if to.is_empty() {
            warn!("🪛️ OCS_MAILGUN_TO is empty. Orphaned order alerts will only be logged.");
            return None;
        }
        let from = env::var("OCS_MAILGUN_FROM").unwrap_or_else(|_| format!("alerts@{domain}"));
        let region = env::var("OCS_MAILGUN_REGION")
            .ok()
            .map(|s| {
                s.parse::<MailgunRegion>().unwrap_or_else(|e| {
                    warn!("🪛️ {e}. Using the US region.");
                    MailgunRegion::Us
                })
            })
            .unwrap_or_default();
        Some(Self { domain: domain.trim().to_string(), api_key: Secret::new(api_key), from, to, region })
    }

    pub fn messages_url(&self) -> String {
        format!("{}/v3/{}/messages", self.region.api_host(), self.domain)
    }
}
