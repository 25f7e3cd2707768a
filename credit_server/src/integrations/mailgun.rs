//! Orphaned order alerts by email, through the Mailgun messages API.
use std::time::Duration;

use credit_engine::events::OrphanOrderEvent;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::MailgunConfig;

#[derive(Debug, Error)]
pub enum MailgunError {
    #[error("Could not reach Mailgun. {0}")]
    Request(#[from] reqwest::Error),
    #[error("Mailgun returned {status}. {body}")]
    Rejected { status: StatusCode, body: String },
}

#[derive(Clone)]
pub struct MailgunNotifier {
    config: MailgunConfig,
    client: Client,
}

impl MailgunNotifier {
    pub fn new(config: MailgunConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { config, client })
    }

    pub async fn send_orphan_alert(&self, event: &OrphanOrderEvent) -> Result<(), MailgunError> {
        let (subject, text) = orphan_alert_message(event);
        let to = self.config.to.join(",");
        let form = [("from", self.config.from.as_str()), ("to", to.as_str()), ("subject", &subject), ("text", &text)];
        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth("api", Some(self.config.api_key.reveal()))
            .form(&form)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(MailgunError::Rejected { status, body })
        }
    }
}

pub fn orphan_alert_message(event: &OrphanOrderEvent) -> (String, String) {
    let subject = format!("⚠️ Orphaned Shopify order: {} - {}", event.order_id, event.shop_id);
    let text = format!(
        "An order arrived for a shop that is not onboarded or not active.\n\nShop: {}\nOrder: {}\nTopic: {}\n\
         Delivery: {}\nFirst seen: {}\n\nFurther deliveries for this order will not raise another alert.",
        event.shop_id,
        event.order_id,
        event.topic,
        event.delivery_id,
        event.first_seen_at.to_rfc3339(),
    );
    (subject, text)
}
