use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::Value;

use crate::{
    engine_api::{errors::GuardError, orphan_api::OrphanApi},
    traits::{OrphanAlerts, TenantManagement},
    webhooks::{best_effort_order_id, WebhookTopic},
};

/// Lets deliveries for active shops through. Everything else is handed to the orphan aggregator and rejected.
pub struct TenantGuardApi<B> {
    db: B,
    orphans: OrphanApi<B>,
}

impl<B> Debug for TenantGuardApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TenantGuardApi")
    }
}

impl<B: Clone> Clone for TenantGuardApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), orphans: self.orphans.clone() }
    }
}

impl<B> TenantGuardApi<B>
where B: TenantManagement + OrphanAlerts
{
    pub fn new(db: B, orphans: OrphanApi<B>) -> Self {
        Self { db, orphans }
    }

    /// Returns `Ok` for an active shop, without writing anything.
    ///
    /// For any other shop the delivery is recorded as an orphan if an order id can be found in it, and
    /// [`GuardError::TenantInactive`] is returned regardless of whether that recording succeeded.
    pub async fn ensure_active(
        &self,
        shop_id: &str,
        topic: &WebhookTopic,
        payload: &Value,
        delivery_id: Option<&str>,
    ) -> Result<(), GuardError> {
        if self.db.is_active(shop_id).await? {
            return Ok(());
        }
        warn!("🛍️ Webhook {topic} received for inactive shop {shop_id}");
        match best_effort_order_id(topic, payload) {
            Some(order_id) => {
                let delivery_id = match delivery_id.map(str::trim).filter(|s| !s.is_empty()) {
                    Some(id) => id.to_string(),
                    None => format!("{shop_id}-{topic}-{}", Utc::now().timestamp_millis()),
                };
                if let Err(e) = self.orphans.record_once(shop_id, topic.as_str(), &order_id, &delivery_id).await {
                    error!("👻️ Could not record orphaned order {shop_id}/{order_id}: {e}");
                }
            },
            None => debug!("👻️ No order id in {topic} payload for {shop_id}. Nothing to record."),
        }
        Err(GuardError::TenantInactive(shop_id.to_string()))
    }
}
