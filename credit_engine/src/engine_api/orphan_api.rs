use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::OrphanRecord,
    events::{EventProducers, OrphanOrderEvent},
    traits::{OrphanAlerts, StorageError},
};

pub const DEFAULT_ORPHAN_RETENTION_DAYS: i64 = 30;

/// Aggregates deliveries for shops that are not active into one record per (shop, order), and raises a single
/// [`OrphanOrderEvent`] for each.
pub struct OrphanApi<B> {
    db: B,
    producers: EventProducers,
    retention: Duration,
}

impl<B> Debug for OrphanApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrphanApi (retention: {})", self.retention)
    }
}

impl<B: Clone> Clone for OrphanApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone(), retention: self.retention }
    }
}

impl<B> OrphanApi<B>
where B: OrphanAlerts
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, retention: Duration::days(DEFAULT_ORPHAN_RETENTION_DAYS) }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Records the sighting and returns whether it was the first one for this (shop, order).
    ///
    /// The event for a first sighting is published only after the sighting has been committed.
    pub async fn record_once(
        &self,
        shop_id: &str,
        topic: &str,
        order_id: &str,
        delivery_id: &str,
    ) -> Result<bool, StorageError> {
        let now = Utc::now();
        let expire_at = now + self.retention;
        let sighting = self.db.record_orphan_sighting(shop_id, order_id, topic, delivery_id, now, expire_at).await?;
        if sighting.first_sighting {
            info!("👻️ First sighting of orphaned order {shop_id}/{order_id} via {topic}");
            self.producers.publish_orphan_order(OrphanOrderEvent::new(&sighting.record, topic)).await;
        } else {
            let topics = &sighting.record.topics;
            debug!("👻️ Orphaned order {shop_id}/{order_id} seen again via {topic}. Topics: {topics:?}");
        }
        Ok(sighting.first_sighting)
    }

    pub async fn fetch(&self, shop_id: &str, order_id: &str) -> Result<Option<OrphanRecord>, StorageError> {
        self.db.fetch_orphan(shop_id, order_id).await
    }

    pub async fn prune_expired(&self) -> Result<u64, StorageError> {
        let removed = self.db.prune_orphans(Utc::now()).await?;
        if removed > 0 {
            info!("👻️ Pruned {removed} expired orphan records");
        }
        Ok(removed)
    }
}
