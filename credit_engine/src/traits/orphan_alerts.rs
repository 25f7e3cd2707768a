use chrono::{DateTime, Utc};

use crate::{
    db_types::OrphanRecord,
    traits::{OrphanSighting, StorageError},
};

#[allow(async_fn_in_trait)]
pub trait OrphanAlerts {
    /// Atomically records a sighting of `order_id` for an inactive shop.
    ///
    /// The first sighting (no record, or only an expired one) creates the record. Later sightings add `topic` to
    /// the topic set and push `last_seen_at` and `expire_at` forward.
    async fn record_orphan_sighting(
        &self,
        shop_id: &str,
        order_id: &str,
        topic: &str,
        delivery_id: &str,
        now: DateTime<Utc>,
        expire_at: DateTime<Utc>,
    ) -> Result<OrphanSighting, StorageError>;

    async fn fetch_orphan(&self, shop_id: &str, order_id: &str) -> Result<Option<OrphanRecord>, StorageError>;

    /// Deletes every record that expired at or before `now`, returning the number removed.
    async fn prune_orphans(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}
