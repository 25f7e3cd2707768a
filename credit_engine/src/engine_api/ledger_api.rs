//! Direct access to the order ledger.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{OrderId, OrderPatch, OrderRecord, UpsertOutcome},
    traits::{OrderLedger, StorageError},
};

/// Options for [`LedgerApi::mark_registered`].
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Clear `eligible_pending` as well. Defaults to `!registered`.
    pub clear_pending: Option<bool>,
    pub game_id: Option<String>,
}

pub struct LedgerApi<B> {
    db: B,
}

impl<B: Debug> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.db)
    }
}

impl<B> LedgerApi<B>
where B: OrderLedger
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Merges `patch` into the order. See [`OrderLedger::upsert_order`] for the rules on `game_id`.
    pub async fn upsert(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        game_id: Option<&str>,
        patch: &OrderPatch,
    ) -> Result<UpsertOutcome, StorageError> {
        let outcome = self.db.upsert_order(shop_id, order_id, game_id, patch).await?;
        if outcome == UpsertOutcome::Skipped {
            warn!("🗃️ Order {shop_id}/{order_id} is not in the ledger and no game was given. Update skipped.");
        }
        Ok(outcome)
    }

    pub async fn get(&self, shop_id: &str, order_id: &OrderId) -> Result<Option<OrderRecord>, StorageError> {
        self.db.fetch_order(shop_id, order_id).await
    }

    pub async fn mark_registered(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        registered: bool,
        options: RegisterOptions,
    ) -> Result<bool, StorageError> {
        let clear_pending = options.clear_pending.unwrap_or(!registered);
        let found = self
            .db
            .mark_registered(shop_id, order_id, registered, clear_pending, options.game_id.as_deref())
            .await?;
        if !found {
            debug!("🗃️ Order {shop_id}/{order_id} not found while marking registered={registered}");
        }
        Ok(found)
    }
}
