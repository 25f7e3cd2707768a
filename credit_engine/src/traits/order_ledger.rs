use crate::{
    db_types::{OrderId, OrderPatch, OrderRecord, UpsertOutcome},
    traits::StorageError,
};

/// The persistent per-order state machine.
///
/// Records are addressed by (shop, order id). The game id is an indexed attribute rather than part of the key, so
/// an order can be located without knowing which game it belongs to.
#[allow(async_fn_in_trait)]
pub trait OrderLedger: Clone {
    /// Merges `patch` into the order record.
    ///
    /// * With a `game_id`, the record is created if necessary and filed under that game.
    /// * Without one, an existing record is updated, and a missing record is left missing
    ///   ([`UpsertOutcome::Skipped`]).
    ///
    /// Only `Some` fields of the patch are written. Backends must never leave a record with both `credited` and
    /// `eligible_pending` set.
    async fn upsert_order(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        game_id: Option<&str>,
        patch: &OrderPatch,
    ) -> Result<UpsertOutcome, StorageError>;

    /// Merges `patch` into the order record, creating it without a game if necessary. An existing game binding is
    /// kept. Used when an order must be recorded while the shop has no active game.
    async fn upsert_unfiled_order(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        patch: &OrderPatch,
    ) -> Result<UpsertOutcome, StorageError>;

    async fn fetch_order(&self, shop_id: &str, order_id: &OrderId) -> Result<Option<OrderRecord>, StorageError>;

    /// Sets the `registered` flag, optionally clearing `eligible_pending` and binding a game.
    /// Returns false if the order does not exist.
    async fn mark_registered(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        registered: bool,
        clear_pending: bool,
        game_id: Option<&str>,
    ) -> Result<bool, StorageError>;
}
