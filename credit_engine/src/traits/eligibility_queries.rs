use crate::{
    db_types::{OrderRecord, Prediction},
    traits::StorageError,
};

/// The largest number of values a single "is one of" query may carry.
pub const MAX_IN_QUERY_VALUES: usize = 10;

#[allow(async_fn_in_trait)]
pub trait EligibilityQueries {
    /// Ids of every prediction marked correct for `event_id`.
    async fn fetch_winning_predictions(&self, event_id: &str) -> Result<Vec<String>, StorageError>;

    /// Orders of `shop_id` linked to one of `prediction_ids` that are `eligible_pending` and not `credited`.
    ///
    /// Backends reject batches larger than [`MAX_IN_QUERY_VALUES`] with [`StorageError::QueryError`].
    async fn fetch_eligible_orders_batch(
        &self,
        shop_id: &str,
        prediction_ids: &[String],
    ) -> Result<Vec<OrderRecord>, StorageError>;

    async fn upsert_prediction(&self, prediction: &Prediction) -> Result<(), StorageError>;
}
