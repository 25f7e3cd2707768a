use std::{collections::HashSet, fmt::Debug};

use log::*;

use crate::{
    db_types::{OrderRecord, Prediction},
    traits::{EligibilityQueries, StorageError, MAX_IN_QUERY_VALUES},
};

pub struct EligibilityApi<B> {
    db: B,
}

impl<B: Debug> Debug for EligibilityApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EligibilityApi ({:?})", self.db)
    }
}

impl<B> EligibilityApi<B>
where B: EligibilityQueries
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Prediction ids marked correct for the outcome.
    pub async fn winners(&self, event_id: &str) -> Result<Vec<String>, StorageError> {
        let winners = self.db.fetch_winning_predictions(event_id).await?;
        debug!("💳️ {} winning predictions for event {event_id}", winners.len());
        Ok(winners)
    }

    /// Eligible, uncredited orders linked to any of `prediction_ids`.
    ///
    /// The ids are queried in batches of [`MAX_IN_QUERY_VALUES`]. The results are merged in batch order, and an order
    /// returned by more than one batch is kept once, at its first position.
    pub async fn eligible_orders(
        &self,
        shop_id: &str,
        prediction_ids: &[String],
    ) -> Result<Vec<OrderRecord>, StorageError> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for (i, batch) in prediction_ids.chunks(MAX_IN_QUERY_VALUES).enumerate() {
            let orders = self.db.fetch_eligible_orders_batch(shop_id, batch).await?;
            trace!("💳️ Eligibility batch {i} ({} ids) matched {} orders", batch.len(), orders.len());
            result.extend(orders.into_iter().filter(|o| seen.insert(o.order_id.clone())));
        }
        debug!("💳️ {} eligible orders for {shop_id}", result.len());
        Ok(result)
    }

    pub async fn upsert_prediction(&self, prediction: &Prediction) -> Result<(), StorageError> {
        self.db.upsert_prediction(prediction).await
    }
}
