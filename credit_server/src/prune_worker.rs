use std::time::Duration as StdDuration;

use chrono::Duration;
use credit_engine::{events::EventProducers, OrphanApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the orphan prune worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Orphan records older than `retention` are removed every `interval`, after which a new delivery for the same order
/// raises a fresh alert.
pub fn start_prune_worker(db: SqliteDatabase, retention: Duration, interval: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = OrphanApi::new(db, EventProducers::default()).with_retention(retention);
        info!("👻️ Orphan prune worker started. Records are kept for {} day(s)", retention.num_days());
        loop {
            timer.tick().await;
            debug!("👻️ Running orphan prune job");
            match api.prune_expired().await {
                Ok(0) => trace!("👻️ No orphan records have expired"),
                Ok(n) => info!("👻️ {n} expired orphan record(s) removed"),
                Err(e) => error!("👻️ Error running orphan prune job: {e}"),
            }
        }
    })
}
