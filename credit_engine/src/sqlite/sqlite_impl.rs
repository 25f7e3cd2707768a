//! `SqliteDatabase` is a concrete implementation of an outcome credit engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the
//! [`traits`](crate::traits) module.
//!
//! Multi-statement operations open a transaction whose first statement is a write. SQLite then takes the write lock
//! up front, so the reads that follow cannot be invalidated by a concurrent writer before commit.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use rand::Rng;
use sqlx::{migrate, SqliteConnection, SqlitePool};

use super::db::{credits, db_url, games, new_pool, orders, orphans, predictions, tenants};
use crate::{
    db_types::{
        CreditRecord,
        CreditStatus,
        GameRecord,
        NewTenant,
        OrderId,
        OrderPatch,
        OrderRecord,
        OrphanRecord,
        Prediction,
        Tenant,
        UpsertOutcome,
    },
    traits::{
        ClaimResult,
        CreditClaim,
        CreditLedger,
        EligibilityQueries,
        GameManagement,
        OrderLedger,
        OrphanAlerts,
        OrphanSighting,
        StorageError,
        TenantManagement,
        MAX_IN_QUERY_VALUES,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

fn new_claim_token() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}

fn lease_held(credit: &CreditRecord, claim: &CreditClaim, now: DateTime<Utc>) -> bool {
    credit.claimed_at.map(|t| now - t < claim.lease).unwrap_or(false)
}

/// Checks for a pending or issued credit on the claimed order under a different key. A live rival decides the claim.
/// A rival whose lease has run out is failed so the claim can go ahead.
async fn yield_to_rival(
    claim: &CreditClaim,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ClaimResult>, StorageError> {
    let key = claim.idempotency_key.as_str();
    let Some(rival) = credits::fetch_live_rival(&claim.shop_id, &claim.order_id, key, conn).await? else {
        return Ok(None);
    };
    match rival.status {
        CreditStatus::Issued => Ok(Some(ClaimResult::AlreadyIssued(rival))),
        _ if lease_held(&rival, claim, now) => Ok(Some(ClaimResult::InFlight { claimed_at: rival.claimed_at })),
        _ => {
            warn!(
                "🗃️ Credit {} for order {}/{} let its claim lapse. Handing the order to {key}",
                rival.idempotency_key, claim.shop_id, claim.order_id
            );
            let reason = format!("Claim lapsed and was taken over by {key}");
            credits::expire_claim(&rival.idempotency_key, &reason, now, conn).await?;
            Ok(None)
        },
    }
}

impl OrderLedger for SqliteDatabase {
    async fn upsert_order(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        game_id: Option<&str>,
        patch: &OrderPatch,
    ) -> Result<UpsertOutcome, StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let created = match game_id {
            Some(game) => orders::insert_if_absent(shop_id, order_id, Some(game), now, &mut tx).await?,
            None => false,
        };
        let changed = orders::apply_patch(shop_id, order_id, game_id, patch, now, &mut tx).await?;
        tx.commit().await?;
        let outcome = match (created, changed) {
            (true, _) => UpsertOutcome::Created,
            (false, 0) => UpsertOutcome::Skipped,
            (false, _) => UpsertOutcome::Updated,
        };
        trace!("🗃️ Upsert of order {shop_id}/{order_id}: {outcome:?}");
        Ok(outcome)
    }

    async fn upsert_unfiled_order(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        patch: &OrderPatch,
    ) -> Result<UpsertOutcome, StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let created = orders::insert_if_absent(shop_id, order_id, None, now, &mut tx).await?;
        orders::apply_patch(shop_id, order_id, None, patch, now, &mut tx).await?;
        tx.commit().await?;
        Ok(if created { UpsertOutcome::Created } else { UpsertOutcome::Updated })
    }

    async fn fetch_order(&self, shop_id: &str, order_id: &OrderId) -> Result<Option<OrderRecord>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(shop_id, order_id, &mut conn).await?;
        Ok(order)
    }

    async fn mark_registered(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        registered: bool,
        clear_pending: bool,
        game_id: Option<&str>,
    ) -> Result<bool, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let changed =
            orders::set_registered(shop_id, order_id, registered, clear_pending, game_id, Utc::now(), &mut conn)
                .await?;
        Ok(changed > 0)
    }
}

impl TenantManagement for SqliteDatabase {
    async fn fetch_tenant(&self, shop_id: &str) -> Result<Option<Tenant>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let tenant = tenants::fetch_tenant(shop_id, &mut conn).await?;
        Ok(tenant)
    }

    async fn upsert_tenant(&self, tenant: &NewTenant) -> Result<Tenant, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let tenant = tenants::upsert_tenant(tenant, Utc::now(), &mut conn).await?;
        debug!("🗃️ Tenant {} saved. Active: {}", tenant.shop_id, tenant.active);
        Ok(tenant)
    }
}

impl GameManagement for SqliteDatabase {
    async fn fetch_active_game(&self, shop_id: &str) -> Result<Option<GameRecord>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let game = games::fetch_active_game(shop_id, &mut conn).await?;
        Ok(game)
    }

    async fn fetch_game(&self, game_id: &str) -> Result<Option<GameRecord>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let game = games::fetch_game(game_id, &mut conn).await?;
        Ok(game)
    }

    async fn upsert_game(&self, game: &GameRecord) -> Result<GameRecord, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let game = games::upsert_game(game, Utc::now(), &mut conn).await?;
        Ok(game)
    }
}

impl OrphanAlerts for SqliteDatabase {
    async fn record_orphan_sighting(
        &self,
        shop_id: &str,
        order_id: &str,
        topic: &str,
        delivery_id: &str,
        now: DateTime<Utc>,
        expire_at: DateTime<Utc>,
    ) -> Result<OrphanSighting, StorageError> {
        let fresh_topics = orphans::encode_topics(&[topic.to_string()])?;
        let mut tx = self.pool.begin().await?;
        let inserted =
            orphans::insert_if_absent(shop_id, order_id, &fresh_topics, delivery_id, now, expire_at, &mut tx).await?;
        let first_sighting = if inserted {
            true
        } else {
            let existing = orphans::fetch_orphan(shop_id, order_id, &mut tx)
                .await?
                .ok_or_else(|| StorageError::Conflict(format!("orphan {shop_id}/{order_id} vanished")))?;
            if existing.expire_at <= now {
                orphans::restart(shop_id, order_id, &fresh_topics, delivery_id, now, expire_at, &mut tx).await?;
                true
            } else {
                let mut topics = existing.topics()?;
                if !topics.iter().any(|t| t == topic) {
                    topics.push(topic.to_string());
                }
                let topics = orphans::encode_topics(&topics)?;
                orphans::touch(shop_id, order_id, &topics, now, expire_at, &mut tx).await?;
                false
            }
        };
        let row = orphans::fetch_orphan(shop_id, order_id, &mut tx)
            .await?
            .ok_or_else(|| StorageError::Conflict(format!("orphan {shop_id}/{order_id} vanished")))?;
        tx.commit().await?;
        let record = OrphanRecord::try_from(row)?;
        Ok(OrphanSighting { first_sighting, record })
    }

    async fn fetch_orphan(&self, shop_id: &str, order_id: &str) -> Result<Option<OrphanRecord>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let row = orphans::fetch_orphan(shop_id, order_id, &mut conn).await?;
        row.map(OrphanRecord::try_from).transpose()
    }

    async fn prune_orphans(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let removed = orphans::delete_expired(now, &mut conn).await?;
        Ok(removed)
    }
}

impl EligibilityQueries for SqliteDatabase {
    async fn fetch_winning_predictions(&self, event_id: &str) -> Result<Vec<String>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let ids = predictions::fetch_correct_prediction_ids(event_id, &mut conn).await?;
        Ok(ids)
    }

    async fn fetch_eligible_orders_batch(
        &self,
        shop_id: &str,
        prediction_ids: &[String],
    ) -> Result<Vec<OrderRecord>, StorageError> {
        if prediction_ids.len() > MAX_IN_QUERY_VALUES {
            return Err(StorageError::QueryError(format!(
                "{} prediction ids in one query. The limit is {MAX_IN_QUERY_VALUES}",
                prediction_ids.len()
            )));
        }
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_eligible_for_predictions(shop_id, prediction_ids, &mut conn).await?;
        Ok(orders)
    }

    async fn upsert_prediction(&self, prediction: &Prediction) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        predictions::upsert_prediction(prediction, Utc::now(), &mut conn).await?;
        Ok(())
    }
}

impl CreditLedger for SqliteDatabase {
    async fn claim_credit(&self, claim: &CreditClaim) -> Result<ClaimResult, StorageError> {
        let now = Utc::now();
        let token = new_claim_token();
        let key = claim.idempotency_key.as_str();
        let mut tx = self.pool.begin().await?;
        if !credits::insert_claim(claim, &token, now, &mut tx).await? {
            match credits::fetch_credit(key, &mut tx).await? {
                Some(existing) if existing.shop_id != claim.shop_id || existing.order_id != claim.order_id => {
                    return Ok(ClaimResult::KeyInUse { shop_id: existing.shop_id, order_id: existing.order_id });
                },
                Some(existing) => match existing.status {
                    CreditStatus::Issued => return Ok(ClaimResult::AlreadyIssued(existing)),
                    CreditStatus::Pending if lease_held(&existing, claim, now) => {
                        return Ok(ClaimResult::InFlight { claimed_at: existing.claimed_at });
                    },
                    status => {
                        if let Some(result) = yield_to_rival(claim, now, &mut tx).await? {
                            return Ok(result);
                        }
                        debug!("🗃️ Re-claiming credit {key} (was {status})");
                        if credits::reclaim(claim, &token, now, &mut tx).await? != 1 {
                            return Err(StorageError::Conflict(format!("credit {key} could not be re-claimed")));
                        }
                    },
                },
                None => {
                    // The order is held under another key
                    if let Some(result) = yield_to_rival(claim, now, &mut tx).await? {
                        return Ok(result);
                    }
                    if !credits::insert_claim(claim, &token, now, &mut tx).await? {
                        return Err(StorageError::Conflict(format!("credit {key} could not be claimed")));
                    }
                },
            }
        }
        // Returning without a commit rolls the claim back.
        let Some(order) = orders::fetch_order(&claim.shop_id, &claim.order_id, &mut tx).await? else {
            return Ok(ClaimResult::OrderMissing);
        };
        if order.credited {
            return Ok(ClaimResult::OrderAlreadyCredited);
        }
        if claim.require_eligible && !order.eligible_pending {
            return Ok(ClaimResult::NotEligible);
        }
        tx.commit().await?;
        trace!("🗃️ Credit {key} claimed");
        Ok(ClaimResult::Claimed { token, order })
    }

    async fn finalize_credit(
        &self,
        idempotency_key: &str,
        claim_token: &str,
        external_ref: &str,
    ) -> Result<CreditRecord, StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if credits::mark_issued(idempotency_key, claim_token, external_ref, now, &mut tx).await? != 1 {
            return Err(StorageError::Conflict(format!("the claim on {idempotency_key} is no longer held")));
        }
        let credit = credits::fetch_credit(idempotency_key, &mut tx)
            .await?
            .ok_or_else(|| StorageError::Conflict(format!("credit {idempotency_key} vanished during finalize")))?;
        if orders::mark_credited(&credit.shop_id, &credit.order_id, now, &mut tx).await? != 1 {
            return Err(StorageError::OrderNotFound(format!("{}/{}", credit.shop_id, credit.order_id)));
        }
        tx.commit().await?;
        debug!("🗃️ Credit {idempotency_key} issued with reference {external_ref}");
        Ok(credit)
    }

    async fn fail_credit(&self, idempotency_key: &str, claim_token: &str, error: &str) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if credits::mark_failed(idempotency_key, claim_token, error, now, &mut tx).await? != 1 {
            return Err(StorageError::Conflict(format!("the claim on {idempotency_key} is no longer held")));
        }
        let credit = credits::fetch_credit(idempotency_key, &mut tx)
            .await?
            .ok_or_else(|| StorageError::Conflict(format!("credit {idempotency_key} vanished during fail")))?;
        orders::set_credit_error(&credit.shop_id, &credit.order_id, error, now, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_credit(&self, idempotency_key: &str) -> Result<Option<CreditRecord>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let credit = credits::fetch_credit(idempotency_key, &mut conn).await?;
        Ok(credit)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Brings the schema up to date with the migrations embedded in this crate.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {e}")))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
