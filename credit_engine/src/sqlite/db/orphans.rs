use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::{db_types::OrphanRecord, traits::StorageError};

/// Storage shape of an orphan alert. The topic set is held as a JSON array.
#[derive(Debug, Clone, FromRow)]
pub struct OrphanRow {
    pub shop_id: String,
    pub order_id: String,
    pub topics: String,
    pub first_delivery_id: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

impl OrphanRow {
    pub fn topics(&self) -> Result<Vec<String>, StorageError> {
        serde_json::from_str(&self.topics)
            .map_err(|e| StorageError::CorruptData(format!("orphan {}/{} topics: {e}", self.shop_id, self.order_id)))
    }
}

impl TryFrom<OrphanRow> for OrphanRecord {
    type Error = StorageError;

    fn try_from(row: OrphanRow) -> Result<Self, Self::Error> {
        let topics = row.topics()?;
        Ok(Self {
            shop_id: row.shop_id,
            order_id: row.order_id,
            topics,
            first_delivery_id: row.first_delivery_id,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
            expire_at: row.expire_at,
        })
    }
}

pub fn encode_topics(topics: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(topics).map_err(|e| StorageError::CorruptData(e.to_string()))
}

pub async fn fetch_orphan(
    shop_id: &str,
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<OrphanRow>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM orphan_alerts WHERE shop_id = $1 AND order_id = $2")
        .bind(shop_id)
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Returns `false` if a record for (shop, order) already exists.
pub async fn insert_if_absent(
    shop_id: &str,
    order_id: &str,
    topics: &str,
    delivery_id: &str,
    now: DateTime<Utc>,
    expire_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO orphan_alerts
                (shop_id, order_id, topics, first_delivery_id, first_seen_at, last_seen_at, expire_at)
            VALUES ($1, $2, $3, $4, $5, $5, $6)
            ON CONFLICT (shop_id, order_id) DO NOTHING
        "#,
    )
    .bind(shop_id)
    .bind(order_id)
    .bind(topics)
    .bind(delivery_id)
    .bind(now)
    .bind(expire_at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Starts the record over, as if it had never been seen. Used when the stored record has expired but has not been
/// pruned yet.
pub async fn restart(
    shop_id: &str,
    order_id: &str,
    topics: &str,
    delivery_id: &str,
    now: DateTime<Utc>,
    expire_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orphan_alerts SET
                topics = $1,
                first_delivery_id = $2,
                first_seen_at = $3,
                last_seen_at = $3,
                expire_at = $4
            WHERE shop_id = $5 AND order_id = $6
        "#,
    )
    .bind(topics)
    .bind(delivery_id)
    .bind(now)
    .bind(expire_at)
    .bind(shop_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn touch(
    shop_id: &str,
    order_id: &str,
    topics: &str,
    now: DateTime<Utc>,
    expire_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orphan_alerts SET topics = $1, last_seen_at = $2, expire_at = $3
            WHERE shop_id = $4 AND order_id = $5
        "#,
    )
    .bind(topics)
    .bind(now)
    .bind(expire_at)
    .bind(shop_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_expired(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orphan_alerts WHERE expire_at <= $1").bind(now).execute(conn).await?;
    Ok(result.rows_affected())
}
