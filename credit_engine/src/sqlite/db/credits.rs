use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{CreditRecord, CreditStatus, OrderId},
    traits::CreditClaim,
};

pub async fn fetch_credit(key: &str, conn: &mut SqliteConnection) -> Result<Option<CreditRecord>, sqlx::Error> {
    let credit =
        sqlx::query_as("SELECT * FROM credits WHERE idempotency_key = $1").bind(key).fetch_optional(conn).await?;
    Ok(credit)
}

/// Inserts a `pending` row for the claim. Returns `false` if a row for the key already exists, or if the order already
/// has a pending or issued credit under another key. Being a write, this also takes the database write lock for the
/// rest of the enclosing transaction.
pub async fn insert_claim(
    claim: &CreditClaim,
    token: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO credits (
                idempotency_key,
                shop_id,
                order_id,
                prediction_id,
                user_id,
                amount,
                currency,
                mode,
                status,
                claim_token,
                claimed_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, $11)
            ON CONFLICT DO NOTHING
        "#,
    )
    .bind(claim.idempotency_key.as_str())
    .bind(claim.shop_id.as_str())
    .bind(&claim.order_id)
    .bind(claim.prediction_id.as_deref())
    .bind(claim.user_id.as_deref())
    .bind(claim.amount)
    .bind(claim.currency.as_deref())
    .bind(claim.mode)
    .bind(CreditStatus::Pending)
    .bind(token)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// The pending or issued credit for the order held under a key other than `key`, if any.
pub async fn fetch_live_rival(
    shop_id: &str,
    order_id: &OrderId,
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CreditRecord>, sqlx::Error> {
    let credit = sqlx::query_as(
        r#"
            SELECT * FROM credits
            WHERE shop_id = $1 AND order_id = $2 AND idempotency_key != $3 AND status IN ('pending', 'issued')
        "#,
    )
    .bind(shop_id)
    .bind(order_id)
    .bind(key)
    .fetch_optional(conn)
    .await?;
    Ok(credit)
}

/// Fails a pending claim whose lease has run out, so that the order can be claimed under another key.
pub async fn expire_claim(
    key: &str,
    error: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE credits SET status = $1, error = $2, updated_at = $3 WHERE idempotency_key = $4 AND status = 'pending'",
    )
    .bind(CreditStatus::Failed)
    .bind(error)
    .bind(now)
    .bind(key)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Takes over an existing `failed` or stale `pending` row. Issued rows are never matched.
pub async fn reclaim(
    claim: &CreditClaim,
    token: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE credits SET
                prediction_id = $1,
                user_id = $2,
                amount = $3,
                currency = $4,
                mode = $5,
                status = $6,
                error = NULL,
                claim_token = $7,
                claimed_at = $8,
                updated_at = $8
            WHERE idempotency_key = $9 AND status != 'issued'
        "#,
    )
    .bind(claim.prediction_id.as_deref())
    .bind(claim.user_id.as_deref())
    .bind(claim.amount)
    .bind(claim.currency.as_deref())
    .bind(claim.mode)
    .bind(CreditStatus::Pending)
    .bind(token)
    .bind(now)
    .bind(claim.idempotency_key.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Moves a pending claim to `issued`. Matches only if `token` still holds the claim.
pub async fn mark_issued(
    key: &str,
    token: &str,
    external_ref: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE credits SET status = $1, external_ref = $2, error = NULL, issued_at = $3, updated_at = $3
            WHERE idempotency_key = $4 AND status = 'pending' AND claim_token = $5
        "#,
    )
    .bind(CreditStatus::Issued)
    .bind(external_ref)
    .bind(now)
    .bind(key)
    .bind(token)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn mark_failed(
    key: &str,
    token: &str,
    error: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE credits SET status = $1, error = $2, updated_at = $3
            WHERE idempotency_key = $4 AND status = 'pending' AND claim_token = $5
        "#,
    )
    .bind(CreditStatus::Failed)
    .bind(error)
    .bind(now)
    .bind(key)
    .bind(token)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
