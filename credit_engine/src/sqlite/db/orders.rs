use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{OrderId, OrderPatch, OrderRecord};

/// Creates an empty record for the order, filed under `game_id` if one is given. Returns `false` if the order already
/// exists, in which case nothing is changed.
pub async fn insert_if_absent(
    shop_id: &str,
    order_id: &OrderId,
    game_id: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO orders (shop_id, order_id, order_gid, game_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (shop_id, order_id) DO NOTHING
        "#,
    )
    .bind(shop_id)
    .bind(order_id)
    .bind(order_id.gid())
    .bind(game_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Merges the patch into an existing record in a single statement. `None` fields keep their stored value.
///
/// The statement refuses to raise `eligible_pending` on a record that is already credited.
/// Returns the number of rows changed (0 if the record does not exist).
pub async fn apply_patch(
    shop_id: &str,
    order_id: &OrderId,
    game_id: Option<&str>,
    patch: &OrderPatch,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                game_id = COALESCE($1, game_id),
                order_name = COALESCE($2, order_name),
                customer_id = COALESCE($3, customer_id),
                customer_email = COALESCE($4, customer_email),
                currency = COALESCE($5, currency),
                subtotal = COALESCE($6, subtotal),
                total = COALESCE($7, total),
                financial_status = COALESCE($8, financial_status),
                cancelled_at = COALESCE($9, cancelled_at),
                opt_in = COALESCE($10, opt_in),
                prediction_id = COALESCE($11, prediction_id),
                user_id = COALESCE($12, user_id),
                eligible_pending = CASE WHEN credited THEN 0 ELSE COALESCE($13, eligible_pending) END,
                registered = COALESCE($14, registered),
                order_created_at = COALESCE($15, order_created_at),
                updated_at = $16
            WHERE shop_id = $17 AND order_id = $18
        "#,
    )
    .bind(game_id)
    .bind(patch.order_name.as_deref())
    .bind(patch.customer_id.as_deref())
    .bind(patch.customer_email.as_deref())
    .bind(patch.currency.as_deref())
    .bind(patch.subtotal)
    .bind(patch.total)
    .bind(patch.financial_status)
    .bind(patch.cancelled_at)
    .bind(patch.opt_in)
    .bind(patch.prediction_id.as_deref())
    .bind(patch.user_id.as_deref())
    .bind(patch.eligible_pending)
    .bind(patch.registered)
    .bind(patch.order_created_at)
    .bind(now)
    .bind(shop_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    trace!("🗃️ Patch for order {shop_id}/{order_id} changed {} rows", result.rows_affected());
    Ok(result.rows_affected())
}

pub async fn fetch_order(
    shop_id: &str,
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderRecord>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE shop_id = $1 AND order_id = $2")
        .bind(shop_id)
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn set_registered(
    shop_id: &str,
    order_id: &OrderId,
    registered: bool,
    clear_pending: bool,
    game_id: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                registered = $1,
                eligible_pending = CASE WHEN $2 THEN 0 ELSE eligible_pending END,
                game_id = COALESCE($3, game_id),
                updated_at = $4
            WHERE shop_id = $5 AND order_id = $6
        "#,
    )
    .bind(registered)
    .bind(clear_pending)
    .bind(game_id)
    .bind(now)
    .bind(shop_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Flips the order to credited. Only the credit ledger calls this, inside its finalize transaction.
pub async fn mark_credited(
    shop_id: &str,
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET credited = 1, eligible_pending = 0, credit_error = NULL, updated_at = $1
            WHERE shop_id = $2 AND order_id = $3
        "#,
    )
    .bind(now)
    .bind(shop_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_credit_error(
    shop_id: &str,
    order_id: &OrderId,
    error: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE orders SET credit_error = $1, updated_at = $2 WHERE shop_id = $3 AND order_id = $4")
            .bind(error)
            .bind(now)
            .bind(shop_id)
            .bind(order_id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected())
}

/// Eligible, uncredited orders linked to any of `prediction_ids`, oldest first.
///
/// Callers are responsible for keeping `prediction_ids` within the batch limit.
pub async fn fetch_eligible_for_predictions(
    shop_id: &str,
    prediction_ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderRecord>, sqlx::Error> {
    if prediction_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM orders WHERE shop_id = ");
    builder.push_bind(shop_id);
    builder.push(" AND eligible_pending = 1 AND credited = 0 AND prediction_id IN (");
    let mut ids = builder.separated(", ");
    for id in prediction_ids {
        ids.push_bind(id);
    }
    builder.push(") ORDER BY created_at ASC, order_id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<OrderRecord>().fetch_all(conn).await?;
    Ok(orders)
}
