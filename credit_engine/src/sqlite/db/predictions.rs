use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{Prediction, PredictionStatus};

pub async fn fetch_correct_prediction_ids(
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, sqlx::Error> {
    let ids = sqlx::query_scalar("SELECT id FROM predictions WHERE event_id = $1 AND status = $2 ORDER BY id")
        .bind(event_id)
        .bind(PredictionStatus::Correct)
        .fetch_all(conn)
        .await?;
    Ok(ids)
}

pub async fn upsert_prediction(
    prediction: &Prediction,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO predictions (id, event_id, status, user_id, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                event_id = excluded.event_id,
                status = excluded.status,
                user_id = COALESCE(excluded.user_id, predictions.user_id),
                updated_at = excluded.updated_at
        "#,
    )
    .bind(prediction.id.as_str())
    .bind(prediction.event_id.as_str())
    .bind(prediction.status)
    .bind(prediction.user_id.as_deref())
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}
