use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::GameRecord;

const GAME_COLUMNS: &str = "id, shop_id, name, start_at, end_at, active";

/// The most recently started active game. Games without a start time sort last; equal start times fall back to id.
pub async fn fetch_active_game(shop_id: &str, conn: &mut SqliteConnection) -> Result<Option<GameRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE shop_id = $1 AND active = 1 \
         ORDER BY start_at IS NULL, start_at DESC, id ASC LIMIT 1"
    );
    let game = sqlx::query_as(&sql).bind(shop_id).fetch_optional(conn).await?;
    Ok(game)
}

pub async fn fetch_game(game_id: &str, conn: &mut SqliteConnection) -> Result<Option<GameRecord>, sqlx::Error> {
    let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE id = $1");
    let game = sqlx::query_as(&sql).bind(game_id).fetch_optional(conn).await?;
    Ok(game)
}

pub async fn upsert_game(
    game: &GameRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<GameRecord, sqlx::Error> {
    let sql = format!(
        r#"
            INSERT INTO games (id, shop_id, name, start_at, end_at, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (id) DO UPDATE SET
                shop_id = excluded.shop_id,
                name = excluded.name,
                start_at = excluded.start_at,
                end_at = excluded.end_at,
                active = excluded.active,
                updated_at = excluded.updated_at
            RETURNING {GAME_COLUMNS}
        "#
    );
    let game = sqlx::query_as(&sql)
        .bind(game.id.as_str())
        .bind(game.shop_id.as_str())
        .bind(game.name.as_str())
        .bind(game.start_at)
        .bind(game.end_at)
        .bind(game.active)
        .bind(now)
        .fetch_one(conn)
        .await?;
    Ok(game)
}
