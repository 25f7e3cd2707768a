use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{NewTenant, Tenant};

pub async fn fetch_tenant(shop_id: &str, conn: &mut SqliteConnection) -> Result<Option<Tenant>, sqlx::Error> {
    let tenant = sqlx::query_as("SELECT * FROM tenants WHERE shop_id = $1").bind(shop_id).fetch_optional(conn).await?;
    Ok(tenant)
}

/// Inserts or replaces the tenant's flags and credentials. Credentials that are not supplied are kept.
pub async fn upsert_tenant(
    tenant: &NewTenant,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Tenant, sqlx::Error> {
    let tenant = sqlx::query_as(
        r#"
            INSERT INTO tenants (shop_id, active, access_token, webhook_secret, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (shop_id) DO UPDATE SET
                active = excluded.active,
                access_token = COALESCE(excluded.access_token, tenants.access_token),
                webhook_secret = COALESCE(excluded.webhook_secret, tenants.webhook_secret),
                updated_at = excluded.updated_at
            RETURNING *
        "#,
    )
    .bind(tenant.shop_id.as_str())
    .bind(tenant.active)
    .bind(tenant.access_token.as_deref())
    .bind(tenant.webhook_secret.as_deref())
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(tenant)
}
