use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewTenant, Tenant},
    traits::{StorageError, TenantManagement},
};

/// Onboarding and offboarding of shops.
pub struct TenantApi<B> {
    db: B,
}

impl<B: Debug> Debug for TenantApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TenantApi ({:?})", self.db)
    }
}

impl<B> TenantApi<B>
where B: TenantManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn fetch_tenant(&self, shop_id: &str) -> Result<Option<Tenant>, StorageError> {
        self.db.fetch_tenant(shop_id).await
    }

    pub async fn upsert_tenant(&self, tenant: &NewTenant) -> Result<Tenant, StorageError> {
        if tenant.shop_id.trim().is_empty() {
            return Err(StorageError::QueryError("A tenant needs a shop id".to_string()));
        }
        let tenant = self.db.upsert_tenant(tenant).await?;
        let state = if tenant.active { "active" } else { "inactive" };
        info!("🛍️ Tenant {} saved. It is {state}", tenant.shop_id);
        Ok(tenant)
    }
}
