use crate::{
    db_types::{NewTenant, Tenant},
    traits::StorageError,
};

#[allow(async_fn_in_trait)]
pub trait TenantManagement: Clone {
    async fn fetch_tenant(&self, shop_id: &str) -> Result<Option<Tenant>, StorageError>;

    /// Unknown shops are treated as inactive.
    async fn is_active(&self, shop_id: &str) -> Result<bool, StorageError> {
        Ok(self.fetch_tenant(shop_id).await?.map(|t| t.active).unwrap_or(false))
    }

    async fn upsert_tenant(&self, tenant: &NewTenant) -> Result<Tenant, StorageError>;
}
