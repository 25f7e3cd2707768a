//! HMAC middleware for Actix Web.
//!
//! Shopify signs every webhook delivery with HMAC-SHA256 over the raw request body and sends the base64 digest in the
//! `X-Shopify-Hmac-Sha256` header. The key is the shop's own webhook secret if one is stored on its tenant record,
//! and the server-wide `OCS_SHOPIFY_HMAC_SECRET` otherwise.
//!
//! Wrap the Shopify webhook scope with this middleware. A request that fails the check is rejected with 401 before
//! any handler runs, so nothing is written for it.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use credit_common::Secret;
use credit_engine::TenantManagement;
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::{
    errors::ServerError,
    helpers::{normalize_shop, verify_hmac},
};

pub const HMAC_HEADER: &str = "X-Shopify-Hmac-Sha256";
pub const SHOP_HEADER: &str = "X-Shopify-Shop-Domain";

pub struct HmacMiddlewareFactory<B> {
    tenants: B,
    default_key: Secret<String>,
    // If false, then the middleware will not check the HMAC signature and always allow the call
    enabled: bool,
}

impl<B> HmacMiddlewareFactory<B> {
    pub fn new(tenants: B, default_key: Secret<String>, enabled: bool) -> Self {
        HmacMiddlewareFactory { tenants, default_key, enabled }
    }
}

impl<S, T, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory<T>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    T: TenantManagement + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S, T>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            tenants: self.tenants.clone(),
            default_key: self.default_key.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S, T> {
    tenants: T,
    default_key: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, T, B> Service<ServiceRequest> for HmacMiddlewareService<S, T>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    T: TenantManagement + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let tenants = self.tenants.clone();
        let default_key = self.default_key.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking HMAC for request");
            if !enabled {
                trace!("🔐️ HMAC checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let signature = req
                .headers()
                .get(HMAC_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
                .ok_or_else(|| {
                    warn!("🔐️ No HMAC signature found in request. Denying access.");
                    ServerError::AuthenticationError("No HMAC signature found.".into())
                })?;
            let shop = req.headers().get(SHOP_HEADER).and_then(|v| v.to_str().ok()).map(normalize_shop);
            let key = signing_key(&tenants, shop.as_deref(), &default_key).await?;
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ServerError::InvalidRequestBody("Failed to extract request data.".into())
            })?;
            if verify_hmac(key.reveal(), data.as_ref(), &signature) {
                trace!("🔐️ HMAC check for request ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid HMAC signature found in request for {shop:?}. Denying access.");
                Err(ServerError::AuthenticationError("Invalid HMAC signature.".into()).into())
            }
        })
    }
}

/// The shop's own webhook secret if it has one, else the server-wide secret.
async fn signing_key<T: TenantManagement>(
    tenants: &T,
    shop: Option<&str>,
    default_key: &Secret<String>,
) -> Result<Secret<String>, ServerError> {
    let tenant_key = match shop {
        Some(shop) => tenants
            .fetch_tenant(shop)
            .await
            .map_err(|e| ServerError::BackendError(e.to_string()))?
            .and_then(|t| t.webhook_secret)
            .filter(|s| !s.is_empty()),
        None => None,
    };
    match tenant_key {
        Some(key) => Ok(Secret::new(key)),
        None if !default_key.is_empty() => Ok(default_key.clone()),
        None => {
            warn!("🔐️ No webhook secret is configured for {shop:?}. Denying access.");
            Err(ServerError::AuthenticationError("No webhook secret is configured for this shop.".into()))
        },
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
