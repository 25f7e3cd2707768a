//! Admin token middleware.
//!
//! Guards the operator endpoints (credit runs, tenant, game and prediction administration). The caller must send the
//! configured token in the `X-Admin-Token` header; anything else gets a 401. An unset token locks the scope.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use credit_common::Secret;
use futures::future::LocalBoxFuture;
use log::warn;

use crate::errors::ServerError;

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

pub struct AdminTokenMiddlewareFactory {
    token: Secret<String>,
}

impl AdminTokenMiddlewareFactory {
    pub fn new(token: Secret<String>) -> Self {
        AdminTokenMiddlewareFactory { token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminTokenMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminTokenMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminTokenMiddlewareService { token: self.token.clone(), service: Rc::new(service) }))
    }
}

pub struct AdminTokenMiddlewareService<S> {
    token: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminTokenMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let presented = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()).map(str::trim);
        let allowed = presented.map(|t| self.token.matches(t)).unwrap_or(false);
        let path = req.path().to_string();
        Box::pin(async move {
            if allowed {
                service.call(req).await
            } else {
                warn!("🔐️ Rejected admin request to {path}: missing or invalid admin token");
                Err(ServerError::AuthenticationError("Missing or invalid admin token.".into()).into())
            }
        })
    }
}
