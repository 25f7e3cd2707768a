mod admin;
mod hmac;

pub use admin::{AdminTokenMiddlewareFactory, AdminTokenMiddlewareService, ADMIN_TOKEN_HEADER};
pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService, HMAC_HEADER, SHOP_HEADER};
