use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The base64-encoded HMAC-SHA256 of `data`, as Shopify sends it in `X-Shopify-Hmac-Sha256`.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()) else {
        return String::default();
    };
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

/// Checks a base64 signature against `data` in constant time. Malformed signatures never match.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

/// The trimmed value of a header, or `None` if it is missing, blank or not valid text.
pub fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Shop domains are case-insensitive. Every shop id the server handles goes through here.
pub fn normalize_shop(shop: &str) -> String {
    shop.trim().to_ascii_lowercase()
}
