use actix_web::{
    body::to_bytes,
    http::{header::HeaderMap, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use log::debug;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// Sends `req` to an app built by `configure`. Errors raised by middleware are rendered into responses, the way the
/// running server would.
pub async fn send<F>(req: TestRequest, configure: F) -> TestResponse
where F: FnOnce(&mut ServiceConfig) {
    let app = test::init_service(App::new().configure(configure)).await;
    debug!("Making request");
    match test::try_call_service(&app, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let headers = res.headers().clone();
            let body = to_bytes(res.into_body()).await.unwrap_or_default();
            TestResponse { status, headers, body: String::from_utf8_lossy(&body).into_owned() }
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let headers = res.headers().clone();
            let body = to_bytes(res.into_body()).await.unwrap_or_default();
            TestResponse { status, headers, body: String::from_utf8_lossy(&body).into_owned() }
        },
    }
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Response body is not JSON")
    }
}
