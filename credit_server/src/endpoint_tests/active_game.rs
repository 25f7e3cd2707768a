use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use credit_engine::{db_types::GameRecord, GameApi, StorageError};

use super::{helpers::send, mocks::MockGameManager};
use crate::routes::ActiveGameRoute;

const SHOP: &str = "sqwad-demo.myshopify.com";

fn derby_day() -> GameRecord {
    GameRecord {
        id: "game-7".into(),
        shop_id: SHOP.into(),
        name: "Derby day".into(),
        start_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()),
        end_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()),
        active: true,
    }
}

fn configure_with(games: MockGameManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(ActiveGameRoute::<MockGameManager>::new()).app_data(web::Data::new(GameApi::new(games)));
    }
}

#[actix_web::test]
async fn active_game_found() {
    let _ = env_logger::try_init().ok();
    let mut games = MockGameManager::new();
    games.expect_fetch_active_game().withf(|shop| shop == SHOP).times(1).returning(|_| Ok(Some(derby_day())));
    // Shop domains are matched case-insensitively
    let req = TestRequest::get().uri("/api/active-game?shop=Sqwad-Demo.myshopify.com");
    let res = send(req, configure_with(games)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    assert_eq!(res.header("cache-control"), Some("public, max-age=30"));
    let body = res.json();
    assert_eq!(body["active"], true);
    assert_eq!(body["id"], "game-7");
    assert_eq!(body["name"], "Derby day");
    assert_eq!(body["startAt"], "2025-03-01T12:00:00Z");
    assert_eq!(body["endAt"], "2025-03-01T18:00:00Z");
}

#[actix_web::test]
async fn no_active_game() {
    let mut games = MockGameManager::new();
    games.expect_fetch_active_game().returning(|_| Ok(None));
    let req = TestRequest::get().uri(&format!("/api/active-game?shop={SHOP}"));
    let res = send(req, configure_with(games)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, r#"{"active":false}"#);
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
}

#[actix_web::test]
async fn missing_shop_parameter() {
    for uri in ["/api/active-game", "/api/active-game?shop=", "/api/active-game?shop=%20%20"] {
        let res = send(TestRequest::get().uri(uri), configure_with(MockGameManager::new())).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(res.json()["error"], "Missing shop parameter");
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    }
}

#[actix_web::test]
async fn storage_failure_keeps_cors() {
    let mut games = MockGameManager::new();
    games.expect_fetch_active_game().returning(|_| Err(StorageError::DatabaseError("disk on fire".into())));
    let req = TestRequest::get().uri(&format!("/api/active-game?shop={SHOP}"));
    let res = send(req, configure_with(games)).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    assert!(!res.body.contains("disk on fire"));
}

#[actix_web::test]
async fn preflight() {
    let req = TestRequest::default().method(actix_web::http::Method::OPTIONS).uri("/api/active-game?shop=x");
    let res = send(req, configure_with(MockGameManager::new())).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    assert_eq!(res.header("access-control-allow-methods"), Some("GET, OPTIONS"));
    assert!(res.body.is_empty());
}

#[actix_web::test]
async fn other_methods_are_not_allowed() {
    for req in [TestRequest::post(), TestRequest::put(), TestRequest::delete()] {
        let req = req.uri(&format!("/api/active-game?shop={SHOP}"));
        let res = send(req, configure_with(MockGameManager::new())).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.header("allow"), Some("GET, OPTIONS"));
    }
}
