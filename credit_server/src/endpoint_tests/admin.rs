use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use credit_common::Secret;
use credit_engine::{
    db_types::GameRecord,
    events::EventProducers,
    test_utils::{
        fake_gateway::FakeGateway,
        prepare_env::{drop_database, fresh_database},
    },
    CreditApi,
    GameApi,
    SqliteDatabase,
};
use serde_json::json;

use super::{helpers::send, mocks::MockGameManager};
use crate::{
    middleware::{AdminTokenMiddlewareFactory, ADMIN_TOKEN_HEADER},
    routes::{GameRoute, IssueCreditsRoute, UpsertGameRoute},
};

const TOKEN: &str = "correct-horse-battery-staple";

fn game_admin(games: MockGameManager, token: &'static str) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let scope = web::scope("/api")
            .wrap(AdminTokenMiddlewareFactory::new(Secret::new(token.to_string())))
            .service(GameRoute::<MockGameManager>::new())
            .service(UpsertGameRoute::<MockGameManager>::new());
        cfg.service(scope).app_data(web::Data::new(GameApi::new(games)));
    }
}

fn derby_day() -> GameRecord {
    GameRecord {
        id: "game-7".into(),
        shop_id: "sqwad-demo.myshopify.com".into(),
        name: "Derby day".into(),
        start_at: None,
        end_at: None,
        active: true,
    }
}

#[actix_web::test]
async fn missing_admin_token() {
    let _ = env_logger::try_init().ok();
    let res = send(TestRequest::get().uri("/api/games/game-7"), game_admin(MockGameManager::new(), TOKEN)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"], "Authentication Error. Missing or invalid admin token.");
}

#[actix_web::test]
async fn wrong_admin_token() {
    let req = TestRequest::get().uri("/api/games/game-7").insert_header((ADMIN_TOKEN_HEADER, "correct-horse"));
    let res = send(req, game_admin(MockGameManager::new(), TOKEN)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn unset_admin_token_locks_the_scope() {
    let req = TestRequest::get().uri("/api/games/game-7").insert_header((ADMIN_TOKEN_HEADER, ""));
    let res = send(req, game_admin(MockGameManager::new(), "")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn fetch_game() {
    let mut games = MockGameManager::new();
    games.expect_fetch_game().withf(|id| id == "game-7").returning(|_| Ok(Some(derby_day())));
    let req = TestRequest::get().uri("/api/games/game-7").insert_header((ADMIN_TOKEN_HEADER, TOKEN));
    let res = send(req, game_admin(games, TOKEN)).await;
    assert_eq!(res.status, StatusCode::OK);
    let game: GameRecord = serde_json::from_str(&res.body).unwrap();
    assert_eq!(game, derby_day());

    let mut games = MockGameManager::new();
    games.expect_fetch_game().returning(|_| Ok(None));
    let req = TestRequest::get().uri("/api/games/game-8").insert_header((ADMIN_TOKEN_HEADER, TOKEN));
    let res = send(req, game_admin(games, TOKEN)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn upsert_game_normalizes_the_shop() {
    let mut games = MockGameManager::new();
    games
        .expect_upsert_game()
        .withf(|g| g.shop_id == "sqwad-demo.myshopify.com")
        .times(1)
        .returning(|g| Ok(g.clone()));
    let body = json!({
        "id": "game-7",
        "shopId": " SQWAD-demo.myshopify.com ",
        "name": "Derby day",
        "startAt": null,
        "endAt": null,
        "active": true
    });
    let req = TestRequest::post().uri("/api/games").insert_header((ADMIN_TOKEN_HEADER, TOKEN)).set_json(body);
    let res = send(req, game_admin(games, TOKEN)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["shopId"], "sqwad-demo.myshopify.com");
}

#[actix_web::test]
async fn upsert_game_needs_an_id() {
    let mut games = MockGameManager::new();
    games.expect_upsert_game().never();
    let body = json!({ "id": " ", "shopId": "a.myshopify.com", "name": "x", "active": true });
    let req = TestRequest::post().uri("/api/games").insert_header((ADMIN_TOKEN_HEADER, TOKEN)).set_json(body);
    let res = send(req, game_admin(games, TOKEN)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

fn credit_admin(db: SqliteDatabase, gateway: FakeGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = CreditApi::new(db, gateway, EventProducers::default());
        let scope = web::scope("/api")
            .wrap(AdminTokenMiddlewareFactory::new(Secret::new(TOKEN.to_string())))
            .service(IssueCreditsRoute::<SqliteDatabase, FakeGateway>::new());
        cfg.service(scope).app_data(web::Data::new(api));
    }
}

async fn post_credits(db: &SqliteDatabase, gateway: &FakeGateway, body: &str) -> super::helpers::TestResponse {
    let req = TestRequest::post()
        .uri("/api/credits")
        .insert_header((ADMIN_TOKEN_HEADER, TOKEN))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    send(req, credit_admin(db.clone(), gateway.clone())).await
}

#[actix_web::test]
async fn rejected_credit_requests() {
    let (url, db) = fresh_database().await;
    let gateway = FakeGateway::new();
    let cases = [
        ("", "Empty request body"),
        (r#"{"shopId": "", "eventId": "ev-1"}"#, "Missing shopId"),
        (r#"{"shopId": "a.myshopify.com", "eventId": " "}"#, "missing eventId"),
        (r#"{"shopId": "a.myshopify.com", "orders": []}"#, "No orders supplied"),
    ];
    for (body, reason) in cases {
        let res = post_credits(&db, &gateway, body).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{body}");
        let report = res.json();
        assert_eq!(report["ok"], false);
        assert_eq!(report["failures"][0]["error"], reason, "{body}");
    }
    let res = post_credits(&db, &gateway, "{ not json").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json()["failures"][0]["error"].as_str().unwrap().starts_with("Malformed credit request."));
    assert!(gateway.calls().is_empty());
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn credit_run_without_winners() {
    let (url, db) = fresh_database().await;
    let gateway = FakeGateway::new();
    let res = post_credits(&db, &gateway, r#"{"shopId": "a.myshopify.com", "eventId": "ev-1"}"#).await;
    assert_eq!(res.status, StatusCode::OK);
    let report = res.json();
    assert_eq!(report["ok"], true);
    assert_eq!(report["credited"], 0);
    assert_eq!(report["reason"], "no winners");
    assert!(gateway.calls().is_empty());
    drop_database(&url, db).await;
}
