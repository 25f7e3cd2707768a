use chrono::{Duration, Utc};
use credit_engine::{
    db_types::{GameRecord, NewTenant, Prediction, PredictionStatus},
    EligibilityQueries,
    GameManagement,
    TenantManagement,
};
use cucumber::given;

use crate::cucumber::{world::CreditSystem, CreditWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut CreditWorld) {
    let system = CreditSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "the shop {string} is active")]
async fn active_shop(world: &mut CreditWorld, shop_id: String) {
    let tenant = NewTenant { shop_id, active: true, access_token: None, webhook_secret: None };
    world.system().db.upsert_tenant(&tenant).await.expect("Error creating tenant");
}

#[given(expr = "the shop {string} is not onboarded")]
async fn inactive_shop(world: &mut CreditWorld, shop_id: String) {
    let tenant = NewTenant { shop_id, active: false, access_token: None, webhook_secret: None };
    world.system().db.upsert_tenant(&tenant).await.expect("Error creating tenant");
}

#[given(expr = "the shop {string} is running game {string}")]
async fn active_game(world: &mut CreditWorld, shop_id: String, game_id: String) {
    let game = GameRecord {
        id: game_id.clone(),
        shop_id,
        name: game_id,
        start_at: Some(Utc::now() - Duration::days(7)),
        end_at: None,
        active: true,
    };
    world.system().db.upsert_game(&game).await.expect("Error creating game");
}

#[given(expr = "prediction {string} won event {string}")]
async fn winning_prediction(world: &mut CreditWorld, prediction_id: String, event_id: String) {
    let prediction = Prediction { id: prediction_id, event_id, status: PredictionStatus::Correct, user_id: None };
    world.system().db.upsert_prediction(&prediction).await.expect("Error saving prediction");
}
