#![allow(dead_code)]
use chrono::{Duration, Utc};
use credit_common::Amount;
use credit_engine::{
    db_types::{FinancialStatus, GameRecord, NewTenant, OrderId, OrderPatch, Prediction, PredictionStatus},
    test_utils::prepare_env::{drop_database, fresh_database},
    EligibilityQueries,
    GameManagement,
    OrderLedger,
    SqliteDatabase,
    TenantManagement,
};

pub const SHOP: &str = "sqwad-demo.myshopify.com";
pub const GAME: &str = "game-1";

pub struct TestDb {
    pub url: String,
    pub db: SqliteDatabase,
}

impl TestDb {
    pub async fn new() -> Self {
        let (url, db) = fresh_database().await;
        Self { url, db }
    }

    /// A database with an active tenant and an active game for [`SHOP`].
    pub async fn with_active_game() -> Self {
        let test = Self::new().await;
        test.activate(SHOP).await;
        test.start_game(SHOP, GAME).await;
        test
    }

    pub async fn activate(&self, shop_id: &str) {
        let tenant = NewTenant {
            shop_id: shop_id.to_string(),
            active: true,
            access_token: Some("shpat_test".into()),
            webhook_secret: Some("whsec".into()),
        };
        self.db.upsert_tenant(&tenant).await.expect("Error creating tenant");
    }

    pub async fn start_game(&self, shop_id: &str, game_id: &str) {
        let game = GameRecord {
            id: game_id.to_string(),
            shop_id: shop_id.to_string(),
            name: format!("Game {game_id}"),
            start_at: Some(Utc::now() - Duration::days(1)),
            end_at: None,
            active: true,
        };
        self.db.upsert_game(&game).await.expect("Error creating game");
    }

    pub async fn win(&self, prediction_id: &str, event_id: &str) {
        let prediction = Prediction {
            id: prediction_id.to_string(),
            event_id: event_id.to_string(),
            status: PredictionStatus::Correct,
            user_id: None,
        };
        self.db.upsert_prediction(&prediction).await.expect("Error saving prediction");
    }

    /// Seeds an eligible, paid order linked to `prediction_id`, placed two days ago.
    pub async fn eligible_order(&self, order: u64, prediction_id: &str, subtotal: &str) -> OrderId {
        let order_id = OrderId::from_number(order);
        let subtotal = subtotal.parse::<Amount>().expect("Invalid amount");
        let patch = OrderPatch {
            customer_email: Some(format!("customer{order}@example.com")),
            order_created_at: Some(Utc::now() - Duration::days(2)),
            ..Default::default()
        }
        .with_amounts("USD", subtotal, subtotal)
        .with_financial_status(FinancialStatus::Paid)
        .with_prediction(true, Some(prediction_id.to_string()), None)
        .with_eligible_pending(true);
        self.db.upsert_order(SHOP, &order_id, Some(GAME), &patch).await.expect("Error seeding order");
        order_id
    }

    pub async fn tear_down(self) {
        drop_database(&self.url, self.db).await;
    }
}
