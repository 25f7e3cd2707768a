use credit_engine::{db_types::GameRecord, GameManagement, StorageError};
use mockall::mock;

mock! {
    pub GameManager {}
    impl GameManagement for GameManager {
        async fn fetch_active_game(&self, shop_id: &str) -> Result<Option<GameRecord>, StorageError>;
        async fn fetch_game(&self, game_id: &str) -> Result<Option<GameRecord>, StorageError>;
        async fn upsert_game(&self, game: &GameRecord) -> Result<GameRecord, StorageError>;
    }
}
