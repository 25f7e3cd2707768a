use crate::{db_types::GameRecord, traits::StorageError};

#[allow(async_fn_in_trait)]
pub trait GameManagement {
    /// The active game for the shop. If more than one game is flagged active, the one with the latest start time
    /// wins (ties broken by id).
    async fn fetch_active_game(&self, shop_id: &str) -> Result<Option<GameRecord>, StorageError>;

    async fn fetch_game(&self, game_id: &str) -> Result<Option<GameRecord>, StorageError>;

    async fn upsert_game(&self, game: &GameRecord) -> Result<GameRecord, StorageError>;
}
