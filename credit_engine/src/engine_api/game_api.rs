use std::fmt::Debug;

use log::*;

use crate::{
    db_types::GameRecord,
    traits::{GameManagement, StorageError},
};

pub struct GameApi<B> {
    db: B,
}

impl<B: Debug> Debug for GameApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GameApi ({:?})", self.db)
    }
}

impl<B> GameApi<B>
where B: GameManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn active_game(&self, shop_id: &str) -> Result<Option<GameRecord>, StorageError> {
        let game = self.db.fetch_active_game(shop_id).await?;
        match &game {
            Some(g) => trace!("🎲️ Active game for {shop_id} is {}", g.id),
            None => trace!("🎲️ {shop_id} has no active game"),
        }
        Ok(game)
    }

    pub async fn fetch_game(&self, game_id: &str) -> Result<Option<GameRecord>, StorageError> {
        self.db.fetch_game(game_id).await
    }

    pub async fn upsert_game(&self, game: &GameRecord) -> Result<GameRecord, StorageError> {
        let game = self.db.upsert_game(game).await?;
        info!("🎲️ Game {} for {} saved. Active: {}", game.id, game.shop_id, game.active);
        Ok(game)
    }
}
