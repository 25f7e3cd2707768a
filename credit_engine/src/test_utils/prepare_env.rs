use std::path::Path;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/test_credits_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// Creates a fresh, migrated database at a random path and connects to it.
pub async fn fresh_database() -> (String, SqliteDatabase) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    (url, db)
}

pub async fn drop_database(url: &str, db: SqliteDatabase) {
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
}
