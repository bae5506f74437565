#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::Arc;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use stablebook_lib::{
    chat::{ChatBackend, UnconfiguredChat},
    config::{AdminAllowList, AppConfig},
    model::{Gender, HorseInput},
    remote::{DisabledRemoteStore, RemoteStore},
    uploads::UploadStore,
    AppState,
};
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "boss@stable.test";

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    stablebook_lib::migrate::apply_migrations(&pool)
        .await
        .expect("apply migrations");
    pool
}

pub fn temp_uploads() -> (TempDir, UploadStore) {
    let dir = TempDir::new().expect("temp dir");
    let store = UploadStore::open(dir.path().join("uploads"), 1024 * 1024).expect("upload store");
    (dir, store)
}

pub fn horse_input(name: &str, gender: Gender) -> HorseInput {
    HorseInput {
        name: name.to_string(),
        age: 5,
        breed: "Arabian".to_string(),
        gender,
        image: None,
        father_name: None,
        mother_name: None,
        cert_image: None,
    }
}

/// Application state over an in-memory database and a throwaway upload dir.
pub struct TestApp {
    pub state: AppState,
    pub _dir: TempDir,
}

pub async fn test_app(remote: Arc<dyn RemoteStore>) -> TestApp {
    test_app_with_chat(remote, Arc::new(UnconfiguredChat)).await
}

pub async fn test_app_with_chat(
    remote: Arc<dyn RemoteStore>,
    chat: Arc<dyn ChatBackend>,
) -> TestApp {
    let pool = memory_pool().await;
    let (dir, uploads) = temp_uploads();
    let mut config = AppConfig::default();
    config.auth.admin_emails = AdminAllowList::new([ADMIN_EMAIL]);
    let state = AppState::new(pool, uploads, remote, chat, config);
    TestApp { state, _dir: dir }
}

pub async fn disabled_app() -> TestApp {
    test_app(Arc::new(DisabledRemoteStore)).await
}
