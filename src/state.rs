use sqlx::SqlitePool;
use std::sync::Arc;

use crate::{
    chat::{self, ChatBackend},
    config::{AdminAllowList, AppConfig},
    remote::{self, RemoteStore},
    sync::Synchronizer,
    uploads::UploadStore,
    AppResult,
};

/// Everything a request handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub uploads: UploadStore,
    pub remote: Arc<dyn RemoteStore>,
    pub sync: Synchronizer,
    pub chat: Arc<dyn ChatBackend>,
    pub admins: Arc<AdminAllowList>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build the state from configuration around an already migrated pool.
    pub fn from_config(pool: SqlitePool, config: AppConfig) -> AppResult<Self> {
        let uploads = UploadStore::open(
            &config.storage.uploads_dir,
            config.storage.max_upload_bytes,
        )?;
        let remote = remote::from_config(&config.remote)?;
        let chat = chat::from_config(&config.chat)?;
        Ok(Self::new(pool, uploads, remote, chat, config))
    }

    pub fn new(
        pool: SqlitePool,
        uploads: UploadStore,
        remote: Arc<dyn RemoteStore>,
        chat: Arc<dyn ChatBackend>,
        config: AppConfig,
    ) -> Self {
        let sync = Synchronizer::new(pool.clone(), remote.clone());
        Self {
            pool,
            uploads,
            remote,
            sync,
            chat,
            admins: Arc::new(config.auth.admin_emails.clone()),
            config: Arc::new(config),
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admins.contains(email)
    }
}
