//! Seam to the legacy cloud document store.
//!
//! Documents are flat JSON objects in one collection per [`EntityKind`],
//! owned by a tenant through their `userId` field.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    config::{RemoteBackend, RemoteConfig},
    error::{REMOTE_API, REMOTE_DISABLED, REMOTE_HTTP, REMOTE_PARSE, REMOTE_UNAVAILABLE},
    model::EntityKind,
    AppError,
};

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryRemoteStore;

/// Field that carries the owning tenant inside every remote document.
pub const TENANT_FIELD: &str = "userId";

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Fields,
}

impl RemoteDocument {
    pub fn tenant(&self) -> Option<&str> {
        self.fields
            .get(TENANT_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The document store returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a document store response.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store is disabled")]
    Disabled,
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        let code = match &err {
            RemoteError::Http(_) => REMOTE_HTTP,
            RemoteError::Api { .. } => REMOTE_API,
            RemoteError::Parse(_) => REMOTE_PARSE,
            RemoteError::Unavailable(_) => REMOTE_UNAVAILABLE,
            RemoteError::Disabled => REMOTE_DISABLED,
        };
        let mut app = AppError::new(code, err.to_string());
        if let RemoteError::Api { status, .. } = &err {
            app = app.with_context("status", status.to_string());
        }
        app
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// `false` means every mirror call is skipped without logging.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Documents of one collection; all tenants' when `tenant` is `None`.
    async fn list(
        &self,
        kind: EntityKind,
        tenant: Option<&str>,
    ) -> Result<Vec<RemoteDocument>, RemoteError>;

    /// Create a document and return its generated id.
    async fn create(&self, kind: EntityKind, fields: Fields) -> Result<String, RemoteError>;

    /// Overwrite the given fields of an existing document.
    async fn update(&self, kind: EntityKind, id: &str, fields: Fields) -> Result<(), RemoteError>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError>;
}

/// Stand-in used when no document store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRemoteStore;

#[async_trait]
impl RemoteStore for DisabledRemoteStore {
    fn backend(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn list(
        &self,
        _kind: EntityKind,
        _tenant: Option<&str>,
    ) -> Result<Vec<RemoteDocument>, RemoteError> {
        Ok(Vec::new())
    }

    async fn create(&self, _kind: EntityKind, _fields: Fields) -> Result<String, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn update(
        &self,
        _kind: EntityKind,
        _id: &str,
        _fields: Fields,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn delete(&self, _kind: EntityKind, _id: &str) -> Result<(), RemoteError> {
        Err(RemoteError::Disabled)
    }
}

pub fn from_config(config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>, RemoteError> {
    let store: Arc<dyn RemoteStore> = match config.backend {
        RemoteBackend::Disabled => Arc::new(DisabledRemoteStore),
        RemoteBackend::Memory => Arc::new(MemoryRemoteStore::new()),
        RemoteBackend::Firestore => Arc::new(FirestoreStore::new(config)?),
    };
    Ok(store)
}

/// Map a non-success HTTP response to [`RemoteError::Api`].
pub(crate) async fn check_response(
    resp: reqwest::Response,
) -> Result<reqwest::Response, RemoteError> {
    if !resp.status().is_success() {
        return Err(RemoteError::Api {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}
