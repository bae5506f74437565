use std::collections::HashMap;
use std::fmt;
use std::io::Error as IoError;

use serde::Serialize;
use serde_json::Error as SerdeJsonError;
use sqlx::Error as SqlxError;

pub const AUTH_UNAUTHORIZED: &str = "AUTH/UNAUTHORIZED";

pub const RECORD_NOT_FOUND: &str = "RECORD/NOT_FOUND";
pub const RECORD_DECODE: &str = "RECORD/DECODE";

pub const VALIDATION_MISSING_FIELD: &str = "VALIDATION/MISSING_FIELD";
pub const VALIDATION_INVALID_FIELD: &str = "VALIDATION/INVALID_FIELD";
pub const VALIDATION_HORSE_NOT_FEMALE: &str = "VALIDATION/HORSE_NOT_FEMALE";

pub const UPLOADS_NOT_AN_IMAGE: &str = "UPLOADS/NOT_AN_IMAGE";
pub const UPLOADS_TOO_LARGE: &str = "UPLOADS/TOO_LARGE";
pub const UPLOADS_INVALID_DATA_URL: &str = "UPLOADS/INVALID_DATA_URL";

pub const CHAT_NOT_CONFIGURED: &str = "CHAT/NOT_CONFIGURED";
pub const CHAT_FAILED: &str = "CHAT/FAILED";
pub const CHAT_BACKEND: &str = "CHAT/BACKEND";

pub const REMOTE_HTTP: &str = "REMOTE/HTTP";
pub const REMOTE_API: &str = "REMOTE/API";
pub const REMOTE_PARSE: &str = "REMOTE/PARSE";
pub const REMOTE_UNAVAILABLE: &str = "REMOTE/UNAVAILABLE";
pub const REMOTE_DISABLED: &str = "REMOTE/DISABLED";

/// Broad family of an error code. The HTTP layer picks a status from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Unauthorized,
    NotFound,
    /// A rejected field, form or upload.
    Validation,
    TooLarge,
    Chat,
    Remote,
    /// SQLite, filesystem, JSON and anything else unexpected.
    Storage,
}

/// An error raised while serving a stable's records. `code` is stable and
/// machine readable; `message` is what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<AppError>>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    /// An absent record, or one owned by another tenant.
    pub fn not_found(entity: &str, id: i64) -> Self {
        AppError::new(RECORD_NOT_FOUND, format!("{} not found", capitalize(entity)))
            .with_context("entity", entity)
            .with_context("id", id.to_string())
    }

    pub fn missing_field(field: &str) -> Self {
        AppError::new(VALIDATION_MISSING_FIELD, format!("Field '{field}' is required"))
            .with_context("field", field)
    }

    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        AppError::new(VALIDATION_INVALID_FIELD, reason).with_context("field", field)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn class(&self) -> ErrorClass {
        let code = self.code.as_str();
        let family = code.split('/').next().unwrap_or_default();
        match family {
            _ if code == UPLOADS_TOO_LARGE => ErrorClass::TooLarge,
            _ if code == RECORD_NOT_FOUND => ErrorClass::NotFound,
            "AUTH" => ErrorClass::Unauthorized,
            "VALIDATION" | "UPLOADS" => ErrorClass::Validation,
            "CHAT" => ErrorClass::Chat,
            "REMOTE" => ErrorClass::Remote,
            _ => ErrorClass::Storage,
        }
    }

    /// Client-side mistakes, including oversized uploads. Import uses this to
    /// skip a bad row instead of aborting the run.
    pub fn is_validation(&self) -> bool {
        matches!(self.class(), ErrorClass::Validation | ErrorClass::TooLarge)
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: AppError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            let mut pairs: Vec<_> = self.context.iter().collect();
            pairs.sort();
            for (key, value) in pairs {
                write!(f, " {key}={value}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Upload writes and removals.
impl From<IoError> for AppError {
    fn from(error: IoError) -> Self {
        let app_error = AppError::new(format!("IO/{:?}", error.kind()), error.to_string());
        match error.raw_os_error() {
            Some(os_code) => app_error.with_context("os_code", os_code.to_string()),
            None => app_error,
        }
    }
}

/// Response bodies built with `serde_json::to_value`.
impl From<SerdeJsonError> for AppError {
    fn from(error: SerdeJsonError) -> Self {
        AppError::new("JSON/ERROR", error.to_string())
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::new(RECORD_NOT_FOUND, "Record not found"),
            SqlxError::PoolTimedOut => AppError::new(
                "SQLX/POOL_TIMEOUT",
                "Timed out acquiring a database connection",
            ),
            SqlxError::Io(err) => AppError::from(err).with_context("source", "sqlx"),
            SqlxError::Database(db) => {
                let code = db
                    .code()
                    .map(|code| format!("Sqlite/{code}"))
                    .unwrap_or_else(|| "SQLX/DATABASE".to_string());
                let app_error = AppError::new(code, db.message().to_string());
                match db.constraint() {
                    Some(constraint) => app_error.with_context("constraint", constraint),
                    None => app_error,
                }
            }
            SqlxError::ColumnDecode { index, source } => {
                AppError::new(RECORD_DECODE, source.to_string())
                    .with_context("column", index.to_string())
            }
            other => AppError::new("SQLX/ERROR", other.to_string()),
        }
    }
}
