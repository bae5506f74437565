//! Layered configuration for the stable service.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `stablebook.toml` in the working directory, or the file passed with `--config`
//! 3. `STABLEBOOK_*` environment variables, `__` separating sections
//!    (`STABLEBOOK_SERVER__PORT` -> `server.port`)
//! 4. Variables of the legacy Node deployment: `PORT`, `ADMIN_EMAILS`,
//!    `CORS_ORIGIN`, `GEMINI_API_KEY`

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "stablebook.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Configuration file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    /// A required configuration section is not configured.
    #[error("Configuration section '{section}' is not configured (missing required fields)")]
    NotConfigured { section: String },

    /// A configuration field has an invalid value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Figment(Box::new(err))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(deserialize_with = "string_or_list")]
    pub cors_origins: Vec<String>,
    /// Upper bound for a whole request body, multipart forms included.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            body_limit_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/stablebook.sqlite3"),
            uploads_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub admin_emails: AdminAllowList,
}

/// Lowercased e-mail addresses that see and manage every tenant's records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(into = "Vec<String>")]
pub struct AdminAllowList(Vec<String>);

impl AdminAllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        list.sort();
        list.dedup();
        Self(list)
    }

    /// Parse the comma separated form used by `ADMIN_EMAILS`.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn contains(&self, email: &str) -> bool {
        let needle = email.trim().to_lowercase();
        !needle.is_empty() && self.0.iter().any(|e| *e == needle)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<AdminAllowList> for Vec<String> {
    fn from(list: AdminAllowList) -> Self {
        list.0
    }
}

impl<'de> Deserialize<'de> for AdminAllowList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        string_or_list(deserializer).map(AdminAllowList::new)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    #[default]
    Disabled,
    Memory,
    Firestore,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub backend: RemoteBackend,
    pub project_id: String,
    pub database: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: RemoteBackend::Disabled,
            project_id: String::new(),
            database: "(default)".to_string(),
            api_key: None,
            bearer_token: None,
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub stable_name: String,
    pub reply_language: String,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            stable_name: "Oshri Stables".to_string(),
            reply_language: "Hebrew".to_string(),
            timeout_secs: 60,
        }
    }
}

impl ChatConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
    /// Directory for a daily rotated log file. Stdout only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "stablebook=info,tower_http=info,sqlx=warn".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; the default `stablebook.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::MissingFile {
                    path: path.to_path_buf(),
                });
            }
        }
        let config: AppConfig = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`AppConfig::load`] after reading a `.env` file when present.
    pub fn load_with_dotenv(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load(path)
    }

    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if file.exists() {
            figment = figment.merge(Toml::file(file));
        }

        figment = figment.merge(Env::prefixed("STABLEBOOK_").split("__"));

        figment.merge(legacy_env())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.backend == RemoteBackend::Firestore {
            if self.remote.project_id.trim().is_empty() {
                return Err(ConfigError::NotConfigured {
                    section: "remote".to_string(),
                });
            }
            if self.remote.api_key.is_none() && self.remote.bearer_token.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "remote.api_key".to_string(),
                    reason: "firestore backend needs an api_key or a bearer_token".to_string(),
                });
            }
        }
        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "storage.max_upload_bytes".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn legacy_env() -> Env {
    Env::raw()
        .only(&["PORT", "ADMIN_EMAILS", "CORS_ORIGIN", "GEMINI_API_KEY"])
        .map(|key| match key.as_str().to_ascii_lowercase().as_str() {
            "port" => "server.port".into(),
            "admin_emails" => "auth.admin_emails".into(),
            "cors_origin" => "server.cors_origins".into(),
            "gemini_api_key" => "chat.api_key".into(),
            other => other.to_string().into(),
        })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s.split(',').map(str::to_string).collect::<Vec<_>>(),
        StringOrList::Many(v) => v,
    };
    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_legacy_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert!(config.server.allows_any_origin());
        assert_eq!(config.storage.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.remote.backend, RemoteBackend::Disabled);
        assert_eq!(config.chat.model, "gemini-2.5-flash");
        assert!(!config.chat.is_configured());
        assert!(config.auth.admin_emails.is_empty());
    }

    #[test]
    fn allow_list_is_case_insensitive() {
        let list = AdminAllowList::parse(" Owner@Stable.com, vet@clinic.org ,,");
        assert_eq!(list.len(), 2);
        assert!(list.contains("owner@stable.com"));
        assert!(list.contains("VET@CLINIC.ORG"));
        assert!(!list.contains(""));
        assert!(!list.contains("stranger@x.com"));
    }

    #[test]
    fn firestore_backend_requires_project() {
        let mut config = AppConfig::default();
        config.remote.backend = RemoteBackend::Firestore;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotConfigured { .. })
        ));

        config.remote.project_id = "stable-prod".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.remote.api_key = Some("key".into());
        assert!(config.validate().is_ok());
    }
}
