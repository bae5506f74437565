#![allow(clippy::unwrap_used, clippy::expect_used)]

use figment::Jail;
use stablebook_lib::config::{AppConfig, ConfigError, RemoteBackend};
use std::path::Path;

#[test]
fn defaults_apply_without_sources() {
    Jail::expect_with(|_jail| {
        let config = AppConfig::load(None).expect("defaults load");
        assert_eq!(config.server.port, 5000);
        assert!(config.server.allows_any_origin());
        assert_eq!(config.storage.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.remote.backend, RemoteBackend::Disabled);
        assert_eq!(config.chat.model, "gemini-2.5-flash");
        assert!(!config.chat.is_configured());
        Ok(())
    });
}

#[test]
fn file_then_prefixed_env_then_legacy_env() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "stablebook.toml",
            r#"
            [server]
            port = 7000
            cors_origins = "https://stable.example/"

            [auth]
            admin_emails = ["Owner@Stable.Test"]

            [chat]
            stable_name = "Test Stables"
            "#,
        )?;
        jail.set_env("STABLEBOOK_SERVER__HOST", "127.0.0.1");
        jail.set_env("STABLEBOOK_CHAT__STABLE_NAME", "Env Stables");

        let config = AppConfig::load(None).expect("load");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.cors_origins, vec!["https://stable.example/".to_string()]);
        assert!(config.auth.admin_emails.contains("owner@stable.test"));
        assert_eq!(config.chat.stable_name, "Env Stables");

        jail.set_env("PORT", "8080");
        jail.set_env("ADMIN_EMAILS", "a@x.test, B@x.test");
        jail.set_env("GEMINI_API_KEY", "secret");
        let config = AppConfig::load(None).expect("load legacy");
        assert_eq!(config.server.port, 8080);
        assert!(config.auth.admin_emails.contains("b@x.test"));
        assert_eq!(config.auth.admin_emails.len(), 2);
        assert!(config.chat.is_configured());
        Ok(())
    });
}

#[test]
fn explicit_missing_file_is_an_error() {
    Jail::expect_with(|_jail| {
        let err = AppConfig::load(Some(Path::new("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
        Ok(())
    });
}

#[test]
fn firestore_without_credentials_is_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("STABLEBOOK_REMOTE__BACKEND", "firestore");
        jail.set_env("STABLEBOOK_REMOTE__PROJECT_ID", "stable-prod");
        let err = AppConfig::load(None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        jail.set_env("STABLEBOOK_REMOTE__API_KEY", "k");
        let config = AppConfig::load(None).expect("load");
        assert_eq!(config.remote.backend, RemoteBackend::Firestore);
        Ok(())
    });
}
