//! HTTP surface: JSON API under `/api`, stored images under `/uploads`.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderName, HeaderValue, Method},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::{future::Future, net::SocketAddr};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{config::ServerConfig, state::AppState, AppResult};

pub mod auth;
pub mod chat;
pub mod error;
pub mod horses;
pub mod insights;
pub mod migrate;
pub mod records;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/check-admin", get(insights::check_admin))
        .route("/horses", get(horses::list).post(horses::create))
        .route("/horses/:id", put(horses::update).delete(horses::delete))
        .route("/horses/:id/timeline", get(horses::timeline))
        .route("/horses/:id/firebase-id", patch(records::set_horse_remote_id))
        .route("/visits", get(records::list_visits).post(records::create_visit))
        .route("/visits/:id", delete(records::delete_visit))
        .route("/visits/:id/firebase-id", patch(records::set_visit_remote_id))
        .route(
            "/vaccines",
            get(records::list_vaccines).post(records::create_vaccine),
        )
        .route("/vaccines/:id", delete(records::delete_vaccine))
        .route("/vaccines/:id/firebase-id", patch(records::set_vaccine_remote_id))
        .route(
            "/pregnancies",
            get(records::list_pregnancies).post(records::create_pregnancy),
        )
        .route("/pregnancies/:id", delete(records::delete_pregnancy))
        .route(
            "/pregnancies/:id/firebase-id",
            patch(records::set_pregnancy_remote_id),
        )
        .route("/migrate", post(migrate::migrate))
        .route("/chat", post(chat::chat))
        .route("/reminders", get(insights::reminders))
        .route("/stats", get(insights::stats));

    let uploads = ServeDir::new(state.uploads.root());
    let cors = cors_layer(&state.config.server);
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("STABLEBOOK_GIT_HASH"),
        "remote": state.remote.backend(),
    })))
}

/// Configured origins are matched without a trailing slash.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::USER_ID_HEADER),
            HeaderName::from_static(auth::USER_EMAIL_HEADER),
        ]);
    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(target: "stablebook", event = "cors_origin_invalid", origin = %o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let server = &state.config.server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        target: "stablebook",
        event = "server_listening",
        addr = %listener.local_addr()?,
        remote = state.remote.backend()
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!(target: "stablebook", event = "server_stopped");
    Ok(())
}

