//! Request identity from the `X-User-Id` / `X-User-Email` headers.
//!
//! The headers are trusted as sent. Deployments that need verified identity
//! must put a token-checking proxy in front of the service.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::{error::AUTH_UNAUTHORIZED, model::Caller, state::AppState, AppError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(tenant_id) = header(parts, USER_ID_HEADER) else {
            return Err(AppError::new(AUTH_UNAUTHORIZED, "Unauthorized"));
        };
        let email = header(parts, USER_EMAIL_HEADER).map(str::to_lowercase);
        let is_admin = email.as_deref().is_some_and(|e| state.is_admin(e));
        debug!(target: "stablebook", event = "caller", tenant = %tenant_id, admin = is_admin);
        Ok(Caller {
            tenant_id: tenant_id.to_string(),
            email,
            is_admin,
        })
    }
}
