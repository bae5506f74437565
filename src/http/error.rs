use axum::{
    extract::rejection::JsonRejection,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::{
    error::{ErrorClass, UPLOADS_TOO_LARGE, VALIDATION_INVALID_FIELD},
    AppError,
};

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'a str,
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err.class() {
        ErrorClass::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Validation => StatusCode::BAD_REQUEST,
        ErrorClass::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorClass::Chat | ErrorClass::Remote | ErrorClass::Storage => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!(
                target: "stablebook",
                event = "request_failed",
                status = status.as_u16(),
                code = %self.code(),
                error = %self,
                cause = ?self.cause().map(|c| c.to_string())
            );
        } else {
            warn!(
                target: "stablebook",
                event = "request_rejected",
                status = status.as_u16(),
                code = %self.code(),
                error = %self.message()
            );
        }
        let body = ErrorBody {
            error: self.message(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// A JSON body that failed to parse is a client error like any other field problem.
pub fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::new(VALIDATION_INVALID_FIELD, rejection.body_text())
        .with_context("status", rejection.status().as_u16().to_string())
}

pub fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::new(UPLOADS_TOO_LARGE, err.body_text());
    }
    AppError::new(VALIDATION_INVALID_FIELD, err.body_text()).with_context("field", "multipart")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{
        AUTH_UNAUTHORIZED, CHAT_NOT_CONFIGURED, RECORD_NOT_FOUND, REMOTE_API, UPLOADS_NOT_AN_IMAGE,
        VALIDATION_HORSE_NOT_FEMALE,
    };

    #[test]
    fn codes_map_to_statuses() {
        let status = |code: &str| status_for(&AppError::new(code, "x"));
        assert_eq!(status(VALIDATION_HORSE_NOT_FEMALE), StatusCode::BAD_REQUEST);
        assert_eq!(status(UPLOADS_NOT_AN_IMAGE), StatusCode::BAD_REQUEST);
        assert_eq!(status(UPLOADS_TOO_LARGE), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(status(RECORD_NOT_FOUND), StatusCode::NOT_FOUND);
        assert_eq!(status(AUTH_UNAUTHORIZED), StatusCode::UNAUTHORIZED);
        assert_eq!(status("Sqlite/1"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(REMOTE_API), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(CHAT_NOT_CONFIGURED), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn response_body_carries_message_and_code() {
        let resp = AppError::not_found("horse", 4).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Horse not found");
        assert_eq!(body["code"], RECORD_NOT_FOUND);
    }
}
