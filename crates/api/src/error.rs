use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use namibot_core::ExchangeError;

/// Errors surfaced by the control API as `{"ok": false, "error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::Exchange(ExchangeError::InvalidOrder(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Exchange(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({
                "ok": false,
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}
