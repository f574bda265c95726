use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

const COMPARE_KEY: &[u8] = b"namibot-webhook-token";

fn token_mac(token: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(COMPARE_KEY).ok()?;
    mac.update(token.as_bytes());
    Some(mac)
}

/// Constant-time token equality: both sides are MACed and the tags compared with `verify_slice`.
fn token_matches(presented: &str, expected: &str) -> bool {
    match (token_mac(presented), token_mac(expected)) {
        (Some(presented), Some(expected)) => {
            let tag = expected.finalize().into_bytes();
            presented.verify_slice(&tag).is_ok()
        }
        _ => false,
    }
}

/// Reject any request whose `Authorization: Bearer` token does not match the
/// configured webhook token. The wrapped handler never runs on rejection.
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request.headers().typed_get::<Authorization<Bearer>>();
    match presented {
        Some(auth) if token_matches(auth.token(), &state.webhook_token) => {
            Ok(next.run(request).await)
        }
        _ => {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "Rejected request with missing or invalid bearer token"
            );
            Err(ApiError::Unauthorized)
        }
    }
}
