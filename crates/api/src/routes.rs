use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use namibot_core::*;
use namibot_engine::TriggerReport;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Routes reachable without a token.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(home))
        .route("/status", get(status))
}

/// Routes behind the bearer-token check.
pub fn control_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Run flag
        .route("/start", post(start))
        .route("/stop", post(stop))
        // Manual check
        .route("/trigger", post(trigger))
        // Order forwarding
        .route("/buy", post(buy))
        .route("/sell", post(sell))
}

// ---------------------------------------------------------------------------
// Health & run flag
// ---------------------------------------------------------------------------

async fn home() -> &'static str {
    "Nami bot is online"
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "running": state.run_state.is_running().await,
    }))
}

async fn start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let was_running = state.run_state.set_running(true).await;
    info!(was_running, "Bot started");
    Json(serde_json::json!({"ok": true, "running": true}))
}

async fn stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let was_running = state.run_state.set_running(false).await;
    info!(was_running, "Bot stopped");
    Json(serde_json::json!({"ok": true, "running": false}))
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TriggerResponse {
    ok: bool,
    #[serde(flatten)]
    report: TriggerReport,
}

async fn trigger(State(state): State<Arc<AppState>>) -> Result<Json<TriggerResponse>, ApiError> {
    let report = namibot_engine::check_once(
        state.exchange.as_ref(),
        &state.poller_config,
        state.trigger_executes,
    )
    .await?;
    Ok(Json(TriggerResponse { ok: true, report }))
}

// ---------------------------------------------------------------------------
// Order forwarding
// ---------------------------------------------------------------------------

async fn buy(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OrderPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    forward_order(&state, Side::Buy, payload).await
}

async fn sell(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OrderPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    forward_order(&state, Side::Sell, payload).await
}

/// Body of `/buy` and `/sell`. Decimals may be sent as JSON numbers or strings.
#[derive(Debug, Deserialize)]
pub struct OrderPayload {
    pub symbol: Option<String>,
    #[serde(rename = "type")]
    pub order_type: Option<String>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
}

async fn forward_order(
    state: &AppState,
    side: Side,
    payload: Result<Json<OrderPayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let order = parse_order(side, payload)?;

    info!(
        symbol = %order.symbol,
        %side,
        order_type = %order.order_type,
        quantity = %order.quantity,
        "Forwarding order"
    );
    let result = state.exchange.place_order(&order).await?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "order": order,
        "result": result,
    })))
}

/// Build an order from a decoded payload, reporting the first missing field.
fn parse_order(side: Side, payload: OrderPayload) -> Result<OrderRequest, ApiError> {
    let symbol = payload.symbol.ok_or_else(|| missing("symbol"))?;
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ApiError::BadRequest(
            "symbol must be a non-empty string".to_string(),
        ));
    }

    let order_type = payload.order_type.ok_or_else(|| missing("type"))?;
    let order_type = OrderType::from_str(&order_type).map_err(ApiError::BadRequest)?;
    let quantity = payload.quantity.ok_or_else(|| missing("quantity"))?;

    let order = OrderRequest {
        symbol: symbol.to_string(),
        side,
        order_type,
        quantity,
        price: payload.price,
    };
    order.validate().map_err(ApiError::BadRequest)?;
    Ok(order)
}

fn missing(field: &str) -> ApiError {
    ApiError::BadRequest(format!("missing required field: {}", field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payload(json: Value) -> OrderPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_market_order_numeric_quantity() {
        let body = payload(serde_json::json!({
            "symbol": "BTC_USDT",
            "type": "market",
            "quantity": 0.002
        }));
        let order = parse_order(Side::Buy, body).unwrap();
        assert_eq!(order, OrderRequest::market("BTC_USDT", Side::Buy, dec!(0.002)));
    }

    #[test]
    fn test_parse_limit_order_string_fields() {
        let body = payload(serde_json::json!({
            "symbol": "ETH_USDT",
            "type": "LIMIT",
            "quantity": "1.5",
            "price": "1800"
        }));
        let order = parse_order(Side::Sell, body).unwrap();
        assert_eq!(
            order,
            OrderRequest::limit("ETH_USDT", Side::Sell, dec!(1.5), dec!(1800))
        );
    }

    #[test]
    fn test_parse_reports_first_missing_field() {
        let body = payload(serde_json::json!({"type": "MARKET", "quantity": 1}));
        let err = parse_order(Side::Buy, body).unwrap_err();
        assert_eq!(err.to_string(), "missing required field: symbol");

        let body = payload(serde_json::json!({"symbol": "BTC_USDT", "quantity": 1}));
        let err = parse_order(Side::Buy, body).unwrap_err();
        assert_eq!(err.to_string(), "missing required field: type");

        let body = payload(serde_json::json!({"symbol": "BTC_USDT", "type": "MARKET"}));
        let err = parse_order(Side::Buy, body).unwrap_err();
        assert_eq!(err.to_string(), "missing required field: quantity");
    }

    #[test]
    fn test_null_fields_count_as_missing() {
        let body = payload(serde_json::json!({
            "symbol": "BTC_USDT",
            "type": null,
            "quantity": 1
        }));
        let err = parse_order(Side::Sell, body).unwrap_err();
        assert_eq!(err.to_string(), "missing required field: type");
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let body = payload(serde_json::json!({
            "symbol": "BTC_USDT",
            "type": "STOP",
            "quantity": 1
        }));
        assert!(parse_order(Side::Buy, body).unwrap_err().to_string().contains("STOP"));

        let body = payload(serde_json::json!({"symbol": "  ", "type": "MARKET", "quantity": 1}));
        assert!(parse_order(Side::Buy, body).unwrap_err().to_string().contains("symbol"));

        let body = payload(serde_json::json!({
            "symbol": "BTC_USDT",
            "type": "LIMIT",
            "quantity": 1
        }));
        assert!(parse_order(Side::Buy, body).unwrap_err().to_string().contains("price"));
    }

    #[test]
    fn test_non_numeric_quantity_fails_to_decode() {
        let decoded = serde_json::from_value::<OrderPayload>(serde_json::json!({
            "symbol": "BTC_USDT",
            "type": "MARKET",
            "quantity": "lots"
        }));
        assert!(decoded.is_err());
    }
}
