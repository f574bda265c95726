use async_trait::async_trait;
use namibot_core::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::signer::Signer;

const TICKER_PATH: &str = "/market/ticker";
const ORDER_PATH: &str = "/order";

/// Nami exchange REST client.
///
/// Price reads are public. Orders are signed with the account credentials;
/// the signed path is relative to the configured base URL.
pub struct NamiClient {
    http: reqwest::Client,
    base_url: String,
    signer: Signer,
}

impl NamiClient {
    pub fn new(config: &ExchangeConfig, credentials: Credentials) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            signer: Signer::new(credentials),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into `ExchangeError::Status`, otherwise decode the JSON body.
    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ExchangeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ExchangeError::Decode(format!("Invalid JSON: {}", e)))
    }
}

fn transport(e: reqwest::Error) -> ExchangeError {
    ExchangeError::Transport(e.to_string())
}

/// Extract `data.lastPrice` from a ticker response. The exchange sends it as
/// either a JSON number or a numeric string.
pub(crate) fn parse_last_price(body: &serde_json::Value) -> Result<Decimal, ExchangeError> {
    let raw = body
        .get("data")
        .and_then(|d| d.get("lastPrice"))
        .ok_or_else(|| ExchangeError::Decode(format!("missing data.lastPrice in {}", body)))?;

    let text = match raw {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        other => {
            return Err(ExchangeError::Decode(format!(
                "data.lastPrice is not numeric: {}",
                other
            )))
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| ExchangeError::Decode(format!("bad lastPrice {:?}: {}", text, e)))
}

#[async_trait]
impl Exchange for NamiClient {
    fn name(&self) -> &str {
        "nami"
    }

    async fn last_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let response = self
            .http
            .get(self.url(TICKER_PATH))
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(transport)?;

        let body = Self::read_json(response).await?;
        let price = parse_last_price(&body)?;
        debug!(symbol, %price, "Fetched ticker");
        Ok(price)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<serde_json::Value, ExchangeError> {
        order.validate().map_err(ExchangeError::InvalidOrder)?;

        // The exact bytes that are signed are the bytes that are sent.
        let body = serde_json::to_string(order)
            .map_err(|e| ExchangeError::Decode(format!("Serialization error: {}", e)))?;
        let headers = self
            .signer
            .sign_request("POST", ORDER_PATH, &body)?
            .to_header_map()?;

        info!(
            symbol = %order.symbol,
            side = %order.side,
            order_type = %order.order_type,
            quantity = %order.quantity,
            "Submitting order"
        );

        let response = self
            .http
            .post(self.url(ORDER_PATH))
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(transport)?;

        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{self, HEADER_API_KEY, HEADER_API_SIGN, HEADER_API_TIMESTAMP};
    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    const SECRET: &str = "stub-secret";

    /// Verifies the signature the same way the exchange does and echoes the order back.
    async fn stub_order(headers: HeaderMap, body: String) -> (StatusCode, Json<serde_json::Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let timestamp = header(HEADER_API_TIMESTAMP);
        let expected = signer::sign(SECRET, &timestamp, "POST", ORDER_PATH, &body).unwrap();

        if header(HEADER_API_KEY) != "stub-key" || header(HEADER_API_SIGN) != expected {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"status": "error", "message": "bad signature"})),
            );
        }
        let order: serde_json::Value = serde_json::from_str(&body).unwrap();
        (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ok", "data": order})),
        )
    }

    async fn stub_ticker(
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        match params.get("symbol").map(String::as_str) {
            Some("BTC_USDT") => (
                StatusCode::OK,
                Json(serde_json::json!({"status": "ok", "data": {"lastPrice": "30123.45"}})),
            ),
            Some("ETH_USDT") => (
                StatusCode::OK,
                Json(serde_json::json!({"status": "ok", "data": {"lastPrice": 1850.5}})),
            ),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"status": "error", "message": "unknown symbol"})),
            ),
        }
    }

    async fn spawn_stub() -> String {
        let app = Router::new()
            .route("/api/v4/market/ticker", get(stub_ticker))
            .route("/api/v4/order", post(stub_order));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/v4", addr)
    }

    fn client(base_url: String, secret: &str) -> NamiClient {
        let config = ExchangeConfig {
            base_url,
            timeout_secs: 5,
            ..Default::default()
        };
        NamiClient::new(&config, Credentials::new("stub-key", secret)).unwrap()
    }

    #[test]
    fn test_parse_last_price_string_and_number() {
        let s = serde_json::json!({"data": {"lastPrice": "30000.5"}});
        let n = serde_json::json!({"data": {"lastPrice": 30000.5}});
        assert_eq!(parse_last_price(&s).unwrap(), dec!(30000.5));
        assert_eq!(parse_last_price(&n).unwrap(), dec!(30000.5));
    }

    #[test]
    fn test_parse_last_price_rejects_bad_shapes() {
        let missing = serde_json::json!({"data": {}});
        let bogus = serde_json::json!({"data": {"lastPrice": "n/a"}});
        let null = serde_json::json!({"data": {"lastPrice": null}});
        assert!(matches!(parse_last_price(&missing), Err(ExchangeError::Decode(_))));
        assert!(matches!(parse_last_price(&bogus), Err(ExchangeError::Decode(_))));
        assert!(matches!(parse_last_price(&null), Err(ExchangeError::Decode(_))));
    }

    #[tokio::test]
    async fn test_last_price_from_stub() {
        let nami = client(spawn_stub().await, SECRET);
        assert_eq!(nami.last_price("BTC_USDT").await.unwrap(), dec!(30123.45));
        assert_eq!(nami.last_price("ETH_USDT").await.unwrap(), dec!(1850.5));
    }

    #[tokio::test]
    async fn test_last_price_upstream_error_status() {
        let nami = client(spawn_stub().await, SECRET);
        let err = nami.last_price("DOGE_XYZ").await.unwrap_err();
        match err {
            ExchangeError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("unknown symbol"));
            }
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signed_order_accepted() {
        let nami = client(spawn_stub().await, SECRET);
        let order = OrderRequest::market("BTC_USDT", Side::Buy, dec!(0.001));

        let res = nami.place_order(&order).await.unwrap();
        assert_eq!(res["status"], "ok");
        assert_eq!(res["data"]["side"], "BUY");
        assert_eq!(res["data"]["type"], "MARKET");
        assert_eq!(res["data"]["quantity"], "0.001");
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected_upstream() {
        let nami = client(spawn_stub().await, "wrong-secret");
        let order = OrderRequest::market("BTC_USDT", Side::Sell, dec!(0.001));

        let err = nami.place_order(&order).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_transport_error_when_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let nami = client(format!("http://{}/api/v4", addr), SECRET);
        let err = nami.last_price("BTC_USDT").await.unwrap_err();
        assert!(matches!(err, ExchangeError::Transport(_)));
    }
}
