use crate::models::*;
use async_trait::async_trait;
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Exchange Trait
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to an exchange.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Exchange returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

/// The two exchange calls the bot needs: a public price read and a signed order placement.
///
/// Response bodies are exchange-defined, so order results come back as opaque JSON.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetch the last traded price for a symbol.
    async fn last_price(&self, symbol: &str) -> Result<Decimal, ExchangeError>;

    /// Submit an order and return the exchange's response verbatim.
    async fn place_order(&self, order: &OrderRequest) -> Result<serde_json::Value, ExchangeError>;
}
