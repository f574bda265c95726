use async_trait::async_trait;
use namibot_core::*;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Configuration for the paper exchange.
#[derive(Debug, Clone)]
pub struct PaperExchangeConfig {
    /// Price quoted until a new one is set or scripted.
    pub initial_price: Decimal,
    /// Most recent orders kept in the log; older ones are dropped.
    pub order_log_capacity: usize,
}

impl Default for PaperExchangeConfig {
    fn default() -> Self {
        Self {
            initial_price: Decimal::new(31_000, 0),
            order_log_capacity: 1_000,
        }
    }
}

#[derive(Debug)]
struct PaperState {
    price: Decimal,
    /// Queued quotes, consumed one per `last_price` call. `Err` entries simulate outages.
    scripted: VecDeque<Result<Decimal, String>>,
    orders: VecDeque<OrderRequest>,
    order_log_capacity: usize,
    reject_orders: bool,
    next_order_id: u64,
}

/// An in-memory exchange.
///
/// Quotes a settable price, accepts every valid order and fills it
/// immediately at the quoted price (market) or at its limit price.
/// Used for `--paper` runs and as the exchange in tests.
#[derive(Debug)]
pub struct PaperExchange {
    state: Mutex<PaperState>,
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new(PaperExchangeConfig::default())
    }
}

impl PaperExchange {
    pub fn new(config: PaperExchangeConfig) -> Self {
        Self {
            state: Mutex::new(PaperState {
                price: config.initial_price,
                scripted: VecDeque::new(),
                orders: VecDeque::new(),
                order_log_capacity: config.order_log_capacity,
                reject_orders: false,
                next_order_id: 1,
            }),
        }
    }

    /// Set the standing quote.
    pub async fn set_price(&self, price: Decimal) {
        self.state.lock().await.price = price;
    }

    /// Queue quotes to be returned by the next `last_price` calls, in order.
    pub async fn push_prices(&self, prices: impl IntoIterator<Item = Decimal>) {
        let mut state = self.state.lock().await;
        state.scripted.extend(prices.into_iter().map(Ok));
    }

    /// Queue a failed quote.
    pub async fn push_failure(&self, message: &str) {
        self.state
            .lock()
            .await
            .scripted
            .push_back(Err(message.to_string()));
    }

    /// Make order placement fail with an upstream error.
    pub async fn reject_orders(&self, reject: bool) {
        self.state.lock().await.reject_orders = reject;
    }

    /// Accepted orders, oldest first, up to the log capacity.
    pub async fn orders(&self) -> Vec<OrderRequest> {
        self.state.lock().await.orders.iter().cloned().collect()
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn name(&self) -> &str {
        "paper"
    }

    async fn last_price(&self, _symbol: &str) -> Result<Decimal, ExchangeError> {
        let mut state = self.state.lock().await;
        match state.scripted.pop_front() {
            Some(Ok(price)) => {
                state.price = price;
                Ok(price)
            }
            Some(Err(message)) => Err(ExchangeError::Transport(message)),
            None => Ok(state.price),
        }
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<serde_json::Value, ExchangeError> {
        order.validate().map_err(ExchangeError::InvalidOrder)?;

        let mut state = self.state.lock().await;
        if state.reject_orders {
            return Err(ExchangeError::Status {
                status: 503,
                body: r#"{"status":"error","message":"paper exchange rejecting orders"}"#
                    .to_string(),
            });
        }

        let order_id = state.next_order_id;
        state.next_order_id += 1;
        let fill_price = order.price.unwrap_or(state.price);
        if state.order_log_capacity > 0 {
            if state.orders.len() == state.order_log_capacity {
                state.orders.pop_front();
            }
            state.orders.push_back(order.clone());
        }

        tracing::debug!(
            order_id,
            symbol = %order.symbol,
            side = %order.side,
            quantity = %order.quantity,
            price = %fill_price,
            "Paper order filled"
        );

        Ok(serde_json::json!({
            "status": "ok",
            "data": {
                "orderId": order_id,
                "symbol": order.symbol,
                "side": order.side,
                "type": order.order_type,
                "quantity": order.quantity,
                "price": fill_price,
                "status": "FILLED",
            }
        }))
    }
}
