use namibot_core::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::state::RunState;

/// Configuration for the threshold poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub symbol: String,
    pub quantity: Decimal,
    pub thresholds: Thresholds,
    pub interval: Duration,
    pub repeat_policy: RepeatPolicy,
}

impl PollerConfig {
    pub fn from_bot_config(config: &BotConfig) -> Self {
        Self {
            symbol: config.exchange.symbol.clone(),
            quantity: config.strategy.quantity,
            thresholds: config.strategy.thresholds(),
            interval: Duration::from_secs(config.strategy.poll_interval_secs),
            repeat_policy: config.strategy.repeat_policy,
        }
    }
}

// ---------------------------------------------------------------------------
// Threshold rule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Price is strictly between thresholds.
    Hold,
    Trade(Side),
    /// Past a threshold, but this side already fired for the current crossing.
    Suppressed(Side),
}

/// Maps a price to a trade decision and tracks which side last fired.
#[derive(Debug, Clone)]
pub struct ThresholdRule {
    thresholds: Thresholds,
    policy: RepeatPolicy,
    last_fired: Option<Side>,
}

impl ThresholdRule {
    pub fn new(thresholds: Thresholds, policy: RepeatPolicy) -> Self {
        Self {
            thresholds,
            policy,
            last_fired: None,
        }
    }

    pub fn evaluate(&mut self, price: Decimal) -> Decision {
        match self.thresholds.side_for(price) {
            None => {
                // Back inside the band re-arms both sides.
                self.last_fired = None;
                Decision::Hold
            }
            Some(side) => match self.policy {
                RepeatPolicy::OncePerCrossing if self.last_fired == Some(side) => {
                    Decision::Suppressed(side)
                }
                _ => Decision::Trade(side),
            },
        }
    }

    /// Record that an order for `side` went through. Failed orders are not recorded,
    /// so the next tick tries again.
    pub fn record_fill(&mut self, side: Side) {
        self.last_fired = Some(side);
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Disabled,
    Idle {
        price: Decimal,
    },
    Ordered {
        side: Side,
        price: Decimal,
        response: serde_json::Value,
    },
    Suppressed {
        side: Side,
        price: Decimal,
    },
    Failed {
        error: String,
    },
}

/// Periodically checks the price and places a market order when a threshold is crossed.
///
/// Every cycle error is logged and dropped; the next tick runs regardless.
pub struct Poller {
    exchange: Arc<dyn Exchange>,
    config: PollerConfig,
    run_state: Arc<RunState>,
    rule: ThresholdRule,
}

impl Poller {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        config: PollerConfig,
        run_state: Arc<RunState>,
    ) -> Self {
        let rule = ThresholdRule::new(config.thresholds, config.repeat_policy);
        Self {
            exchange,
            config,
            run_state,
            rule,
        }
    }

    /// Run one cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if !self.run_state.is_running().await {
            return CycleOutcome::Disabled;
        }

        let symbol = &self.config.symbol;
        let price = match self.exchange.last_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                warn!(exchange = self.exchange.name(), %symbol, error = %e, "Price check failed");
                return CycleOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };
        info!(%symbol, %price, "Price check");

        let side = match self.rule.evaluate(price) {
            Decision::Hold => return CycleOutcome::Idle { price },
            Decision::Suppressed(side) => {
                info!(%symbol, %price, %side, "Threshold still crossed, order already placed");
                return CycleOutcome::Suppressed { side, price };
            }
            Decision::Trade(side) => side,
        };

        info!(%symbol, %price, %side, "Threshold crossed, placing market order");
        let order = OrderRequest::market(symbol, side, self.config.quantity);
        match self.exchange.place_order(&order).await {
            Ok(response) => {
                info!(%symbol, %side, %response, "Order placed");
                self.rule.record_fill(side);
                CycleOutcome::Ordered {
                    side,
                    price,
                    response,
                }
            }
            Err(e) => {
                warn!(%symbol, %side, error = %e, "Order failed");
                CycleOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Tick until `cancel` fires. The first cycle runs immediately.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            symbol = %self.config.symbol,
            buy_price = %self.config.thresholds.buy_price,
            sell_price = %self.config.thresholds.sell_price,
            interval_secs = self.config.interval.as_secs(),
            "Poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        info!("Poller stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

// ---------------------------------------------------------------------------
// Manual trigger
// ---------------------------------------------------------------------------

/// Result of an on-demand price check.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerReport {
    pub symbol: String,
    /// Sent as a JSON number so clients of the control API can compare it directly.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<serde_json::Value>,
}

/// Fetch the price once. With `execute`, also place the order the thresholds call for.
///
/// Ignores the run flag and the repeat policy: a manual trigger always acts on the current price.
pub async fn check_once(
    exchange: &dyn Exchange,
    config: &PollerConfig,
    execute: bool,
) -> Result<TriggerReport, ExchangeError> {
    let price = exchange.last_price(&config.symbol).await?;
    info!(symbol = %config.symbol, %price, "Manual price check");

    let mut report = TriggerReport {
        symbol: config.symbol.clone(),
        price,
        side: None,
        order: None,
    };
    if !execute {
        return Ok(report);
    }

    if let Some(side) = config.thresholds.side_for(price) {
        let order = OrderRequest::market(&config.symbol, side, config.quantity);
        report.order = Some(exchange.place_order(&order).await?);
        report.side = Some(side);
    }
    Ok(report)
}
