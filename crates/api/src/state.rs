use namibot_core::Exchange;
use namibot_engine::{PollerConfig, RunState};
use std::sync::Arc;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// The same flag the poller reads.
    pub run_state: Arc<RunState>,
    pub exchange: Arc<dyn Exchange>,
    /// Symbol, quantity, and thresholds used by `/trigger`.
    pub poller_config: PollerConfig,
    /// Static bearer token for the protected routes.
    pub webhook_token: String,
    pub trigger_executes: bool,
}

impl AppState {
    pub fn new(
        run_state: Arc<RunState>,
        exchange: Arc<dyn Exchange>,
        poller_config: PollerConfig,
        webhook_token: impl Into<String>,
    ) -> Self {
        Self {
            run_state,
            exchange,
            poller_config,
            webhook_token: webhook_token.into(),
            trigger_executes: false,
        }
    }

    pub fn with_trigger_executes(mut self, execute: bool) -> Self {
        self.trigger_executes = execute;
        self
    }
}
