pub mod poller;
pub mod state;

pub use poller::{
    check_once, CycleOutcome, Decision, Poller, PollerConfig, ThresholdRule, TriggerReport,
};
pub use state::RunState;
