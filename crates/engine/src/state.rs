use tokio::sync::Mutex;

/// The bot's enable flag, shared by the control API and the poller.
///
/// Starts disabled. Only `/start` and `/stop` write it; the poller reads it once per cycle.
#[derive(Debug, Default)]
pub struct RunState {
    running: Mutex<bool>,
}

impl RunState {
    pub fn new(running: bool) -> Self {
        Self {
            running: Mutex::new(running),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }

    /// Set the flag and return its previous value.
    pub async fn set_running(&self, running: bool) -> bool {
        let mut guard = self.running.lock().await;
        std::mem::replace(&mut *guard, running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_disabled() {
        assert!(!RunState::default().is_running().await);
    }

    #[tokio::test]
    async fn test_set_running_returns_previous() {
        let state = RunState::default();
        assert!(!state.set_running(true).await);
        assert!(state.is_running().await);
        assert!(state.set_running(false).await);
        assert!(!state.is_running().await);
    }
}
