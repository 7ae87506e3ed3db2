use crate::error::{IndexerError, Result};
use tokio::sync::watch;

/// Lifecycle of one indexer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexerState {
    Standby,
    Indexing,
    Indexed,
    Watching,
    Error,
}

impl IndexerState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standby => "standby",
            Self::Indexing => "indexing",
            Self::Indexed => "indexed",
            Self::Watching => "watching",
            Self::Error => "error",
        }
    }
}

/// Snapshot published to observers on every state or progress change.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStatus {
    pub state: IndexerState,
    pub processed_items: usize,
    pub total_items: usize,
    pub message: String,
    /// Last fatal error, retained for inspection across restarts.
    pub last_error: Option<String>,
}

impl IndexStatus {
    fn initial() -> Self {
        Self {
            state: IndexerState::Standby,
            processed_items: 0,
            total_items: 0,
            message: String::new(),
            last_error: None,
        }
    }
}

/// State machine guarding the indexer lifecycle, publishing every change
/// through a watch channel. Clones share the same underlying channel so
/// pipeline stages can report progress directly.
///
/// ```text
/// Standby --start--> Indexing --finish--> Indexed --armWatch--> Watching
///    ^                   |                                        |
///    |                   v                                        |
///    +----stop---- Error <----any-stage-fatal-error---------------+
/// ```
#[derive(Clone)]
pub struct StateMachine {
    status_tx: watch::Sender<IndexStatus>,
}

impl StateMachine {
    #[must_use]
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(IndexStatus::initial());
        Self { status_tx }
    }

    #[must_use]
    pub fn current(&self) -> IndexStatus {
        self.status_tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<IndexStatus> {
        self.status_tx.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> IndexerState {
        self.status_tx.borrow().state.clone()
    }

    /// Standby -> Indexing. Resets progress counters for the new run.
    pub fn begin_indexing(&self, total_items: usize) -> Result<()> {
        self.transition(&[IndexerState::Standby], |status| {
            status.state = IndexerState::Indexing;
            status.processed_items = 0;
            status.total_items = total_items;
            status.message = "indexing".to_string();
        })
    }

    /// Indexing -> Indexed.
    pub fn finish_indexing(&self) -> Result<()> {
        self.transition(&[IndexerState::Indexing], |status| {
            status.state = IndexerState::Indexed;
            status.message = "index complete".to_string();
        })
    }

    /// Indexed -> Watching.
    pub fn arm_watching(&self) -> Result<()> {
        self.transition(&[IndexerState::Indexed], |status| {
            status.state = IndexerState::Watching;
            status.message = "watching for changes".to_string();
        })
    }

    /// Any state -> Error. The message is retained as the last error.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        log::error!("Indexer entering error state: {message}");
        self.status_tx.send_modify(|status| {
            status.state = IndexerState::Error;
            status.last_error = Some(message.clone());
            status.message = message;
        });
    }

    /// Any state -> Standby (stop / restart / dispose).
    pub fn to_standby(&self) {
        self.status_tx.send_modify(|status| {
            status.state = IndexerState::Standby;
            status.processed_items = 0;
            status.total_items = 0;
            status.message = String::new();
        });
    }

    /// Progress within the current run. `processed_items` is clamped to
    /// be non-decreasing until the next `begin_indexing`.
    pub fn report_progress(&self, processed: usize, total: usize, message: impl Into<String>) {
        let message = message.into();
        self.status_tx.send_modify(|status| {
            status.processed_items = status.processed_items.max(processed);
            status.total_items = status.total_items.max(total);
            status.message = message;
        });
    }

    fn transition(
        &self,
        allowed_from: &[IndexerState],
        apply: impl FnOnce(&mut IndexStatus),
    ) -> Result<()> {
        let current = self.state();
        if !allowed_from.contains(&current) {
            return Err(IndexerError::Other(format!(
                "invalid state transition from {}",
                current.as_str()
            )));
        }
        self.status_tx.send_modify(apply);
        log::debug!(
            "Indexer state: {} -> {}",
            current.as_str(),
            self.state().as_str()
        );
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn happy_path_walks_all_states() {
        let machine = StateMachine::new();
        assert_eq!(machine.state(), IndexerState::Standby);

        machine.begin_indexing(10).unwrap();
        assert_eq!(machine.state(), IndexerState::Indexing);

        machine.finish_indexing().unwrap();
        assert_eq!(machine.state(), IndexerState::Indexed);

        machine.arm_watching().unwrap();
        assert_eq!(machine.state(), IndexerState::Watching);
    }

    #[test]
    fn start_is_rejected_outside_standby() {
        let machine = StateMachine::new();
        machine.begin_indexing(1).unwrap();
        assert!(machine.begin_indexing(1).is_err());
    }

    #[test]
    fn fatal_error_moves_to_error_then_standby_recovers() {
        let machine = StateMachine::new();
        machine.begin_indexing(5).unwrap();
        machine.fail("store unreachable");

        assert_eq!(machine.state(), IndexerState::Error);
        assert_eq!(
            machine.current().last_error.as_deref(),
            Some("store unreachable")
        );

        machine.to_standby();
        assert_eq!(machine.state(), IndexerState::Standby);
        // The last error stays readable after recovery.
        assert!(machine.current().last_error.is_some());
        machine.begin_indexing(5).unwrap();
    }

    #[test]
    fn progress_is_monotonic_within_a_run() {
        let machine = StateMachine::new();
        machine.begin_indexing(10).unwrap();
        machine.report_progress(4, 10, "embedding");
        machine.report_progress(2, 10, "stale update");
        assert_eq!(machine.current().processed_items, 4);

        machine.finish_indexing().unwrap();
        machine.arm_watching().unwrap();
        // A restart resets the counters.
        machine.to_standby();
        machine.begin_indexing(3).unwrap();
        assert_eq!(machine.current().processed_items, 0);
    }

    #[test]
    fn subscribers_see_updates() {
        let machine = StateMachine::new();
        let rx = machine.subscribe();
        machine.begin_indexing(1).unwrap();
        assert_eq!(rx.borrow().state, IndexerState::Indexing);
    }
}
