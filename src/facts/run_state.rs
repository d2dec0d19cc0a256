use strum::Display;

const LOG_TARGET: &str = " collector";

/// Phase of a collection run.
///
/// Runs only move forward; no phase is ever entered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RunState {
    Idle,
    FetchingProfile,
    FetchingRepositories,
    PartiallyDone,
    Scoring,
    Done,
    Failed,
}

impl RunState {
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::FetchingProfile | Self::Failed)
                | (Self::FetchingProfile, Self::FetchingRepositories | Self::Failed)
                | (Self::FetchingRepositories, Self::PartiallyDone | Self::Scoring | Self::Failed)
                | (Self::PartiallyDone, Self::Scoring)
                | (Self::Scoring, Self::Done)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Records the phases a single run goes through.
#[derive(Debug)]
pub struct RunTracker {
    username: String,
    history: Vec<RunState>,
}

impl RunTracker {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            history: vec![RunState::Idle],
        }
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.history.last().copied().unwrap_or(RunState::Idle)
    }

    #[must_use]
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn advance(&mut self, next: RunState) {
        let current = self.state();
        debug_assert!(current.can_advance_to(next), "invalid run transition {current} -> {next}");

        log::info!(target: LOG_TARGET, "Run for '{}': {current} -> {next}", self.username);
        self.history.push(next);
    }
}
