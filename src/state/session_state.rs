/// Lifecycle of a scan session
use std::fmt;

/// Represents the current state of a scan session
///
/// `Idle -> Running -> {Completed, Blocked, Aborted}`. A session cancelled
/// before it starts moves straight from `Idle` to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, start URL not yet accepted
    Idle,

    /// Frontier is being processed
    Running,

    /// Frontier exhausted or budget reached
    Completed,

    /// A page needs a rendered fetch the caller did not authorize
    Blocked,

    /// Stopped by robots policy or cancellation
    Aborted,
}

impl SessionState {
    /// Returns true if moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Idle, Self::Aborted)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Blocked)
                | (Self::Running, Self::Aborted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
