use strum_macros::Display;

/// Where the server is in its lifecycle
///
/// ```text
/// Created → Initialized → Running → ShuttingDown → Stopped
/// ```
///
/// Shutdown may also be requested from `Created` or `Initialized`. Every
/// transition moves forward; no state is ever re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ServerState {
    Created,
    Initialized,
    Running,
    ShuttingDown,
    Stopped,
}

impl ServerState {
    /// True once shutdown has begun.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(ServerState::Created < ServerState::Initialized);
        assert!(ServerState::Running < ServerState::ShuttingDown);
        assert!(ServerState::Stopped.is_terminal());
        assert!(!ServerState::Running.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(ServerState::ShuttingDown.to_string(), "shuttingdown");
        assert_eq!(ServerState::Running.to_string(), "running");
    }
}
