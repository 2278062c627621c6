use thiserror::Error;

/// Errors raised by the simulation core.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// Rejected parameters; detected before any round executes.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Internal consistency failure. Never expected in a correct build.
    #[error("invariant violated at round {round} by agent {agent_id}: {reason}")]
    InvariantViolation {
        round: usize,
        agent_id: usize,
        reason: &'static str,
    },
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
