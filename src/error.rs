//! Errors raised while configuring or driving a simulation run.
//!
//! Cancellation and starvation are deliberately absent: a cancelled
//! [`acquire`](crate::Arbiter::acquire) simply returns `false`, and a starved
//! worker is reported as [`Average::Starved`](crate::Average::Starved).

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the arbitration engine and its driver.
#[derive(Debug, Error)]
pub enum ArbiterError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the value.
        reason: String,
    },

    /// A ring needs at least two resources to form distinct pairs.
    #[error("ring of {workers} worker(s) is too small, at least 2 are required")]
    RingTooSmall {
        /// The requested ring size.
        workers: usize,
    },

    /// A worker or timer thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] io::Error),

    /// Workers were still running when the grace period after cancellation ran out.
    #[error("{pending} worker(s) still running {grace:?} after the measurement window closed")]
    Stalled {
        /// Workers that had not exited yet.
        pending: usize,
        /// Grace period that was allowed.
        grace: Duration,
    },
}

impl ArbiterError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = ArbiterError::RingTooSmall { workers: 1 };
        assert_eq!(
            err.to_string(),
            "ring of 1 worker(s) is too small, at least 2 are required"
        );

        let err = ArbiterError::invalid("poll interval must be non-zero");
        assert_eq!(
            err.to_string(),
            "invalid configuration: poll interval must be non-zero"
        );
    }

    #[test]
    fn io_errors_convert_into_spawn() {
        let err: ArbiterError = io::Error::new(io::ErrorKind::Other, "no threads left").into();
        assert!(matches!(err, ArbiterError::Spawn(_)));
    }
}
