//! The cross-cutting error taxonomy (§7), shared by every public entry
//! point in the engine.
//!
//! `Stale` is deliberately absent here: it is an internal cache signal
//! that is always converted to a cache miss before a caller ever sees
//! it (§7 — "never surfaced, always converted to a miss").

use saferoute_scoring_models::ScoringError;

/// Errors surfaced to callers of the snapshot service, the route
/// scorer, or the admin operations surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Bbox degenerate, lookback out of range, polyline too short, or
    /// an unknown `time_of_day`. Recovered at the boundary; never
    /// reaches aggregation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The crime feed or routing provider failed after retries.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A conflicting rebuild holds the aggregation lock.
    #[error("busy: a conflicting operation holds the aggregation lock for {0}")]
    Busy(String),

    /// An invariant (I1-I5) was violated during a read; the offending
    /// cell was excluded and a repair job scheduled.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),

    /// Deadline exceeded during route scoring with zero completed
    /// candidates.
    #[error("timed out before any candidate completed")]
    Timeout,
}

impl From<ScoringError> for EngineError {
    fn from(value: ScoringError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoring_error_maps_to_invalid_input() {
        let err: EngineError = ScoringError::InvalidLookback { value: 99 }.into();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
