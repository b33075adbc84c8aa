//! Engine configuration.
//!
//! Settings can be configured via environment variables:
//! - `NARRATIVE_REPLAY_DELAY_MS`: Pause before each replayed choice (default: 1500)
//! - `NARRATIVE_SESSION_TTL_SECS`: Idle time before a service session is dropped (default: 1800)

use std::time::Duration;

/// Default pause before each auto-applied replay choice.
pub const DEFAULT_REPLAY_DELAY_MS: u64 = 1500;

/// Default idle time before a live service session is evicted.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1800;

/// Runtime settings for the traversal engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause before each auto-applied replay choice.
    pub replay_delay: Duration,
    /// How long a service session may sit untouched before it is evicted.
    pub session_idle_ttl: Duration,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let replay_delay_ms = std::env::var("NARRATIVE_REPLAY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REPLAY_DELAY_MS);

        let session_ttl_secs = std::env::var("NARRATIVE_SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);

        Self {
            replay_delay: Duration::from_millis(replay_delay_ms),
            session_idle_ttl: Duration::from_secs(session_ttl_secs),
        }
    }

    /// Override the replay delay.
    pub fn with_replay_delay(mut self, delay: Duration) -> Self {
        self.replay_delay = delay;
        self
    }

    /// Override the idle session TTL.
    pub fn with_session_idle_ttl(mut self, ttl: Duration) -> Self {
        self.session_idle_ttl = ttl;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            replay_delay: Duration::from_millis(DEFAULT_REPLAY_DELAY_MS),
            session_idle_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delay() {
        assert_eq!(EngineConfig::default().replay_delay, Duration::from_millis(1500));
        assert_eq!(EngineConfig::default().session_idle_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_override_delay() {
        let config = EngineConfig::default().with_replay_delay(Duration::ZERO);
        assert_eq!(config.replay_delay, Duration::ZERO);
    }
}
