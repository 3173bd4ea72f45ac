//! Queue configuration, loaded from environment variables at startup.

/// Runtime configuration for a [`Queue`](crate::dispatcher::Queue).
///
/// Every field has a sensible default so the queue works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of chains awaiting dispatch (default: `64`).
    pub queue_capacity: usize,

    /// Buffer size of the broadcast event feed (default: `256`).
    /// Slow subscribers past this lag fall back to re-reading the store.
    pub event_capacity: usize,

    /// Free balance required of a signing account when a task carries no
    /// explicit `required_funds` (default: `1000`, smallest chain unit).
    pub min_balance: u64,

    /// Maximum links per chain; deeper chains are rejected as malformed
    /// (default: `16`).
    pub max_chain_depth: usize,
}

impl QueueConfig {
    /// Build [`QueueConfig`] from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            queue_capacity: parse_env("TOTEM_QUEUE_CAPACITY", 64),
            event_capacity: parse_env("TOTEM_EVENT_CAPACITY", 256),
            min_balance: parse_env("TOTEM_MIN_BALANCE", 1000),
            max_chain_depth: parse_env("TOTEM_MAX_CHAIN_DEPTH", 16),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            event_capacity: 256,
            min_balance: 1000,
            max_chain_depth: 16,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
