//! Pool configuration.

use std::time::Duration;

/// Immutable-after-construction pool configuration.
///
/// `max_active` and `max_total` follow the commons-pool convention: a
/// negative value means "unbounded" for `max_active`, and a
/// zero-or-negative value means "unbounded" for `max_total`.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Target idle-connection warmth per endpoint, enforced on
    /// `prepare_pool` and by the eviction worker — not a hard floor
    /// under load.
    pub min_idle: i64,
    /// Cap on concurrently-borrowed connections per endpoint. `< 0` means
    /// unbounded.
    pub max_active: i64,
    /// Cap on idle + active connections across all endpoints. `<= 0`
    /// means unbounded.
    pub max_total: i64,
    /// Validate a connection via `ConnectionFactory::validate_object`
    /// before handing it to a borrower.
    pub test_on_borrow: bool,
    /// Validate a connection before returning it to the idle queue.
    pub test_on_return: bool,
    /// Interval between eviction-worker runs. Zero disables the worker
    /// entirely — no thread is spawned.
    pub time_between_eviction_runs: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_idle: 1,
            max_active: -1,
            max_total: -1,
            test_on_borrow: false,
            test_on_return: false,
            time_between_eviction_runs: Duration::ZERO,
        }
    }
}

impl PoolConfig {
    pub fn max_active_unbounded(&self) -> bool {
        self.max_active < 0
    }

    pub fn max_total_unbounded(&self) -> bool {
        self.max_total <= 0
    }

    pub fn eviction_worker_enabled(&self) -> bool {
        !self.time_between_eviction_runs.is_zero()
    }
}
