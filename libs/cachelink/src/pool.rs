//! Per-endpoint connection pool — the hard part.
//!
//! One [`parking_lot::Mutex`] guards all mutable pool state; one
//! [`parking_lot::Condvar`] implements the blocking-wait protocol. A
//! borrower blocked on capacity calls `Condvar::wait_while`, which
//! atomically releases the mutex for the wait and reacquires it on
//! wakeup — the "scoped unlock" discipline the design spec calls
//! load-bearing. See DESIGN.md for why this crate uses one condvar for
//! the whole pool rather than one blocking queue per endpoint.

use std::collections::{HashMap, HashSet, VecDeque};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Stable identity for a pooled connection. Equality is structural (a
/// plain integer), not pointer identity — see spec.md DESIGN NOTES §9.
pub type ConnId = u64;

/// Object-lifecycle callbacks consumed only by [`ConnectionPool`]. Kept
/// separate from the operation-facing `TransportFactory` facade so the
/// pool never needs to hold a reference back to its owner (see
/// DESIGN.md Open Question #1).
pub trait ConnectionFactory: Send + Sync {
    fn make_object(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>>;
    fn destroy_object(&self, endpoint: &Endpoint, transport: Box<dyn Transport>);
    fn validate_object(&self, endpoint: &Endpoint, transport: &mut dyn Transport) -> bool;
    fn activate_object(&self, endpoint: &Endpoint, transport: &mut dyn Transport) -> Result<()>;
    fn passivate_object(&self, endpoint: &Endpoint, transport: &mut dyn Transport);
}

#[derive(Default)]
struct PerEndpointSlot {
    idle: VecDeque<(ConnId, Box<dyn Transport>)>,
    busy: HashSet<ConnId>,
}

struct PoolState {
    endpoints: HashMap<Endpoint, PerEndpointSlot>,
    total_idle: usize,
    total_active: usize,
    allocation_queue: VecDeque<Endpoint>,
    closed: bool,
    next_conn_id: ConnId,
}

impl PoolState {
    fn alloc_conn_id(&mut self) -> ConnId {
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        id
    }
}

/// A borrowed [`Transport`], exclusively owned by the caller executing an
/// operation. Must be returned via exactly one of
/// [`ConnectionPool::return_object`] / [`ConnectionPool::invalidate_object`].
pub struct PooledTransport {
    id: ConnId,
    endpoint: Endpoint,
    transport: Option<Box<dyn Transport>>,
    released: bool,
}

impl PooledTransport {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport
            .as_deref_mut()
            .expect("transport already released")
    }

    fn take(mut self) -> (ConnId, Endpoint, Box<dyn Transport>) {
        self.released = true;
        (self.id, self.endpoint.clone(), self.transport.take().expect("transport already released"))
    }
}

impl Drop for PooledTransport {
    fn drop(&mut self) {
        if !self.released {
            // A caller forgot to release or invalidate this borrow. We
            // cannot rejoin the pool safely from `Drop` (no fallible
            // path, no factory access), so just surface it loudly —
            // this is always a bug in the calling operation code.
            warn!(
                endpoint = %self.endpoint,
                "PooledTransport dropped without release or invalidate; connection leaked"
            );
        }
    }
}

/// Per-endpoint TCP connection pool with a global capacity cap and a
/// cross-endpoint rebalancing policy under saturation.
pub struct ConnectionPool<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    state: Mutex<PoolState>,
    condvar: Condvar,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self {
            factory,
            config,
            state: Mutex::new(PoolState {
                endpoints: HashMap::new(),
                total_idle: 0,
                total_active: 0,
                allocation_queue: VecDeque::new(),
                closed: false,
                next_conn_id: 0,
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Registers `endpoint` if new, then grows its idle queue up to
    /// `min_idle` (subject to `max_total`). Idempotent.
    pub fn prepare_pool(&self, endpoint: &Endpoint) -> Result<()> {
        let mut guard = self.state.lock();
        if guard.endpoints.contains_key(endpoint) {
            return Ok(());
        }
        guard.endpoints.insert(endpoint.clone(), PerEndpointSlot::default());
        debug!(%endpoint, "prepared pool for endpoint");
        self.ensure_min_idle(&mut guard, endpoint)
    }

    fn ensure_min_idle(&self, guard: &mut MutexGuard<PoolState>, endpoint: &Endpoint) -> Result<()> {
        let mut grown = self.calculate_min_idle_grow(guard, endpoint);
        while grown > 0 {
            let transport = self.factory.make_object(endpoint)?;
            let id = guard.alloc_conn_id();
            guard
                .endpoints
                .get_mut(endpoint)
                .expect("endpoint registered above")
                .idle
                .push_back((id, transport));
            guard.total_idle += 1;
            grown -= 1;
        }
        Ok(())
    }

    /// `min_idle` growth only ever respects `max_total`, never
    /// `max_active` — a conscious omission carried over from the source
    /// design (spec.md §9 Open Questions).
    fn calculate_min_idle_grow(&self, guard: &MutexGuard<PoolState>, endpoint: &Endpoint) -> i64 {
        let idle_len = guard.endpoints[endpoint].idle.len() as i64;
        let mut grown = self.config.min_idle - idle_len;
        if !self.config.max_total_unbounded() {
            let grow_limit =
                (self.config.max_total - guard.total_active as i64 - guard.total_idle as i64).max(0);
            grown = grown.min(grow_limit);
        }
        grown
    }

    fn has_reached_max_total(&self, guard: &MutexGuard<PoolState>) -> bool {
        !self.config.max_total_unbounded()
            && (guard.total_active + guard.total_idle) as i64 >= self.config.max_total
    }

    /// Destroys one idle connection to free a global slot, preferring an
    /// endpoint whose idle queue exceeds `min_idle`, else the endpoint
    /// with the longest idle queue. Returns `false` only if no endpoint
    /// has any idle connection at all.
    fn try_remove_idle(&self, guard: &mut MutexGuard<PoolState>) -> bool {
        loop {
            let min_idle = self.config.min_idle;
            let mut victim: Option<Endpoint> = None;
            let mut longest = 0usize;
            for (ep, slot) in guard.endpoints.iter() {
                let len = slot.idle.len();
                if len == 0 {
                    continue;
                }
                if min_idle > 0 && (len as i64) > min_idle {
                    victim = Some(ep.clone());
                    break;
                } else if len > longest {
                    victim = Some(ep.clone());
                    longest = len;
                }
            }
            let Some(victim) = victim else { return false };
            let slot = guard.endpoints.get_mut(&victim).expect("victim just observed");
            if let Some((_, transport)) = slot.idle.pop_front() {
                guard.total_idle -= 1;
                self.factory.destroy_object(&victim, transport);
                return true;
            }
            // Concurrent removal raced us; yield briefly and retry
            // (spec.md §9: "implementers may introduce a short yield").
            thread::yield_now();
        }
    }

    /// Borrows an activated transport for `endpoint`.
    pub fn borrow_object(&self, endpoint: &Endpoint) -> Result<PooledTransport> {
        let mut guard = self.state.lock();
        if guard.closed {
            return Err(Error::PoolClosed);
        }
        if !guard.endpoints.contains_key(endpoint) {
            return Err(Error::UnknownEndpoint {
                endpoint: endpoint.clone(),
            });
        }

        loop {
            if guard.closed {
                return Err(Error::PoolClosed);
            }

            let popped = guard
                .endpoints
                .get_mut(endpoint)
                .expect("endpoint checked above")
                .idle
                .pop_front();
            if let Some((id, mut transport)) = popped {
                guard.total_idle -= 1;
                if self.config.test_on_borrow && !self.factory.validate_object(endpoint, transport.as_mut()) {
                    self.factory.destroy_object(endpoint, transport);
                    debug!(%endpoint, "discarded invalid idle connection on borrow");
                    continue;
                }
                return self.commit_borrow(&mut guard, endpoint, id, transport);
            }

            let busy_len = guard.endpoints[endpoint].busy.len() as i64;
            let under_endpoint_cap = self.config.max_active_unbounded() || busy_len < self.config.max_active;

            if under_endpoint_cap && !self.has_reached_max_total(&guard) {
                let transport = self.factory.make_object(endpoint)?;
                let id = guard.alloc_conn_id();
                return self.commit_borrow(&mut guard, endpoint, id, transport);
            }

            if self.has_reached_max_total(&guard) {
                if self.try_remove_idle(&mut guard) {
                    let transport = self.factory.make_object(endpoint)?;
                    let id = guard.alloc_conn_id();
                    return self.commit_borrow(&mut guard, endpoint, id, transport);
                }
                guard.allocation_queue.push_back(endpoint.clone());
                debug!(%endpoint, "parked waiting for global capacity");
                self.wait_for_idle(&mut guard, endpoint);
                continue;
            }

            // Endpoint is at its own `max_active` but the pool overall
            // still has room: wait on this endpoint only, no
            // cross-endpoint registration.
            self.wait_for_idle(&mut guard, endpoint);
        }
    }

    fn wait_for_idle(&self, guard: &mut MutexGuard<PoolState>, endpoint: &Endpoint) {
        self.condvar.wait_while(guard, |state| {
            !state.closed
                && state
                    .endpoints
                    .get(endpoint)
                    .map(|slot| slot.idle.is_empty())
                    .unwrap_or(true)
        });
    }

    fn commit_borrow(
        &self,
        guard: &mut MutexGuard<PoolState>,
        endpoint: &Endpoint,
        id: ConnId,
        mut transport: Box<dyn Transport>,
    ) -> Result<PooledTransport> {
        if let Err(e) = self.factory.activate_object(endpoint, transport.as_mut()) {
            // Not yet counted as idle or active (the idle-pop path already
            // decremented total_idle before calling us; the fresh-create
            // path never incremented it) — destroy and propagate without
            // touching busy/total_active.
            self.factory.destroy_object(endpoint, transport);
            return Err(e);
        }
        guard
            .endpoints
            .get_mut(endpoint)
            .expect("endpoint known to caller")
            .busy
            .insert(id);
        guard.total_active += 1;
        debug!(%endpoint, conn_id = id, "borrowed connection");
        Ok(PooledTransport {
            id,
            endpoint: endpoint.clone(),
            transport: Some(transport),
            released: false,
        })
    }

    /// Redirects one freed global slot toward the oldest parked waiter,
    /// if any. Called from both `return_object` and `invalidate_object`
    /// when the pool was saturated at the moment the caller entered.
    fn redirect_to_waiter(&self, guard: &mut MutexGuard<PoolState>) -> bool {
        let Some(waiter) = guard.allocation_queue.pop_front() else {
            return false;
        };
        match self.factory.make_object(&waiter) {
            Ok(transport) => {
                let id = guard.alloc_conn_id();
                if let Some(slot) = guard.endpoints.get_mut(&waiter) {
                    slot.idle.push_back((id, transport));
                    guard.total_idle += 1;
                    debug!(endpoint = %waiter, "redirected freed capacity to waiting endpoint");
                } else {
                    self.factory.destroy_object(&waiter, transport);
                }
            }
            Err(e) => {
                warn!(endpoint = %waiter, error = %e, "failed to create replacement connection for waiter");
                guard.allocation_queue.push_front(waiter);
            }
        }
        true
    }

    /// Returns a transport to the idle queue (or destroys it if the pool
    /// is closed, validation fails, or the returner's capacity was
    /// redirected to a waiting endpoint instead).
    pub fn return_object(&self, pooled: PooledTransport) {
        let (id, endpoint, mut transport) = pooled.take();
        let mut guard = self.state.lock();
        let had_reached_max_total = self.has_reached_max_total(&guard);
        if let Some(slot) = guard.endpoints.get_mut(&endpoint) {
            slot.busy.remove(&id);
        }
        guard.total_active -= 1;

        let mut invalid = guard.closed;
        if !invalid && self.config.test_on_return {
            invalid = !self.factory.validate_object(&endpoint, transport.as_mut());
        }
        if !invalid {
            self.factory.passivate_object(&endpoint, transport.as_mut());
        }

        let redirected = if had_reached_max_total {
            self.redirect_to_waiter(&mut guard)
        } else {
            false
        };

        if !invalid && !redirected {
            if let Some(slot) = guard.endpoints.get_mut(&endpoint) {
                slot.idle.push_back((id, transport));
                guard.total_idle += 1;
                debug!(%endpoint, conn_id = id, "returned connection to idle");
                drop(guard);
                self.condvar.notify_all();
                return;
            }
        }

        drop(guard);
        self.factory.destroy_object(&endpoint, transport);
        self.condvar.notify_all();
    }

    /// Destroys a transport instead of returning it — used after a
    /// recoverable transport error or a protocol mismatch.
    pub fn invalidate_object(&self, pooled: PooledTransport) {
        let (id, endpoint, transport) = pooled.take();
        let mut guard = self.state.lock();
        let had_reached_max_total = self.has_reached_max_total(&guard);
        if let Some(slot) = guard.endpoints.get_mut(&endpoint) {
            slot.busy.remove(&id);
        }
        guard.total_active -= 1;
        if had_reached_max_total {
            self.redirect_to_waiter(&mut guard);
        }
        drop(guard);
        debug!(%endpoint, conn_id = id, "invalidated connection");
        self.factory.destroy_object(&endpoint, transport);
        self.condvar.notify_all();
    }

    /// Destroys every idle connection across all endpoints.
    pub fn clear(&self) {
        let mut guard = self.state.lock();
        self.clear_idle_locked(&mut guard, None);
    }

    /// Destroys every idle connection for one endpoint.
    pub fn clear_endpoint(&self, endpoint: &Endpoint) {
        let mut guard = self.state.lock();
        self.clear_idle_locked(&mut guard, Some(endpoint.clone()));
    }

    fn clear_idle_locked(&self, guard: &mut MutexGuard<PoolState>, only: Option<Endpoint>) {
        let endpoints: Vec<Endpoint> = match &only {
            Some(ep) => vec![ep.clone()],
            None => guard.endpoints.keys().cloned().collect(),
        };
        for ep in endpoints {
            let Some(slot) = guard.endpoints.get_mut(&ep) else {
                continue;
            };
            let mut removed = 0usize;
            while let Some((_, transport)) = slot.idle.pop_front() {
                self.factory.destroy_object(&ep, transport);
                removed += 1;
            }
            guard.total_idle -= removed;
        }
    }

    /// Sets the sticky `closed` flag and drains every idle connection.
    /// Connections already on loan are not retroactively destroyed
    /// (spec.md §4.1 failure semantics); they are destroyed as their
    /// borrower eventually calls `return_object`/`invalidate_object`,
    /// since both treat a closed pool as invalidating.
    pub fn close(&self) {
        let mut guard = self.state.lock();
        guard.closed = true;
        self.clear_idle_locked(&mut guard, None);
        drop(guard);
        self.condvar.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Best-effort maintenance: enforce `min_idle` per endpoint by
    /// creating connections. Factory errors are logged and skipped, not
    /// propagated — this runs off the eviction worker, with no caller to
    /// report to.
    pub fn check_idle(&self) {
        let mut guard = self.state.lock();
        if guard.closed {
            return;
        }
        let endpoints: Vec<Endpoint> = guard.endpoints.keys().cloned().collect();
        for ep in endpoints {
            if let Err(e) = self.ensure_min_idle(&mut guard, &ep) {
                warn!(endpoint = %ep, error = %e, "eviction worker failed to grow idle connections");
            }
        }
    }

    /// Best-effort maintenance: validate idle members, destroying any
    /// that fail.
    pub fn test_idle(&self) {
        let mut guard = self.state.lock();
        if guard.closed {
            return;
        }
        let endpoints: Vec<Endpoint> = guard.endpoints.keys().cloned().collect();
        for ep in &endpoints {
            let Some(slot) = guard.endpoints.get_mut(ep) else {
                continue;
            };
            let mut kept = VecDeque::with_capacity(slot.idle.len());
            let mut removed = 0usize;
            while let Some((id, mut transport)) = slot.idle.pop_front() {
                if self.factory.validate_object(ep, transport.as_mut()) {
                    kept.push_back((id, transport));
                } else {
                    self.factory.destroy_object(ep, transport);
                    removed += 1;
                }
            }
            slot.idle = kept;
            guard.total_idle -= removed;
        }
    }

    pub fn stats(&self) -> PoolStats {
        let guard = self.state.lock();
        PoolStats {
            total_idle: guard.total_idle,
            total_active: guard.total_active,
            endpoints: guard.endpoints.len(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub total_idle: usize,
    pub total_active: usize,
    pub endpoints: usize,
}

/// Spawns the eviction worker thread described in spec.md §4.1, if
/// `config.time_between_eviction_runs` is non-zero. Checks `closed` in
/// 1-second bursts so it stays promptly cancellable.
pub fn spawn_eviction_worker<F: ConnectionFactory + 'static>(
    pool: std::sync::Arc<ConnectionPool<F>>,
) -> Option<thread::JoinHandle<()>> {
    let interval = pool.config().time_between_eviction_runs;
    if interval.is_zero() {
        return None;
    }
    Some(thread::spawn(move || {
        while !pool.is_closed() {
            pool.check_idle();
            pool.test_idle();
            let mut waited = Duration::ZERO;
            while waited < interval && !pool.is_closed() {
                let burst = Duration::from_secs(1).min(interval - waited);
                thread::sleep(burst);
                waited += burst;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Barrier};

    struct CountingTransport {
        healthy: bool,
    }

    impl Transport for CountingTransport {
        fn read_byte(&mut self) -> std::io::Result<u8> {
            unimplemented!()
        }
        fn read_long(&mut self) -> std::io::Result<i64> {
            unimplemented!()
        }
        fn read_vint(&mut self) -> std::io::Result<u64> {
            unimplemented!()
        }
        fn read_array(&mut self) -> std::io::Result<bytes::Bytes> {
            unimplemented!()
        }
        fn write_byte(&mut self, _value: u8) -> std::io::Result<()> {
            unimplemented!()
        }
        fn write_long(&mut self, _value: i64) -> std::io::Result<()> {
            unimplemented!()
        }
        fn write_vint(&mut self, _value: u64) -> std::io::Result<()> {
            unimplemented!()
        }
        fn write_array(&mut self, _data: &[u8]) -> std::io::Result<()> {
            unimplemented!()
        }
        fn flush(&mut self) -> std::io::Result<()> {
            unimplemented!()
        }
        fn is_healthy(&self) -> bool {
            self.healthy
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        made: AtomicU32,
        destroyed: AtomicU32,
        fail_validate_once: std::sync::atomic::AtomicBool,
    }

    impl ConnectionFactory for CountingFactory {
        fn make_object(&self, _endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
            self.made.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingTransport { healthy: true }))
        }
        fn destroy_object(&self, _endpoint: &Endpoint, _transport: Box<dyn Transport>) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
        fn validate_object(&self, _endpoint: &Endpoint, _transport: &mut dyn Transport) -> bool {
            if self.fail_validate_once.swap(false, Ordering::SeqCst) {
                return false;
            }
            true
        }
        fn activate_object(&self, _endpoint: &Endpoint, _transport: &mut dyn Transport) -> Result<()> {
            Ok(())
        }
        fn passivate_object(&self, _endpoint: &Endpoint, _transport: &mut dyn Transport) {}
    }

    fn endpoint(n: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", n)
    }

    // S1 + S2 + S3
    #[test]
    fn prepare_borrow_return_cycle() {
        let pool = ConnectionPool::new(
            CountingFactory::default(),
            PoolConfig {
                min_idle: 2,
                max_total: 0,
                ..Default::default()
            },
        );
        let e = endpoint(1);
        pool.prepare_pool(&e).unwrap();
        let stats = pool.stats();
        assert_eq!(stats.total_idle, 2);
        assert_eq!(stats.total_active, 0);

        let t1 = pool.borrow_object(&e).unwrap();
        let t2 = pool.borrow_object(&e).unwrap();
        assert_ne!(t1.id, t2.id);
        let stats = pool.stats();
        assert_eq!(stats.total_idle, 0);
        assert_eq!(stats.total_active, 2);

        pool.return_object(t1);
        let stats = pool.stats();
        assert_eq!(stats.total_idle, 1);
        assert_eq!(stats.total_active, 1);
        pool.return_object(t2);
    }

    #[test]
    fn prepare_pool_is_idempotent() {
        let pool = ConnectionPool::new(
            CountingFactory::default(),
            PoolConfig {
                min_idle: 2,
                ..Default::default()
            },
        );
        let e = endpoint(2);
        pool.prepare_pool(&e).unwrap();
        pool.prepare_pool(&e).unwrap();
        pool.prepare_pool(&e).unwrap();
        assert_eq!(pool.stats().total_idle, 2);
        assert_eq!(pool.factory.made.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn borrow_after_close_fails() {
        let pool = ConnectionPool::new(CountingFactory::default(), PoolConfig::default());
        let e = endpoint(3);
        pool.prepare_pool(&e).unwrap();
        pool.close();
        assert!(matches!(pool.borrow_object(&e), Err(Error::PoolClosed)));
    }

    #[test]
    fn borrow_unknown_endpoint_fails() {
        let pool = ConnectionPool::new(CountingFactory::default(), PoolConfig::default());
        assert!(matches!(
            pool.borrow_object(&endpoint(4)),
            Err(Error::UnknownEndpoint { .. })
        ));
    }

    #[test]
    fn test_on_borrow_recovers_from_one_bad_validation() {
        let factory = CountingFactory::default();
        factory.fail_validate_once.store(true, Ordering::SeqCst);
        let pool = ConnectionPool::new(
            factory,
            PoolConfig {
                min_idle: 1,
                test_on_borrow: true,
                ..Default::default()
            },
        );
        let e = endpoint(5);
        pool.prepare_pool(&e).unwrap();
        let t = pool.borrow_object(&e).unwrap();
        // One made for min_idle, one destroyed (failed validation), one
        // made fresh to satisfy the borrow.
        assert_eq!(pool.factory.made.load(Ordering::SeqCst), 2);
        assert_eq!(pool.factory.destroyed.load(Ordering::SeqCst), 1);
        pool.return_object(t);
    }

    // S4: maxTotal=1 across two endpoints; second borrower blocks until
    // the first endpoint's return redirects capacity via allocation_queue.
    #[test]
    fn allocation_queue_redirects_freed_capacity_to_waiter() {
        let pool = Arc::new(ConnectionPool::new(
            CountingFactory::default(),
            PoolConfig {
                min_idle: 0,
                max_total: 1,
                ..Default::default()
            },
        ));
        let e1 = endpoint(10);
        let e2 = endpoint(11);
        pool.prepare_pool(&e1).unwrap();
        pool.prepare_pool(&e2).unwrap();

        let t1 = pool.borrow_object(&e1).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let pool2 = pool.clone();
        let e2_clone = e2.clone();
        let barrier2 = barrier.clone();
        let waiter = thread::spawn(move || {
            barrier2.wait();
            pool2.borrow_object(&e2_clone).unwrap()
        });

        barrier.wait();
        thread::sleep(Duration::from_millis(50));
        pool.return_object(t1);

        let t2 = waiter.join().unwrap();
        assert_eq!(t2.endpoint(), &e2);
        pool.return_object(t2);
    }

    #[test]
    fn eviction_worker_not_spawned_when_interval_is_zero() {
        let pool = Arc::new(ConnectionPool::new(CountingFactory::default(), PoolConfig::default()));
        assert!(spawn_eviction_worker(pool).is_none());
    }

    #[test]
    fn max_total_invariant_holds_under_concurrent_borrow_return() {
        let pool = Arc::new(ConnectionPool::new(
            CountingFactory::default(),
            PoolConfig {
                min_idle: 0,
                max_total: 3,
                ..Default::default()
            },
        ));
        let e = endpoint(20);
        pool.prepare_pool(&e).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let e = e.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..20 {
                    let t = pool.borrow_object(&e).unwrap();
                    let stats = pool.stats();
                    assert!(stats.total_active + stats.total_idle <= 3);
                    pool.return_object(t);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.total_active, 0);
    }
}
