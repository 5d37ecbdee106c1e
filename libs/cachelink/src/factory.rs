//! Endpoint selection and the caller-facing pool facade.
//!
//! [`ConnectionPool`] never sees more than one endpoint at a time — it
//! doesn't know how a caller chose that endpoint. `TransportFactory` is
//! the facade operations actually depend on: it owns the pool, decides
//! which endpoint serves a given cache/key, and hands back a borrowed
//! [`PooledTransport`]. Splitting it this way from the pool itself
//! avoids a pool ↔ factory reference cycle (see DESIGN.md).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;

use crate::config::PoolConfig;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::pool::{spawn_eviction_worker, ConnectionFactory, ConnectionPool, PooledTransport};
use crate::topology::TopologyIdCell;
use crate::transport::{TcpTransport, Transport};

/// Facade operations borrow transports through. Endpoint selection and
/// pool lifecycle are its concern; the wire protocol is not.
pub trait TransportFactory: Send + Sync {
    fn borrow_for_key(&self, cache_name: &str, key: &[u8]) -> Result<PooledTransport>;
    fn borrow_round_robin(&self, cache_name: &str) -> Result<PooledTransport>;
    fn release(&self, transport: PooledTransport);
    fn invalidate(&self, transport: PooledTransport);
    fn topology(&self) -> &TopologyIdCell;
}

/// Creates [`TcpTransport`] connections over plain sockets. Validation
/// is the transport's own activity-based health check; there is no
/// protocol-level handshake at this layer (that belongs to whichever
/// operation runs first on a fresh connection).
pub struct DefaultConnectionFactory {
    pub connect_timeout: Duration,
}

impl Default for DefaultConnectionFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ConnectionFactory for DefaultConnectionFactory {
    fn make_object(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        let transport = TcpTransport::connect((endpoint.host.as_str(), endpoint.port), self.connect_timeout)
            .map_err(|e| Error::transport_io(format!("failed to connect to {endpoint}"), e))?;
        debug!(%endpoint, "connected new transport");
        Ok(Box::new(transport))
    }

    fn destroy_object(&self, endpoint: &Endpoint, transport: Box<dyn Transport>) {
        debug!(%endpoint, "closing transport");
        drop(transport);
    }

    fn validate_object(&self, _endpoint: &Endpoint, transport: &mut dyn Transport) -> bool {
        transport.is_healthy()
    }

    fn activate_object(&self, _endpoint: &Endpoint, _transport: &mut dyn Transport) -> Result<()> {
        Ok(())
    }

    fn passivate_object(&self, _endpoint: &Endpoint, _transport: &mut dyn Transport) {}
}

/// Round-robins across a fixed cluster for plain borrows, and hashes a
/// key to a consistent member for key-addressed operations. No
/// consistent-hash ring and no membership updates from topology
/// responses — a single static endpoint list for the pool's lifetime
/// (see SPEC_FULL.md Non-goals).
pub struct DefaultTransportFactory<F: ConnectionFactory> {
    endpoints: Vec<Endpoint>,
    pool: Arc<ConnectionPool<F>>,
    round_robin: AtomicUsize,
    topology: TopologyIdCell,
    eviction_worker: Mutex<Option<JoinHandle<()>>>,
}

impl<F: ConnectionFactory + 'static> DefaultTransportFactory<F> {
    pub fn new(endpoints: Vec<Endpoint>, factory: F, config: PoolConfig) -> Result<Self> {
        assert!(!endpoints.is_empty(), "a transport factory needs at least one endpoint");
        let pool = Arc::new(ConnectionPool::new(factory, config));
        for endpoint in &endpoints {
            pool.prepare_pool(endpoint)?;
        }
        let eviction_worker = spawn_eviction_worker(pool.clone());
        Ok(Self {
            endpoints,
            pool,
            round_robin: AtomicUsize::new(0),
            topology: TopologyIdCell::default(),
            eviction_worker: Mutex::new(eviction_worker),
        })
    }

    fn pick_round_robin(&self) -> &Endpoint {
        let i = self.round_robin.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[i]
    }

    fn pick_for_key(&self, key: &[u8]) -> &Endpoint {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let i = (hasher.finish() as usize) % self.endpoints.len();
        &self.endpoints[i]
    }

    pub fn pool(&self) -> &ConnectionPool<F> {
        &self.pool
    }

    /// Closes the pool and waits for the eviction worker (if running) to
    /// observe it and exit.
    pub fn shutdown(&self) {
        self.pool.close();
        if let Some(handle) = self.eviction_worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl<F: ConnectionFactory + 'static> TransportFactory for DefaultTransportFactory<F> {
    fn borrow_for_key(&self, _cache_name: &str, key: &[u8]) -> Result<PooledTransport> {
        let endpoint = self.pick_for_key(key).clone();
        self.pool.borrow_object(&endpoint)
    }

    fn borrow_round_robin(&self, _cache_name: &str) -> Result<PooledTransport> {
        let endpoint = self.pick_round_robin().clone();
        self.pool.borrow_object(&endpoint)
    }

    fn release(&self, transport: PooledTransport) {
        self.pool.return_object(transport);
    }

    fn invalidate(&self, transport: PooledTransport) {
        self.pool.invalidate_object(transport);
    }

    fn topology(&self) -> &TopologyIdCell {
        &self.topology
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn echo_server() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                // Keep the accepted socket alive for the test's duration.
                std::mem::forget(stream);
            }
        });
        Endpoint::new(addr.ip().to_string(), addr.port())
    }

    #[test]
    fn round_robin_visits_every_endpoint() {
        let endpoints = vec![echo_server(), echo_server(), echo_server()];
        let factory = DefaultTransportFactory::new(
            endpoints.clone(),
            DefaultConnectionFactory::default(),
            PoolConfig {
                min_idle: 0,
                ..Default::default()
            },
        )
        .unwrap();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..endpoints.len() {
            let t = factory.borrow_round_robin("default").unwrap();
            seen.insert(t.endpoint().clone());
            factory.release(t);
        }
        assert_eq!(seen.len(), endpoints.len());
        factory.shutdown();
    }

    #[test]
    fn key_hashing_is_stable() {
        let endpoints = vec![echo_server(), echo_server()];
        let factory = DefaultTransportFactory::new(
            endpoints,
            DefaultConnectionFactory::default(),
            PoolConfig {
                min_idle: 0,
                ..Default::default()
            },
        )
        .unwrap();

        let t1 = factory.borrow_for_key("default", b"same-key").unwrap();
        let e1 = t1.endpoint().clone();
        factory.release(t1);
        let t2 = factory.borrow_for_key("default", b"same-key").unwrap();
        assert_eq!(&e1, t2.endpoint());
        factory.release(t2);
        factory.shutdown();
    }
}
