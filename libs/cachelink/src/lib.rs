//! Per-endpoint TCP connection pool and request/retry framing for a
//! remote key-value cache client.
//!
//! A [`pool::ConnectionPool`] manages a bounded set of
//! [`transport::Transport`] connections per [`endpoint::Endpoint`];
//! [`factory::TransportFactory`] picks which endpoint serves a given
//! cache/key and hands operations a borrowed connection;
//! [`operations::CacheOperation`] implementations drive one
//! request/response exchange (with retry on a recoverable transport
//! error) using a [`codec::Codec`] for the wire format.

pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod operations;
pub mod pool;
pub mod topology;
pub mod transport;

pub use codec::{Codec, HeaderParams, OpCode, ResponseHeader, WireCodec};
pub use config::PoolConfig;
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use factory::{DefaultConnectionFactory, DefaultTransportFactory, TransportFactory};
pub use operations::{
    CacheOperation, ClearOperation, GetWithMetadataOperation, GetWithVersionOperation, KeyOperation,
    MetadataEntry, VersionedEntry,
};
pub use pool::{ConnectionFactory, ConnectionPool, PoolStats, PooledTransport};
pub use topology::TopologyIdCell;
pub use transport::{TcpTransport, Transport};
