//! Error taxonomy for the pool and operation layers.

use crate::endpoint::Endpoint;
use thiserror::Error;
use std::io;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the connection pool and the operation/framing layer.
///
/// Recovery policy lives with the caller (the retry state machine in
/// `operations::CacheOperation::execute`), not on the error itself: the
/// variants below only distinguish *kind*, matching the taxonomy table
/// in the design spec.
#[derive(Error, Debug)]
pub enum Error {
    /// Borrow attempted after `ConnectionPool::close`.
    #[error("connection pool is closed")]
    PoolClosed,

    /// Borrow for an endpoint that was never passed to `prepare_pool`.
    #[error("no pool prepared for endpoint {endpoint}")]
    UnknownEndpoint { endpoint: Endpoint },

    /// Socket read/write failure. Recoverable: the caller invalidates the
    /// transport and retries against a fresh one.
    #[error("transport I/O error: {message}")]
    TransportIo {
        message: String,
        #[source]
        source: io::Error,
    },

    /// Response message id or opcode did not match the request. Fatal.
    #[error("protocol mismatch: {message}")]
    ProtocolMismatch { message: String },

    /// Server reported a non-zero status byte. Not retried.
    #[error("server returned status 0x{status:02x}")]
    ServerStatus { status: u8 },

    /// `ConnectionFactory::make_object` (or an upstream dependency of it)
    /// failed. Propagated untouched; pool counters are not disturbed.
    #[error("connection factory error: {message}")]
    FactoryError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    pub fn transport_io(message: impl Into<String>, source: io::Error) -> Self {
        Self::TransportIo {
            message: message.into(),
            source,
        }
    }

    pub fn protocol_mismatch(message: impl Into<String>) -> Self {
        Self::ProtocolMismatch {
            message: message.into(),
        }
    }

    pub fn server_status(status: u8) -> Self {
        Self::ServerStatus { status }
    }

    pub fn factory(message: impl Into<String>) -> Self {
        Self::FactoryError {
            message: message.into(),
            source: None,
        }
    }

    pub fn factory_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::FactoryError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for errors the retry loop should treat as transient: invalidate
    /// the transport in use and retry against a fresh one, up to the retry
    /// ceiling.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransportIo { .. })
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::transport_io("I/O error", source)
    }
}
