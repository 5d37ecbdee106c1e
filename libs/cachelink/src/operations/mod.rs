//! Request/response execution and the retry-on-failure state machine.
//!
//! `CacheOperation` plays the role the original client gave to its
//! `RetryOnFailureOperation` base class: borrow a transport, write a
//! header, run the operation's own body, validate the response, and on
//! a recoverable transport error, invalidate and retry against a fresh
//! connection. Concrete operations only ever implement the few methods
//! that differ (opcode, request body, response decoding).

pub mod clear;
pub mod get_with_metadata;
pub mod get_with_version;

use tracing::warn;

use crate::codec::{Codec, OpCode, ResponseHeader};
use crate::error::{Error, Result};
use crate::factory::TransportFactory;
use crate::pool::PooledTransport;
use crate::transport::Transport;

pub use clear::ClearOperation;
pub use get_with_metadata::{GetWithMetadataOperation, MetadataEntry};
pub use get_with_version::{GetWithVersionOperation, VersionedEntry};

/// Retries attempted after a recoverable ([`Error::is_recoverable`])
/// transport failure, on top of the first attempt. Matches the source
/// client's default retry count for a fixed cluster.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One request/response exchange against a cache.
///
/// Corresponds to the original client's `RetryOnFailureOperation`: the
/// default `execute` method is the retry loop, and concrete operations
/// override only `request_opcode`, `write_body`, and `read_body`.
pub trait CacheOperation {
    type Output;

    fn cache_name(&self) -> &str;
    fn request_opcode(&self) -> OpCode;

    fn flags(&self) -> u32 {
        0
    }

    fn max_retries(&self) -> u32 {
        DEFAULT_MAX_RETRIES
    }

    /// Chooses which endpoint's pool to borrow from. The default picks
    /// any cluster member round-robin; [`KeyOperation`]-backed
    /// operations override this to route by key instead.
    fn select_transport(&self, factory: &dyn TransportFactory) -> Result<PooledTransport> {
        factory.borrow_round_robin(self.cache_name())
    }

    /// Writes whatever comes after the shared header (a key, a key and
    /// value, nothing at all). Default is an empty body (`Clear`).
    fn write_body(&self, transport: &mut dyn Transport) -> Result<()> {
        let _ = transport;
        Ok(())
    }

    /// Decodes the operation-specific response payload. Called only
    /// after the header's message id and opcode have already been
    /// validated.
    fn read_body(&self, transport: &mut dyn Transport, header: &ResponseHeader) -> Result<Self::Output>;

    /// Runs the operation to completion, retrying recoverable transport
    /// errors against a fresh connection up to `max_retries` times.
    fn execute(&self, factory: &dyn TransportFactory, codec: &dyn Codec) -> Result<Self::Output> {
        let mut last_err = None;
        for attempt in 0..=self.max_retries() {
            let mut pooled = self.select_transport(factory)?;
            match self.execute_once(&mut pooled, factory, codec) {
                Ok(value) => {
                    factory.release(pooled);
                    return Ok(value);
                }
                Err(e) => {
                    factory.invalidate(pooled);
                    if !e.is_recoverable() {
                        return Err(e);
                    }
                    warn!(
                        attempt,
                        cache = self.cache_name(),
                        error = %e,
                        "retrying cache operation after recoverable transport error"
                    );
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.expect("loop always runs at least once"))
    }

    /// Writes the header and body, reads and validates the response
    /// header, then decodes the body. No retry logic here — that is
    /// `execute`'s concern.
    fn execute_once(
        &self,
        pooled: &mut PooledTransport,
        factory: &dyn TransportFactory,
        codec: &dyn Codec,
    ) -> Result<Self::Output> {
        let topology_snapshot = factory.topology().load();
        let transport = pooled.transport_mut();

        let header_params = codec.write_header(
            transport,
            self.request_opcode(),
            self.cache_name(),
            self.flags(),
            topology_snapshot,
        )?;
        self.write_body(transport)?;
        transport.flush()?;

        let response = codec.read_response_header(transport)?;
        if response.message_id != header_params.message_id {
            return Err(Error::protocol_mismatch(format!(
                "response message id {} does not match request {}",
                response.message_id, header_params.message_id
            )));
        }
        if response.opcode != header_params.expected_response_opcode {
            return Err(Error::protocol_mismatch(format!(
                "expected response opcode {:?}, got {:?}",
                header_params.expected_response_opcode, response.opcode
            )));
        }
        if let Some(new_topology_id) = response.new_topology_id {
            factory.topology().store(new_topology_id);
        }

        self.read_body(transport, &response)
    }
}

/// Adds a key to a [`CacheOperation`]. Corresponds to the source
/// client's `AbstractKeyOperation`.
pub trait KeyOperation: CacheOperation {
    fn key(&self) -> &[u8];

    fn write_key(&self, transport: &mut dyn Transport) -> Result<()> {
        transport.write_array(self.key())?;
        Ok(())
    }
}
