//! `GET_WITH_VERSION` — fetch a value along with its opaque version,
//! for use in a subsequent compare-and-swap.

use bytes::Bytes;

use crate::codec::{OpCode, ResponseHeader, NO_ERROR_STATUS};
use crate::error::Result;
use crate::factory::TransportFactory;
use crate::pool::PooledTransport;
use crate::transport::Transport;

use super::{CacheOperation, KeyOperation};

/// Outcome of a `GetWithVersion`. Unlike `Clear`, a non-zero status
/// (including "no such key") is not an error — it is represented here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedEntry {
    Found { version: u64, value: Bytes },
    Missing { status: u8 },
}

pub struct GetWithVersionOperation {
    cache_name: String,
    key: Vec<u8>,
    flags: u32,
}

impl GetWithVersionOperation {
    pub fn new(cache_name: impl Into<String>, key: impl Into<Vec<u8>>, flags: u32) -> Self {
        Self {
            cache_name: cache_name.into(),
            key: key.into(),
            flags,
        }
    }
}

impl CacheOperation for GetWithVersionOperation {
    type Output = VersionedEntry;

    fn cache_name(&self) -> &str {
        &self.cache_name
    }

    fn request_opcode(&self) -> OpCode {
        OpCode::GET_WITH_VERSION_REQUEST
    }

    fn flags(&self) -> u32 {
        self.flags
    }

    fn select_transport(&self, factory: &dyn TransportFactory) -> Result<PooledTransport> {
        factory.borrow_for_key(self.cache_name(), self.key())
    }

    fn write_body(&self, transport: &mut dyn Transport) -> Result<()> {
        self.write_key(transport)
    }

    fn read_body(&self, transport: &mut dyn Transport, header: &ResponseHeader) -> Result<VersionedEntry> {
        if header.status != NO_ERROR_STATUS {
            return Ok(VersionedEntry::Missing { status: header.status });
        }
        let version = transport.read_long()? as u64;
        let value = transport.read_array()?;
        Ok(VersionedEntry::Found { version, value })
    }
}

impl KeyOperation for GetWithVersionOperation {
    fn key(&self) -> &[u8] {
        &self.key
    }
}
