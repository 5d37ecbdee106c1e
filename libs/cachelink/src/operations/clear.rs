//! `CLEAR` — evict every entry in a cache.

use crate::codec::{OpCode, ResponseHeader};
use crate::error::Result;
use crate::transport::Transport;

use super::CacheOperation;

/// Clears a cache. No request body beyond the shared header; the
/// response status is discarded once the header has been read and
/// validated — `execute_once` already raised a `ProtocolMismatch` for a
/// bad message id/opcode, and there is no partial-success body to
/// report a non-zero status against.
pub struct ClearOperation {
    cache_name: String,
    flags: u32,
}

impl ClearOperation {
    pub fn new(cache_name: impl Into<String>, flags: u32) -> Self {
        Self {
            cache_name: cache_name.into(),
            flags,
        }
    }
}

impl CacheOperation for ClearOperation {
    type Output = ();

    fn cache_name(&self) -> &str {
        &self.cache_name
    }

    fn request_opcode(&self) -> OpCode {
        OpCode::CLEAR_REQUEST
    }

    fn flags(&self) -> u32 {
        self.flags
    }

    fn read_body(&self, _transport: &mut dyn Transport, _header: &ResponseHeader) -> Result<()> {
        Ok(())
    }
}
