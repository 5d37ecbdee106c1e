//! Request/response header framing.
//!
//! The codec is the one piece of this crate that would, in a real
//! deployment, be swapped for whatever wire format the target server
//! speaks (spec treats it as an external collaborator). [`WireCodec`] is
//! a complete, self-consistent implementation so the rest of the crate
//! is directly testable over a real loopback socket, in the spirit of
//! the teacher crate's `TcpNetworkTransport` providing one concrete,
//! runnable transport rather than leaving everything behind a trait.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Status byte indicating a request completed without error.
pub const NO_ERROR_STATUS: u8 = 0x00;

/// Response flag bit: entry has no expiry (lifespan fields omitted).
pub const INFINITE_LIFESPAN: u8 = 0x01;
/// Response flag bit: entry has no max-idle (max-idle fields omitted).
pub const INFINITE_MAXIDLE: u8 = 0x02;

const REQUEST_MAGIC: u8 = 0xA0;
const RESPONSE_MAGIC: u8 = 0xA1;
const CLIENT_INTELLIGENCE_BASIC: u8 = 0x01;
const TOPOLOGY_UNCHANGED: u8 = 0x00;
const TOPOLOGY_CHANGED: u8 = 0x01;

/// One-byte protocol tag for a request/response kind. A response opcode
/// is always its paired request opcode + 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode(pub u8);

impl OpCode {
    pub const CLEAR_REQUEST: OpCode = OpCode(0x13);
    pub const CLEAR_RESPONSE: OpCode = OpCode(0x14);
    pub const GET_WITH_VERSION_REQUEST: OpCode = OpCode(0x11);
    pub const GET_WITH_VERSION_RESPONSE: OpCode = OpCode(0x12);
    pub const GET_WITH_METADATA_REQUEST: OpCode = OpCode(0x1B);
    pub const GET_WITH_METADATA_RESPONSE: OpCode = OpCode(0x1C);

    /// The response opcode paired with this request opcode.
    pub fn response(self) -> OpCode {
        OpCode(self.0 + 1)
    }
}

/// Scratch record for one request/response exchange. Scoped to a single
/// `execute_operation` call; never reused across retries (each retry
/// writes a fresh header with a new message id).
#[derive(Debug, Clone)]
pub struct HeaderParams {
    pub message_id: u64,
    pub expected_response_opcode: OpCode,
    pub cache_name: String,
    pub flags: u32,
    pub topology_id_snapshot: i32,
}

/// Parsed response header, before request-specific validation.
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    pub message_id: u64,
    pub opcode: OpCode,
    pub status: u8,
    pub new_topology_id: Option<i32>,
}

/// Encodes/decodes header bytes, integers, variable-length ints, and
/// byte arrays. Implementations must be internally thread-safe: the same
/// `Codec` is shared across every concurrently-executing operation.
pub trait Codec: Send + Sync {
    fn write_header(
        &self,
        transport: &mut dyn Transport,
        opcode: OpCode,
        cache_name: &str,
        flags: u32,
        topology_id: i32,
    ) -> Result<HeaderParams>;

    fn read_response_header(&self, transport: &mut dyn Transport) -> Result<ResponseHeader>;
}

/// Default wire format: big-endian integers, LEB128 `vint`s, vint-length-
/// prefixed byte arrays (spec.md §6).
pub struct WireCodec {
    message_id_counter: AtomicU64,
}

impl WireCodec {
    pub fn new() -> Self {
        Self {
            message_id_counter: AtomicU64::new(1),
        }
    }

    fn next_message_id(&self) -> u64 {
        self.message_id_counter.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for WireCodec {
    fn write_header(
        &self,
        transport: &mut dyn Transport,
        opcode: OpCode,
        cache_name: &str,
        flags: u32,
        topology_id: i32,
    ) -> Result<HeaderParams> {
        let message_id = self.next_message_id();
        transport.write_byte(REQUEST_MAGIC)?;
        transport.write_long(message_id as i64)?;
        transport.write_byte(opcode.0)?;
        transport.write_array(cache_name.as_bytes())?;
        transport.write_vint(flags as u64)?;
        transport.write_byte(CLIENT_INTELLIGENCE_BASIC)?;
        transport.write_vint(topology_id.max(0) as u64)?;
        Ok(HeaderParams {
            message_id,
            expected_response_opcode: opcode.response(),
            cache_name: cache_name.to_string(),
            flags,
            topology_id_snapshot: topology_id,
        })
    }

    fn read_response_header(&self, transport: &mut dyn Transport) -> Result<ResponseHeader> {
        let magic = transport.read_byte()?;
        if magic != RESPONSE_MAGIC {
            return Err(Error::protocol_mismatch(format!(
                "bad response magic 0x{magic:02x}"
            )));
        }
        let message_id = transport.read_long()? as u64;
        let opcode = OpCode(transport.read_byte()?);
        let status = transport.read_byte()?;
        let topology_marker = transport.read_byte()?;
        let new_topology_id = match topology_marker {
            TOPOLOGY_UNCHANGED => None,
            TOPOLOGY_CHANGED => Some(transport.read_vint()? as i32),
            other => {
                return Err(Error::protocol_mismatch(format!(
                    "bad topology marker 0x{other:02x}"
                )))
            }
        };
        Ok(ResponseHeader {
            message_id,
            opcode,
            status,
            new_topology_id,
        })
    }
}
