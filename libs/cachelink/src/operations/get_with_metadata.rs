//! `GET_WITH_METADATA` — fetch a value along with its expiry and
//! version metadata.

use bytes::Bytes;

use crate::codec::{OpCode, ResponseHeader, INFINITE_LIFESPAN, INFINITE_MAXIDLE, NO_ERROR_STATUS};
use crate::error::Result;
use crate::factory::TransportFactory;
use crate::pool::PooledTransport;
use crate::transport::Transport;

use super::{CacheOperation, KeyOperation};

/// Outcome of a `GetWithMetadata`. `created`/`lifespan` and
/// `last_used`/`max_idle` are each `None` together when the server's
/// per-field flag byte reports that side of the entry as infinite —
/// those fields are omitted from the wire payload entirely, not sent as
/// zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataEntry {
    Found {
        created: Option<i64>,
        lifespan: Option<u64>,
        last_used: Option<i64>,
        max_idle: Option<u64>,
        version: u64,
        value: Bytes,
    },
    Missing {
        status: u8,
    },
}

pub struct GetWithMetadataOperation {
    cache_name: String,
    key: Vec<u8>,
    flags: u32,
}

impl GetWithMetadataOperation {
    pub fn new(cache_name: impl Into<String>, key: impl Into<Vec<u8>>, flags: u32) -> Self {
        Self {
            cache_name: cache_name.into(),
            key: key.into(),
            flags,
        }
    }
}

impl CacheOperation for GetWithMetadataOperation {
    type Output = MetadataEntry;

    fn cache_name(&self) -> &str {
        &self.cache_name
    }

    fn request_opcode(&self) -> OpCode {
        OpCode::GET_WITH_METADATA_REQUEST
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

    fn read_body(&self, transport: &mut dyn Transport, header: &ResponseHeader) -> Result<MetadataEntry> {
        if header.status != NO_ERROR_STATUS {
            return Ok(MetadataEntry::Missing { status: header.status });
        }

        let flag = transport.read_byte()?;
        let (created, lifespan) = if flag & INFINITE_LIFESPAN != INFINITE_LIFESPAN {
            (Some(transport.read_long()?), Some(transport.read_vint()?))
        } else {
            (None, None)
        };
        let (last_used, max_idle) = if flag & INFINITE_MAXIDLE != INFINITE_MAXIDLE {
            (Some(transport.read_long()?), Some(transport.read_vint()?))
        } else {
            (None, None)
        };
        let version = transport.read_long()? as u64;
        let value = transport.read_array()?;

        Ok(MetadataEntry::Found {
            created,
            lifespan,
            last_used,
            max_idle,
            version,
            value,
        })
    }
}

impl KeyOperation for GetWithMetadataOperation {
    fn key(&self) -> &[u8] {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, WireCodec};
    use crate::config::PoolConfig;
    use crate::endpoint::Endpoint;
    use crate::factory::{DefaultConnectionFactory, DefaultTransportFactory};
    use std::net::TcpListener;
    use std::thread;

    fn fake_server_infinite_entry(value: &'static [u8]) -> (Endpoint, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut transport = crate::transport::TcpTransport::from_stream(stream).unwrap();
            let _magic = transport.read_byte().unwrap();
            let message_id = transport.read_long().unwrap();
            let _opcode = transport.read_byte().unwrap();
            let _cache_name = transport.read_array().unwrap();
            let _flags = transport.read_vint().unwrap();
            let _intelligence = transport.read_byte().unwrap();
            let _topology = transport.read_vint().unwrap();
            let _key = transport.read_array().unwrap();

            transport.write_byte(0xA1).unwrap();
            transport.write_long(message_id).unwrap();
            transport
                .write_byte(OpCode::GET_WITH_METADATA_RESPONSE.0)
                .unwrap();
            transport.write_byte(NO_ERROR_STATUS).unwrap();
            transport.write_byte(0).unwrap();
            transport
                .write_byte(INFINITE_LIFESPAN | INFINITE_MAXIDLE)
                .unwrap();
            transport.write_long(9).unwrap(); // version
            transport.write_array(value).unwrap();
            transport.flush().unwrap();
        });
        (Endpoint::new(addr.ip().to_string(), addr.port()), handle)
    }

    #[test]
    fn infinite_entry_omits_expiry_fields() {
        let (endpoint, server) = fake_server_infinite_entry(b"world");
        let factory = DefaultTransportFactory::new(
            vec![endpoint],
            DefaultConnectionFactory::default(),
            PoolConfig {
                min_idle: 0,
                ..Default::default()
            },
        )
        .unwrap();
        let codec = WireCodec::new();
        let op = GetWithMetadataOperation::new("default", b"k".to_vec(), 0);
        let result = op.execute(&factory, &codec).unwrap();
        assert_eq!(
            result,
            MetadataEntry::Found {
                created: None,
                lifespan: None,
                last_used: None,
                max_idle: None,
                version: 9,
                value: Bytes::from_static(b"world"),
            }
        );
        server.join().unwrap();
        factory.shutdown();
    }
}
