//! Framed byte channel to one cache server.
//!
//! `Transport` is the boundary the pool and operation layer consume; the
//! real socket handling lives in one concrete implementation,
//! [`TcpTransport`], built the way the teacher crate's
//! `TcpNetworkTransport` builds its connections — buffered I/O, peer
//! address and activity tracking for health checks, `tracing` events on
//! connect/send/receive — adapted to blocking reads/writes per this
//! crate's synchronous transport model.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, warn};

/// A framed byte channel exclusively owned by one borrower at a time.
///
/// No method here is async: reads block the calling thread until the
/// requested number of bytes arrive or the connection fails. Timeouts, if
/// any, are the concern of the concrete implementation (e.g. socket read
/// deadlines), not of this trait.
pub trait Transport: Send {
    fn read_byte(&mut self) -> io::Result<u8>;
    fn read_long(&mut self) -> io::Result<i64>;
    fn read_vint(&mut self) -> io::Result<u64>;
    fn read_array(&mut self) -> io::Result<Bytes>;

    fn write_byte(&mut self, value: u8) -> io::Result<()>;
    fn write_long(&mut self, value: i64) -> io::Result<()>;
    fn write_vint(&mut self, value: u64) -> io::Result<()>;
    fn write_array(&mut self, data: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Cheap liveness check consulted by `ConnectionFactory::validate_object`
    /// and the eviction worker. Does not perform I/O.
    fn is_healthy(&self) -> bool;
}

/// Blocking TCP implementation of [`Transport`].
pub struct TcpTransport {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer_addr: SocketAddr,
    connected_at: Instant,
    last_activity: Instant,
    bytes_sent: u64,
    bytes_received: u64,
}

impl TcpTransport {
    /// Connect to `addr`, bounded by `connect_timeout`.
    pub fn connect(addr: impl ToSocketAddrs, connect_timeout: Duration) -> io::Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no address resolved"))?;
        let stream = TcpStream::connect_timeout(&addr, connect_timeout)?;
        stream.set_nodelay(true).ok();
        Self::from_stream(stream)
    }

    /// Wrap an already-connected stream (used by tests and by servers
    /// accepting inbound connections).
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let writer_stream = stream.try_clone()?;
        let now = Instant::now();
        debug!(peer = %peer_addr, "opened TCP transport");
        Ok(Self {
            reader: BufReader::new(stream),
            writer: BufWriter::new(writer_stream),
            peer_addr,
            connected_at: now,
            last_activity: now,
            bytes_sent: 0,
            bytes_received: 0,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

impl Transport for TcpTransport {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        self.bytes_received += 1;
        self.touch();
        Ok(buf[0])
    }

    fn read_long(&mut self) -> io::Result<i64> {
        let mut buf = [0u8; 8];
        self.reader.read_exact(&mut buf)?;
        self.bytes_received += 8;
        self.touch();
        Ok(i64::from_be_bytes(buf))
    }

    fn read_vint(&mut self) -> io::Result<u64> {
        let mut value: u64 = 0;
        for shift in (0..64).step_by(7) {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(io::Error::new(io::ErrorKind::InvalidData, "vint too long"))
    }

    fn read_array(&mut self) -> io::Result<Bytes> {
        let len = self.read_vint()? as usize;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        self.bytes_received += len as u64;
        self.touch();
        Ok(Bytes::from(buf))
    }

    fn write_byte(&mut self, value: u8) -> io::Result<()> {
        self.writer.write_all(&[value])?;
        self.bytes_sent += 1;
        self.touch();
        Ok(())
    }

    fn write_long(&mut self, value: i64) -> io::Result<()> {
        self.writer.write_all(&value.to_be_bytes())?;
        self.bytes_sent += 8;
        self.touch();
        Ok(())
    }

    fn write_vint(&mut self, mut value: u64) -> io::Result<()> {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.write_byte(byte)?;
            if value == 0 {
                return Ok(());
            }
        }
    }

    fn write_array(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_vint(data.len() as u64)?;
        self.writer.write_all(data)?;
        self.bytes_sent += data.len() as u64;
        self.touch();
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().map_err(|e| {
            warn!(peer = %self.peer_addr, error = %e, "failed to flush TCP transport");
            e
        })
    }

    fn is_healthy(&self) -> bool {
        self.last_activity.elapsed() < Duration::from_secs(60)
    }
}
