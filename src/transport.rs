//! Byte-stream transport for Modbus/TCP.
//!
//! The transport layer is separated from the protocol layer: it moves frames
//! and knows nothing about registers. [`Transport`] is the seam the client is
//! generic over; [`TcpTransport`] is the socket implementation.
//!
//! # Design
//!
//! - **Synchronous** - blocking send/receive with a configurable timeout
//! - **Exclusive** - one connection per client, one request in flight
//! - **Frame-aware receive** - reads the MBAP prefix, then exactly the
//!   declared remainder, so a frame split across TCP segments arrives whole
//!
//! # Example
//!
//! ```no_run
//! use sunspec_modbus::{TcpTransport, Transport};
//! use std::time::Duration;
//!
//! let mut transport = TcpTransport::connect(
//!     "192.168.1.20:502".parse().unwrap(),
//!     Duration::from_secs(2),
//! ).unwrap();
//!
//! let request = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x9C, 0x40, 0x00, 0x02];
//! transport.send(&request).unwrap();
//! let response = transport.receive(260).unwrap();
//! ```

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::trace;

use crate::error::{Result, SunSpecError};
use crate::frame::MBAP_PREFIX_SIZE;

/// Default Modbus/TCP port.
pub const DEFAULT_MODBUS_PORT: u16 = 502;

/// Default timeout for connect, send and receive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// A connected, ordered byte stream carrying one request/response at a time.
pub trait Transport {
    /// Sends one complete request frame.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receives one response frame of at most `max_len` bytes.
    ///
    /// An expired timeout is reported as [`SunSpecError::Timeout`].
    ///
    /// After an error the stream position is unknown: an oversized frame is
    /// left partly unread, and a late answer to a timed-out request is still
    /// queued. Later reads on the same connection would pick up those bytes
    /// and be rejected, so reconnect before reusing it.
    fn receive(&mut self, max_len: usize) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn receive(&mut self, max_len: usize) -> Result<Vec<u8>> {
        (**self).receive(max_len)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn receive(&mut self, max_len: usize) -> Result<Vec<u8>> {
        (**self).receive(max_len)
    }
}

/// TCP transport for Modbus communication.
///
/// A `Timeout` or `InvalidResponse` from [`receive`](Transport::receive)
/// leaves the connection out of step with the device. Drop the transport and
/// connect again.
pub struct TcpTransport {
    stream: TcpStream,
    remote_addr: SocketAddr,
}

impl TcpTransport {
    /// Connects to a device and applies `timeout` to connect, read and write.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the connection attempt expires and `Io` for any
    /// other socket error.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(map_io_error)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            remote_addr: addr,
        })
    }

    /// Connects with [`DEFAULT_TIMEOUT`].
    pub fn with_default_timeout(addr: SocketAddr) -> Result<Self> {
        Self::connect(addr, DEFAULT_TIMEOUT)
    }

    /// Returns the remote device address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Closes both directions of the connection.
    pub fn close(&self) -> Result<()> {
        self.stream.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        trace!(peer = %self.remote_addr, bytes = data.len(), "send");
        self.stream.write_all(data).map_err(map_io_error)
    }

    fn receive(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let mut frame = vec![0u8; MBAP_PREFIX_SIZE];
        self.stream.read_exact(&mut frame).map_err(map_io_error)?;

        let length = u16::from_be_bytes([frame[4], frame[5]]) as usize;
        let total = MBAP_PREFIX_SIZE + length;
        if total > max_len {
            return Err(SunSpecError::invalid_response(format!(
                "frame of {} bytes exceeds limit of {}",
                total, max_len
            )));
        }

        frame.resize(total, 0);
        self.stream
            .read_exact(&mut frame[MBAP_PREFIX_SIZE..])
            .map_err(map_io_error)?;
        trace!(peer = %self.remote_addr, bytes = frame.len(), "receive");
        Ok(frame)
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.stream.local_addr().ok())
            .finish()
    }
}

fn map_io_error(e: io::Error) -> SunSpecError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => SunSpecError::Timeout,
        _ => SunSpecError::Io(e),
    }
}
