//! Modbus/TCP register client.
//!
//! This module provides [`ModbusClient`], which reads ranges of holding
//! registers of any length and decodes them against a [`FieldLayout`].
//!
//! # Overview
//!
//! The client handles:
//! - Splitting reads into requests of at most [`MAX_REGISTERS_PER_CHUNK`] registers
//! - Request/response correlation via the transaction id
//! - Response validation
//! - Layout decoding of the concatenated payload
//!
//! A read is all or nothing: if any chunk fails, the whole read fails and no
//! partial data is returned. Nothing is retried.
//!
//! # Example
//!
//! ```no_run
//! use sunspec_modbus::{ClientConfig, FieldLayout, FieldType, ModbusClient, WordOrder};
//! use std::net::Ipv4Addr;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into()).with_port(1502);
//! let mut client = ModbusClient::connect(&config)?;
//!
//! // Raw register payload
//! let payload = client.read_registers(1, 40000, 250)?;
//! assert_eq!(payload.len(), 500);
//!
//! // Decoded through a layout
//! let layout = FieldLayout::new(WordOrder::LittleEndian)
//!     .field(0, "VgMax1", FieldType::Float32, 2)
//!     .field(2, "VgMax1_HoldTime", FieldType::Uint32, 2);
//! let block = client.read_layout(1, 0xF602, &layout)?;
//! # Ok::<(), sunspec_modbus::SunSpecError>(())
//! ```
//!
//! # Thread Safety
//!
//! Every operation takes `&mut self`: one client owns one connection and at
//! most one request is in flight.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tracing::debug;

use crate::decode::{decode, DecodedBlock};
use crate::error::{Result, SunSpecError};
use crate::frame::{ReadRequest, MAX_FRAME_SIZE};
use crate::layout::FieldLayout;
use crate::transport::{TcpTransport, Transport, DEFAULT_MODBUS_PORT, DEFAULT_TIMEOUT};

/// Registers requested per round trip.
///
/// Below the protocol limit of 125 to leave headroom in the 255-byte payload.
pub const MAX_REGISTERS_PER_CHUNK: u16 = 120;

/// Number of addressable registers.
const ADDRESS_SPACE: u32 = 0x1_0000;

/// Configuration for connecting a [`ModbusClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    /// Device socket address.
    pub device_addr: SocketAddr,
    /// Connect, send and receive timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration with the default port (502) and timeout (2 s).
    ///
    /// # Arguments
    ///
    /// * `ip` - Device IP address
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::ClientConfig;
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into());
    /// assert_eq!(config.device_addr.port(), 502);
    /// ```
    pub fn new(ip: IpAddr) -> Self {
        Self {
            device_addr: SocketAddr::new(ip, DEFAULT_MODBUS_PORT),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets a custom port (default is 502).
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::ClientConfig;
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into())
    ///     .with_port(1502);
    /// ```
    pub fn with_port(mut self, port: u16) -> Self {
        self.device_addr.set_port(port);
        self
    }

    /// Sets a custom timeout (default is 2 seconds).
    ///
    /// # Arguments
    ///
    /// * `timeout` - Applied to connect, send and receive
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::ClientConfig;
    /// use std::net::Ipv4Addr;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into())
    ///     .with_timeout(Duration::from_secs(5));
    /// assert_eq!(config.timeout, Duration::from_secs(5));
    /// ```
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Register client over a [`Transport`].
pub struct ModbusClient<T> {
    transport: T,
    transaction_id: u16,
}

impl ModbusClient<TcpTransport> {
    /// Connects to the device described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection cannot be established.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = TcpTransport::connect(config.device_addr, config.timeout)?;
        debug!(device = %config.device_addr, "connected");
        Ok(Self::new(transport))
    }
}

impl<T: Transport> ModbusClient<T> {
    /// Creates a client over an already connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            transaction_id: 0,
        }
    }

    /// Generates the next transaction id.
    fn next_transaction_id(&mut self) -> u16 {
        let id = self.transaction_id;
        self.transaction_id = id.wrapping_add(1);
        id
    }

    /// Reads `count` registers starting at `address`.
    ///
    /// Returns the payload as delivered by [`parse_response`](crate::parse_response):
    /// `2 * count` bytes in address order, each register's bytes exchanged.
    ///
    /// # Arguments
    ///
    /// * `unit_id` - Modbus unit id of the device
    /// * `address` - First register address
    /// * `count` - Number of registers; split into requests of at most
    ///   [`MAX_REGISTERS_PER_CHUNK`]
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `count` is 0 or the range runs past register 65535
    /// - Communication fails or times out
    /// - Any response fails validation
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sunspec_modbus::frame::register_words;
    /// use sunspec_modbus::{ClientConfig, ModbusClient};
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into());
    /// let mut client = ModbusClient::connect(&config)?;
    ///
    /// // Three requests: 120, 120 and 10 registers
    /// let payload = client.read_registers(1, 40000, 250)?;
    /// let words = register_words(&payload);
    /// println!("first register: 0x{:04X}", words[0]);
    /// # Ok::<(), sunspec_modbus::SunSpecError>(())
    /// ```
    pub fn read_registers(&mut self, unit_id: u8, address: u16, count: u16) -> Result<Vec<u8>> {
        if count == 0 {
            return Err(SunSpecError::invalid_parameter("count", "must be greater than 0"));
        }
        if u32::from(address) + u32::from(count) > ADDRESS_SPACE {
            return Err(SunSpecError::invalid_parameter(
                "count",
                format!("{} registers from {} exceed the address space", count, address),
            ));
        }

        let mut payload = Vec::with_capacity(usize::from(count) * 2);
        let mut address = address;
        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(MAX_REGISTERS_PER_CHUNK);
            payload.extend(self.read_chunk(unit_id, address, chunk)?);
            remaining -= chunk;
            // wraps only after the final chunk ends at register 65535
            address = address.wrapping_add(chunk);
        }
        Ok(payload)
    }

    /// One request/response round trip.
    fn read_chunk(&mut self, unit_id: u8, address: u16, count: u16) -> Result<Vec<u8>> {
        let request = ReadRequest::new(self.next_transaction_id(), unit_id, address, count)?;
        debug!(
            transaction_id = request.transaction_id,
            unit_id,
            address,
            count,
            "read holding registers"
        );

        self.transport.send(&request.to_bytes())?;
        let response = self.transport.receive(MAX_FRAME_SIZE)?;

        let payload = request.parse_response(&response).ok_or_else(|| {
            SunSpecError::invalid_response(format!(
                "no valid answer for {} registers at {} from unit {}",
                count, address, unit_id
            ))
        })?;
        if payload.len() != usize::from(count) * 2 {
            return Err(SunSpecError::invalid_response(format!(
                "expected {} bytes of register data, got {}",
                usize::from(count) * 2,
                payload.len()
            )));
        }
        Ok(payload)
    }

    /// Reads the registers covered by `layout` at `address` and decodes them.
    ///
    /// An empty layout decodes to an empty block without any request.
    ///
    /// # Arguments
    ///
    /// * `unit_id` - Modbus unit id of the device
    /// * `address` - Register address of layout offset 0
    /// * `layout` - Fields to decode
    ///
    /// # Errors
    ///
    /// Returns the errors of [`read_registers`](Self::read_registers) and of
    /// [`decode`](crate::decode()).
    pub fn read_layout(
        &mut self,
        unit_id: u8,
        address: u16,
        layout: &FieldLayout,
    ) -> Result<DecodedBlock> {
        let count = layout.register_count();
        if count == 0 {
            return Ok(DecodedBlock::new());
        }
        let count = u16::try_from(count).map_err(|_| {
            SunSpecError::invalid_parameter("layout", format!("spans {} registers", count))
        })?;

        let payload = self.read_registers(unit_id, address, count)?;
        decode(layout, &payload)
    }

    /// Returns a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the client and returns the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T> std::fmt::Debug for ModbusClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusClient")
            .field("transaction_id", &self.transaction_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::register_words;
    use crate::layout::{FieldType, WordOrder};
    use crate::testing::SimulatedDevice;
    use crate::value::Value;
    use std::net::Ipv4Addr;

    fn ramp(count: u16) -> Vec<u16> {
        (0..count).map(|i| i.wrapping_mul(257)).collect()
    }

    #[test]
    fn test_client_config_new() {
        let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into());
        assert_eq!(config.device_addr.port(), DEFAULT_MODBUS_PORT);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_client_config_builders() {
        let config = ClientConfig::new(Ipv4Addr::new(10, 0, 0, 1).into())
            .with_port(1502)
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.device_addr, "10.0.0.1:1502".parse().unwrap());
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_transaction_id_increments() {
        let mut client = ModbusClient::new(SimulatedDevice::new(1));
        assert_eq!(client.next_transaction_id(), 0);
        assert_eq!(client.next_transaction_id(), 1);
        client.transaction_id = u16::MAX;
        assert_eq!(client.next_transaction_id(), u16::MAX);
        assert_eq!(client.next_transaction_id(), 0);
    }

    #[test]
    fn test_single_chunk_read() {
        let device = SimulatedDevice::new(1).with_registers(40000, &[0x0001, 0xA1B2]);
        let mut client = ModbusClient::new(device);

        let payload = client.read_registers(1, 40000, 2).unwrap();
        assert_eq!(payload, vec![0x01, 0x00, 0xB2, 0xA1]);
        assert_eq!(client.transport().sends(), 1);
    }

    #[test]
    fn test_chunked_read_matches_single_read() {
        let values = ramp(250);
        let device = SimulatedDevice::new(1).with_registers(40000, &values);
        let mut client = ModbusClient::new(device);

        let payload = client.read_registers(1, 40000, 250).unwrap();
        assert_eq!(payload.len(), 500);
        assert_eq!(register_words(&payload), values);

        let requests: Vec<(u16, u16)> = client
            .transport()
            .requests
            .iter()
            .map(|r| (r.address, r.count))
            .collect();
        assert_eq!(requests, vec![(40000, 120), (40120, 120), (40240, 10)]);
        assert!(client.transport().requests.iter().all(|r| r.unit_id == 1));
    }

    #[test]
    fn test_exact_chunk_boundary() {
        let device = SimulatedDevice::new(1).with_registers(0, &ramp(240));
        let mut client = ModbusClient::new(device);

        client.read_registers(1, 0, 240).unwrap();
        let counts: Vec<u16> = client.transport().requests.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![120, 120]);
    }

    #[test]
    fn test_read_at_top_of_address_space() {
        let device = SimulatedDevice::new(1).with_registers(65535 - 129, &ramp(130));
        let mut client = ModbusClient::new(device);

        let payload = client.read_registers(1, 65535 - 129, 130).unwrap();
        assert_eq!(payload.len(), 260);
    }

    #[test]
    fn test_invalid_chunk_fails_whole_read() {
        let mut device = SimulatedDevice::new(1).with_registers(0, &ramp(250));
        device.corrupt_request = Some(1);
        let mut client = ModbusClient::new(device);

        let err = client.read_registers(1, 0, 250).unwrap_err();
        assert!(matches!(err, SunSpecError::InvalidResponse { .. }));
        // no retry, no further chunks
        assert_eq!(client.transport().sends(), 2);
    }

    #[test]
    fn test_unanswered_chunk_times_out() {
        let mut device = SimulatedDevice::new(1).with_registers(0, &ramp(10));
        device.drop_request = Some(0);
        let mut client = ModbusClient::new(device);

        let err = client.read_registers(1, 0, 10).unwrap_err();
        assert!(matches!(err, SunSpecError::Timeout));
    }

    #[test]
    fn test_exception_response_is_invalid() {
        let device = SimulatedDevice::new(1).with_registers(0, &ramp(10));
        let mut client = ModbusClient::new(device);

        let err = client.read_registers(1, 5, 10).unwrap_err();
        assert!(err.is_read_failure());
    }

    #[test]
    fn test_wrong_unit_is_invalid() {
        let device = SimulatedDevice::new(2).with_registers(0, &ramp(10));
        let mut client = ModbusClient::new(device);
        assert!(client.read_registers(1, 0, 10).is_err());
    }

    #[test]
    fn test_invalid_ranges() {
        let mut client = ModbusClient::new(SimulatedDevice::new(1));

        let err = client.read_registers(1, 0, 0).unwrap_err();
        assert!(matches!(err, SunSpecError::InvalidParameter { .. }));

        let err = client.read_registers(1, 65535, 2).unwrap_err();
        assert!(matches!(err, SunSpecError::InvalidParameter { .. }));
        assert_eq!(client.transport().sends(), 0);
    }

    #[test]
    fn test_read_layout() {
        let device =
            SimulatedDevice::new(1).with_registers(0xE100, &[0x0000, 0x4120, 0xFFFF, 0xFFFF]);
        let mut client = ModbusClient::new(device);
        let layout = FieldLayout::new(WordOrder::LittleEndian)
            .field(0, "RatedEnergy", FieldType::Float32, 2)
            .field(2, "Status", FieldType::Uint32, 2);

        let block = client.read_layout(1, 0xE100, &layout).unwrap();
        assert_eq!(block.get("RatedEnergy"), Some(&Value::F32(10.0)));
        assert!(!block.contains_key("Status"));
    }

    #[test]
    fn test_read_empty_layout_sends_nothing() {
        let mut client = ModbusClient::new(SimulatedDevice::new(1));
        let block = client
            .read_layout(1, 0, &FieldLayout::new(WordOrder::BigEndian))
            .unwrap();
        assert!(block.is_empty());
        assert_eq!(client.transport().sends(), 0);
    }

    #[test]
    fn test_client_debug() {
        let client = ModbusClient::new(SimulatedDevice::new(1));
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("ModbusClient"));
    }
}
