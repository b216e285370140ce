//! Modbus/TCP frame codec for "read holding registers".
//!
//! # Request Structure
//!
//! | Byte | Field | Value |
//! |------|-------|-------|
//! | 0-1 | Transaction ID | chosen by the client |
//! | 2-3 | Protocol ID | always 0x0000 |
//! | 4-5 | Length | always 0x0006 |
//! | 6 | Unit ID | device unit |
//! | 7 | Function code | 0x03 |
//! | 8-9 | Start address | big-endian |
//! | 10-11 | Register count | big-endian, 1-125 |
//!
//! # Response Structure
//!
//! A response repeats the transaction, protocol and unit ids, declares the
//! number of bytes that follow the length field, and carries `byte_count`
//! bytes of register data after a 9-byte header.
//!
//! Response validation never fails loudly: a frame that does not answer the
//! request is simply rejected with `None`, because at this layer a corrupted
//! or out-of-order frame cannot be told apart from a dropped one.
//!
//! # Example
//!
//! ```
//! use sunspec_modbus::{parse_response, ReadRequest};
//!
//! let request = ReadRequest::new(0x1248, 1, 40000, 2).unwrap();
//! assert_eq!(
//!     request.to_bytes(),
//!     [0x12, 0x48, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x9C, 0x40, 0x00, 0x02]
//! );
//!
//! let response = [
//!     0x12, 0x48, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, // header
//!     0x53, 0x75, 0x6E, 0x53, // "SunS"
//! ];
//! let payload = parse_response(&response, 0x1248, 1).unwrap();
//! assert_eq!(payload, vec![0x75, 0x53, 0x53, 0x6E]);
//! ```

use tracing::debug;

use crate::error::{Result, SunSpecError};

/// Size of a read request frame in bytes.
pub const REQUEST_SIZE: usize = 12;

/// Size of the MBAP prefix (transaction, protocol and length fields).
pub const MBAP_PREFIX_SIZE: usize = 6;

/// Size of a read response header: MBAP prefix, unit id, function code, byte count.
pub const RESPONSE_HEADER_SIZE: usize = 9;

/// Largest Modbus/TCP frame.
pub const MAX_FRAME_SIZE: usize = 260;

/// Function code for "read holding registers".
pub const FUNCTION_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Protocol limit on registers per read request.
pub const MAX_REGISTERS_PER_REQUEST: u16 = 125;

const PROTOCOL_ID: u16 = 0x0000;
const REQUEST_LENGTH: u16 = 6;

/// A single "read holding registers" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    /// Transaction id echoed by the device.
    pub transaction_id: u16,
    /// Unit id of the addressed device.
    pub unit_id: u8,
    /// First register address.
    pub address: u16,
    /// Number of registers to read (1-125).
    pub count: u16,
}

impl ReadRequest {
    /// Creates a new read request.
    ///
    /// # Arguments
    ///
    /// * `transaction_id` - Echoed by the device in its response
    /// * `unit_id` - Modbus unit id of the device
    /// * `address` - First register address
    /// * `count` - Number of registers (1-125)
    ///
    /// # Errors
    ///
    /// Returns an error if count is 0 or exceeds [`MAX_REGISTERS_PER_REQUEST`].
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::ReadRequest;
    ///
    /// assert!(ReadRequest::new(1, 1, 40000, 125).is_ok());
    /// assert!(ReadRequest::new(1, 1, 40000, 126).is_err());
    /// assert!(ReadRequest::new(1, 1, 40000, 0).is_err());
    /// ```
    pub fn new(transaction_id: u16, unit_id: u8, address: u16, count: u16) -> Result<Self> {
        if count == 0 {
            return Err(SunSpecError::invalid_parameter("count", "must be greater than 0"));
        }
        if count > MAX_REGISTERS_PER_REQUEST {
            return Err(SunSpecError::invalid_parameter(
                "count",
                format!("must not exceed {}", MAX_REGISTERS_PER_REQUEST),
            ));
        }

        Ok(Self {
            transaction_id,
            unit_id,
            address,
            count,
        })
    }

    /// Serializes the request to its 12-byte wire form.
    pub fn to_bytes(self) -> [u8; REQUEST_SIZE] {
        let [tid_hi, tid_lo] = self.transaction_id.to_be_bytes();
        let [proto_hi, proto_lo] = PROTOCOL_ID.to_be_bytes();
        let [len_hi, len_lo] = REQUEST_LENGTH.to_be_bytes();
        let [addr_hi, addr_lo] = self.address.to_be_bytes();
        let [cnt_hi, cnt_lo] = self.count.to_be_bytes();
        [
            tid_hi,
            tid_lo,
            proto_hi,
            proto_lo,
            len_hi,
            len_lo,
            self.unit_id,
            FUNCTION_READ_HOLDING_REGISTERS,
            addr_hi,
            addr_lo,
            cnt_hi,
            cnt_lo,
        ]
    }

    /// Validates a response against this request.
    ///
    /// See [`parse_response`].
    pub fn parse_response(&self, data: &[u8]) -> Option<Vec<u8>> {
        parse_response(data, self.transaction_id, self.unit_id)
    }
}

/// Validates a read response and returns its register payload.
///
/// Each register's two bytes are exchanged in the returned payload, so a
/// single register reads as a little-endian `u16`. Returns `None` for any
/// frame that does not answer the expected transaction and unit.
///
/// # Arguments
///
/// * `data` - The complete response frame, MBAP header included
/// * `transaction_id` - Transaction id of the request
/// * `unit_id` - Unit id of the request
///
/// # Example
///
/// ```
/// use sunspec_modbus::parse_response;
///
/// // Wrong transaction id
/// let response = [0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x01];
/// assert!(parse_response(&response, 0x0001, 1).is_none());
/// ```
pub fn parse_response(data: &[u8], transaction_id: u16, unit_id: u8) -> Option<Vec<u8>> {
    match validate_response(data, transaction_id, unit_id) {
        Ok(payload) => Some(swap_register_bytes(payload)),
        Err(reason) => {
            debug!(
                transaction_id,
                unit_id,
                len = data.len(),
                %reason,
                "rejected read response"
            );
            None
        }
    }
}

fn validate_response(
    data: &[u8],
    transaction_id: u16,
    unit_id: u8,
) -> std::result::Result<&[u8], String> {
    if data.len() < RESPONSE_HEADER_SIZE {
        return Err(format!(
            "response too short: expected at least {} bytes, got {}",
            RESPONSE_HEADER_SIZE,
            data.len()
        ));
    }

    let received_tid = u16::from_be_bytes([data[0], data[1]]);
    if received_tid != transaction_id {
        return Err(format!(
            "transaction id mismatch: expected 0x{:04X}, received 0x{:04X}",
            transaction_id, received_tid
        ));
    }

    let protocol_id = u16::from_be_bytes([data[2], data[3]]);
    if protocol_id != PROTOCOL_ID {
        return Err(format!("unexpected protocol id 0x{:04X}", protocol_id));
    }

    let length = u16::from_be_bytes([data[4], data[5]]) as usize;
    if length != data.len() - MBAP_PREFIX_SIZE {
        return Err(format!(
            "length field {} does not match {} remaining bytes",
            length,
            data.len() - MBAP_PREFIX_SIZE
        ));
    }

    if data[6] != unit_id {
        return Err(format!(
            "unit id mismatch: expected {}, received {}",
            unit_id, data[6]
        ));
    }

    if data[7] != FUNCTION_READ_HOLDING_REGISTERS {
        return Err(format!("unexpected function code 0x{:02X}", data[7]));
    }

    // unit id + function code + byte count precede the register data
    let byte_count = data[8] as usize;
    if byte_count + 3 != length {
        return Err(format!(
            "byte count {} does not fill length field {}",
            byte_count, length
        ));
    }
    if byte_count % 2 != 0 {
        return Err(format!("odd byte count {}", byte_count));
    }

    Ok(&data[RESPONSE_HEADER_SIZE..])
}

/// Exchanges the two bytes of every register.
///
/// Applying it twice restores the original order.
pub(crate) fn swap_register_bytes(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(2)
        .flat_map(|register| [register[1], register[0]])
        .collect()
}

/// Converts a payload returned by [`parse_response`] back to register values.
///
/// # Example
///
/// ```
/// use sunspec_modbus::frame::register_words;
///
/// assert_eq!(register_words(&[0x01, 0x00, 0xFF, 0xFF]), vec![0x0001, 0xFFFF]);
/// ```
pub fn register_words(payload: &[u8]) -> Vec<u16> {
    payload
        .chunks_exact(2)
        .map(|register| u16::from_le_bytes([register[0], register[1]]))
        .collect()
}
