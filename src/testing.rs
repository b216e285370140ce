//! In-memory Modbus device for unit tests.

use std::collections::{HashMap, VecDeque};

use crate::error::{Result, SunSpecError};
use crate::frame::{FUNCTION_READ_HOLDING_REGISTERS, REQUEST_SIZE};
use crate::transport::Transport;

/// A read request as seen by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SeenRequest {
    pub unit_id: u8,
    pub address: u16,
    pub count: u16,
}

/// Answers read requests from a sparse register map.
///
/// Reads touching an unmapped register get an "illegal data address"
/// exception, as real devices do.
#[derive(Debug, Default)]
pub(crate) struct SimulatedDevice {
    unit_id: u8,
    registers: HashMap<u16, u16>,
    pending: VecDeque<Vec<u8>>,
    pub requests: Vec<SeenRequest>,
    /// Index of a request to answer with a foreign transaction id.
    pub corrupt_request: Option<usize>,
    /// Index of a request to leave unanswered.
    pub drop_request: Option<usize>,
}

impl SimulatedDevice {
    pub fn new(unit_id: u8) -> Self {
        Self {
            unit_id,
            ..Self::default()
        }
    }

    pub fn with_registers(mut self, start: u16, values: &[u16]) -> Self {
        for (i, value) in values.iter().enumerate() {
            self.registers.insert(start + i as u16, *value);
        }
        self
    }

    pub fn with_sunspec_marker(self, base: u16) -> Self {
        self.with_registers(base, &[0x5375, 0x6E53])
    }

    pub fn sends(&self) -> usize {
        self.requests.len()
    }

    fn respond(&self, request: &[u8]) -> Vec<u8> {
        let tid = [request[0], request[1]];
        let unit_id = request[6];
        let address = u16::from_be_bytes([request[8], request[9]]);
        let count = u16::from_be_bytes([request[10], request[11]]);

        let values: Option<Vec<u16>> = (0..count)
            .map(|i| {
                address
                    .checked_add(i)
                    .and_then(|a| self.registers.get(&a).copied())
            })
            .collect();

        let mut frame = tid.to_vec();
        frame.extend_from_slice(&[0x00, 0x00]);
        match values {
            Some(values) if unit_id == self.unit_id => {
                let byte_count = values.len() * 2;
                frame.extend_from_slice(&((byte_count + 3) as u16).to_be_bytes());
                frame.push(unit_id);
                frame.push(FUNCTION_READ_HOLDING_REGISTERS);
                frame.push(byte_count as u8);
                for value in values {
                    frame.extend_from_slice(&value.to_be_bytes());
                }
            }
            _ => {
                frame.extend_from_slice(&[0x00, 0x03, unit_id]);
                frame.push(FUNCTION_READ_HOLDING_REGISTERS | 0x80);
                frame.push(0x02);
            }
        }
        frame
    }
}

impl Transport for SimulatedDevice {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), REQUEST_SIZE, "unexpected request size");
        let index = self.requests.len();
        self.requests.push(SeenRequest {
            unit_id: data[6],
            address: u16::from_be_bytes([data[8], data[9]]),
            count: u16::from_be_bytes([data[10], data[11]]),
        });

        if self.drop_request == Some(index) {
            return Ok(());
        }
        let mut response = self.respond(data);
        if self.corrupt_request == Some(index) {
            response[0] ^= 0xFF;
        }
        self.pending.push_back(response);
        Ok(())
    }

    fn receive(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let frame = self.pending.pop_front().ok_or(SunSpecError::Timeout)?;
        assert!(frame.len() <= max_len);
        Ok(frame)
    }
}
