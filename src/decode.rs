//! Layout-driven decoding of register payloads.
//!
//! [`decode`] walks a [`FieldLayout`] over a register payload as returned by
//! the frame codec (each register's bytes exchanged) and produces a
//! [`DecodedBlock`]. Fields that carry their type's "not implemented" marker
//! are left out of the result, so a missing key means the device does not
//! populate that field.
//!
//! # Example
//!
//! ```
//! use sunspec_modbus::{decode, FieldLayout, FieldType, Value, WordOrder};
//!
//! let layout = FieldLayout::new(WordOrder::BigEndian)
//!     .field(0, "A", FieldType::Uint16, 1)
//!     .field(1, "PhVphA", FieldType::Uint16, 1);
//!
//! // Registers 0x0001 and 0xFFFF as delivered by the frame codec
//! let payload = [0x01, 0x00, 0xFF, 0xFF];
//! let block = decode(&layout, &payload).unwrap();
//!
//! assert_eq!(block.get("A"), Some(&Value::U16(1)));
//! assert!(!block.contains_key("PhVphA"));
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Result, SunSpecError};
use crate::frame::swap_register_bytes;
use crate::layout::{FieldLayout, FieldType, WordOrder};
use crate::value::Value;

/// Decoded fields in layout order, keyed by field name.
pub type DecodedBlock = IndexMap<String, Value>;

/// First wire byte of a string field the device reports as empty.
const EMPTY_STRING_MARKER: u8 = 0x80;

/// Decodes every field of `layout` from a register payload.
///
/// `data` is addressed from the start of the layout: field offset `n` starts
/// at byte `2 * n`.
///
/// # Errors
///
/// Returns `LayoutOverrun` if a field extends past the end of `data`.
pub fn decode(layout: &FieldLayout, data: &[u8]) -> Result<DecodedBlock> {
    let mut block = DecodedBlock::with_capacity(layout.len());

    for field in layout.fields() {
        if field.field_type == FieldType::Pad {
            continue;
        }

        let start = usize::from(field.offset) * 2;
        let end = start + usize::from(field.register_count()) * 2;
        let raw = data
            .get(start..end)
            .ok_or_else(|| SunSpecError::LayoutOverrun {
                field: field.name.to_string(),
                needed: end,
                available: data.len(),
            })?;

        match decode_field(field.field_type, raw, layout.word_order()) {
            Some(value) => {
                block.insert(field.name.to_string(), value);
            }
            None => trace!(field = %field.name, "not implemented"),
        }
    }

    Ok(block)
}

/// Decodes a single field from exactly its own registers.
///
/// Returns `None` for padding and for values equal to the type's sentinel.
pub(crate) fn decode_field(
    field_type: FieldType,
    raw: &[u8],
    word_order: WordOrder,
) -> Option<Value> {
    let value = match field_type {
        FieldType::Pad => return None,
        FieldType::String => Value::String(decode_string(raw)),
        FieldType::Ipv6addr => {
            let wire: [u8; 16] = swap_register_bytes(raw).try_into().ok()?;
            if wire.iter().all(|&b| b == 0) {
                return None;
            }
            Value::Ipv6(Ipv6Addr::from(wire))
        }
        _ => {
            let bits = assemble(raw, word_order);
            if field_type.sentinel().is_some_and(|s| s.matches(bits)) {
                return None;
            }
            numeric_value(field_type, bits)?
        }
    };
    Some(value)
}

/// Joins the registers of a field into one integer, most significant first.
fn assemble(raw: &[u8], word_order: WordOrder) -> u64 {
    let registers = raw
        .chunks_exact(2)
        .map(|register| u64::from(u16::from_le_bytes([register[0], register[1]])));
    let push = |acc: u64, register: u64| (acc << 16) | register;

    match word_order {
        WordOrder::BigEndian => registers.fold(0, push),
        WordOrder::LittleEndian => registers.rev().fold(0, push),
    }
}

fn numeric_value(field_type: FieldType, bits: u64) -> Option<Value> {
    let value = match field_type {
        FieldType::Int16 | FieldType::Sunssf => Value::I16(bits as u16 as i16),
        FieldType::Uint16
        | FieldType::Count
        | FieldType::Acc16
        | FieldType::Enum16
        | FieldType::Bitfield16 => Value::U16(bits as u16),
        FieldType::Int32 => Value::I32(bits as u32 as i32),
        FieldType::Uint32 | FieldType::Acc32 | FieldType::Enum32 | FieldType::Bitfield32 => {
            Value::U32(bits as u32)
        }
        FieldType::Ipaddr => Value::Ipv4(Ipv4Addr::from(bits as u32)),
        FieldType::Int64 => Value::I64(bits as i64),
        FieldType::Uint64 | FieldType::Acc64 | FieldType::Bitfield64 => Value::U64(bits),
        // 48 significant bits in the low three registers
        FieldType::Eui48 => Value::Bytes(bits.to_be_bytes()[2..].to_vec()),
        FieldType::Float32 => Value::F32(f32::from_bits(bits as u32)),
        FieldType::Float64 => Value::F64(f64::from_bits(bits)),
        FieldType::Ipv6addr | FieldType::String | FieldType::Pad => return None,
    };
    Some(value)
}

/// Reads text in wire order up to the first NUL, one char per byte.
fn decode_string(raw: &[u8]) -> String {
    let wire = swap_register_bytes(raw);
    if wire.first() == Some(&EMPTY_STRING_MARKER) {
        return String::new();
    }
    wire.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}
