//! Field layouts: named, typed, register-offset tables.
//!
//! A [`FieldLayout`] describes a contiguous register block as an ordered table
//! of [`Field`] entries. Each entry carries its register offset from the start
//! of the block, so the table is self-describing and can contain gaps.
//!
//! # Field Types
//!
//! | Tag | Registers | Unimplemented |
//! |-----|:---------:|---------------|
//! | `int16`, `sunssf` | 1 | 0x8000 |
//! | `uint16`, `enum16`, `bitfield16` | 1 | 0xFFFF |
//! | `acc16` | 1 | 0x0000 |
//! | `count` | 1 | - |
//! | `int32` | 2 | 0x80000000 |
//! | `uint32`, `enum32`, `bitfield32` | 2 | 0xFFFFFFFF |
//! | `acc32`, `ipaddr` | 2 | 0x00000000 |
//! | `float32` | 2 | 0x7FC00000, 0xFF7FFFFF |
//! | `int64` | 4 | 0x8000000000000000 |
//! | `uint64`, `bitfield64`, `eui48` | 4 | 0xFFFFFFFFFFFFFFFF |
//! | `acc64` | 4 | 0 |
//! | `float64` | 4 | 0x7FF8000000000000 |
//! | `ipv6addr` | 8 | all zero |
//! | `string` | declared | - |
//! | `pad` | declared | - |
//!
//! # Example
//!
//! ```
//! use sunspec_modbus::{Field, FieldLayout, FieldType};
//!
//! static HEADER: &[Field] = &[
//!     Field::new(0, "ID", FieldType::Uint16, 1),
//!     Field::new(1, "L", FieldType::Uint16, 1),
//! ];
//!
//! let layout = FieldLayout::from_static(HEADER);
//! assert_eq!(layout.register_count(), 2);
//! ```

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SunSpecError};

/// Register data types understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldType {
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Repeat count of a repeating group.
    Count,
    /// 16-bit accumulator.
    Acc16,
    /// 16-bit enumeration.
    Enum16,
    /// 16-bit bitfield.
    Bitfield16,
    /// Scale factor exponent.
    Sunssf,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    Uint32,
    /// 32-bit accumulator.
    Acc32,
    /// 32-bit enumeration.
    Enum32,
    /// 32-bit bitfield.
    Bitfield32,
    /// IPv4 address.
    Ipaddr,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    Uint64,
    /// 64-bit accumulator.
    Acc64,
    /// 64-bit bitfield.
    Bitfield64,
    /// EUI-48 hardware address stored in four registers.
    Eui48,
    /// IEEE 754 single precision.
    Float32,
    /// IEEE 754 double precision.
    Float64,
    /// IPv6 address.
    Ipv6addr,
    /// NUL-terminated ASCII text of the declared length.
    String,
    /// Padding registers; never produce a value.
    Pad,
}

/// The bit pattern a device reports for a field it does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// The assembled register value equals this pattern.
    Bits(u64),
    /// The assembled register value equals any of these patterns.
    AnyOf(&'static [u64]),
    /// Every byte of the field is zero.
    AllZero,
}

impl Sentinel {
    /// Returns whether an assembled register value is this marker.
    pub fn matches(self, bits: u64) -> bool {
        match self {
            Self::Bits(pattern) => bits == pattern,
            Self::AnyOf(patterns) => patterns.contains(&bits),
            Self::AllZero => bits == 0,
        }
    }
}

/// Quiet NaN, and -3.4028235e38 as written by SolarEdge storage and grid
/// protection registers.
const FLOAT32_UNIMPLEMENTED: &[u64] = &[0x7FC0_0000, 0xFF7F_FFFF];

impl FieldType {
    /// All field types, in table order.
    pub const ALL: [FieldType; 23] = [
        Self::Int16,
        Self::Uint16,
        Self::Count,
        Self::Acc16,
        Self::Enum16,
        Self::Bitfield16,
        Self::Sunssf,
        Self::Int32,
        Self::Uint32,
        Self::Acc32,
        Self::Enum32,
        Self::Bitfield32,
        Self::Ipaddr,
        Self::Int64,
        Self::Uint64,
        Self::Acc64,
        Self::Bitfield64,
        Self::Eui48,
        Self::Float32,
        Self::Float64,
        Self::Ipv6addr,
        Self::String,
        Self::Pad,
    ];

    /// Returns the type tag used in SunSpec model definitions.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Count => "count",
            Self::Acc16 => "acc16",
            Self::Enum16 => "enum16",
            Self::Bitfield16 => "bitfield16",
            Self::Sunssf => "sunssf",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Acc32 => "acc32",
            Self::Enum32 => "enum32",
            Self::Bitfield32 => "bitfield32",
            Self::Ipaddr => "ipaddr",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Acc64 => "acc64",
            Self::Bitfield64 => "bitfield64",
            Self::Eui48 => "eui48",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Ipv6addr => "ipv6addr",
            Self::String => "string",
            Self::Pad => "pad",
        }
    }

    /// Returns the fixed size in registers, or `None` for types whose size
    /// comes from the layout entry (`string`, `pad`).
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::FieldType;
    ///
    /// assert_eq!(FieldType::Uint32.fixed_registers(), Some(2));
    /// assert_eq!(FieldType::String.fixed_registers(), None);
    /// ```
    pub const fn fixed_registers(self) -> Option<u16> {
        match self {
            Self::Int16
            | Self::Uint16
            | Self::Count
            | Self::Acc16
            | Self::Enum16
            | Self::Bitfield16
            | Self::Sunssf => Some(1),
            Self::Int32
            | Self::Uint32
            | Self::Acc32
            | Self::Enum32
            | Self::Bitfield32
            | Self::Ipaddr
            | Self::Float32 => Some(2),
            Self::Int64
            | Self::Uint64
            | Self::Acc64
            | Self::Bitfield64
            | Self::Eui48
            | Self::Float64 => Some(4),
            Self::Ipv6addr => Some(8),
            Self::String | Self::Pad => None,
        }
    }

    /// Returns the "not implemented" marker for this type.
    pub const fn sentinel(self) -> Option<Sentinel> {
        match self {
            Self::Int16 | Self::Sunssf => Some(Sentinel::Bits(0x8000)),
            Self::Uint16 | Self::Enum16 | Self::Bitfield16 => Some(Sentinel::Bits(0xFFFF)),
            Self::Acc16 | Self::Acc32 | Self::Acc64 | Self::Ipaddr => Some(Sentinel::Bits(0)),
            Self::Int32 => Some(Sentinel::Bits(0x8000_0000)),
            Self::Uint32 | Self::Enum32 | Self::Bitfield32 => Some(Sentinel::Bits(0xFFFF_FFFF)),
            Self::Float32 => Some(Sentinel::AnyOf(FLOAT32_UNIMPLEMENTED)),
            Self::Int64 => Some(Sentinel::Bits(0x8000_0000_0000_0000)),
            Self::Uint64 | Self::Bitfield64 | Self::Eui48 => Some(Sentinel::Bits(u64::MAX)),
            Self::Float64 => Some(Sentinel::Bits(0x7FF8_0000_0000_0000)),
            Self::Ipv6addr => Some(Sentinel::AllZero),
            Self::Count | Self::String | Self::Pad => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for FieldType {
    type Err = SunSpecError;

    fn from_str(tag: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|ty| ty.tag() == tag)
            .ok_or_else(|| SunSpecError::unknown_field_type(tag))
    }
}

/// Order of the registers making up a multi-register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WordOrder {
    /// Most significant register first (SunSpec models).
    #[default]
    BigEndian,
    /// Least significant register first (vendor-specific maps).
    LittleEndian,
}

/// One named entry of a [`FieldLayout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Register offset from the start of the block.
    pub offset: u16,
    /// Field name used as the key of the decoded value.
    pub name: Cow<'static, str>,
    /// Data type.
    pub field_type: FieldType,
    /// Declared length in registers; 0 means one repetition of the type.
    pub length: u16,
}

impl Field {
    /// Creates a field with a static name, usable in `static` tables.
    pub const fn new(offset: u16, name: &'static str, field_type: FieldType, length: u16) -> Self {
        Self {
            offset,
            name: Cow::Borrowed(name),
            field_type,
            length,
        }
    }

    /// Creates a field with an owned name.
    pub fn owned(offset: u16, name: impl Into<String>, field_type: FieldType, length: u16) -> Self {
        Self {
            offset,
            name: Cow::Owned(name.into()),
            field_type,
            length,
        }
    }

    /// Number of registers this field occupies.
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::{Field, FieldType};
    ///
    /// assert_eq!(Field::new(0, "Mn", FieldType::String, 16).register_count(), 16);
    /// assert_eq!(Field::new(0, "Pad", FieldType::Pad, 0).register_count(), 1);
    /// assert_eq!(Field::new(0, "W", FieldType::Int32, 0).register_count(), 2);
    /// ```
    pub fn register_count(&self) -> u16 {
        self.field_type
            .fixed_registers()
            .unwrap_or_else(|| self.length.max(1))
    }

    /// Register offset one past the end of this field.
    pub fn end(&self) -> u32 {
        u32::from(self.offset) + u32::from(self.register_count())
    }
}

/// An ordered, offset-indexed table of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    fields: Cow<'static, [Field]>,
    word_order: WordOrder,
}

impl FieldLayout {
    /// Creates an empty layout to be filled with [`FieldLayout::field`].
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::{FieldLayout, FieldType, WordOrder};
    ///
    /// let layout = FieldLayout::new(WordOrder::LittleEndian)
    ///     .field(0, "RatedEnergy", FieldType::Float32, 2)
    ///     .field(2, "Status", FieldType::Uint32, 2);
    /// assert_eq!(layout.len(), 2);
    /// assert_eq!(layout.register_count(), 4);
    /// ```
    pub fn new(word_order: WordOrder) -> Self {
        Self {
            fields: Cow::Owned(Vec::new()),
            word_order,
        }
    }

    /// Wraps a static field table with big-endian word order.
    pub const fn from_static(fields: &'static [Field]) -> Self {
        Self {
            fields: Cow::Borrowed(fields),
            word_order: WordOrder::BigEndian,
        }
    }

    /// Builds a layout from textual `(offset, name, tag, length)` entries, as
    /// produced by model-table generators.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFieldType` for an unrecognized tag and `InvalidLayout`
    /// for entries that fail [`FieldLayout::validate`].
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::FieldLayout;
    ///
    /// let layout = FieldLayout::from_entries([
    ///     (0, "ID", "uint16", 1),
    ///     (1, "L", "uint16", 1),
    ///     (2, "Mn", "string", 16),
    /// ]).unwrap();
    /// assert_eq!(layout.register_count(), 18);
    ///
    /// assert!(FieldLayout::from_entries([(0, "X", "uint128", 8)]).is_err());
    /// ```
    pub fn from_entries<I, N, T>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u16, N, T, u16)>,
        N: Into<String>,
        T: AsRef<str>,
    {
        let fields = entries
            .into_iter()
            .map(|(offset, name, tag, length)| -> Result<Field> {
                let field_type = tag.as_ref().parse::<FieldType>()?;
                Ok(Field::owned(offset, name, field_type, length))
            })
            .collect::<Result<Vec<_>>>()?;

        let layout = Self {
            fields: Cow::Owned(fields),
            word_order: WordOrder::BigEndian,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Sets the word order for multi-register values.
    pub fn with_word_order(mut self, word_order: WordOrder) -> Self {
        self.word_order = word_order;
        self
    }

    /// Appends a field.
    pub fn field(
        mut self,
        offset: u16,
        name: impl Into<String>,
        field_type: FieldType,
        length: u16,
    ) -> Self {
        self.fields
            .to_mut()
            .push(Field::owned(offset, name, field_type, length));
        self
    }

    /// Checks that fixed-size fields declare 0 or their natural length and
    /// that names are unique.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::with_capacity(self.fields.len());
        for field in self.fields.iter() {
            if let Some(size) = field.field_type.fixed_registers() {
                if field.length != 0 && field.length != size {
                    return Err(SunSpecError::invalid_layout(
                        field.name.as_ref(),
                        format!(
                            "{} occupies {} registers, declared {}",
                            field.field_type, size, field.length
                        ),
                    ));
                }
            }
            if field.field_type != FieldType::Pad && !names.insert(field.name.as_ref()) {
                return Err(SunSpecError::invalid_layout(
                    field.name.as_ref(),
                    "duplicate field name",
                ));
            }
        }
        Ok(())
    }

    /// Returns the fields in table order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the word order for multi-register values.
    pub fn word_order(&self) -> WordOrder {
        self.word_order
    }

    /// Number of registers needed to decode every field.
    pub fn register_count(&self) -> u32 {
        self.fields.iter().map(Field::end).max().unwrap_or(0)
    }

    /// Number of fields, padding included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the layout has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for ty in FieldType::ALL {
            assert_eq!(ty.tag().parse::<FieldType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_unknown_tag() {
        let err = "float16".parse::<FieldType>().unwrap_err();
        match err {
            SunSpecError::UnknownFieldType { tag } => assert_eq!(tag, "float16"),
            other => panic!("Expected UnknownFieldType, got {:?}", other),
        }
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(FieldType::Uint16.sentinel(), Some(Sentinel::Bits(0xFFFF)));
        assert_eq!(FieldType::Sunssf.sentinel(), Some(Sentinel::Bits(0x8000)));
        assert_eq!(FieldType::Acc32.sentinel(), Some(Sentinel::Bits(0)));
        assert_eq!(FieldType::Ipv6addr.sentinel(), Some(Sentinel::AllZero));
        assert_eq!(FieldType::String.sentinel(), None);
        assert_eq!(FieldType::Count.sentinel(), None);
    }

    #[test]
    fn test_float32_sentinel_patterns() {
        let sentinel = FieldType::Float32.sentinel().unwrap();
        assert!(sentinel.matches(0x7FC0_0000));
        assert!(sentinel.matches(0xFF7F_FFFF));
        assert!(!sentinel.matches(0x4366_8000));
        assert!(!Sentinel::Bits(0xFFFF).matches(0xFFFE));
    }

    #[test]
    fn test_register_count_with_gaps() {
        let layout = FieldLayout::new(WordOrder::BigEndian)
            .field(0, "A", FieldType::Uint16, 1)
            .field(10, "B", FieldType::Float64, 4);
        assert_eq!(layout.register_count(), 14);
        assert_eq!(FieldLayout::new(WordOrder::BigEndian).register_count(), 0);
    }

    #[test]
    fn test_validate_length_mismatch() {
        let err = FieldLayout::from_entries([(0, "W", "int32", 1)]).unwrap_err();
        assert!(matches!(err, SunSpecError::InvalidLayout { .. }));
        assert!(FieldLayout::from_entries([(0, "W", "int32", 0)]).is_ok());
        assert!(FieldLayout::from_entries([(0, "W", "int32", 2)]).is_ok());
    }

    #[test]
    fn test_validate_duplicate_names() {
        let err = FieldLayout::from_entries([(0, "V", "uint16", 1), (1, "V", "uint16", 1)])
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        // padding entries may share a name
        assert!(FieldLayout::from_entries([(0, "Pad", "pad", 1), (1, "Pad", "pad", 1)]).is_ok());
    }

    #[test]
    fn test_static_layout_word_order() {
        static FIELDS: &[Field] = &[Field::new(0, "A", FieldType::Uint32, 2)];
        let layout = FieldLayout::from_static(FIELDS);
        assert_eq!(layout.word_order(), WordOrder::BigEndian);
        let layout = layout.with_word_order(WordOrder::LittleEndian);
        assert_eq!(layout.word_order(), WordOrder::LittleEndian);
        assert_eq!(layout.fields()[0].name, "A");
    }
}
