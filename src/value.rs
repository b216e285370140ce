//! Decoded register values.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A single decoded field value.
///
/// The variant follows the field type: `int16` and `sunssf` fields decode to
/// [`Value::I16`], `uint32`/`acc32`/`enum32`/`bitfield32` to [`Value::U32`],
/// and so on.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// Signed 16-bit integer.
    I16(i16),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// IEEE 754 single precision.
    F32(f32),
    /// IEEE 754 double precision.
    F64(f64),
    /// ASCII text.
    String(String),
    /// IPv4 address.
    Ipv4(Ipv4Addr),
    /// IPv6 address.
    Ipv6(Ipv6Addr),
    /// Opaque bytes (EUI-48 hardware addresses).
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the value as `i64` for every integer variant.
    ///
    /// `U64` values above `i64::MAX` return `None`.
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::Value;
    ///
    /// assert_eq!(Value::I16(-2).as_i64(), Some(-2));
    /// assert_eq!(Value::U32(70000).as_i64(), Some(70000));
    /// assert_eq!(Value::F32(1.5).as_i64(), None);
    /// ```
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I16(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::I32(v) => Some(v.into()),
            Self::U32(v) => Some(v.into()),
            Self::I64(v) => Some(v),
            Self::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns the value as `f64` for every numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v.into()),
            Self::F64(v) => Some(v),
            Self::U64(v) => Some(v as f64),
            Self::I64(v) => Some(v as f64),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Returns the text of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Applies a SunSpec scale factor: `value * 10^sf`.
    ///
    /// Returns `None` for non-numeric values.
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::Value;
    ///
    /// let watts = Value::U16(12345).scaled(-1).unwrap();
    /// assert!((watts - 1234.5).abs() < 1e-9);
    /// ```
    pub fn scaled(&self, scale_factor: i16) -> Option<f64> {
        self.as_f64()
            .map(|v| v * 10f64.powi(i32::from(scale_factor)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I16(v) => write!(f, "{}", v),
            Self::U16(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Ipv4(addr) => write!(f, "{}", addr),
            Self::Ipv6(addr) => write!(f, "{}", addr),
            Self::Bytes(bytes) => {
                let parts: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                write!(f, "{}", parts.join(":"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::U16(0xFFFF).as_i64(), Some(65535));
        assert_eq!(Value::I64(i64::MIN).as_i64(), Some(i64::MIN));
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::String("x".into()).as_i64(), None);
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(Value::F32(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::I16(-7).as_f64(), Some(-7.0));
        assert_eq!(Value::Ipv4(Ipv4Addr::LOCALHOST).as_f64(), None);
    }

    #[test]
    fn test_scaled() {
        assert_eq!(Value::I16(230).scaled(0), Some(230.0));
        assert_eq!(Value::U32(5).scaled(3), Some(5000.0));
        assert_eq!(Value::String("W".into()).scaled(1), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::I32(-12).to_string(), "-12");
        assert_eq!(Value::String("SolarEdge".into()).to_string(), "\"SolarEdge\"");
        assert_eq!(
            Value::Ipv4(Ipv4Addr::new(192, 168, 1, 2)).to_string(),
            "192.168.1.2"
        );
        assert_eq!(
            Value::Bytes(vec![0x00, 0x1B, 0x63, 0x84, 0x45, 0xE6]).to_string(),
            "00:1B:63:84:45:E6"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize_decoded_block() {
        let mut block = crate::decode::DecodedBlock::new();
        block.insert("Mn".to_string(), Value::String("SolarEdge".into()));
        block.insert("W".to_string(), Value::I16(-5));
        block.insert("IP".to_string(), Value::Ipv4(Ipv4Addr::new(10, 0, 0, 7)));

        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(json, r#"{"Mn":"SolarEdge","W":-5,"IP":"10.0.0.7"}"#);
    }
}
