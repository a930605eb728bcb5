//! collectd binary network protocol (version 4 "parts").
//!
//! Every record is a TLV part:
//!
//! ```text
//! ┌───────────────┬───────────────┬──────────────────────────────┐
//! │ type: u16 BE  │ length: u16 BE│ payload (length - 4 bytes)   │
//! └───────────────┴───────────────┴──────────────────────────────┘
//! ```
//!
//! String parts carry the bytes plus a terminating NUL, numeric parts an
//! `i64` in network byte order. The values part is special: a `u16` count,
//! then all kind tags, then all 8-byte values.
//!
//! The encoders here are pure: the same input always yields the same bytes.

pub mod batch;
pub mod decode;
pub mod message;

pub use batch::{Append, BatchAssembler, BatchStats, MAX_DATAGRAM_SIZE};
pub use decode::{DecodeError, Part, decode_parts};
pub use message::{Header, MetricGroup, MetricGroupBuilder, build_header};

/// Size of the type + length prefix of every part.
pub const PART_HEADER_LEN: usize = 4;

/// Total size of a numeric part.
pub const NUMERIC_PART_LEN: usize = PART_HEADER_LEN + 8;

/// Size of the values part before the kind tags (type, length, count).
pub const VALUES_HEADER_LEN: usize = 6;

/// Bytes per value in a values part: one kind tag plus an 8-byte value.
pub const VALUE_ENTRY_LEN: usize = 1 + 8;

/// Part type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FieldCode {
    Host = 0x0000,
    Time = 0x0001,
    Plugin = 0x0002,
    PluginInstance = 0x0003,
    Type = 0x0004,
    TypeInstance = 0x0005,
    Values = 0x0006,
    Interval = 0x0007,
}

/// Encoding class of a part, decided by its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    String,
    Numeric,
}

impl FieldCode {
    pub const ALL: [FieldCode; 8] = [
        FieldCode::Host,
        FieldCode::Time,
        FieldCode::Plugin,
        FieldCode::PluginInstance,
        FieldCode::Type,
        FieldCode::TypeInstance,
        FieldCode::Values,
        FieldCode::Interval,
    ];

    /// Returns the wire value of this code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Maps a wire value back to a code.
    pub fn from_code(code: u16) -> Result<Self, EncodeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(EncodeError::UnknownFieldCode(code))
    }

    /// Returns the encoding class, or `None` for the values part which has
    /// its own layout (see [`encode_values`]).
    pub fn class(self) -> Option<FieldClass> {
        match self {
            FieldCode::Host
            | FieldCode::Plugin
            | FieldCode::PluginInstance
            | FieldCode::Type
            | FieldCode::TypeInstance => Some(FieldClass::String),
            FieldCode::Time | FieldCode::Interval => Some(FieldClass::Numeric),
            FieldCode::Values => None,
        }
    }
}

impl std::fmt::Display for FieldCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldCode::Host => "host",
            FieldCode::Time => "time",
            FieldCode::Plugin => "plugin",
            FieldCode::PluginInstance => "plugin_instance",
            FieldCode::Type => "type",
            FieldCode::TypeInstance => "type_instance",
            FieldCode::Values => "values",
            FieldCode::Interval => "interval",
        };
        write!(f, "{} (0x{:04x})", name, self.code())
    }
}

/// Data source kind tag of a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueKind {
    Counter = 0,
    Gauge = 1,
    Derive = 2,
    Absolute = 3,
}

impl ValueKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ValueKind::Counter),
            1 => Some(ValueKind::Gauge),
            2 => Some(ValueKind::Derive),
            3 => Some(ValueKind::Absolute),
            _ => None,
        }
    }
}

/// A measurement with its kind fixed by the variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Monotonic cumulative counter.
    Counter(u64),
    /// Instantaneous reading.
    Gauge(f64),
    /// Signed rate of change.
    Derive(i64),
    /// Counter that resets on read.
    Absolute(u64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Counter(_) => ValueKind::Counter,
            Value::Gauge(_) => ValueKind::Gauge,
            Value::Derive(_) => ValueKind::Derive,
            Value::Absolute(_) => ValueKind::Absolute,
        }
    }

    /// Wire bytes of the value. Gauges are the only little-endian field in
    /// the protocol.
    pub fn to_wire(&self) -> [u8; 8] {
        match *self {
            Value::Counter(v) | Value::Absolute(v) => v.to_be_bytes(),
            Value::Gauge(v) => v.to_le_bytes(),
            Value::Derive(v) => v.to_be_bytes(),
        }
    }
}

/// Payload handed to [`encode_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Str(&'a str),
    Num(i64),
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(s: &'a str) -> Self {
        FieldValue::Str(s)
    }
}

impl<'a> From<&'a String> for FieldValue<'a> {
    fn from(s: &'a String) -> Self {
        FieldValue::Str(s.as_str())
    }
}

impl From<i64> for FieldValue<'_> {
    fn from(n: i64) -> Self {
        FieldValue::Num(n)
    }
}

/// Error type for encoding failures.
///
/// These indicate a mismatch between caller and encoder, never a runtime
/// condition of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The code is neither a string nor a numeric part.
    UnknownFieldCode(u16),
    /// A string was given for a numeric part or the other way round.
    ValueMismatch { code: FieldCode },
    /// The string does not fit the 16-bit length field.
    StringTooLong { code: FieldCode, len: usize },
    /// Strings are NUL-terminated on the wire.
    EmbeddedNul { code: FieldCode },
    /// The values part length does not fit 16 bits.
    TooManyValues(usize),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::UnknownFieldCode(code) => {
                write!(f, "invalid type code 0x{:04x} for a string or numeric part", code)
            }
            EncodeError::ValueMismatch { code } => {
                write!(f, "value does not match the encoding class of {}", code)
            }
            EncodeError::StringTooLong { code, len } => {
                write!(f, "string of {} bytes is too long for {}", len, code)
            }
            EncodeError::EmbeddedNul { code } => {
                write!(f, "string for {} contains a NUL byte", code)
            }
            EncodeError::TooManyValues(count) => {
                write!(f, "{} values do not fit in one values part", count)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Encodes a string or numeric part.
///
/// The class of `code` decides the layout; passing [`FieldCode::Values`]
/// fails with [`EncodeError::UnknownFieldCode`].
pub fn encode_field<'a>(
    code: FieldCode,
    value: impl Into<FieldValue<'a>>,
) -> Result<Vec<u8>, EncodeError> {
    let value = value.into();
    match (code.class(), value) {
        (Some(FieldClass::String), FieldValue::Str(s)) => encode_string(code, s),
        (Some(FieldClass::Numeric), FieldValue::Num(n)) => Ok(encode_numeric(code, n)),
        (Some(_), _) => Err(EncodeError::ValueMismatch { code }),
        (None, _) => Err(EncodeError::UnknownFieldCode(code.code())),
    }
}

/// Same as [`encode_field`] but starting from a raw wire code.
pub fn encode_raw_field<'a>(
    code: u16,
    value: impl Into<FieldValue<'a>>,
) -> Result<Vec<u8>, EncodeError> {
    encode_field(FieldCode::from_code(code)?, value)
}

fn encode_string(code: FieldCode, s: &str) -> Result<Vec<u8>, EncodeError> {
    if s.as_bytes().contains(&0) {
        return Err(EncodeError::EmbeddedNul { code });
    }
    let total = PART_HEADER_LEN + s.len() + 1;
    let length = u16::try_from(total).map_err(|_| EncodeError::StringTooLong {
        code,
        len: s.len(),
    })?;

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&code.code().to_be_bytes());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    Ok(buf)
}

fn encode_numeric(code: FieldCode, n: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(NUMERIC_PART_LEN);
    buf.extend_from_slice(&code.code().to_be_bytes());
    buf.extend_from_slice(&(NUMERIC_PART_LEN as u16).to_be_bytes());
    buf.extend_from_slice(&n.to_be_bytes());
    buf
}

/// Encodes a values part.
///
/// collectd does not interleave (kind, value) pairs: all kind tags come
/// first, then all values, both in caller order.
pub fn encode_values(values: &[Value]) -> Result<Vec<u8>, EncodeError> {
    let total = VALUES_HEADER_LEN + values.len() * VALUE_ENTRY_LEN;
    let length = u16::try_from(total).map_err(|_| EncodeError::TooManyValues(values.len()))?;
    // length fits, so the count does too
    let count = values.len() as u16;

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&FieldCode::Values.code().to_be_bytes());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    buf.extend(values.iter().map(|v| v.kind().tag()));
    for value in values {
        buf.extend_from_slice(&value.to_wire());
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_host_string() {
        let bytes = encode_field(FieldCode::Host, "h1").unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x07, b'h', b'1', 0x00]);
    }

    #[test]
    fn test_string_length_includes_header_and_nul() {
        let long = "x".repeat(300);
        for s in ["", "a", "eth0", "percent_bytes", long.as_str()] {
            for code in [
                FieldCode::Host,
                FieldCode::Plugin,
                FieldCode::PluginInstance,
                FieldCode::Type,
                FieldCode::TypeInstance,
            ] {
                let bytes = encode_field(code, s).unwrap();
                let length = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
                assert_eq!(length, 4 + s.len() + 1);
                assert_eq!(bytes.len(), length);
                assert_eq!(u16::from_be_bytes([bytes[0], bytes[1]]), code.code());
                assert_eq!(&bytes[4..bytes.len() - 1], s.as_bytes());
                assert_eq!(bytes.last(), Some(&0));
            }
        }
    }

    #[test]
    fn test_encode_numeric() {
        let bytes = encode_field(FieldCode::Time, 1000i64).unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0x01, 0x00, 0x0c, 0, 0, 0, 0, 0, 0, 0x03, 0xe8]
        );

        for n in [0i64, 1, -1, 60, i64::MAX, i64::MIN, 1_700_000_000] {
            let bytes = encode_field(FieldCode::Interval, n).unwrap();
            assert_eq!(bytes.len(), 12);
            assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 12);
            let decoded = i64::from_be_bytes(bytes[4..12].try_into().unwrap());
            assert_eq!(decoded, n);
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = encode_field(FieldCode::Plugin, "memory").unwrap();
        let b = encode_field(FieldCode::Plugin, "memory").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_values_code_is_not_a_field() {
        assert_eq!(
            encode_field(FieldCode::Values, "x"),
            Err(EncodeError::UnknownFieldCode(0x0006))
        );
        assert_eq!(
            encode_raw_field(0x0042, 5i64),
            Err(EncodeError::UnknownFieldCode(0x0042))
        );
    }

    #[test]
    fn test_value_class_mismatch() {
        assert_eq!(
            encode_field(FieldCode::Host, 5i64),
            Err(EncodeError::ValueMismatch {
                code: FieldCode::Host
            })
        );
        assert_eq!(
            encode_field(FieldCode::Time, "now"),
            Err(EncodeError::ValueMismatch {
                code: FieldCode::Time
            })
        );
    }

    #[test]
    fn test_string_limits() {
        assert_eq!(
            encode_field(FieldCode::Type, "a\0b"),
            Err(EncodeError::EmbeddedNul {
                code: FieldCode::Type
            })
        );

        let max = "x".repeat(u16::MAX as usize - 5);
        assert!(encode_field(FieldCode::Type, max.as_str()).is_ok());

        let over = "x".repeat(u16::MAX as usize - 4);
        assert!(matches!(
            encode_field(FieldCode::Type, over.as_str()),
            Err(EncodeError::StringTooLong { .. })
        ));
    }

    #[test]
    fn test_encode_values_layout() {
        let values = [
            Value::Counter(0x0102030405060708),
            Value::Gauge(1.5),
            Value::Derive(-2),
            Value::Absolute(7),
        ];
        let bytes = encode_values(&values).unwrap();

        assert_eq!(bytes.len(), 6 + 4 * 9);
        assert_eq!(&bytes[0..2], &[0x00, 0x06]);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]) as usize, 6 + 4 * 9);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 4);

        // All kind tags precede any value byte.
        assert_eq!(&bytes[6..10], &[0, 1, 2, 3]);

        let value_at = |i: usize| -> [u8; 8] { bytes[10 + i * 8..18 + i * 8].try_into().unwrap() };
        assert_eq!(value_at(0), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(f64::from_le_bytes(value_at(1)), 1.5);
        assert_eq!(i64::from_be_bytes(value_at(2)), -2);
        assert_eq!(u64::from_be_bytes(value_at(3)), 7);
    }

    #[test]
    fn test_encode_values_keeps_order() {
        let bytes = encode_values(&[Value::Counter(10), Value::Counter(20)]).unwrap();
        assert_eq!(&bytes[6..8], &[0, 0]);
        assert_eq!(u64::from_be_bytes(bytes[8..16].try_into().unwrap()), 10);
        assert_eq!(u64::from_be_bytes(bytes[16..24].try_into().unwrap()), 20);
    }

    #[test]
    fn test_encode_values_empty_and_overflow() {
        let empty = encode_values(&[]).unwrap();
        assert_eq!(empty, vec![0x00, 0x06, 0x00, 0x06, 0x00, 0x00]);

        let too_many = vec![Value::Gauge(0.0); 8000];
        assert_eq!(
            encode_values(&too_many),
            Err(EncodeError::TooManyValues(8000))
        );
    }

    #[test]
    fn test_field_code_round_trip() {
        for code in FieldCode::ALL {
            assert_eq!(FieldCode::from_code(code.code()), Ok(code));
        }
        assert_eq!(FieldCode::Values.class(), None);
        assert_eq!(FieldCode::Time.class(), Some(FieldClass::Numeric));
        assert_eq!(FieldCode::Host.class(), Some(FieldClass::String));
    }
}
