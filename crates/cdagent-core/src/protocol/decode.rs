//! Datagram decoder, used to verify encoder output and to render datagrams
//! in dry-run mode.

use super::{FieldClass, FieldCode, PART_HEADER_LEN, VALUE_ENTRY_LEN, VALUES_HEADER_LEN, Value, ValueKind};

/// A decoded part.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Host(String),
    Time(i64),
    Plugin(String),
    PluginInstance(String),
    Type(String),
    TypeInstance(String),
    Values(Vec<Value>),
    Interval(i64),
}

impl std::fmt::Display for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Part::Host(s) => write!(f, "host={}", s),
            Part::Time(t) => write!(f, "time={}", t),
            Part::Plugin(s) => write!(f, "plugin={}", s),
            Part::PluginInstance(s) => write!(f, "plugin_instance={}", s),
            Part::Type(s) => write!(f, "type={}", s),
            Part::TypeInstance(s) => write!(f, "type_instance={}", s),
            Part::Interval(i) => write!(f, "interval={}", i),
            Part::Values(values) => {
                write!(f, "values=[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match value {
                        Value::Counter(v) => write!(f, "counter:{}", v)?,
                        Value::Gauge(v) => write!(f, "gauge:{}", v)?,
                        Value::Derive(v) => write!(f, "derive:{}", v)?,
                        Value::Absolute(v) => write!(f, "absolute:{}", v)?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

/// Error type for malformed datagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the part header or declared length.
    Truncated { offset: usize },
    /// Declared length is impossible for the part type.
    BadLength { offset: usize, length: usize },
    UnknownType { offset: usize, code: u16 },
    UnknownKind { offset: usize, tag: u8 },
    /// String part without the terminating NUL.
    MissingNul { offset: usize },
    InvalidUtf8 { offset: usize },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Truncated { offset } => write!(f, "truncated part at offset {}", offset),
            DecodeError::BadLength { offset, length } => {
                write!(f, "invalid part length {} at offset {}", length, offset)
            }
            DecodeError::UnknownType { offset, code } => {
                write!(f, "unknown part type 0x{:04x} at offset {}", code, offset)
            }
            DecodeError::UnknownKind { offset, tag } => {
                write!(f, "unknown value kind {} at offset {}", tag, offset)
            }
            DecodeError::MissingNul { offset } => {
                write!(f, "string part at offset {} is not NUL-terminated", offset)
            }
            DecodeError::InvalidUtf8 { offset } => {
                write!(f, "string part at offset {} is not valid UTF-8", offset)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Splits a datagram into its parts.
pub fn decode_parts(datagram: &[u8]) -> Result<Vec<Part>, DecodeError> {
    let mut parts = Vec::new();
    let mut offset = 0;

    while offset < datagram.len() {
        let rest = &datagram[offset..];
        if rest.len() < PART_HEADER_LEN {
            return Err(DecodeError::Truncated { offset });
        }
        let code = u16::from_be_bytes([rest[0], rest[1]]);
        let length = u16::from_be_bytes([rest[2], rest[3]]) as usize;
        if length < PART_HEADER_LEN {
            return Err(DecodeError::BadLength { offset, length });
        }
        if rest.len() < length {
            return Err(DecodeError::Truncated { offset });
        }
        let payload = &rest[PART_HEADER_LEN..length];

        let code = FieldCode::from_code(code)
            .map_err(|_| DecodeError::UnknownType { offset, code })?;
        let part = match code.class() {
            Some(FieldClass::String) => {
                let s = decode_string(payload, offset)?;
                match code {
                    FieldCode::Host => Part::Host(s),
                    FieldCode::Plugin => Part::Plugin(s),
                    FieldCode::PluginInstance => Part::PluginInstance(s),
                    FieldCode::Type => Part::Type(s),
                    _ => Part::TypeInstance(s),
                }
            }
            Some(FieldClass::Numeric) => {
                let bytes: [u8; 8] = payload
                    .try_into()
                    .map_err(|_| DecodeError::BadLength { offset, length })?;
                let n = i64::from_be_bytes(bytes);
                if code == FieldCode::Time {
                    Part::Time(n)
                } else {
                    Part::Interval(n)
                }
            }
            None => Part::Values(decode_values(payload, offset, length)?),
        };

        parts.push(part);
        offset += length;
    }

    Ok(parts)
}

fn decode_string(payload: &[u8], offset: usize) -> Result<String, DecodeError> {
    let (last, body) = payload
        .split_last()
        .ok_or(DecodeError::MissingNul { offset })?;
    if *last != 0 {
        return Err(DecodeError::MissingNul { offset });
    }
    String::from_utf8(body.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset })
}

fn decode_values(payload: &[u8], offset: usize, length: usize) -> Result<Vec<Value>, DecodeError> {
    if payload.len() < VALUES_HEADER_LEN - PART_HEADER_LEN {
        return Err(DecodeError::BadLength { offset, length });
    }
    let count = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    if length != VALUES_HEADER_LEN + count * VALUE_ENTRY_LEN {
        return Err(DecodeError::BadLength { offset, length });
    }

    let tags = &payload[2..2 + count];
    let data = &payload[2 + count..];

    tags.iter()
        .enumerate()
        .map(|(i, &tag)| {
            let kind = ValueKind::from_tag(tag).ok_or(DecodeError::UnknownKind { offset, tag })?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&data[i * 8..i * 8 + 8]);
            Ok(match kind {
                ValueKind::Counter => Value::Counter(u64::from_be_bytes(raw)),
                ValueKind::Gauge => Value::Gauge(f64::from_le_bytes(raw)),
                ValueKind::Derive => Value::Derive(i64::from_be_bytes(raw)),
                ValueKind::Absolute => Value::Absolute(u64::from_be_bytes(raw)),
            })
        })
        .collect()
}
