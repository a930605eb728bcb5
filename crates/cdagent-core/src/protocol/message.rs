//! Message building blocks: the per-plugin header and metric groups.

use super::{EncodeError, FieldCode, Value, encode_field, encode_values};

/// Host, time, plugin and interval parts shared by every datagram of one
/// plugin in one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    plugin: String,
    bytes: Vec<u8>,
}

impl Header {
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builds a header: host, time, plugin, interval, in that order.
pub fn build_header(
    plugin: &str,
    host: &str,
    time: i64,
    interval: i64,
) -> Result<Header, EncodeError> {
    let mut bytes = encode_field(FieldCode::Host, host)?;
    bytes.extend(encode_field(FieldCode::Time, time)?);
    bytes.extend(encode_field(FieldCode::Plugin, plugin)?);
    bytes.extend(encode_field(FieldCode::Interval, interval)?);
    Ok(Header {
        plugin: plugin.to_string(),
        bytes,
    })
}

/// Encoded parts describing one observation instance (a core, an
/// interface, a volume). Never split across datagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricGroup {
    bytes: Vec<u8>,
}

impl MetricGroup {
    pub fn builder() -> MetricGroupBuilder {
        MetricGroupBuilder::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Appends parts in call order. The first encoding error is kept and
/// returned from [`MetricGroupBuilder::build`].
#[derive(Debug, Default)]
pub struct MetricGroupBuilder {
    bytes: Vec<u8>,
    error: Option<EncodeError>,
}

impl MetricGroupBuilder {
    fn push(mut self, part: Result<Vec<u8>, EncodeError>) -> Self {
        if self.error.is_none() {
            match part {
                Ok(bytes) => self.bytes.extend(bytes),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn plugin(self, name: &str) -> Self {
        self.push(encode_field(FieldCode::Plugin, name))
    }

    pub fn plugin_instance(self, name: &str) -> Self {
        self.push(encode_field(FieldCode::PluginInstance, name))
    }

    pub fn type_name(self, name: &str) -> Self {
        self.push(encode_field(FieldCode::Type, name))
    }

    pub fn type_instance(self, name: &str) -> Self {
        self.push(encode_field(FieldCode::TypeInstance, name))
    }

    pub fn values(self, values: &[Value]) -> Self {
        self.push(encode_values(values))
    }

    pub fn build(self) -> Result<MetricGroup, EncodeError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(MetricGroup { bytes: self.bytes }),
        }
    }
}
