//! MTU-bounded packing of metric groups into datagrams.
//!
//! A batch always starts with a copy of the plugin header. Groups are
//! appended whole; when the next group would push the buffer past the
//! ceiling, the buffer is sent first and a new one is seeded with the
//! header. A group that alone exceeds the ceiling is still sent, unsplit.

use tracing::trace;

use super::message::{Header, MetricGroup};
use crate::transport::Transport;

/// Largest datagram the assembler builds, leaving room for IP/UDP headers
/// under a typical 1500-byte path MTU.
pub const MAX_DATAGRAM_SIZE: usize = 1400;

/// Outcome of [`BatchAssembler::try_append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// The group fit into the current buffer.
    Appended,
    /// The previous buffer was sent before the group was added to a fresh one.
    Flushed,
}

/// Counters for one assembler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub datagrams: usize,
    pub groups: usize,
    pub bytes: usize,
}

/// Accumulates groups of one plugin and hands full buffers to a transport.
pub struct BatchAssembler<'a> {
    header: Header,
    transport: &'a dyn Transport,
    buffer: Vec<u8>,
    ceiling: usize,
    stats: BatchStats,
}

impl<'a> BatchAssembler<'a> {
    /// Starts a batch seeded with `header`.
    pub fn new(header: Header, transport: &'a dyn Transport) -> Self {
        let mut buffer = Vec::with_capacity(MAX_DATAGRAM_SIZE);
        buffer.extend_from_slice(header.as_bytes());
        Self {
            header,
            transport,
            buffer,
            ceiling: MAX_DATAGRAM_SIZE,
            stats: BatchStats::default(),
        }
    }

    /// Overrides the size ceiling.
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Size of the unsent buffer, header included.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `group`, sending the current buffer first if the group
    /// would not fit under the ceiling.
    pub fn try_append(&mut self, group: &MetricGroup) -> Append {
        let outcome = if self.buffer.len() + group.len() <= self.ceiling {
            Append::Appended
        } else {
            self.flush();
            Append::Flushed
        };
        self.buffer.extend_from_slice(group.as_bytes());
        self.stats.groups += 1;
        outcome
    }

    /// Sends the buffer, even when it holds only the header, and reseeds it.
    ///
    /// Returns the number of bytes handed to the transport.
    pub fn flush(&mut self) -> usize {
        let sent = self.buffer.len();
        trace!(
            plugin = self.header.plugin(),
            bytes = sent,
            "sending datagram"
        );
        self.transport.send(&self.buffer);
        self.stats.datagrams += 1;
        self.stats.bytes += sent;

        self.buffer.clear();
        self.buffer.extend_from_slice(self.header.as_bytes());
        sent
    }

    /// Performs the end-of-sweep flush and returns the counters.
    pub fn finish(mut self) -> BatchStats {
        self.flush();
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Value, build_header};
    use crate::transport::RecordingTransport;

    fn header() -> Header {
        build_header("interface", "testhost", 1_700_000_000, 60).unwrap()
    }

    fn group(name: &str, values: usize) -> MetricGroup {
        MetricGroup::builder()
            .plugin_instance(name)
            .type_name("if_octets")
            .values(&vec![Value::Counter(1); values])
            .build()
            .unwrap()
    }

    #[test]
    fn test_appends_until_ceiling() {
        let transport = RecordingTransport::new();
        let header = header();
        let header_len = header.len();
        let g = group("eth0", 2);
        let ceiling = header_len + 2 * g.len();

        let mut batch = BatchAssembler::new(header, &transport).with_ceiling(ceiling);
        assert_eq!(batch.try_append(&g), Append::Appended);
        assert_eq!(batch.try_append(&g), Append::Appended);
        assert_eq!(batch.pending_len(), ceiling);
        assert!(transport.datagrams().is_empty());

        assert_eq!(batch.try_append(&g), Append::Flushed);
        assert_eq!(transport.datagrams().len(), 1);
        assert_eq!(transport.datagrams()[0].len(), ceiling);
        assert_eq!(batch.pending_len(), header_len + g.len());
    }

    #[test]
    fn test_every_datagram_starts_with_header() {
        let transport = RecordingTransport::new();
        let header = header();
        let header_bytes = header.as_bytes().to_vec();

        let mut batch = BatchAssembler::new(header, &transport);
        for i in 0..100 {
            batch.try_append(&group(&format!("veth{}", i), 2));
        }
        let stats = batch.finish();

        let datagrams = transport.datagrams();
        assert!(datagrams.len() > 1);
        assert_eq!(stats.datagrams, datagrams.len());
        for datagram in &datagrams {
            assert!(datagram.starts_with(&header_bytes));
            assert!(datagram.len() <= MAX_DATAGRAM_SIZE);
        }
    }

    #[test]
    fn test_total_bytes_accounting() {
        let transport = RecordingTransport::new();
        let header = header();
        let header_len = header.len();

        let groups: Vec<MetricGroup> = (0..40)
            .map(|i| group(&format!("if{}", i), 1 + i % 7))
            .collect();
        let group_bytes: usize = groups.iter().map(|g| g.len()).sum();

        let mut batch = BatchAssembler::new(header, &transport);
        for g in &groups {
            batch.try_append(g);
        }
        let stats = batch.finish();

        let datagrams = transport.datagrams();
        let sent: usize = datagrams.iter().map(|d| d.len()).sum();
        assert_eq!(sent, header_len * datagrams.len() + group_bytes);
        assert_eq!(stats.bytes, sent);
        assert_eq!(stats.groups, groups.len());
        assert!(datagrams.iter().all(|d| d.len() <= MAX_DATAGRAM_SIZE));
    }

    #[test]
    fn test_oversize_group_is_sent_whole() {
        let transport = RecordingTransport::new();
        let header = header();
        let header_len = header.len();
        let big = group("big", 200); // 6 + 200 * 9 alone exceeds the ceiling
        let small = group("eth0", 2);

        let mut batch = BatchAssembler::new(header, &transport);
        batch.try_append(&small);
        assert_eq!(batch.try_append(&big), Append::Flushed);
        assert_eq!(batch.try_append(&small), Append::Flushed);
        batch.finish();

        let datagrams = transport.datagrams();
        assert_eq!(datagrams.len(), 3);
        assert_eq!(datagrams[0].len(), header_len + small.len());
        assert_eq!(datagrams[1].len(), header_len + big.len());
        assert!(datagrams[1].len() > MAX_DATAGRAM_SIZE);
        assert!(datagrams[1].ends_with(big.as_bytes()));
    }

    #[test]
    fn test_header_only_flush_is_sent() {
        let transport = RecordingTransport::new();
        let header = header();
        let header_bytes = header.as_bytes().to_vec();

        let stats = BatchAssembler::new(header, &transport).finish();

        assert_eq!(stats.datagrams, 1);
        assert_eq!(stats.groups, 0);
        assert_eq!(transport.datagrams(), vec![header_bytes]);
    }
}
