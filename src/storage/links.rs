//! Compiled link table.
//!
//! All runtime links live in one flat `Vec<LinkRecord>`. Each node that has
//! links owns a contiguous block of headers, one per connected port, written
//! in strictly ascending port order. A header is immediately followed by its
//! `count` entries, each naming the far end of one connection and the kind of
//! port it lands on:
//!
//! ```text
//! [hdr A:0 n=2][A:0→B:0][A:0→C:0][hdr A:3 n=1][A:3→D:1][hdr B:0 n=1][B:0←A:0] ...
//! └──────────── node A block ─────────────────────────┘└──── node B block ─...
//! ```
//!
//! A lookup is one map probe for the node's block and a short forward scan
//! that stops as soon as it passes the requested port. Writing headers out of
//! order would make that scan miss links, so the builder rejects it.

use crate::graph::{PortIndex, PortKind};
use crate::storage::address::PackedAddress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use thiserror::Error;

/// One record of the flat table; a header when it starts a block, an entry otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub address: PackedAddress,
    pub port: PortIndex,
    /// Kind of the owning port for a header, of the far-end port for an entry.
    pub kind: PortKind,
    /// Number of entries following a header. Always 0 for entries.
    pub count: u32,
}

impl LinkRecord {
    const UNWRITTEN: LinkRecord = LinkRecord {
        address: PackedAddress::EMPTY,
        port: PortIndex(0),
        kind: PortKind::Enter,
        count: 0,
    };
}

/// The far end of a link: which node, which of its ports, and that port's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEntry {
    pub address: PackedAddress,
    pub port: PortIndex,
    pub kind: PortKind,
}

/// Index range of the entries linked to one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRange {
    pub first: usize,
    pub count: usize,
}

impl LinkRange {
    pub const EMPTY: LinkRange = LinkRange { first: 0, count: 0 };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn indices(&self) -> Range<usize> {
        self.first..self.first + self.count
    }
}

/// Violations of the builder protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkTableError {
    #[error("header for {address} port {port} written after port {last}")]
    OutOfOrder {
        address: PackedAddress,
        port: PortIndex,
        last: PortIndex,
    },

    #[error("headers for {0} are not contiguous")]
    NonContiguous(PackedAddress),

    #[error("header for {address} port {port} has no links")]
    EmptyHeader {
        address: PackedAddress,
        port: PortIndex,
    },

    #[error("invalid address {0:?}")]
    InvalidAddress(PackedAddress),

    #[error("capacity of {capacity} records exceeded")]
    CapacityExceeded { capacity: usize },

    #[error("record {0} is not a reserved, unwritten link entry")]
    InvalidEntry(usize),

    #[error("{0} reserved link entries were never written")]
    Incomplete(usize),
}

/// Header block of one node: `records[start..end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeSpan {
    start: usize,
    end: usize,
}

/// Flat, immutable link storage produced by the compiler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "LinkTableImage", into = "LinkTableImage")]
pub struct LinkTable {
    nodes: Vec<PackedAddress>,
    records: Vec<LinkRecord>,
    spans: HashMap<PackedAddress, NodeSpan>,
}

impl LinkTable {
    /// Entries linked to `(address, port)`; empty when there are none.
    pub fn get_links(&self, address: PackedAddress, port: PortIndex) -> LinkRange {
        let Some(span) = self.spans.get(&address) else {
            return LinkRange::EMPTY;
        };

        let mut index = span.start;
        while index < span.end {
            let header = &self.records[index];
            if header.port == port {
                return LinkRange {
                    first: index + 1,
                    count: header.count as usize,
                };
            }
            if header.port > port {
                break;
            }
            index += header.count as usize + 1;
        }
        LinkRange::EMPTY
    }

    /// Direct read of one entry.
    #[inline]
    pub fn get_link(&self, index: usize) -> Option<LinkEntry> {
        self.records.get(index).map(|r| LinkEntry {
            address: r.address,
            port: r.port,
            kind: r.kind,
        })
    }

    /// Iterate the entries linked to `(address, port)`.
    pub fn links(&self, address: PackedAddress, port: PortIndex) -> impl Iterator<Item = LinkEntry> + '_ {
        self.get_links(address, port)
            .indices()
            .filter_map(move |i| self.get_link(i))
    }

    /// Node addresses in compiled order.
    pub fn nodes(&self) -> &[PackedAddress] {
        &self.nodes
    }

    pub fn records(&self) -> &[LinkRecord] {
        &self.records
    }

    /// Number of link entries, headers excluded.
    pub fn link_count(&self) -> usize {
        self.records.len() - self.header_count()
    }

    pub fn header_count(&self) -> usize {
        let mut headers = 0;
        let mut index = 0;
        while index < self.records.len() {
            headers += 1;
            index += self.records[index].count as usize + 1;
        }
        headers
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Persisted form: just the two flat arrays. The span index is rebuilt (and the
/// ordering re-validated) on load.
#[derive(Serialize, Deserialize)]
struct LinkTableImage {
    nodes: Vec<PackedAddress>,
    records: Vec<LinkRecord>,
}

impl From<LinkTable> for LinkTableImage {
    fn from(table: LinkTable) -> Self {
        Self {
            nodes: table.nodes,
            records: table.records,
        }
    }
}

impl TryFrom<LinkTableImage> for LinkTable {
    type Error = LinkTableError;

    fn try_from(image: LinkTableImage) -> Result<Self, Self::Error> {
        let mut builder = LinkTableBuilder::with_capacity(image.nodes.len(), image.records.len());
        for address in image.nodes {
            builder.push_node(address)?;
        }

        let records = &image.records;
        let mut index = 0;
        while index < records.len() {
            let header = records[index];
            let first = builder.reserve(header.address, header.port, header.kind, header.count)?;
            for k in 0..header.count as usize {
                let entry = records
                    .get(index + 1 + k)
                    .ok_or(LinkTableError::Incomplete(header.count as usize - k))?;
                builder.write(
                    first + k,
                    LinkEntry {
                        address: entry.address,
                        port: entry.port,
                        kind: entry.kind,
                    },
                )?;
            }
            index += header.count as usize + 1;
        }
        builder.finish()
    }
}

/// Append-only writer for a `LinkTable`.
///
/// The backing arrays are sized up front; `reserve` lays down a header and
/// returns the index of its first entry, and `write` fills each entry.
pub struct LinkTableBuilder {
    nodes: Vec<PackedAddress>,
    node_capacity: usize,
    records: Vec<LinkRecord>,
    cursor: usize,
    spans: HashMap<PackedAddress, NodeSpan>,
    last: Option<(PackedAddress, PortIndex)>,
    unwritten: usize,
}

impl LinkTableBuilder {
    pub fn with_capacity(node_count: usize, record_count: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(node_count),
            node_capacity: node_count,
            records: vec![LinkRecord::UNWRITTEN; record_count],
            cursor: 0,
            spans: HashMap::new(),
            last: None,
            unwritten: 0,
        }
    }

    /// Append a node to the compiled order.
    pub fn push_node(&mut self, address: PackedAddress) -> Result<(), LinkTableError> {
        if !address.is_valid() {
            return Err(LinkTableError::InvalidAddress(address));
        }
        if self.nodes.len() == self.node_capacity {
            return Err(LinkTableError::CapacityExceeded {
                capacity: self.node_capacity,
            });
        }
        self.nodes.push(address);
        Ok(())
    }

    /// Write a header for `(address, port)` with `count` links.
    ///
    /// Headers for one node must be contiguous and strictly ascending by port.
    /// Returns the index of the first entry.
    pub fn reserve(
        &mut self,
        address: PackedAddress,
        port: PortIndex,
        kind: PortKind,
        count: u32,
    ) -> Result<usize, LinkTableError> {
        if !address.is_valid() {
            return Err(LinkTableError::InvalidAddress(address));
        }
        if count == 0 {
            return Err(LinkTableError::EmptyHeader { address, port });
        }
        match self.last {
            Some((last_address, last_port)) if last_address == address => {
                if port <= last_port {
                    return Err(LinkTableError::OutOfOrder {
                        address,
                        port,
                        last: last_port,
                    });
                }
            }
            _ => {
                if self.spans.contains_key(&address) {
                    return Err(LinkTableError::NonContiguous(address));
                }
            }
        }

        let needed = count as usize + 1;
        if self.cursor + needed > self.records.len() {
            return Err(LinkTableError::CapacityExceeded {
                capacity: self.records.len(),
            });
        }

        let header_index = self.cursor;
        self.records[header_index] = LinkRecord {
            address,
            port,
            kind,
            count,
        };
        self.cursor += needed;
        self.unwritten += count as usize;
        self.last = Some((address, port));
        self.spans
            .entry(address)
            .and_modify(|span| span.end = self.cursor)
            .or_insert(NodeSpan {
                start: header_index,
                end: self.cursor,
            });

        Ok(header_index + 1)
    }

    /// Fill the reserved entry at `index`.
    pub fn write(&mut self, index: usize, entry: LinkEntry) -> Result<(), LinkTableError> {
        if !entry.address.is_valid() {
            return Err(LinkTableError::InvalidAddress(entry.address));
        }
        if index >= self.cursor || self.records[index] != LinkRecord::UNWRITTEN {
            return Err(LinkTableError::InvalidEntry(index));
        }
        self.records[index] = LinkRecord {
            address: entry.address,
            port: entry.port,
            kind: entry.kind,
            count: 0,
        };
        self.unwritten -= 1;
        Ok(())
    }

    /// Seal the table. Fails if any reserved entry was left unwritten.
    pub fn finish(mut self) -> Result<LinkTable, LinkTableError> {
        if self.unwritten > 0 {
            return Err(LinkTableError::Incomplete(self.unwritten));
        }
        if self.cursor < self.records.len() {
            tracing::debug!(
                "Link table over-reserved: {} of {} records used",
                self.cursor,
                self.records.len()
            );
            self.records.truncate(self.cursor);
        }
        Ok(LinkTable {
            nodes: self.nodes,
            records: self.records,
            spans: self.spans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::address::{PoolId, SlotId};

    fn addr(pool: u32, slot: u32) -> PackedAddress {
        PackedAddress::pack(PoolId(pool), SlotId(slot))
    }

    fn enter(address: PackedAddress, port: u32) -> LinkEntry {
        LinkEntry {
            address,
            port: PortIndex(port),
            kind: PortKind::Enter,
        }
    }

    /// A: port 0 → B:0, C:0 ; port 3 → D:1. B: port 1 → E:0.
    fn sample_table() -> LinkTable {
        let (a, b, c, d, e) = (addr(1, 1), addr(1, 2), addr(2, 1), addr(2, 2), addr(3, 1));
        let mut builder = LinkTableBuilder::with_capacity(5, 8);
        for n in [a, b, c, d, e] {
            builder.push_node(n).unwrap();
        }

        let first = builder.reserve(a, PortIndex(0), PortKind::Exit, 2).unwrap();
        builder.write(first, enter(b, 0)).unwrap();
        builder.write(first + 1, enter(c, 0)).unwrap();
        let first = builder.reserve(a, PortIndex(3), PortKind::Exit, 1).unwrap();
        builder.write(first, enter(d, 1)).unwrap();
        let first = builder.reserve(b, PortIndex(1), PortKind::Exit, 1).unwrap();
        builder.write(first, enter(e, 0)).unwrap();

        builder.finish().unwrap()
    }

    #[test]
    fn test_get_links_finds_ranges() {
        let table = sample_table();
        let range = table.get_links(addr(1, 1), PortIndex(0));
        assert_eq!(range, LinkRange { first: 1, count: 2 });

        let targets: Vec<_> = table.links(addr(1, 1), PortIndex(3)).collect();
        assert_eq!(targets, vec![enter(addr(2, 2), 1)]);
        assert_eq!(table.link_count(), 4);
        assert_eq!(table.header_count(), 3);
    }

    #[test]
    fn test_get_links_misses() {
        let table = sample_table();
        // Between populated ports: found by overshoot.
        assert!(table.get_links(addr(1, 1), PortIndex(1)).is_empty());
        // Past the last populated port of the node.
        assert!(table.get_links(addr(1, 1), PortIndex(9)).is_empty());
        // Node with no links at all.
        assert!(table.get_links(addr(2, 1), PortIndex(0)).is_empty());
        // Does not scan into the next node's block.
        assert!(table.get_links(addr(1, 1), PortIndex(4)).is_empty());
        assert!(table.get_link(100).is_none());
    }

    #[test]
    fn test_reserve_rejects_descending_ports() {
        let a = addr(1, 1);
        let mut builder = LinkTableBuilder::with_capacity(1, 8);
        let first = builder.reserve(a, PortIndex(3), PortKind::Exit, 1).unwrap();
        builder.write(first, enter(addr(1, 2), 0)).unwrap();

        assert_eq!(
            builder.reserve(a, PortIndex(1), PortKind::Exit, 1),
            Err(LinkTableError::OutOfOrder {
                address: a,
                port: PortIndex(1),
                last: PortIndex(3)
            })
        );
        assert!(matches!(
            builder.reserve(a, PortIndex(3), PortKind::Exit, 1),
            Err(LinkTableError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_reserve_rejects_non_contiguous_blocks() {
        let (a, b) = (addr(1, 1), addr(1, 2));
        let mut builder = LinkTableBuilder::with_capacity(2, 8);
        let first = builder.reserve(a, PortIndex(0), PortKind::Exit, 1).unwrap();
        builder.write(first, enter(b, 0)).unwrap();
        let first = builder.reserve(b, PortIndex(0), PortKind::Exit, 1).unwrap();
        builder.write(first, enter(a, 0)).unwrap();

        assert_eq!(
            builder.reserve(a, PortIndex(5), PortKind::Exit, 1),
            Err(LinkTableError::NonContiguous(a))
        );
    }

    #[test]
    fn test_builder_protocol_errors() {
        let a = addr(1, 1);
        let mut builder = LinkTableBuilder::with_capacity(0, 2);
        assert!(matches!(
            builder.reserve(a, PortIndex(0), PortKind::Exit, 0),
            Err(LinkTableError::EmptyHeader { .. })
        ));
        assert!(matches!(
            builder.reserve(a, PortIndex(0), PortKind::Exit, 2),
            Err(LinkTableError::CapacityExceeded { capacity: 2 })
        ));
        assert!(matches!(
            builder.push_node(a),
            Err(LinkTableError::CapacityExceeded { capacity: 0 })
        ));

        let first = builder.reserve(a, PortIndex(0), PortKind::Exit, 1).unwrap();
        // Writing the header slot is not allowed.
        assert_eq!(
            builder.write(first - 1, enter(a, 0)),
            Err(LinkTableError::InvalidEntry(0))
        );
        assert_eq!(
            builder.write(first, enter(PackedAddress::EMPTY, 0)),
            Err(LinkTableError::InvalidAddress(PackedAddress::EMPTY))
        );
    }

    #[test]
    fn test_finish_requires_all_entries() {
        let mut builder = LinkTableBuilder::with_capacity(0, 3);
        builder.reserve(addr(1, 1), PortIndex(0), PortKind::Exit, 2).unwrap();
        assert_eq!(builder.finish().unwrap_err(), LinkTableError::Incomplete(2));
    }

    #[test]
    fn test_json_round_trip_rebuilds_index() {
        let table = sample_table();
        let json = table.to_json().unwrap();
        let loaded = LinkTable::from_json(&json).unwrap();

        assert_eq!(loaded.nodes(), table.nodes());
        assert_eq!(loaded.records(), table.records());
        assert_eq!(
            loaded.get_links(addr(1, 2), PortIndex(1)),
            table.get_links(addr(1, 2), PortIndex(1))
        );
    }

    #[test]
    fn test_corrupt_image_is_rejected() {
        let json = r#"{
            "nodes": [4294967297],
            "records": [
                { "address": 4294967297, "port": 2, "kind": "Exit", "count": 1 },
                { "address": 4294967298, "port": 0, "kind": "Enter", "count": 0 },
                { "address": 4294967297, "port": 1, "kind": "Exit", "count": 1 },
                { "address": 4294967298, "port": 0, "kind": "Enter", "count": 0 }
            ]
        }"#;
        assert!(LinkTable::from_json(json).is_err());
    }
}
