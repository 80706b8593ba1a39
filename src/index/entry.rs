//! # Index Entries and Row Identifiers
//!
//! An `Entry` is the encoded column bytes of one row plus its `RowId`. Node
//! entries additionally carry the child page they point to.
//!
//! ## Ordering
//!
//! Entries compare by column bytes as unsigned byte strings, then by row id.
//! Two cases need more than a plain `memcmp`:
//!
//! - **Partial entries** stop encoding at the first sentinel column, so
//!   their bytes are a prefix of the real entries they bound. When one
//!   entry's bytes are a strict prefix of the other's, the shorter entry's
//!   row id kind decides: `Last` sorts after everything it prefixes,
//!   anything else before.
//! - **Sentinels** `Entry::MIN` / `Entry::MAX` have empty bytes, so they are
//!   a prefix of every real entry and sort before/after all of them.
//!
//! ```text
//! MIN < [A=1,B=MIN] < (A=1,B=1,r1) < (A=1,B=1,r2) < (A=1,B=2) < [A=1,B=MAX] < MAX
//! ```
//!
//! Real row ids always have kind `Normal`, so equal column bytes order by
//! (page, row).

use std::cmp::Ordering;
use std::fmt;

use crate::config::{CHILD_PAGE_SIZE, MAX_ROW_ID_PAGE, ROW_ID_SIZE};
use crate::types::OwnedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowIdKind {
    First,
    Normal,
    Last,
}

/// Location of a table row: data page number and row slot on that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId {
    kind: RowIdKind,
    page_number: u32,
    row_number: u8,
}

impl RowId {
    pub const FIRST: RowId = RowId {
        kind: RowIdKind::First,
        page_number: 0,
        row_number: 0,
    };

    pub const LAST: RowId = RowId {
        kind: RowIdKind::Last,
        page_number: u32::MAX,
        row_number: u8::MAX,
    };

    pub fn new(page_number: u32, row_number: u8) -> Self {
        Self {
            kind: RowIdKind::Normal,
            page_number,
            row_number,
        }
    }

    pub fn kind(&self) -> RowIdKind {
        self.kind
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn row_number(&self) -> u8 {
        self.row_number
    }

    pub fn is_valid(&self) -> bool {
        self.kind == RowIdKind::Normal
    }

    /// Whether the page number fits the 3-byte field of a stored entry.
    pub fn fits_entry(&self) -> bool {
        self.page_number <= MAX_ROW_ID_PAGE
    }

    /// Row id as stored in an entry: 3-byte big-endian page, 1-byte row.
    pub fn to_bytes(&self) -> [u8; ROW_ID_SIZE] {
        let page = self.page_number.to_be_bytes();
        [page[1], page[2], page[3], self.row_number]
    }

    pub fn from_bytes(bytes: [u8; ROW_ID_SIZE]) -> Self {
        Self::new(
            u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]),
            bytes[3],
        )
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RowIdKind::First => write!(f, "RowId(FIRST)"),
            RowIdKind::Last => write!(f, "RowId(LAST)"),
            RowIdKind::Normal => write!(f, "RowId({}:{})", self.page_number, self.row_number),
        }
    }
}

/// Which end of the key space a sentinel stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Min,
    Max,
}

/// One slot of a row-shaped key: a real column value or a sentinel that
/// ends the key.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Value(OwnedValue),
    Sentinel(Sentinel),
}

impl From<OwnedValue> for IndexValue {
    fn from(v: OwnedValue) -> Self {
        IndexValue::Value(v)
    }
}

impl From<Sentinel> for IndexValue {
    fn from(s: Sentinel) -> Self {
        IndexValue::Sentinel(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    bytes: Vec<u8>,
    row_id: RowId,
    child_page: Option<u32>,
}

impl Entry {
    pub const MIN: Entry = Entry {
        bytes: Vec::new(),
        row_id: RowId::FIRST,
        child_page: None,
    };

    pub const MAX: Entry = Entry {
        bytes: Vec::new(),
        row_id: RowId::LAST,
        child_page: None,
    };

    pub fn new(bytes: Vec<u8>, row_id: RowId) -> Self {
        Self {
            bytes,
            row_id,
            child_page: None,
        }
    }

    /// Node entry pointing at `child_page`, keyed by that child's last entry.
    pub fn node(max_of_child: &Entry, child_page: u32) -> Self {
        Self {
            bytes: max_of_child.bytes.clone(),
            row_id: max_of_child.row_id,
            child_page: Some(child_page),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    pub fn child_page(&self) -> Option<u32> {
        self.child_page
    }

    /// A real entry, as opposed to a sentinel or partial search key.
    pub fn is_valid(&self) -> bool {
        self.row_id.is_valid()
    }

    pub fn is_min(&self) -> bool {
        self.bytes.is_empty() && self.row_id.kind() == RowIdKind::First
    }

    pub fn is_max(&self) -> bool {
        self.bytes.is_empty() && self.row_id.kind() == RowIdKind::Last
    }

    /// Same position, ignoring any child pointer.
    pub fn same_key(&self, other: &Entry) -> bool {
        self.row_id == other.row_id && self.bytes == other.bytes
    }

    /// Bytes this entry occupies on a page before prefix compression.
    pub fn serialized_len(&self) -> usize {
        self.bytes.len()
            + ROW_ID_SIZE
            + if self.child_page.is_some() {
                CHILD_PAGE_SIZE
            } else {
                0
            }
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bytes);
        out.extend_from_slice(&self.row_id.to_bytes());
        if let Some(child) = self.child_page {
            out.extend_from_slice(&child.to_be_bytes());
        }
    }

    /// Rebuilds an entry from its full serialized bytes.
    pub fn deserialize(data: &[u8], is_node: bool) -> Option<Self> {
        let tail = ROW_ID_SIZE + if is_node { CHILD_PAGE_SIZE } else { 0 };
        if data.len() < tail + 1 {
            return None;
        }
        let split = data.len() - tail;
        let row_id = RowId::from_bytes(data[split..split + ROW_ID_SIZE].try_into().ok()?);
        let child_page = if is_node {
            Some(u32::from_be_bytes(
                data[split + ROW_ID_SIZE..].try_into().ok()?,
            ))
        } else {
            None
        };
        Some(Self {
            bytes: data[..split].to_vec(),
            row_id,
            child_page,
        })
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        let common = self.bytes.len().min(other.bytes.len());
        match self.bytes[..common].cmp(&other.bytes[..common]) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.bytes.len().cmp(&other.bytes.len()) {
            Ordering::Equal => self.row_id.cmp(&other.row_id),
            Ordering::Less => {
                if self.row_id.kind() == RowIdKind::Last {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            Ordering::Greater => {
                if other.row_id.kind() == RowIdKind::Last {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
        }
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_min() {
            return write!(f, "Entry(MIN)");
        }
        if self.is_max() {
            return write!(f, "Entry(MAX)");
        }
        write!(f, "Entry(")?;
        for b in &self.bytes {
            write!(f, "{:02X}", b)?;
        }
        write!(f, ", {}", self.row_id)?;
        if let Some(child) = self.child_page {
            write!(f, ", child={}", child)?;
        }
        write!(f, ")")
    }
}

/// A cursor position: an entry and whether the cursor sits on it or just
/// before it (after a seek or after the entry was deleted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    entry: Entry,
    between: bool,
}

impl Position {
    pub fn on(entry: Entry) -> Self {
        Self {
            entry,
            between: false,
        }
    }

    pub fn before(entry: Entry) -> Self {
        Self {
            entry,
            between: true,
        }
    }

    pub fn first() -> Self {
        Self::on(Entry::MIN)
    }

    pub fn last() -> Self {
        Self::on(Entry::MAX)
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn is_between(&self) -> bool {
        self.between
    }

    /// True when the cursor sits on a real entry that can be dereferenced.
    pub fn is_on_row(&self) -> bool {
        !self.between && self.entry.is_valid()
    }

    pub fn equals_entry(&self, entry: &Entry) -> bool {
        self.entry.same_key(entry)
    }
}
