//! # Decoded Index Pages
//!
//! `IndexPage` is the in-memory form of one index node or leaf page: its
//! sibling links and its sorted entries with prefix compression undone.
//! Pages are decoded once when the index is initialized and re-encoded in
//! full whenever they change.
//!
//! ## Entry Area
//!
//! ```text
//! 480                                                     480 + capacity
//!  │ entry 0 (full) │ e1 minus prefix │ e2 minus prefix │ ... │ free │
//!                   ^                 ^                 ^
//!              mask bit 1        mask bit 2        mask bit 3
//! ```
//!
//! The prefix shared by every entry on the page is stored once, inside the
//! first entry; `prefix_len` in the header says how long it is. A mask bit
//! marks the offset just past the end of each entry, so entry boundaries can
//! be recovered without knowing the column types.

use eyre::{ensure, Result};

use super::entry::Entry;
use crate::config::{INDEX_ENTRIES_OFFSET, INDEX_ENTRY_MASK_OFFSET, INDEX_ENTRY_MASK_SIZE};
use crate::error::IndexError;
use crate::storage::{IndexPageHeader, PageType};

#[derive(Debug, Clone, PartialEq)]
pub struct IndexPage {
    page_number: u32,
    page_type: PageType,
    owner_page: u32,
    prev_page: u32,
    next_page: u32,
    child_tail_page: u32,
    entries: Vec<Entry>,
}

impl IndexPage {
    pub fn new_leaf(page_number: u32, owner_page: u32) -> Self {
        Self::new(page_number, PageType::IndexLeaf, owner_page)
    }

    pub fn new_node(page_number: u32, owner_page: u32) -> Self {
        Self::new(page_number, PageType::IndexNode, owner_page)
    }

    fn new(page_number: u32, page_type: PageType, owner_page: u32) -> Self {
        Self {
            page_number,
            page_type,
            owner_page,
            prev_page: 0,
            next_page: 0,
            child_tail_page: 0,
            entries: Vec::new(),
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn is_leaf(&self) -> bool {
        self.page_type == PageType::IndexLeaf
    }

    pub fn set_leaf(&mut self, leaf: bool) {
        self.page_type = if leaf {
            PageType::IndexLeaf
        } else {
            PageType::IndexNode
        };
    }

    pub fn prev_page(&self) -> u32 {
        self.prev_page
    }

    pub fn set_prev_page(&mut self, page: u32) {
        self.prev_page = page;
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn set_next_page(&mut self, page: u32) {
        self.next_page = page;
    }

    pub fn child_tail_page(&self) -> u32 {
        self.child_tail_page
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn last_entry(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Index of the first entry not less than `target`.
    pub fn lower_bound(&self, target: &Entry) -> usize {
        self.entries.partition_point(|e| e < target)
    }

    /// Index of the first entry greater than `target`.
    pub fn upper_bound(&self, target: &Entry) -> usize {
        self.entries.partition_point(|e| e <= target)
    }

    pub fn insert(&mut self, idx: usize, entry: Entry) {
        self.entries.insert(idx, entry);
        self.refresh_tail();
    }

    pub fn remove(&mut self, idx: usize) -> Entry {
        let entry = self.entries.remove(idx);
        self.refresh_tail();
        entry
    }

    pub fn replace(&mut self, idx: usize, entry: Entry) {
        self.entries[idx] = entry;
        self.refresh_tail();
    }

    pub fn set_entries(&mut self, entries: Vec<Entry>) {
        self.entries = entries;
        self.refresh_tail();
    }

    pub fn take_entries(&mut self) -> Vec<Entry> {
        let entries = std::mem::take(&mut self.entries);
        self.refresh_tail();
        entries
    }

    fn refresh_tail(&mut self) {
        self.child_tail_page = if self.is_leaf() {
            0
        } else {
            self.entries
                .last()
                .and_then(Entry::child_page)
                .unwrap_or(0)
        };
    }

    pub fn encoded_size(&self) -> usize {
        encoded_size(&self.entries)
    }

    pub fn decode(page_number: u32, data: &[u8], capacity: usize) -> Result<Self> {
        ensure!(
            data.len() >= INDEX_ENTRIES_OFFSET + capacity,
            "page buffer of {} bytes cannot hold {} bytes of entries",
            data.len(),
            capacity
        );

        let header = IndexPageHeader::from_bytes(data)?;
        let page_type = header.page_type();
        if !page_type.is_index() {
            return Err(format_error(
                page_number,
                format!("expected an index page, found type {:?}", page_type),
            ));
        }
        if header.marker() != crate::config::INDEX_PAGE_MARKER {
            return Err(format_error(
                page_number,
                format!("bad index page marker 0x{:02X}", header.marker()),
            ));
        }

        let is_node = page_type == PageType::IndexNode;
        let prefix_len = header.prefix_len() as usize;
        let mask = &data[INDEX_ENTRY_MASK_OFFSET..INDEX_ENTRY_MASK_OFFSET + INDEX_ENTRY_MASK_SIZE];
        let area = &data[INDEX_ENTRIES_OFFSET..INDEX_ENTRIES_OFFSET + capacity];

        let mut entries = Vec::new();
        let mut prefix: &[u8] = &[];
        let mut start = 0usize;
        let mut full = Vec::new();

        for (byte_idx, &mask_byte) in mask.iter().enumerate() {
            if mask_byte == 0 {
                continue;
            }
            for bit in 0..8 {
                if mask_byte & (1 << bit) == 0 {
                    continue;
                }
                let end = byte_idx * 8 + bit;
                if end <= start || end > capacity {
                    return Err(format_error(
                        page_number,
                        format!("entry mask bit {} outside entry area", end),
                    ));
                }

                full.clear();
                if entries.is_empty() {
                    let first = &area[start..end];
                    if prefix_len > first.len() {
                        return Err(format_error(
                            page_number,
                            format!(
                                "prefix length {} exceeds first entry length {}",
                                prefix_len,
                                first.len()
                            ),
                        ));
                    }
                    prefix = &first[..prefix_len];
                    full.extend_from_slice(first);
                } else {
                    full.extend_from_slice(prefix);
                    full.extend_from_slice(&area[start..end]);
                }

                let entry = Entry::deserialize(&full, is_node).ok_or_else(|| {
                    format_error(page_number, format!("truncated entry at offset {}", start))
                })?;
                entries.push(entry);
                start = end;
            }
        }

        let mut page = Self {
            page_number,
            page_type,
            owner_page: header.owner_page(),
            prev_page: header.prev_page(),
            next_page: header.next_page(),
            child_tail_page: header.child_tail_page(),
            entries,
        };
        if page.child_tail_page == 0 {
            page.refresh_tail();
        }
        Ok(page)
    }

    pub fn encode(&self, data: &mut [u8], capacity: usize) -> Result<()> {
        ensure!(
            data.len() >= INDEX_ENTRIES_OFFSET + capacity,
            "page buffer of {} bytes cannot hold {} bytes of entries",
            data.len(),
            capacity
        );

        let serialized: Vec<Vec<u8>> = self
            .entries
            .iter()
            .map(|e| {
                let mut buf = Vec::with_capacity(e.serialized_len());
                e.serialize_into(&mut buf);
                buf
            })
            .collect();
        let prefix_len = common_prefix_len(serialized.iter().map(Vec::as_slice));
        let used = used_bytes(serialized.iter().map(Vec::len), prefix_len);
        ensure!(
            used <= capacity,
            "index page {} overflows: {} bytes of entries, capacity {}",
            self.page_number,
            used,
            capacity
        );

        data.fill(0);

        let mut header = IndexPageHeader::new(self.page_type);
        header.set_free_space((capacity - used) as u16);
        header.set_owner_page(self.owner_page);
        header.set_prev_page(self.prev_page);
        header.set_next_page(self.next_page);
        header.set_child_tail_page(self.child_tail_page);
        header.set_prefix_len(prefix_len as u16);
        header.write_to(data)?;

        let mut offset = 0usize;
        for (i, bytes) in serialized.iter().enumerate() {
            let part = if i == 0 { &bytes[..] } else { &bytes[prefix_len..] };
            let dst = INDEX_ENTRIES_OFFSET + offset;
            data[dst..dst + part.len()].copy_from_slice(part);
            offset += part.len();
            data[INDEX_ENTRY_MASK_OFFSET + offset / 8] |= 1 << (offset % 8);
        }

        Ok(())
    }
}

/// Bytes `entries` occupy on a page after prefix compression.
pub fn encoded_size(entries: &[Entry]) -> usize {
    let mut serialized = Vec::with_capacity(entries.len());
    for e in entries {
        let mut buf = Vec::with_capacity(e.serialized_len());
        e.serialize_into(&mut buf);
        serialized.push(buf);
    }
    let prefix_len = common_prefix_len(serialized.iter().map(Vec::as_slice));
    used_bytes(serialized.iter().map(Vec::len), prefix_len)
}

/// Longest prefix shared by every entry, leaving at least one byte of each
/// entry after it. Pages with fewer than two entries have no prefix.
pub fn common_prefix_len<'a>(mut entries: impl Iterator<Item = &'a [u8]>) -> usize {
    let Some(first) = entries.next() else {
        return 0;
    };
    let mut prefix = first.len().saturating_sub(1);
    let mut count = 1;
    for e in entries {
        count += 1;
        let shared = first
            .iter()
            .zip(e.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix = prefix.min(shared).min(e.len().saturating_sub(1));
    }
    if count < 2 {
        0
    } else {
        prefix
    }
}

pub fn used_bytes(lengths: impl Iterator<Item = usize>, prefix_len: usize) -> usize {
    lengths
        .enumerate()
        .map(|(i, len)| if i == 0 { len } else { len - prefix_len })
        .sum()
}

pub(super) fn format_error(page: u32, reason: String) -> eyre::Report {
    IndexError::Format { page, reason }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::index::RowId;

    const CAPACITY: usize = PAGE_SIZE - INDEX_ENTRIES_OFFSET;

    fn leaf_entry(bytes: &[u8], page: u32) -> Entry {
        Entry::new(bytes.to_vec(), RowId::new(page, 0))
    }

    #[test]
    fn prefix_is_stored_once() {
        let mut page = IndexPage::new_leaf(5, 2);
        page.set_entries(vec![
            leaf_entry(&[0x7F, 0x41, 0x42, 0x43], 1),
            leaf_entry(&[0x7F, 0x41, 0x42, 0x44], 1),
            leaf_entry(&[0x7F, 0x41, 0x42, 0x45], 1),
        ]);

        let mut buf = vec![0u8; PAGE_SIZE];
        page.encode(&mut buf, CAPACITY).unwrap();

        let header = IndexPageHeader::from_bytes(&buf).unwrap();
        assert_eq!(header.prefix_len(), 3);
        // 8 bytes for the first entry, 5 for each of the others
        assert_eq!(page.encoded_size(), 18);
        assert_eq!(header.free_space() as usize, CAPACITY - 18);
        assert_eq!(buf[INDEX_ENTRY_MASK_OFFSET + 1], 1 << 0 | 1 << 5);
        assert_eq!(buf[INDEX_ENTRY_MASK_OFFSET + 2], 1 << 2);

        let decoded = IndexPage::decode(5, &buf, CAPACITY).unwrap();
        assert_eq!(decoded, page);
    }

    #[test]
    fn node_pages_track_their_tail_child() {
        let mut page = IndexPage::new_node(3, 2);
        let max = leaf_entry(&[0x7F, 0x10], 7);
        page.insert(0, Entry::node(&max, 11));
        page.insert(0, Entry::node(&leaf_entry(&[0x7F, 0x01], 7), 10));
        assert_eq!(page.child_tail_page(), 11);

        let mut buf = vec![0u8; PAGE_SIZE];
        page.encode(&mut buf, CAPACITY).unwrap();
        let decoded = IndexPage::decode(3, &buf, CAPACITY).unwrap();
        assert!(!decoded.is_leaf());
        assert_eq!(decoded.entries()[1].child_page(), Some(11));
        assert_eq!(decoded.child_tail_page(), 11);
    }

    #[test]
    fn overflowing_page_is_rejected() {
        let mut page = IndexPage::new_leaf(1, 0);
        let big: Vec<Entry> = (0..40u32)
            .map(|i| {
                let mut bytes = vec![0x7F; 100];
                bytes[0] = i as u8;
                Entry::new(bytes, RowId::new(i, 0))
            })
            .collect();
        page.set_entries(big);
        let mut buf = vec![0u8; PAGE_SIZE];
        assert!(page.encode(&mut buf, CAPACITY).is_err());
    }

    #[test]
    fn non_index_page_is_a_format_error() {
        let mut buf = vec![0u8; PAGE_SIZE];
        buf[0] = PageType::Data as u8;
        let err = IndexPage::decode(9, &buf, CAPACITY).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::Format { page: 9, .. })
        ));
    }

    #[test]
    fn single_entry_pages_have_no_prefix() {
        assert_eq!(common_prefix_len([&[1u8, 2, 3][..]].into_iter()), 0);
        assert_eq!(
            common_prefix_len([&[1u8, 2, 3][..], &[1, 2, 3, 4][..]].into_iter()),
            2
        );
    }
}
