//! # Page Types and Index Page Header
//!
//! Every Jet page starts with a one-byte page type. Index pages (node and
//! leaf) share a fixed 27-byte header followed by the entry mask and entry
//! data:
//!
//! ```text
//! Offset  Size  Field            Description
//! ------  ----  ---------------  ---------------------------------------
//! 0       1     page_type        0x03 node, 0x04 leaf
//! 1       1     marker           always 0x01
//! 2       2     free_space       unused bytes after the last entry
//! 4       4     owner_page       table definition page owning the index
//! 8       4     reserved
//! 12      4     prev_page        previous page on the same level (0 = none)
//! 16      4     next_page        next page on the same level (0 = none)
//! 20      4     child_tail_page  last child (node pages only)
//! 24      2     prefix_len       bytes shared by every entry on the page
//! 26      1     reserved
//! 27      453   entry mask       bit n set: an entry ends before data byte n
//! 480     ...   entries
//! ```
//!
//! All multi-byte header fields are little-endian. The header is read in
//! place through `zerocopy`, so decoding never copies the page.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{INDEX_ENTRY_MASK_OFFSET, INDEX_PAGE_MARKER};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Unknown = 0x00,
    Data = 0x01,
    TableDef = 0x02,
    IndexNode = 0x03,
    IndexLeaf = 0x04,
    UsageMap = 0x05,
}

impl PageType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x01 => PageType::Data,
            0x02 => PageType::TableDef,
            0x03 => PageType::IndexNode,
            0x04 => PageType::IndexLeaf,
            0x05 => PageType::UsageMap,
            _ => PageType::Unknown,
        }
    }

    pub fn is_index(self) -> bool {
        matches!(self, PageType::IndexNode | PageType::IndexLeaf)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct IndexPageHeader {
    page_type: u8,
    marker: u8,
    free_space: U16,
    owner_page: U32,
    reserved: [u8; 4],
    prev_page: U32,
    next_page: U32,
    child_tail_page: U32,
    prefix_len: U16,
    reserved2: u8,
}

const _: () = assert!(
    size_of::<IndexPageHeader>() == INDEX_ENTRY_MASK_OFFSET,
    "IndexPageHeader must end where the entry mask begins"
);

impl IndexPageHeader {
    zerocopy_accessors! {
        free_space: u16,
        owner_page: u32,
        prev_page: u32,
        next_page: u32,
        child_tail_page: u32,
        prefix_len: u16,
    }

    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type: page_type as u8,
            marker: INDEX_PAGE_MARKER,
            free_space: U16::new(0),
            owner_page: U32::new(0),
            reserved: [0; 4],
            prev_page: U32::new(0),
            next_page: U32::new(0),
            child_tail_page: U32::new(0),
            prefix_len: U16::new(0),
            reserved2: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= size_of::<Self>(),
            "buffer too small for IndexPageHeader: {} < {}",
            data.len(),
            size_of::<Self>()
        );

        Self::ref_from_bytes(&data[..size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to read IndexPageHeader: {:?}", e))
    }

    pub fn write_to(&self, data: &mut [u8]) -> Result<()> {
        ensure!(
            data.len() >= size_of::<Self>(),
            "buffer too small for IndexPageHeader: {} < {}",
            data.len(),
            size_of::<Self>()
        );

        data[..size_of::<Self>()].copy_from_slice(self.as_bytes());
        Ok(())
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_byte(self.page_type)
    }

    pub fn marker(&self) -> u8 {
        self.marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_type_from_byte() {
        assert_eq!(PageType::from_byte(0x00), PageType::Unknown);
        assert_eq!(PageType::from_byte(0x03), PageType::IndexNode);
        assert_eq!(PageType::from_byte(0x04), PageType::IndexLeaf);
        assert_eq!(PageType::from_byte(0xFF), PageType::Unknown);
        assert!(PageType::IndexLeaf.is_index());
        assert!(!PageType::Data.is_index());
    }

    #[test]
    fn header_fields_land_at_format_offsets() {
        let mut header = IndexPageHeader::new(PageType::IndexLeaf);
        header.set_free_space(0x1234);
        header.set_owner_page(7);
        header.set_prev_page(0x0A0B0C0D);
        header.set_next_page(9);
        header.set_child_tail_page(11);
        header.set_prefix_len(5);

        let mut page = vec![0u8; 64];
        header.write_to(&mut page).unwrap();

        assert_eq!(page[0], 0x04);
        assert_eq!(page[1], 0x01);
        assert_eq!(&page[2..4], &[0x34, 0x12]);
        assert_eq!(&page[4..8], &7u32.to_le_bytes());
        assert_eq!(&page[12..16], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(&page[16..20], &9u32.to_le_bytes());
        assert_eq!(&page[20..24], &11u32.to_le_bytes());
        assert_eq!(&page[24..26], &5u16.to_le_bytes());

        let read = IndexPageHeader::from_bytes(&page).unwrap();
        assert_eq!(read.page_type(), PageType::IndexLeaf);
        assert_eq!(read.prev_page(), 0x0A0B0C0D);
        assert_eq!(read.prefix_len(), 5);
    }

    #[test]
    fn from_bytes_rejects_short_buffer() {
        assert!(IndexPageHeader::from_bytes(&[0u8; 10]).is_err());
    }
}
