//! # Storage Module
//!
//! The index subsystem reads and writes fixed-size pages through the
//! [`PageStore`] trait and never touches files directly. Buffer management,
//! table data pages and usage maps belong to the surrounding database; this
//! module only carries what the index core needs:
//!
//! - `PageStore`: read/write/allocate pages by page number
//! - `MemPageStore`: in-memory store used by tests and transient indexes
//! - `MmapPageStore`: memory-mapped database file
//! - `page`: page type tags and the index page header layout
//!
//! ## Thread Safety
//!
//! Stores take `&self` and synchronize internally with `parking_lot` locks,
//! so one store can be shared (`Arc<dyn PageStore>`) between several
//! `IndexData` instances and the table layer. A page buffer returned by
//! `read_page` is a private copy owned by the caller for the duration of one
//! operation.

mod memory;
mod mmap;
mod page;

pub use memory::MemPageStore;
pub use mmap::MmapPageStore;
pub use page::{IndexPageHeader, PageType};

use eyre::Result;

/// Page-level I/O consumed by the index core.
pub trait PageStore: Send + Sync {
    fn page_size(&self) -> usize;

    /// Number of pages currently in the store. Valid page numbers are
    /// `0..page_count()`.
    fn page_count(&self) -> u32;

    /// Copies page `page_no` into `buf`, which must be exactly one page long.
    fn read_page(&self, page_no: u32, buf: &mut [u8]) -> Result<()>;

    /// Overwrites page `page_no` with `data`, which must be exactly one page
    /// long.
    fn write_page(&self, page_no: u32, data: &[u8]) -> Result<()>;

    /// Appends a zeroed page and returns its number.
    fn allocate_page(&self) -> Result<u32>;

    /// Flushes pending writes to durable storage.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
