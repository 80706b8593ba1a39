//! # Configuration Module
//!
//! Format constants live in [`constants`]; the runtime format descriptor
//! handed to every `IndexData` is [`JetFormat`]. Locale settings consumed by
//! the expression engine live in [`locale`].
//!
//! `JetFormat` exists so that the page size is a value rather than a global:
//! the real format always uses 4096-byte pages, but tests shrink it to force
//! deep trees without inserting tens of thousands of rows.

pub mod constants;
mod locale;

pub use constants::*;
pub use locale::{LocaleContext, LocaleContextBuilder, NumericConfig, TemporalConfig};

use eyre::{ensure, Result};

/// Page geometry of a database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JetFormat {
    page_size: usize,
}

impl JetFormat {
    /// Access 2000 and later.
    pub const V4: JetFormat = JetFormat {
        page_size: PAGE_SIZE,
    };

    pub fn with_page_size(page_size: usize) -> Result<Self> {
        ensure!(
            (MIN_PAGE_SIZE..=PAGE_SIZE).contains(&page_size),
            "page size {} outside supported range {}..={}",
            page_size,
            MIN_PAGE_SIZE,
            PAGE_SIZE
        );
        Ok(Self { page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Bytes available to entry data on an index page.
    pub fn index_data_capacity(&self) -> usize {
        self.page_size - INDEX_ENTRIES_OFFSET
    }

    /// Largest encoded entry (including a node child pointer) accepted by
    /// an index. Keeping entries under a third of the data area guarantees
    /// that any overflowing page can be split into two pages that fit.
    pub fn max_entry_size(&self) -> usize {
        self.index_data_capacity() / 3
    }
}

impl Default for JetFormat {
    fn default() -> Self {
        Self::V4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_capacity_matches_layout() {
        assert_eq!(JetFormat::V4.page_size(), 4096);
        assert_eq!(JetFormat::V4.index_data_capacity(), 4096 - 480);
    }

    #[test]
    fn rejects_tiny_pages() {
        assert!(JetFormat::with_page_size(256).is_err());
        assert!(JetFormat::with_page_size(8192).is_err());
        assert_eq!(JetFormat::with_page_size(1024).unwrap().page_size(), 1024);
    }
}
