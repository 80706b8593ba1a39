//! In-memory page store.
//!
//! Pages live in a `Vec` behind a `parking_lot::RwLock`. Page 0 is reserved
//! at creation (Jet uses it for the database header) so that no index page is
//! ever allocated at page number 0, which the format uses as "no page".

use eyre::{ensure, Result};
use parking_lot::RwLock;

use super::PageStore;
use crate::config::JetFormat;

#[derive(Debug)]
pub struct MemPageStore {
    page_size: usize,
    pages: RwLock<Vec<Box<[u8]>>>,
}

impl MemPageStore {
    pub fn new(format: JetFormat) -> Self {
        let page_size = format.page_size();
        Self {
            page_size,
            pages: RwLock::new(vec![vec![0u8; page_size].into_boxed_slice()]),
        }
    }
}

impl Default for MemPageStore {
    fn default() -> Self {
        Self::new(JetFormat::V4)
    }
}

impl PageStore for MemPageStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> u32 {
        self.pages.read().len() as u32
    }

    fn read_page(&self, page_no: u32, buf: &mut [u8]) -> Result<()> {
        ensure!(
            buf.len() == self.page_size,
            "read buffer is {} bytes, page size is {}",
            buf.len(),
            self.page_size
        );
        let pages = self.pages.read();
        let page = pages.get(page_no as usize).ok_or_else(|| {
            eyre::eyre!(
                "page {} out of bounds (page_count={})",
                page_no,
                pages.len()
            )
        })?;
        buf.copy_from_slice(page);
        Ok(())
    }

    fn write_page(&self, page_no: u32, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() == self.page_size,
            "write buffer is {} bytes, page size is {}",
            data.len(),
            self.page_size
        );
        let mut pages = self.pages.write();
        let page_count = pages.len();
        let page = pages.get_mut(page_no as usize).ok_or_else(|| {
            eyre::eyre!(
                "page {} out of bounds (page_count={})",
                page_no,
                page_count
            )
        })?;
        page.copy_from_slice(data);
        Ok(())
    }

    fn allocate_page(&self) -> Result<u32> {
        let mut pages = self.pages.write();
        let page_no = pages.len() as u32;
        pages.push(vec![0u8; self.page_size].into_boxed_slice());
        Ok(page_no)
    }
}
