//! # Memory-Mapped Page Store
//!
//! `MmapPageStore` maps a Jet database file into memory and serves page reads
//! and writes as copies into and out of the mapping. The file is a plain
//! concatenation of pages:
//!
//! ```text
//! Offset 0:        Page 0 (database header)
//! Offset 4096:     Page 1
//! Offset 8192:     Page 2
//! ...
//! ```
//!
//! The file size must always be a multiple of the page size.
//!
//! ## Growth
//!
//! `allocate_page` extends the file by one page and remaps it. The mapping
//! lives behind a `parking_lot::RwLock`, so growth takes the write lock and
//! no reader can hold a slice of the old mapping across the remap.
//!
//! ## Error Handling
//!
//! All fallible operations return `eyre::Result` with the file path or page
//! number in the context.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;
use parking_lot::RwLock;

use super::PageStore;
use crate::config::JetFormat;

#[derive(Debug)]
struct Mapping {
    file: File,
    mmap: MmapMut,
    page_count: u32,
}

#[derive(Debug)]
pub struct MmapPageStore {
    path: PathBuf,
    page_size: usize,
    mapping: RwLock<Mapping>,
}

impl MmapPageStore {
    pub fn open<P: AsRef<Path>>(path: P, format: JetFormat) -> Result<Self> {
        let path = path.as_ref();
        let page_size = format.page_size();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let file_size = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
            .len();

        ensure!(
            file_size > 0,
            "cannot open empty database file '{}'",
            path.display()
        );

        ensure!(
            file_size % page_size as u64 == 0,
            "database file '{}' size {} is not a multiple of page size {}",
            path.display(),
            file_size,
            page_size
        );

        let page_count = (file_size / page_size as u64) as u32;

        // SAFETY: the file is opened read+write by this process and is not
        // expected to be modified externally; the mapping is owned by the
        // store and every access is bounds-checked against page_count.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            path: path.to_path_buf(),
            page_size,
            mapping: RwLock::new(Mapping {
                file,
                mmap,
                page_count,
            }),
        })
    }

    /// Creates (or truncates) a database file holding `initial_page_count`
    /// zeroed pages. At least one page is required: page 0 is the database
    /// header and never holds index data.
    pub fn create<P: AsRef<Path>>(
        path: P,
        format: JetFormat,
        initial_page_count: u32,
    ) -> Result<Self> {
        let path = path.as_ref();
        let page_size = format.page_size();

        ensure!(
            initial_page_count > 0,
            "initial page count must be at least 1"
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create database file '{}'", path.display()))?;

        let file_size = initial_page_count as u64 * page_size as u64;

        file.set_len(file_size)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", file_size))?;

        // SAFETY: the file was just created with exclusive access and sized to
        // a whole number of pages; the mapping is owned by the store.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            path: path.to_path_buf(),
            page_size,
            mapping: RwLock::new(Mapping {
                file,
                mmap,
                page_count: initial_page_count,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.mapping.read().page_count as u64 * self.page_size as u64
    }
}

impl PageStore for MmapPageStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> u32 {
        self.mapping.read().page_count
    }

    fn read_page(&self, page_no: u32, buf: &mut [u8]) -> Result<()> {
        ensure!(
            buf.len() == self.page_size,
            "read buffer is {} bytes, page size is {}",
            buf.len(),
            self.page_size
        );

        let mapping = self.mapping.read();
        ensure!(
            page_no < mapping.page_count,
            "page {} out of bounds (page_count={})",
            page_no,
            mapping.page_count
        );

        let offset = page_no as usize * self.page_size;
        buf.copy_from_slice(&mapping.mmap[offset..offset + self.page_size]);
        Ok(())
    }

    fn write_page(&self, page_no: u32, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() == self.page_size,
            "write buffer is {} bytes, page size is {}",
            data.len(),
            self.page_size
        );

        let mut mapping = self.mapping.write();
        ensure!(
            page_no < mapping.page_count,
            "page {} out of bounds (page_count={})",
            page_no,
            mapping.page_count
        );

        let offset = page_no as usize * self.page_size;
        mapping.mmap[offset..offset + self.page_size].copy_from_slice(data);
        Ok(())
    }

    fn allocate_page(&self) -> Result<u32> {
        let mut mapping = self.mapping.write();

        mapping
            .mmap
            .flush()
            .wrap_err("failed to flush mmap before grow")?;

        let page_no = mapping.page_count;
        let new_size = (page_no as u64 + 1) * self.page_size as u64;

        mapping
            .file
            .set_len(new_size)
            .wrap_err_with(|| format!("failed to extend file to {} bytes", new_size))?;

        // SAFETY: the write lock is held, so no reader can observe the old
        // mapping; the old mapping was flushed and the file already has the
        // new length.
        mapping.mmap = unsafe {
            MmapMut::map_mut(&mapping.file).wrap_err("failed to remap file after grow")?
        };
        mapping.page_count = page_no + 1;

        Ok(page_no)
    }

    fn sync(&self) -> Result<()> {
        self.mapping
            .read()
            .mmap
            .flush()
            .wrap_err("failed to sync mmap to disk")
    }
}
