//! Disk Manager - low-level file I/O for one index's pages.
//!
//! Each [`DiskManager`] owns exactly one `table_<indexId>.db` file. The
//! buffer pool keeps one `DiskManager` per `IndexId` it has ever touched
//! and opens new ones lazily.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::config::PAGE_SIZE;
use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single index's database file.
///
/// # File Layout
/// Pages are laid out sequentially: page `N` lives at file offset
/// `N * PAGE_SIZE`. Unlike a pre-sized heap file, pages are written lazily
/// — a page the `PageManager` has allocated but the buffer pool has never
/// evicted simply doesn't exist on disk yet, and reading it returns a
/// zeroed buffer rather than an error.
///
/// # Thread Safety
/// `DiskManager` is single-threaded; the `BufferPool` serializes access.
pub struct DiskManager {
    file: File,
    path: PathBuf,
}

impl DiskManager {
    /// Open (or create) the database file at `path`.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages the file currently spans (rounded down).
    pub fn page_count(&self) -> Result<u32> {
        let len = self.file.metadata()?.len();
        Ok((len / PAGE_SIZE as u64) as u32)
    }

    /// Read a page from disk.
    ///
    /// Returns a zeroed page if `page_id` lies beyond the current end of
    /// file — the page was allocated but never flushed.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        let file_len = self.file.metadata()?.len();

        let mut page = Page::new();
        if offset >= file_len {
            return Ok(page);
        }

        self.file.seek(SeekFrom::Start(offset))?;

        // The file may end mid-page if a previous write was short; read
        // what exists and leave the rest zeroed.
        let available = (file_len - offset).min(PAGE_SIZE as u64) as usize;
        self.file.read_exact(&mut page.as_mut_slice()[..available])?;

        Ok(page)
    }

    /// Write a page to disk at its offset, extending the file as needed.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;
        Ok(())
    }
}
