//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory, shared across every index
//! - Pin-based reference counting
//! - Automatic dirty page write-back
//! - Strict LRU eviction
//!
//! Unlike a single-file cache, one `BufferPoolManager` backs the whole
//! engine: pages are addressed by `(IndexId, PageId)`, and disk I/O and
//! page-id allocation are split out per index, opened lazily as tables
//! and indexes are touched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, IndexId, PageId, PageKey, Result};
use crate::storage::{DiskManager, PageManager};

/// Manages a pool of buffer frames for caching disk pages across every
/// table and index in the engine.
///
/// # Thread Safety
/// - `page_table`: `RwLock` — many readers, few writers
/// - `free_list`, `replacer`, `disk_managers`, `page_managers`: `Mutex`
/// - `frames`: no lock — fixed size, each `Frame` has internal locks
/// - `stats`: no lock — all atomic counters
///
/// The engine itself is single-threaded and cooperative; these are the
/// same interior-mutability primitives the teacher used, kept so `&self`
/// methods can hand out guards without a surrounding `&mut`.
pub struct BufferPoolManager {
    /// Root directory holding every index's `.db` and `.pagemeta` files.
    data_dir: PathBuf,

    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps `(index, page)` to frame id.
    page_table: RwLock<HashMap<PageKey, FrameId>>,

    /// Stack of free frame ids (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,

    /// Eviction policy for selecting victim frames.
    replacer: Mutex<LruReplacer>,

    /// Per-index file handles, opened lazily on first touch.
    disk_managers: Mutex<HashMap<IndexId, DiskManager>>,

    /// Per-index page-id allocators, loaded lazily on first touch.
    page_managers: Mutex<HashMap<IndexId, PageManager>>,

    /// Performance statistics.
    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager rooted at `data_dir`.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, data_dir: impl Into<PathBuf>) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).map(FrameId::new).collect();

        Self {
            data_dir: data_dir.into(),
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new()),
            disk_managers: Mutex::new(HashMap::new()),
            page_managers: Mutex::new(HashMap::new()),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    /// Root directory this pool persists every index's files under.
    pub fn data_dir_path(&self) -> &Path {
        &self.data_dir
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// # Errors
    /// - `Error::NotFound` if `index_id` never allocated `page_id`
    /// - `Error::PoolExhausted` if every frame is pinned
    pub fn fetch_page_read(&self, key: PageKey) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(key)?;
        let lock = self.frames[frame_id.0].page();
        Ok(PageReadGuard::new(self, frame_id, key, lock))
    }

    /// Fetch a page for writing (exclusive access). The page is marked
    /// dirty automatically when the guard drops.
    pub fn fetch_page_write(&self, key: PageKey) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(key)?;
        let lock = self.frames[frame_id.0].page_mut();
        Ok(PageWriteGuard::new(self, frame_id, key, lock))
    }

    // ========================================================================
    // Public API: Create and delete pages
    // ========================================================================

    /// Allocate a new page for `index_id` and load it into the pool.
    ///
    /// Returns a write guard for the new, zeroed page.
    pub fn new_page(&self, index_id: IndexId) -> Result<PageWriteGuard<'_>> {
        let page_id = {
            let mut pms = self.page_managers.lock();
            let pm = self.load_page_manager(&mut pms, index_id)?;
            pm.allocate()?
        };
        let key = PageKey::new(index_id, page_id);

        let frame_id = self.get_free_frame()?;
        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.set_page_key(Some(key));
        frame.pin();

        {
            let mut pt = self.page_table.write();
            pt.insert(key, frame_id);
        }
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, key, lock))
    }

    /// Delete a page from the buffer pool and free its page id.
    ///
    /// The page must not be pinned. Removing it from the pool does not
    /// shrink the underlying file.
    pub fn delete_page(&self, key: PageKey) -> Result<()> {
        let mut pt = self.page_table.write();

        let frame_id = match pt.get(&key) {
            Some(&fid) => fid,
            None => return Ok(()),
        };

        let frame = &self.frames[frame_id.0];
        if frame.is_pinned() {
            return Err(Error::InvalidState(format!("page {key} is still pinned")));
        }

        pt.remove(&key);
        drop(pt);

        frame.reset();

        {
            let mut replacer = self.replacer.lock();
            replacer.remove(frame_id);
        }
        {
            let mut fl = self.free_list.lock();
            fl.push(frame_id);
        }
        {
            let mut pms = self.page_managers.lock();
            let pm = self.load_page_manager(&mut pms, key.index_id)?;
            pm.free(key.page_id)?;
        }

        Ok(())
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Flush a specific page to disk if it's dirty.
    pub fn flush_page(&self, key: PageKey) -> Result<()> {
        let frame_id = {
            let pt = self.page_table.read();
            match pt.get(&key) {
                Some(&fid) => fid,
                None => return Ok(()),
            }
        };
        self.flush_frame(frame_id, key)
    }

    /// Flush every dirty page belonging to `index_id`.
    pub fn flush_table_pages(&self, index_id: IndexId) -> Result<()> {
        let pages: Vec<PageKey> = {
            let pt = self.page_table.read();
            pt.keys().filter(|k| k.index_id == index_id).copied().collect()
        };

        for key in pages {
            self.flush_page(key)?;
        }
        Ok(())
    }

    /// Flush every dirty page across every index.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<PageKey> = {
            let pt = self.page_table.read();
            pt.keys().copied().collect()
        };

        for key in pages {
            self.flush_page(key)?;
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Whether `index_id` has allocated `page_id`, loading its
    /// `PageManager` on first use if needed.
    pub fn is_allocated(&self, key: PageKey) -> Result<bool> {
        let mut pms = self.page_managers.lock();
        let pm = self.load_page_manager(&mut pms, key.index_id)?;
        Ok(pm.is_allocated(key.page_id))
    }

    // ========================================================================
    // Internal: Called by PageGuard on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        let new_pin_count = frame.unpin();
        if new_pin_count == 0 {
            let mut replacer = self.replacer.lock();
            replacer.set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, key: PageKey) -> Result<FrameId> {
        {
            let pt = self.page_table.read();
            if let Some(&frame_id) = pt.get(&key) {
                self.handle_cache_hit(frame_id);
                return Ok(frame_id);
            }
        }

        self.handle_cache_miss(key)
    }

    fn handle_cache_hit(&self, frame_id: FrameId) {
        let frame = &self.frames[frame_id.0];
        frame.pin();

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn handle_cache_miss(&self, key: PageKey) -> Result<FrameId> {
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        {
            let mut pms = self.page_managers.lock();
            let pm = self.load_page_manager(&mut pms, key.index_id)?;
            if !pm.is_allocated(key.page_id) {
                return Err(Error::NotFound(format!("page {key} was never allocated")));
            }
        }

        let frame_id = self.get_free_frame()?;

        let page_data = {
            let mut dms = self.disk_managers.lock();
            let dm = self.load_disk_manager(&mut dms, key.index_id)?;
            dm.read_page(key.page_id)?
        };

        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        {
            let mut page = frame.page_mut();
            page.as_mut_slice().copy_from_slice(page_data.as_slice());
        }

        frame.set_page_key(Some(key));
        frame.pin();

        {
            let mut pt = self.page_table.write();
            pt.insert(key, frame_id);
        }
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(frame_id)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        {
            let mut fl = self.free_list.lock();
            if let Some(frame_id) = fl.pop() {
                return Ok(frame_id);
            }
        }

        self.evict_page()
    }

    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = {
            let mut replacer = self.replacer.lock();
            replacer.evict().ok_or(Error::PoolExhausted)?
        };

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        let old_key = frame.page_key();

        if frame.is_dirty() {
            if let Some(key) = old_key {
                self.flush_frame(frame_id, key)?;
            }
        }

        if let Some(key) = old_key {
            let mut pt = self.page_table.write();
            pt.remove(&key);
        }

        frame.reset();

        Ok(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId, key: PageKey) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.is_dirty() {
            let page = frame.page();
            {
                let mut dms = self.disk_managers.lock();
                let dm = self.load_disk_manager(&mut dms, key.index_id)?;
                dm.write_page(key.page_id, &page)?;
            }
            drop(page);

            frame.clear_dirty();
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    // ========================================================================
    // Internal: Lazy per-index resource loading
    // ========================================================================

    fn load_disk_manager<'a>(
        &self,
        dms: &'a mut HashMap<IndexId, DiskManager>,
        index_id: IndexId,
    ) -> Result<&'a mut DiskManager> {
        if !dms.contains_key(&index_id) {
            let path = self.data_dir.join(format!("{}.db", index_id.file_stem()));
            dms.insert(index_id, DiskManager::open_or_create(path)?);
        }
        Ok(dms.get_mut(&index_id).unwrap())
    }

    fn load_page_manager<'a>(
        &self,
        pms: &'a mut HashMap<IndexId, PageManager>,
        index_id: IndexId,
    ) -> Result<&'a mut PageManager> {
        if !pms.contains_key(&index_id) {
            let pm = PageManager::load(&self.data_dir, &index_id.file_stem())?;
            pms.insert(index_id, pm);
        }
        Ok(pms.get_mut(&index_id).unwrap())
    }
}
