//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus metadata needed for buffer management:
//! - Which `(index, page)` is loaded (if any)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageKey;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// Frames are the "slots" in the buffer pool. Each frame can hold one page
/// belonging to any index — the pool is shared across every table.
///
/// # Interior mutability
/// Fields use interior mutability so the pool can hand out `&Frame`
/// references while still tracking pins and dirtiness:
/// - `page`: `RwLock` for read/write synchronization
/// - `page_key`: `Mutex` for safe updates
/// - `pin_count`: `AtomicU32` for lock-free reference counting
/// - `is_dirty`: `AtomicBool` for lock-free dirty tracking
///
/// The engine itself runs single-threaded and cooperative (spec.md §5);
/// these primitives exist for safe shared access to `&Frame`, not to
/// support concurrent callers.
pub struct Frame {
    page: RwLock<Page>,
    page_key: Mutex<Option<PageKey>>,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            page_key: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Page access (RwLock)
    // ========================================================================

    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    // ========================================================================
    // Page key management
    // ========================================================================

    #[inline]
    pub fn page_key(&self) -> Option<PageKey> {
        *self.page_key.lock()
    }

    #[inline]
    pub fn set_page_key(&self, key: Option<PageKey>) {
        *self.page_key.lock() = key;
    }

    // ========================================================================
    // Pin count operations (Atomic)
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Dirty flag operations (Atomic)
    // ========================================================================

    /// Mark the frame dirty. Authoritative over any `is_dirty` argument a
    /// caller passes to `unpin` elsewhere (spec.md §9's open question).
    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Frame state queries
    // ========================================================================

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_key().is_none()
    }

    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.page_key().is_some() && !self.is_pinned()
    }

    /// Reset the frame to empty state. Called after eviction.
    pub fn reset(&self) {
        self.page_mut().reset();
        self.set_page_key(None);
        self.pin_count.store(0, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{IndexId, PageId};

    fn key(index: i32, page: u32) -> PageKey {
        PageKey::new(IndexId::new(index), PageId::new(page))
    }

    #[test]
    fn new_frame_is_empty() {
        let frame = Frame::new();
        assert!(frame.is_empty());
        assert!(!frame.is_pinned());
        assert!(!frame.is_dirty());
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn pin_unpin_tracks_count() {
        let frame = Frame::new();

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.unpin(), 1);
        assert!(frame.is_pinned());
        assert_eq!(frame.unpin(), 0);
        assert!(!frame.is_pinned());
    }

    #[test]
    #[should_panic(expected = "pin count underflow")]
    fn unpin_below_zero_panics() {
        Frame::new().unpin();
    }

    #[test]
    fn dirty_flag_round_trips() {
        let frame = Frame::new();
        assert!(!frame.is_dirty());
        frame.mark_dirty();
        assert!(frame.is_dirty());
        frame.clear_dirty();
        assert!(!frame.is_dirty());
    }

    #[test]
    fn page_key_tracks_occupancy() {
        let frame = Frame::new();
        assert!(frame.is_empty());

        frame.set_page_key(Some(key(100, 1)));
        assert!(!frame.is_empty());
        assert_eq!(frame.page_key(), Some(key(100, 1)));
    }

    #[test]
    fn evictable_requires_occupied_and_unpinned() {
        let frame = Frame::new();
        assert!(!frame.is_evictable());

        frame.set_page_key(Some(key(100, 1)));
        assert!(frame.is_evictable());

        frame.pin();
        assert!(!frame.is_evictable());

        frame.unpin();
        assert!(frame.is_evictable());
    }

    #[test]
    fn reset_clears_all_state() {
        let frame = Frame::new();
        frame.set_page_key(Some(key(100, 9)));
        frame.pin();
        frame.mark_dirty();
        frame.page_mut().as_mut_slice()[0] = 0xFF;

        frame.reset();

        assert!(frame.is_empty());
        assert!(!frame.is_pinned());
        assert!(!frame.is_dirty());
        assert_eq!(frame.page().as_slice()[0], 0);
    }
}
