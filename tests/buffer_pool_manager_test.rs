//! Buffer pool manager lifecycle tests: pinning, eviction, flush/reload,
//! and concurrent access across threads.

use kvrelay::buffer::BufferPoolManager;
use kvrelay::common::IndexId;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const FRAMES: usize = 10;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    (BufferPoolManager::new(pool_size, dir.path()), dir)
}

fn copy_string(data: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    data[..bytes.len()].copy_from_slice(bytes);
    data[bytes.len()] = 0;
}

fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

#[test]
fn test_very_basic() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let index_id = IndexId::new(1);
    let str_data = "Hello, world!";

    let key = bpm.new_page(index_id).unwrap().page_key();

    {
        let mut guard = bpm.fetch_page_write(key).unwrap();
        copy_string(guard.payload_mut(), str_data);
        assert_eq!(read_string(guard.payload()), str_data);
    }

    {
        let guard = bpm.fetch_page_read(key).unwrap();
        assert_eq!(read_string(guard.payload()), str_data);
    }
    {
        let guard = bpm.fetch_page_read(key).unwrap();
        assert_eq!(read_string(guard.payload()), str_data);
    }

    assert!(bpm.delete_page(key).is_ok());
}

/// A page that is pinned (its guard held) cannot be evicted even when
/// the pool is full; dropping the guard frees it for eviction.
#[test]
fn test_pinned_pages_survive_eviction_pressure() {
    let (bpm, _dir) = create_bpm(2);
    let index_id = IndexId::new(1);

    let key0 = bpm.new_page(index_id).unwrap().page_key();
    let key1 = bpm.new_page(index_id).unwrap().page_key();

    let str0 = "page0";
    let str1 = "page1";

    {
        let mut guard0 = bpm.fetch_page_write(key0).unwrap();
        copy_string(guard0.payload_mut(), str0);
        let mut guard1 = bpm.fetch_page_write(key1).unwrap();
        copy_string(guard1.payload_mut(), str1);
        // Both frames are pinned here; the pool has no room for a third.
    }

    // Both guards dropped: their frames are unpinned and evictable.
    for _ in 0..5 {
        let key = bpm.new_page(index_id).unwrap().page_key();
        let _ = bpm.fetch_page_read(key).unwrap();
    }

    // Original pages reload from disk with their contents intact.
    let guard0 = bpm.fetch_page_read(key0).unwrap();
    assert_eq!(read_string(guard0.payload()), str0);
    drop(guard0);
    let guard1 = bpm.fetch_page_read(key1).unwrap();
    assert_eq!(read_string(guard1.payload()), str1);
}

/// Filling the pool with pinned pages, then unpinning half, frees exactly
/// that many frames for new allocations.
#[test]
fn test_page_pin_medium() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let index_id = IndexId::new(1);

    let key0 = bpm.new_page(index_id).unwrap().page_key();
    {
        let mut page0 = bpm.fetch_page_write(key0).unwrap();
        copy_string(page0.payload_mut(), "Hello");
    }

    let mut pages = Vec::new();
    for _ in 0..FRAMES {
        let key = bpm.new_page(index_id).unwrap().page_key();
        pages.push(bpm.fetch_page_write(key).unwrap());
    }

    // The pool is full and every frame is pinned: fetching page 0 again
    // (a fresh frame) must fail.
    assert!(bpm.fetch_page_write(key0).is_err());

    // Drop half the pinned guards, freeing their frames.
    for _ in 0..(FRAMES / 2) {
        pages.remove(0);
    }

    // Now the freed frames can hold page 0 again, with its data intact.
    let original = bpm.fetch_page_read(key0).unwrap();
    assert_eq!(read_string(original.payload()), "Hello");
}

/// Dropping a guard unpins its frame and has no further effect if
/// dropped again (there is nothing left to drop, the type just goes
/// out of scope once).
#[test]
fn test_drop_unpins_exactly_once() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let index_id = IndexId::new(1);

    let key0 = bpm.new_page(index_id).unwrap().page_key();
    let key1 = bpm.new_page(index_id).unwrap().page_key();

    {
        let read_guard = bpm.fetch_page_read(key0).unwrap();
        let write_guard = bpm.fetch_page_write(key1).unwrap();
        drop(read_guard);
        drop(write_guard);
    }

    // This would hang if the locks were not released on drop.
    {
        let _write_test1 = bpm.fetch_page_write(key0).unwrap();
        let _write_test2 = bpm.fetch_page_write(key1).unwrap();
    }
}

/// A pinned page is never evicted; unpinning it makes it evictable
/// under pressure from concurrent readers on other threads.
#[test]
fn test_evictable() {
    const ROUNDS: usize = 20;
    const NUM_READERS: usize = 4;

    let (bpm, _dir) = create_bpm(1);
    let bpm = Arc::new(bpm);
    let index_id = IndexId::new(1);

    for _round in 0..ROUNDS {
        let winner_key = bpm.new_page(index_id).unwrap().page_key();
        drop(bpm.fetch_page_write(winner_key).unwrap());

        let loser_key = bpm.new_page(index_id).unwrap().page_key();
        drop(bpm.fetch_page_write(loser_key).unwrap());
        // At this point: the single frame holds `loser`; `winner` is on disk.

        let winner_guard = bpm.fetch_page_read(winner_key).unwrap();

        let mut readers = Vec::new();
        for _ in 0..NUM_READERS {
            let bpm_clone = Arc::clone(&bpm);
            readers.push(thread::spawn(move || {
                // The only frame is pinned by `winner_guard`, so a fetch of
                // `loser` (which would need that same frame) must fail.
                assert!(bpm_clone.fetch_page_read(loser_key).is_err());
            }));
        }
        for reader in readers {
            reader.join().unwrap();
        }

        drop(winner_guard);
    }
}

/// Holding a write guard on one page does not block acquiring a write
/// guard on a different page (no global lock).
#[test]
fn test_page_access_does_not_deadlock_across_pages() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    let (bpm, _dir) = create_bpm(FRAMES);
    let bpm = Arc::new(bpm);
    let index_id = IndexId::new(1);

    let key0 = bpm.new_page(index_id).unwrap().page_key();
    let key1 = bpm.new_page(index_id).unwrap().page_key();
    drop(bpm.fetch_page_write(key0).unwrap());
    drop(bpm.fetch_page_write(key1).unwrap());

    let guard0 = bpm.fetch_page_write(key0).unwrap();

    let start = Arc::new(AtomicBool::new(false));
    let start_clone = Arc::clone(&start);
    let bpm_clone = Arc::clone(&bpm);

    let child = thread::spawn(move || {
        start_clone.store(true, Ordering::SeqCst);
        let _guard0 = bpm_clone.fetch_page_write(key0).unwrap();
    });

    while !start.load(Ordering::SeqCst) {
        thread::yield_now();
    }
    thread::sleep(Duration::from_millis(50));

    // Deadlocks here if page-level locking accidentally serializes on
    // something pool-wide rather than per-page.
    let _guard1 = bpm.fetch_page_write(key1).unwrap();

    drop(guard0);
    child.join().unwrap();
}

#[test]
fn test_new_page_convenience() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let index_id = IndexId::new(1);
    let data = b"Hello, world!";

    let key = {
        let mut guard = bpm.new_page(index_id).unwrap();
        guard.payload_mut()[..data.len()].copy_from_slice(data);
        guard.page_key()
    };

    {
        let guard = bpm.fetch_page_read(key).unwrap();
        assert_eq!(&guard.payload()[..data.len()], data);
    }

    bpm.delete_page(key).unwrap();
    assert!(!bpm.is_allocated(key).unwrap());
}
