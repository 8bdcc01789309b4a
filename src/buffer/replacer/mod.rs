//! Eviction policy implementations (replacers).
//!
//! Implements strict LRU via [`LruReplacer`]: the buffer pool evicts the
//! evictable frame that has gone longest without an access.

mod lru;

pub use lru::LruReplacer;
