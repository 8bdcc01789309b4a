//! PageManager - per-index page-number allocator with persistent state.
//!
//! One `PageManager` exists per `IndexId`. It tracks which page ids are
//! currently allocated and which have been freed and are eligible for
//! reuse, and persists that state to `table_<indexId>.pagemeta`.

use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::config::PAGE_MANAGER_MAGIC;
use crate::common::{Error, PageId, Result};

/// Allocates and frees page ids for a single index, deterministically and
/// durably.
///
/// # Invariants
/// `allocated` and `free_list` are disjoint, and
/// `allocated.len() + free_list.len() <= next_page_id`.
pub struct PageManager {
    next_page_id: u32,
    allocated: BTreeSet<u32>,
    free_list: VecDeque<u32>,
    meta_path: PathBuf,
}

impl PageManager {
    /// Load a `PageManager` for `index_id` from `data_dir`, or start fresh
    /// if the metadata file doesn't exist yet.
    pub fn load(data_dir: &Path, file_stem: &str) -> Result<Self> {
        let meta_path = data_dir.join(format!("{file_stem}.pagemeta"));

        if !meta_path.exists() {
            return Ok(Self {
                next_page_id: 0,
                allocated: BTreeSet::new(),
                free_list: VecDeque::new(),
                meta_path,
            });
        }

        let bytes = fs::read(&meta_path)?;
        Self::decode(&bytes, meta_path)
    }

    fn decode(bytes: &[u8], meta_path: PathBuf) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self {
                next_page_id: 0,
                allocated: BTreeSet::new(),
                free_list: VecDeque::new(),
                meta_path,
            });
        }

        // magic(4) next_page_id(4) free_count(4) free_ids(4*n) crc32(4)
        if bytes.len() < 16 {
            return Err(Error::MetadataCorrupt(format!(
                "{}: truncated page-manager metadata",
                meta_path.display()
            )));
        }

        let (body, checksum_bytes) = bytes.split_at(bytes.len() - 4);
        let stored_checksum = u32::from_le_bytes(checksum_bytes.try_into().unwrap());
        let computed_checksum = crc32fast::hash(body);
        if stored_checksum != computed_checksum {
            return Err(Error::MetadataCorrupt(format!(
                "{}: checksum mismatch",
                meta_path.display()
            )));
        }

        let magic = u32::from_le_bytes(body[0..4].try_into().unwrap());
        if magic != PAGE_MANAGER_MAGIC {
            return Err(Error::MetadataCorrupt(format!(
                "{}: bad magic",
                meta_path.display()
            )));
        }

        let next_page_id = u32::from_le_bytes(body[4..8].try_into().unwrap());
        let free_count = u32::from_le_bytes(body[8..12].try_into().unwrap()) as usize;

        let expected_len = 12 + free_count * 4;
        if body.len() != expected_len {
            return Err(Error::MetadataCorrupt(format!(
                "{}: free-list length mismatch",
                meta_path.display()
            )));
        }

        let mut free_list = VecDeque::with_capacity(free_count);
        let mut offset = 12;
        for _ in 0..free_count {
            let id = u32::from_le_bytes(body[offset..offset + 4].try_into().unwrap());
            free_list.push_back(id);
            offset += 4;
        }

        let free_set: BTreeSet<u32> = free_list.iter().copied().collect();
        let allocated: BTreeSet<u32> = (0..next_page_id).filter(|id| !free_set.contains(id)).collect();

        Ok(Self {
            next_page_id,
            allocated,
            free_list,
            meta_path,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(12 + self.free_list.len() * 4);
        body.extend_from_slice(&PAGE_MANAGER_MAGIC.to_le_bytes());
        body.extend_from_slice(&self.next_page_id.to_le_bytes());
        body.extend_from_slice(&(self.free_list.len() as u32).to_le_bytes());
        for id in &self.free_list {
            body.extend_from_slice(&id.to_le_bytes());
        }

        let checksum = crc32fast::hash(&body);
        body.extend_from_slice(&checksum.to_le_bytes());
        body
    }

    /// Persist current state, atomically overwriting the metadata file.
    pub fn save(&self) -> Result<()> {
        let bytes = self.encode();
        let tmp_path = self.meta_path.with_extension("pagemeta.tmp");
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, &self.meta_path)?;
        Ok(())
    }

    /// Allocate a page id: reuse a freed one if available, else mint a new one.
    pub fn allocate(&mut self) -> Result<PageId> {
        let id = if let Some(id) = self.free_list.pop_front() {
            id
        } else {
            let id = self.next_page_id;
            self.next_page_id += 1;
            id
        };

        self.allocated.insert(id);
        self.save()?;
        Ok(PageId::new(id))
    }

    /// Free a page id. Silently ignores ids that aren't currently allocated.
    pub fn free(&mut self, page_id: PageId) -> Result<()> {
        if self.allocated.remove(&page_id.0) {
            self.free_list.push_back(page_id.0);
            self.save()?;
        }
        Ok(())
    }

    pub fn is_allocated(&self, page_id: PageId) -> bool {
        self.allocated.contains(&page_id.0)
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    pub fn next_page_id(&self) -> u32 {
        self.next_page_id
    }
}
