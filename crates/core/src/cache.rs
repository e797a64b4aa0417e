//! Bounded on-disk artifact cache.
//!
//! Downloaded images are stored as normalized PNG files in one flat
//! directory, named by the SHA-256 of their source URL. The cache bounds
//! itself after every write with two passes:
//!
//! 1. **Count**: keep the `max_files` most recently written or read entries.
//! 2. **Size**: while the survivors exceed `max_bytes`, delete oldest first.
//!
//! A deletion failure on one entry is logged and the pass moves on to the
//! next candidate. Passes are serialized by an internal lock so two writers
//! never evict from the same directory listing at once.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use crate::hashing::sha256_hex;

/// Default maximum number of cached files.
pub const DEFAULT_MAX_CACHE_FILES: usize = 1000;

/// Default maximum total cache size in MiB.
pub const DEFAULT_MAX_CACHE_SIZE_MB: u64 = 50;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// File extension of every cache entry.
const ENTRY_EXTENSION: &str = "png";

/// Count and size bounds enforced after every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_files: usize,
    pub max_bytes: u64,
}

impl CacheLimits {
    /// Build limits from a file count and a size budget in MiB.
    pub fn new(max_files: usize, max_size_mb: u64) -> Self {
        Self {
            max_files,
            max_bytes: max_size_mb.saturating_mul(BYTES_PER_MB),
        }
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE_FILES, DEFAULT_MAX_CACHE_SIZE_MB)
    }
}

/// Errors surfaced by cache writes. Reads never fail; a broken entry is a miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to write cache entry {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Outcome of one eviction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Entries deleted by either pass.
    pub removed: usize,
    /// Deletions that failed and were skipped.
    pub failed: usize,
    pub remaining_files: usize,
    pub remaining_bytes: u64,
}

/// File count and byte total of the cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub files: usize,
    pub bytes: u64,
}

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    len: u64,
    modified: SystemTime,
}

/// Content-addressed image store with count and size bounds.
#[derive(Debug)]
pub struct ArtifactCache {
    dir: PathBuf,
    limits: CacheLimits,
    eviction: Mutex<()>,
}

impl ArtifactCache {
    /// Open (and create if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, limits: CacheLimits) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            limits,
            eviction: Mutex::new(()),
        })
    }

    /// Directory backing this cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    /// File name used for `url`. Same URL, same key.
    pub fn key_for(url: &str) -> String {
        format!("{}.{ENTRY_EXTENSION}", sha256_hex(url.as_bytes()))
    }

    fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(Self::key_for(url))
    }

    /// Look up the bytes cached for `url`.
    ///
    /// A hit refreshes the entry's modification time so it ranks as recent
    /// in the next count eviction.
    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.path_for(url);
        match fs::read(&path) {
            Ok(bytes) => {
                touch(&path);
                Some(bytes)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable cache entry, treating as miss");
                None
            }
        }
    }

    /// Store `bytes` for `url`, then run both eviction passes.
    pub fn put(&self, url: &str, bytes: &[u8]) -> Result<EvictionReport, CacheError> {
        let _guard = self.eviction.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.path_for(url);
        fs::write(&path, bytes).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(self.evict_locked())
    }

    /// Run both eviction passes without writing anything.
    pub fn evict(&self) -> EvictionReport {
        let _guard = self.eviction.lock().unwrap_or_else(PoisonError::into_inner);
        self.evict_locked()
    }

    /// Current file count and total size.
    pub fn stats(&self) -> CacheStats {
        match self.list_entries() {
            Ok(entries) => CacheStats {
                files: entries.len(),
                bytes: entries.iter().map(|e| e.len).sum(),
            },
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to list cache directory");
                CacheStats::default()
            }
        }
    }

    fn evict_locked(&self) -> EvictionReport {
        match self.list_entries() {
            Ok(entries) => evict_entries(entries, self.limits),
            Err(e) => {
                tracing::error!(dir = %self.dir.display(), error = %e, "Failed to list cache directory, skipping eviction");
                EvictionReport::default()
            }
        }
    }

    fn list_entries(&self) -> io::Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = match dir_entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable cache directory entry");
                    continue;
                }
            };
            // Entries can vanish between readdir and stat.
            let metadata = match dir_entry.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            };
            if !metadata.is_file() {
                continue;
            }
            entries.push(Entry {
                path: dir_entry.path(),
                len: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }
}

/// Run the count pass, then the size pass, over a directory listing.
///
/// An entry that cannot be deleted (for example one already removed by
/// another process) is logged and counted as failed; the pass continues.
fn evict_entries(mut entries: Vec<Entry>, limits: CacheLimits) -> EvictionReport {
    let mut report = EvictionReport::default();

    // Count pass: newest first, drop everything past the limit.
    entries.sort_by(|a, b| b.modified.cmp(&a.modified));
    if entries.len() > limits.max_files {
        for entry in entries.split_off(limits.max_files) {
            if remove_entry(&entry) {
                report.removed += 1;
            } else {
                report.failed += 1;
            }
        }
    }

    // Size pass: oldest first until back under budget.
    let mut total: u64 = entries.iter().map(|e| e.len).sum();
    let mut remaining = entries.len();
    if total > limits.max_bytes {
        entries.sort_by(|a, b| a.modified.cmp(&b.modified));
        for entry in &entries {
            if total <= limits.max_bytes {
                break;
            }
            if remove_entry(entry) {
                total -= entry.len;
                remaining -= 1;
                report.removed += 1;
            } else {
                report.failed += 1;
            }
        }
    }

    report.remaining_files = remaining;
    report.remaining_bytes = total;

    if report.removed > 0 || report.failed > 0 {
        tracing::debug!(
            removed = report.removed,
            failed = report.failed,
            remaining_files = report.remaining_files,
            remaining_bytes = report.remaining_bytes,
            "Cache eviction pass complete"
        );
    }

    report
}

fn remove_entry(entry: &Entry) -> bool {
    match fs::remove_file(&entry.path) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(path = %entry.path.display(), error = %e, "Error deleting cache file");
            false
        }
    }
}

fn touch(path: &Path) {
    let result = fs::File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));
    if let Err(e) = result {
        tracing::debug!(path = %path.display(), error = %e, "Failed to refresh cache entry mtime");
    }
}
