use crate::errors::{CoreError, CoreResult};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Determines the number of threads to use.
/// If `cli_threads` is 0, it uses all available logical cores.
/// Otherwise, it uses the number specified in `cli_threads`.
pub fn get_num_threads(cli_threads: usize) -> usize {
    let num_threads = if cli_threads == 0 {
        num_cpus::get()
    } else {
        cli_threads
    };
    debug!("Using {} threads for processing.", num_threads);
    num_threads
}

/// Initializes the Rayon global thread pool with the specified number of threads.
pub fn initialize_rayon_pool(num_threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;
    Ok(())
}

/// Wraps a long-running build loop with an `indicatif` progress bar sized to
/// `total` units, logging elapsed time on completion. `body` ticks the bar
/// itself (via the `&ProgressBar` it's handed) as it consumes units, and its
/// return value is passed through.
pub fn track_progress_and_resources<T, F>(label: &str, total: u64, body: F) -> Result<T>
where
    F: FnOnce(&ProgressBar) -> Result<T>,
{
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{msg} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message(label.to_string());
    let started = Instant::now();
    let result = body(&pb);
    let suffix = if result.is_ok() { "done" } else { "failed" };
    pb.finish_with_message(format!("{label} {suffix} in {:.2?}", started.elapsed()));
    result
}

/// Fraction of total system memory the CLI defaults a memory budget to when
/// the user does not pass one explicitly.
const DEFAULT_MEMORY_FRACTION: f64 = 0.5;

/// Reads total system memory via `psutil` and returns a budget defaulted to
/// a fraction of it. Library code never calls this itself; only the CLI
/// layer reaches for the environment this way (§5's "no global singletons").
pub fn default_memory_budget_bytes() -> CoreResult<u64> {
    let mem = psutil::memory::virtual_memory()
        .map_err(|e| CoreError::unsupported("utils", "default_memory_budget_bytes", e.to_string()))?;
    Ok((mem.total() as f64 * DEFAULT_MEMORY_FRACTION) as u64)
}

/// A small bounded file-handle cache with LRU eviction, shared by
/// MerStreamFile and KmerCountStore readers so neither is forced to keep
/// every data file it has ever touched open at once (§5).
pub struct FileHandleCache {
    capacity: usize,
    order: VecDeque<PathBuf>,
    handles: std::collections::HashMap<PathBuf, File>,
}

impl FileHandleCache {
    pub fn new(capacity: usize) -> Self {
        FileHandleCache { capacity: capacity.max(1), order: VecDeque::new(), handles: std::collections::HashMap::new() }
    }

    /// Opens (or reuses) the file at `path` for reading, evicting the
    /// least-recently-used handle if the cache is full.
    pub fn open(&mut self, path: &Path) -> CoreResult<&File> {
        if !self.handles.contains_key(path) {
            if self.handles.len() >= self.capacity {
                if let Some(evict) = self.order.pop_front() {
                    self.handles.remove(&evict);
                }
            }
            let file = File::open(path)
                .map_err(|e| CoreError::storage_error("FileHandleCache", "open", e))?;
            self.handles.insert(path.to_path_buf(), file);
        } else {
            self.order.retain(|p| p != path);
        }
        self.order.push_back(path.to_path_buf());
        Ok(self.handles.get(path).expect("just inserted or already present"))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_handle_cache_evicts_lru() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..3 {
            let p = dir.path().join(format!("f{i}.txt"));
            let mut f = File::create(&p).unwrap();
            writeln!(f, "{i}").unwrap();
            paths.push(p);
        }
        let mut cache = FileHandleCache::new(2);
        cache.open(&paths[0]).unwrap();
        cache.open(&paths[1]).unwrap();
        assert_eq!(cache.len(), 2);
        cache.open(&paths[2]).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(!cache.handles.contains_key(&paths[0]));
    }
}
