//! Download progress bookkeeping.
//!
//! The loading pipeline reports per-file progress; the caller sees a single
//! aggregate in `[0, 0.9]`. The remaining tenth is reserved for startup
//! completion, which always reports exactly `1.0`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Caller's progress callback, invoked with a value in `[0, 1]`
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Share of the progress bar covered by downloads
const DOWNLOAD_SHARE: f32 = 0.9;

/// Progress of one downloaded file
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub started_at: DateTime<Utc>,
    pub finished: bool,
    pub length_computable: bool,
    pub loaded: u64,
    pub total: u64,
}

/// Per-file download progress for one instance.
#[derive(Debug, Clone, Default)]
pub struct DownloadProgressMap {
    entries: BTreeMap<String, DownloadProgress>,
}

impl DownloadProgressMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record progress for `id`. `total` is `None` when the server did not
    /// report a content length.
    pub fn update(&mut self, id: &str, loaded: u64, total: Option<u64>, finished: bool) {
        let entry = self
            .entries
            .entry(id.to_string())
            .or_insert_with(|| DownloadProgress {
                started_at: Utc::now(),
                finished: false,
                length_computable: false,
                loaded: 0,
                total: 0,
            });
        entry.loaded = loaded;
        entry.length_computable = total.is_some();
        entry.total = total.unwrap_or(0);
        entry.finished |= finished;
        if entry.finished && entry.length_computable {
            entry.loaded = entry.total;
        }
    }

    pub fn get(&self, id: &str) -> Option<&DownloadProgress> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aggregate progress across all files, scaled into `[0, 0.9]`.
    pub fn aggregate(&self) -> f32 {
        if self.entries.is_empty() {
            return 0.0;
        }

        let all_computable = self.entries.values().all(|e| e.length_computable);
        let fraction = if all_computable {
            let (loaded, total) = self
                .entries
                .values()
                .fold((0u64, 0u64), |(l, t), e| (l + e.loaded, t + e.total));
            if total == 0 {
                0.0
            } else {
                loaded as f64 / total as f64
            }
        } else {
            let finished = self.entries.values().filter(|e| e.finished).count();
            finished as f64 / self.entries.len() as f64
        };

        (DOWNLOAD_SHARE * fraction.clamp(0.0, 1.0) as f32).clamp(0.0, DOWNLOAD_SHARE)
    }
}
