//! In-process artifact cache
//!
//! Finished export files are parked here under their job id until they are
//! downloaded or their TTL runs out. Expired entries are dropped lazily on
//! read and swept periodically in the background.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<String>,
    expires_at: Instant,
}

/// TTL cache for generated export artifacts, keyed by job id
#[derive(Debug, Clone, Default)]
pub struct ArtifactCache {
    entries: Arc<RwLock<HashMap<Uuid, CacheEntry>>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an artifact, replacing any previous one under the same job id.
    pub async fn put(&self, job_id: Uuid, artifact: String, ttl: Duration) {
        let entry = CacheEntry {
            value: Arc::new(artifact),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(job_id, entry);
    }

    /// Fetch an artifact if it is still live.
    ///
    /// An expired entry is removed on the spot and reported as absent.
    pub async fn get(&self, job_id: Uuid) -> Option<Arc<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(&job_id) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(Arc::clone(&entry.value));
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it under the write lock. Re-check in case a fresh
        // artifact was stored for the same id in between.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(&job_id) {
            if entry.expires_at > Instant::now() {
                return Some(Arc::clone(&entry.value));
            }
            entries.remove(&job_id);
        }
        None
    }

    /// Drop all expired entries. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of live and not-yet-swept entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Spawn a background task sweeping expired entries every `interval`.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = cache.sweep().await;
                if removed > 0 {
                    tracing::debug!(removed, "swept expired export artifacts");
                }
            }
        })
    }
}
