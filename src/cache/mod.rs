//! # Cache Module
//!
//! Resolver metadata cache and the temporary media sweep.
//!
//! ## Features
//!
//! - **LRU Eviction**: Automatically removes least recently used items
//! - **TTL Support**: Time-to-live expiration for cache entries
//! - **Thread Safety**: Concurrent access from multiple tasks
//! - **Temp Files**: Periodic removal of old downloaded media that no queue references
//!
//! ## Configuration
//!
//! ```env
//! CACHE_SIZE=100              # Maximum number of metadata entries
//! CACHE_TTL=3600              # Time-to-live in seconds (1 hour)
//! TEMP_MAX_AGE_HOURS=24       # Age after which unused temp files are removed
//! ```

pub mod lru_cache;
pub mod temp_files;

use lru_cache::LRUCache;
use tracing::info;

use crate::sources::{ytdlp::is_url, Track};

pub use temp_files::{SweepStats, TempFileSweeper};

/// Cache de tracks resueltos, indexado por consulta o URL normalizada.
///
/// El `requester` guardado es el del primer usuario; quien lea del cache debe
/// reatribuir el track con [`Track::requested_by`].
pub type MusicCache = LRUCache<String, Track>;

/// Normaliza la clave de una consulta.
/// Las URLs se conservan tal cual: los ids de video distinguen mayúsculas.
pub fn cache_key(query: &str) -> String {
    let query = query.trim();
    if is_url(query) {
        query.to_string()
    } else {
        query.to_lowercase()
    }
}

impl MusicCache {
    /// Performs cache maintenance by removing expired entries.
    pub fn cleanup_old_entries(&self) {
        let removed = self.cleanup_expired();
        if removed > 0 {
            let metrics = self.metrics();
            info!(
                "🧹 Cache cleanup: {} entradas expiradas eliminadas, {} vigentes (hit rate {:.0}%)",
                removed,
                self.len(),
                metrics.hit_rate() * 100.0
            );
        }
    }
}
