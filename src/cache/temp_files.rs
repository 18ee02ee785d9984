use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::fs;
use tracing::{debug, error, info};

const BATCH_SIZE: usize = 20;

/// Resultado de una pasada de limpieza
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub removed: usize,
    pub kept_in_use: usize,
    pub bytes_removed: u64,
    pub errors: usize,
}

impl fmt::Display for SweepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} archivos eliminados ({:.1} MB), {} en uso, {} errores",
            self.removed,
            self.bytes_removed as f64 / (1024.0 * 1024.0),
            self.kept_in_use,
            self.errors
        )
    }
}

/// Limpieza periódica del directorio de descargas temporales
#[derive(Debug, Clone)]
pub struct TempFileSweeper {
    dir: PathBuf,
    max_age: Duration,
}

impl TempFileSweeper {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Borra los archivos más viejos que `max_age` que no estén en `in_use`
    pub async fn sweep(&self, in_use: &HashSet<PathBuf>) -> std::io::Result<SweepStats> {
        let mut stats = SweepStats::default();

        if !fs::try_exists(&self.dir).await? {
            fs::create_dir_all(&self.dir).await?;
            info!("📁 Directorio temporal creado: {}", self.dir.display());
            return Ok(stats);
        }

        let in_use: HashSet<PathBuf> = in_use.iter().map(|p| normalize(p)).collect();
        let now = SystemTime::now();
        let mut candidates = Vec::new();

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    debug!("No se pudo leer {}: {}", path.display(), e);
                    stats.errors += 1;
                    continue;
                }
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= self.max_age {
                continue;
            }

            if in_use.contains(&normalize(&path)) {
                stats.kept_in_use += 1;
                continue;
            }

            candidates.push((path, metadata.len()));
        }

        for batch in candidates.chunks(BATCH_SIZE) {
            for (path, size) in batch {
                match fs::remove_file(path).await {
                    Ok(()) => {
                        stats.removed += 1;
                        stats.bytes_removed += size;
                    }
                    Err(e) => {
                        error!("Error eliminando {}: {}", path.display(), e);
                        stats.errors += 1;
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        if stats.removed > 0 {
            info!("🧹 Limpieza de temporales: {}", stats);
        }
        Ok(stats)
    }
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
