use async_trait::async_trait;
use futures::{stream, StreamExt};
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use serenity::model::id::UserId;
use std::{path::PathBuf, sync::LazyLock, time::Duration};
use tracing::{debug, info, warn};

use super::{PlaylistResolution, Track, TrackResolver};
use crate::{
    cache::{cache_key, MusicCache},
    config::Config,
    error::ResolutionError,
};

/// Entradas de una playlist que se resuelven en paralelo dentro de un bloque
const CONCURRENT_RESOLUTIONS: usize = 4;

static PLAYLIST_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&]list=[\w-]+|/playlist\b|/sets/|/album/)").ok()
});

/// Mensajes de yt-dlp que no mejoran reintentando
const PERMANENT_ERRORS: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video is not available",
    "is not a valid URL",
    "Unsupported URL",
    "members-only",
];

/// Resolvedor basado en `yt-dlp -J`
pub struct YtDlpResolver {
    cache: MusicCache,
    max_attempts: u32,
    base_backoff: Duration,
    chunk_size: usize,
    download_dir: Option<PathBuf>,
}

impl YtDlpResolver {
    pub fn new(config: &Config, cache: MusicCache) -> Self {
        Self {
            cache,
            max_attempts: config.resolve_retries.max(1),
            base_backoff: Duration::from_millis(500),
            chunk_size: config.playlist_chunk_size.max(1),
            download_dir: config.download_media.then(|| config.temp_dir.clone()),
        }
    }

    /// Verifica que yt-dlp esté disponible
    pub async fn verify_dependencies() -> anyhow::Result<String> {
        let output = async_process::Command::new("yt-dlp")
            .arg("--version")
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp no disponible. Instala con: pip install yt-dlp");
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn base_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-J",
            "--quiet",
            "--no-warnings",
            "--socket-timeout",
            "20",
            "--format",
            "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio/best",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(dir) = &self.download_dir {
            args.push("--no-simulate".to_string());
            args.push("--restrict-filenames".to_string());
            args.push("-o".to_string());
            args.push(dir.join("%(extractor)s-%(id)s.%(ext)s").display().to_string());
        }
        args
    }

    async fn run_json(&self, args: &[String]) -> Result<Value, ResolutionError> {
        debug!("yt-dlp {}", args.join(" "));
        let output = async_process::Command::new("yt-dlp")
            .args(args)
            .output()
            .await
            .map_err(|e| ResolutionError::Exhausted {
                attempts: 1,
                reason: format!("no se pudo ejecutar yt-dlp: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let target = args.last().cloned().unwrap_or_default();
            if PERMANENT_ERRORS.iter().any(|needle| stderr.contains(needle)) {
                return Err(ResolutionError::NotFound(target));
            }
            return Err(ResolutionError::Malformed(stderr));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ResolutionError::Malformed(format!("JSON inválido de yt-dlp: {}", e)))
    }

    /// Ejecuta yt-dlp reintentando con backoff exponencial y jitter
    async fn run_with_retries(&self, args: Vec<String>) -> Result<Value, ResolutionError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.run_json(&args).await {
                Ok(value) => return Ok(value),
                Err(ResolutionError::NotFound(target)) => {
                    return Err(ResolutionError::NotFound(target));
                }
                Err(e) => {
                    warn!("⚠️ yt-dlp falló (intento {}/{}): {}", attempt, self.max_attempts, e);
                    last_error = e.to_string();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(backoff_delay(self.base_backoff, attempt)).await;
                    }
                }
            }
        }

        Err(ResolutionError::Exhausted {
            attempts: self.max_attempts,
            reason: last_error,
        })
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requester: UserId) -> Result<Track, ResolutionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolutionError::NotFound(String::new()));
        }

        let key = cache_key(query);
        if let Some(track) = self.cache.get(&key) {
            let usable = track.local_file().map_or(true, |path| path.exists());
            if usable {
                debug!("💾 Cache hit: {}", track.title());
                return Ok(track.requested_by(requester));
            }
        }

        info!("🔍 Resolviendo: {}", query);
        let mut args = self.base_args();
        args.push("--no-playlist".to_string());
        args.push(search_target(query));

        let value = self.run_with_retries(args).await?;
        let track = track_from_json(&value, requester)?;

        self.cache.insert(key, track.clone());
        Ok(track)
    }

    async fn resolve_playlist(
        &self,
        url: &str,
        max_tracks: usize,
        requester: UserId,
    ) -> Result<PlaylistResolution, ResolutionError> {
        if !is_playlist_url(url) {
            return Err(ResolutionError::NotAPlaylist(url.to_string()));
        }

        info!("📋 Obteniendo playlist: {}", url);
        let args = vec![
            "-J".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--flat-playlist".to_string(),
            "--playlist-end".to_string(),
            max_tracks.to_string(),
            url.to_string(),
        ];
        let listing = self.run_with_retries(args).await?;
        let (title, entries) = flat_entries(&listing, max_tracks)?;

        if entries.is_empty() {
            return Err(ResolutionError::NotFound(url.to_string()));
        }

        let total = entries.len();
        let mut resolution = PlaylistResolution {
            title,
            ..Default::default()
        };

        for (index, chunk) in entries.chunks(self.chunk_size).enumerate() {
            let pending: Vec<_> = chunk
                .iter()
                .map(|entry_url| self.resolve(entry_url, requester))
                .collect();
            let results: Vec<Result<Track, ResolutionError>> = stream::iter(pending)
                .buffered(CONCURRENT_RESOLUTIONS)
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(track) => resolution.tracks.push(track),
                    Err(e) => {
                        debug!("Entrada de playlist omitida: {}", e);
                        resolution.failed += 1;
                    }
                }
            }

            debug!(
                "⏳ Playlist: {}/{} entradas procesadas",
                ((index + 1) * self.chunk_size).min(total),
                total
            );
        }

        info!(
            "✅ Playlist resuelta: {} tracks, {} fallidos",
            resolution.tracks.len(),
            resolution.failed
        );
        Ok(resolution)
    }
}

/// Una URL se pasa tal cual; cualquier otra cosa es una búsqueda en YouTube
fn search_target(query: &str) -> String {
    if is_url(query) {
        query.to_string()
    } else {
        format!("ytsearch1:{}", query)
    }
}

pub fn is_url(query: &str) -> bool {
    url::Url::parse(query).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

pub fn is_playlist_url(query: &str) -> bool {
    is_url(query)
        && PLAYLIST_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(query))
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base * 2u32.saturating_pow(attempt.saturating_sub(1));
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
    exponential + jitter
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// Construye un track a partir del JSON de `yt-dlp -J`
fn track_from_json(value: &Value, requester: UserId) -> Result<Track, ResolutionError> {
    // las búsquedas devuelven una "playlist" con los resultados
    let value = match value.get("entries").and_then(Value::as_array) {
        Some(entries) => entries
            .iter()
            .find(|entry| !entry.is_null())
            .ok_or_else(|| {
                ResolutionError::NotFound(str_field(value, &["title", "id"]).unwrap_or_default().to_string())
            })?,
        None => value,
    };

    let id = str_field(value, &["id"])
        .ok_or_else(|| ResolutionError::Malformed("falta el campo id".to_string()))?;
    let source_url = str_field(value, &["webpage_url", "original_url", "url"])
        .ok_or_else(|| ResolutionError::Malformed(format!("sin URL para {}", id)))?;
    let title = str_field(value, &["title", "fulltitle"]).unwrap_or("Sin título");

    let mut track = Track::new(id, title, source_url, requester);

    if let Some(duration) = value.get("duration").and_then(Value::as_f64) {
        track = track.with_duration_secs(duration.max(0.0).round() as u64);
    }
    if let Some(uploader) = str_field(value, &["uploader", "channel", "artist"]) {
        track = track.with_uploader(uploader);
    }
    if let Some(thumbnail) = str_field(value, &["thumbnail"]) {
        track = track.with_thumbnail(thumbnail);
    }

    // enlaces directos a un archivo: se puede pedir el stream por HTTP
    if str_field(value, &["extractor"]) == Some("generic") {
        if let Some(stream) = str_field(value, &["url"]) {
            track = track.with_stream_url(stream);
        }
    }

    let downloaded = value
        .get("requested_downloads")
        .and_then(Value::as_array)
        .and_then(|downloads| downloads.first())
        .and_then(|download| str_field(download, &["filepath", "_filename"]))
        .or_else(|| str_field(value, &["_filename"]));
    if let Some(path) = downloaded {
        track = track.with_local_file(path);
    }

    Ok(track)
}

/// Título y URLs de las entradas de un listado `--flat-playlist`
fn flat_entries(value: &Value, max_tracks: usize) -> Result<(Option<String>, Vec<String>), ResolutionError> {
    let entries = value
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| ResolutionError::NotAPlaylist(str_field(value, &["webpage_url"]).unwrap_or_default().to_string()))?;

    let urls = entries
        .iter()
        .filter_map(|entry| {
            str_field(entry, &["url", "webpage_url"])
                .map(str::to_string)
                .or_else(|| str_field(entry, &["id"]).map(|id| format!("https://www.youtube.com/watch?v={}", id)))
        })
        .take(max_tracks)
        .collect();

    Ok((str_field(value, &["title"]).map(str::to_string), urls))
}
