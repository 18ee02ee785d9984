use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub playlist_chunk_size: usize,

    // Tiempos
    pub inactivity_timeout_secs: i64, // <= 0 deshabilita la desconexión automática
    pub recovery_window_secs: u64,
    pub advance_grace_ms: u64,
    pub retry_delay_ms: u64,

    // Resolución
    pub resolve_retries: u32,
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
    pub download_media: bool,

    // Archivos temporales
    pub temp_dir: PathBuf,
    pub temp_max_age_hours: u64,
    pub cleanup_interval_hours: u64,
}

/// Lee una variable de entorno con valor por defecto
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Valor inválido para {}: {}", key, e)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN no está definido"))?,
            application_id: std::env::var("APPLICATION_ID")
                .map_err(|_| anyhow::anyhow!("APPLICATION_ID no está definido"))?
                .parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            default_volume: env_or("DEFAULT_VOLUME", defaults.default_volume)?,
            max_queue_size: env_or("MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            max_playlist_size: env_or("MAX_PLAYLIST_SIZE", defaults.max_playlist_size)?,
            playlist_chunk_size: env_or("PLAYLIST_CHUNK_SIZE", defaults.playlist_chunk_size)?,

            inactivity_timeout_secs: env_or("INACTIVITY_TIMEOUT", defaults.inactivity_timeout_secs)?,
            recovery_window_secs: env_or("RECOVERY_WINDOW", defaults.recovery_window_secs)?,
            advance_grace_ms: env_or("ADVANCE_GRACE_MS", defaults.advance_grace_ms)?,
            retry_delay_ms: env_or("RETRY_DELAY_MS", defaults.retry_delay_ms)?,

            resolve_retries: env_or("RESOLVE_RETRIES", defaults.resolve_retries)?,
            cache_size: env_or("CACHE_SIZE", defaults.cache_size)?,
            cache_ttl_secs: env_or("CACHE_TTL", defaults.cache_ttl_secs)?,
            download_media: env_or("DOWNLOAD_MEDIA", defaults.download_media)?,

            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            temp_max_age_hours: env_or("TEMP_MAX_AGE_HOURS", defaults.temp_max_age_hours)?,
            cleanup_interval_hours: env_or("CLEANUP_INTERVAL_HOURS", defaults.cleanup_interval_hours)?,
        };

        std::fs::create_dir_all(&config.temp_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be in (0.0, 1.0]
    /// - Queue, playlist, chunk and cache sizes must be > 0
    /// - Resolver retries and the recovery window must be > 0
    pub fn validate(&self) -> Result<()> {
        if !(self.default_volume > 0.0 && self.default_volume <= 1.0) {
            anyhow::bail!("El volumen por defecto debe estar en (0, 1], recibido: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("MAX_QUEUE_SIZE debe ser mayor que 0");
        }

        if self.max_playlist_size == 0 || self.playlist_chunk_size == 0 {
            anyhow::bail!("MAX_PLAYLIST_SIZE y PLAYLIST_CHUNK_SIZE deben ser mayores que 0");
        }

        if self.cache_size == 0 {
            anyhow::bail!("CACHE_SIZE debe ser mayor que 0");
        }

        if self.resolve_retries == 0 {
            anyhow::bail!("RESOLVE_RETRIES debe ser al menos 1");
        }

        if self.recovery_window_secs == 0 {
            anyhow::bail!("RECOVERY_WINDOW debe ser mayor que 0");
        }

        Ok(())
    }

    /// `None` cuando la desconexión por inactividad está deshabilitada
    pub fn inactivity_timeout(&self) -> Option<Duration> {
        u64::try_from(self.inactivity_timeout_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn temp_max_age(&self) -> Duration {
        Duration::from_secs(self.temp_max_age_hours * 3600)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_hours.max(1) * 3600)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the token.
    pub fn summary(&self) -> String {
        let inactivity = self
            .inactivity_timeout()
            .map_or("deshabilitada".to_string(), |d| humantime::format_duration(d).to_string());

        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, cola máx {}, playlists de hasta {} ({} por bloque)\n  \
            Tiempos: inactividad {}, recuperación {}\n  \
            Resolver: {} intentos, caché {} entradas / {}s, descargas={}\n  \
            Temporales: {} (máx {}h, limpieza cada {}h)",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.max_playlist_size,
            self.playlist_chunk_size,
            inactivity,
            humantime::format_duration(Duration::from_secs(self.recovery_window_secs)),
            self.resolve_retries,
            self.cache_size,
            self.cache_ttl_secs,
            self.download_media,
            self.temp_dir.display(),
            self.temp_max_age_hours,
            self.cleanup_interval_hours,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,
            max_playlist_size: 100,
            playlist_chunk_size: 25,

            inactivity_timeout_secs: 300, // 5 minutos
            recovery_window_secs: 1800,   // 30 minutos
            advance_grace_ms: 500,
            retry_delay_ms: 1000,

            resolve_retries: 3,
            cache_size: 100,
            cache_ttl_secs: 3600,
            download_media: false,

            temp_dir: "./temp".into(),
            temp_max_age_hours: 24,
            cleanup_interval_hours: 6,
        }
    }
}
