pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::{path::{Path, PathBuf}, time::Duration};

use crate::error::ResolutionError;

pub use ytdlp::YtDlpResolver;

/// Resolución de consultas/URLs a tracks reproducibles.
///
/// Los reintentos con backoff son responsabilidad de cada implementación; el
/// coordinador sólo ve una llamada falible por track.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve una URL o una búsqueda de texto a un único track
    async fn resolve(&self, query: &str, requester: UserId) -> Result<Track, ResolutionError>;

    /// Resuelve hasta `max_tracks` entradas de una playlist.
    ///
    /// Las entradas que no se pueden resolver se cuentan en
    /// [`PlaylistResolution::failed`] en lugar de abortar el lote.
    async fn resolve_playlist(
        &self,
        url: &str,
        max_tracks: usize,
        requester: UserId,
    ) -> Result<PlaylistResolution, ResolutionError>;
}

/// Resultado (posiblemente parcial) de resolver una playlist
#[derive(Debug, Clone, Default)]
pub struct PlaylistResolution {
    pub title: Option<String>,
    pub tracks: Vec<Track>,
    pub failed: usize,
}

/// Un track resuelto y reproducible. Inmutable una vez construido.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    id: String,
    title: String,
    source_url: String,
    stream_url: Option<String>,
    duration_secs: u64,
    uploader: String,
    requester: UserId,
    thumbnail: Option<String>,
    local_file: Option<PathBuf>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source_url: impl Into<String>, requester: UserId) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source_url: source_url.into(),
            stream_url: None,
            duration_secs: 0,
            uploader: "Desconocido".to_string(),
            requester,
            thumbnail: None,
            local_file: None,
        }
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn source_url(&self) -> &str {
        &self.source_url
    }
    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
    pub fn uploader(&self) -> &str {
        &self.uploader
    }
    pub fn requester(&self) -> UserId {
        self.requester
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn local_file(&self) -> Option<&Path> {
        self.local_file.as_deref()
    }

    // Builders
    pub fn with_stream_url(mut self, stream_url: impl Into<String>) -> Self {
        self.stream_url = Some(stream_url.into());
        self
    }

    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = uploader.into();
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_local_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_file = Some(path.into());
        self
    }

    /// Copia del track atribuida a otro usuario (resultados cacheados)
    pub fn requested_by(mut self, requester: UserId) -> Self {
        self.requester = requester;
        self
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "**{}** de **{}**", self.title, self.uploader)
    }
}
