//! Error taxonomy shared by the playback core and its collaborators.
//!
//! Core operations return [`PlayerError`]; collaborator failures are typed
//! separately so the coordinator can decide what to retry and what to report.

use thiserror::Error;

/// Fallo al resolver un track (metadatos o stream).
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("no se encontraron resultados para `{0}`")]
    NotFound(String),
    #[error("no es una URL de playlist: {0}")]
    NotAPlaylist(String),
    #[error("el resolvedor falló tras {attempts} intentos: {reason}")]
    Exhausted { attempts: u32, reason: String },
    #[error("respuesta inválida del resolvedor: {0}")]
    Malformed(String),
}

/// Fallo del backend de audio al iniciar o continuar una reproducción.
#[derive(Debug, Clone, Error)]
pub enum OutputError {
    #[error("no hay llamada de voz activa para la guild")]
    NoCall,
    #[error("no se pudo abrir el stream: {0}")]
    Open(String),
    #[error("error de control del track: {0}")]
    Control(String),
    #[error("la reproducción falló: {0}")]
    Playback(String),
}

/// Fallo del gateway de voz.
#[derive(Debug, Clone, Error)]
pub enum VoiceError {
    #[error("no se pudo conectar al canal de voz: {0}")]
    ConnectFailed(String),
    #[error("no se pudo desconectar: {0}")]
    DisconnectFailed(String),
}

/// Errores visibles para el usuario de las operaciones del coordinador.
///
/// Ninguna variante deja estado mutado: la operación se rechaza antes de tocar
/// la sesión.
#[derive(Debug, Clone, Error)]
pub enum PlayerError {
    #[error("posición fuera de rango (válido: 1-{len})")]
    OutOfRange { len: usize },
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),
    #[error("la cola está llena (máximo {0} canciones)")]
    QueueFull(usize),
    #[error("no hay suficientes canciones para mezclar")]
    TooFewToShuffle,
    #[error("no estoy conectado a un canal de voz")]
    NotConnected,
    #[error("no se está reproduciendo nada")]
    NotPlaying,
    #[error("la reproducción no está pausada")]
    NotPaused,
    #[error("no hay nada sonando")]
    NothingPlaying,
    #[error("ya estoy conectado a un canal de voz")]
    AlreadyConnected,
    #[error("no hay ninguna sesión guardada")]
    NoSnapshot,
    #[error("la sesión guardada tiene más de {minutes} minutos y no se puede restaurar")]
    SnapshotExpired { minutes: i64 },
    #[error(transparent)]
    Voice(#[from] VoiceError),
    #[error(transparent)]
    Output(#[from] OutputError),
}
