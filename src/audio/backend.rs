//! Interfaces the playback core needs from the outside world.
//!
//! The coordinator only talks to voice, audio output and the chat surface
//! through these traits. Production implementations live in
//! [`super::songbird_backend`] and [`crate::ui::notifier`].

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;

use crate::{
    error::{OutputError, VoiceError},
    sources::Track,
};

/// Callback invocado una única vez cuando termina un track (`Some` si terminó con error).
pub type CompletionCallback = Box<dyn FnOnce(Option<OutputError>) + Send + 'static>;

/// Backend que reproduce audio crudo en la conexión de voz de una guild
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Inicia la reproducción de `track`.
    ///
    /// `on_complete` se invoca exactamente una vez cuando el track termina,
    /// falla o se detiene con [`OutputHandle::stop`].
    async fn open(
        &self,
        guild_id: GuildId,
        track: &Track,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn OutputHandle>, OutputError>;
}

/// Control de una reproducción en curso
pub trait OutputHandle: Send + Sync {
    fn pause(&self) -> Result<(), OutputError>;
    fn resume(&self) -> Result<(), OutputError>;
    fn stop(&self) -> Result<(), OutputError>;
    fn set_volume(&self, volume: f32) -> Result<(), OutputError>;
}

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Conecta (o mueve) el bot al canal de voz indicado
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError>;
}

#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel_id(&self) -> ChannelId;
    async fn is_connected(&self) -> bool;
    async fn disconnect(&self) -> Result<(), VoiceError>;
}

/// Avisos asíncronos para el canal de texto de la guild
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NowPlaying { track: Track, volume: f32 },
    QueueEmpty,
    PlaybackFailed { title: String, reason: String },
    InactivityDisconnect,
    RecoveryAvailable { tracks: usize },
}

/// Superficie de notificaciones (fire-and-forget).
///
/// El coordinador registra y descarta los errores devueltos; nunca se propagan.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        notification: Notification,
    ) -> anyhow::Result<()>;
}
