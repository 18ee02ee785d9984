//! songbird implementation of the voice and audio output traits.
//!
//! songbird keeps one `Call` per guild. Tracks are played with
//! `Call::play_input` (no builtin queue: the coordinator owns ordering) and
//! their `End`/`Error` events feed the completion callback, which fires once.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::JoinError,
    input::{File, HttpRequest, Input, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::backend::{AudioOutput, CompletionCallback, OutputHandle, VoiceConnection, VoiceGateway};
use crate::{
    error::{OutputError, VoiceError},
    sources::Track,
};

pub struct SongbirdBackend {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdBackend {
    pub fn new(manager: Arc<Songbird>) -> anyhow::Result<Self> {
        // Cliente HTTP compartido por todos los inputs de songbird
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self { manager, http })
    }

    /// Archivo descargado, stream directo o extracción perezosa con yt-dlp
    fn input_for(&self, track: &Track) -> Input {
        if let Some(path) = track.local_file() {
            debug!("📁 Reproduciendo archivo local: {}", path.display());
            return File::new(path.to_path_buf()).into();
        }

        if let Some(stream_url) = track.stream_url() {
            return HttpRequest::new(self.http.clone(), stream_url.to_string()).into();
        }

        YoutubeDl::new(self.http.clone(), track.source_url().to_string()).into()
    }
}

#[async_trait]
impl VoiceGateway for SongbirdBackend {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::ConnectFailed(e.to_string()))?;

        if let Err(e) = call.lock().await.deafen(true).await {
            debug!("No se pudo ensordecer al bot: {:?}", e);
        }

        Ok(Arc::new(SongbirdConnection {
            manager: self.manager.clone(),
            guild_id,
            channel_id,
        }))
    }
}

#[async_trait]
impl AudioOutput for SongbirdBackend {
    async fn open(
        &self,
        guild_id: GuildId,
        track: &Track,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn OutputHandle>, OutputError> {
        let call = self.manager.get(guild_id).ok_or(OutputError::NoCall)?;
        let input = self.input_for(track);

        let handle = {
            let mut call = call.lock().await;
            call.play_input(input)
        };

        let notifier = CompletionNotifier {
            callback: Arc::new(Mutex::new(Some(on_complete))),
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            if let Err(e) = handle.add_event(Event::Track(event), notifier.clone()) {
                let _ = handle.stop();
                return Err(OutputError::Open(format!("Error al agregar event handler: {}", e)));
            }
        }

        info!("🎧 Stream abierto para {}", track.title());
        Ok(Box::new(SongbirdHandle(handle)))
    }
}

struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn is_connected(&self) -> bool {
        match self.manager.get(self.guild_id) {
            Some(call) => call.lock().await.current_connection().is_some(),
            None => false,
        }
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        match self.manager.remove(self.guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(VoiceError::DisconnectFailed(e.to_string())),
        }
    }
}

struct SongbirdHandle(TrackHandle);

fn control_error(e: impl std::fmt::Display) -> OutputError {
    OutputError::Control(e.to_string())
}

impl OutputHandle for SongbirdHandle {
    fn pause(&self) -> Result<(), OutputError> {
        self.0.pause().map_err(control_error)
    }

    fn resume(&self) -> Result<(), OutputError> {
        self.0.play().map_err(control_error)
    }

    fn stop(&self) -> Result<(), OutputError> {
        self.0.stop().map_err(control_error)
    }

    fn set_volume(&self, volume: f32) -> Result<(), OutputError> {
        self.0.set_volume(volume).map_err(control_error)
    }
}

/// Entrega el fin del track al coordinador; sólo la primera señal cuenta
#[derive(Clone)]
struct CompletionNotifier {
    callback: Arc<Mutex<Option<CompletionCallback>>>,
}

#[async_trait]
impl VoiceEventHandler for CompletionNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(OutputError::Playback(e.to_string())),
                _ => None,
            }),
            _ => None,
        };

        if let Some(error) = &error {
            warn!("⚠️ Track terminado con error: {}", error);
        }

        let callback = self.callback.lock().take();
        if let Some(callback) = callback {
            callback(error);
        }

        None
    }
}
