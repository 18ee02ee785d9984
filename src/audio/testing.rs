//! In-process fakes of the collaborator traits for coordinator tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use super::backend::{
    AudioOutput, CompletionCallback, Notification, Notifier, OutputHandle, VoiceConnection,
    VoiceGateway,
};
use crate::{
    error::{OutputError, VoiceError},
    sources::Track,
};

pub struct FakeConnection {
    channel_id: ChannelId,
    connected: AtomicBool,
    disconnects: AtomicUsize,
}

impl FakeConnection {
    pub fn is_live(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Simula una caída de la conexión que el core no inició
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn is_connected(&self) -> bool {
        self.is_live()
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        self.connected.store(false, Ordering::SeqCst);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeVoice {
    connections: Mutex<HashMap<GuildId, Arc<FakeConnection>>>,
    connects: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeVoice {
    pub fn connection(&self, guild_id: GuildId) -> Option<Arc<FakeConnection>> {
        self.connections.lock().get(&guild_id).cloned()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_next_connect(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceGateway for FakeVoice {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(VoiceError::ConnectFailed("canal lleno".to_string()));
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        let connection = Arc::new(FakeConnection {
            channel_id,
            connected: AtomicBool::new(true),
            disconnects: AtomicUsize::new(0),
        });
        self.connections.lock().insert(guild_id, connection.clone());
        Ok(connection)
    }
}

/// Estado compartido entre el test y el handle entregado al coordinador
pub struct FakeTrackState {
    pub track: Track,
    paused: AtomicBool,
    stopped: AtomicBool,
    volume: Mutex<f32>,
    callback: Mutex<Option<CompletionCallback>>,
}

impl FakeTrackState {
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    fn complete(&self, error: Option<OutputError>) {
        if let Some(callback) = self.callback.lock().take() {
            callback(error);
        }
    }
}

struct FakeHandle(Arc<FakeTrackState>);

impl OutputHandle for FakeHandle {
    fn pause(&self) -> Result<(), OutputError> {
        self.0.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<(), OutputError> {
        self.0.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), OutputError> {
        self.0.stopped.store(true, Ordering::SeqCst);
        self.0.complete(None);
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<(), OutputError> {
        *self.0.volume.lock() = volume;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeOutput {
    attempts: Mutex<Vec<String>>,
    current: Mutex<HashMap<GuildId, Arc<FakeTrackState>>>,
    failures: AtomicUsize,
    broken: AtomicBool,
}

impl FakeOutput {
    /// Cada output abierto desde ahora termina con error
    pub fn break_playback(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Las próximas `n` llamadas a `open` fallan
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Ids de todos los tracks que se intentaron abrir, en orden
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    pub fn current(&self, guild_id: GuildId) -> Option<Arc<FakeTrackState>> {
        self.current.lock().get(&guild_id).cloned()
    }

    /// Termina naturalmente el track actual de la guild
    pub fn finish(&self, guild_id: GuildId) {
        if let Some(state) = self.current(guild_id) {
            state.complete(None);
        }
    }

    pub fn fail_current(&self, guild_id: GuildId, reason: &str) {
        if let Some(state) = self.current(guild_id) {
            state.complete(Some(OutputError::Playback(reason.to_string())));
        }
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn open(
        &self,
        guild_id: GuildId,
        track: &Track,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn OutputHandle>, OutputError> {
        self.attempts.lock().push(track.id().to_string());

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(OutputError::Open(format!("stream no disponible: {}", track.id())));
        }

        let state = Arc::new(FakeTrackState {
            track: track.clone(),
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            volume: Mutex::new(1.0),
            callback: Mutex::new(Some(on_complete)),
        });
        self.current.lock().insert(guild_id, state.clone());
        if self.broken.load(Ordering::SeqCst) {
            state.complete(Some(OutputError::Playback(format!("decoder roto: {}", track.id()))));
        }
        Ok(Box::new(FakeHandle(state)))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(GuildId, Notification)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn count(&self, predicate: impl Fn(&Notification) -> bool) -> usize {
        self.sent.lock().iter().filter(|(_, n)| predicate(n)).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        guild_id: GuildId,
        _channel_id: ChannelId,
        notification: Notification,
    ) -> anyhow::Result<()> {
        self.sent.lock().push((guild_id, notification));
        Ok(())
    }
}
