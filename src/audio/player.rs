//! Per-guild playback coordinator.
//!
//! Every guild owns one [`GuildSession`] behind its own async mutex; all
//! mutations (commands, completions, inactivity timers, disconnect events) go
//! through that lock, so operations on one guild never interleave while
//! different guilds proceed in parallel.
//!
//! Track completions arrive from the audio backend on its own tasks. They are
//! never handled inline: the completion callback spawns a task that waits a
//! short grace delay and then takes the guild lock. Each output carries a
//! generation number so completions of outputs that were explicitly stopped
//! are recognised and dropped.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::{
    backend::{AudioOutput, CompletionCallback, Notification, Notifier, VoiceGateway},
    inactivity::InactivityMonitor,
    queue::{QueueSnapshot, RepeatMode},
    recovery::{Recovered, RecoverySnapshot, RecoveryStore},
    session::{GuildSession, NextStep, PlaybackState},
};
use crate::{
    config::Config,
    error::{OutputError, PlayerError},
    sources::Track,
};

/// Parámetros del coordinador derivados de la configuración
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub inactivity_timeout: Option<Duration>,
    pub recovery_window: Duration,
    pub advance_grace: Duration,
    pub retry_delay: Duration,
}

impl PlayerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_volume: config.default_volume,
            max_queue_size: config.max_queue_size,
            inactivity_timeout: config.inactivity_timeout(),
            recovery_window: Duration::from_secs(config.recovery_window_secs),
            advance_grace: Duration::from_millis(config.advance_grace_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            max_queue_size: 1000,
            inactivity_timeout: Some(Duration::from_secs(300)),
            recovery_window: Duration::from_secs(30 * 60),
            advance_grace: Duration::from_millis(500),
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Totales de una ingesta por lotes (playlists)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub added: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Resultado de un paso de continuación
enum Advance {
    NotConnected,
    Started(Track),
    Drained,
    Failed { track: Track, error: OutputError },
}

type SessionHandle = Arc<Mutex<GuildSession>>;

/// Reintentos tras un output que terminó con error antes de quedar inactivo
const MAX_OUTPUT_RETRIES: u32 = 1;

pub struct PlaybackCoordinator {
    this: Weak<Self>,
    sessions: DashMap<GuildId, SessionHandle>,
    voice: Arc<dyn VoiceGateway>,
    output: Arc<dyn AudioOutput>,
    notifier: Arc<dyn Notifier>,
    inactivity: InactivityMonitor,
    recovery: RecoveryStore,
    settings: PlayerSettings,
}

impl PlaybackCoordinator {
    pub fn new(
        settings: PlayerSettings,
        voice: Arc<dyn VoiceGateway>,
        output: Arc<dyn AudioOutput>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            sessions: DashMap::new(),
            voice,
            output,
            notifier,
            inactivity: InactivityMonitor::new(settings.inactivity_timeout),
            recovery: RecoveryStore::new(settings.recovery_window),
            settings,
        })
    }

    fn session(&self, guild_id: GuildId) -> SessionHandle {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Nueva sesión para guild {}", guild_id);
                Arc::new(Mutex::new(GuildSession::new(
                    guild_id,
                    self.settings.max_queue_size,
                    self.settings.default_volume,
                )))
            })
            .clone()
    }

    fn existing_session(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.get(&guild_id).map(|entry| entry.value().clone())
    }

    /// Canal de texto donde se publican los avisos asíncronos de la guild
    pub async fn set_command_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        let handle = self.session(guild_id);
        handle.lock().await.set_command_channel(channel_id);
    }

    // Cola

    /// Agrega un track a la cola. Devuelve su posición (1-based).
    ///
    /// No inicia la reproducción: el llamador debe invocar
    /// [`Self::ensure_playing`] después.
    pub async fn enqueue(&self, guild_id: GuildId, track: Track) -> Result<usize, PlayerError> {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;
        session.enqueue(track)
    }

    /// Agrega un lote descartando URLs repetidas (contra la cola y dentro del lote)
    pub async fn enqueue_batch(&self, guild_id: GuildId, tracks: Vec<Track>) -> IngestSummary {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;

        let mut seen: HashSet<String> = session
            .queued_iter()
            .map(|track| track.source_url().to_string())
            .collect();
        let mut summary = IngestSummary::default();

        for track in tracks {
            if !seen.insert(track.source_url().to_string()) {
                summary.duplicates += 1;
                continue;
            }
            match session.enqueue(track) {
                Ok(_) => summary.added += 1,
                Err(e) => {
                    debug!("Track rechazado en lote: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "📋 Lote en guild {}: {} agregadas, {} duplicadas, {} fallidas",
            guild_id, summary.added, summary.duplicates, summary.failed
        );
        summary
    }

    pub async fn clear(&self, guild_id: GuildId) -> usize {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;
        session.clear()
    }

    pub async fn remove(&self, guild_id: GuildId, index: usize) -> Result<Track, PlayerError> {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;
        session.remove_at(index)
    }

    pub async fn move_track(&self, guild_id: GuildId, from: usize, to: usize) -> Result<Track, PlayerError> {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;
        session.move_at(from, to)
    }

    pub async fn shuffle(&self, guild_id: GuildId) -> Result<usize, PlayerError> {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;
        session.shuffle()
    }

    pub async fn toggle_repeat(&self, guild_id: GuildId) -> RepeatMode {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;
        session.toggle_repeat()
    }

    /// Ajusta el volumen (1-100 %). Devuelve el valor interno aplicado.
    pub async fn set_volume(&self, guild_id: GuildId, percent: f32) -> Result<f32, PlayerError> {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;
        session.set_volume(percent)
    }

    pub async fn queue_snapshot(&self, guild_id: GuildId) -> QueueSnapshot {
        let handle = self.session(guild_id);
        let session = handle.lock().await;
        session.snapshot()
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<Track> {
        let handle = self.existing_session(guild_id)?;
        let session = handle.lock().await;
        session.now_playing().cloned()
    }

    pub async fn state(&self, guild_id: GuildId) -> PlaybackState {
        match self.existing_session(guild_id) {
            Some(handle) => handle.lock().await.state(),
            None => PlaybackState::Idle,
        }
    }

    /// Canal de voz al que está conectado el bot, si la conexión sigue viva
    pub async fn voice_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let handle = self.existing_session(guild_id)?;
        let session = handle.lock().await;
        let channel_id = session.connection()?.channel_id();
        session.is_connected().await.then_some(channel_id)
    }

    // Reproducción

    /// Inicia la reproducción si la guild está inactiva y hay algo en cola
    pub async fn ensure_playing(&self, guild_id: GuildId) -> Option<Track> {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;
        if !session.is_idle() || session.queue_len() == 0 {
            return None;
        }
        session.reset_failures();
        self.continue_playback(&handle, session).await
    }

    /// Paso de continuación explícito: detiene lo que suene y pasa al siguiente
    pub async fn advance_playback(&self, guild_id: GuildId) -> Option<Track> {
        let handle = self.session(guild_id);
        let session = handle.lock().await;
        self.continue_playback(&handle, session).await
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        let handle = self.existing_session(guild_id).ok_or(PlayerError::NotPlaying)?;
        let mut session = handle.lock().await;
        if !session.is_connected().await {
            return Err(PlayerError::NotPlaying);
        }
        session.pause()?;
        info!("⏸️ Reproducción pausada en guild {}", guild_id);
        Ok(())
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        let handle = self.existing_session(guild_id).ok_or(PlayerError::NotConnected)?;
        let mut session = handle.lock().await;
        if !session.is_connected().await {
            return Err(PlayerError::NotConnected);
        }
        session.resume()?;
        info!("▶️ Reproducción reanudada en guild {}", guild_id);
        Ok(())
    }

    /// Detiene el track actual; su completion dispara la continuación.
    /// Devuelve el track saltado.
    pub async fn skip(&self, guild_id: GuildId) -> Result<Track, PlayerError> {
        let handle = self.existing_session(guild_id).ok_or(PlayerError::NotConnected)?;
        let session = handle.lock().await;
        if !session.is_connected().await {
            return Err(PlayerError::NotConnected);
        }
        let current = session.now_playing().cloned().ok_or(PlayerError::NothingPlaying)?;
        session.stop_output()?;
        info!("⏭️ Saltando: {}", current.title());
        Ok(current)
    }

    /// Vacía la cola y detiene el output. Devuelve cuántos tracks se quitaron de la cola.
    pub async fn stop(&self, guild_id: GuildId) -> Result<usize, PlayerError> {
        let handle = self.existing_session(guild_id).ok_or(PlayerError::NotConnected)?;
        let mut session = handle.lock().await;
        if !session.is_connected().await {
            return Err(PlayerError::NotConnected);
        }
        let cleared = session.reset_playback();
        info!("⏹️ Reproducción detenida en guild {}", guild_id);
        self.arm_inactivity(guild_id);
        Ok(cleared)
    }

    // Conexión

    /// Conecta (o mueve) el bot a un canal de voz sin restaurar nada.
    /// Un snapshot pendiente se descarta.
    pub async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlayerError> {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;

        let connection = self.voice.connect(guild_id, channel_id).await?;
        session.set_connection(connection);
        self.recovery.discard(guild_id);
        info!("🔊 Conectado al canal {} en guild {}", channel_id, guild_id);

        if session.is_idle() {
            self.arm_inactivity(guild_id);
        }
        Ok(())
    }

    /// Desconexión explícita: destruye la sesión de la guild
    pub async fn leave(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        let handle = self.existing_session(guild_id).ok_or(PlayerError::NotConnected)?;
        let mut session = handle.lock().await;
        let connection = session.take_connection().ok_or(PlayerError::NotConnected)?;

        self.inactivity.cancel(guild_id);
        self.recovery.discard(guild_id);
        session.reset_playback();
        self.sessions.remove_if(&guild_id, |_, current| Arc::ptr_eq(current, &handle));

        connection.disconnect().await?;
        info!("👋 Desconectado de guild {}", guild_id);
        Ok(())
    }

    /// El bot salió del canal de voz (evento del gateway).
    ///
    /// Si la sesión todavía tenía conexión, la salida no la inició el core:
    /// se guarda un snapshot y se avisa. Devuelve `true` si hay algo recuperable.
    pub async fn on_voice_disconnect(&self, guild_id: GuildId) -> bool {
        let Some(handle) = self.existing_session(guild_id) else {
            return false;
        };
        let mut session = handle.lock().await;

        let Some(connection) = session.take_connection() else {
            debug!("Salida de voz esperada en guild {}", guild_id);
            return false;
        };

        warn!("⚠️ Desconexión involuntaria en guild {}", guild_id);
        self.inactivity.cancel(guild_id);

        let snapshot = RecoverySnapshot {
            now_playing: session.now_playing().cloned(),
            queue: session.queued(),
            voice_channel: connection.channel_id(),
            saved_at: Utc::now(),
        };
        session.reset_playback();

        if let Err(e) = connection.disconnect().await {
            debug!("Limpieza de la conexión caída en guild {}: {}", guild_id, e);
        }

        if snapshot.is_empty() {
            return false;
        }

        let tracks = snapshot.track_count();
        self.recovery.save(guild_id, snapshot);
        self.notify(&session, Notification::RecoveryAvailable { tracks }).await;
        true
    }

    /// El último usuario humano dejó el canal del bot
    pub async fn on_bot_alone(&self, guild_id: GuildId) {
        let Some(handle) = self.existing_session(guild_id) else {
            return;
        };
        let session = handle.lock().await;
        if session.connection().is_some() {
            info!("👤 Bot solo en el canal de voz de guild {}", guild_id);
            self.arm_inactivity(guild_id);
        }
    }

    pub fn has_recovery(&self, guild_id: GuildId) -> bool {
        self.recovery.contains(guild_id)
    }

    pub fn recovery_snapshot(&self, guild_id: GuildId) -> Option<RecoverySnapshot> {
        self.recovery.get(guild_id)
    }

    /// Reconecta y restaura la sesión guardada. Devuelve cuántos tracks se restauraron.
    pub async fn restore(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<usize, PlayerError> {
        self.restore_at(guild_id, channel_id, Utc::now()).await
    }

    pub async fn restore_at(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<usize, PlayerError> {
        let handle = self.session(guild_id);
        let mut session = handle.lock().await;

        if session.is_connected().await {
            return Err(PlayerError::AlreadyConnected);
        }

        let snapshot = match self.recovery.take_at(guild_id, now) {
            None => return Err(PlayerError::NoSnapshot),
            Some(Recovered::Expired) => {
                let connection = self.voice.connect(guild_id, channel_id).await?;
                session.set_connection(connection);
                if session.is_idle() {
                    self.arm_inactivity(guild_id);
                }
                return Err(PlayerError::SnapshotExpired {
                    minutes: (self.recovery.window().as_secs() / 60) as i64,
                });
            }
            Some(Recovered::Fresh(snapshot)) => snapshot,
        };

        let connection = match self.voice.connect(guild_id, channel_id).await {
            Ok(connection) => connection,
            Err(e) => {
                self.recovery.put_back(guild_id, snapshot);
                return Err(e.into());
            }
        };
        session.set_connection(connection);
        session.halt_output();

        let restored = session.restore_queue(snapshot.now_playing, snapshot.queue);
        info!("♻️ Sesión restaurada en guild {}: {} canciones", guild_id, restored);

        if restored > 0 {
            self.continue_playback(&handle, session).await;
        } else {
            self.arm_inactivity(guild_id);
        }
        Ok(restored)
    }

    // Mantenimiento

    /// Archivos locales que la limpieza de temporales no debe borrar
    pub async fn in_use_file_identifiers(&self) -> HashSet<PathBuf> {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut files = HashSet::new();
        for handle in handles {
            handle.lock().await.collect_in_use_files(&mut files);
        }
        self.recovery.collect_in_use_files(&mut files);
        files
    }

    /// Descarta snapshots vencidos y las sesiones que sólo existían por ellos
    pub async fn purge_expired_snapshots(&self, now: DateTime<Utc>) -> usize {
        let expired = self.recovery.purge_expired(now);

        for guild_id in &expired {
            let Some(handle) = self.existing_session(*guild_id) else {
                continue;
            };
            let session = handle.lock().await;
            if session.connection().is_none() && session.is_idle() && session.queue_len() == 0 {
                self.sessions
                    .remove_if(guild_id, |_, current| Arc::ptr_eq(current, &handle));
                debug!("Sesión de guild {} destruida", guild_id);
            }
        }
        expired.len()
    }

    // Continuación

    /// Corre un paso de continuación con un único reintento acotado.
    ///
    /// Consume el guard: el reintento suelta el lock mientras espera.
    async fn continue_playback(
        &self,
        handle: &SessionHandle,
        mut session: MutexGuard<'_, GuildSession>,
    ) -> Option<Track> {
        let (track, error) = match self.advance_locked(&mut session).await {
            Advance::Started(track) => return Some(track),
            Advance::NotConnected => return None,
            Advance::Drained => {
                self.on_drained(&session).await;
                return None;
            }
            Advance::Failed { track, error } => (track, error),
        };

        if session.queue_len() == 0 {
            self.on_playback_failed(&session, &track, &error).await;
            return None;
        }

        let generation = session.generation();
        drop(session);
        tokio::time::sleep(self.settings.retry_delay).await;
        let mut session = handle.lock().await;

        if !session.is_idle() {
            debug!("Reintento omitido: guild {} ya está reproduciendo", session.guild_id());
            return None;
        }
        if session.generation() != generation || session.queue_len() == 0 {
            debug!("Reintento omitido: la cola de guild {} cambió durante la espera", session.guild_id());
            return None;
        }

        match self.advance_locked(&mut session).await {
            Advance::Started(track) => Some(track),
            Advance::NotConnected => None,
            Advance::Drained => {
                self.on_drained(&session).await;
                None
            }
            Advance::Failed { track, error } => {
                self.on_playback_failed(&session, &track, &error).await;
                None
            }
        }
    }

    async fn advance_locked(&self, session: &mut GuildSession) -> Advance {
        let guild_id = session.guild_id();

        if !session.is_connected().await {
            debug!("Guild {} sin conexión de voz, nada que reproducir", guild_id);
            return Advance::NotConnected;
        }

        session.halt_output();

        let track = match session.prepare_next() {
            NextStep::Play(track) => track,
            NextStep::Drained => return Advance::Drained,
        };

        let generation = session.next_generation();
        let on_complete = self.completion_callback(guild_id, generation);

        match self.output.open(guild_id, &track, on_complete).await {
            Ok(output) => {
                if let Err(e) = output.set_volume(session.volume()) {
                    warn!("🔊 No se pudo aplicar el volumen: {}", e);
                }
                session.install_output(generation, output);
                self.inactivity.cancel(guild_id);

                info!("🎵 Reproduciendo en guild {}: {}", guild_id, track.title());
                let volume = session.volume();
                self.notify(
                    session,
                    Notification::NowPlaying {
                        track: track.clone(),
                        volume,
                    },
                )
                .await;
                Advance::Started(track)
            }
            Err(error) => {
                error!("❌ No se pudo iniciar {}: {}", track.title(), error);
                session.abandon_now_playing();
                Advance::Failed { track, error }
            }
        }
    }

    fn completion_callback(&self, guild_id: GuildId, generation: u64) -> CompletionCallback {
        let this = self.this.clone();
        let grace = self.settings.advance_grace;
        let runtime = tokio::runtime::Handle::current();

        Box::new(move |error| {
            runtime.spawn(async move {
                tokio::time::sleep(grace).await;
                if let Some(coordinator) = this.upgrade() {
                    coordinator.on_track_end(guild_id, generation, error).await;
                }
            });
        })
    }

    async fn on_track_end(&self, guild_id: GuildId, generation: u64, error: Option<OutputError>) {
        let Some(handle) = self.existing_session(guild_id) else {
            return;
        };
        let mut session = handle.lock().await;

        if !session.finish_output(generation) {
            debug!("Completion obsoleta #{} ignorada en guild {}", generation, guild_id);
            return;
        }

        let Some(error) = error else {
            session.reset_failures();
            self.continue_playback(&handle, session).await;
            return;
        };

        // el track con error no se repite aunque esté activo el modo Track
        let failed = session.abandon_now_playing();
        let failures = session.record_failure();
        let title = failed.as_ref().map(Track::title).unwrap_or_default();
        error!("❌ La reproducción de {} terminó con error: {}", title, error);

        if failures > MAX_OUTPUT_RETRIES || !session.has_next() {
            warn!("🛑 Guild {} sin reintentos tras {} fallos seguidos", guild_id, failures);
            self.notify(
                &session,
                Notification::PlaybackFailed {
                    title: title.to_string(),
                    reason: error.to_string(),
                },
            )
            .await;
            self.arm_inactivity(guild_id);
            return;
        }

        self.continue_playback(&handle, session).await;
    }

    async fn on_drained(&self, session: &GuildSession) {
        info!("📭 Cola vacía en guild {}", session.guild_id());
        self.notify(session, Notification::QueueEmpty).await;
        self.arm_inactivity(session.guild_id());
    }

    async fn on_playback_failed(&self, session: &GuildSession, track: &Track, error: &OutputError) {
        self.notify(
            session,
            Notification::PlaybackFailed {
                title: track.title().to_string(),
                reason: error.to_string(),
            },
        )
        .await;
        self.arm_inactivity(session.guild_id());
    }

    fn arm_inactivity(&self, guild_id: GuildId) {
        let this = self.this.clone();
        self.inactivity.arm(guild_id, move |timer_id| async move {
            if let Some(coordinator) = this.upgrade() {
                coordinator.on_inactivity_timeout(guild_id, timer_id).await;
            }
        });
    }

    async fn on_inactivity_timeout(&self, guild_id: GuildId, timer_id: u64) {
        let Some(handle) = self.existing_session(guild_id) else {
            return;
        };
        let mut session = handle.lock().await;

        if !self.inactivity.disarm_if_current(guild_id, timer_id) {
            debug!("Timer de inactividad #{} obsoleto en guild {}", timer_id, guild_id);
            return;
        }
        if !session.is_idle() || !session.is_connected().await {
            debug!("Guild {} activa otra vez, no se desconecta", guild_id);
            return;
        }
        let Some(connection) = session.take_connection() else {
            return;
        };

        if let Err(e) = connection.disconnect().await {
            warn!("⚠️ Error al desconectar por inactividad en guild {}: {}", guild_id, e);
        }
        session.reset_playback();
        info!("💤 Desconectado por inactividad de guild {}", guild_id);
        self.notify(&session, Notification::InactivityDisconnect).await;
    }

    async fn notify(&self, session: &GuildSession, notification: Notification) {
        let Some(channel_id) = session.command_channel() else {
            debug!("Guild {} sin canal de comandos, aviso descartado", session.guild_id());
            return;
        };
        if let Err(e) = self
            .notifier
            .notify(session.guild_id(), channel_id, notification)
            .await
        {
            warn!("⚠️ No se pudo notificar en guild {}: {:?}", session.guild_id(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        backend::MockNotifier,
        testing::{FakeOutput, FakeVoice, RecordingNotifier},
    };
    use futures::future::join_all;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    const GUILD: GuildId = GuildId::new(1);
    const VOICE: ChannelId = ChannelId::new(10);
    const TEXT: ChannelId = ChannelId::new(20);

    struct Harness {
        coordinator: Arc<PlaybackCoordinator>,
        voice: Arc<FakeVoice>,
        output: Arc<FakeOutput>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        async fn new() -> Self {
            let voice = Arc::new(FakeVoice::default());
            let output = Arc::new(FakeOutput::default());
            let notifier = Arc::new(RecordingNotifier::default());
            let coordinator = PlaybackCoordinator::new(
                PlayerSettings::default(),
                voice.clone(),
                output.clone(),
                notifier.clone(),
            );
            coordinator.set_command_channel(GUILD, TEXT).await;
            Self {
                coordinator,
                voice,
                output,
                notifier,
            }
        }

        async fn connected() -> Self {
            let harness = Self::new().await;
            harness.coordinator.join(GUILD, VOICE).await.unwrap();
            harness
        }

        async fn enqueue_all(&self, ids: &[&str]) {
            for id in ids {
                self.coordinator.enqueue(GUILD, track(id)).await.unwrap();
            }
        }

        async fn now_playing_id(&self) -> Option<String> {
            self.coordinator
                .now_playing(GUILD)
                .await
                .map(|t| t.id().to_string())
        }

        async fn queued_ids(&self) -> Vec<String> {
            self.coordinator
                .queue_snapshot(GUILD)
                .await
                .items
                .iter()
                .map(|t| t.id().to_string())
                .collect()
        }

        /// Termina el track actual y deja correr la continuación
        async fn finish_current(&self) {
            self.output.finish(GUILD);
            settle().await;
        }
    }

    fn track(id: &str) -> Track {
        Track::new(id, format!("Track {id}"), format!("https://example.com/{id}"), UserId::new(1))
            .with_duration_secs(180)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_playing_starts_the_head_of_the_queue() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b"]).await;

        let started = h.coordinator.ensure_playing(GUILD).await;

        assert_eq!(started.map(|t| t.id().to_string()), Some("a".to_string()));
        assert_eq!(h.queued_ids().await, vec!["b"]);
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Playing);
        assert!(!h.coordinator.inactivity.is_armed(GUILD));
        assert_eq!(
            h.notifier.sent(),
            vec![Notification::NowPlaying {
                track: track("a"),
                volume: 0.5
            }]
        );

        // ya está sonando: no vuelve a abrir nada
        assert_eq!(h.coordinator.ensure_playing(GUILD).await, None);
        assert_eq!(h.output.attempts(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn completions_drain_the_queue_in_order() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b", "c"]).await;
        h.coordinator.ensure_playing(GUILD).await;

        h.finish_current().await;
        assert_eq!(h.now_playing_id().await.as_deref(), Some("b"));
        h.finish_current().await;
        assert_eq!(h.now_playing_id().await.as_deref(), Some("c"));
        h.finish_current().await;

        assert_eq!(h.now_playing_id().await, None);
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Idle);
        assert_eq!(h.output.attempts(), vec!["a", "b", "c"]);
        assert_eq!(h.notifier.count(|n| *n == Notification::QueueEmpty), 1);
        assert!(h.coordinator.inactivity.is_armed(GUILD));
    }

    #[tokio::test(start_paused = true)]
    async fn advance_on_empty_queue_is_idempotent() {
        let h = Harness::connected().await;

        assert_eq!(h.coordinator.advance_playback(GUILD).await, None);
        assert_eq!(h.coordinator.advance_playback(GUILD).await, None);

        assert_eq!(h.now_playing_id().await, None);
        assert!(h.queued_ids().await.is_empty());
        assert!(h.output.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn track_repeat_replays_the_same_track() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a"]).await;
        assert_eq!(h.coordinator.toggle_repeat(GUILD).await, RepeatMode::Track);
        h.coordinator.ensure_playing(GUILD).await;

        for _ in 0..3 {
            h.finish_current().await;
            assert_eq!(h.now_playing_id().await.as_deref(), Some("a"));
        }
        assert_eq!(h.output.attempts(), vec!["a", "a", "a", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_repeat_replays_history_in_original_order() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b", "c"]).await;
        h.coordinator.toggle_repeat(GUILD).await;
        assert_eq!(h.coordinator.toggle_repeat(GUILD).await, RepeatMode::Queue);
        h.coordinator.ensure_playing(GUILD).await;

        h.finish_current().await;
        h.finish_current().await;
        assert_eq!(h.now_playing_id().await.as_deref(), Some("c"));

        h.finish_current().await;
        assert_eq!(h.now_playing_id().await.as_deref(), Some("a"));
        assert_eq!(h.queued_ids().await, vec!["b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_advances_through_the_completion() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b"]).await;
        h.coordinator.ensure_playing(GUILD).await;

        let skipped = h.coordinator.skip(GUILD).await.unwrap();
        assert_eq!(skipped.id(), "a");
        settle().await;

        assert_eq!(h.now_playing_id().await.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_without_a_track_fails() {
        let h = Harness::new().await;
        assert!(matches!(h.coordinator.skip(GUILD).await, Err(PlayerError::NotConnected)));

        h.coordinator.join(GUILD, VOICE).await.unwrap();
        assert!(matches!(h.coordinator.skip(GUILD).await, Err(PlayerError::NothingPlaying)));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ignores_the_stopped_track_completion() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b"]).await;
        h.coordinator.ensure_playing(GUILD).await;
        let first = h.output.current(GUILD).unwrap();

        assert_eq!(h.coordinator.stop(GUILD).await.unwrap(), 1);
        assert!(first.is_stopped());
        assert_eq!(h.now_playing_id().await, None);
        assert!(h.coordinator.inactivity.is_armed(GUILD));

        h.enqueue_all(&["c"]).await;
        h.coordinator.ensure_playing(GUILD).await;
        settle().await;

        // la completion de "a" llega tarde y no debe saltar "c"
        assert_eq!(h.now_playing_id().await.as_deref(), Some("c"));
        assert_eq!(h.output.attempts(), vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_requires_a_connection() {
        let h = Harness::new().await;
        assert!(matches!(h.coordinator.stop(GUILD).await, Err(PlayerError::NotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_follow_the_state_machine() {
        let h = Harness::new().await;
        assert!(matches!(h.coordinator.pause(GUILD).await, Err(PlayerError::NotPlaying)));
        assert!(matches!(h.coordinator.resume(GUILD).await, Err(PlayerError::NotConnected)));

        h.coordinator.join(GUILD, VOICE).await.unwrap();
        assert!(matches!(h.coordinator.pause(GUILD).await, Err(PlayerError::NotPlaying)));

        h.enqueue_all(&["a"]).await;
        h.coordinator.ensure_playing(GUILD).await;
        let output = h.output.current(GUILD).unwrap();

        assert!(matches!(h.coordinator.resume(GUILD).await, Err(PlayerError::NotPaused)));
        h.coordinator.pause(GUILD).await.unwrap();
        assert!(output.is_paused());
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Paused);
        assert!(matches!(h.coordinator.pause(GUILD).await, Err(PlayerError::NotPlaying)));

        h.coordinator.resume(GUILD).await.unwrap();
        assert!(!output.is_paused());
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn volume_applies_to_current_and_next_outputs() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b"]).await;
        h.coordinator.ensure_playing(GUILD).await;
        assert_eq!(h.output.current(GUILD).unwrap().volume(), 0.5);

        assert_eq!(h.coordinator.set_volume(GUILD, 30.0).await.unwrap(), 0.3);
        assert_eq!(h.output.current(GUILD).unwrap().volume(), 0.3);

        h.finish_current().await;
        assert_eq!(h.output.current(GUILD).unwrap().volume(), 0.3);
        assert!(matches!(
            h.coordinator.set_volume(GUILD, 0.0).await,
            Err(PlayerError::InvalidArgument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn open_failure_retries_once_with_the_next_track() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b"]).await;
        h.output.fail_next(1);

        let started = h.coordinator.ensure_playing(GUILD).await;

        assert_eq!(started.map(|t| t.id().to_string()), Some("b".to_string()));
        assert_eq!(h.output.attempts(), vec!["a", "b"]);
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn second_open_failure_leaves_the_guild_idle() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b", "c"]).await;
        h.output.fail_next(2);

        assert_eq!(h.coordinator.ensure_playing(GUILD).await, None);

        assert_eq!(h.output.attempts(), vec!["a", "b"]);
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Idle);
        assert_eq!(h.now_playing_id().await, None);
        assert_eq!(h.queued_ids().await, vec!["c"]);
        assert_eq!(
            h.notifier.count(|n| matches!(n, Notification::PlaybackFailed { .. })),
            1
        );
        assert!(h.coordinator.inactivity.is_armed(GUILD));
    }

    #[tokio::test(start_paused = true)]
    async fn open_failure_with_nothing_left_reports_immediately() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a"]).await;
        h.output.fail_next(1);

        assert_eq!(h.coordinator.ensure_playing(GUILD).await, None);
        assert_eq!(h.output.attempts(), vec!["a"]);
        assert_eq!(
            h.notifier.sent(),
            vec![Notification::PlaybackFailed {
                title: "Track a".to_string(),
                reason: OutputError::Open("stream no disponible: a".to_string()).to_string(),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn playback_error_moves_on_to_the_next_track() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b"]).await;
        h.coordinator.ensure_playing(GUILD).await;

        h.output.fail_current(GUILD, "conexión reiniciada");
        settle().await;

        // el reintento es silencioso: sólo se avisa si también falla
        assert_eq!(h.now_playing_id().await.as_deref(), Some("b"));
        assert_eq!(
            h.notifier.count(|n| matches!(n, Notification::PlaybackFailed { .. })),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn broken_output_under_track_repeat_does_not_loop() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a"]).await;
        assert_eq!(h.coordinator.toggle_repeat(GUILD).await, RepeatMode::Track);
        h.output.break_playback();

        h.coordinator.ensure_playing(GUILD).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;

        assert_eq!(h.output.attempts(), vec!["a"]);
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Idle);
        assert_eq!(h.now_playing_id().await, None);
        assert_eq!(
            h.notifier.count(|n| matches!(n, Notification::PlaybackFailed { .. })),
            1
        );
        assert!(h.coordinator.inactivity.is_armed(GUILD));
    }

    #[tokio::test(start_paused = true)]
    async fn broken_output_under_queue_repeat_stops_after_one_retry() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b", "c"]).await;
        h.coordinator.toggle_repeat(GUILD).await;
        assert_eq!(h.coordinator.toggle_repeat(GUILD).await, RepeatMode::Queue);
        h.output.break_playback();

        h.coordinator.ensure_playing(GUILD).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;

        assert_eq!(h.output.attempts(), vec!["a", "b"]);
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Idle);
        assert_eq!(h.now_playing_id().await, None);
        assert_eq!(
            h.notifier.sent().last(),
            Some(&Notification::PlaybackFailed {
                title: "Track b".to_string(),
                reason: OutputError::Playback("decoder roto: b".to_string()).to_string(),
            })
        );
        assert_eq!(
            h.notifier.count(|n| matches!(n, Notification::PlaybackFailed { .. })),
            1
        );
        assert!(h.coordinator.inactivity.is_armed(GUILD));
    }

    #[tokio::test(start_paused = true)]
    async fn broken_single_track_queue_repeat_is_retried_once() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a"]).await;
        h.coordinator.toggle_repeat(GUILD).await;
        h.coordinator.toggle_repeat(GUILD).await;
        h.output.break_playback();

        h.coordinator.ensure_playing(GUILD).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;

        assert_eq!(h.output.attempts(), vec!["a", "a"]);
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Idle);
        assert_eq!(
            h.notifier.count(|n| matches!(n, Notification::PlaybackFailed { .. })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clean_completion_resets_the_failure_count() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b", "c", "d"]).await;
        h.coordinator.ensure_playing(GUILD).await;

        h.output.fail_current(GUILD, "corte");
        settle().await;
        assert_eq!(h.now_playing_id().await.as_deref(), Some("b"));

        h.finish_current().await;
        assert_eq!(h.now_playing_id().await.as_deref(), Some("c"));

        h.output.fail_current(GUILD, "corte");
        settle().await;
        assert_eq!(h.now_playing_id().await.as_deref(), Some("d"));
        assert_eq!(
            h.notifier.count(|n| matches!(n, Notification::PlaybackFailed { .. })),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_retry_wait_cancels_the_retry() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b"]).await;
        h.output.fail_next(1);

        let coordinator = h.coordinator.clone();
        let pending = tokio::spawn(async move { coordinator.ensure_playing(GUILD).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(h.coordinator.stop(GUILD).await.unwrap(), 1);
        assert_eq!(pending.await.unwrap(), None);

        assert_eq!(h.output.attempts(), vec!["a"]);
        assert_eq!(h.notifier.count(|n| *n == Notification::QueueEmpty), 0);
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Idle);
        assert!(h.coordinator.inactivity.is_armed(GUILD));
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_disconnects_an_idle_guild() {
        let h = Harness::connected().await;
        assert!(h.coordinator.inactivity.is_armed(GUILD));

        tokio::time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;

        let connection = h.voice.connection(GUILD).unwrap();
        assert!(!connection.is_live());
        assert_eq!(connection.disconnects(), 1);
        assert_eq!(h.coordinator.voice_channel(GUILD).await, None);
        assert_eq!(h.notifier.sent(), vec![Notification::InactivityDisconnect]);
        // desconexión iniciada por el core: nada que recuperar
        assert!(!h.coordinator.on_voice_disconnect(GUILD).await);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_a_track_cancels_the_pending_timer() {
        let h = Harness::connected().await;
        tokio::time::sleep(Duration::from_secs(200)).await;

        h.enqueue_all(&["a"]).await;
        h.coordinator.ensure_playing(GUILD).await;
        assert!(!h.coordinator.inactivity.is_armed(GUILD));

        tokio::time::sleep(Duration::from_secs(400)).await;
        tokio::task::yield_now().await;

        assert!(h.voice.connection(GUILD).unwrap().is_live());
        assert_eq!(h.now_playing_id().await.as_deref(), Some("a"));
        assert_eq!(h.notifier.count(|n| *n == Notification::InactivityDisconnect), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn alone_timer_does_not_disconnect_while_playing() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a"]).await;
        h.coordinator.ensure_playing(GUILD).await;

        h.coordinator.on_bot_alone(GUILD).await;
        assert!(h.coordinator.inactivity.is_armed(GUILD));

        tokio::time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;

        assert!(h.voice.connection(GUILD).unwrap().is_live());
        assert!(!h.coordinator.inactivity.is_armed(GUILD));
        assert_eq!(h.coordinator.state(GUILD).await, PlaybackState::Playing);
    }

    async fn disconnected_mid_playback() -> Harness {
        let h = Harness::connected().await;
        h.enqueue_all(&["w", "x", "y"]).await;
        h.coordinator.ensure_playing(GUILD).await;

        h.voice.connection(GUILD).unwrap().drop_link();
        assert!(h.coordinator.on_voice_disconnect(GUILD).await);
        h
    }

    #[tokio::test(start_paused = true)]
    async fn involuntary_disconnect_saves_a_snapshot() {
        let h = disconnected_mid_playback().await;

        let snapshot = h.coordinator.recovery_snapshot(GUILD).unwrap();
        assert_eq!(snapshot.now_playing, Some(track("w")));
        assert_eq!(snapshot.queue, vec![track("x"), track("y")]);
        assert_eq!(snapshot.voice_channel, VOICE);

        assert_eq!(h.now_playing_id().await, None);
        assert!(h.queued_ids().await.is_empty());
        assert!(!h.coordinator.inactivity.is_armed(GUILD));
        assert_eq!(
            h.notifier.count(|n| *n == Notification::RecoveryAvailable { tracks: 3 }),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restore_within_window_resumes_from_the_saved_track() {
        let h = disconnected_mid_playback().await;

        let later = Utc::now() + chrono::Duration::minutes(10);
        let restored = h.coordinator.restore_at(GUILD, VOICE, later).await.unwrap();

        assert_eq!(restored, 3);
        assert_eq!(h.now_playing_id().await.as_deref(), Some("w"));
        assert_eq!(h.queued_ids().await, vec!["x", "y"]);
        assert!(!h.coordinator.has_recovery(GUILD));
        assert!(h.voice.connection(GUILD).unwrap().is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn restore_after_window_reconnects_without_restoring() {
        let h = disconnected_mid_playback().await;
        let connects = h.voice.connects();

        let later = Utc::now() + chrono::Duration::minutes(31);
        let result = h.coordinator.restore_at(GUILD, VOICE, later).await;

        assert!(matches!(result, Err(PlayerError::SnapshotExpired { minutes: 30 })));
        assert!(!h.coordinator.has_recovery(GUILD));
        assert_eq!(h.voice.connects(), connects + 1);
        assert_eq!(h.now_playing_id().await, None);
        assert!(h.queued_ids().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restore_preconditions() {
        let h = Harness::new().await;
        assert!(matches!(
            h.coordinator.restore(GUILD, VOICE).await,
            Err(PlayerError::NoSnapshot)
        ));
        assert_eq!(h.voice.connects(), 0);

        h.coordinator.join(GUILD, VOICE).await.unwrap();
        assert!(matches!(
            h.coordinator.restore(GUILD, VOICE).await,
            Err(PlayerError::AlreadyConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reconnect_keeps_the_snapshot() {
        let h = disconnected_mid_playback().await;
        h.voice.fail_next_connect();

        let result = h.coordinator.restore(GUILD, VOICE).await;

        assert!(matches!(result, Err(PlayerError::Voice(_))));
        assert!(h.coordinator.has_recovery(GUILD));
    }

    #[tokio::test(start_paused = true)]
    async fn plain_join_discards_a_pending_snapshot() {
        let h = disconnected_mid_playback().await;
        h.coordinator.join(GUILD, VOICE).await.unwrap();
        assert!(!h.coordinator.has_recovery(GUILD));
    }

    #[tokio::test(start_paused = true)]
    async fn leave_is_not_treated_as_a_drop() {
        let h = Harness::connected().await;
        h.enqueue_all(&["a", "b"]).await;
        h.coordinator.ensure_playing(GUILD).await;

        h.coordinator.leave(GUILD).await.unwrap();
        assert!(!h.coordinator.on_voice_disconnect(GUILD).await);

        assert!(!h.coordinator.has_recovery(GUILD));
        assert!(!h.coordinator.inactivity.is_armed(GUILD));
        assert!(h.output.current(GUILD).unwrap().is_stopped());
        assert_eq!(h.now_playing_id().await, None);
        assert!(matches!(h.coordinator.leave(GUILD).await, Err(PlayerError::NotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_enqueues_keep_every_track() {
        let h = Harness::new().await;

        let results = join_all((0..100).map(|i| {
            let coordinator = h.coordinator.clone();
            async move { coordinator.enqueue(GUILD, track(&i.to_string())).await }
        }))
        .await;

        assert!(results.iter().all(Result::is_ok));
        let mut ids = h.queued_ids().await;
        assert_eq!(ids.len(), 100);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_ingestion_skips_duplicates() {
        let h = Harness::new().await;
        h.enqueue_all(&["a"]).await;

        let summary = h
            .coordinator
            .enqueue_batch(GUILD, vec![track("a"), track("b"), track("b"), track("c")])
            .await;

        assert_eq!(
            summary,
            IngestSummary {
                added: 2,
                duplicates: 2,
                failed: 0
            }
        );
        assert_eq!(h.queued_ids().await, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn in_use_files_cover_sessions_and_snapshots() {
        let h = Harness::connected().await;
        let other = GuildId::new(2);
        h.coordinator
            .enqueue(GUILD, track("a").with_local_file("/tmp/a.webm"))
            .await
            .unwrap();
        h.coordinator
            .enqueue(GUILD, track("b").with_local_file("/tmp/b.webm"))
            .await
            .unwrap();
        h.coordinator
            .enqueue(other, track("c").with_local_file("/tmp/c.webm"))
            .await
            .unwrap();
        h.coordinator.ensure_playing(GUILD).await;

        let files = h.coordinator.in_use_file_identifiers().await;
        assert_eq!(
            files,
            HashSet::from([
                PathBuf::from("/tmp/a.webm"),
                PathBuf::from("/tmp/b.webm"),
                PathBuf::from("/tmp/c.webm"),
            ])
        );

        h.voice.connection(GUILD).unwrap().drop_link();
        h.coordinator.on_voice_disconnect(GUILD).await;
        let files = h.coordinator.in_use_file_identifiers().await;
        assert!(files.contains(&PathBuf::from("/tmp/a.webm")));
        assert!(files.contains(&PathBuf::from("/tmp/b.webm")));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_destroys_sessions_left_without_connection() {
        let h = disconnected_mid_playback().await;

        assert_eq!(h.coordinator.purge_expired_snapshots(Utc::now()).await, 0);
        assert!(h.coordinator.sessions.contains_key(&GUILD));

        let later = Utc::now() + chrono::Duration::minutes(45);
        assert_eq!(h.coordinator.purge_expired_snapshots(later).await, 1);
        assert!(!h.coordinator.sessions.contains_key(&GUILD));
    }

    #[tokio::test(start_paused = true)]
    async fn notifier_failures_do_not_stop_playback() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("canal eliminado")));

        let voice = Arc::new(FakeVoice::default());
        let output = Arc::new(FakeOutput::default());
        let coordinator = PlaybackCoordinator::new(
            PlayerSettings::default(),
            voice,
            output.clone(),
            Arc::new(notifier),
        );
        coordinator.set_command_channel(GUILD, TEXT).await;
        coordinator.join(GUILD, VOICE).await.unwrap();
        coordinator.enqueue(GUILD, track("a")).await.unwrap();

        let started = coordinator.ensure_playing(GUILD).await;

        assert_eq!(started.map(|t| t.id().to_string()), Some("a".to_string()));
        assert_eq!(coordinator.state(GUILD).await, PlaybackState::Playing);
    }
}
