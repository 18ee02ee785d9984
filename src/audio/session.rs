use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashSet, path::PathBuf, sync::Arc};
use tracing::{debug, info, warn};

use super::{
    backend::{OutputHandle, VoiceConnection},
    queue::{MusicQueue, QueueSnapshot, RepeatMode},
};
use crate::{error::PlayerError, sources::Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Resultado de preparar el siguiente paso de la continuación
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Play(Track),
    Drained,
}

/// Todo el estado de reproducción de una guild.
///
/// Sólo se muta bajo el mutex de la guild que mantiene el coordinador. Se
/// cumple que `now_playing` está presente si y sólo si hay un `output` vivo,
/// salvo dentro del paso de continuación que lo consume.
pub struct GuildSession {
    guild_id: GuildId,
    queue: MusicQueue,
    now_playing: Option<Track>,
    repeat_mode: RepeatMode,
    volume: f32,
    command_channel: Option<ChannelId>,
    connection: Option<Arc<dyn VoiceConnection>>,
    output: Option<Box<dyn OutputHandle>>,
    paused: bool,
    generation: u64,
    failures: u32,
}

impl GuildSession {
    pub fn new(guild_id: GuildId, max_queue_size: usize, default_volume: f32) -> Self {
        Self {
            guild_id,
            queue: MusicQueue::new(max_queue_size),
            now_playing: None,
            repeat_mode: RepeatMode::Off,
            volume: default_volume,
            command_channel: None,
            connection: None,
            output: None,
            paused: false,
            generation: 0,
            failures: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    // Operaciones de cola

    /// Agrega un track a la cola. No toca el estado de reproducción.
    pub fn enqueue(&mut self, track: Track) -> Result<usize, PlayerError> {
        self.queue.push(track)
    }

    pub fn clear(&mut self) -> usize {
        self.queue.clear()
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Track, PlayerError> {
        self.queue.remove_at(index)
    }

    pub fn move_at(&mut self, from: usize, to: usize) -> Result<Track, PlayerError> {
        self.queue.move_at(from, to).cloned()
    }

    pub fn shuffle(&mut self) -> Result<usize, PlayerError> {
        self.queue.shuffle()
    }

    /// Ajusta el volumen a partir de un porcentaje 1-100.
    /// Se aplica de inmediato al output en curso.
    pub fn set_volume(&mut self, percent: f32) -> Result<f32, PlayerError> {
        if !percent.is_finite() || !(1.0..=100.0).contains(&percent) {
            return Err(PlayerError::InvalidArgument(format!(
                "el volumen debe estar entre 1 y 100 (recibido {percent})"
            )));
        }

        self.volume = percent / 100.0;
        if let Some(output) = &self.output {
            if let Err(e) = output.set_volume(self.volume) {
                warn!("🔊 No se pudo aplicar el volumen en guild {}: {}", self.guild_id, e);
            }
        }

        info!("🔊 Volumen de guild {} ajustado a {}%", self.guild_id, percent);
        Ok(self.volume)
    }

    pub fn toggle_repeat(&mut self) -> RepeatMode {
        self.repeat_mode = self.repeat_mode.next();
        match self.repeat_mode {
            RepeatMode::Off => info!("➡️ Repetición desactivada"),
            RepeatMode::Track => info!("🔂 Repetir canción activado"),
            RepeatMode::Queue => info!("🔁 Repetir cola activado"),
        }
        self.repeat_mode
    }

    // Lectura

    pub fn now_playing(&self) -> Option<&Track> {
        self.now_playing.as_ref()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued(&self) -> Vec<Track> {
        self.queue.to_vec()
    }

    pub fn queued_iter(&self) -> impl Iterator<Item = &Track> {
        self.queue.iter()
    }

    pub fn state(&self) -> PlaybackState {
        match (&self.output, self.paused) {
            (None, _) => PlaybackState::Idle,
            (Some(_), true) => PlaybackState::Paused,
            (Some(_), false) => PlaybackState::Playing,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.output.is_none()
    }

    /// Hay algo que la continuación pueda sacar sin repetir el track actual
    pub fn has_next(&self) -> bool {
        !self.queue.is_empty() || (self.repeat_mode == RepeatMode::Queue && self.queue.has_history())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn command_channel(&self) -> Option<ChannelId> {
        self.command_channel
    }

    pub fn set_command_channel(&mut self, channel_id: ChannelId) {
        self.command_channel = Some(channel_id);
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let current = self.now_playing.as_ref().map(Track::duration).unwrap_or_default();
        QueueSnapshot {
            now_playing: self.now_playing.clone(),
            items: self.queue.to_vec(),
            repeat_mode: self.repeat_mode,
            volume: self.volume,
            paused: self.paused,
            total_duration: self.queue.total_duration() + current,
        }
    }

    /// Archivos locales referenciados por el track actual y la cola
    pub fn collect_in_use_files(&self, into: &mut HashSet<PathBuf>) {
        into.extend(
            self.now_playing
                .iter()
                .chain(self.queue.iter())
                .filter_map(|track| track.local_file().map(|p| p.to_path_buf())),
        );
    }

    // Conexión de voz

    pub fn connection(&self) -> Option<&Arc<dyn VoiceConnection>> {
        self.connection.as_ref()
    }

    pub fn set_connection(&mut self, connection: Arc<dyn VoiceConnection>) {
        self.connection = Some(connection);
    }

    pub fn take_connection(&mut self) -> Option<Arc<dyn VoiceConnection>> {
        self.connection.take()
    }

    pub async fn is_connected(&self) -> bool {
        match &self.connection {
            Some(connection) => connection.is_connected().await,
            None => false,
        }
    }

    // Control del output (sólo el coordinador)

    pub fn pause(&mut self) -> Result<(), PlayerError> {
        match (&self.output, self.paused) {
            (Some(output), false) => {
                output.pause()?;
                self.paused = true;
                Ok(())
            }
            _ => Err(PlayerError::NotPlaying),
        }
    }

    pub fn resume(&mut self) -> Result<(), PlayerError> {
        match (&self.output, self.paused) {
            (Some(output), true) => {
                output.resume()?;
                self.paused = false;
                Ok(())
            }
            _ => Err(PlayerError::NotPaused),
        }
    }

    /// Detiene el output actual sin invalidar su completion (skip)
    pub fn stop_output(&self) -> Result<(), PlayerError> {
        match &self.output {
            Some(output) => Ok(output.stop()?),
            None => Err(PlayerError::NothingPlaying),
        }
    }

    /// Retira el output e invalida su completion pendiente
    pub fn halt_output(&mut self) {
        if let Some(output) = self.output.take() {
            self.generation += 1;
            self.paused = false;
            if let Err(e) = output.stop() {
                debug!("Output de guild {} ya estaba detenido: {}", self.guild_id, e);
            }
        }
    }

    /// Número de generación que debe llevar el próximo output
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn install_output(&mut self, generation: u64, output: Box<dyn OutputHandle>) {
        debug_assert_eq!(generation, self.generation);
        self.output = Some(output);
        self.paused = false;
    }

    /// Marca como terminado el output de `generation`.
    /// Devuelve `false` si la completion es de un output ya reemplazado.
    pub fn finish_output(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.output.is_none() {
            return false;
        }
        self.output = None;
        self.paused = false;
        true
    }

    /// Pasos 2 y 4 de la continuación: repetición y extracción del siguiente track
    pub fn prepare_next(&mut self) -> NextStep {
        if self.queue.is_empty() {
            let refilled = match (self.repeat_mode, &self.now_playing) {
                (RepeatMode::Track, Some(current)) => {
                    info!("🔂 Repitiendo track: {}", current.title());
                    self.queue.push_front(current.clone());
                    true
                }
                (RepeatMode::Queue, _) if self.queue.has_history() => {
                    self.queue.replay_history();
                    true
                }
                _ => false,
            };

            if !refilled {
                self.now_playing = None;
                self.queue.end_epoch();
                return NextStep::Drained;
            }
        }

        match self.queue.pop_front() {
            Some(track) => {
                self.now_playing = Some(track.clone());
                NextStep::Play(track)
            }
            None => {
                self.now_playing = None;
                NextStep::Drained
            }
        }
    }

    /// El track actual no llegó a sonar
    pub fn abandon_now_playing(&mut self) -> Option<Track> {
        self.now_playing.take()
    }

    /// Cuenta un output terminado con error. Devuelve los fallos seguidos.
    pub fn record_failure(&mut self) -> u32 {
        self.failures += 1;
        self.failures
    }

    pub fn reset_failures(&mut self) {
        self.failures = 0;
    }

    /// Borra cola, historia y track actual deteniendo el output.
    /// Cualquier continuación en espera queda invalidada.
    pub fn reset_playback(&mut self) -> usize {
        self.halt_output();
        self.generation += 1;
        self.failures = 0;
        self.now_playing = None;
        self.queue.clear()
    }

    /// Restaura una sesión: el track guardado queda al frente
    pub fn restore_queue(&mut self, now_playing: Option<Track>, queue: Vec<Track>) -> usize {
        let tracks: Vec<Track> = now_playing.into_iter().chain(queue).collect();
        self.queue.restore(tracks);
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(id: &str) -> Track {
        Track::new(id, id.to_uppercase(), format!("https://example.com/{id}"), UserId::new(1))
    }

    fn session() -> GuildSession {
        GuildSession::new(GuildId::new(1), 100, 0.5)
    }

    #[test]
    fn volume_outside_one_to_hundred_is_rejected() {
        let mut session = session();

        assert!(matches!(session.set_volume(0.0), Err(PlayerError::InvalidArgument(_))));
        assert!(matches!(session.set_volume(101.0), Err(PlayerError::InvalidArgument(_))));
        assert!(matches!(session.set_volume(f32::NAN), Err(PlayerError::InvalidArgument(_))));
        assert_eq!(session.volume(), 0.5);

        assert_eq!(session.set_volume(50.0).unwrap(), 0.5);
        assert_eq!(session.set_volume(100.0).unwrap(), 1.0);
        assert_eq!(session.volume(), 1.0);
    }

    #[test]
    fn drained_queue_without_repeat_clears_now_playing() {
        let mut session = session();
        session.enqueue(track("a")).unwrap();

        assert_eq!(session.prepare_next(), NextStep::Play(track("a")));
        assert_eq!(session.now_playing(), Some(&track("a")));

        assert_eq!(session.prepare_next(), NextStep::Drained);
        assert_eq!(session.now_playing(), None);
        assert_eq!(session.prepare_next(), NextStep::Drained);
        assert_eq!(session.queue_len(), 0);
    }

    #[test]
    fn track_repeat_requeues_current_track() {
        let mut session = session();
        session.enqueue(track("a")).unwrap();
        session.toggle_repeat();
        assert_eq!(session.repeat_mode(), RepeatMode::Track);

        for _ in 0..4 {
            assert_eq!(session.prepare_next(), NextStep::Play(track("a")));
            assert_eq!(session.queue_len(), 0);
        }
    }

    #[test]
    fn queue_repeat_replays_history_in_order() {
        let mut session = session();
        for id in ["a", "b", "c"] {
            session.enqueue(track(id)).unwrap();
        }
        session.toggle_repeat();
        session.toggle_repeat();
        assert_eq!(session.repeat_mode(), RepeatMode::Queue);

        for id in ["a", "b", "c"] {
            assert_eq!(session.prepare_next(), NextStep::Play(track(id)));
        }

        assert_eq!(session.prepare_next(), NextStep::Play(track("a")));
        assert_eq!(session.queued(), vec![track("b"), track("c")]);
    }

    #[test]
    fn has_next_ignores_track_repeat_of_the_current_track() {
        let mut session = session();
        session.enqueue(track("a")).unwrap();
        session.toggle_repeat();
        assert_eq!(session.prepare_next(), NextStep::Play(track("a")));

        assert!(!session.has_next());
        session.toggle_repeat();
        assert_eq!(session.repeat_mode(), RepeatMode::Queue);
        assert!(session.has_next());
    }

    #[test]
    fn reset_playback_invalidates_waiting_continuations() {
        let mut session = session();
        session.enqueue(track("a")).unwrap();
        assert_eq!(session.record_failure(), 1);
        assert_eq!(session.record_failure(), 2);
        let before = session.generation();

        assert_eq!(session.reset_playback(), 1);

        assert_ne!(session.generation(), before);
        assert_eq!(session.record_failure(), 1);
        assert!(!session.has_next());
    }

    #[test]
    fn finish_output_ignores_other_generations() {
        let mut session = session();
        assert!(!session.finish_output(0));
        assert_eq!(session.next_generation(), 1);
        assert_eq!(session.next_generation(), 2);
        assert!(!session.finish_output(1));
    }

    #[test]
    fn restore_puts_saved_track_first() {
        let mut session = session();
        let len = session.restore_queue(Some(track("w")), vec![track("x"), track("y")]);

        assert_eq!(len, 3);
        assert_eq!(session.queued(), vec![track("w"), track("x"), track("y")]);
    }

    #[test]
    fn controls_require_an_output() {
        let mut session = session();
        assert!(matches!(session.pause(), Err(PlayerError::NotPlaying)));
        assert!(matches!(session.resume(), Err(PlayerError::NotPaused)));
        assert!(matches!(session.stop_output(), Err(PlayerError::NothingPlaying)));
        assert_eq!(session.state(), PlaybackState::Idle);
    }
}
