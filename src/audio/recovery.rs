use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashSet, path::PathBuf, time::Duration};
use tracing::{debug, info};

use crate::sources::Track;

/// Estado guardado tras una desconexión involuntaria
#[derive(Debug, Clone, PartialEq)]
pub struct RecoverySnapshot {
    pub now_playing: Option<Track>,
    pub queue: Vec<Track>,
    pub voice_channel: ChannelId,
    pub saved_at: DateTime<Utc>,
}

impl RecoverySnapshot {
    pub fn track_count(&self) -> usize {
        self.queue.len() + usize::from(self.now_playing.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.track_count() == 0
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.saved_at).to_std().unwrap_or_default()
    }
}

/// Resultado de consumir un snapshot
#[derive(Debug)]
pub enum Recovered {
    Fresh(RecoverySnapshot),
    Expired,
}

/// Snapshots pendientes por guild con una ventana de validez fija
pub struct RecoveryStore {
    snapshots: DashMap<GuildId, RecoverySnapshot>,
    window: Duration,
}

impl RecoveryStore {
    pub fn new(window: Duration) -> Self {
        Self {
            snapshots: DashMap::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn save(&self, guild_id: GuildId, snapshot: RecoverySnapshot) {
        info!(
            "💾 Sesión guardada para guild {}: {} canciones",
            guild_id,
            snapshot.track_count()
        );
        self.snapshots.insert(guild_id, snapshot);
    }

    /// Vuelve a guardar un snapshot que no se pudo aplicar
    pub fn put_back(&self, guild_id: GuildId, snapshot: RecoverySnapshot) {
        self.snapshots.insert(guild_id, snapshot);
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.snapshots.contains_key(&guild_id)
    }

    pub fn get(&self, guild_id: GuildId) -> Option<RecoverySnapshot> {
        self.snapshots.get(&guild_id).map(|entry| entry.clone())
    }

    pub fn discard(&self, guild_id: GuildId) -> bool {
        let removed = self.snapshots.remove(&guild_id).is_some();
        if removed {
            debug!("🗑️ Snapshot de guild {} descartado", guild_id);
        }
        removed
    }

    /// Consume el snapshot de la guild, sea válido o no
    pub fn take_at(&self, guild_id: GuildId, now: DateTime<Utc>) -> Option<Recovered> {
        let (_, snapshot) = self.snapshots.remove(&guild_id)?;
        let age = snapshot.age(now);

        if age > self.window {
            info!(
                "⌛ Snapshot de guild {} expirado ({} de antigüedad)",
                guild_id,
                humantime::format_duration(Duration::from_secs(age.as_secs()))
            );
            Some(Recovered::Expired)
        } else {
            Some(Recovered::Fresh(snapshot))
        }
    }

    /// Elimina los snapshots vencidos y devuelve sus guilds
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Vec<GuildId> {
        let expired: Vec<GuildId> = self
            .snapshots
            .iter()
            .filter(|entry| entry.age(now) > self.window)
            .map(|entry| *entry.key())
            .collect();

        for guild_id in &expired {
            self.snapshots.remove(guild_id);
        }

        if !expired.is_empty() {
            info!("🧹 {} snapshots de recuperación expirados eliminados", expired.len());
        }
        expired
    }

    pub fn collect_in_use_files(&self, into: &mut HashSet<PathBuf>) {
        for entry in self.snapshots.iter() {
            into.extend(
                entry
                    .now_playing
                    .iter()
                    .chain(entry.queue.iter())
                    .filter_map(|track| track.local_file().map(|p| p.to_path_buf())),
            );
        }
    }
}
