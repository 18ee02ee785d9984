//! Per-guild inactivity timers.
//!
//! At most one timer is live per guild: arming replaces (and cancels) the
//! previous one. A timer that loses a race with cancellation may still call its
//! `on_fire` closure, so the closure must re-validate the guild state; the id it
//! receives lets it check whether it is still the current timer.

use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct ArmedTimer {
    id: u64,
    token: CancellationToken,
}

pub struct InactivityMonitor {
    timeout: Option<Duration>,
    timers: DashMap<GuildId, ArmedTimer>,
    next_id: AtomicU64,
}

impl InactivityMonitor {
    /// `None` deshabilita el monitor: `arm` nunca programa nada.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            timers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Programa (o reprograma) el timer de la guild.
    ///
    /// Devuelve el id del timer armado, o `None` si el monitor está deshabilitado.
    pub fn arm<F, Fut>(&self, guild_id: GuildId, on_fire: F) -> Option<u64>
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let timeout = self.timeout?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        if let Some(previous) = self.timers.insert(
            guild_id,
            ArmedTimer {
                id,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }

        debug!(
            "⏳ Timer de inactividad #{} armado para guild {} ({})",
            id,
            guild_id,
            humantime::format_duration(timeout)
        );

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Timer de inactividad #{} cancelado", id);
                }
                _ = tokio::time::sleep(timeout) => {
                    on_fire(id).await;
                }
            }
        });

        Some(id)
    }

    /// Cancela el timer de la guild si existe. Idempotente.
    pub fn cancel(&self, guild_id: GuildId) -> bool {
        match self.timers.remove(&guild_id) {
            Some((_, timer)) => {
                timer.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Retira el timer sólo si sigue siendo el `id` indicado.
    /// Un `false` significa que fue cancelado o reemplazado.
    pub fn disarm_if_current(&self, guild_id: GuildId, id: u64) -> bool {
        self.timers
            .remove_if(&guild_id, |_, timer| timer.id == id)
            .is_some()
    }

    pub fn is_armed(&self, guild_id: GuildId) -> bool {
        self.timers.contains_key(&guild_id)
    }
}
