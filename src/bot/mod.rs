//! # Bot Module
//!
//! serenity glue around the playback coordinator.
//!
//! - Slash command registration and dispatch ([`commands`], [`handlers`])
//! - Voice state tracking: involuntary disconnects of the bot and the last
//!   listener leaving its channel are routed into the coordinator
//! - Background maintenance: temp media sweep, expired recovery snapshots and
//!   resolver cache cleanup
//!
//! All playback state lives in [`PlaybackCoordinator`]; this layer only
//! translates Discord events into coordinator calls and replies.

use anyhow::Result;
use chrono::Utc;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::player::PlaybackCoordinator,
    cache::{MusicCache, TempFileSweeper},
    config::Config,
    sources::TrackResolver,
};

/// Handler de eventos de Discord
pub struct GuildPlayerBot {
    config: Arc<Config>,
    player: Arc<PlaybackCoordinator>,
    resolver: Arc<dyn TrackResolver>,
    cache: MusicCache,
    sweeper: TempFileSweeper,
    maintenance_started: AtomicBool,
}

impl GuildPlayerBot {
    pub fn new(
        config: Arc<Config>,
        player: Arc<PlaybackCoordinator>,
        resolver: Arc<dyn TrackResolver>,
        cache: MusicCache,
    ) -> Self {
        let sweeper = TempFileSweeper::new(config.temp_dir.clone(), config.temp_max_age());

        Self {
            config,
            player,
            resolver,
            cache,
            sweeper,
            maintenance_started: AtomicBool::new(false),
        }
    }

    /// Registers slash commands, per guild in development and globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    fn start_maintenance(&self) {
        if self.maintenance_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let player = self.player.clone();
        let cache = self.cache.clone();
        let sweeper = self.sweeper.clone();
        let interval = self.config.cleanup_interval();

        tokio::spawn(async move {
            maintenance_tasks(player, cache, sweeper, interval).await;
        });
    }
}

#[async_trait]
impl EventHandler for GuildPlayerBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        self.start_maintenance();
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error respondiendo comando: {:?}", e);
            }
        }
    }

    /// Detecta desconexiones del bot y canales que quedan sin oyentes
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let bot_id = ctx.cache.current_user().id;

        if new.user_id == bot_id {
            if new.channel_id.is_none() {
                info!("🔌 Bot fuera del canal de voz en guild {}", guild_id);
                if self.player.on_voice_disconnect(guild_id).await {
                    info!("💾 Sesión guardada para /reconnect en guild {}", guild_id);
                }
            }
            return;
        }

        let Some(bot_channel) = self.player.voice_channel(guild_id).await else {
            return;
        };
        let left_bot_channel = old.and_then(|state| state.channel_id) == Some(bot_channel)
            && new.channel_id != Some(bot_channel);
        if !left_bot_channel {
            return;
        }

        match listeners_in(&ctx, guild_id, bot_channel, bot_id) {
            Some(0) => self.player.on_bot_alone(guild_id).await,
            Some(count) => debug!("Quedan {} oyentes en el canal de guild {}", count, guild_id),
            None => warn!("⚠️ Guild {} no encontrada en caché", guild_id),
        }
    }
}

/// Usuarios humanos en un canal de voz según la caché
fn listeners_in(ctx: &Context, guild_id: GuildId, channel_id: ChannelId, bot_id: UserId) -> Option<usize> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    let count = guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id) && state.user_id != bot_id)
        .filter(|state| !state.member.as_ref().is_some_and(|member| member.user.bot))
        .count();

    Some(count)
}

/// Tareas periódicas: temporales, snapshots vencidos y cache de metadatos
async fn maintenance_tasks(
    player: Arc<PlaybackCoordinator>,
    cache: MusicCache,
    sweeper: TempFileSweeper,
    period: std::time::Duration,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        let in_use = player.in_use_file_identifiers().await;
        match sweeper.sweep(&in_use).await {
            Ok(stats) => debug!("Limpieza de {}: {}", sweeper.dir().display(), stats),
            Err(e) => warn!("⚠️ Error limpiando temporales: {:?}", e),
        }

        let purged = player.purge_expired_snapshots(Utc::now()).await;
        if purged > 0 {
            info!("🗑️ {} sesiones guardadas vencidas descartadas", purged);
        }

        cache.cleanup_old_entries();

        info!("🧹 Tareas de mantenimiento completadas");
    }
}
