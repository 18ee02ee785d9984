use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use thiserror::Error;
use tracing::{error, info};

use crate::{
    bot::GuildPlayerBot,
    error::{PlayerError, ResolutionError},
    sources::ytdlp::is_playlist_url,
    ui::embeds,
};

/// Errores de uso del comando, antes de llegar al coordinador
#[derive(Debug, Error)]
enum CommandError {
    #[error("este comando sólo funciona dentro de un servidor")]
    NotInGuild,
    #[error("debes estar en un canal de voz")]
    NotInVoice,
    #[error("falta la opción `{0}`")]
    MissingOption(&'static str),
    #[error("`{0}` no es un volumen válido")]
    InvalidVolume(String),
    #[error("necesitas permisos de administrador")]
    NotAdmin,
}

/// Respuesta única de un comando
enum Reply {
    Embed(CreateEmbed),
    Text(String),
    Failure(String),
}

/// Comandos que pueden tardar más que el plazo de respuesta de Discord
fn needs_defer(name: &str) -> bool {
    matches!(name, "play" | "playlist" | "join" | "reconnect" | "cleancache")
}

/// Maneja comandos slash. Cada comando produce exactamente una respuesta.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GuildPlayerBot,
) -> Result<()> {
    info!(
        "📝 Comando /{} usado por {} en guild {:?}",
        command.data.name, command.user.name, command.guild_id
    );

    let deferred = needs_defer(&command.data.name);
    if deferred {
        command.defer(&ctx.http).await?;
    }

    let reply = match run_command(ctx, &command, bot).await {
        Ok(reply) => reply,
        Err(e) => Reply::Failure(describe_error(&e)),
    };

    send_reply(ctx, &command, reply, deferred).await
}

async fn run_command(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildPlayerBot,
) -> Result<Reply> {
    let guild_id = command.guild_id.ok_or(CommandError::NotInGuild)?;

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot, guild_id).await,
        "playlist" => handle_playlist(ctx, command, bot, guild_id).await,
        "pause" => {
            bot.player.pause(guild_id).await?;
            Ok(Reply::Text("⏸️ Reproducción pausada".to_string()))
        }
        "resume" => {
            bot.player.resume(guild_id).await?;
            Ok(Reply::Text("▶️ Reproducción reanudada".to_string()))
        }
        "skip" => {
            let skipped = bot.player.skip(guild_id).await?;
            Ok(Reply::Text(format!("⏭️ Saltando **{}**", skipped.title())))
        }
        "stop" => {
            let cleared = bot.player.stop(guild_id).await?;
            Ok(Reply::Text(format!(
                "⏹️ Reproducción detenida ({} canciones quitadas de la cola)",
                cleared
            )))
        }
        "queue" => {
            let page = integer_option(command, "page").unwrap_or(1).max(1) as usize;
            let snapshot = bot.player.queue_snapshot(guild_id).await;
            Ok(Reply::Embed(embeds::queue_embed(&snapshot, page)))
        }
        "nowplaying" => {
            let snapshot = bot.player.queue_snapshot(guild_id).await;
            let track = snapshot.now_playing.ok_or(PlayerError::NothingPlaying)?;
            Ok(Reply::Embed(embeds::now_playing_embed(&track, snapshot.volume)))
        }
        "clear" => {
            let removed = bot.player.clear(guild_id).await;
            Ok(Reply::Text(format!("🗑️ {} canciones eliminadas de la cola", removed)))
        }
        "remove" => {
            let position = position_option(command, "position")?;
            let removed = bot.player.remove(guild_id, position).await?;
            Ok(Reply::Text(format!("❌ Quitada de la cola: **{}**", removed.title())))
        }
        "move" => {
            let from = position_option(command, "from")?;
            let to = position_option(command, "to")?;
            let moved = bot.player.move_track(guild_id, from, to).await?;
            Ok(Reply::Text(format!("📍 **{}** movida a la posición {}", moved.title(), to)))
        }
        "shuffle" => {
            let count = bot.player.shuffle(guild_id).await?;
            Ok(Reply::Text(format!("🔀 {} canciones mezcladas", count)))
        }
        "repeat" => {
            let mode = bot.player.toggle_repeat(guild_id).await;
            Ok(Reply::Text(format!("🔁 Repetición: **{}**", embeds::repeat_label(mode))))
        }
        "volume" => {
            let raw = string_option(command, "level").ok_or(CommandError::MissingOption("level"))?;
            let percent = parse_volume(raw)?;
            let volume = bot.player.set_volume(guild_id, percent).await?;
            Ok(Reply::Embed(embeds::volume_embed(volume)))
        }
        "join" => {
            let channel_id = user_voice_channel(ctx, guild_id, command.user.id)?;
            bot.player.set_command_channel(guild_id, command.channel_id).await;
            bot.player.join(guild_id, channel_id).await?;
            Ok(Reply::Text(format!("🔊 Conectado a <#{}>", channel_id)))
        }
        "leave" => {
            bot.player.leave(guild_id).await?;
            Ok(Reply::Text("👋 Desconectado del canal de voz".to_string()))
        }
        "reconnect" => handle_reconnect(ctx, command, bot, guild_id).await,
        "cleancache" => handle_cleancache(command, bot).await,
        _ => Ok(Reply::Failure("Comando no reconocido".to_string())),
    }
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildPlayerBot,
    guild_id: GuildId,
) -> Result<Reply> {
    let query = string_option(command, "query").ok_or(CommandError::MissingOption("query"))?;
    let channel_id = user_voice_channel(ctx, guild_id, command.user.id)?;
    ensure_connected(bot, guild_id, channel_id, command.channel_id).await?;

    if is_playlist_url(query) {
        return load_playlist(bot, guild_id, query, command.user.id).await;
    }

    let track = bot.resolver.resolve(query, command.user.id).await?;
    let position = bot.player.enqueue(guild_id, track.clone()).await?;
    bot.player.ensure_playing(guild_id).await;

    Ok(Reply::Embed(embeds::track_added_embed(&track, position)))
}

async fn handle_playlist(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildPlayerBot,
    guild_id: GuildId,
) -> Result<Reply> {
    let url = string_option(command, "url").ok_or(CommandError::MissingOption("url"))?;
    let channel_id = user_voice_channel(ctx, guild_id, command.user.id)?;
    ensure_connected(bot, guild_id, channel_id, command.channel_id).await?;

    load_playlist(bot, guild_id, url, command.user.id).await
}

async fn load_playlist(
    bot: &GuildPlayerBot,
    guild_id: GuildId,
    url: &str,
    requester: UserId,
) -> Result<Reply> {
    let resolution = bot
        .resolver
        .resolve_playlist(url, bot.config.max_playlist_size, requester)
        .await?;

    let mut summary = bot.player.enqueue_batch(guild_id, resolution.tracks).await;
    summary.failed += resolution.failed;
    bot.player.ensure_playing(guild_id).await;

    Ok(Reply::Embed(embeds::playlist_added_embed(
        resolution.title.as_deref(),
        summary,
    )))
}

async fn handle_reconnect(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildPlayerBot,
    guild_id: GuildId,
) -> Result<Reply> {
    let channel_id = user_voice_channel(ctx, guild_id, command.user.id)?;
    bot.player.set_command_channel(guild_id, command.channel_id).await;

    match bot.player.restore(guild_id, channel_id).await {
        Ok(restored) => Ok(Reply::Embed(embeds::success_embed(
            "Sesión Restaurada",
            &format!("Reconectado a <#{}> con **{}** canciones", channel_id, restored),
        ))),
        Err(PlayerError::NoSnapshot) => {
            bot.player.join(guild_id, channel_id).await?;
            Ok(Reply::Text(format!(
                "🔊 Conectado a <#{}>. No había ninguna sesión guardada",
                channel_id
            )))
        }
        Err(e @ PlayerError::SnapshotExpired { .. }) => Ok(Reply::Failure(format!(
            "Conectado a <#{}>, pero {}",
            channel_id, e
        ))),
        Err(e) => Err(e.into()),
    }
}

async fn handle_cleancache(command: &CommandInteraction, bot: &GuildPlayerBot) -> Result<Reply> {
    let is_admin = command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.administrator());
    if !is_admin {
        return Err(CommandError::NotAdmin.into());
    }

    let in_use = bot.player.in_use_file_identifiers().await;
    let stats = bot.sweeper.sweep(&in_use).await?;
    bot.cache.cleanup_old_entries();

    Ok(Reply::Embed(embeds::success_embed(
        "Limpieza Completada",
        &stats.to_string(),
    )))
}

/// Conecta al canal del usuario si el bot no está en ninguno
async fn ensure_connected(
    bot: &GuildPlayerBot,
    guild_id: GuildId,
    voice_channel: ChannelId,
    text_channel: ChannelId,
) -> Result<()> {
    bot.player.set_command_channel(guild_id, text_channel).await;
    if bot.player.voice_channel(guild_id).await.is_none() {
        bot.player.join(guild_id, voice_channel).await?;
    }
    Ok(())
}

async fn send_reply(
    ctx: &Context,
    command: &CommandInteraction,
    reply: Reply,
    deferred: bool,
) -> Result<()> {
    if deferred {
        let edit = match reply {
            Reply::Embed(embed) => EditInteractionResponse::new().embed(embed),
            Reply::Text(text) => EditInteractionResponse::new().content(text),
            Reply::Failure(message) => {
                EditInteractionResponse::new().embed(embeds::error_embed("Error", &message))
            }
        };
        command.edit_response(&ctx.http, edit).await?;
    } else {
        let message = match reply {
            Reply::Embed(embed) => CreateInteractionResponseMessage::new().embed(embed),
            Reply::Text(text) => CreateInteractionResponseMessage::new().content(text),
            Reply::Failure(message) => CreateInteractionResponseMessage::new()
                .embed(embeds::error_embed("Error", &message))
                .ephemeral(true),
        };
        command
            .create_response(&ctx.http, CreateInteractionResponse::Message(message))
            .await?;
    }

    Ok(())
}

/// Mensaje para el usuario; los errores internos sólo se registran
fn describe_error(e: &anyhow::Error) -> String {
    if let Some(e) = e.downcast_ref::<PlayerError>() {
        return capitalize(&e.to_string());
    }
    if let Some(e) = e.downcast_ref::<ResolutionError>() {
        return capitalize(&e.to_string());
    }
    if let Some(e) = e.downcast_ref::<CommandError>() {
        return capitalize(&e.to_string());
    }

    error!("Error manejando comando: {:?}", e);
    "Ocurrió un error inesperado, intenta nuevamente".to_string()
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Acepta `50`, `50.5` y `50,5`
fn parse_volume(raw: &str) -> Result<f32, CommandError> {
    raw.trim()
        .trim_end_matches('%')
        .replace(',', ".")
        .parse::<f32>()
        .map_err(|_| CommandError::InvalidVolume(raw.to_string()))
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn position_option(command: &CommandInteraction, name: &'static str) -> Result<usize> {
    let value = integer_option(command, name).ok_or(CommandError::MissingOption(name))?;
    // las posiciones negativas caen en 0 y el coordinador las rechaza
    Ok(usize::try_from(value).unwrap_or(0))
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(CommandError::NotInVoice)?;

    Ok(channel_id)
}
