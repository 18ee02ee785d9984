use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{
        backend::Notification,
        player::IngestSummary,
        queue::{QueuePage, QueueSnapshot, RepeatMode},
    },
    sources::Track,
};

/// Canciones por página en `/queue`
pub const QUEUE_PAGE_SIZE: usize = 10;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Player";

fn duration_field(track: &Track) -> String {
    if track.duration_secs() == 0 {
        "🔴 En vivo".to_string()
    } else {
        format_duration(track.duration())
    }
}

/// Embed de la canción actual
pub fn now_playing_embed(track: &Track, volume: f32) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", track.uploader(), true)
        .field("⏱️ Duración", duration_field(track), true)
        .field("🔊 Volumen", format!("{}%", volume_percent(volume)), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requester()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(track.source_url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de canción agregada a la cola
pub fn track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}** se ha agregado a la cola de reproducción", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", track.uploader(), true)
        .field("⏱️ Duración", duration_field(track), true)
        .field("📍 Posición", position.to_string(), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(track.source_url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new("🎵 Se reproducirá automáticamente si no hay música sonando"))
}

/// Resumen de una playlist cargada
pub fn playlist_added_embed(title: Option<&str>, summary: IngestSummary) -> CreateEmbed {
    let description = match summary.added {
        0 => "No se agregó ninguna canción nueva a la cola".to_string(),
        1 => "Se agregó **1 canción** de la playlist a la cola de reproducción".to_string(),
        n => format!("Se agregaron **{} canciones** de la playlist a la cola de reproducción", n),
    };

    let color = if summary.added == 0 {
        colors::WARNING_ORANGE
    } else {
        colors::MUSIC_PURPLE
    };

    CreateEmbed::default()
        .title(format!("📋 {}", title.unwrap_or("Playlist")))
        .description(description)
        .color(color)
        .field("✅ Agregadas", summary.added.to_string(), true)
        .field("🔁 Duplicadas", summary.duplicates.to_string(), true)
        .field("❌ Fallidas", summary.failed.to_string(), true)
        .footer(CreateEmbedFooter::new("🎵 Usa /queue para ver todas las canciones"))
        .timestamp(Timestamp::now())
}

fn repeat_icon(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::Off => "▶️",
        RepeatMode::Track => "🔂",
        RepeatMode::Queue => "🔁",
    }
}

pub fn repeat_label(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::Off => "desactivada",
        RepeatMode::Track => "canción actual",
        RepeatMode::Queue => "toda la cola",
    }
}

/// Líneas numeradas de una página de la cola
fn queue_lines(page: &QueuePage) -> String {
    page.items
        .iter()
        .enumerate()
        .map(|(i, track)| {
            format!(
                "**{}**. {} - {} `[{}]`",
                page.first_position + i,
                track.title(),
                track.uploader(),
                duration_field(track)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Embed de la cola de reproducción (páginas de 1 en adelante)
pub fn queue_embed(snapshot: &QueueSnapshot, page: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.now_playing.is_none() && snapshot.items.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &snapshot.now_playing {
        let status = if snapshot.paused {
            "⏸️"
        } else {
            repeat_icon(snapshot.repeat_mode)
        };
        embed = embed.field(
            format!("{} Reproduciendo", status),
            format!("**{}** - {}", current.title(), current.uploader()),
            false,
        );
    }

    let queue_page = snapshot.page(page, QUEUE_PAGE_SIZE);
    if !queue_page.items.is_empty() {
        embed = embed.field("Próximas canciones", queue_lines(&queue_page), false);
    }

    let mut info = format!("**Total:** {} canciones", queue_page.total_items);
    if snapshot.total_duration > Duration::ZERO {
        info.push_str(&format!(" • **Duración:** {}", format_duration(snapshot.total_duration)));
    }
    info.push_str(&format!(
        " • **Repetición:** {} • **Volumen:** {}%",
        repeat_label(snapshot.repeat_mode),
        volume_percent(snapshot.volume)
    ));
    embed = embed.field("Información", info, false);

    let footer = if queue_page.total_pages > 1 {
        format!(
            "Página {} de {} • Guild Player",
            queue_page.current_page, queue_page.total_pages
        )
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

/// Embed para los avisos asíncronos del coordinador
pub fn notification_embed(notification: &Notification) -> CreateEmbed {
    match notification {
        Notification::NowPlaying { track, volume } => now_playing_embed(track, *volume),
        Notification::QueueEmpty => info_embed(
            "Cola Terminada",
            "Se reprodujeron todas las canciones. Usa `/play` para seguir escuchando.",
        ),
        Notification::PlaybackFailed { title, reason } => error_embed(
            "Error de Reproducción",
            &format!("No se pudo reproducir **{}**\n\n`{}`", title, reason),
        ),
        Notification::InactivityDisconnect => CreateEmbed::default()
            .title("👋 Desconectado por Inactividad")
            .description("No había nada sonando, así que salí del canal de voz.")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now()),
        Notification::RecoveryAvailable { tracks } => CreateEmbed::default()
            .title("⚠️ Desconexión Inesperada")
            .description(format!(
                "Me desconectaron del canal de voz. Guardé **{}** canciones: usa `/reconnect` para continuar donde quedaste.",
                tracks
            ))
            .color(colors::WARNING_ORANGE)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now()),
    }
}

/// Crea un embed de error
pub fn error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de información
pub fn info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de volumen con indicador visual
pub fn volume_embed(volume: f32) -> CreateEmbed {
    let percent = volume_percent(volume);
    let status_emoji = if percent <= 50 { "🔉" } else { "🔊" };

    CreateEmbed::default()
        .title(format!("{} Control de Volumen", status_emoji))
        .description(format!("**Volumen actual: {}%**", percent))
        .field("📊 Nivel", volume_bar(volume), false)
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new("💡 Usa /volume <1-100> para ajustar"))
        .timestamp(Timestamp::now())
}

fn volume_percent(volume: f32) -> u32 {
    (volume * 100.0).round() as u32
}

fn volume_bar(volume: f32) -> String {
    let segments = 20;
    let filled = ((volume.clamp(0.0, 1.0) * segments as f32).round() as usize).min(segments);
    format!("`[{}{}]`", "█".repeat(filled), "▒".repeat(segments - filled))
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
