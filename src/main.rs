use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod cache;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{
    player::{PlaybackCoordinator, PlayerSettings},
    songbird_backend::SongbirdBackend,
};
use crate::bot::GuildPlayerBot;
use crate::cache::MusicCache;
use crate::config::Config;
use crate::sources::YtDlpResolver;
use crate::ui::ChannelNotifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_player=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Player v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    // Inicializar caché de metadatos
    let cache = MusicCache::new(config.cache_size, Some(config.cache_ttl()));
    let resolver = Arc::new(YtDlpResolver::new(&config, cache.clone()));

    // Voz y audio sobre songbird
    let songbird = Songbird::serenity();
    let backend = Arc::new(SongbirdBackend::new(songbird.clone())?);
    let notifier = Arc::new(ChannelNotifier::new(Arc::new(Http::new(&config.discord_token))));

    let player = PlaybackCoordinator::new(
        PlayerSettings::from_config(&config),
        backend.clone(),
        backend,
        notifier,
    );

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Crear handler del bot
    let handler = GuildPlayerBot::new(config.clone(), player, resolver, cache);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    // Verificar dependencias críticas
    let version = YtDlpResolver::verify_dependencies().await?;
    info!("yt-dlp {}", version);

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
