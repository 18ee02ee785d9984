use async_trait::async_trait;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::debug;

use super::embeds::notification_embed;
use crate::audio::backend::{Notification, Notifier};

/// Publica los avisos del coordinador como embeds en el canal de comandos
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        notification: Notification,
    ) -> anyhow::Result<()> {
        debug!("📨 Aviso para guild {}: {:?}", guild_id, notification);

        channel_id
            .send_message(
                &self.http,
                CreateMessage::new().embed(notification_embed(&notification)),
            )
            .await?;

        Ok(())
    }
}
