//! Gateway event handling.
//!
//! The serenity client marks the [`DiscordClient`] ready and reports when
//! the bot is dropped from voice; everything else goes over REST. Voice
//! signalling itself is handled by songbird, registered on the same client.

use crate::client::{DiscordClient, decode};
use crate::models::User;
use crate::voice::ConnectionStatus;
use async_trait::async_trait;
use guildmaster_error::GuildResult;
use serde_json::json;
use serenity::all::{Context, EventHandler, GatewayIntents, Ready, VoiceState};
use std::sync::Arc;
use tracing::{info, warn};

/// Intents the server subscribes to.
pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::MESSAGE_CONTENT
}

/// serenity event handler bridging the gateway to the client.
#[derive(Debug, Clone)]
pub struct GatewayHandler {
    client: Arc<DiscordClient>,
}

impl GatewayHandler {
    /// Handler marking `client` ready.
    pub fn new(client: Arc<DiscordClient>) -> Self {
        Self { client }
    }
}

/// The bot user in the shape the REST models use.
fn bot_user(ready: &Ready) -> GuildResult<User> {
    let user = &ready.user;
    decode(json!({
        "id": user.id.to_string(),
        "username": user.name,
        "discriminator": user
            .discriminator
            .map_or_else(|| "0".to_string(), |d| format!("{:04}", d.get())),
        "global_name": user.global_name,
        "avatar": user.avatar.as_ref().map(ToString::to_string),
        "bot": user.bot,
    }))
}

#[async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            guilds = ready.guilds.len(),
            session = %ready.session_id,
            "Gateway ready"
        );
        match bot_user(&ready) {
            Ok(user) => self.client.mark_ready(user).await,
            Err(e) => warn!(error = %e, "Could not read bot user from Ready"),
        }
    }

    async fn voice_state_update(&self, _ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let (Some(guild_id), None) = (new.guild_id, new.channel_id) else {
            return;
        };
        if let Ok(me) = self.client.ensure_ready().await
            && *me.id() == new.user_id.to_string()
        {
            info!(guild_id = %guild_id, "Bot left voice");
            self.client
                .voice()
                .set_status(&guild_id.to_string(), ConnectionStatus::Disconnected)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intents_include_voice_states() {
        assert!(gateway_intents().contains(GatewayIntents::GUILD_VOICE_STATES));
        assert!(gateway_intents().contains(GatewayIntents::GUILD_MEMBERS));
    }
}
