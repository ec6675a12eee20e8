//! Voice channel presence and audio playback.
//!
//! Connection and player bookkeeping lives in
//! [`VoiceManager`](crate::VoiceManager); these operations resolve names,
//! check the target channel and render results.

use super::{failed, no_validation};
use crate::client::{DiscordClient, Outcome, Validate};
use crate::voice::PlayerState;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use tracing::instrument;

/// Loudest volume accepted, in percent.
pub const MAX_VOLUME: u16 = 200;

/// `join_voice_channel`, `leave_voice_channel`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceChannelRef {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Voice or stage channel
    pub channel_id: String,
}

/// `play_audio`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayAudio {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// URL or local path of the audio
    pub audio_url: String,
}

/// `stop_audio`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceGuildRef {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// `set_volume`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVolume {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Percent, 0 to 200
    pub volume: u16,
}

/// `get_voice_connections`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetVoiceConnections {}

impl Validate for SetVolume {
    fn validate(&self) -> GuildResult<()> {
        if self.volume > MAX_VOLUME {
            return Err(GuildError::validation("Volume must be between 0 and 200"));
        }
        Ok(())
    }
}

impl Validate for PlayAudio {
    fn validate(&self) -> GuildResult<()> {
        if self.audio_url.trim().is_empty() {
            return Err(GuildError::validation("audioUrl cannot be empty"));
        }
        Ok(())
    }
}

no_validation!(VoiceChannelRef, VoiceGuildRef, GetVoiceConnections);

impl DiscordClient {
    /// Connect the bot to a voice or stage channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn join_voice_channel(&self, params: &VoiceChannelRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let channel = self
            .guild_channel(guild.id(), &params.channel_id)
            .await?
            .filter(|channel| channel.kind().is_voice_based())
            .ok_or_else(|| GuildError::operation("Voice channel not found by channelId"))?;

        self.voice()
            .join(guild.id(), guild.name(), channel.id(), channel.name())
            .await
            .map_err(failed("join voice channel"))?;
        Ok(Outcome::new(format!(
            "Successfully joined voice channel: {} in {}",
            channel.name(),
            guild.name()
        ))
        .with("channelId", channel.id().as_str()))
    }

    /// Disconnect from voice in a guild and drop its player.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn leave_voice_channel(&self, params: &VoiceChannelRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild_id = self.resolve_guild(params.guild_id.as_deref())?;
        let left = self
            .voice()
            .leave(&guild_id)
            .await
            .map_err(failed("leave voice channel"))?;
        if !left {
            return Err(GuildError::operation(
                "No active voice connection in this server",
            ));
        }
        Ok(Outcome::new("Successfully left voice channel"))
    }

    /// Start playback and wait until it is playing or has failed.
    #[instrument(skip(self, params), fields(audio_url = %params.audio_url))]
    pub async fn play_audio(&self, params: &PlayAudio) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild_id = self.resolve_guild(params.guild_id.as_deref())?;
        if self.voice().session(&guild_id).await.is_none() {
            return Err(GuildError::operation(
                "Bot is not connected to a voice channel in this server",
            ));
        }
        match self.voice().play(&guild_id, &params.audio_url).await {
            Some(PlayerState::Playing) => Ok(Outcome::new(format!(
                "Started playing audio from: {}",
                params.audio_url
            ))),
            Some(PlayerState::Error(message)) => Err(GuildError::operation(format!(
                "Audio playback error: {}",
                message
            ))),
            Some(_) | None => Err(GuildError::operation(
                "Audio player not initialized for this server",
            )),
        }
    }

    /// Stop the guild's player.
    #[instrument(skip(self, params))]
    pub async fn stop_audio(&self, params: &VoiceGuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild_id = self.resolve_guild(params.guild_id.as_deref())?;
        let stopped = self
            .voice()
            .stop(&guild_id)
            .await
            .map_err(failed("stop audio"))?;
        if !stopped {
            return Err(GuildError::operation("No audio player found for this server"));
        }
        Ok(Outcome::new("Audio playback stopped"))
    }

    /// Change the volume of the current track and the ones after it.
    #[instrument(skip(self, params), fields(volume = params.volume))]
    pub async fn set_volume(&self, params: &SetVolume) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild_id = self.resolve_guild(params.guild_id.as_deref())?;
        params.validate()?;
        let applied = self
            .voice()
            .set_volume(&guild_id, params.volume)
            .await
            .map_err(failed("set volume"))?;
        if !applied {
            return Err(GuildError::operation("No audio player found for this server"));
        }
        Ok(
            Outcome::new(format!("Volume set to {}%", params.volume))
                .with("volume", params.volume),
        )
    }

    /// Every voice session this process holds.
    #[instrument(skip(self, _params))]
    pub async fn get_voice_connections(
        &self,
        _params: &GetVoiceConnections,
    ) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let sessions = self.voice().sessions().await;
        if sessions.is_empty() {
            return Ok(Outcome::new("No active voice connections").with("count", 0));
        }
        let lines: Vec<String> = sessions
            .iter()
            .map(|session| {
                format!(
                    "- {}: {} (Status: {})",
                    session.guild_name(),
                    session.channel_name(),
                    session.status()
                )
            })
            .collect();
        Ok(
            Outcome::new(format!("Active voice connections:\n{}", lines.join("\n")))
                .with("count", sessions.len()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::MockRest;
    use crate::testing::{GUILD_ID, RecordingVoiceDriver, VoiceCall, bot_user, script_guild};
    use crate::voice::VoiceManager;
    use std::sync::Arc;

    async fn voice_fixture(
        driver: RecordingVoiceDriver,
    ) -> (DiscordClient, Arc<RecordingVoiceDriver>) {
        let rest = Arc::new(MockRest::new());
        script_guild(&rest);
        let driver = Arc::new(driver);
        let client = DiscordClient::new(rest, Some(GUILD_ID.to_string()))
            .with_voice(VoiceManager::new(driver.clone()));
        client.mark_ready(bot_user()).await;
        (client, driver)
    }

    fn lounge() -> VoiceChannelRef {
        VoiceChannelRef {
            guild_id: None,
            channel_id: "302".to_string(),
        }
    }

    #[tokio::test]
    async fn test_join_then_list_connections() {
        let (client, driver) = voice_fixture(RecordingVoiceDriver::playing()).await;
        let outcome = client.join_voice_channel(&lounge()).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully joined voice channel: Lounge in Test Guild"
        );
        assert_eq!(
            driver.calls(),
            vec![VoiceCall::Connect("100".to_string(), "302".to_string())]
        );

        let listed = client
            .get_voice_connections(&GetVoiceConnections::default())
            .await
            .unwrap();
        assert_eq!(
            listed.text(),
            "Active voice connections:\n- Test Guild: Lounge (Status: ready)"
        );
    }

    #[tokio::test]
    async fn test_join_rejects_text_channel() {
        let (client, driver) = voice_fixture(RecordingVoiceDriver::playing()).await;
        let params = VoiceChannelRef {
            guild_id: None,
            channel_id: "301".to_string(),
        };
        let err = client.join_voice_channel(&params).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Voice channel not found by channelId");
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_play_requires_connection() {
        let (client, _driver) = voice_fixture(RecordingVoiceDriver::playing()).await;
        let params = PlayAudio {
            guild_id: None,
            audio_url: "https://example.com/a.mp3".to_string(),
        };
        let err = client.play_audio(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Bot is not connected to a voice channel in this server"
        );
    }

    #[tokio::test]
    async fn test_play_reports_player_error() {
        let (client, _driver) = voice_fixture(RecordingVoiceDriver::failing("HTTP 404")).await;
        client.join_voice_channel(&lounge()).await.unwrap();
        let params = PlayAudio {
            guild_id: None,
            audio_url: "https://example.com/missing.mp3".to_string(),
        };
        let err = client.play_audio(&params).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Audio playback error: HTTP 404");
    }

    #[tokio::test]
    async fn test_play_volume_and_leave() {
        let (client, driver) = voice_fixture(RecordingVoiceDriver::playing()).await;
        client.join_voice_channel(&lounge()).await.unwrap();

        let volume = SetVolume {
            guild_id: None,
            volume: 150,
        };
        assert_eq!(
            client.set_volume(&volume).await.unwrap().text(),
            "Volume set to 150%"
        );
        let params = PlayAudio {
            guild_id: None,
            audio_url: "https://example.com/a.mp3".to_string(),
        };
        assert_eq!(
            client.play_audio(&params).await.unwrap().text(),
            "Started playing audio from: https://example.com/a.mp3"
        );
        assert!(driver.calls().contains(&VoiceCall::Play(
            "100".to_string(),
            "https://example.com/a.mp3".to_string(),
            150
        )));

        client.leave_voice_channel(&lounge()).await.unwrap();
        assert_eq!(
            driver.calls().last(),
            Some(&VoiceCall::Disconnect("100".to_string()))
        );
        let err = client
            .stop_audio(&VoiceGuildRef { guild_id: None })
            .await
            .unwrap_err();
        assert_eq!(err.kind().to_string(), "No audio player found for this server");
    }

    #[test]
    fn test_volume_range() {
        let params = SetVolume {
            guild_id: None,
            volume: 201,
        };
        assert!(params.validate().is_err());
    }
}
