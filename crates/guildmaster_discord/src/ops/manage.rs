//! Batched channel management: many channel, category, layout and privacy
//! operations in one call, each attempted independently.

use super::channels::{
    CategoryRef, CreateAnnouncementChannel, CreateCategory, CreateForumChannel,
    CreateStageChannel, CreateTextChannel, CreateVoiceChannel, DeleteChannel, EditChannelAdvanced,
};
use super::layout::{MoveChannelToCategory, SetCategoryPosition, SetChannelPosition};
use super::privacy::{SetCategoryPrivate, SetChannelPrivate};
use super::{de, no_validation};
use crate::client::{DiscordClient, Outcome, Validate};
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use tracing::{info, instrument, warn};

/// One step of `comprehensive_channel_management`. Which fields are
/// required depends on `action`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOperation {
    /// Operation name, e.g. `create_text_channel`
    pub action: String,
    /// Name for creations and renames
    #[serde(default)]
    pub name: Option<String>,
    /// Parent for creations and moves; `null` removes the parent
    #[serde(default, deserialize_with = "de::nullable")]
    pub category_id: Option<Option<String>>,
    /// Channel acted on
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Category acted on
    #[serde(default)]
    pub target_category_id: Option<String>,
    /// Channel topic
    #[serde(default)]
    pub topic: Option<String>,
    /// Seconds between messages per user
    #[serde(default)]
    pub slowmode: Option<i64>,
    /// Voice user limit
    #[serde(default)]
    pub user_limit: Option<i64>,
    /// Voice bitrate
    #[serde(default)]
    pub bitrate: Option<i64>,
    /// Forum default reaction
    #[serde(default)]
    pub default_reaction_emoji: Option<String>,
    /// New position
    #[serde(default)]
    pub position: Option<i64>,
    /// Privacy flag
    #[serde(default)]
    pub is_private: Option<bool>,
    /// Roles granted access
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    /// Members granted access
    #[serde(default)]
    pub allowed_members: Option<Vec<String>>,
    /// Copy the parent's overwrites first
    #[serde(default)]
    pub sync_to_category: Option<bool>,
    /// Apply category privacy to its channels
    #[serde(default)]
    pub apply_to_channels: Option<bool>,
}

/// `comprehensive_channel_management`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveChannelManagement {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Steps, run in order
    pub operations: Vec<ChannelOperation>,
}

no_validation!(ComprehensiveChannelManagement);

fn required<T>(value: Option<T>, message: &str) -> GuildResult<T> {
    value.ok_or_else(|| GuildError::validation(message))
}

/// The parent of a creation; `null` and absent both mean none.
fn parent(op: &ChannelOperation) -> Option<String> {
    op.category_id.clone().flatten()
}

impl DiscordClient {
    async fn run_channel_operation(
        &self,
        guild_id: &str,
        op: &ChannelOperation,
    ) -> GuildResult<Outcome> {
        let guild = Some(guild_id.to_string());
        match op.action.as_str() {
            "create_text_channel" => {
                let params = CreateTextChannel {
                    guild_id: guild,
                    name: op.name.clone().unwrap_or_default(),
                    category_id: parent(op),
                };
                params.validate()?;
                self.create_text_channel(&params).await
            }
            "create_voice_channel" => {
                let params = CreateVoiceChannel {
                    guild_id: guild,
                    name: op.name.clone().unwrap_or_default(),
                    category_id: parent(op),
                    user_limit: op.user_limit,
                    bitrate: op.bitrate,
                };
                params.validate()?;
                self.create_voice_channel(&params).await
            }
            "create_forum_channel" => {
                let params = CreateForumChannel {
                    guild_id: guild,
                    name: op.name.clone().unwrap_or_default(),
                    category_id: parent(op),
                    topic: op.topic.clone(),
                    slowmode: op.slowmode,
                    default_reaction_emoji: op.default_reaction_emoji.clone(),
                    is_private: op.is_private,
                    allowed_roles: op.allowed_roles.clone(),
                };
                params.validate()?;
                self.create_forum_channel(&params).await
            }
            "create_announcement_channel" => {
                let params = CreateAnnouncementChannel {
                    guild_id: guild,
                    name: op.name.clone().unwrap_or_default(),
                    category_id: parent(op),
                    topic: op.topic.clone(),
                    slowmode: op.slowmode,
                    is_private: op.is_private,
                    allowed_roles: op.allowed_roles.clone(),
                };
                params.validate()?;
                self.create_announcement_channel(&params).await
            }
            "create_stage_channel" => {
                let params = CreateStageChannel {
                    guild_id: guild,
                    name: op.name.clone().unwrap_or_default(),
                    category_id: parent(op),
                    topic: op.topic.clone(),
                    bitrate: op.bitrate,
                    is_private: op.is_private,
                    allowed_roles: op.allowed_roles.clone(),
                };
                params.validate()?;
                self.create_stage_channel(&params).await
            }
            "create_category" => {
                let params = CreateCategory {
                    guild_id: guild,
                    name: op.name.clone().unwrap_or_default(),
                };
                params.validate()?;
                self.create_category(&params).await
            }
            "edit_channel_advanced" => {
                let params = EditChannelAdvanced {
                    guild_id: guild,
                    channel_id: required(
                        op.channel_id.clone(),
                        "channelId required for edit_channel_advanced",
                    )?,
                    name: op.name.clone(),
                    topic: op.topic.clone(),
                    slowmode: op.slowmode,
                    user_limit: op.user_limit,
                    bitrate: op.bitrate,
                    is_private: op.is_private,
                    allowed_roles: op.allowed_roles.clone(),
                    category_id: op.category_id.clone(),
                };
                params.validate()?;
                self.edit_channel_advanced(&params).await
            }
            "delete_channel" => {
                let params = DeleteChannel {
                    guild_id: guild,
                    channel_id: required(
                        op.channel_id.clone(),
                        "channelId required for delete_channel",
                    )?,
                };
                params.validate()?;
                self.delete_channel(&params).await
            }
            "delete_category" => {
                let params = CategoryRef {
                    guild_id: guild,
                    category_id: required(
                        op.target_category_id.clone(),
                        "targetCategoryId required for delete_category",
                    )?,
                };
                params.validate()?;
                self.delete_category(&params).await
            }
            "set_channel_position" => {
                let message = "channelId and position required for set_channel_position";
                let params = SetChannelPosition {
                    guild_id: guild,
                    channel_id: required(op.channel_id.clone(), message)?,
                    position: required(op.position, message)?,
                };
                params.validate()?;
                self.set_channel_position(&params).await
            }
            "set_category_position" => {
                let message = "targetCategoryId and position required for set_category_position";
                let params = SetCategoryPosition {
                    guild_id: guild,
                    category_id: required(op.target_category_id.clone(), message)?,
                    position: required(op.position, message)?,
                };
                params.validate()?;
                self.set_category_position(&params).await
            }
            "move_channel_to_category" => {
                let params = MoveChannelToCategory {
                    guild_id: guild,
                    channel_id: required(
                        op.channel_id.clone(),
                        "channelId required for move_channel_to_category",
                    )?,
                    category_id: parent(op),
                };
                params.validate()?;
                self.move_channel_to_category(&params).await
            }
            "set_channel_private" => {
                let message = "channelId and isPrivate required for set_channel_private";
                let params = SetChannelPrivate {
                    guild_id: guild,
                    channel_id: required(op.channel_id.clone(), message)?,
                    is_private: required(op.is_private, message)?,
                    allowed_roles: op.allowed_roles.clone(),
                    allowed_members: op.allowed_members.clone(),
                    sync_to_category: op.sync_to_category,
                };
                params.validate()?;
                self.set_channel_private(&params).await
            }
            "set_category_private" => {
                let message = "targetCategoryId and isPrivate required for set_category_private";
                let params = SetCategoryPrivate {
                    guild_id: guild,
                    category_id: required(op.target_category_id.clone(), message)?,
                    is_private: required(op.is_private, message)?,
                    allowed_roles: op.allowed_roles.clone(),
                    allowed_members: op.allowed_members.clone(),
                    apply_to_channels: op.apply_to_channels,
                };
                params.validate()?;
                self.set_category_private(&params).await
            }
            other => Err(GuildError::validation(format!("Unknown action: {}", other))),
        }
    }

    /// Run a list of channel operations, reporting each one's result.
    ///
    /// A failing step does not stop the ones after it.
    #[instrument(skip(self, params), fields(operations = params.operations.len()))]
    pub async fn comprehensive_channel_management(
        &self,
        params: &ComprehensiveChannelManagement,
    ) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;

        let mut results = Vec::with_capacity(params.operations.len());
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for (index, op) in params.operations.iter().enumerate() {
            let label = format!("Operation {} ({})", index + 1, op.action);
            match self.run_channel_operation(guild.id(), op).await {
                Ok(outcome) => {
                    results.push(format!("✅ {}: {}", label, outcome.text()));
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(operation = %label, error = %e.kind(), "Channel operation failed");
                    results.push(format!("❌ {}: {}", label, e.kind()));
                    failed += 1;
                }
            }
        }
        info!(succeeded, failed, "Channel management batch finished");

        Ok(Outcome::new(format!(
            "Comprehensive Channel Management completed: {} succeeded, {} failed\n\nDetailed Results:\n{}",
            succeeded,
            failed,
            results.join("\n")
        ))
        .with("succeeded", succeeded)
        .with("failed", failed))
    }
}
