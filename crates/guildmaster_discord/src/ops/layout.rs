//! Channel and category ordering.
//!
//! Positions are written through the guild's bulk position endpoint, which
//! also carries parent changes, so a reorganisation costs one request per
//! step rather than one per channel.

use super::server::GuildRef;
use super::{de, failed, no_validation};
use crate::client::{DiscordClient, Outcome};
use crate::models::Channel;
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// `set_channel_position`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetChannelPosition {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel to move
    pub channel_id: String,
    /// New position
    pub position: i64,
}

/// One entry of `set_channel_positions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPosition {
    /// Channel to move
    pub channel_id: String,
    /// New position
    pub position: i64,
}

/// `set_channel_positions`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetChannelPositions {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Moves, applied together
    pub channel_positions: Vec<ChannelPosition>,
}

/// `move_channel_to_category`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveChannelToCategory {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel to move
    pub channel_id: String,
    /// New parent; `null` removes the channel from its category
    #[serde(default)]
    pub category_id: Option<String>,
}

/// `set_category_position`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCategoryPosition {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Category to move
    pub category_id: String,
    /// New position
    pub position: i64,
}

/// Category move inside [`Organization`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPlacement {
    /// The category
    pub category_id: String,
    /// New position
    pub position: i64,
}

/// Channel move inside [`Organization`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPlacement {
    /// The channel
    pub channel_id: String,
    /// New position, unchanged when absent
    #[serde(default)]
    pub position: Option<i64>,
    /// New parent: absent keeps it, `null` removes it
    #[serde(default, deserialize_with = "de::nullable")]
    pub category_id: Option<Option<String>>,
}

/// Target layout for `organize_channels`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Categories first
    #[serde(default)]
    pub categories: Vec<CategoryPlacement>,
    /// Then channels
    #[serde(default)]
    pub channels: Vec<ChannelPlacement>,
}

/// `organize_channels`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizeChannels {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The layout to apply
    pub organization: Organization,
}

no_validation!(
    SetChannelPosition,
    SetChannelPositions,
    MoveChannelToCategory,
    SetCategoryPosition,
    OrganizeChannels,
);

/// Threads live under their parent channel and have no position or parent
/// of their own to set.
fn is_arrangeable(channel: &Channel) -> bool {
    !channel.kind().is_thread()
}

fn structure_line(channel: &Channel) -> String {
    format!(
        "  {} {} (ID: {}, Position: {})",
        channel.kind().emoji(),
        channel.name(),
        channel.id(),
        channel.position()
    )
}

impl DiscordClient {
    /// Write positions (and optionally parents) in one request.
    async fn reposition(&self, guild_id: &str, entries: Vec<Value>) -> GuildResult<()> {
        let count = entries.len();
        self.send(
            RestRequest::patch(format!("/guilds/{}/channels", guild_id)).json(Value::Array(entries)),
        )
        .await?;
        info!(guild_id, count, "Channel positions updated");
        Ok(())
    }

    /// Move one channel to a new position.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, position = params.position))]
    pub async fn set_channel_position(&self, params: &SetChannelPosition) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self
            .guild_or(&self.resolve_guild(params.guild_id.as_deref())?, "Guild not found")
            .await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let channel = self
                .guild_channel(guild.id(), &params.channel_id)
                .await?
                .ok_or_else(|| GuildError::operation("Channel not found in this guild"))?;
            if !is_arrangeable(&channel) {
                return Err(GuildError::operation(
                    "Channel type does not support position changes",
                ));
            }
            self.reposition(
                guild.id(),
                vec![json!({ "id": channel.id(), "position": params.position })],
            )
            .await?;
            Ok(Outcome::new(format!(
                "Successfully moved channel \"{}\" to position {}",
                channel.name(),
                params.position
            ))
            .with("channelId", channel.id().as_str()))
        }
        .await;
        result.map_err(failed("set channel position"))
    }

    /// Move several channels in one request.
    #[instrument(skip(self, params), fields(count = params.channel_positions.len()))]
    pub async fn set_channel_positions(&self, params: &SetChannelPositions) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self
            .guild_or(&self.resolve_guild(params.guild_id.as_deref())?, "Guild not found")
            .await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let mut moves = Vec::with_capacity(params.channel_positions.len());
            for entry in &params.channel_positions {
                let channel = self
                    .guild_channel(guild.id(), &entry.channel_id)
                    .await?
                    .ok_or_else(|| {
                        GuildError::operation(format!(
                            "Channel with ID {} not found in this guild",
                            entry.channel_id
                        ))
                    })?;
                moves.push((channel, entry.position));
            }

            self.reposition(
                guild.id(),
                moves
                    .iter()
                    .map(|(channel, position)| json!({ "id": channel.id(), "position": position }))
                    .collect(),
            )
            .await?;

            let changed: Vec<String> = moves
                .iter()
                .map(|(channel, position)| format!("{} to position {}", channel.name(), position))
                .collect();
            Ok(Outcome::new(format!(
                "Successfully updated channel positions: {}",
                changed.join(", ")
            ))
            .with("count", moves.len()))
        }
        .await;
        result.map_err(failed("set channel positions"))
    }

    /// Put a channel under a category, or take it out of one.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn move_channel_to_category(
        &self,
        params: &MoveChannelToCategory,
    ) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self
            .guild_or(&self.resolve_guild(params.guild_id.as_deref())?, "Guild not found")
            .await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let channel = self
                .guild_channel(guild.id(), &params.channel_id)
                .await?
                .ok_or_else(|| GuildError::operation("Channel not found in this guild"))?;
            let category = match params.category_id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => Some(
                    self.category(guild.id(), id, "Category not found or invalid category type")
                        .await?,
                ),
                None => None,
            };
            if !channel.kind().accepts_parent() {
                return Err(GuildError::operation(
                    "Channel type does not support category assignment",
                ));
            }

            self.send(
                RestRequest::patch(format!("/channels/{}", channel.id()))
                    .json(json!({ "parent_id": category.as_ref().map(|c| c.id()) })),
            )
            .await?;

            let action = match &category {
                Some(category) => format!("moved to category \"{}\"", category.name()),
                None => "removed from category".to_string(),
            };
            Ok(Outcome::new(format!(
                "Successfully {} channel \"{}\"",
                action,
                channel.name()
            ))
            .with("channelId", channel.id().as_str()))
        }
        .await;
        result.map_err(failed("move channel to category"))
    }

    /// Move a category to a new position.
    #[instrument(skip(self, params), fields(category_id = %params.category_id, position = params.position))]
    pub async fn set_category_position(&self, params: &SetCategoryPosition) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self
            .guild_or(&self.resolve_guild(params.guild_id.as_deref())?, "Guild not found")
            .await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let category = self
                .category(
                    guild.id(),
                    &params.category_id,
                    "Category not found or not a category channel",
                )
                .await?;
            self.reposition(
                guild.id(),
                vec![json!({ "id": category.id(), "position": params.position })],
            )
            .await?;
            Ok(Outcome::new(format!(
                "Successfully moved category \"{}\" to position {}",
                category.name(),
                params.position
            ))
            .with("categoryId", category.id().as_str()))
        }
        .await;
        result.map_err(failed("set category position"))
    }

    /// Reposition categories, then re-parent and reposition channels.
    #[instrument(skip(self, params))]
    pub async fn organize_channels(&self, params: &OrganizeChannels) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self
            .guild_or(&self.resolve_guild(params.guild_id.as_deref())?, "Guild not found")
            .await?;
        self.require_manage_channels(&guild).await?;
        let organization = &params.organization;

        let result: GuildResult<Outcome> = async {
            let channels: BTreeMap<String, Channel> = self
                .guild_channels(guild.id())
                .await?
                .into_iter()
                .map(|channel| (channel.id().clone(), channel))
                .collect();
            let mut results = Vec::new();

            if !organization.categories.is_empty() {
                let mut entries = Vec::with_capacity(organization.categories.len());
                for placement in &organization.categories {
                    let category = channels
                        .get(&placement.category_id)
                        .filter(|channel| channel.is_category())
                        .ok_or_else(|| {
                            GuildError::operation(format!(
                                "Category with ID {} not found or not a category",
                                placement.category_id
                            ))
                        })?;
                    entries.push(json!({ "id": category.id(), "position": placement.position }));
                }
                let moved = entries.len();
                self.reposition(guild.id(), entries).await?;
                results.push(format!("Repositioned {} categories", moved));
            }

            let mut moved_to_categories = 0;
            let mut repositioned = 0;
            for placement in &organization.channels {
                let channel = channels.get(&placement.channel_id).ok_or_else(|| {
                    GuildError::operation(format!(
                        "Channel with ID {} not found",
                        placement.channel_id
                    ))
                })?;

                if let Some(parent) = &placement.category_id {
                    if let Some(id) = parent
                        && !channels.contains_key(id)
                    {
                        return Err(GuildError::operation(format!(
                            "Category with ID {} not found",
                            id
                        )));
                    }
                    if channel.kind().accepts_parent() {
                        self.send(
                            RestRequest::patch(format!("/channels/{}", channel.id()))
                                .json(json!({ "parent_id": parent })),
                        )
                        .await?;
                        moved_to_categories += 1;
                    }
                }

                if let Some(position) = placement.position
                    && is_arrangeable(channel)
                {
                    self.reposition(
                        guild.id(),
                        vec![json!({ "id": channel.id(), "position": position })],
                    )
                    .await?;
                    repositioned += 1;
                }
            }
            if moved_to_categories > 0 {
                results.push(format!(
                    "Moved {} channels to new categories",
                    moved_to_categories
                ));
            }
            if repositioned > 0 {
                results.push(format!("Repositioned {} channels", repositioned));
            }

            Ok(Outcome::new(format!(
                "Successfully organized server: {}",
                results.join(", ")
            ))
            .with("movedToCategories", moved_to_categories)
            .with("repositioned", repositioned))
        }
        .await;
        result.map_err(failed("organize channels"))
    }

    /// The guild's channel tree: uncategorized channels, then each category
    /// with its children, all by position.
    #[instrument(skip(self, params))]
    pub async fn get_channel_structure(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self
            .guild_or(&self.resolve_guild(params.guild_id.as_deref())?, "Guild not found")
            .await?;

        let result: GuildResult<Outcome> = async {
            let channels = self.guild_channels(guild.id()).await?;
            let (categories, others): (Vec<&Channel>, Vec<&Channel>) =
                channels.iter().partition(|channel| channel.is_category());

            let mut lines = vec![format!("📋 **Channel Structure for {}**\n", guild.name())];

            let orphans: Vec<&Channel> = others
                .iter()
                .copied()
                .filter(|channel| channel.parent_id().is_none())
                .collect();
            if !orphans.is_empty() {
                lines.push("🔸 **Uncategorized Channels:**".to_string());
                lines.extend(orphans.iter().map(|channel| structure_line(channel)));
                lines.push(String::new());
            }

            for category in &categories {
                lines.push(format!(
                    "📁 **{}** (ID: {}, Position: {})",
                    category.name(),
                    category.id(),
                    category.position()
                ));
                lines.extend(
                    others
                        .iter()
                        .filter(|channel| channel.parent_id().as_deref() == Some(category.id()))
                        .map(|channel| structure_line(channel)),
                );
                lines.push(String::new());
            }

            Ok(Outcome::new(lines.join("\n"))
                .with("categories", categories.len())
                .with("channels", others.len()))
        }
        .await;
        result.map_err(failed("get channel structure"))
    }
}
