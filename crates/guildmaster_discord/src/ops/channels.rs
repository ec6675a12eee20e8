//! Channel and category creation, editing, lookup and deletion.

use super::server::GuildRef;
use super::{de, failed, no_validation};
use crate::client::{DiscordClient, Outcome, Validate};
use crate::format::max_bitrate;
use crate::models::{Channel, ChannelKind, Guild};
use crate::permissions::bit_of;
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

/// Longest slowmode Discord accepts, in seconds.
pub const MAX_SLOWMODE: i64 = 21_600;
/// Lowest bitrate Discord accepts.
pub const MIN_BITRATE: i64 = 8_000;
/// Highest bitrate at any boost tier.
pub const MAX_BITRATE: i64 = 384_000;

/// `create_text_channel`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTextChannel {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel name
    pub name: String,
    /// Parent category
    #[serde(default)]
    pub category_id: Option<String>,
}

/// `create_voice_channel`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVoiceChannel {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel name
    pub name: String,
    /// Parent category
    #[serde(default)]
    pub category_id: Option<String>,
    /// 0 to 99, 0 for unlimited
    #[serde(default)]
    pub user_limit: Option<i64>,
    /// Bits per second
    #[serde(default)]
    pub bitrate: Option<i64>,
}

/// `create_forum_channel`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateForumChannel {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel name
    pub name: String,
    /// Parent category
    #[serde(default)]
    pub category_id: Option<String>,
    /// Guidelines shown above posts
    #[serde(default)]
    pub topic: Option<String>,
    /// Seconds between posts per user
    #[serde(default)]
    pub slowmode: Option<i64>,
    /// Reaction added to new posts
    #[serde(default)]
    pub default_reaction_emoji: Option<String>,
    /// Hide from @everyone
    #[serde(default)]
    pub is_private: Option<bool>,
    /// Roles that keep access
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
}

/// `create_announcement_channel`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementChannel {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel name
    pub name: String,
    /// Parent category
    #[serde(default)]
    pub category_id: Option<String>,
    /// Channel topic
    #[serde(default)]
    pub topic: Option<String>,
    /// Seconds between messages per user
    #[serde(default)]
    pub slowmode: Option<i64>,
    /// Hide from @everyone
    #[serde(default)]
    pub is_private: Option<bool>,
    /// Roles that keep access
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
}

/// `create_stage_channel`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStageChannel {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel name
    pub name: String,
    /// Parent category
    #[serde(default)]
    pub category_id: Option<String>,
    /// Channel topic
    #[serde(default)]
    pub topic: Option<String>,
    /// Bits per second
    #[serde(default)]
    pub bitrate: Option<i64>,
    /// Hide from @everyone
    #[serde(default)]
    pub is_private: Option<bool>,
    /// Roles that keep access
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
}

/// `edit_channel_advanced`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditChannelAdvanced {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel to edit
    pub channel_id: String,
    /// New name, 1 to 100 characters
    #[serde(default)]
    pub name: Option<String>,
    /// New topic, at most 1024 characters
    #[serde(default)]
    pub topic: Option<String>,
    /// Seconds between messages per user
    #[serde(default)]
    pub slowmode: Option<i64>,
    /// Voice and stage only
    #[serde(default)]
    pub user_limit: Option<i64>,
    /// Voice and stage only
    #[serde(default)]
    pub bitrate: Option<i64>,
    /// Hide from @everyone
    #[serde(default)]
    pub is_private: Option<bool>,
    /// Roles that keep access
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    /// New parent; explicit `null` removes it from its category
    #[serde(default, deserialize_with = "de::nullable")]
    pub category_id: Option<Option<String>>,
}

/// `delete_channel`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteChannel {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel to delete
    pub channel_id: String,
}

/// `find_channel`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindChannel {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Name, matched case-insensitively
    pub channel_name: String,
}

/// `create_category`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategory {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Category name
    pub name: String,
}

/// `delete_category`, `list_channels_in_category`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The category
    pub category_id: String,
}

/// `find_category`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindCategory {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Name, matched case-insensitively
    pub category_name: String,
}

fn check_user_limit(user_limit: Option<i64>) -> GuildResult<()> {
    match user_limit {
        Some(limit) if !(0..=99).contains(&limit) => Err(GuildError::validation(
            "User limit must be between 0 and 99 (0 = unlimited)",
        )),
        _ => Ok(()),
    }
}

fn check_bitrate(bitrate: Option<i64>) -> GuildResult<()> {
    match bitrate {
        Some(bitrate) if !(MIN_BITRATE..=MAX_BITRATE).contains(&bitrate) => {
            Err(GuildError::validation(format!(
                "Bitrate must be between {} and {}",
                MIN_BITRATE, MAX_BITRATE
            )))
        }
        _ => Ok(()),
    }
}

fn check_slowmode(slowmode: Option<i64>) -> GuildResult<()> {
    match slowmode {
        Some(seconds) if seconds > MAX_SLOWMODE => Err(GuildError::validation(
            "Slowmode cannot exceed 21600 seconds (6 hours)",
        )),
        Some(seconds) if seconds < 0 => Err(GuildError::validation(
            "Slowmode must be between 0 and 21600 seconds (6 hours)",
        )),
        _ => Ok(()),
    }
}

impl Validate for CreateVoiceChannel {
    fn validate(&self) -> GuildResult<()> {
        check_user_limit(self.user_limit)?;
        check_bitrate(self.bitrate)
    }
}

impl Validate for CreateForumChannel {
    fn validate(&self) -> GuildResult<()> {
        check_slowmode(self.slowmode)
    }
}

impl Validate for CreateAnnouncementChannel {
    fn validate(&self) -> GuildResult<()> {
        check_slowmode(self.slowmode)
    }
}

impl Validate for CreateStageChannel {
    fn validate(&self) -> GuildResult<()> {
        check_bitrate(self.bitrate)
    }
}

impl Validate for EditChannelAdvanced {
    fn validate(&self) -> GuildResult<()> {
        if let Some(name) = &self.name
            && !(1..=100).contains(&name.chars().count())
        {
            return Err(GuildError::validation(
                "Channel name must be between 1 and 100 characters",
            ));
        }
        if self
            .topic
            .as_ref()
            .is_some_and(|topic| topic.chars().count() > 1024)
        {
            return Err(GuildError::validation(
                "Channel topic cannot exceed 1024 characters",
            ));
        }
        if self
            .slowmode
            .is_some_and(|seconds| !(0..=MAX_SLOWMODE).contains(&seconds))
        {
            return Err(GuildError::validation(
                "Slowmode must be between 0 and 21600 seconds (6 hours)",
            ));
        }
        check_user_limit(self.user_limit)?;
        check_bitrate(self.bitrate)
    }
}

no_validation!(
    CreateTextChannel,
    DeleteChannel,
    FindChannel,
    CreateCategory,
    CategoryRef,
    FindCategory,
);

/// `user limit: unlimited` / `bitrate: 64000kbps` style suffix.
fn with_details(details: &[String]) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(" with {}", details.join(", "))
    }
}

fn check_tier_bitrate(guild: &Guild, bitrate: i64) -> GuildResult<()> {
    let max = i64::from(max_bitrate(*guild.premium_tier()));
    if bitrate < MIN_BITRATE || bitrate > max {
        return Err(GuildError::validation(format!(
            "Bitrate must be between {} and {} (server's maximum based on boost level)",
            MIN_BITRATE, max
        )));
    }
    Ok(())
}

/// `{"emoji_id": ..}` for a custom emoji id, `{"emoji_name": ..}` otherwise.
fn reaction_emoji(emoji: &str) -> Value {
    if !emoji.is_empty() && emoji.bytes().all(|b| b.is_ascii_digit()) {
        json!({ "emoji_id": emoji })
    } else {
        json!({ "emoji_name": emoji })
    }
}

fn privacy_details(is_private: Option<bool>, allowed_roles: Option<&Vec<String>>) -> Vec<String> {
    let mut details = Vec::new();
    if is_private == Some(true) {
        details.push("private channel".to_string());
    }
    if let Some(roles) = allowed_roles.filter(|roles| !roles.is_empty()) {
        details.push(format!("{} role(s) granted access", roles.len()));
    }
    details
}

fn channel_line(channel: &Channel) -> String {
    format!(
        "- {} channel: {} (ID: {})",
        channel.kind(),
        channel.name(),
        channel.id()
    )
}

impl DiscordClient {
    /// Fail unless the bot may manage channels.
    pub(crate) async fn require_manage_channels(&self, guild: &Guild) -> GuildResult<()> {
        self.bot_context(guild.clone())
            .await?
            .require(
                bit_of::MANAGE_CHANNELS,
                "Bot doesn't have permission to manage channels",
            )
    }

    /// A category of the guild, failing with `missing`.
    pub(crate) async fn category(
        &self,
        guild_id: &str,
        category_id: &str,
        missing: &str,
    ) -> GuildResult<Channel> {
        self.guild_channel(guild_id, category_id)
            .await?
            .filter(Channel::is_category)
            .ok_or_else(|| GuildError::operation(missing))
    }

    async fn create_guild_channel(&self, guild_id: &str, body: Map<String, Value>) -> GuildResult<Channel> {
        let channel: Channel = self
            .fetch(
                RestRequest::post(format!("/guilds/{}/channels", guild_id))
                    .json(Value::Object(body)),
            )
            .await?;
        info!(channel_id = %channel.id(), kind = %channel.kind(), "Channel created");
        Ok(channel)
    }

    /// The body shared by every channel creation, with the parent resolved.
    async fn creation_body(
        &self,
        guild_id: &str,
        name: &str,
        kind: ChannelKind,
        category_id: Option<&str>,
    ) -> GuildResult<(Map<String, Value>, Option<Channel>)> {
        let mut body = Map::new();
        body.insert("name".into(), json!(name));
        body.insert("type".into(), json!(kind.code()));
        let category = match category_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                let category = self
                    .category(guild_id, id, "Category not found by categoryId")
                    .await?;
                body.insert("parent_id".into(), json!(category.id()));
                Some(category)
            }
            None => None,
        };
        Ok((body, category))
    }

    /// Create a text channel, optionally inside a category.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_text_channel(&self, params: &CreateTextChannel) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let (body, category) = self
            .creation_body(
                guild.id(),
                &params.name,
                ChannelKind::GuildText,
                params.category_id.as_deref(),
            )
            .await?;
        let channel = self.create_guild_channel(guild.id(), body).await?;
        let text = match category {
            Some(category) => format!(
                "Created new text channel: {} (ID: {}) in category: {}",
                channel.name(),
                channel.id(),
                category.name()
            ),
            None => format!(
                "Created new text channel: {} (ID: {})",
                channel.name(),
                channel.id()
            ),
        };
        Ok(Outcome::new(text).with("channelId", channel.id().as_str()))
    }

    /// Create a voice channel with optional user limit and bitrate.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_voice_channel(&self, params: &CreateVoiceChannel) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            check_user_limit(params.user_limit)?;
            if let Some(bitrate) = params.bitrate {
                check_tier_bitrate(&guild, bitrate)?;
            }
            let (mut body, category) = self
                .creation_body(
                    guild.id(),
                    &params.name,
                    ChannelKind::GuildVoice,
                    params.category_id.as_deref(),
                )
                .await?;
            let mut details = Vec::new();
            if let Some(limit) = params.user_limit {
                body.insert("user_limit".into(), json!(limit));
                details.push(if limit == 0 {
                    "user limit: unlimited".to_string()
                } else {
                    format!("user limit: {}", limit)
                });
            }
            if let Some(bitrate) = params.bitrate {
                body.insert("bitrate".into(), json!(bitrate));
                details.push(format!("bitrate: {}kbps", bitrate));
            }

            let channel = self.create_guild_channel(guild.id(), body).await?;
            let placement = category
                .map(|category| format!(" in category: {}", category.name()))
                .unwrap_or_default();
            Ok(Outcome::new(format!(
                "Created new voice channel: {} (ID: {}){}{}",
                channel.name(),
                channel.id(),
                placement,
                with_details(&details)
            ))
            .with("channelId", channel.id().as_str()))
        }
        .await;
        result.map_err(failed("create voice channel"))
    }

    /// Create a forum channel.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_forum_channel(&self, params: &CreateForumChannel) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            check_slowmode(params.slowmode)?;
            let (mut body, _) = self
                .creation_body(
                    guild.id(),
                    &params.name,
                    ChannelKind::GuildForum,
                    params.category_id.as_deref(),
                )
                .await?;
            let mut details = Vec::new();
            if let Some(topic) = params.topic.as_deref().filter(|topic| !topic.is_empty()) {
                body.insert("topic".into(), json!(topic));
                details.push(format!("topic: \"{}\"", topic));
            }
            if let Some(slowmode) = params.slowmode.filter(|seconds| *seconds > 0) {
                body.insert("rate_limit_per_user".into(), json!(slowmode));
                details.push(format!("slowmode: {}s", slowmode));
            }
            if let Some(emoji) = params
                .default_reaction_emoji
                .as_deref()
                .filter(|emoji| !emoji.is_empty())
            {
                body.insert("default_reaction_emoji".into(), reaction_emoji(emoji));
            }

            let channel = self.create_guild_channel(guild.id(), body).await?;
            self.configure_privacy(
                &guild,
                &channel,
                params.is_private.unwrap_or(false),
                params.allowed_roles.as_deref().unwrap_or_default(),
            )
            .await?;
            details.extend(privacy_details(params.is_private, params.allowed_roles.as_ref()));

            Ok(Outcome::new(format!(
                "Created forum channel: {} (ID: {}){}{}",
                channel.name(),
                channel.id(),
                if params.category_id.is_some() { " in category" } else { "" },
                with_details(&details)
            ))
            .with("channelId", channel.id().as_str()))
        }
        .await;
        result.map_err(failed("create forum channel"))
    }

    /// Create an announcement channel.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_announcement_channel(
        &self,
        params: &CreateAnnouncementChannel,
    ) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            check_slowmode(params.slowmode)?;
            let (mut body, _) = self
                .creation_body(
                    guild.id(),
                    &params.name,
                    ChannelKind::GuildAnnouncement,
                    params.category_id.as_deref(),
                )
                .await?;
            let mut details = Vec::new();
            if let Some(topic) = params.topic.as_deref().filter(|topic| !topic.is_empty()) {
                body.insert("topic".into(), json!(topic));
                details.push(format!("topic: \"{}\"", topic));
            }
            if let Some(slowmode) = params.slowmode.filter(|seconds| *seconds > 0) {
                body.insert("rate_limit_per_user".into(), json!(slowmode));
                details.push(format!("slowmode: {}s", slowmode));
            }

            let channel = self.create_guild_channel(guild.id(), body).await?;
            self.configure_privacy(
                &guild,
                &channel,
                params.is_private.unwrap_or(false),
                params.allowed_roles.as_deref().unwrap_or_default(),
            )
            .await?;
            details.extend(privacy_details(params.is_private, params.allowed_roles.as_ref()));

            Ok(Outcome::new(format!(
                "Created announcement channel: {} (ID: {}){}{}",
                channel.name(),
                channel.id(),
                if params.category_id.is_some() { " in category" } else { "" },
                with_details(&details)
            ))
            .with("channelId", channel.id().as_str()))
        }
        .await;
        result.map_err(failed("create announcement channel"))
    }

    /// Create a stage channel.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_stage_channel(&self, params: &CreateStageChannel) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let (mut body, _) = self
                .creation_body(
                    guild.id(),
                    &params.name,
                    ChannelKind::GuildStageVoice,
                    params.category_id.as_deref(),
                )
                .await?;
            let mut details = Vec::new();
            if let Some(topic) = params.topic.as_deref().filter(|topic| !topic.is_empty()) {
                body.insert("topic".into(), json!(topic));
                details.push(format!("topic: \"{}\"", topic));
            }
            if let Some(bitrate) = params.bitrate {
                check_tier_bitrate(&guild, bitrate)?;
                body.insert("bitrate".into(), json!(bitrate));
                details.push(format!("bitrate: {}kbps", bitrate));
            }

            let channel = self.create_guild_channel(guild.id(), body).await?;
            self.configure_privacy(
                &guild,
                &channel,
                params.is_private.unwrap_or(false),
                params.allowed_roles.as_deref().unwrap_or_default(),
            )
            .await?;
            details.extend(privacy_details(params.is_private, params.allowed_roles.as_ref()));

            Ok(Outcome::new(format!(
                "Created stage channel: {} (ID: {}){}{}",
                channel.name(),
                channel.id(),
                if params.category_id.is_some() { " in category" } else { "" },
                with_details(&details)
            ))
            .with("channelId", channel.id().as_str()))
        }
        .await;
        result.map_err(failed("create stage channel"))
    }

    /// Edit several channel settings at once, including privacy and parent.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn edit_channel_advanced(&self, params: &EditChannelAdvanced) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let channel = self
                .guild_channel(guild.id(), &params.channel_id)
                .await?
                .ok_or_else(|| {
                    GuildError::operation(format!("Channel not found: {}", params.channel_id))
                })?;
            params.validate()?;

            let mut body = Map::new();
            let mut changes = Vec::new();

            if let Some(name) = &params.name {
                body.insert("name".into(), json!(name));
                changes.push(format!("name to \"{}\"", name));
            }
            if let Some(topic) = &params.topic {
                body.insert("topic".into(), json!(topic));
                changes.push(format!("topic to \"{}\"", topic));
            }
            if let Some(slowmode) = params.slowmode {
                body.insert("rate_limit_per_user".into(), json!(slowmode));
                changes.push(format!("slowmode to {}s", slowmode));
            }
            if let Some(limit) = params.user_limit {
                if !channel.kind().is_voice_based() {
                    return Err(GuildError::validation(
                        "User limit can only be set on voice and stage channels",
                    ));
                }
                body.insert("user_limit".into(), json!(limit));
                changes.push(if limit == 0 {
                    "user limit to unlimited".to_string()
                } else {
                    format!("user limit to {}", limit)
                });
            }
            if let Some(bitrate) = params.bitrate {
                if !channel.kind().is_voice_based() {
                    return Err(GuildError::validation(
                        "Bitrate can only be set on voice and stage channels",
                    ));
                }
                check_tier_bitrate(&guild, bitrate)?;
                body.insert("bitrate".into(), json!(bitrate));
                changes.push(format!("bitrate to {}kbps", bitrate));
            }
            match &params.category_id {
                None => {}
                Some(None) => {
                    body.insert("parent_id".into(), Value::Null);
                    changes.push("removed from category".to_string());
                }
                Some(Some(category_id)) => {
                    let category = self
                        .category(guild.id(), category_id, "Category not found by categoryId")
                        .await?;
                    body.insert("parent_id".into(), json!(category.id()));
                    changes.push(format!("moved to category \"{}\"", category.name()));
                }
            }

            let channel = if body.is_empty() {
                channel
            } else {
                self.fetch(
                    RestRequest::patch(format!("/channels/{}", channel.id()))
                        .json(Value::Object(body)),
                )
                .await?
            };

            if params.is_private.is_some() || params.allowed_roles.is_some() {
                self.configure_privacy(
                    &guild,
                    &channel,
                    params.is_private.unwrap_or(false),
                    params.allowed_roles.as_deref().unwrap_or_default(),
                )
                .await?;
                if params.is_private == Some(true) {
                    changes.push("made private".to_string());
                }
                if let Some(roles) = params.allowed_roles.as_ref().filter(|roles| !roles.is_empty()) {
                    changes.push(format!("granted access to {} role(s)", roles.len()));
                }
            }

            if changes.is_empty() {
                return Ok(Outcome::new("No changes specified for channel edit"));
            }
            Ok(Outcome::new(format!(
                "Successfully edited channel \"{}\" (ID: {}). Changed: {}",
                channel.name(),
                params.channel_id,
                changes.join(", ")
            ))
            .with("channelId", params.channel_id.as_str()))
        }
        .await;
        result.map_err(failed("edit channel"))
    }

    /// Delete any guild channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn delete_channel(&self, params: &DeleteChannel) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let channel = self
            .guild_channel(guild.id(), &params.channel_id)
            .await?
            .ok_or_else(|| GuildError::operation("Channel not found by channelId"))?;
        self.send(RestRequest::delete(format!("/channels/{}", channel.id())))
            .await?;
        info!(channel_id = %channel.id(), "Channel deleted");
        Ok(Outcome::new(format!(
            "Deleted {} channel: {}",
            channel.kind(),
            channel.name()
        ))
        .with("channelId", channel.id().as_str()))
    }

    /// Find channels by name.
    #[instrument(skip(self, params), fields(channel_name = %params.channel_name))]
    pub async fn find_channel(&self, params: &FindChannel) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let matches: Vec<Channel> = self
            .guild_channels(guild.id())
            .await?
            .into_iter()
            .filter(|channel| channel.name().to_lowercase() == params.channel_name.to_lowercase())
            .collect();

        match matches.as_slice() {
            [] => Err(GuildError::operation(format!(
                "No channels found with name {}",
                params.channel_name
            ))),
            [only] => Ok(Outcome::new(format!(
                "Retrieved {} channel: {} (ID: {})",
                only.kind(),
                only.name(),
                only.id()
            ))
            .with("channelId", only.id().as_str())),
            many => Ok(Outcome::new(format!(
                "Retrieved {} channels:\n{}",
                many.len(),
                many.iter().map(channel_line).collect::<Vec<_>>().join("\n")
            ))
            .with("count", many.len())),
        }
    }

    /// Every channel in the guild.
    #[instrument(skip(self, params))]
    pub async fn list_channels(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let channels = self.guild_channels(guild.id()).await?;
        if channels.is_empty() {
            return Err(GuildError::operation("No channels found by guildId"));
        }
        Ok(Outcome::new(format!(
            "Retrieved {} channels:\n{}",
            channels.len(),
            channels.iter().map(channel_line).collect::<Vec<_>>().join("\n")
        ))
        .with("count", channels.len()))
    }

    /// Create a category.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_category(&self, params: &CreateCategory) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let (body, _) = self
            .creation_body(guild.id(), &params.name, ChannelKind::GuildCategory, None)
            .await?;
        let category = self.create_guild_channel(guild.id(), body).await?;
        Ok(
            Outcome::new(format!("Created new category: {}", category.name()))
                .with("categoryId", category.id().as_str()),
        )
    }

    /// Delete a category; its channels stay, without a parent.
    #[instrument(skip(self, params), fields(category_id = %params.category_id))]
    pub async fn delete_category(&self, params: &CategoryRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let category = self
            .category(guild.id(), &params.category_id, "Category not found by categoryId")
            .await?;
        self.send(RestRequest::delete(format!("/channels/{}", category.id())))
            .await?;
        Ok(Outcome::new(format!("Deleted category: {}", category.name()))
            .with("categoryId", category.id().as_str()))
    }

    /// Find a category by name; several matches are an error listing them.
    #[instrument(skip(self, params), fields(category_name = %params.category_name))]
    pub async fn find_category(&self, params: &FindCategory) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let wanted = params.category_name.to_lowercase();
        let matches: Vec<Channel> = self
            .guild_channels(guild.id())
            .await?
            .into_iter()
            .filter(|channel| channel.is_category() && channel.name().to_lowercase() == wanted)
            .collect();

        match matches.as_slice() {
            [] => Err(GuildError::operation(format!(
                "Category {} not found",
                params.category_name
            ))),
            [only] => Ok(Outcome::new(format!(
                "Retrieved category: {}, with ID: {}",
                only.name(),
                only.id()
            ))
            .with("categoryId", only.id().as_str())),
            many => {
                let list: Vec<String> = many
                    .iter()
                    .map(|category| format!("**{}** - `{}`", category.name(), category.id()))
                    .collect();
                Err(GuildError::operation(format!(
                    "Multiple channels found with name {}.\nList: {}.\nPlease specify the channel ID.",
                    params.category_name,
                    list.join(", ")
                )))
            }
        }
    }

    /// Channels whose parent is the category.
    #[instrument(skip(self, params), fields(category_id = %params.category_id))]
    pub async fn list_channels_in_category(&self, params: &CategoryRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let category = self
            .category(guild.id(), &params.category_id, "Category not found by categoryId")
            .await?;
        let children: Vec<Channel> = self
            .guild_channels(guild.id())
            .await?
            .into_iter()
            .filter(|channel| channel.parent_id().as_deref() == Some(category.id().as_str()))
            .collect();
        if children.is_empty() {
            return Err(GuildError::operation("Category not contains any channels"));
        }
        Ok(Outcome::new(format!(
            "Retrieved {} channels:\n{}",
            children.len(),
            children.iter().map(channel_line).collect::<Vec<_>>().join("\n")
        ))
        .with("count", children.len()))
    }
}
