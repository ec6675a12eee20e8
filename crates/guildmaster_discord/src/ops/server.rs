//! Server-level information and settings.

use super::{failed, no_validation};
use crate::client::{DiscordClient, Outcome, Validate};
use crate::format::{snowflake_date, yes_no};
use crate::models::{ChannelKind, Guild, WelcomeScreen, Widget};
use crate::permissions::bit_of;
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

const VERIFICATION_LEVELS: [&str; 5] = ["None", "Low", "Medium", "High", "Very High"];

/// `get_server_info`, `get_server_stats`, `get_server_widget`, `get_welcome_screen`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildRef {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// `edit_server`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditServer {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// New name
    #[serde(default)]
    pub name: Option<String>,
    /// New description; empty clears it
    #[serde(default)]
    pub description: Option<String>,
    /// Icon as URL, path or data URI
    #[serde(default)]
    pub icon: Option<String>,
    /// Banner as URL, path or data URI
    #[serde(default)]
    pub banner: Option<String>,
    /// `NONE`, `LOW`, `MEDIUM`, `HIGH` or `VERY_HIGH`
    #[serde(default)]
    pub verification_level: Option<String>,
}

fn verification_code(level: &str) -> Option<u8> {
    match level.to_uppercase().as_str() {
        "NONE" => Some(0),
        "LOW" => Some(1),
        "MEDIUM" => Some(2),
        "HIGH" => Some(3),
        "VERY_HIGH" => Some(4),
        _ => None,
    }
}

impl Validate for EditServer {
    fn validate(&self) -> GuildResult<()> {
        if let Some(level) = &self.verification_level
            && verification_code(level).is_none()
        {
            return Err(GuildError::validation(format!(
                "Invalid verification level: {}",
                level
            )));
        }
        Ok(())
    }
}

/// One entry of the welcome screen.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeChannelSpec {
    /// Channel shown
    #[serde(default)]
    pub channel_id: String,
    /// Line shown next to it
    #[serde(default)]
    pub description: String,
    /// Unicode emoji
    #[serde(default)]
    pub emoji: Option<String>,
}

/// `edit_welcome_screen`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditWelcomeScreen {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Turn the screen on or off
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Server description shown on the screen
    #[serde(default)]
    pub description: Option<String>,
    /// Replacement channel list
    #[serde(default)]
    pub welcome_channels: Option<Vec<WelcomeChannelSpec>>,
}

impl Validate for EditWelcomeScreen {
    fn validate(&self) -> GuildResult<()> {
        let incomplete = self.welcome_channels.iter().flatten().any(|channel| {
            channel.channel_id.is_empty() || channel.description.is_empty()
        });
        if incomplete {
            return Err(GuildError::validation(
                "Each welcome channel requires channelId and description",
            ));
        }
        Ok(())
    }
}

no_validation!(GuildRef);

/// Channel counts by kind.
#[derive(Debug, Default)]
struct ChannelCounts {
    total: usize,
    text: usize,
    voice: usize,
    category: usize,
    stage: usize,
    announcement: usize,
    forum: usize,
}

impl DiscordClient {
    async fn channel_counts(&self, guild_id: &str) -> GuildResult<ChannelCounts> {
        let channels = self.guild_channels(guild_id).await?;
        let mut counts = ChannelCounts {
            total: channels.len(),
            ..Default::default()
        };
        for channel in &channels {
            match channel.kind() {
                ChannelKind::GuildText => counts.text += 1,
                ChannelKind::GuildVoice => counts.voice += 1,
                ChannelKind::GuildCategory => counts.category += 1,
                ChannelKind::GuildStageVoice => counts.stage += 1,
                ChannelKind::GuildAnnouncement => counts.announcement += 1,
                ChannelKind::GuildForum => counts.forum += 1,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// Guild for a record's optional id.
    pub(crate) async fn resolved_guild(&self, guild_id: Option<&str>) -> GuildResult<Guild> {
        let guild_id = self.resolve_guild(guild_id)?;
        self.guild(&guild_id).await
    }

    /// Name, owner, creation date, member count, channel and boost summary.
    #[instrument(skip(self, params))]
    pub async fn get_server_info(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let owner = self
            .user(guild.owner_id())
            .await?
            .map(|user| user.username().clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let counts = self.channel_counts(guild.id()).await?;

        Ok(Outcome::new(format!(
            "Server Name: {}\nServer ID: {}\nOwner: {}\nCreated On: {}\nMembers: {}\nChannels:\n - Text: {}\n - Voice: {}\n  - Categories: {}\nBoosts:\n - Count: {}\n - Tier: {}",
            guild.name(),
            guild.id(),
            owner,
            snowflake_date(guild.id()),
            guild.approximate_member_count().unwrap_or(0),
            counts.text,
            counts.voice,
            counts.category,
            guild.premium_subscription_count().unwrap_or(0),
            guild.premium_tier()
        ))
        .with("guildId", guild.id().as_str()))
    }

    /// Change the name, description, icon, banner or verification level.
    #[instrument(skip(self, params))]
    pub async fn edit_server(&self, params: &EditServer) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let bot = self.bot_context(guild.clone()).await?;
        bot.require(
            bit_of::MANAGE_GUILD,
            "Bot requires 'Manage Server' permission to edit server settings",
        )?;

        let result: GuildResult<Outcome> = async {
            let mut body = Map::new();
            let mut changes = Vec::new();

            if let Some(name) = params.name.as_deref().filter(|name| !name.is_empty())
                && name != guild.name()
            {
                body.insert("name".into(), json!(name));
                changes.push(format!("Name: \"{}\" → \"{}\"", guild.name(), name));
            }

            if let Some(description) = &params.description
                && Some(description) != guild.description().as_ref()
            {
                body.insert(
                    "description".into(),
                    if description.is_empty() {
                        Value::Null
                    } else {
                        json!(description)
                    },
                );
                changes.push(format!(
                    "Description: \"{}\" → \"{}\"",
                    guild.description().as_deref().unwrap_or("None"),
                    if description.is_empty() { "None" } else { description }
                ));
            }

            if let Some(icon) = params.icon.as_deref().filter(|icon| !icon.is_empty()) {
                body.insert("icon".into(), json!(self.image_data_uri(icon).await?));
                changes.push("Icon updated".to_string());
            }

            if let Some(banner) = params.banner.as_deref().filter(|banner| !banner.is_empty()) {
                body.insert("banner".into(), json!(self.image_data_uri(banner).await?));
                changes.push("Banner updated".to_string());
            }

            if let Some(level) = params.verification_level.as_deref() {
                let code = verification_code(level).ok_or_else(|| {
                    GuildError::validation(format!("Invalid verification level: {}", level))
                })?;
                if code != *guild.verification_level() {
                    body.insert("verification_level".into(), json!(code));
                    changes.push(format!(
                        "Verification level: {} → {}",
                        guild.verification_level(),
                        code
                    ));
                }
            }

            if changes.is_empty() {
                return Ok(Outcome::new("No changes specified for the server"));
            }

            let updated: Guild = self
                .fetch(
                    RestRequest::patch(format!("/guilds/{}", guild.id()))
                        .json(Value::Object(body)),
                )
                .await?;
            info!(guild_id = %updated.id(), changes = changes.len(), "Server edited");
            Ok(Outcome::new(format!(
                "Successfully edited server \"{}\" (ID: {})\nChanges made:\n{}",
                updated.name(),
                updated.id(),
                bullet_list(&changes)
            ))
            .with("guildId", updated.id().as_str()))
        }
        .await;
        result.map_err(failed("edit server"))
    }

    /// Detailed counts and settings.
    #[instrument(skip(self, params))]
    pub async fn get_server_stats(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let result: GuildResult<Outcome> = async {
            let counts = self.channel_counts(guild.id()).await?;
            let owner = self
                .user(guild.owner_id())
                .await?
                .map(|user| user.tag())
                .unwrap_or_else(|| "Unknown".to_string());
            let verification = VERIFICATION_LEVELS
                .get(usize::from(*guild.verification_level()))
                .copied()
                .unwrap_or("Unknown");
            let max_members = guild
                .max_members()
                .map(|max| max.to_string())
                .unwrap_or_else(|| "Unlimited".to_string());
            let features = if guild.features().is_empty() {
                "None".to_string()
            } else {
                guild.features().join(", ")
            };

            Ok(Outcome::new(format!(
                "**Server Statistics for {}**\n\n**Basic Info:**\n- Server ID: {}\n- Owner: {}\n- Created: {}\n- Verification Level: {}\n- Boost Level: {}\n- Boost Count: {}\n\n**Members:**\n- Total Members: {}\n- Max Members: {}\n\n**Channels ({} total):**\n- Text: {}\n- Voice: {}\n- Categories: {}\n- Stage: {}\n- Announcement: {}\n- Forum: {}\n\n**Roles:** {} (excluding @everyone)\n**Custom Emojis:** {}\n**Features:** {}",
                guild.name(),
                guild.id(),
                owner,
                snowflake_date(guild.id()),
                verification,
                guild.premium_tier(),
                guild.premium_subscription_count().unwrap_or(0),
                guild.approximate_member_count().unwrap_or(0),
                max_members,
                counts.total,
                counts.text,
                counts.voice,
                counts.category,
                counts.stage,
                counts.announcement,
                counts.forum,
                guild.roles().len().saturating_sub(1),
                guild.emojis().len(),
                features
            ))
            .with("channels", counts.total))
        }
        .await;
        result.map_err(failed("get server stats"))
    }

    /// The public widget, or a note that it is disabled.
    #[instrument(skip(self, params))]
    pub async fn get_server_widget(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let widget: Option<Widget> = self
            .fetch(RestRequest::get(format!("/guilds/{}/widget.json", guild.id())))
            .await
            .ok();

        let Some(widget) = widget else {
            return Ok(Outcome::new(format!(
                "**Server Widget for {}**\nWidget is disabled or not available. Enable it in Server Settings > Widget to use this feature.",
                guild.name()
            ))
            .with("enabled", false));
        };

        let channels: Vec<String> = widget
            .channels()
            .iter()
            .map(|channel| format!("- **{}** ({})", channel.name(), channel.id()))
            .collect();
        Ok(Outcome::new(format!(
            "**Server Widget for {}**\n- **Invite URL**: {}\n- **Online Members**: {}\n- **Voice Channels**: {}\n\n**Channels with activity:**\n{}",
            guild.name(),
            widget.instant_invite().as_deref().unwrap_or("None"),
            widget.presence_count(),
            widget.channels().len(),
            if channels.is_empty() {
                "No active channels".to_string()
            } else {
                channels.join("\n")
            }
        ))
        .with("enabled", true))
    }

    /// The membership welcome screen, or a note that it is off.
    #[instrument(skip(self, params))]
    pub async fn get_welcome_screen(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let screen: Option<WelcomeScreen> = self
            .fetch(RestRequest::get(format!(
                "/guilds/{}/welcome-screen",
                guild.id()
            )))
            .await
            .ok();

        let Some(screen) = screen else {
            return Ok(Outcome::new(format!(
                "**Welcome Screen for {}**\nWelcome screen is not enabled or not available. Enable it in Server Settings > Overview > Welcome Screen.",
                guild.name()
            ))
            .with("enabled", false));
        };

        let channels: Vec<String> = screen
            .welcome_channels()
            .iter()
            .map(|channel| {
                let emoji = channel
                    .emoji_name()
                    .as_deref()
                    .map(|name| format!("{} ", name))
                    .unwrap_or_default();
                format!(
                    "- {}**{}**\n  Channel: <#{}> ({})",
                    emoji,
                    channel.description(),
                    channel.channel_id(),
                    channel.channel_id()
                )
            })
            .collect();
        Ok(Outcome::new(format!(
            "**Welcome Screen for {}**\n- **Enabled**: Yes\n- **Description**: {}\n- **Welcome Channels**: {}\n\n**Channels:**\n{}",
            guild.name(),
            screen
                .description()
                .as_deref()
                .filter(|description| !description.is_empty())
                .unwrap_or("No description"),
            screen.welcome_channels().len(),
            if channels.is_empty() {
                "No welcome channels configured".to_string()
            } else {
                channels.join("\n\n")
            }
        ))
        .with("enabled", true))
    }

    /// Toggle the welcome screen and replace its description or channels.
    #[instrument(skip(self, params))]
    pub async fn edit_welcome_screen(&self, params: &EditWelcomeScreen) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let bot = self.bot_context(guild.clone()).await?;
        bot.require(
            bit_of::MANAGE_GUILD,
            "Bot requires 'Manage Server' permission to edit welcome screen",
        )?;

        let result: GuildResult<Outcome> = async {
            let mut body = Map::new();
            let mut changes = Vec::new();

            if let Some(enabled) = params.enabled {
                body.insert("enabled".into(), json!(enabled));
                changes.push(format!("Enabled: {}", yes_no(enabled)));
            }
            if let Some(description) = &params.description {
                body.insert("description".into(), json!(description));
                changes.push("Description updated".to_string());
            }
            if let Some(channels) = &params.welcome_channels {
                let mut entries = Vec::with_capacity(channels.len());
                for channel in channels {
                    if channel.channel_id.is_empty() || channel.description.is_empty() {
                        return Err(GuildError::validation(
                            "Each welcome channel requires channelId and description",
                        ));
                    }
                    entries.push(json!({
                        "channel_id": channel.channel_id,
                        "description": channel.description,
                        "emoji_name": channel.emoji
                    }));
                }
                body.insert("welcome_channels".into(), Value::Array(entries));
                changes.push(format!(
                    "Welcome channels updated ({} channels)",
                    channels.len()
                ));
            }

            if changes.is_empty() {
                return Ok(Outcome::new("No changes specified for the welcome screen"));
            }

            self.send(
                RestRequest::patch(format!("/guilds/{}/welcome-screen", guild.id()))
                    .json(Value::Object(body)),
            )
            .await?;
            Ok(Outcome::new(format!(
                "Successfully edited welcome screen for \"{}\" (ID: {})\nChanges made:\n{}",
                guild.name(),
                guild.id(),
                bullet_list(&changes)
            )))
        }
        .await;
        result.map_err(failed("edit welcome screen"))
    }
}

/// `- a\n- b`
pub(crate) fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::{GUILD_ID, fixture, guild_json};

    #[tokio::test]
    async fn test_server_info_summary() {
        let (client, _rest) = fixture().await;
        let outcome = client.get_server_info(&GuildRef::default()).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Server Name: Test Guild\nServer ID: 100\nOwner: owner\nCreated On: 1/1/2015\nMembers: 4\nChannels:\n - Text: 2\n - Voice: 1\n  - Categories: 1\nBoosts:\n - Count: 3\n - Tier: 1"
        );
    }

    #[tokio::test]
    async fn test_server_stats_lists_features() {
        let (client, _rest) = fixture().await;
        let outcome = client.get_server_stats(&GuildRef::default()).await.unwrap();
        assert!(outcome.text().starts_with("**Server Statistics for Test Guild**"));
        assert!(outcome.text().contains("- Verification Level: Low"));
        assert!(outcome.text().contains("**Channels (6 total):**"));
        assert!(outcome.text().contains("- Stage: 1\n- Announcement: 1\n- Forum: 0"));
        assert!(outcome.text().contains("**Roles:** 4 (excluding @everyone)"));
        assert!(outcome.text().ends_with("**Features:** COMMUNITY"));
    }

    #[tokio::test]
    async fn test_edit_server_reports_changes() {
        let (client, rest) = fixture().await;
        let mut renamed = guild_json();
        renamed["name"] = json!("Renamed");
        rest.on(Method::Patch, &format!("/guilds/{}", GUILD_ID), renamed);

        let params = EditServer {
            name: Some("Renamed".to_string()),
            verification_level: Some("high".to_string()),
            ..Default::default()
        };
        let outcome = client.edit_server(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully edited server \"Renamed\" (ID: 100)\nChanges made:\n- Name: \"Test Guild\" → \"Renamed\"\n- Verification level: 1 → 3"
        );
        let patch = rest.requests_to(Method::Patch, "/guilds/100");
        assert_eq!(patch[0].json_body().unwrap()["verification_level"], 3);
    }

    #[tokio::test]
    async fn test_edit_server_without_changes() {
        let (client, rest) = fixture().await;
        let params = EditServer {
            name: Some("Test Guild".to_string()),
            ..Default::default()
        };
        let outcome = client.edit_server(&params).await.unwrap();
        assert_eq!(outcome.text(), "No changes specified for the server");
        assert!(rest.mutations().is_empty());
    }

    #[test]
    fn test_invalid_verification_level() {
        let params = EditServer {
            verification_level: Some("EXTREME".to_string()),
            ..Default::default()
        };
        assert_eq!(
            params.validate().unwrap_err().kind().to_string(),
            "Invalid verification level: EXTREME"
        );
    }

    #[tokio::test]
    async fn test_disabled_widget_is_not_an_error() {
        let (client, rest) = fixture().await;
        rest.on_status(Method::Get, "/guilds/100/widget.json", 403, "Widget Disabled");
        let outcome = client.get_server_widget(&GuildRef::default()).await.unwrap();
        assert!(outcome.text().contains("Widget is disabled or not available"));
    }

    #[tokio::test]
    async fn test_welcome_screen_channels() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/guilds/100/welcome-screen",
            json!({
                "description": "Hi there",
                "welcome_channels": [
                    {"channel_id": "301", "description": "Chat here", "emoji_name": "👋"}
                ]
            }),
        );
        let outcome = client.get_welcome_screen(&GuildRef::default()).await.unwrap();
        assert_eq!(
            outcome.text(),
            "**Welcome Screen for Test Guild**\n- **Enabled**: Yes\n- **Description**: Hi there\n- **Welcome Channels**: 1\n\n**Channels:**\n- 👋 **Chat here**\n  Channel: <#301> (301)"
        );
    }

    #[test]
    fn test_welcome_channels_need_description() {
        let params: EditWelcomeScreen = serde_json::from_value(json!({
            "welcomeChannels": [{"channelId": "301"}]
        }))
        .unwrap();
        assert!(params.validate().is_err());
    }
}
