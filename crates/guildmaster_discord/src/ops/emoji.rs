//! Custom emojis and stickers.

use super::failed;
use crate::client::{DiscordClient, Outcome, Validate, optional};
use crate::models::{Emoji, Guild, Sticker};
use crate::permissions::bit_of;
use crate::rest::{FileUpload, RestRequest};
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

const EMOJI_PERMISSION: &str = "Bot doesn't have permission to manage emojis";
const STICKER_PERMISSION: &str = "Bot doesn't have permission to manage stickers";

/// `create_emoji`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmoji {
    /// Guild to add the emoji to
    pub guild_id: String,
    /// Emoji name
    pub name: String,
    /// URL, local path or base64 `data:` URI of the image
    pub image_url: String,
    /// Roles allowed to use the emoji; everyone when empty
    #[serde(default)]
    pub roles: Vec<String>,
}

/// `delete_emoji`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmojiRef {
    /// Guild holding the emoji
    pub guild_id: String,
    /// The emoji
    pub emoji_id: String,
}

/// `create_sticker`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSticker {
    /// Guild to add the sticker to
    pub guild_id: String,
    /// Sticker name
    pub name: String,
    /// Sticker description
    pub description: String,
    /// Autocomplete tag
    pub tags: String,
    /// URL or local path of the image
    pub image_url: String,
}

/// `delete_sticker`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerRef {
    /// Guild holding the sticker
    pub guild_id: String,
    /// The sticker
    pub sticker_id: String,
}

/// `get_emojis`, `get_stickers`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionsRef {
    /// Guild to list
    pub guild_id: String,
}

impl Validate for CreateEmoji {
    fn validate(&self) -> GuildResult<()> {
        if self.name.is_empty() || self.image_url.is_empty() {
            return Err(GuildError::validation(
                "Emoji name and image URL are required",
            ));
        }
        Ok(())
    }
}

impl Validate for EmojiRef {
    fn validate(&self) -> GuildResult<()> {
        if self.emoji_id.is_empty() {
            return Err(GuildError::validation("Emoji ID is required"));
        }
        Ok(())
    }
}

impl Validate for CreateSticker {
    fn validate(&self) -> GuildResult<()> {
        if [&self.name, &self.description, &self.tags, &self.image_url]
            .iter()
            .any(|value| value.is_empty())
        {
            return Err(GuildError::validation(
                "Sticker name, description, tags, and image URL are required",
            ));
        }
        Ok(())
    }
}

impl Validate for StickerRef {
    fn validate(&self) -> GuildResult<()> {
        if self.sticker_id.is_empty() {
            return Err(GuildError::validation("Sticker ID is required"));
        }
        Ok(())
    }
}

super::no_validation!(ExpressionsRef);

/// Names of the roles an emoji is limited to.
fn role_names(guild: &Guild, roles: &[String]) -> String {
    roles
        .iter()
        .map(|id| guild.role(id).map_or(id.as_str(), |role| role.name().as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn creator(user: &Option<crate::models::User>) -> &str {
    user.as_ref().map_or("Unknown", |user| user.username().as_str())
}

impl DiscordClient {
    /// Upload a custom emoji, optionally restricted to roles.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_emoji(&self, params: &CreateEmoji) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;
        params.validate()?;
        self.require_bot(&guild, bit_of::MANAGE_GUILD_EXPRESSIONS, EMOJI_PERMISSION)
            .await?;

        let result: GuildResult<Outcome> = async {
            for role_id in &params.roles {
                if guild.role(role_id).is_none() {
                    return Err(GuildError::operation(format!("Role not found: {}", role_id)));
                }
            }
            let image = self.image_data_uri(&params.image_url).await?;
            let emoji: Emoji = self
                .fetch(
                    RestRequest::post(format!("/guilds/{}/emojis", guild.id()))
                        .json(json!({
                            "name": params.name,
                            "image": image,
                            "roles": params.roles,
                        }))
                        .reason(Some("Emoji created via Discord MCP")),
                )
                .await?;
            let id = emoji.id().clone().unwrap_or_default();
            info!(emoji_id = %id, "Emoji created");

            let access = if params.roles.is_empty() {
                "\n- Available to everyone".to_string()
            } else {
                format!(
                    "\n- Restricted to roles: {}",
                    role_names(&guild, &params.roles)
                )
            };
            Ok(Outcome::new(format!(
                "Successfully created emoji {} (ID: {})\n- Animated: {}\n- Usage: {}{}",
                emoji.name(),
                id,
                crate::format::yes_no(*emoji.animated()),
                emoji.usage(),
                access
            ))
            .with("emojiId", id))
        }
        .await;
        result.map_err(failed("create emoji"))
    }

    /// Remove a custom emoji.
    #[instrument(skip(self, params), fields(emoji_id = %params.emoji_id))]
    pub async fn delete_emoji(&self, params: &EmojiRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;
        params.validate()?;
        self.require_bot(&guild, bit_of::MANAGE_GUILD_EXPRESSIONS, EMOJI_PERMISSION)
            .await?;

        let result: GuildResult<Outcome> = async {
            let path = format!("/guilds/{}/emojis/{}", guild.id(), params.emoji_id);
            let emoji: Emoji = optional(self.fetch(RestRequest::get(&path)).await)?
                .ok_or_else(|| GuildError::operation("Emoji not found by emojiId"))?;
            self.send(RestRequest::delete(&path).reason(Some("Emoji deleted via Discord MCP")))
                .await?;
            info!(emoji_id = %params.emoji_id, "Emoji deleted");
            Ok(Outcome::new(format!(
                "Successfully deleted emoji {} (ID: {})",
                emoji.name(),
                params.emoji_id
            )))
        }
        .await;
        result.map_err(failed("delete emoji"))
    }

    /// Every custom emoji of a guild.
    #[instrument(skip(self, params))]
    pub async fn get_emojis(&self, params: &ExpressionsRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;

        let result: GuildResult<Outcome> = async {
            let emojis: Vec<Emoji> = self
                .fetch(RestRequest::get(format!("/guilds/{}/emojis", guild.id())))
                .await?;
            if emojis.is_empty() {
                return Ok(Outcome::new("No custom emojis found in this server").with("count", 0));
            }
            let blocks: Vec<String> = emojis
                .iter()
                .map(|emoji| {
                    let access = if emoji.roles().is_empty() {
                        "\n  - Available to everyone".to_string()
                    } else {
                        format!("\n  - Restricted to: {}", role_names(&guild, emoji.roles()))
                    };
                    format!(
                        "- **{}** (ID: {})\n  - Usage: {}\n  - Animated: {}\n  - Created by: {}{}",
                        emoji.name(),
                        emoji.id().as_deref().unwrap_or_default(),
                        emoji.usage(),
                        crate::format::yes_no(*emoji.animated()),
                        creator(emoji.user()),
                        access
                    )
                })
                .collect();
            Ok(Outcome::new(format!(
                "**Found {} custom emojis:**\n{}",
                emojis.len(),
                blocks.join("\n\n")
            ))
            .with("count", emojis.len()))
        }
        .await;
        result.map_err(failed("fetch emojis"))
    }

    /// Upload a custom sticker.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_sticker(&self, params: &CreateSticker) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;
        params.validate()?;
        self.require_bot(&guild, bit_of::MANAGE_GUILD_EXPRESSIONS, STICKER_PERMISSION)
            .await?;

        let result: GuildResult<Outcome> = async {
            let (file_name, data) = self.load_file(&params.image_url).await?;
            let sticker: Sticker = self
                .fetch(
                    RestRequest::post(format!("/guilds/{}/stickers", guild.id()))
                        .multipart(
                            vec![
                                ("name".to_string(), params.name.clone()),
                                ("description".to_string(), params.description.clone()),
                                ("tags".to_string(), params.tags.clone()),
                            ],
                            vec![FileUpload::new("file", file_name, data)],
                        )
                        .reason(Some("Sticker created via Discord MCP")),
                )
                .await?;
            info!(sticker_id = %sticker.id(), "Sticker created");
            Ok(Outcome::new(format!(
                "Successfully created sticker \"{}\" (ID: {})\n- Description: {}\n- Tags: {}\n- Format: {}",
                sticker.name(),
                sticker.id(),
                sticker.description().as_deref().unwrap_or(&params.description),
                sticker.tags(),
                sticker.format_name()
            ))
            .with("stickerId", sticker.id().as_str()))
        }
        .await;
        result.map_err(failed("create sticker"))
    }

    /// Remove a custom sticker.
    #[instrument(skip(self, params), fields(sticker_id = %params.sticker_id))]
    pub async fn delete_sticker(&self, params: &StickerRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;
        params.validate()?;
        self.require_bot(&guild, bit_of::MANAGE_GUILD_EXPRESSIONS, STICKER_PERMISSION)
            .await?;

        let result: GuildResult<Outcome> = async {
            let path = format!("/guilds/{}/stickers/{}", guild.id(), params.sticker_id);
            let sticker: Sticker = optional(self.fetch(RestRequest::get(&path)).await)?
                .ok_or_else(|| GuildError::operation("Sticker not found by stickerId"))?;
            self.send(RestRequest::delete(&path).reason(Some("Sticker deleted via Discord MCP")))
                .await?;
            info!(sticker_id = %params.sticker_id, "Sticker deleted");
            Ok(Outcome::new(format!(
                "Successfully deleted sticker \"{}\" (ID: {})",
                sticker.name(),
                params.sticker_id
            )))
        }
        .await;
        result.map_err(failed("delete sticker"))
    }

    /// Every custom sticker of a guild.
    #[instrument(skip(self, params))]
    pub async fn get_stickers(&self, params: &ExpressionsRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;

        let result: GuildResult<Outcome> = async {
            let stickers: Vec<Sticker> = self
                .fetch(RestRequest::get(format!("/guilds/{}/stickers", guild.id())))
                .await?;
            if stickers.is_empty() {
                return Ok(Outcome::new("No custom stickers found in this server").with("count", 0));
            }
            let blocks: Vec<String> = stickers
                .iter()
                .map(|sticker| {
                    let tags = if sticker.tags().is_empty() {
                        "No tags"
                    } else {
                        sticker.tags().as_str()
                    };
                    format!(
                        "- **{}** (ID: {})\n  - Description: {}\n  - Tags: {}\n  - Format: {}\n  - Created by: {}",
                        sticker.name(),
                        sticker.id(),
                        sticker
                            .description()
                            .as_deref()
                            .filter(|text| !text.is_empty())
                            .unwrap_or("No description"),
                        tags,
                        sticker.format_name(),
                        creator(sticker.user())
                    )
                })
                .collect();
            Ok(Outcome::new(format!(
                "**Found {} custom stickers:**\n{}",
                stickers.len(),
                blocks.join("\n\n")
            ))
            .with("count", stickers.len()))
        }
        .await;
        result.map_err(failed("fetch stickers"))
    }
}
