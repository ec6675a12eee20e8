//! Invite links.

use super::failed;
use super::server::GuildRef;
use crate::client::{DiscordClient, Outcome, Validate, optional};
use crate::format::{locale_datetime_str, yes_no};
use crate::models::{ChannelKind, Invite};
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

/// Longest invite lifetime Discord accepts, in seconds (7 days).
pub const MAX_INVITE_AGE: u32 = 604_800;

/// `create_invite`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvite {
    /// Text, voice, stage or announcement channel
    pub channel_id: String,
    /// Lifetime in seconds; 0 never expires
    #[serde(default)]
    pub max_age: Option<u32>,
    /// Use cap; 0 is unlimited
    #[serde(default)]
    pub max_uses: Option<u32>,
    /// Members joining through it are kicked when they go offline without a role
    #[serde(default)]
    pub temporary: Option<bool>,
}

/// `delete_invite`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteInvite {
    /// The invite code, with or without the `discord.gg/` prefix
    pub invite_code: String,
}

impl Validate for CreateInvite {
    fn validate(&self) -> GuildResult<()> {
        if self.channel_id.is_empty() {
            return Err(GuildError::validation("Channel ID is required"));
        }
        if self.max_age.is_some_and(|age| age > MAX_INVITE_AGE) {
            return Err(GuildError::validation(
                "maxAge must be between 0 and 604800 seconds",
            ));
        }
        if self.max_uses.is_some_and(|uses| uses > 100) {
            return Err(GuildError::validation("maxUses must be between 0 and 100"));
        }
        Ok(())
    }
}

impl Validate for DeleteInvite {
    fn validate(&self) -> GuildResult<()> {
        if invite_code(&self.invite_code).is_empty() {
            return Err(GuildError::validation("Invite code is required"));
        }
        Ok(())
    }
}

/// The bare code of an invite given as a code or a link.
fn invite_code(value: &str) -> &str {
    value
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

impl DiscordClient {
    /// Create a unique invite for a channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn create_invite(&self, params: &CreateInvite) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        params.validate()?;
        let channel = self
            .channel(&params.channel_id)
            .await?
            .ok_or_else(|| GuildError::operation("Channel not found by channelId"))?;
        if !matches!(
            channel.kind(),
            ChannelKind::GuildText
                | ChannelKind::GuildVoice
                | ChannelKind::GuildStageVoice
                | ChannelKind::GuildAnnouncement
        ) {
            return Err(GuildError::operation(
                "Channel does not support invite creation",
            ));
        }

        let max_age = params.max_age.unwrap_or(0);
        let max_uses = params.max_uses.unwrap_or(0);
        let temporary = params.temporary.unwrap_or(false);
        let result: GuildResult<Outcome> = async {
            let invite: Invite = self
                .fetch(
                    RestRequest::post(format!("/channels/{}/invites", channel.id())).json(json!({
                        "max_age": max_age,
                        "max_uses": max_uses,
                        "temporary": temporary,
                        "unique": true,
                    })),
                )
                .await?;
            info!(code = %invite.code(), "Invite created");

            let expires = if max_age == 0 {
                "Never".to_string()
            } else {
                format!("{} seconds", max_age)
            };
            let uses = if max_uses == 0 {
                "Unlimited".to_string()
            } else {
                max_uses.to_string()
            };
            Ok(Outcome::new(format!(
                "Successfully created invite: {}\n- Code: {}\n- Channel: {}\n- Expires: {}\n- Max Uses: {}\n- Temporary: {}",
                invite.url(),
                invite.code(),
                channel.name(),
                expires,
                uses,
                yes_no(temporary)
            ))
            .with("code", invite.code().as_str())
            .with("url", invite.url()))
        }
        .await;
        result.map_err(failed("create invite"))
    }

    /// Revoke an invite.
    #[instrument(skip(self, params), fields(code = %params.invite_code))]
    pub async fn delete_invite(&self, params: &DeleteInvite) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        params.validate()?;
        let code = invite_code(&params.invite_code);

        let result: GuildResult<Outcome> = async {
            let invite: Invite = optional(
                self.fetch(RestRequest::get(format!("/invites/{}", code)))
                    .await,
            )?
            .ok_or_else(|| GuildError::operation("Invite not found by invite code"))?;
            self.send(RestRequest::delete(format!("/invites/{}", invite.code())))
                .await?;
            info!(code, "Invite deleted");
            Ok(Outcome::new(format!("Successfully deleted invite {}", code)).with("code", code))
        }
        .await;
        result.map_err(failed("delete invite"))
    }

    /// Every invite of a guild with its usage.
    #[instrument(skip(self, params))]
    pub async fn get_invites(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;

        let result: GuildResult<Outcome> = async {
            let invites: Vec<Invite> = self
                .fetch(RestRequest::get(format!("/guilds/{}/invites", guild.id())))
                .await?;
            if invites.is_empty() {
                return Ok(Outcome::new("No invites found in this server").with("count", 0));
            }
            let blocks: Vec<String> = invites
                .iter()
                .map(|invite| {
                    let max_uses = if *invite.max_uses() == 0 {
                        "Unlimited".to_string()
                    } else {
                        invite.max_uses().to_string()
                    };
                    format!(
                        "- **{}** ({})\n  - Channel: {}\n  - Created by: {}\n  - Uses: {}/{}\n  - Expires: {}\n  - Temporary: {}",
                        invite.code(),
                        invite.url(),
                        invite
                            .channel()
                            .as_ref()
                            .and_then(|channel| channel.name().as_deref())
                            .unwrap_or("Unknown"),
                        invite
                            .inviter()
                            .as_ref()
                            .map_or("Unknown", |user| user.username().as_str()),
                        invite.uses(),
                        max_uses,
                        invite
                            .expires_at()
                            .as_deref()
                            .map_or_else(|| "Never".to_string(), locale_datetime_str),
                        yes_no(*invite.temporary())
                    )
                })
                .collect();
            Ok(Outcome::new(format!(
                "**Found {} invites:**\n{}",
                invites.len(),
                blocks.join("\n\n")
            ))
            .with("count", invites.len()))
        }
        .await;
        result.map_err(failed("fetch invites"))
    }
}
