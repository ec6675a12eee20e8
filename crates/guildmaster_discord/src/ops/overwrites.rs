//! Per-channel permission overwrites for single roles and members.

use super::{failed, no_validation};
use crate::client::{DiscordClient, Outcome};
use crate::models::{Channel, Guild, Overwrite};
use crate::permissions;
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

/// Who an overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverwriteTarget {
    /// A role id
    Role,
    /// A user id
    Member,
}

impl OverwriteTarget {
    fn code(self) -> u8 {
        match self {
            Self::Role => Overwrite::ROLE,
            Self::Member => Overwrite::MEMBER,
        }
    }
}

/// `set_channel_permissions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetChannelPermissions {
    /// Channel to change
    pub channel_id: String,
    /// Role or user id
    pub target_id: String,
    /// Whether `target_id` is a role or a member
    pub target_type: OverwriteTarget,
    /// Permission names to allow
    #[serde(default)]
    pub allow: Vec<String>,
    /// Permission names to deny
    #[serde(default)]
    pub deny: Vec<String>,
}

/// `get_channel_permissions`, `sync_channel_permissions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPermissionsRef {
    /// The channel
    pub channel_id: String,
}

no_validation!(SetChannelPermissions, ChannelPermissionsRef);

fn listed(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

fn listed_bits(bits: u64) -> String {
    let names = permissions::names(bits);
    if names.is_empty() {
        "None".to_string()
    } else {
        names.join(", ")
    }
}

impl DiscordClient {
    /// A guild channel and its guild.
    async fn channel_with_guild(&self, channel_id: &str) -> GuildResult<(Channel, Guild)> {
        let missing = "Channel not found or not a guild channel";
        let channel = self
            .channel(channel_id)
            .await?
            .ok_or_else(|| GuildError::operation(missing))?;
        let guild_id = channel
            .guild_id()
            .clone()
            .ok_or_else(|| GuildError::operation(missing))?;
        let guild = self.guild_or(&guild_id, missing).await?;
        Ok((channel, guild))
    }

    /// Allow and deny permissions for one role or member on a channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, target = %params.target_id))]
    pub async fn set_channel_permissions(
        &self,
        params: &SetChannelPermissions,
    ) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let (channel, guild) = self.channel_with_guild(&params.channel_id).await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let allow = permissions::bits_lenient(&params.allow);
            let deny = permissions::bits_lenient(&params.deny);

            let target_name = match params.target_type {
                OverwriteTarget::Role => guild
                    .role(&params.target_id)
                    .ok_or_else(|| GuildError::operation("Role not found by targetId"))?
                    .name()
                    .clone(),
                OverwriteTarget::Member => self
                    .member(guild.id(), &params.target_id)
                    .await?
                    .ok_or_else(|| GuildError::operation("Member not found by targetId"))?
                    .username()
                    .to_string(),
            };

            self.send(
                RestRequest::put(format!(
                    "/channels/{}/permissions/{}",
                    channel.id(),
                    params.target_id
                ))
                .json(json!({
                    "type": params.target_type.code(),
                    "allow": allow.to_string(),
                    "deny": deny.to_string(),
                })),
            )
            .await?;
            info!(channel_id = %channel.id(), allow, deny, "Permission overwrite written");

            Ok(Outcome::new(format!(
                "Successfully set permissions for {} {} in channel {}. Allowed: {}, Denied: {}",
                params.target_type,
                target_name,
                channel.name(),
                listed(&params.allow),
                listed(&params.deny)
            ))
            .with("channelId", channel.id().as_str())
            .with("allow", allow.to_string())
            .with("deny", deny.to_string()))
        }
        .await;
        result.map_err(failed("set channel permissions"))
    }

    /// The channel's overwrites with permission names.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn get_channel_permissions(
        &self,
        params: &ChannelPermissionsRef,
    ) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let (channel, guild) = self.channel_with_guild(&params.channel_id).await?;

        let result: GuildResult<Outcome> = async {
            let overwrites = channel.permission_overwrites();
            if overwrites.is_empty() {
                return Ok(Outcome::new(format!(
                    "No permission overwrites found for channel {}",
                    channel.name()
                ))
                .with("count", 0));
            }

            let mut blocks = Vec::with_capacity(overwrites.len());
            for overwrite in overwrites {
                let is_role = *overwrite.kind() == Overwrite::ROLE;
                let target = if is_role {
                    guild
                        .role(overwrite.id())
                        .map(|role| format!("@{}", role.name()))
                        .unwrap_or_else(|| format!("Role ID: {}", overwrite.id()))
                } else {
                    self.member(guild.id(), overwrite.id())
                        .await?
                        .map(|member| format!("@{}", member.username()))
                        .unwrap_or_else(|| format!("User ID: {}", overwrite.id()))
                };
                blocks.push(format!(
                    "- **{}** ({}):\n  - Allowed: {}\n  - Denied: {}",
                    target,
                    if is_role { "Role" } else { "Member" },
                    listed_bits(overwrite.allow_bits()),
                    listed_bits(overwrite.deny_bits())
                ));
            }

            Ok(Outcome::new(format!(
                "**Permission overwrites for channel {}:**\n{}",
                channel.name(),
                blocks.join("\n\n")
            ))
            .with("count", overwrites.len()))
        }
        .await;
        result.map_err(failed("get channel permissions"))
    }

    /// Replace a channel's overwrites with its category's.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn sync_channel_permissions(
        &self,
        params: &ChannelPermissionsRef,
    ) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let (channel, guild) = self.channel_with_guild(&params.channel_id).await?;
        let parent_id = channel.parent_id().clone().ok_or_else(|| {
            GuildError::operation("Channel does not have a parent category to sync with")
        })?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let category = self
                .category(guild.id(), &parent_id, "Category not found by categoryId")
                .await?;
            let before = channel.permission_overwrites().len();
            let synced = self.lock_permissions(&channel).await?;
            let after = synced.permission_overwrites().len();
            Ok(Outcome::new(format!(
                "Successfully synced permissions for channel {} with category {}. Permission overwrites changed from {} to {}.",
                channel.name(),
                category.name(),
                before,
                after
            ))
            .with("channelId", channel.id().as_str()))
        }
        .await;
        result.map_err(failed("sync channel permissions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::bit_of;
    use crate::rest::Method;
    use crate::testing::{GUILD_ID, channel_json, fixture, kind};

    #[tokio::test]
    async fn test_set_role_overwrite() {
        let (client, rest) = fixture().await;
        rest.on(Method::Put, "/channels/301/permissions/201", json!(null));
        let params: SetChannelPermissions = serde_json::from_value(json!({
            "channelId": "301",
            "targetId": "201",
            "targetType": "role",
            "allow": ["ViewChannel", "SendMessages"],
            "deny": ["ManageMessages", "NotAPermission"]
        }))
        .unwrap();
        let outcome = client.set_channel_permissions(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully set permissions for role Moderator in channel general. Allowed: ViewChannel, SendMessages, Denied: ManageMessages, NotAPermission"
        );
        let put = &rest.requests_to(Method::Put, "/channels/301/permissions/201")[0];
        let body = put.json_body().unwrap();
        assert_eq!(body["type"], 0);
        assert_eq!(body["deny"], bit_of::MANAGE_MESSAGES.to_string());
    }

    #[tokio::test]
    async fn test_set_overwrite_for_missing_member() {
        let (client, rest) = fixture().await;
        let params: SetChannelPermissions = serde_json::from_value(json!({
            "channelId": "301",
            "targetId": "404",
            "targetType": "member",
            "allow": ["ViewChannel"]
        }))
        .unwrap();
        let err = client.set_channel_permissions(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to set channel permissions: Member not found by targetId"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_get_permissions_names_targets() {
        let (client, rest) = fixture().await;
        let mut channel = channel_json("304", kind::TEXT, "off-topic", None);
        channel["permission_overwrites"] = json!([
            { "id": GUILD_ID, "type": 0, "allow": "0", "deny": bit_of::VIEW_CHANNEL.to_string() },
            { "id": "500", "type": 1, "allow": bit_of::VIEW_CHANNEL.to_string(), "deny": "0" }
        ]);
        rest.on(Method::Get, "/channels/304", channel);
        let params = ChannelPermissionsRef {
            channel_id: "304".to_string(),
        };
        let outcome = client.get_channel_permissions(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "**Permission overwrites for channel off-topic:**\n\
             - **@@everyone** (Role):\n  - Allowed: None\n  - Denied: ViewChannel\n\n\
             - **@alice** (Member):\n  - Allowed: ViewChannel\n  - Denied: None"
        );
    }

    #[tokio::test]
    async fn test_get_permissions_without_overwrites() {
        let (client, _rest) = fixture().await;
        let params = ChannelPermissionsRef {
            channel_id: "303".to_string(),
        };
        let outcome = client.get_channel_permissions(&params).await.unwrap();
        assert_eq!(outcome.text(), "No permission overwrites found for channel news");
    }

    #[tokio::test]
    async fn test_sync_requires_parent() {
        let (client, _rest) = fixture().await;
        let params = ChannelPermissionsRef {
            channel_id: "304".to_string(),
        };
        let err = client.sync_channel_permissions(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Channel does not have a parent category to sync with"
        );
    }

    #[tokio::test]
    async fn test_sync_copies_category_overwrites() {
        let (client, rest) = fixture().await;
        let mut category = channel_json("300", kind::CATEGORY, "General Stuff", None);
        category["permission_overwrites"] = json!([
            { "id": GUILD_ID, "type": 0, "allow": "0", "deny": bit_of::VIEW_CHANNEL.to_string() }
        ]);
        rest.on(Method::Get, "/channels/300", category.clone());
        let mut synced = channel_json("301", kind::TEXT, "general", Some("300"));
        synced["permission_overwrites"] = category["permission_overwrites"].clone();
        rest.on(Method::Patch, "/channels/301", synced);

        let params = ChannelPermissionsRef {
            channel_id: "301".to_string(),
        };
        let outcome = client.sync_channel_permissions(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully synced permissions for channel general with category General Stuff. Permission overwrites changed from 0 to 1."
        );
    }
}
