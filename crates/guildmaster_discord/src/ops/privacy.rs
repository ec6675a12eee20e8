//! Channel and category visibility: who may see what.
//!
//! Privacy is expressed entirely through permission overwrites. Making a
//! target private replaces its overwrites with a `ViewChannel` deny for
//! @everyone plus `ViewChannel` (and `Connect`) grants for the listed roles
//! and members; making it public replaces them with a `ViewChannel` allow.

use super::failed;
use crate::client::{DiscordClient, Outcome, Validate};
use crate::models::{Channel, Guild, Overwrite};
use crate::permissions::bit_of;
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

/// `set_channel_private`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetChannelPrivate {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The channel
    pub channel_id: String,
    /// Private (deny @everyone) or public (allow @everyone)
    pub is_private: bool,
    /// Roles granted access
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    /// Members granted access
    #[serde(default)]
    pub allowed_members: Option<Vec<String>>,
    /// Afterwards copy the parent category's overwrites
    #[serde(default)]
    pub sync_to_category: Option<bool>,
}

/// `set_category_private`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCategoryPrivate {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The category
    pub category_id: String,
    /// Private (deny @everyone) or public (allow @everyone)
    pub is_private: bool,
    /// Roles granted access
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    /// Members granted access
    #[serde(default)]
    pub allowed_members: Option<Vec<String>>,
    /// Sync every child channel to the category afterwards
    #[serde(default)]
    pub apply_to_channels: Option<bool>,
}

/// What a bulk privacy target is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PrivacyTargetKind {
    /// A channel
    Channel,
    /// A category
    Category,
}

/// One entry of `bulk_set_privacy`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyTarget {
    /// Channel or category id
    pub id: String,
    /// Which of the two it is
    #[serde(rename = "type")]
    pub kind: PrivacyTargetKind,
    /// Private or public
    pub is_private: bool,
    /// Roles granted access
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    /// Members granted access
    #[serde(default)]
    pub allowed_members: Option<Vec<String>>,
}

/// `bulk_set_privacy`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSetPrivacy {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Targets, applied in order
    pub targets: Vec<PrivacyTarget>,
}

impl Validate for SetChannelPrivate {}
impl Validate for SetCategoryPrivate {}

impl Validate for BulkSetPrivacy {
    fn validate(&self) -> GuildResult<()> {
        if self.targets.is_empty() {
            return Err(GuildError::validation("targets cannot be empty"));
        }
        Ok(())
    }
}

/// Overwrites in the shape Discord's channel PATCH expects.
pub(crate) fn overwrites_json(overwrites: &[Overwrite]) -> Value {
    Value::Array(
        overwrites
            .iter()
            .map(|overwrite| {
                json!({
                    "id": overwrite.id(),
                    "type": overwrite.kind(),
                    "allow": overwrite.allow(),
                    "deny": overwrite.deny()
                })
            })
            .collect(),
    )
}

/// @everyone allow/deny plus grants for the listed roles and members.
fn visibility_overwrites(
    guild: &Guild,
    is_private: bool,
    roles: &[String],
    members: &[String],
    grant: u64,
) -> Vec<Overwrite> {
    let everyone = if is_private {
        Overwrite::new(guild.id(), Overwrite::ROLE, 0, bit_of::VIEW_CHANNEL)
    } else {
        Overwrite::new(guild.id(), Overwrite::ROLE, bit_of::VIEW_CHANNEL, 0)
    };
    std::iter::once(everyone)
        .chain(
            roles
                .iter()
                .map(|id| Overwrite::new(id.as_str(), Overwrite::ROLE, grant, 0)),
        )
        .chain(
            members
                .iter()
                .map(|id| Overwrite::new(id.as_str(), Overwrite::MEMBER, grant, 0)),
        )
        .collect()
}

fn visibility_changes(is_private: bool, roles: &[String], members: &[String]) -> Vec<String> {
    let mut changes = vec![if is_private {
        "made private (denied @everyone access)".to_string()
    } else {
        "made public (granted @everyone access)".to_string()
    }];
    if !roles.is_empty() {
        changes.push(format!("granted access to {} role(s)", roles.len()));
    }
    if !members.is_empty() {
        changes.push(format!("granted access to {} member(s)", members.len()));
    }
    changes
}

impl DiscordClient {
    /// Replace a channel's overwrites.
    pub(crate) async fn set_overwrites(
        &self,
        channel_id: &str,
        overwrites: &[Overwrite],
    ) -> GuildResult<Channel> {
        debug!(channel_id, count = overwrites.len(), "Replacing permission overwrites");
        self.fetch(
            RestRequest::patch(format!("/channels/{}", channel_id))
                .json(json!({ "permission_overwrites": overwrites_json(overwrites) })),
        )
        .await
    }

    /// Copy the parent category's overwrites onto a channel.
    pub(crate) async fn lock_permissions(&self, channel: &Channel) -> GuildResult<Channel> {
        let parent_id = channel
            .parent_id()
            .as_deref()
            .ok_or_else(|| GuildError::operation("Channel is not in a category"))?;
        let parent = self
            .channel(parent_id)
            .await?
            .ok_or_else(|| GuildError::operation("Category not found by categoryId"))?;
        self.set_overwrites(channel.id(), parent.permission_overwrites())
            .await
    }

    fn check_roles(&self, guild: &Guild, roles: &[String]) -> GuildResult<()> {
        match roles.iter().find(|id| guild.role(id).is_none()) {
            Some(missing) => Err(GuildError::operation(format!("Role not found: {}", missing))),
            None => Ok(()),
        }
    }

    async fn check_members(&self, guild: &Guild, members: &[String]) -> GuildResult<()> {
        for id in members {
            if self.member(guild.id(), id).await?.is_none() {
                return Err(GuildError::operation(format!("Member not found: {}", id)));
            }
        }
        Ok(())
    }

    /// Apply creation-time privacy: no-op unless private or roles are given.
    pub(crate) async fn configure_privacy(
        &self,
        guild: &Guild,
        channel: &Channel,
        is_private: bool,
        allowed_roles: &[String],
    ) -> GuildResult<()> {
        if !is_private && allowed_roles.is_empty() {
            return Ok(());
        }
        let result: GuildResult<()> = async {
            self.check_roles(guild, allowed_roles)?;
            let mut overwrites = Vec::new();
            if is_private {
                overwrites.push(Overwrite::new(
                    guild.id(),
                    Overwrite::ROLE,
                    0,
                    bit_of::VIEW_CHANNEL,
                ));
            }
            overwrites.extend(allowed_roles.iter().map(|id| {
                Overwrite::new(
                    id.as_str(),
                    Overwrite::ROLE,
                    bit_of::VIEW_CHANNEL | bit_of::CONNECT,
                    0,
                )
            }));
            self.set_overwrites(channel.id(), &overwrites).await?;
            Ok(())
        }
        .await;
        result.map_err(failed("configure channel privacy"))
    }

    /// Make a channel private or public and grant roles or members access.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, private = params.is_private))]
    pub async fn set_channel_private(&self, params: &SetChannelPrivate) -> GuildResult<Outcome> {
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
            let roles = params.allowed_roles.as_deref().unwrap_or_default();
            let members = params.allowed_members.as_deref().unwrap_or_default();
            self.check_roles(&guild, roles)?;
            self.check_members(&guild, members).await?;

            let grant = if channel.kind().is_voice_based() {
                bit_of::VIEW_CHANNEL | bit_of::CONNECT
            } else {
                bit_of::VIEW_CHANNEL
            };
            let overwrites = visibility_overwrites(&guild, params.is_private, roles, members, grant);
            let updated = self.set_overwrites(channel.id(), &overwrites).await?;
            let mut changes = visibility_changes(params.is_private, roles, members);

            if params.sync_to_category == Some(true) && updated.parent_id().is_some() {
                match self.lock_permissions(&updated).await {
                    Ok(_) => changes.push("synced permissions with category".to_string()),
                    Err(e) => {
                        warn!(channel_id = %channel.id(), error = %e.kind(), "Category sync failed");
                        changes.push("(failed to sync with category)".to_string());
                    }
                }
            }

            Ok(Outcome::new(format!(
                "Successfully updated privacy for channel \"{}\" (ID: {}). Changes: {}",
                channel.name(),
                params.channel_id,
                changes.join(", ")
            ))
            .with("channelId", params.channel_id.as_str()))
        }
        .await;
        result.map_err(failed("set channel privacy"))
    }

    /// Make a category private or public, optionally syncing its channels.
    #[instrument(skip(self, params), fields(category_id = %params.category_id, private = params.is_private))]
    pub async fn set_category_private(&self, params: &SetCategoryPrivate) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_manage_channels(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let category = self
                .category(
                    guild.id(),
                    &params.category_id,
                    &format!("Category not found or not a category: {}", params.category_id),
                )
                .await?;
            let roles = params.allowed_roles.as_deref().unwrap_or_default();
            let members = params.allowed_members.as_deref().unwrap_or_default();
            self.check_roles(&guild, roles)?;
            self.check_members(&guild, members).await?;

            let overwrites = visibility_overwrites(
                &guild,
                params.is_private,
                roles,
                members,
                bit_of::VIEW_CHANNEL | bit_of::CONNECT,
            );
            self.set_overwrites(category.id(), &overwrites).await?;
            let mut changes = visibility_changes(params.is_private, roles, members);

            if params.apply_to_channels == Some(true) {
                let children: Vec<Channel> = self
                    .guild_channels(guild.id())
                    .await?
                    .into_iter()
                    .filter(|channel| channel.parent_id().as_deref() == Some(category.id().as_str()))
                    .collect();
                let mut synced = 0;
                for child in &children {
                    match self.set_overwrites(child.id(), &overwrites).await {
                        Ok(_) => synced += 1,
                        Err(e) => {
                            warn!(channel_id = %child.id(), error = %e.kind(), "Channel sync failed")
                        }
                    }
                }
                if synced > 0 {
                    changes.push(format!("applied to {} channel(s) in category", synced));
                }
            }

            Ok(Outcome::new(format!(
                "Successfully updated privacy for category \"{}\" (ID: {}). Changes: {}",
                category.name(),
                params.category_id,
                changes.join(", ")
            ))
            .with("categoryId", params.category_id.as_str()))
        }
        .await;
        result.map_err(failed("set category privacy"))
    }

    /// Apply privacy to many channels and categories, continuing past failures.
    #[instrument(skip(self, params), fields(targets = params.targets.len()))]
    pub async fn bulk_set_privacy(&self, params: &BulkSetPrivacy) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_manage_channels(&guild).await?;

        let mut succeeded = 0usize;
        let mut errors = Vec::new();
        for target in &params.targets {
            let outcome = match target.kind {
                PrivacyTargetKind::Channel => {
                    self.set_channel_private(&SetChannelPrivate {
                        guild_id: Some(guild.id().clone()),
                        channel_id: target.id.clone(),
                        is_private: target.is_private,
                        allowed_roles: target.allowed_roles.clone(),
                        allowed_members: target.allowed_members.clone(),
                        sync_to_category: None,
                    })
                    .await
                }
                PrivacyTargetKind::Category => {
                    self.set_category_private(&SetCategoryPrivate {
                        guild_id: Some(guild.id().clone()),
                        category_id: target.id.clone(),
                        is_private: target.is_private,
                        allowed_roles: target.allowed_roles.clone(),
                        allowed_members: target.allowed_members.clone(),
                        apply_to_channels: None,
                    })
                    .await
                }
            };
            match outcome {
                Ok(_) => succeeded += 1,
                Err(e) => errors.push(format!("Failed {} {}: {}", target.kind, target.id, e.kind())),
            }
        }

        let mut summary = vec![format!("Successfully updated {} target(s)", succeeded)];
        if !errors.is_empty() {
            summary.push(format!("{} failed", errors.len()));
            summary.push(format!("Errors: {}", errors.join("; ")));
        }
        Ok(Outcome::new(summary.join(". "))
            .with("succeeded", succeeded)
            .with("failed", errors.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::{GUILD_ID, channel_json, fixture, kind};

    #[tokio::test]
    async fn test_private_voice_channel_grants_connect() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Patch,
            "/channels/302",
            channel_json("302", kind::VOICE, "Lounge", Some("300")),
        );
        let params = SetChannelPrivate {
            channel_id: "302".to_string(),
            is_private: true,
            allowed_roles: Some(vec!["201".to_string()]),
            allowed_members: Some(vec!["500".to_string()]),
            ..Default::default()
        };
        let outcome = client.set_channel_private(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully updated privacy for channel \"Lounge\" (ID: 302). Changes: made private (denied @everyone access), granted access to 1 role(s), granted access to 1 member(s)"
        );

        let patch = &rest.requests_to(Method::Patch, "/channels/302")[0];
        let overwrites = &patch.json_body().unwrap()["permission_overwrites"];
        let grant = (bit_of::VIEW_CHANNEL | bit_of::CONNECT).to_string();
        assert_eq!(overwrites[1]["allow"], grant.as_str());
        assert_eq!(overwrites[2]["type"], 1);
    }

    #[tokio::test]
    async fn test_unknown_role_aborts_before_mutation() {
        let (client, rest) = fixture().await;
        let params = SetChannelPrivate {
            channel_id: "301".to_string(),
            is_private: true,
            allowed_roles: Some(vec!["999".to_string()]),
            ..Default::default()
        };
        let err = client.set_channel_private(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to set channel privacy: Role not found: 999"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_category_privacy_applies_to_children() {
        let (client, rest) = fixture().await;
        for (id, kind, name) in [
            ("300", kind::CATEGORY, "General Stuff"),
            ("301", kind::TEXT, "general"),
            ("302", kind::VOICE, "Lounge"),
        ] {
            rest.on(
                Method::Patch,
                &format!("/channels/{}", id),
                channel_json(id, kind, name, None),
            );
        }
        let params = SetCategoryPrivate {
            category_id: "300".to_string(),
            is_private: false,
            apply_to_channels: Some(true),
            ..Default::default()
        };
        let outcome = client.set_category_private(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully updated privacy for category \"General Stuff\" (ID: 300). Changes: made public (granted @everyone access), applied to 2 channel(s) in category"
        );
    }

    #[tokio::test]
    async fn test_bulk_privacy_counts_failures() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Patch,
            "/channels/301",
            channel_json("301", kind::TEXT, "general", Some("300")),
        );
        let params: BulkSetPrivacy = serde_json::from_value(json!({
            "guildId": GUILD_ID,
            "targets": [
                {"id": "301", "type": "channel", "isPrivate": true},
                {"id": "301", "type": "category", "isPrivate": true},
                {"id": "999", "type": "channel", "isPrivate": false}
            ]
        }))
        .unwrap();
        let outcome = client.bulk_set_privacy(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully updated 1 target(s). 2 failed. Errors: Failed category 301: Failed to set category privacy: Category not found or not a category: 301; Failed channel 999: Failed to set channel privacy: Channel not found: 999"
        );
        assert_eq!(outcome.field("failed"), Some(&json!(2)));
    }
}
