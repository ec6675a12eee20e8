//! Bans, kicks, timeouts and the audit log.

use super::server::GuildRef;
use super::{failed, no_validation};
use crate::client::{DiscordClient, Outcome, Validate, optional};
use crate::format::{from_millis, iso, snowflake_timestamp};
use crate::models::{AuditLog, AuditLogEntry, Ban, Guild, Member};
use crate::permissions::{self, bit_of};
use crate::rest::RestRequest;
use chrono::{Duration, Utc};
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

/// Longest timeout Discord allows, in minutes (28 days).
pub const MAX_TIMEOUT_MINUTES: i64 = 28 * 24 * 60;

const NO_REASON: &str = "No reason provided";

/// Audit log event names and their codes.
pub const AUDIT_LOG_EVENTS: &[(&str, u32)] = &[
    ("GuildUpdate", 1),
    ("ChannelCreate", 10),
    ("ChannelUpdate", 11),
    ("ChannelDelete", 12),
    ("ChannelOverwriteCreate", 13),
    ("ChannelOverwriteUpdate", 14),
    ("ChannelOverwriteDelete", 15),
    ("MemberKick", 20),
    ("MemberPrune", 21),
    ("MemberBanAdd", 22),
    ("MemberBanRemove", 23),
    ("MemberUpdate", 24),
    ("MemberRoleUpdate", 25),
    ("MemberMove", 26),
    ("MemberDisconnect", 27),
    ("BotAdd", 28),
    ("RoleCreate", 30),
    ("RoleUpdate", 31),
    ("RoleDelete", 32),
    ("InviteCreate", 40),
    ("InviteUpdate", 41),
    ("InviteDelete", 42),
    ("WebhookCreate", 50),
    ("WebhookUpdate", 51),
    ("WebhookDelete", 52),
    ("EmojiCreate", 60),
    ("EmojiUpdate", 61),
    ("EmojiDelete", 62),
    ("MessageDelete", 72),
    ("MessageBulkDelete", 73),
    ("MessagePin", 74),
    ("MessageUnpin", 75),
    ("IntegrationCreate", 80),
    ("IntegrationUpdate", 81),
    ("IntegrationDelete", 82),
    ("StageInstanceCreate", 83),
    ("StageInstanceUpdate", 84),
    ("StageInstanceDelete", 85),
    ("StickerCreate", 90),
    ("StickerUpdate", 91),
    ("StickerDelete", 92),
    ("GuildScheduledEventCreate", 100),
    ("GuildScheduledEventUpdate", 101),
    ("GuildScheduledEventDelete", 102),
    ("ThreadCreate", 110),
    ("ThreadUpdate", 111),
    ("ThreadDelete", 112),
    ("ApplicationCommandPermissionUpdate", 121),
    ("AutoModerationRuleCreate", 140),
    ("AutoModerationRuleUpdate", 141),
    ("AutoModerationRuleDelete", 142),
    ("AutoModerationBlockMessage", 143),
    ("AutoModerationFlagToChannel", 144),
    ("AutoModerationUserCommunicationDisabled", 145),
];

/// Name of an audit log event code.
pub fn audit_event_name(code: u32) -> String {
    AUDIT_LOG_EVENTS
        .iter()
        .find(|(_, known)| *known == code)
        .map_or_else(|| code.to_string(), |(name, _)| (*name).to_string())
}

/// Code of an audit log event given by name (any case) or number.
pub fn audit_event_code(value: &str) -> Option<u32> {
    value.trim().parse().ok().or_else(|| {
        AUDIT_LOG_EVENTS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value.trim()))
            .map(|(_, code)| *code)
    })
}

/// `ban_member`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanMember {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// User to ban
    pub user_id: String,
    /// Audit log reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Days of their messages to delete, 0 to 7
    #[serde(default)]
    pub delete_message_days: Option<u32>,
}

/// `unban_member`, `kick_member`, `remove_timeout`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberAction {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Target user
    pub user_id: String,
    /// Audit log reason
    #[serde(default)]
    pub reason: Option<String>,
}

/// `timeout_member`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutMember {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Target user
    pub user_id: String,
    /// Minutes, at most 28 days
    pub duration: i64,
    /// Audit log reason
    #[serde(default)]
    pub reason: Option<String>,
}

/// `get_audit_logs`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAuditLogs {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Entries to fetch, 1 to 100 (default 50)
    #[serde(default)]
    pub limit: Option<u32>,
    /// Event name such as `MemberBanAdd`, or its numeric code
    #[serde(default)]
    pub action_type: Option<String>,
}

impl Validate for BanMember {
    fn validate(&self) -> GuildResult<()> {
        if self.delete_message_days.is_some_and(|days| days > 7) {
            return Err(GuildError::validation(
                "deleteMessageDays must be between 0 and 7",
            ));
        }
        Ok(())
    }
}

impl Validate for TimeoutMember {
    fn validate(&self) -> GuildResult<()> {
        if self.duration <= 0 {
            return Err(GuildError::validation(
                "Timeout duration must be a positive number of minutes",
            ));
        }
        Ok(())
    }
}

impl Validate for GetAuditLogs {
    fn validate(&self) -> GuildResult<()> {
        if self.limit.is_some_and(|limit| !(1..=100).contains(&limit)) {
            return Err(GuildError::validation("Limit must be between 1 and 100"));
        }
        if let Some(action) = &self.action_type
            && audit_event_code(action).is_none()
        {
            return Err(GuildError::validation(format!(
                "Unknown audit log action type: {}",
                action
            )));
        }
        Ok(())
    }
}

no_validation!(MemberAction);

/// Whether a member's timeout is still running.
fn is_timed_out(member: &Member) -> bool {
    member
        .communication_disabled_until()
        .as_deref()
        .and_then(crate::format::parse_timestamp)
        .is_some_and(|until| until > Utc::now())
}

fn audit_target(log: &AuditLog, guild: &Guild, entry: &AuditLogEntry) -> String {
    let Some(target) = entry.target_id() else {
        return "Unknown".to_string();
    };
    log.users()
        .iter()
        .find(|user| user.id() == target)
        .map(|user| user.username().clone())
        .or_else(|| guild.role(target).map(|role| role.name().clone()))
        .unwrap_or_else(|| format!("ID: {}", target))
}

impl DiscordClient {
    pub(crate) async fn require_bot(&self, guild: &Guild, bits: u64, message: &str) -> GuildResult<()> {
        self.bot_context(guild.clone()).await?.require(bits, message)
    }

    /// Ban a user, optionally deleting their recent messages.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn ban_member(&self, params: &BanMember) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_bot(&guild, bit_of::BAN_MEMBERS, "Bot doesn't have permission to ban members")
            .await?;
        params.validate()?;
        let reason = params.reason.as_deref().unwrap_or(NO_REASON);

        let result: GuildResult<Outcome> = async {
            let username = self
                .member(guild.id(), &params.user_id)
                .await?
                .map_or_else(|| params.user_id.clone(), |member| member.username().to_string());
            let delete_seconds = params.delete_message_days.unwrap_or(0) * 86_400;
            self.send(
                RestRequest::put(format!("/guilds/{}/bans/{}", guild.id(), params.user_id))
                    .json(json!({ "delete_message_seconds": delete_seconds }))
                    .reason(Some(reason)),
            )
            .await?;
            info!(user_id = %params.user_id, "Member banned");
            Ok(Outcome::new(format!(
                "Successfully banned user {} (ID: {}) from {}. Reason: {}",
                username,
                params.user_id,
                guild.name(),
                reason
            ))
            .with("userId", params.user_id.as_str()))
        }
        .await;
        result.map_err(failed("ban member"))
    }

    /// Lift a ban.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn unban_member(&self, params: &MemberAction) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_bot(&guild, bit_of::BAN_MEMBERS, "Bot doesn't have permission to unban members")
            .await?;
        let reason = params.reason.as_deref().unwrap_or(NO_REASON);

        let ban: Ban = optional(
            self.fetch(RestRequest::get(format!(
                "/guilds/{}/bans/{}",
                guild.id(),
                params.user_id
            )))
            .await,
        )
        .map_err(failed("unban member"))?
        .ok_or_else(|| GuildError::operation("User is not banned from this server"))?;

        self.send(
            RestRequest::delete(format!("/guilds/{}/bans/{}", guild.id(), params.user_id))
                .reason(Some(reason)),
        )
        .await
        .map_err(failed("unban member"))?;
        info!(user_id = %params.user_id, "Member unbanned");
        Ok(Outcome::new(format!(
            "Successfully unbanned user {} (ID: {}) from {}. Reason: {}",
            ban.user().username(),
            params.user_id,
            guild.name(),
            reason
        ))
        .with("userId", params.user_id.as_str()))
    }

    /// Kick a member the bot outranks.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn kick_member(&self, params: &MemberAction) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let bot = self.bot_context(guild.clone()).await?;
        bot.require(bit_of::KICK_MEMBERS, "Bot doesn't have permission to kick members")?;
        let reason = params.reason.as_deref().unwrap_or(NO_REASON);

        let result: GuildResult<Outcome> = async {
            let member = self
                .member(guild.id(), &params.user_id)
                .await?
                .ok_or_else(|| GuildError::operation("Member not found in this server"))?;
            if !bot.outranks(&member) {
                return Err(GuildError::operation(
                    "Cannot kick this member (insufficient permissions or role hierarchy)",
                ));
            }
            self.send(
                RestRequest::delete(format!("/guilds/{}/members/{}", guild.id(), params.user_id))
                    .reason(Some(reason)),
            )
            .await?;
            info!(user_id = %params.user_id, "Member kicked");
            Ok(Outcome::new(format!(
                "Successfully kicked {} (ID: {}) from {}. Reason: {}",
                member.username(),
                params.user_id,
                guild.name(),
                reason
            ))
            .with("userId", params.user_id.as_str()))
        }
        .await;
        result.map_err(failed("kick member"))
    }

    /// Time a member out for a number of minutes.
    #[instrument(skip(self, params), fields(user_id = %params.user_id, minutes = params.duration))]
    pub async fn timeout_member(&self, params: &TimeoutMember) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let bot = self.bot_context(guild.clone()).await?;
        bot.require(
            bit_of::MODERATE_MEMBERS,
            "Bot doesn't have permission to timeout members",
        )?;
        let reason = params.reason.as_deref().unwrap_or(NO_REASON);

        let result: GuildResult<Outcome> = async {
            let member = self
                .member(guild.id(), &params.user_id)
                .await?
                .ok_or_else(|| GuildError::operation("Member not found in this server"))?;
            let target_is_admin =
                permissions::member_permissions(&guild, &member) & bit_of::ADMINISTRATOR != 0;
            if !bot.outranks(&member) || target_is_admin {
                return Err(GuildError::operation(
                    "Cannot timeout this member (insufficient permissions or role hierarchy)",
                ));
            }
            if params.duration > MAX_TIMEOUT_MINUTES {
                return Err(GuildError::validation(
                    "Timeout duration cannot exceed 28 days",
                ));
            }
            params.validate()?;

            let until = Utc::now() + Duration::minutes(params.duration);
            self.send(
                RestRequest::patch(format!("/guilds/{}/members/{}", guild.id(), params.user_id))
                    .json(json!({ "communication_disabled_until": iso(until) }))
                    .reason(Some(reason)),
            )
            .await?;
            info!(user_id = %params.user_id, until = %iso(until), "Member timed out");
            Ok(Outcome::new(format!(
                "Successfully timed out {} (ID: {}) for {} minutes. Reason: {}",
                member.username(),
                params.user_id,
                params.duration,
                reason
            ))
            .with("userId", params.user_id.as_str())
            .with("until", iso(until)))
        }
        .await;
        result.map_err(failed("timeout member"))
    }

    /// End a running timeout.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn remove_timeout(&self, params: &MemberAction) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_bot(
            &guild,
            bit_of::MODERATE_MEMBERS,
            "Bot doesn't have permission to remove timeouts",
        )
        .await?;
        let reason = params.reason.as_deref().unwrap_or("Timeout removed");

        let result: GuildResult<Outcome> = async {
            let member = self
                .member(guild.id(), &params.user_id)
                .await?
                .ok_or_else(|| GuildError::operation("Member not found in this server"))?;
            if !is_timed_out(&member) {
                return Err(GuildError::operation("Member is not currently timed out"));
            }
            self.send(
                RestRequest::patch(format!("/guilds/{}/members/{}", guild.id(), params.user_id))
                    .json(json!({ "communication_disabled_until": null }))
                    .reason(Some(reason)),
            )
            .await?;
            Ok(Outcome::new(format!(
                "Successfully removed timeout for {} (ID: {}). Reason: {}",
                member.username(),
                params.user_id,
                reason
            ))
            .with("userId", params.user_id.as_str()))
        }
        .await;
        result.map_err(failed("remove timeout"))
    }

    /// Recent audit log entries, optionally of one event type.
    #[instrument(skip(self, params))]
    pub async fn get_audit_logs(&self, params: &GetAuditLogs) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_bot(
            &guild,
            bit_of::VIEW_AUDIT_LOG,
            "Bot doesn't have permission to view audit logs",
        )
        .await?;

        let result: GuildResult<Outcome> = async {
            params.validate()?;
            let action = params.action_type.as_deref().and_then(audit_event_code);
            let log: AuditLog = self
                .fetch(
                    RestRequest::get(format!("/guilds/{}/audit-logs", guild.id()))
                        .query("limit", params.limit.unwrap_or(50))
                        .query_opt("action_type", action),
                )
                .await?;

            let lines: Vec<String> = log
                .audit_log_entries()
                .iter()
                .map(|entry| {
                    let executor = entry
                        .user_id()
                        .as_deref()
                        .and_then(|id| log.users().iter().find(|user| user.id() == id))
                        .map_or("Unknown", |user| user.username().as_str());
                    let timestamp = snowflake_timestamp(entry.id())
                        .and_then(from_millis)
                        .map_or_else(|| "Unknown".to_string(), iso);
                    format!(
                        "- [{}] **{}** by {} on {} - Reason: {}",
                        timestamp,
                        audit_event_name(*entry.action_type()),
                        executor,
                        audit_target(&log, &guild, entry),
                        entry.reason().as_deref().unwrap_or(NO_REASON)
                    )
                })
                .collect();

            Ok(Outcome::new(format!(
                "**Retrieved {} audit log entries:**\n{}",
                lines.len(),
                lines.join("\n")
            ))
            .with("count", lines.len()))
        }
        .await;
        result.map_err(failed("fetch audit logs"))
    }

    /// Every ban with its reason.
    #[instrument(skip(self, params))]
    pub async fn get_bans(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_bot(&guild, bit_of::BAN_MEMBERS, "Bot doesn't have permission to view bans")
            .await?;

        let result: GuildResult<Outcome> = async {
            let bans: Vec<Ban> = self
                .fetch(RestRequest::get(format!("/guilds/{}/bans", guild.id())).query("limit", 1000))
                .await?;
            if bans.is_empty() {
                return Ok(Outcome::new("No bans found in this server").with("count", 0));
            }
            let lines: Vec<String> = bans
                .iter()
                .map(|ban| {
                    format!(
                        "- **{}** (ID: {}) - Reason: {}",
                        ban.user().username(),
                        ban.user().id(),
                        ban.reason().as_deref().unwrap_or(NO_REASON)
                    )
                })
                .collect();
            Ok(Outcome::new(format!(
                "**Retrieved {} bans:**\n{}",
                lines.len(),
                lines.join("\n")
            ))
            .with("count", lines.len()))
        }
        .await;
        result.map_err(failed("fetch bans"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::{fixture, member_json, user_json};

    fn action(user_id: &str) -> MemberAction {
        MemberAction {
            guild_id: None,
            user_id: user_id.to_string(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_ban_deletes_requested_days() {
        let (client, rest) = fixture().await;
        rest.on(Method::Put, "/guilds/100/bans/500", json!(null));
        let params = BanMember {
            guild_id: None,
            user_id: "500".to_string(),
            reason: Some("spam".to_string()),
            delete_message_days: Some(2),
        };
        let outcome = client.ban_member(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully banned user alice (ID: 500) from Test Guild. Reason: spam"
        );
        let put = &rest.requests_to(Method::Put, "/guilds/100/bans/500")[0];
        assert_eq!(put.json_body().unwrap()["delete_message_seconds"], 172_800);
        assert_eq!(put.audit_reason(), Some("spam"));
    }

    #[tokio::test]
    async fn test_ban_rejects_long_message_purge() {
        let (client, rest) = fixture().await;
        let params = BanMember {
            guild_id: None,
            user_id: "500".to_string(),
            reason: None,
            delete_message_days: Some(9),
        };
        let err = client.ban_member(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "deleteMessageDays must be between 0 and 7"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_unban_requires_existing_ban() {
        let (client, _rest) = fixture().await;
        let err = client.unban_member(&action("500")).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "User is not banned from this server");
    }

    #[tokio::test]
    async fn test_kick_refuses_owner() {
        let (client, rest) = fixture().await;
        let err = client.kick_member(&action("1")).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to kick member: Cannot kick this member (insufficient permissions or role hierarchy)"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_kick_member_below_bot() {
        let (client, rest) = fixture().await;
        rest.on(Method::Delete, "/guilds/100/members/501", json!(null));
        let outcome = client.kick_member(&action("501")).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully kicked bob (ID: 501) from Test Guild. Reason: No reason provided"
        );
    }

    #[tokio::test]
    async fn test_timeout_cap() {
        let (client, rest) = fixture().await;
        let params = TimeoutMember {
            guild_id: None,
            user_id: "500".to_string(),
            duration: MAX_TIMEOUT_MINUTES + 1,
            reason: None,
        };
        let err = client.timeout_member(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to timeout member: Timeout duration cannot exceed 28 days"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_sets_expiry() {
        let (client, rest) = fixture().await;
        rest.on(Method::Patch, "/guilds/100/members/500", json!({}));
        let params = TimeoutMember {
            guild_id: None,
            user_id: "500".to_string(),
            duration: 10,
            reason: Some("cool off".to_string()),
        };
        let outcome = client.timeout_member(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully timed out alice (ID: 500) for 10 minutes. Reason: cool off"
        );
        let patch = &rest.requests_to(Method::Patch, "/guilds/100/members/500")[0];
        assert!(patch.json_body().unwrap()["communication_disabled_until"].is_string());
    }

    #[tokio::test]
    async fn test_remove_timeout_when_not_timed_out() {
        let (client, _rest) = fixture().await;
        let err = client.remove_timeout(&action("500")).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to remove timeout: Member is not currently timed out"
        );
    }

    #[tokio::test]
    async fn test_remove_running_timeout() {
        let (client, rest) = fixture().await;
        let mut alice = member_json("500", "alice", &["202"]);
        alice["communication_disabled_until"] = json!(iso(Utc::now() + Duration::hours(1)));
        rest.on(Method::Get, "/guilds/100/members/500", alice);
        rest.on(Method::Patch, "/guilds/100/members/500", json!({}));
        let outcome = client.remove_timeout(&action("500")).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully removed timeout for alice (ID: 500). Reason: Timeout removed"
        );
    }

    #[tokio::test]
    async fn test_audit_logs_render_names() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/guilds/100/audit-logs",
            json!({
                "audit_log_entries": [{
                    "id": "1215848714428960768",
                    "user_id": "1",
                    "target_id": "500",
                    "action_type": 22,
                    "reason": null
                }],
                "users": [user_json("1", "owner"), user_json("500", "alice")]
            }),
        );
        let params = GetAuditLogs {
            action_type: Some("memberbanadd".to_string()),
            ..Default::default()
        };
        let outcome = client.get_audit_logs(&params).await.unwrap();
        assert!(outcome.text().starts_with("**Retrieved 1 audit log entries:**\n- ["));
        assert!(outcome
            .text()
            .ends_with("] **MemberBanAdd** by owner on alice - Reason: No reason provided"));
        let request = &rest.requests_to(Method::Get, "/guilds/100/audit-logs")[0];
        assert!(request.query_pairs().iter().any(|(k, v)| k == "action_type" && v == "22"));
    }

    #[test]
    fn test_unknown_audit_action_is_rejected() {
        let params = GetAuditLogs {
            action_type: Some("Teleport".to_string()),
            ..Default::default()
        };
        assert_eq!(
            params.validate().unwrap_err().kind().to_string(),
            "Unknown audit log action type: Teleport"
        );
        assert_eq!(audit_event_code("22"), Some(22));
        assert_eq!(audit_event_name(999), "999");
    }

    #[tokio::test]
    async fn test_get_bans_lists_reasons() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/guilds/100/bans",
            json!([{ "reason": "raid", "user": user_json("666", "mallory") }]),
        );
        let outcome = client.get_bans(&GuildRef::default()).await.unwrap();
        assert_eq!(
            outcome.text(),
            "**Retrieved 1 bans:**\n- **mallory** (ID: 666) - Reason: raid"
        );
    }
}
