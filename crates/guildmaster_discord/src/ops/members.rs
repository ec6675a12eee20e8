//! Member listing, search and editing.

use super::failed;
use crate::client::{DiscordClient, Outcome, Validate, highest_role};
use crate::format::{from_millis, locale_date, locale_datetime, parse_timestamp, truncate, yes_no};
use crate::models::{Guild, Member};
use crate::permissions;
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

const DEFAULT_AVATAR: &str = "https://cdn.discordapp.com/embed/avatars/0.png";

/// `get_members`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMembers {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Page size, 1 to 1000 (default 100)
    #[serde(default)]
    pub limit: Option<u32>,
    /// Only members with a larger user id
    #[serde(default)]
    pub after: Option<String>,
}

/// `search_members`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMembers {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Username or nickname prefix
    pub query: String,
    /// Result cap, 1 to 1000 (default 10)
    #[serde(default)]
    pub limit: Option<u32>,
}

/// `edit_member`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMember {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The member
    pub user_id: String,
    /// New nickname; empty clears it
    #[serde(default)]
    pub nickname: Option<String>,
    /// Replacement role ids
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

/// `get_member_info`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The member
    pub user_id: String,
}

fn check_limit(limit: Option<u32>) -> GuildResult<()> {
    if limit.is_some_and(|limit| !(1..=1000).contains(&limit)) {
        return Err(GuildError::validation("Limit must be between 1 and 1000"));
    }
    Ok(())
}

impl Validate for GetMembers {
    fn validate(&self) -> GuildResult<()> {
        check_limit(self.limit)
    }
}

impl Validate for SearchMembers {
    fn validate(&self) -> GuildResult<()> {
        if self.query.trim().is_empty() {
            return Err(GuildError::validation("Search query is required"));
        }
        check_limit(self.limit)
    }
}

impl Validate for EditMember {
    fn validate(&self) -> GuildResult<()> {
        if self.user_id.is_empty() {
            return Err(GuildError::validation("User ID is required"));
        }
        Ok(())
    }
}

impl Validate for MemberRef {
    fn validate(&self) -> GuildResult<()> {
        if self.user_id.is_empty() {
            return Err(GuildError::validation("User ID is required"));
        }
        Ok(())
    }
}

fn joined_date(member: &Member) -> String {
    member
        .joined_at()
        .as_deref()
        .and_then(parse_timestamp)
        .map_or_else(|| "Unknown".to_string(), locale_date)
}

/// Names of the member's roles other than `@everyone`, top first.
fn role_names(guild: &Guild, member: &Member, with_ids: bool) -> Vec<String> {
    let mut roles: Vec<_> = member
        .roles()
        .iter()
        .filter_map(|id| guild.role(id))
        .filter(|role| role.id() != guild.id())
        .collect();
    roles.sort_by(|a, b| b.position().cmp(a.position()));
    roles
        .into_iter()
        .map(|role| {
            if with_ids {
                format!("{} ({})", role.name(), role.id())
            } else {
                role.name().clone()
            }
        })
        .collect()
}

impl DiscordClient {
    /// One page of members with their roles.
    #[instrument(skip(self, params))]
    pub async fn get_members(&self, params: &GetMembers) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        params.validate()?;

        let result: GuildResult<Outcome> = async {
            let members: Vec<Member> = self
                .fetch(
                    RestRequest::get(format!("/guilds/{}/members", guild.id()))
                        .query("limit", params.limit.unwrap_or(100))
                        .query_opt("after", params.after.as_deref()),
                )
                .await?;
            let blocks: Vec<String> = members
                .iter()
                .map(|member| {
                    let roles = role_names(&guild, member, false);
                    format!(
                        "- **{}** ({})\n  - Nickname: {}\n  - Joined: {}\n  - Roles: {}",
                        member.username(),
                        member.user_id(),
                        member.nick().as_deref().unwrap_or("None"),
                        joined_date(member),
                        if roles.is_empty() {
                            "None".to_string()
                        } else {
                            roles.join(", ")
                        }
                    )
                })
                .collect();
            Ok(Outcome::new(format!(
                "**Retrieved {} members from {}:**\n{}",
                members.len(),
                guild.name(),
                blocks.join("\n\n")
            ))
            .with("count", members.len()))
        }
        .await;
        result.map_err(failed("fetch members"))
    }

    /// Members whose username or nickname starts with the query.
    #[instrument(skip(self, params), fields(query = %params.query))]
    pub async fn search_members(&self, params: &SearchMembers) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        params.validate()?;

        let result: GuildResult<Outcome> = async {
            let members: Vec<Member> = self
                .fetch(
                    RestRequest::get(format!("/guilds/{}/members/search", guild.id()))
                        .query("query", &params.query)
                        .query("limit", params.limit.unwrap_or(10)),
                )
                .await?;
            if members.is_empty() {
                return Ok(Outcome::new(format!(
                    "No members found matching query \"{}\"",
                    params.query
                ))
                .with("count", 0));
            }
            let blocks: Vec<String> = members
                .iter()
                .map(|member| {
                    format!(
                        "- **{}** ({})\n  - Nickname: {}\n  - Joined: {}",
                        member.username(),
                        member.user_id(),
                        member.nick().as_deref().unwrap_or("None"),
                        joined_date(member)
                    )
                })
                .collect();
            Ok(Outcome::new(format!(
                "**Found {} members matching \"{}\":**\n{}",
                members.len(),
                params.query,
                blocks.join("\n\n")
            ))
            .with("count", members.len()))
        }
        .await;
        result.map_err(failed("search members"))
    }

    /// Set a member's nickname and/or replace their roles.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn edit_member(&self, params: &EditMember) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        params.validate()?;

        let result: GuildResult<Outcome> = async {
            let member = self
                .member(guild.id(), &params.user_id)
                .await?
                .ok_or_else(|| GuildError::operation("Member not found in this server"))?;

            let mut body = Map::new();
            let mut changes = Vec::new();
            if let Some(nickname) = &params.nickname {
                let nick = Some(nickname.as_str()).filter(|nick| !nick.is_empty());
                body.insert("nick".into(), json!(nick));
                changes.push(format!("nickname to \"{}\"", nick.unwrap_or("None")));
            }
            if let Some(role_ids) = params.roles.as_ref().filter(|ids| !ids.is_empty()) {
                let names = role_ids
                    .iter()
                    .map(|id| {
                        guild
                            .role(id)
                            .map(|role| role.name().clone())
                            .ok_or_else(|| GuildError::operation(format!("Role not found: {}", id)))
                    })
                    .collect::<GuildResult<Vec<_>>>()?;
                body.insert("roles".into(), json!(role_ids));
                changes.push(format!("roles to: {}", names.join(", ")));
            }
            if changes.is_empty() {
                return Ok(Outcome::new("No changes specified for member edit"));
            }

            self.send(
                RestRequest::patch(format!("/guilds/{}/members/{}", guild.id(), params.user_id))
                    .json(Value::Object(body)),
            )
            .await?;
            info!(user_id = %params.user_id, "Member edited");
            Ok(Outcome::new(format!(
                "Successfully edited member {}. Changed: {}",
                member.username(),
                changes.join(", ")
            ))
            .with("userId", params.user_id.as_str()))
        }
        .await;
        result.map_err(failed("edit member"))
    }

    /// Profile, roles and guild permissions of a member.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn get_member_info(&self, params: &MemberRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        params.validate()?;

        let result: GuildResult<Outcome> = async {
            let member = self
                .member(guild.id(), &params.user_id)
                .await?
                .ok_or_else(|| GuildError::operation("Member not found in this server"))?;
            let user = member.user().clone().unwrap_or_default();

            let created = user
                .created_at_ms()
                .and_then(from_millis)
                .map_or_else(|| "Unknown".to_string(), locale_datetime);
            let joined = member
                .joined_at()
                .as_deref()
                .and_then(parse_timestamp)
                .map_or_else(|| "Unknown".to_string(), locale_datetime);
            let roles = role_names(&guild, &member, true);
            let highest = highest_role(&guild, &member)
                .map_or_else(|| "@everyone".to_string(), |role| role.name().clone());
            let permission_list =
                permissions::names(permissions::member_permissions(&guild, &member)).join(", ");
            let shown = truncate(&permission_list, 500);

            Ok(Outcome::new(format!(
                "**Member Information for {}:**\n\
                 - **User ID:** {}\n\
                 - **Nickname:** {}\n\
                 - **Account Created:** {}\n\
                 - **Joined Server:** {}\n\
                 - **Highest Role:** {}\n\
                 - **Avatar:** {}\n\
                 - **Bot:** {}\n\
                 - **Roles:**\n  - {}\n\
                 - **Key Permissions:** {}{}",
                user.username(),
                user.id(),
                member.nick().as_deref().unwrap_or("None"),
                created,
                joined,
                highest,
                user.avatar_url().unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
                yes_no(*user.bot()),
                if roles.is_empty() {
                    "None".to_string()
                } else {
                    roles.join("\n  - ")
                },
                if permission_list.is_empty() { "None" } else { shown },
                if shown.len() < permission_list.len() { "..." } else { "" }
            ))
            .with("userId", user.id().as_str()))
        }
        .await;
        result.map_err(failed("get member info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::{fixture, member_json};

    #[tokio::test]
    async fn test_get_members_page() {
        let (client, rest) = fixture().await;
        let outcome = client.get_members(&GetMembers::default()).await.unwrap();
        assert!(
            outcome
                .text()
                .starts_with("**Retrieved 4 members from Test Guild:**\n- **owner** (1)")
        );
        assert!(outcome.text().contains(
            "- **alice** (500)\n  - Nickname: None\n  - Joined: 1/5/2024\n  - Roles: Member"
        ));
        let request = &rest.requests_to(Method::Get, "/guilds/100/members")[0];
        assert!(
            request
                .query_pairs()
                .iter()
                .any(|(k, v)| k == "limit" && v == "100")
        );
    }

    #[tokio::test]
    async fn test_search_without_results() {
        let (client, rest) = fixture().await;
        rest.on(Method::Get, "/guilds/100/members/search", json!([]));
        let params = SearchMembers {
            guild_id: None,
            query: "zed".to_string(),
            limit: None,
        };
        let outcome = client.search_members(&params).await.unwrap();
        assert_eq!(outcome.text(), "No members found matching query \"zed\"");
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let (client, _rest) = fixture().await;
        let params = SearchMembers {
            guild_id: None,
            query: " ".to_string(),
            limit: None,
        };
        let err = client.search_members(&params).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Search query is required");
    }

    #[tokio::test]
    async fn test_search_lists_matches() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/guilds/100/members/search",
            json!([member_json("500", "alice", &["202"])]),
        );
        let params = SearchMembers {
            guild_id: None,
            query: "ali".to_string(),
            limit: Some(5),
        };
        let outcome = client.search_members(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "**Found 1 members matching \"ali\":**\n- **alice** (500)\n  - Nickname: None\n  - Joined: 1/5/2024"
        );
    }

    #[tokio::test]
    async fn test_edit_member_nickname_and_roles() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Patch,
            "/guilds/100/members/500",
            member_json("500", "alice", &["201"]),
        );
        let params = EditMember {
            guild_id: None,
            user_id: "500".to_string(),
            nickname: Some("Al".to_string()),
            roles: Some(vec!["201".to_string()]),
        };
        let outcome = client.edit_member(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully edited member alice. Changed: nickname to \"Al\", roles to: Moderator"
        );
        let body = rest.requests_to(Method::Patch, "/guilds/100/members/500")[0]
            .json_body()
            .cloned()
            .unwrap();
        assert_eq!(body, json!({ "nick": "Al", "roles": ["201"] }));
    }

    #[tokio::test]
    async fn test_edit_member_unknown_role() {
        let (client, rest) = fixture().await;
        let params = EditMember {
            guild_id: None,
            user_id: "500".to_string(),
            nickname: None,
            roles: Some(vec!["999".to_string()]),
        };
        let err = client.edit_member(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to edit member: Role not found: 999"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_member_info() {
        let (client, _rest) = fixture().await;
        let params = MemberRef {
            guild_id: None,
            user_id: "501".to_string(),
        };
        let outcome = client.get_member_info(&params).await.unwrap();
        let text = outcome.text();
        assert!(text.starts_with("**Member Information for bob:**\n- **User ID:** 501\n"));
        assert!(text.contains("- **Highest Role:** Moderator\n"));
        assert!(text.contains("- **Roles:**\n  - Moderator (201)\n"));
        assert!(text.contains("KickMembers"));
        assert!(text.contains(DEFAULT_AVATAR));
    }
}
