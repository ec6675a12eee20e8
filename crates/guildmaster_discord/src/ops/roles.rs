//! Role lifecycle, assignment and ordering.

use super::server::GuildRef;
use super::{failed, no_validation};
use crate::client::{BotContext, DiscordClient, Outcome, Validate};
use crate::format::{hex_color, parse_hex_color, yes_no};
use crate::models::{Guild, Role};
use crate::permissions::{self, PERMISSIONS, bit_of};
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{info, instrument};

/// `create_role`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRole {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Role name
    pub name: String,
    /// `#RRGGBB`
    #[serde(default)]
    pub color: Option<String>,
    /// Permission names; unknown names are skipped
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// `delete_role`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The role
    pub role_id: String,
}

/// `edit_role`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRole {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The role
    pub role_id: String,
    /// New name, 1 to 100 characters
    #[serde(default)]
    pub name: Option<String>,
    /// `#RRGGBB`, `RRGGBB`, or `default`
    #[serde(default)]
    pub color: Option<String>,
    /// Replacement permission names; every name must be known
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// `add_role_to_member`, `remove_role_from_member`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRole {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The member
    pub user_id: String,
    /// The role
    pub role_id: String,
}

/// One entry of `set_role_positions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePosition {
    /// The role
    pub role_id: String,
    /// New position, 0 is the bottom
    pub position: i64,
}

/// `set_role_positions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRolePositions {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Moves to apply together
    pub role_positions: Vec<RolePosition>,
}

impl Validate for CreateRole {
    fn validate(&self) -> GuildResult<()> {
        if let Some(color) = &self.color {
            role_color(color)?;
        }
        Ok(())
    }
}

no_validation!(RoleRef, EditRole, MemberRole, SetRolePositions);

/// Parse a role color into its value and display form.
fn role_color(color: &str) -> GuildResult<(u32, String)> {
    if color.eq_ignore_ascii_case("default") || color.eq_ignore_ascii_case("none") {
        return Ok((0, "#000000".to_string()));
    }
    if color.starts_with('#') {
        return parse_hex_color(color)
            .map(|value| (value, color.to_string()))
            .ok_or_else(|| {
                GuildError::validation(format!(
                    "Invalid hex color format: {}. Use format #RRGGBB (e.g., #FF0000 for red)",
                    color
                ))
            });
    }
    parse_hex_color(color)
        .map(|value| (value, format!("#{}", color)))
        .ok_or_else(|| {
            GuildError::validation(format!(
                "Invalid color format: {}. Use hex format #RRGGBB or 'default'",
                color
            ))
        })
}

/// Whether the bot may move or edit `role`: it must sit below the bot's
/// highest role, unless it is that role.
fn editable(bot: &BotContext, role: &Role) -> bool {
    *role.position() < bot.highest_position()
        || bot
            .highest_role()
            .as_ref()
            .is_some_and(|highest| highest.id() == role.id())
}

fn hierarchy_error(verb: &str, bot: &BotContext, role: &Role) -> GuildError {
    let (name, position) = bot
        .highest_role()
        .as_ref()
        .map_or(("none", 0), |highest| (highest.name().as_str(), *highest.position()));
    GuildError::operation(format!(
        "Cannot {} role \"{}\" (position {}) - bot's highest role \"{}\" is at position {}. Bot can only {} roles below its highest role.",
        verb,
        role.name(),
        role.position(),
        name,
        position,
        if verb == "edit" { "edit" } else { "move" }
    ))
}

fn find_role<'a>(guild: &'a Guild, role_id: &str, missing: &str) -> GuildResult<&'a Role> {
    guild
        .role(role_id)
        .ok_or_else(|| GuildError::operation(missing))
}

impl DiscordClient {
    /// The bot's context, failing unless it can manage roles.
    pub(crate) async fn require_manage_roles(&self, guild: &Guild) -> GuildResult<BotContext> {
        let bot = self.bot_context(guild.clone()).await?;
        bot.require(
            bit_of::MANAGE_ROLES,
            "Bot doesn't have permission to manage roles",
        )?;
        Ok(bot)
    }

    /// Create a mentionable role.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_role(&self, params: &CreateRole) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        self.require_manage_roles(&guild).await?;

        let result: GuildResult<Outcome> = async {
            params.validate()?;
            let mut body = Map::new();
            body.insert("name".into(), json!(params.name));
            body.insert("mentionable".into(), json!(true));
            if let Some(color) = &params.color {
                body.insert("color".into(), json!(role_color(color)?.0));
            }
            let bits = permissions::bits_lenient(&params.permissions);
            if bits != 0 {
                body.insert("permissions".into(), json!(bits.to_string()));
            }

            let role: Role = self
                .fetch(
                    RestRequest::post(format!("/guilds/{}/roles", guild.id()))
                        .json(Value::Object(body)),
                )
                .await?;
            info!(role_id = %role.id(), "Role created");
            Ok(Outcome::new(format!(
                "Successfully created role: {} (ID: {}) with color {}",
                role.name(),
                role.id(),
                hex_color(*role.color())
            ))
            .with("roleId", role.id().as_str()))
        }
        .await;
        result.map_err(failed("create role"))
    }

    /// Delete a role below the bot's highest.
    #[instrument(skip(self, params), fields(role_id = %params.role_id))]
    pub async fn delete_role(&self, params: &RoleRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let bot = self.require_manage_roles(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let role = find_role(&guild, &params.role_id, "Role not found by roleId")?;
            if *role.position() >= bot.highest_position() {
                return Err(GuildError::operation(
                    "Cannot delete this role (insufficient permissions or role hierarchy)",
                ));
            }
            self.send(RestRequest::delete(format!(
                "/guilds/{}/roles/{}",
                guild.id(),
                role.id()
            )))
            .await?;
            info!(role_id = %role.id(), "Role deleted");
            Ok(Outcome::new(format!(
                "Successfully deleted role: {} (ID: {})",
                role.name(),
                role.id()
            ))
            .with("roleId", role.id().as_str()))
        }
        .await;
        result.map_err(failed("delete role"))
    }

    /// Rename, recolor or re-permission a role.
    #[instrument(skip(self, params), fields(role_id = %params.role_id))]
    pub async fn edit_role(&self, params: &EditRole) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let bot = self.require_manage_roles(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let role = guild
                .role(&params.role_id)
                .ok_or_else(|| GuildError::operation(format!("Role not found: {}", params.role_id)))?;
            if role.id() == guild.id() {
                return Err(GuildError::operation("Cannot edit @everyone role"));
            }
            if !editable(&bot, role) {
                return Err(hierarchy_error("edit", &bot, role));
            }

            let mut body = Map::new();
            let mut changes = Vec::new();
            if let Some(name) = &params.name {
                let length = name.chars().count();
                if length == 0 || length > 100 {
                    return Err(GuildError::validation(
                        "Role name must be between 1 and 100 characters",
                    ));
                }
                body.insert("name".into(), json!(name));
                changes.push(format!("name to \"{}\"", name));
            }
            if let Some(color) = &params.color {
                let (value, shown) = role_color(color)?;
                body.insert("color".into(), json!(value));
                changes.push(format!("color to {}", shown));
            }
            if let Some(names) = params.permissions.as_ref().filter(|names| !names.is_empty()) {
                let bits = permissions::bits_strict(names).map_err(|unknown| {
                    let known: Vec<&str> = PERMISSIONS.iter().take(10).map(|(n, _)| *n).collect();
                    GuildError::validation(format!(
                        "Invalid permissions: {}. Valid permissions include: {}... (use get_roles to see all permissions)",
                        unknown.join(", "),
                        known.join(", ")
                    ))
                })?;
                body.insert("permissions".into(), json!(bits.to_string()));
                changes.push(format!("permissions ({} permissions set)", names.len()));
            }

            if body.is_empty() {
                return Ok(Outcome::new("No changes specified for role edit"));
            }

            let updated: Role = self
                .fetch(
                    RestRequest::patch(format!("/guilds/{}/roles/{}", guild.id(), role.id()))
                        .json(Value::Object(body)),
                )
                .await?;
            Ok(Outcome::new(format!(
                "Successfully edited role \"{}\" (ID: {}). Changed: {}",
                updated.name(),
                params.role_id,
                changes.join(", ")
            ))
            .with("roleId", params.role_id.as_str()))
        }
        .await;
        result.map_err(failed("edit role"))
    }

    /// Give a member a role.
    #[instrument(skip(self, params), fields(user_id = %params.user_id, role_id = %params.role_id))]
    pub async fn add_role_to_member(&self, params: &MemberRole) -> GuildResult<Outcome> {
        self.change_member_role(params, true)
            .await
            .map_err(failed("add role to member"))
    }

    /// Take a role from a member.
    #[instrument(skip(self, params), fields(user_id = %params.user_id, role_id = %params.role_id))]
    pub async fn remove_role_from_member(&self, params: &MemberRole) -> GuildResult<Outcome> {
        self.change_member_role(params, false)
            .await
            .map_err(failed("remove role from member"))
    }

    async fn change_member_role(&self, params: &MemberRole, add: bool) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let bot = self.require_manage_roles(&guild).await?;

        let member = self
            .member(guild.id(), &params.user_id)
            .await?
            .ok_or_else(|| GuildError::operation("Member not found in this server"))?;
        let role = find_role(&guild, &params.role_id, "Role not found by roleId")?;
        if *role.position() >= bot.highest_position() {
            return Err(GuildError::operation(format!(
                "Cannot {} this role (insufficient permissions or role hierarchy)",
                if add { "assign" } else { "remove" }
            )));
        }

        let has_role = member.roles().iter().any(|id| id == role.id());
        if add && has_role {
            return Ok(Outcome::new(format!(
                "Member {} already has the role {}",
                member.username(),
                role.name()
            )));
        }
        if !add && !has_role {
            return Ok(Outcome::new(format!(
                "Member {} doesn't have the role {}",
                member.username(),
                role.name()
            )));
        }

        let path = format!(
            "/guilds/{}/members/{}/roles/{}",
            guild.id(),
            params.user_id,
            role.id()
        );
        let request = if add {
            RestRequest::put(path)
        } else {
            RestRequest::delete(path)
        };
        self.send(request).await?;
        info!(user_id = %params.user_id, role_id = %role.id(), add, "Member roles changed");

        let text = if add {
            format!(
                "Successfully added role {} to {} (ID: {})",
                role.name(),
                member.username(),
                params.user_id
            )
        } else {
            format!(
                "Successfully removed role {} from {} (ID: {})",
                role.name(),
                member.username(),
                params.user_id
            )
        };
        Ok(Outcome::new(text).with("roleId", role.id().as_str()))
    }

    /// Every role, top first, with what the bot may do to it.
    #[instrument(skip(self, params))]
    pub async fn get_roles(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;

        let result: GuildResult<Outcome> = async {
            let bot = self.bot_context(guild.clone()).await?;
            let can_manage = bot.has(bit_of::MANAGE_ROLES);
            let bot_position = bot.highest_position();

            let mut roles = guild.roles().clone();
            if roles.is_empty() {
                return Ok(Outcome::new("No roles found in this server"));
            }
            roles.sort_by(|a, b| b.position().cmp(a.position()));

            let members = self.all_members(guild.id()).await?;
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for member in &members {
                for role_id in member.roles() {
                    *counts.entry(role_id.as_str()).or_default() += 1;
                }
            }

            let blocks: Vec<String> = roles
                .iter()
                .map(|role| {
                    let is_everyone = role.id() == guild.id();
                    let member_count = if is_everyone {
                        members.len()
                    } else {
                        counts.get(role.id().as_str()).copied().unwrap_or(0)
                    };
                    let manageable = bot.highest_role().is_some()
                        && *role.position() < bot_position
                        && !is_everyone;
                    let reason = if !manageable && !is_everyone {
                        if *role.position() >= bot_position {
                            " (higher/equal position)"
                        } else {
                            " (permission issue)"
                        }
                    } else {
                        ""
                    };
                    let permission_names = permissions::names(role.permission_bits());
                    format!(
                        "- **{}** (ID: `{}`)\n  - Color: {}\n  - Position: {}\n  - Members: {}\n  - Mentionable: {}\n  - Hoisted: {}\n  - Permissions: {}\n  - Special: {}\n  - Bot can reposition: {}{}",
                        role.name(),
                        role.id(),
                        hex_color(*role.color()),
                        role.position(),
                        member_count,
                        yes_no(*role.mentionable()),
                        yes_no(*role.hoist()),
                        if permission_names.is_empty() {
                            "None".to_string()
                        } else {
                            permission_names.join(", ")
                        },
                        if is_everyone { "@everyone role" } else { "Regular role" },
                        if manageable && can_manage { "✅ Yes" } else { "❌ No" },
                        reason
                    )
                })
                .collect();

            let (bot_role_name, bot_role_position) = bot
                .highest_role()
                .as_ref()
                .map_or(("none".to_string(), 0), |role| (role.name().clone(), *role.position()));
            Ok(Outcome::new(format!(
                "📋 **Roles in {}** ({} total)\n\n\
                 🤖 **Bot Status:**\n\
                 - Bot's highest role: **{}** (Position: {})\n\
                 - Has \"Manage Roles\" permission: {}\n\n\
                 📝 **Role Positioning Rules:**\n\
                 - Bot can only move roles **below** its highest role\n\
                 - @everyone role cannot be repositioned\n\
                 - Positions are 0-based (0 = bottom, higher number = top)\n\n\
                 🎭 **Server Roles:**\n\n{}",
                guild.name(),
                blocks.len(),
                bot_role_name,
                bot_role_position,
                if can_manage { "✅ Yes" } else { "❌ No" },
                blocks.join("\n\n")
            ))
            .with("count", blocks.len()))
        }
        .await;
        result.map_err(failed("fetch roles"))
    }

    /// Move several roles in one call.
    #[instrument(skip(self, params), fields(count = params.role_positions.len()))]
    pub async fn set_role_positions(&self, params: &SetRolePositions) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        let bot = self.require_manage_roles(&guild).await?;

        let result: GuildResult<Outcome> = async {
            let mut moves = Vec::with_capacity(params.role_positions.len());
            for entry in &params.role_positions {
                let role = guild.role(&entry.role_id).ok_or_else(|| {
                    GuildError::operation(format!("Role not found: {}", entry.role_id))
                })?;
                if role.id() == guild.id() {
                    return Err(GuildError::operation("Cannot reposition @everyone role"));
                }
                if !editable(&bot, role) {
                    return Err(hierarchy_error("reposition", &bot, role));
                }
                if entry.position < 0 {
                    return Err(GuildError::validation(format!(
                        "Invalid position {} for role {}. Position must be 0 or higher.",
                        entry.position,
                        role.name()
                    )));
                }
                moves.push((role, entry.position));
            }
            if moves.is_empty() {
                return Ok(Outcome::new("No roles to reposition"));
            }

            let body: Vec<Value> = moves
                .iter()
                .map(|(role, position)| json!({ "id": role.id(), "position": position }))
                .collect();
            self.send(
                RestRequest::patch(format!("/guilds/{}/roles", guild.id())).json(Value::Array(body)),
            )
            .await?;
            info!(count = moves.len(), "Roles repositioned");

            let changed: Vec<String> = moves
                .iter()
                .map(|(role, position)| {
                    format!("{} ({}) to position {}", role.name(), role.id(), position)
                })
                .collect();
            Ok(Outcome::new(format!(
                "Successfully updated {} role positions: {}",
                moves.len(),
                changed.join(", ")
            ))
            .with("count", moves.len()))
        }
        .await;
        result.map_err(failed("set role positions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::{fixture, role_json};

    fn member_role(user_id: &str, role_id: &str) -> MemberRole {
        MemberRole {
            guild_id: None,
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        }
    }

    #[test]
    fn test_role_color_formats() {
        assert_eq!(role_color("#FF0000").unwrap(), (0xff0000, "#FF0000".to_string()));
        assert_eq!(role_color("00ff00").unwrap(), (0x00ff00, "#00ff00".to_string()));
        assert_eq!(role_color("default").unwrap().0, 0);
        assert!(
            role_color("#F00")
                .unwrap_err()
                .kind()
                .to_string()
                .starts_with("Invalid hex color format: #F00")
        );
        assert!(
            role_color("red")
                .unwrap_err()
                .kind()
                .to_string()
                .starts_with("Invalid color format: red")
        );
    }

    #[tokio::test]
    async fn test_create_role_is_mentionable() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Post,
            "/guilds/100/roles",
            role_json("210", "Helpers", 1, bit_of::KICK_MEMBERS),
        );
        let params = CreateRole {
            guild_id: None,
            name: "Helpers".to_string(),
            color: Some("#00ff00".to_string()),
            permissions: vec!["KickMembers".to_string(), "Teleport".to_string()],
        };
        let outcome = client.create_role(&params).await.unwrap();
        assert!(
            outcome
                .text()
                .starts_with("Successfully created role: Helpers (ID: 210) with color #")
        );
        let body = rest.requests_to(Method::Post, "/guilds/100/roles")[0]
            .json_body()
            .cloned()
            .unwrap();
        assert_eq!(body["mentionable"], true);
        assert_eq!(body["color"], 0x00ff00);
        assert_eq!(body["permissions"], bit_of::KICK_MEMBERS.to_string());
    }

    #[tokio::test]
    async fn test_delete_role_above_bot_is_refused() {
        let (client, rest) = fixture().await;
        let params = RoleRef {
            guild_id: None,
            role_id: "206".to_string(),
        };
        let err = client.delete_role(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to delete role: Cannot delete this role (insufficient permissions or role hierarchy)"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_edit_role_rejects_unknown_permissions() {
        let (client, rest) = fixture().await;
        let params = EditRole {
            guild_id: None,
            role_id: "201".to_string(),
            name: None,
            color: None,
            permissions: Some(vec!["Fly".to_string()]),
        };
        let err = client.edit_role(&params).await.unwrap_err();
        assert!(
            err.kind()
                .to_string()
                .starts_with("Failed to edit role: Invalid permissions: Fly. Valid permissions include: ")
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_edit_role_reports_changes() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Patch,
            "/guilds/100/roles/201",
            role_json("201", "Mods", 2, bit_of::KICK_MEMBERS),
        );
        let params = EditRole {
            guild_id: None,
            role_id: "201".to_string(),
            name: Some("Mods".to_string()),
            color: Some("ff0000".to_string()),
            permissions: None,
        };
        let outcome = client.edit_role(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully edited role \"Mods\" (ID: 201). Changed: name to \"Mods\", color to #ff0000"
        );
    }

    #[tokio::test]
    async fn test_edit_role_without_changes() {
        let (client, rest) = fixture().await;
        let params = EditRole {
            guild_id: None,
            role_id: "201".to_string(),
            name: None,
            color: None,
            permissions: Some(Vec::new()),
        };
        let outcome = client.edit_role(&params).await.unwrap();
        assert_eq!(outcome.text(), "No changes specified for role edit");
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_edit_role_above_bot_names_positions() {
        let (client, _rest) = fixture().await;
        let params = EditRole {
            guild_id: None,
            role_id: "206".to_string(),
            name: Some("Owners".to_string()),
            color: None,
            permissions: None,
        };
        let err = client.edit_role(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to edit role: Cannot edit role \"Admin\" (position 6) - bot's highest role \"Bot\" is at position 5. Bot can only edit roles below its highest role."
        );
    }

    #[tokio::test]
    async fn test_add_role_already_held() {
        let (client, rest) = fixture().await;
        let outcome = client
            .add_role_to_member(&member_role("500", "202"))
            .await
            .unwrap();
        assert_eq!(outcome.text(), "Member alice already has the role Member");
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_add_and_remove_role() {
        let (client, rest) = fixture().await;
        rest.on(Method::Put, "/guilds/100/members/500/roles/201", json!(null));
        let outcome = client
            .add_role_to_member(&member_role("500", "201"))
            .await
            .unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully added role Moderator to alice (ID: 500)"
        );

        rest.on(Method::Delete, "/guilds/100/members/500/roles/202", json!(null));
        let outcome = client
            .remove_role_from_member(&member_role("500", "202"))
            .await
            .unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully removed role Member from alice (ID: 500)"
        );
    }

    #[tokio::test]
    async fn test_get_roles_lists_top_first() {
        let (client, _rest) = fixture().await;
        let outcome = client.get_roles(&GuildRef::default()).await.unwrap();
        let text = outcome.text();
        assert!(text.starts_with("📋 **Roles in Test Guild** (5 total)"));
        assert!(text.contains("- Bot's highest role: **Bot** (Position: 5)"));
        let admin = text.find("**Admin**").unwrap();
        let member = text.find("**Member**").unwrap();
        assert!(admin < member);
        assert!(text.contains("  - Bot can reposition: ❌ No (higher/equal position)"));
    }

    #[tokio::test]
    async fn test_set_role_positions_sends_one_patch() {
        let (client, rest) = fixture().await;
        rest.on(Method::Patch, "/guilds/100/roles", json!([]));
        let params: SetRolePositions = serde_json::from_value(json!({
            "rolePositions": [
                { "roleId": "201", "position": 1 },
                { "roleId": "202", "position": 2 }
            ]
        }))
        .unwrap();
        let outcome = client.set_role_positions(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully updated 2 role positions: Moderator (201) to position 1, Member (202) to position 2"
        );
        let body = rest.requests_to(Method::Patch, "/guilds/100/roles")[0]
            .json_body()
            .cloned()
            .unwrap();
        assert_eq!(body[0]["id"], "201");
    }

    #[tokio::test]
    async fn test_set_role_positions_rejects_everyone() {
        let (client, rest) = fixture().await;
        let params: SetRolePositions = serde_json::from_value(json!({
            "rolePositions": [{ "roleId": "100", "position": 3 }]
        }))
        .unwrap();
        let err = client.set_role_positions(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to set role positions: Cannot reposition @everyone role"
        );
        assert!(rest.mutations().is_empty());
    }
}
