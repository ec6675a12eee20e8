//! Automod rules.

use super::failed;
use crate::client::{DiscordClient, Outcome, Validate, optional};
use crate::models::AutoModRule;
use crate::permissions::bit_of;
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::str::FromStr;
use tracing::{info, instrument};

/// Action type that blocks the offending message.
const BLOCK_MESSAGE: u8 = 1;

/// What an automod rule reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum TriggerType {
    /// Words from a user-defined list
    Keyword = 1,
    /// Generic spam detection
    Spam = 3,
    /// Discord's predefined word lists
    KeywordPreset = 4,
    /// Too many mentions in one message
    MentionSpam = 5,
}

impl TriggerType {
    fn label(self) -> &'static str {
        match self {
            TriggerType::Keyword => "Keyword",
            TriggerType::Spam => "Spam",
            TriggerType::KeywordPreset => "KeywordPreset",
            TriggerType::MentionSpam => "MentionSpam",
        }
    }
}

/// When an automod rule is checked. Discord only supports message sends
/// for rule creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum EventType {
    /// A member sends or edits a message
    MessageSend = 1,
}

/// A keyword preset, by name or number.
fn preset_code(value: &str) -> GuildResult<u8> {
    match value.to_ascii_uppercase().as_str() {
        "PROFANITY" | "1" => Ok(1),
        "SEXUAL_CONTENT" | "2" => Ok(2),
        "SLURS" | "3" => Ok(3),
        _ => Err(GuildError::validation(format!("Invalid preset: {}", value))),
    }
}

/// `create_automod_rule`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAutomodRule {
    /// Guild to add the rule to
    pub guild_id: String,
    /// Rule name
    pub name: String,
    /// `MESSAGE_SEND`
    pub event_type: String,
    /// `KEYWORD`, `SPAM`, `KEYWORD_PRESET` or `MENTION_SPAM`
    pub trigger_type: String,
    /// Words to block for keyword rules
    #[serde(default)]
    pub keyword_filter: Option<Vec<String>>,
    /// Preset lists for preset rules
    #[serde(default)]
    pub presets: Option<Vec<String>>,
    /// Words exempt from the filter
    #[serde(default)]
    pub allow_list: Option<Vec<String>>,
    /// Mention cap for mention spam rules
    #[serde(default)]
    pub mention_limit: Option<u32>,
    /// Defaults to enabled
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// `edit_automod_rule`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAutomodRule {
    /// Guild holding the rule
    pub guild_id: String,
    /// The rule
    pub rule_id: String,
    /// New name
    #[serde(default)]
    pub name: Option<String>,
    /// Enable or disable
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Replacement keyword list
    #[serde(default)]
    pub keyword_filter: Option<Vec<String>>,
    /// Replacement allow list
    #[serde(default)]
    pub allow_list: Option<Vec<String>>,
    /// New mention cap
    #[serde(default)]
    pub mention_limit: Option<u32>,
}

/// `delete_automod_rule`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomodRuleRef {
    /// Guild holding the rule
    pub guild_id: String,
    /// The rule
    pub rule_id: String,
}

/// `get_automod_rules`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomodRules {
    /// Guild to list
    pub guild_id: String,
}

impl Validate for CreateAutomodRule {
    fn validate(&self) -> GuildResult<()> {
        if self.name.is_empty() || self.event_type.is_empty() || self.trigger_type.is_empty() {
            return Err(GuildError::validation(
                "Rule name, event type, and trigger type are required",
            ));
        }
        Ok(())
    }
}

impl Validate for EditAutomodRule {
    fn validate(&self) -> GuildResult<()> {
        if self.rule_id.is_empty() {
            return Err(GuildError::validation("Rule ID is required"));
        }
        Ok(())
    }
}

impl Validate for AutomodRuleRef {
    fn validate(&self) -> GuildResult<()> {
        if self.rule_id.is_empty() {
            return Err(GuildError::validation("Rule ID is required"));
        }
        Ok(())
    }
}

super::no_validation!(AutomodRules);

fn rules_path(guild_id: &str) -> String {
    format!("/guilds/{}/auto-moderation/rules", guild_id)
}

impl DiscordClient {
    async fn automod_rule(&self, guild_id: &str, rule_id: &str) -> GuildResult<AutoModRule> {
        optional(
            self.fetch(RestRequest::get(format!("{}/{}", rules_path(guild_id), rule_id)))
                .await,
        )?
        .ok_or_else(|| GuildError::operation("Automod rule not found by ruleId"))
    }

    /// Create a rule that blocks matching messages.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_automod_rule(&self, params: &CreateAutomodRule) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;
        params.validate()?;
        self.require_bot(
            &guild,
            bit_of::MANAGE_GUILD,
            "Bot requires 'Manage Server' permission to create automod rules",
        )
        .await?;

        let result: GuildResult<Outcome> = async {
            let trigger = TriggerType::from_str(&params.trigger_type).map_err(|_| {
                GuildError::validation(format!("Invalid trigger type: {}", params.trigger_type))
            })?;
            let event = EventType::from_str(&params.event_type).map_err(|_| {
                GuildError::validation(format!("Invalid event type: {}", params.event_type))
            })?;

            let mut body = json!({
                "name": params.name,
                "event_type": event as u8,
                "trigger_type": trigger as u8,
                "enabled": params.enabled != Some(false),
                "actions": [{ "type": BLOCK_MESSAGE }],
            });
            let metadata = match (trigger, &params.keyword_filter, params.mention_limit, &params.presets) {
                (TriggerType::Keyword, Some(keywords), _, _) => Some(json!({
                    "keyword_filter": keywords,
                    "allow_list": params.allow_list.clone().unwrap_or_default(),
                })),
                (TriggerType::MentionSpam, _, Some(limit), _) if limit > 0 => {
                    Some(json!({ "mention_total_limit": limit }))
                }
                (TriggerType::KeywordPreset, _, _, Some(presets)) => {
                    let codes = presets
                        .iter()
                        .map(|preset| preset_code(preset))
                        .collect::<GuildResult<Vec<u8>>>()?;
                    Some(json!({ "presets": codes }))
                }
                _ => None,
            };
            if let Some(metadata) = metadata {
                body["trigger_metadata"] = metadata;
            }

            let rule: AutoModRule = self
                .fetch(RestRequest::post(rules_path(guild.id())).json(body))
                .await?;
            info!(rule_id = %rule.id(), trigger = %trigger, "Automod rule created");
            Ok(Outcome::new(format!(
                "Successfully created automod rule \"{}\" (ID: {})\n- Event Type: {}\n- Trigger Type: {}\n- Enabled: {}\n- Actions: Block Message",
                rule.name(),
                rule.id(),
                params.event_type,
                params.trigger_type,
                rule.enabled()
            ))
            .with("ruleId", rule.id().as_str()))
        }
        .await;
        result.map_err(failed("create automod rule"))
    }

    /// Rename, toggle or retune a rule.
    #[instrument(skip(self, params), fields(rule_id = %params.rule_id))]
    pub async fn edit_automod_rule(&self, params: &EditAutomodRule) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;
        params.validate()?;
        self.require_bot(
            &guild,
            bit_of::MANAGE_GUILD,
            "Bot requires 'Manage Server' permission to edit automod rules",
        )
        .await?;

        let result: GuildResult<Outcome> = async {
            let rule = self.automod_rule(guild.id(), &params.rule_id).await?;
            let mut body = Map::new();
            let mut changes = Vec::new();

            if let Some(name) = params.name.as_ref().filter(|name| *name != rule.name()) {
                body.insert("name".to_string(), json!(name));
                changes.push(format!("Name: \"{}\" → \"{}\"", rule.name(), name));
            }
            if let Some(enabled) = params.enabled.filter(|enabled| enabled != rule.enabled()) {
                body.insert("enabled".to_string(), json!(enabled));
                changes.push(format!("Enabled: {} → {}", rule.enabled(), enabled));
            }

            if params.keyword_filter.is_some()
                || params.allow_list.is_some()
                || params.mention_limit.is_some()
            {
                let current = rule.trigger_metadata();
                let mut metadata = Map::new();
                let keywords = params.keyword_filter.as_ref().unwrap_or(current.keyword_filter());
                let allow = params.allow_list.as_ref().unwrap_or(current.allow_list());
                if !keywords.is_empty() {
                    metadata.insert("keyword_filter".to_string(), json!(keywords));
                }
                if !allow.is_empty() {
                    metadata.insert("allow_list".to_string(), json!(allow));
                }
                if !current.presets().is_empty() {
                    metadata.insert("presets".to_string(), json!(current.presets()));
                }
                if let Some(limit) = params.mention_limit.or(*current.mention_total_limit()) {
                    metadata.insert("mention_total_limit".to_string(), json!(limit));
                }

                if let Some(keywords) = &params.keyword_filter {
                    changes.push(format!("Keywords updated ({} keywords)", keywords.len()));
                }
                if let Some(allow) = &params.allow_list {
                    changes.push(format!("Allow list updated ({} items)", allow.len()));
                }
                if let Some(limit) = params.mention_limit {
                    let previous = current
                        .mention_total_limit()
                        .filter(|limit| *limit > 0)
                        .map_or_else(|| "None".to_string(), |limit| limit.to_string());
                    changes.push(format!("Mention limit: {} → {}", previous, limit));
                }
                body.insert("trigger_metadata".to_string(), Value::Object(metadata));
            }

            if changes.is_empty() {
                return Ok(Outcome::new("No changes specified for the automod rule"));
            }

            let updated: AutoModRule = self
                .fetch(
                    RestRequest::patch(format!("{}/{}", rules_path(guild.id()), rule.id()))
                        .json(Value::Object(body)),
                )
                .await?;
            info!(rule_id = %updated.id(), changes = changes.len(), "Automod rule edited");
            let lines: Vec<String> = changes.iter().map(|change| format!("- {}", change)).collect();
            Ok(Outcome::new(format!(
                "Successfully edited automod rule \"{}\" (ID: {})\nChanges made:\n{}",
                updated.name(),
                updated.id(),
                lines.join("\n")
            )))
        }
        .await;
        result.map_err(failed("edit automod rule"))
    }

    /// Remove a rule.
    #[instrument(skip(self, params), fields(rule_id = %params.rule_id))]
    pub async fn delete_automod_rule(&self, params: &AutomodRuleRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;
        params.validate()?;
        self.require_bot(
            &guild,
            bit_of::MANAGE_GUILD,
            "Bot requires 'Manage Server' permission to delete automod rules",
        )
        .await?;

        let result: GuildResult<Outcome> = async {
            let rule = self.automod_rule(guild.id(), &params.rule_id).await?;
            self.send(RestRequest::delete(format!(
                "{}/{}",
                rules_path(guild.id()),
                rule.id()
            )))
            .await?;
            info!(rule_id = %params.rule_id, "Automod rule deleted");
            Ok(Outcome::new(format!(
                "Successfully deleted automod rule \"{}\" (ID: {})",
                rule.name(),
                params.rule_id
            )))
        }
        .await;
        result.map_err(failed("delete automod rule"))
    }

    /// Every automod rule of a guild.
    #[instrument(skip(self, params))]
    pub async fn get_automod_rules(&self, params: &AutomodRules) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(Some(&params.guild_id)).await?;

        let result: GuildResult<Outcome> = async {
            let rules: Vec<AutoModRule> = self.fetch(RestRequest::get(rules_path(guild.id()))).await?;
            if rules.is_empty() {
                return Ok(Outcome::new("No automod rules found in this server").with("count", 0));
            }
            let blocks: Vec<String> = rules
                .iter()
                .map(|rule| {
                    let metadata = rule.trigger_metadata();
                    let mut details = String::new();
                    if !metadata.keyword_filter().is_empty() {
                        details.push_str(&format!(
                            "\n  - Keywords: {} items",
                            metadata.keyword_filter().len()
                        ));
                    }
                    if !metadata.allow_list().is_empty() {
                        details.push_str(&format!(
                            "\n  - Allow List: {} items",
                            metadata.allow_list().len()
                        ));
                    }
                    if let Some(limit) = metadata.mention_total_limit().filter(|limit| *limit > 0) {
                        details.push_str(&format!("\n  - Mention Limit: {}", limit));
                    }
                    format!(
                        "**{}** (ID: {})\n  - Enabled: {}\n  - Event Type: {}\n  - Trigger Type: {}\n  - Actions: {} configured{}",
                        rule.name(),
                        rule.id(),
                        if *rule.enabled() { "✅" } else { "❌" },
                        match *rule.event_type() {
                            1 => "MessageSend",
                            2 => "MemberUpdate",
                            _ => "Unknown",
                        },
                        TriggerType::from_repr(*rule.trigger_type()).map_or("Unknown", TriggerType::label),
                        rule.actions().len(),
                        details
                    )
                })
                .collect();
            Ok(Outcome::new(format!(
                "**Found {} automod rules:**\n\n{}",
                rules.len(),
                blocks.join("\n\n")
            ))
            .with("count", rules.len()))
        }
        .await;
        result.map_err(failed("get automod rules"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::fixture;

    fn rule_json(id: &str, name: &str, enabled: bool) -> Value {
        json!({
            "id": id,
            "name": name,
            "event_type": 1,
            "trigger_type": 1,
            "trigger_metadata": { "keyword_filter": ["spoiler", "leak"], "allow_list": [] },
            "actions": [{ "type": 1 }],
            "enabled": enabled
        })
    }

    fn create_params(trigger: &str) -> CreateAutomodRule {
        CreateAutomodRule {
            guild_id: "100".to_string(),
            name: "No leaks".to_string(),
            event_type: "MESSAGE_SEND".to_string(),
            trigger_type: trigger.to_string(),
            keyword_filter: Some(vec!["spoiler".to_string(), "leak".to_string()]),
            presets: Some(vec!["slurs".to_string()]),
            allow_list: None,
            mention_limit: None,
            enabled: None,
        }
    }

    #[test]
    fn test_trigger_types_parse_case_insensitively() {
        assert_eq!(TriggerType::from_str("keyword_preset").unwrap(), TriggerType::KeywordPreset);
        assert_eq!(TriggerType::MentionSpam.to_string(), "MENTION_SPAM");
        assert!(TriggerType::from_str("MEMBER_PROFILE").is_err());
        assert_eq!(preset_code("Sexual_Content").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_create_keyword_rule() {
        let (client, rest) = fixture().await;
        rest.on(Method::Post, "/guilds/100/auto-moderation/rules", rule_json("900", "No leaks", true));
        let outcome = client.create_automod_rule(&create_params("keyword")).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully created automod rule \"No leaks\" (ID: 900)\n- Event Type: MESSAGE_SEND\n- Trigger Type: keyword\n- Enabled: true\n- Actions: Block Message"
        );
        let body = rest.requests_to(Method::Post, "/guilds/100/auto-moderation/rules")[0]
            .json_body()
            .cloned()
            .unwrap();
        assert_eq!(body["trigger_type"], 1);
        assert_eq!(body["trigger_metadata"]["keyword_filter"], json!(["spoiler", "leak"]));
        assert_eq!(body["actions"], json!([{ "type": 1 }]));
    }

    #[tokio::test]
    async fn test_create_preset_rule_maps_names() {
        let (client, rest) = fixture().await;
        rest.on(Method::Post, "/guilds/100/auto-moderation/rules", rule_json("901", "Presets", true));
        client.create_automod_rule(&create_params("KEYWORD_PRESET")).await.unwrap();
        let body = rest.requests_to(Method::Post, "/guilds/100/auto-moderation/rules")[0]
            .json_body()
            .cloned()
            .unwrap();
        assert_eq!(body["trigger_metadata"], json!({ "presets": [3] }));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_trigger() {
        let (client, rest) = fixture().await;
        let err = client.create_automod_rule(&create_params("FLOOD")).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to create automod rule: Invalid trigger type: FLOOD"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_edit_reports_changes() {
        let (client, rest) = fixture().await;
        rest.on(Method::Get, "/guilds/100/auto-moderation/rules/900", rule_json("900", "No leaks", true));
        rest.on(Method::Patch, "/guilds/100/auto-moderation/rules/900", rule_json("900", "No leaks", false));
        let params = EditAutomodRule {
            guild_id: "100".to_string(),
            rule_id: "900".to_string(),
            name: Some("No leaks".to_string()),
            enabled: Some(false),
            keyword_filter: None,
            allow_list: None,
            mention_limit: Some(5),
        };
        let outcome = client.edit_automod_rule(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully edited automod rule \"No leaks\" (ID: 900)\nChanges made:\n- Enabled: true → false\n- Mention limit: None → 5"
        );
        let body = rest.requests_to(Method::Patch, "/guilds/100/auto-moderation/rules/900")[0]
            .json_body()
            .cloned()
            .unwrap();
        assert!(body.get("name").is_none());
        assert_eq!(body["trigger_metadata"]["keyword_filter"], json!(["spoiler", "leak"]));
    }

    #[tokio::test]
    async fn test_edit_without_changes() {
        let (client, rest) = fixture().await;
        rest.on(Method::Get, "/guilds/100/auto-moderation/rules/900", rule_json("900", "No leaks", true));
        let params = EditAutomodRule {
            guild_id: "100".to_string(),
            rule_id: "900".to_string(),
            name: None,
            enabled: Some(true),
            keyword_filter: None,
            allow_list: None,
            mention_limit: None,
        };
        let outcome = client.edit_automod_rule(&params).await.unwrap();
        assert_eq!(outcome.text(), "No changes specified for the automod rule");
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_get_rules() {
        let (client, rest) = fixture().await;
        rest.on(Method::Get, "/guilds/100/auto-moderation/rules", json!([rule_json("900", "No leaks", true)]));
        let params = AutomodRules {
            guild_id: "100".to_string(),
        };
        let outcome = client.get_automod_rules(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "**Found 1 automod rules:**\n\n**No leaks** (ID: 900)\n  - Enabled: ✅\n  - Event Type: MessageSend\n  - Trigger Type: Keyword\n  - Actions: 1 configured\n  - Keywords: 2 items"
        );
    }
}
