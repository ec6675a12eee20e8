//! Embeds, buttons and select menus.
//!
//! Component payloads follow Discord's message component layout: every
//! message holds action rows (type 1) and each row holds up to five
//! buttons or a single select menu.

use super::failed;
use crate::client::{DiscordClient, Outcome, Validate};
use crate::format::{message_url, parse_hex_color};
use crate::models::{Channel, Message};
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Value, json};
use std::str::FromStr;
use tracing::{info, instrument};

const ACTION_ROW: u8 = 1;
const BUTTON: u8 = 2;
const STRING_SELECT: u8 = 3;
const BUTTONS_PER_ROW: usize = 5;
const MAX_SELECT_OPTIONS: usize = 25;
const NOT_TEXT: &str = "Channel not found or not a text channel";

/// Button look. Link buttons open a URL instead of sending an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum ButtonStyle {
    /// Blurple
    Primary = 1,
    /// Grey
    Secondary = 2,
    /// Green
    Success = 3,
    /// Red
    Danger = 4,
    /// Grey with an external link
    Link = 5,
}

/// `send_modal`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendModal {
    /// Interaction to answer
    pub interaction_id: Option<String>,
    /// Modal title
    pub title: Option<String>,
    /// Modal custom ID
    pub custom_id: Option<String>,
    /// Text inputs
    pub components: Vec<Value>,
}

/// One embed field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedField {
    /// Field title
    #[serde(default)]
    pub name: String,
    /// Field body
    #[serde(default)]
    pub value: String,
    /// Render next to neighbouring inline fields
    #[serde(default)]
    pub inline: bool,
}

/// `send_embed`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmbed {
    /// Text channel
    pub channel_id: String,
    /// Embed title
    #[serde(default)]
    pub title: Option<String>,
    /// Embed body
    #[serde(default)]
    pub description: Option<String>,
    /// Hex color, with or without `#`
    #[serde(default)]
    pub color: Option<String>,
    /// Fields; entries without a name or value are skipped
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    /// Footer text
    #[serde(default)]
    pub footer: Option<String>,
    /// Image URL
    #[serde(default)]
    pub image: Option<String>,
    /// Thumbnail URL
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// One button of `send_button`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonSpec {
    /// Button text
    #[serde(default)]
    pub label: String,
    /// `PRIMARY`, `SECONDARY`, `SUCCESS`, `DANGER` or `LINK`; secondary otherwise
    #[serde(default)]
    pub style: Option<String>,
    /// Interaction ID for non-link buttons
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Target of link buttons
    #[serde(default)]
    pub url: Option<String>,
    /// Unicode emoji or custom emoji mention
    #[serde(default)]
    pub emoji: Option<String>,
}

/// `send_button`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendButton {
    /// Text channel
    pub channel_id: String,
    /// Message text above the buttons
    #[serde(default)]
    pub content: Option<String>,
    /// Buttons, laid out five per row
    #[serde(default)]
    pub buttons: Vec<ButtonSpec>,
}

/// One option of `send_select_menu`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    /// Shown to the user
    #[serde(default)]
    pub label: String,
    /// Sent back on selection
    #[serde(default)]
    pub value: String,
    /// Secondary text
    #[serde(default)]
    pub description: Option<String>,
    /// Unicode emoji or custom emoji mention
    #[serde(default)]
    pub emoji: Option<String>,
}

/// `send_select_menu`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSelectMenu {
    /// Text channel
    pub channel_id: String,
    /// Message text above the menu
    #[serde(default)]
    pub content: Option<String>,
    /// Interaction ID of the menu
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Placeholder text
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Fewest selections, default 1
    #[serde(default)]
    pub min_values: Option<u32>,
    /// Most selections, default 1
    #[serde(default)]
    pub max_values: Option<u32>,
    /// Up to 25 options
    #[serde(default)]
    pub options: Vec<SelectOption>,
}

impl Validate for SendEmbed {
    fn validate(&self) -> GuildResult<()> {
        if self.channel_id.is_empty() {
            return Err(GuildError::validation("Channel ID is required"));
        }
        Ok(())
    }
}

impl Validate for SendButton {
    fn validate(&self) -> GuildResult<()> {
        if self.channel_id.is_empty() {
            return Err(GuildError::validation("Channel ID is required"));
        }
        if self.buttons.is_empty() {
            return Err(GuildError::validation("At least one button is required"));
        }
        Ok(())
    }
}

impl Validate for SendSelectMenu {
    fn validate(&self) -> GuildResult<()> {
        if self.channel_id.is_empty() {
            return Err(GuildError::validation("Channel ID is required"));
        }
        if self.options.is_empty() {
            return Err(GuildError::validation("At least one option is required"));
        }
        if self.options.len() > MAX_SELECT_OPTIONS {
            return Err(GuildError::validation(
                "Maximum 25 options allowed in a select menu",
            ));
        }
        Ok(())
    }
}

super::no_validation!(SendModal);

/// Partial emoji object for a component.
fn component_emoji(value: &str) -> Value {
    let trimmed = value.trim();
    if let Some(inner) = trimmed.strip_prefix('<').and_then(|v| v.strip_suffix('>')) {
        let animated = inner.starts_with("a:");
        let inner = inner.trim_start_matches("a:").trim_start_matches(':');
        if let Some((name, id)) = inner.split_once(':') {
            return json!({ "name": name, "id": id, "animated": animated });
        }
    }
    if let Some((name, id)) = trimmed.split_once(':')
        && !id.is_empty()
        && id.chars().all(|c| c.is_ascii_digit())
    {
        return json!({ "name": name, "id": id });
    }
    json!({ "name": trimmed })
}

/// Default custom ID, unique per call.
fn generated_id(prefix: &str, index: Option<usize>) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    match index {
        Some(index) => format!("{}_{}_{}", prefix, now, index),
        None => format!("{}_{}", prefix, now),
    }
}

fn button_component(index: usize, spec: &ButtonSpec) -> GuildResult<Value> {
    if spec.label.is_empty() {
        return Err(GuildError::validation(format!(
            "Button {} requires a label",
            index + 1
        )));
    }
    let style = spec
        .style
        .as_deref()
        .and_then(|style| ButtonStyle::from_str(style).ok())
        .unwrap_or(ButtonStyle::Secondary);
    let mut button = json!({ "type": BUTTON, "label": spec.label, "style": style as u8 });
    if style == ButtonStyle::Link {
        let url = spec.url.as_ref().ok_or_else(|| {
            GuildError::validation(format!("Link button \"{}\" requires a URL", spec.label))
        })?;
        button["url"] = json!(url);
    } else {
        button["custom_id"] = json!(
            spec.custom_id
                .clone()
                .unwrap_or_else(|| generated_id("button", Some(index)))
        );
    }
    if let Some(emoji) = &spec.emoji {
        button["emoji"] = component_emoji(emoji);
    }
    Ok(button)
}

impl DiscordClient {
    async fn post_message(&self, channel: &Channel, body: Value) -> GuildResult<String> {
        let message: Message = self
            .fetch(RestRequest::post(format!("/channels/{}/messages", channel.id())).json(body))
            .await?;
        info!(message_id = %message.id(), channel = %channel.name(), "Component message sent");
        Ok(message_url(
            channel.guild_id().as_deref(),
            channel.id(),
            message.id(),
        ))
    }

    /// Modals can only answer an interaction, which this server never receives.
    #[instrument(skip(self, _params))]
    pub async fn send_modal(&self, _params: &SendModal) -> GuildResult<Outcome> {
        Err(GuildError::operation(
            "Send modal functionality requires an active interaction context. This tool is designed for bot applications with slash commands or button interactions.",
        ))
    }

    /// Send a rich embed.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn send_embed(&self, params: &SendEmbed) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        params.validate()?;
        let channel = self.text_channel(&params.channel_id, NOT_TEXT).await?;

        let result: GuildResult<Outcome> = async {
            let mut embed = json!({});
            if let Some(title) = &params.title {
                embed["title"] = json!(title);
            }
            if let Some(description) = &params.description {
                embed["description"] = json!(description);
            }
            if let Some(color) = &params.color {
                let value = parse_hex_color(color)
                    .ok_or_else(|| GuildError::validation(format!("Invalid color: {}", color)))?;
                embed["color"] = json!(value);
            }
            if let Some(footer) = &params.footer {
                embed["footer"] = json!({ "text": footer });
            }
            if let Some(image) = &params.image {
                embed["image"] = json!({ "url": image });
            }
            if let Some(thumbnail) = &params.thumbnail {
                embed["thumbnail"] = json!({ "url": thumbnail });
            }
            let fields: Vec<Value> = params
                .fields
                .iter()
                .filter(|field| !field.name.is_empty() && !field.value.is_empty())
                .map(|field| json!({ "name": field.name, "value": field.value, "inline": field.inline }))
                .collect();
            if !fields.is_empty() {
                embed["fields"] = Value::Array(fields);
            }

            let url = self.post_message(&channel, json!({ "embeds": [embed] })).await?;
            Ok(Outcome::new(format!(
                "Successfully sent embed to {}\n- Title: {}\n- Fields: {}\n- Color: {}\n- Message: {}",
                channel.name(),
                params.title.as_deref().unwrap_or("None"),
                params.fields.len(),
                params.color.as_deref().unwrap_or("Default"),
                url
            ))
            .with("messageUrl", url))
        }
        .await;
        result.map_err(failed("send embed"))
    }

    /// Send buttons, five per action row.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, count = params.buttons.len()))]
    pub async fn send_button(&self, params: &SendButton) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        params.validate()?;
        let channel = self.text_channel(&params.channel_id, NOT_TEXT).await?;

        let result: GuildResult<Outcome> = async {
            let buttons = params
                .buttons
                .iter()
                .enumerate()
                .map(|(index, spec)| button_component(index, spec))
                .collect::<GuildResult<Vec<Value>>>()?;
            let rows: Vec<Value> = buttons
                .chunks(BUTTONS_PER_ROW)
                .map(|row| json!({ "type": ACTION_ROW, "components": row }))
                .collect();
            let mut body = json!({ "components": rows });
            if let Some(content) = &params.content {
                body["content"] = json!(content);
            }

            let url = self.post_message(&channel, body).await?;
            Ok(Outcome::new(format!(
                "Successfully sent buttons to {}\n- Button count: {}\n- Content: {}\n- Message: {}",
                channel.name(),
                params.buttons.len(),
                params.content.as_deref().unwrap_or("None"),
                url
            ))
            .with("messageUrl", url))
        }
        .await;
        result.map_err(failed("send buttons"))
    }

    /// Send a string select menu.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn send_select_menu(&self, params: &SendSelectMenu) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        params.validate()?;
        let channel = self.text_channel(&params.channel_id, NOT_TEXT).await?;
        let min_values = params.min_values.filter(|v| *v > 0).unwrap_or(1);
        let max_values = params.max_values.filter(|v| *v > 0).unwrap_or(1);

        let result: GuildResult<Outcome> = async {
            let mut options = Vec::with_capacity(params.options.len());
            for (index, option) in params.options.iter().enumerate() {
                if option.label.is_empty() || option.value.is_empty() {
                    return Err(GuildError::validation(format!(
                        "Option {} requires both label and value",
                        index + 1
                    )));
                }
                let mut entry = json!({ "label": option.label, "value": option.value });
                if let Some(description) = &option.description {
                    entry["description"] = json!(description);
                }
                if let Some(emoji) = &option.emoji {
                    entry["emoji"] = component_emoji(emoji);
                }
                options.push(entry);
            }
            let menu = json!({
                "type": STRING_SELECT,
                "custom_id": params.custom_id.clone().unwrap_or_else(|| generated_id("select", None)),
                "placeholder": params.placeholder.as_deref().unwrap_or("Select an option"),
                "min_values": min_values,
                "max_values": max_values,
                "options": options,
            });
            let mut body = json!({ "components": [{ "type": ACTION_ROW, "components": [menu] }] });
            if let Some(content) = &params.content {
                body["content"] = json!(content);
            }

            let url = self.post_message(&channel, body).await?;
            Ok(Outcome::new(format!(
                "Successfully sent select menu to {}\n- Options: {}\n- Range: {}-{} selections\n- Content: {}\n- Message: {}",
                channel.name(),
                params.options.len(),
                min_values,
                max_values,
                params.content.as_deref().unwrap_or("None"),
                url
            ))
            .with("messageUrl", url))
        }
        .await;
        result.map_err(failed("send select menu"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::{fixture, message_json};

    fn sent(rest: &crate::rest::MockRest) -> Value {
        rest.requests_to(Method::Post, "/channels/301/messages")[0]
            .json_body()
            .cloned()
            .unwrap()
    }

    fn button(label: &str, style: &str) -> ButtonSpec {
        ButtonSpec {
            label: label.to_string(),
            style: Some(style.to_string()),
            custom_id: Some(format!("id_{}", label)),
            url: None,
            emoji: None,
        }
    }

    #[test]
    fn test_component_emoji_forms() {
        assert_eq!(component_emoji("🔥"), json!({ "name": "🔥" }));
        assert_eq!(
            component_emoji("<a:dance:456>"),
            json!({ "name": "dance", "id": "456", "animated": true })
        );
        assert_eq!(component_emoji("party:123"), json!({ "name": "party", "id": "123" }));
    }

    #[tokio::test]
    async fn test_send_embed() {
        let (client, rest) = fixture().await;
        rest.on(Method::Post, "/channels/301/messages", message_json("720", "301", ("900", "guildmaster"), ""));
        let params: SendEmbed = serde_json::from_value(json!({
            "channelId": "301",
            "title": "Patch notes",
            "color": "#ff8800",
            "fields": [{ "name": "Fixes", "value": "Many" }, { "name": "", "value": "skipped" }]
        }))
        .unwrap();
        let outcome = client.send_embed(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully sent embed to general\n- Title: Patch notes\n- Fields: 2\n- Color: #ff8800\n- Message: https://discord.com/channels/100/301/720"
        );
        let embed = &sent(&rest)["embeds"][0];
        assert_eq!(embed["color"], 0xff8800);
        assert_eq!(embed["fields"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_buttons_wrap_after_five() {
        let (client, rest) = fixture().await;
        rest.on(Method::Post, "/channels/301/messages", message_json("721", "301", ("900", "guildmaster"), ""));
        let mut buttons: Vec<ButtonSpec> = (0..6).map(|i| button(&format!("b{}", i), "primary")).collect();
        buttons[5].style = Some("LINK".to_string());
        buttons[5].url = Some("https://example.com".to_string());
        let params = SendButton {
            channel_id: "301".to_string(),
            content: Some("Pick".to_string()),
            buttons,
        };
        client.send_button(&params).await.unwrap();
        let body = sent(&rest);
        let rows = body["components"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["components"].as_array().map(Vec::len), Some(5));
        assert_eq!(rows[0]["components"][0]["style"], 1);
        let link = &rows[1]["components"][0];
        assert_eq!(link["style"], 5);
        assert_eq!(link["url"], "https://example.com");
        assert!(link.get("custom_id").is_none());
    }

    #[tokio::test]
    async fn test_link_button_needs_url() {
        let (client, rest) = fixture().await;
        let params = SendButton {
            channel_id: "301".to_string(),
            content: None,
            buttons: vec![button("docs", "link")],
        };
        let err = client.send_button(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to send buttons: Link button \"docs\" requires a URL"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_select_menu_limits() {
        let (client, rest) = fixture().await;
        let option = SelectOption {
            label: "A".to_string(),
            value: "a".to_string(),
            description: None,
            emoji: None,
        };
        let mut params = SendSelectMenu {
            channel_id: "301".to_string(),
            content: None,
            custom_id: Some("menu".to_string()),
            placeholder: None,
            min_values: None,
            max_values: Some(2),
            options: vec![option; 26],
        };
        let err = client.send_select_menu(&params).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Maximum 25 options allowed in a select menu");

        params.options.truncate(3);
        rest.on(Method::Post, "/channels/301/messages", message_json("722", "301", ("900", "guildmaster"), ""));
        let outcome = client.send_select_menu(&params).await.unwrap();
        assert!(outcome.text().contains("- Range: 1-2 selections"));
        let menu = &sent(&rest)["components"][0]["components"][0];
        assert_eq!(menu["placeholder"], "Select an option");
        assert_eq!(menu["options"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_send_modal_is_unsupported() {
        let (client, rest) = fixture().await;
        let err = client.send_modal(&SendModal::default()).await.unwrap_err();
        assert!(err.kind().to_string().starts_with("Send modal functionality requires"));
        assert_eq!(rest.calls(), 0);
    }
}
