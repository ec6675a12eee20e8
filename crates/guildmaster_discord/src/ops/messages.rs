//! Channel message operations: send, edit, read, react, pin, bulk delete,
//! crosspost, history and export.

use super::{de, failed, no_validation};
use crate::client::{DiscordClient, Outcome, Validate};
use crate::format::{
    format_messages, from_millis, iso, iso_str, locale_datetime_str, message_url, parse_timestamp,
    snowflake_timestamp, truncate,
};
use crate::models::{Channel, ChannelKind, Message};
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

/// Messages older than this cannot be bulk deleted.
const BULK_DELETE_MAX_AGE_MS: i64 = 14 * 24 * 60 * 60 * 1000;

/// `send_message`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Target text channel
    pub channel_id: String,
    /// Message content
    pub message: String,
}

/// `edit_message`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessage {
    /// Channel holding the message
    pub channel_id: String,
    /// Message to edit
    pub message_id: String,
    /// Replacement content
    pub new_message: String,
}

/// `delete_message`, `pin_message`, `unpin_message`, `crosspost_message`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Channel holding the message
    pub channel_id: String,
    /// The message
    pub message_id: String,
}

/// `read_messages`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMessages {
    /// Channel to read
    pub channel_id: String,
    /// How many messages, as a number or numeric string (default 100)
    #[serde(default, deserialize_with = "de::count")]
    pub count: Option<u32>,
}

/// `add_reaction`, `remove_reaction`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Channel holding the message
    pub channel_id: String,
    /// The message
    pub message_id: String,
    /// Unicode emoji or `name:id`
    pub emoji: String,
}

/// `get_pinned_messages`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRef {
    /// The channel
    pub channel_id: String,
}

/// `bulk_delete_messages`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteMessages {
    /// Channel holding the messages
    pub channel_id: String,
    /// Messages to delete
    pub message_ids: Vec<String>,
    /// Look each message up first and drop missing ones (default true)
    #[serde(default)]
    pub filter_old: Option<bool>,
}

impl Validate for BulkDeleteMessages {
    fn validate(&self) -> GuildResult<()> {
        if self.message_ids.len() > 100 {
            return Err(GuildError::validation(
                "Cannot delete more than 100 messages at once",
            ));
        }
        Ok(())
    }
}

/// `get_message_history`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHistory {
    /// Channel to read
    pub channel_id: String,
    /// How many messages (default 50)
    #[serde(default)]
    pub limit: Option<u32>,
    /// Only messages before this id
    #[serde(default)]
    pub before: Option<String>,
    /// Only messages after this id
    #[serde(default)]
    pub after: Option<String>,
}

impl Validate for MessageHistory {
    fn validate(&self) -> GuildResult<()> {
        match self.limit {
            Some(limit) if !(1..=100).contains(&limit) => Err(GuildError::validation(
                "Limit must be between 1 and 100",
            )),
            _ => Ok(()),
        }
    }
}

/// Inclusive time window for exports.
#[derive(Debug, Clone, Deserialize)]
pub struct DateRange {
    /// ISO 8601 start
    pub start: String,
    /// ISO 8601 end
    pub end: String,
}

/// `export_chat_log`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportChatLog {
    /// Channel to export
    pub channel_id: String,
    /// `JSON`, `CSV` or `TXT` (any case)
    pub format: String,
    /// How many messages (default 100)
    #[serde(default)]
    pub limit: Option<u32>,
    /// Keep only messages inside this window
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

impl Validate for ExportChatLog {
    fn validate(&self) -> GuildResult<()> {
        if !matches!(self.format.to_uppercase().as_str(), "JSON" | "CSV" | "TXT") {
            return Err(GuildError::validation("Format must be JSON, CSV, or TXT"));
        }
        Ok(())
    }
}

no_validation!(SendMessage, EditMessage, MessageRef, ReadMessages, Reaction, ChannelRef);

/// Strip chat syntax (`<:name:id>`, `<a:name:id>`) down to `name:id`.
fn reaction_path_emoji(emoji: &str) -> String {
    let trimmed = emoji.trim().trim_start_matches('<').trim_end_matches('>');
    let trimmed = trimmed.strip_prefix("a:").unwrap_or(trimmed);
    trimmed.trim_start_matches(':').to_string()
}

impl DiscordClient {
    /// Fetch a channel that must be a guild text channel.
    pub(crate) async fn text_channel(&self, channel_id: &str, missing: &str) -> GuildResult<Channel> {
        self.channel(channel_id)
            .await?
            .filter(|channel| channel.kind() == ChannelKind::GuildText)
            .ok_or_else(|| GuildError::operation(missing))
    }

    async fn message_or_missing(&self, channel_id: &str, message_id: &str) -> GuildResult<Message> {
        self.message(channel_id, message_id)
            .await?
            .ok_or_else(|| GuildError::operation("Message not found by messageId"))
    }

    /// Post a message to a text channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn send_message(&self, params: &SendMessage) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found by channelId")
            .await?;
        let sent: Message = self
            .fetch(
                RestRequest::post(format!("/channels/{}/messages", channel.id()))
                    .json(json!({ "content": params.message })),
            )
            .await?;
        let url = message_url(channel.guild_id().as_deref(), channel.id(), sent.id());
        info!(message_id = %sent.id(), "Message sent");
        Ok(
            Outcome::new(format!("Message sent successfully. Message link: {}", url))
                .with("messageId", sent.id().as_str())
                .with("url", url),
        )
    }

    /// Replace a message's content.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, message_id = %params.message_id))]
    pub async fn edit_message(&self, params: &EditMessage) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found by channelId")
            .await?;
        let message = self
            .message_or_missing(channel.id(), &params.message_id)
            .await?;
        let edited: Message = self
            .fetch(
                RestRequest::patch(format!(
                    "/channels/{}/messages/{}",
                    channel.id(),
                    message.id()
                ))
                .json(json!({ "content": params.new_message })),
            )
            .await?;
        let url = message_url(channel.guild_id().as_deref(), channel.id(), edited.id());
        Ok(
            Outcome::new(format!("Message edited successfully. Message link: {}", url))
                .with("messageId", edited.id().as_str()),
        )
    }

    /// Delete one message.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, message_id = %params.message_id))]
    pub async fn delete_message(&self, params: &MessageRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found by channelId")
            .await?;
        let message = self
            .message_or_missing(channel.id(), &params.message_id)
            .await?;
        self.send(RestRequest::delete(format!(
            "/channels/{}/messages/{}",
            channel.id(),
            message.id()
        )))
        .await?;
        Ok(Outcome::new("Message deleted successfully").with("messageId", message.id().as_str()))
    }

    /// Read the latest messages of a channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn read_messages(&self, params: &ReadMessages) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found by channelId")
            .await?;
        let messages = self
            .messages(channel.id(), params.count.unwrap_or(100), None, None)
            .await?;
        Ok(Outcome::new(format!(
            "**Retrieved {} messages:** \n{}",
            messages.len(),
            format_messages(&messages)
        ))
        .with("count", messages.len()))
    }

    /// React to a message as the bot.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, message_id = %params.message_id))]
    pub async fn add_reaction(&self, params: &Reaction) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found by channelId")
            .await?;
        let message = self
            .message_or_missing(channel.id(), &params.message_id)
            .await?;
        self.send(RestRequest::put(format!(
            "/channels/{}/messages/{}/reactions/{}/@me",
            channel.id(),
            message.id(),
            reaction_path_emoji(&params.emoji)
        )))
        .await?;
        let url = message_url(channel.guild_id().as_deref(), channel.id(), message.id());
        Ok(Outcome::new(format!(
            "Added reaction successfully. Message link: {}",
            url
        )))
    }

    /// Remove the bot's own reaction. Succeeds when there was none.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, message_id = %params.message_id))]
    pub async fn remove_reaction(&self, params: &Reaction) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found by channelId")
            .await?;
        let message = self
            .message_or_missing(channel.id(), &params.message_id)
            .await?;
        let wanted = reaction_path_emoji(&params.emoji);
        let present = message.reactions().iter().any(|reaction| {
            reaction.emoji().name().as_deref() == Some(params.emoji.as_str())
                || reaction.emoji().label() == wanted
        });
        if present {
            self.send(RestRequest::delete(format!(
                "/channels/{}/messages/{}/reactions/{}/@me",
                channel.id(),
                message.id(),
                wanted
            )))
            .await?;
        }
        let url = message_url(channel.guild_id().as_deref(), channel.id(), message.id());
        Ok(Outcome::new(format!(
            "Removed reaction successfully. Message link: {}",
            url
        ))
        .with("removed", present))
    }

    /// Pin a message.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, message_id = %params.message_id))]
    pub async fn pin_message(&self, params: &MessageRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found or not a text channel")
            .await?;
        let result: GuildResult<Outcome> = async {
            let message = self
                .message_or_missing(channel.id(), &params.message_id)
                .await?;
            self.send(RestRequest::put(format!(
                "/channels/{}/pins/{}",
                channel.id(),
                message.id()
            )))
            .await?;
            let url = message_url(channel.guild_id().as_deref(), channel.id(), message.id());
            Ok(Outcome::new(format!(
                "Successfully pinned message in {}. Message link: {}",
                channel.name(),
                url
            )))
        }
        .await;
        result.map_err(failed("pin message"))
    }

    /// Unpin a message; a message that is not pinned is reported, not an error.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, message_id = %params.message_id))]
    pub async fn unpin_message(&self, params: &MessageRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found or not a text channel")
            .await?;
        let result: GuildResult<Outcome> = async {
            let message = self
                .message_or_missing(channel.id(), &params.message_id)
                .await?;
            if !message.pinned() {
                return Ok(Outcome::new(format!(
                    "Message is not pinned in {}",
                    channel.name()
                ))
                .with("unpinned", false));
            }
            self.send(RestRequest::delete(format!(
                "/channels/{}/pins/{}",
                channel.id(),
                message.id()
            )))
            .await?;
            Ok(
                Outcome::new(format!("Successfully unpinned message in {}", channel.name()))
                    .with("unpinned", true),
            )
        }
        .await;
        result.map_err(failed("unpin message"))
    }

    /// List pinned messages.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn get_pinned_messages(&self, params: &ChannelRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found or not a text channel")
            .await?;
        let pinned: Vec<Message> = self
            .fetch(RestRequest::get(format!("/channels/{}/pins", channel.id())))
            .await
            .map_err(failed("fetch pinned messages"))?;

        if pinned.is_empty() {
            return Ok(
                Outcome::new(format!("No pinned messages found in {}", channel.name()))
                    .with("count", 0),
            );
        }

        let lines: Vec<String> = pinned
            .iter()
            .map(|message| {
                let content = if message.content().is_empty() {
                    "[No content]"
                } else {
                    message.content().as_str()
                };
                let ellipsis = if content.chars().count() > 100 { "..." } else { "" };
                format!(
                    "- **{}** ({}): {}{}\n  Link: {}",
                    message.author().username(),
                    iso_str(message.timestamp()),
                    truncate(content, 100),
                    ellipsis,
                    message_url(channel.guild_id().as_deref(), channel.id(), message.id())
                )
            })
            .collect();
        Ok(Outcome::new(format!(
            "**Found {} pinned messages in {}:**\n{}",
            pinned.len(),
            channel.name(),
            lines.join("\n")
        ))
        .with("count", pinned.len()))
    }

    /// Delete several messages at once.
    ///
    /// Duplicate ids are dropped and ids older than 14 days are skipped.
    /// With `filterOld` (the default) each remaining id is looked up first:
    /// missing messages are skipped and lookup failures are reported without
    /// stopping the rest.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, requested = params.message_ids.len()))]
    pub async fn bulk_delete_messages(&self, params: &BulkDeleteMessages) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found or not a text channel")
            .await?;
        let result: GuildResult<Outcome> = async {
            let cutoff = chrono::Utc::now().timestamp_millis() - BULK_DELETE_MAX_AGE_MS;
            let mut seen = HashSet::new();
            let mut to_delete = Vec::new();
            let mut skipped = 0;
            let mut failures = Vec::new();
            for id in &params.message_ids {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                if !snowflake_timestamp(id).is_some_and(|created| created > cutoff) {
                    skipped += 1;
                    continue;
                }
                if params.filter_old.unwrap_or(true) {
                    match self.message(channel.id(), id).await {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            skipped += 1;
                            continue;
                        }
                        Err(e) => {
                            warn!(message_id = %id, error = %e.kind(), "Skipping message");
                            failures.push(format!("{}: {}", id, e.kind()));
                            continue;
                        }
                    }
                }
                to_delete.push(id.clone());
            }

            let mut text = match to_delete.as_slice() {
                [] => "No valid messages to delete".to_string(),
                [only] => {
                    self.send(RestRequest::delete(format!(
                        "/channels/{}/messages/{}",
                        channel.id(),
                        only
                    )))
                    .await?;
                    format!("Successfully deleted 1 message from {}", channel.name())
                }
                many => {
                    self.send(
                        RestRequest::post(format!(
                            "/channels/{}/messages/bulk-delete",
                            channel.id()
                        ))
                        .json(json!({ "messages": many })),
                    )
                    .await?;
                    format!(
                        "Successfully deleted {} messages from {}",
                        many.len(),
                        channel.name()
                    )
                }
            };
            if skipped > 0 {
                text.push_str(&format!(
                    ". Skipped {} (missing or older than 14 days)",
                    skipped
                ));
            }
            if !failures.is_empty() {
                text.push_str(&format!(
                    ". {} failed: {}",
                    failures.len(),
                    failures.join("; ")
                ));
            }
            Ok(Outcome::new(text)
                .with("deleted", to_delete.len())
                .with("skipped", skipped)
                .with("failed", failures.len()))
        }
        .await;
        result.map_err(failed("bulk delete messages"))
    }

    /// Publish an announcement channel message to following servers.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, message_id = %params.message_id))]
    pub async fn crosspost_message(&self, params: &MessageRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .channel(&params.channel_id)
            .await?
            .filter(|channel| {
                matches!(
                    channel.kind(),
                    ChannelKind::GuildAnnouncement | ChannelKind::GuildText
                )
            })
            .ok_or_else(|| GuildError::operation("Channel not found or not an announcement channel"))?;
        let result: GuildResult<Outcome> = async {
            let message = self
                .message_or_missing(channel.id(), &params.message_id)
                .await?;
            if channel.kind() != ChannelKind::GuildAnnouncement || message.is_crossposted() {
                return Ok(Outcome::new(
                    "Message cannot be crossposted (may already be crossposted or not eligible)",
                )
                .with("crossposted", false));
            }
            self.send(RestRequest::post(format!(
                "/channels/{}/messages/{}/crosspost",
                channel.id(),
                message.id()
            )))
            .await?;
            let url = message_url(channel.guild_id().as_deref(), channel.id(), message.id());
            Ok(Outcome::new(format!(
                "Successfully crossposted message in {}. Message link: {}",
                channel.name(),
                url
            ))
            .with("crossposted", true))
        }
        .await;
        result.map_err(failed("crosspost message"))
    }

    /// A page of channel history with optional cursors.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn get_message_history(&self, params: &MessageHistory) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found or not a text channel")
            .await?;
        let limit = params.limit.unwrap_or(50);
        let messages = self
            .messages(
                channel.id(),
                limit,
                params.before.as_deref(),
                params.after.as_deref(),
            )
            .await
            .map_err(failed("get message history"))?;

        if messages.is_empty() {
            return Ok(Outcome::new("No messages found in the specified range").with("count", 0));
        }

        let entries: Vec<String> = messages
            .iter()
            .map(|message| {
                let attachments = if message.attachments().is_empty() {
                    String::new()
                } else {
                    format!(" [{} attachments]", message.attachments().len())
                };
                let content = if message.content().is_empty() {
                    "*[No text content]*"
                } else {
                    message.content().as_str()
                };
                format!(
                    "**{}** ({}){}\n{}",
                    message.author().username(),
                    locale_datetime_str(message.timestamp()),
                    attachments,
                    content
                )
            })
            .collect();

        let before = params
            .before
            .as_ref()
            .map(|id| format!(" before {}", id))
            .unwrap_or_default();
        let after = params
            .after
            .as_ref()
            .map(|id| format!(" after {}", id))
            .unwrap_or_default();
        Ok(Outcome::new(format!(
            "**Message History for #{}**\nTotal messages: {}\nRange: {} messages{}{}\n\n{}",
            channel.name(),
            messages.len(),
            limit,
            before,
            after,
            entries.join("\n\n")
        ))
        .with("count", messages.len()))
    }

    /// Render recent messages as JSON, CSV or plain text and return a preview.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, format = %params.format))]
    pub async fn export_chat_log(&self, params: &ExportChatLog) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let format = params.format.to_uppercase();
        let channel = self
            .text_channel(&params.channel_id, "Channel not found or not a text channel")
            .await?;
        let result: GuildResult<Outcome> = async {
            let mut messages = self
                .messages(channel.id(), params.limit.unwrap_or(100), None, None)
                .await?;

            if let Some(range) = &params.date_range {
                if let (Some(start), Some(end)) =
                    (parse_date(&range.start), parse_date(&range.end))
                {
                    messages.retain(|message| {
                        parse_timestamp(message.timestamp())
                            .is_some_and(|at| at >= start && at <= end)
                    });
                }
            }

            if messages.is_empty() {
                return Ok(Outcome::new("No messages found in the specified criteria")
                    .with("count", 0));
            }

            let export = match format.as_str() {
                "JSON" => export_json(&messages)?,
                "CSV" => export_csv(&messages),
                _ => export_txt(&messages),
            };
            let preview = if export.chars().count() > 2000 {
                format!("{}...", truncate(&export, 2000))
            } else {
                export.clone()
            };
            let date_range = params
                .date_range
                .as_ref()
                .map(|range| format!("{} to {}", range.start, range.end))
                .unwrap_or_else(|| "All messages".to_string());

            Ok(Outcome::new(format!(
                "**Chat Log Export for #{}**\n- Format: {}\n- Messages: {}\n- Date Range: {}\n- Export Size: {} characters\n\n**Preview:**\n```\n{}\n```\n\n*Note: This is a preview. In a production environment, the full export would be saved as a file.*",
                channel.name(),
                format,
                messages.len(),
                date_range,
                export.chars().count(),
                preview
            ))
            .with("count", messages.len())
            .with("size", export.chars().count()))
        }
        .await;
        result.map_err(failed("export chat log"))
    }
}

/// Accept a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
fn parse_date(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    parse_timestamp(value).or_else(|| {
        chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

fn message_time(message: &Message) -> String {
    parse_timestamp(message.timestamp())
        .map(iso)
        .or_else(|| snowflake_timestamp(message.id()).and_then(from_millis).map(iso))
        .unwrap_or_default()
}

fn export_json(messages: &[Message]) -> GuildResult<String> {
    let rows: Vec<_> = messages
        .iter()
        .map(|message| {
            json!({
                "id": message.id(),
                "author": {
                    "id": message.author().id(),
                    "username": message.author().username(),
                    "tag": message.author().tag()
                },
                "content": message.content(),
                "timestamp": message_time(message),
                "attachments": message.attachments().iter().map(|attachment| json!({
                    "name": attachment.filename(),
                    "url": attachment.url(),
                    "size": attachment.size()
                })).collect::<Vec<_>>(),
                "reactions": message.reactions().iter().map(|reaction| json!({
                    "emoji": reaction.emoji().name(),
                    "count": reaction.count()
                })).collect::<Vec<_>>()
            })
        })
        .collect();
    serde_json::to_string_pretty(&rows)
        .map_err(|e| GuildError::operation(format!("Failed to render JSON export: {}", e)))
}

fn export_csv(messages: &[Message]) -> String {
    let rows: Vec<String> = messages
        .iter()
        .map(|message| {
            let attachments: Vec<&str> = message
                .attachments()
                .iter()
                .map(|attachment| attachment.url().as_str())
                .collect();
            format!(
                "\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",\"{}\"",
                message.id(),
                message.author().tag(),
                message.author().username(),
                message.content().replace('"', "\"\""),
                message_time(message),
                attachments.join(";")
            )
        })
        .collect();
    format!(
        "ID,Author,Username,Content,Timestamp,Attachments\n{}",
        rows.join("\n")
    )
}

fn export_txt(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| {
            let attachments = if message.attachments().is_empty() {
                String::new()
            } else {
                format!(" [{} attachments]", message.attachments().len())
            };
            format!(
                "[{}] {}: {}{}",
                locale_datetime_str(message.timestamp()),
                message.author().tag(),
                message.content(),
                attachments
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
