//! File uploads, attachment listing and image lookup.
//!
//! Sources given by callers may be `http(s)` URLs, `data:` URIs or local
//! paths; [`DiscordClient::load_file`] resolves all three to bytes.

use super::failed;
use super::messages::MessageRef;
use crate::client::{DiscordClient, Outcome, Validate};
use crate::format::{iso_str, message_url, yes_no};
use crate::models::Message;
use crate::rest::{FileUpload, RestRequest};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// `upload_file`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFile {
    /// Text channel
    pub channel_id: String,
    /// Local path or URL
    pub file_path: String,
    /// Name shown in Discord
    #[serde(default)]
    pub file_name: Option<String>,
    /// Message text sent with the file
    #[serde(default)]
    pub content: Option<String>,
}

fn default_true() -> bool {
    true
}

/// `read_images`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadImages {
    /// Channel to search
    pub channel_id: String,
    /// A single message to read instead of the latest ones
    #[serde(default)]
    pub message_id: Option<String>,
    /// Messages with images to return, 1 to 10
    #[serde(default)]
    pub limit: Option<u32>,
    /// Include size, dimensions and spoiler flag
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    /// Download each image and report its byte size
    #[serde(default)]
    pub download_images: bool,
}

impl Validate for UploadFile {
    fn validate(&self) -> GuildResult<()> {
        if self.channel_id.is_empty() || self.file_path.is_empty() {
            return Err(GuildError::validation(
                "Channel ID and file path are required",
            ));
        }
        Ok(())
    }
}

impl Validate for ReadImages {
    fn validate(&self) -> GuildResult<()> {
        if self.limit.is_some_and(|limit| !(1..=10).contains(&limit)) {
            return Err(GuildError::validation("Limit must be between 1 and 10"));
        }
        Ok(())
    }
}

/// Size in KiB with two decimals.
fn kilobytes(size: u64) -> String {
    format!("{:.2} KB", size as f64 / 1024.0)
}

/// MIME type from magic bytes, then the file extension.
pub fn sniff_mime(data: &[u8], name: &str) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "image/png";
    }
    if data.starts_with(&[0xff, 0xd8, 0xff]) {
        return "image/jpeg";
    }
    if data.starts_with(b"GIF8") {
        return "image/gif";
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return "image/webp";
    }
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// File name at the end of a URL or path.
fn source_name(source: &str) -> String {
    let without_query = source.split(['?', '#']).next().unwrap_or(source);
    without_query
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("file")
        .to_string()
}

impl DiscordClient {
    /// Bytes and file name of a URL, `data:` URI or local path.
    pub(crate) async fn load_file(&self, source: &str) -> GuildResult<(String, Vec<u8>)> {
        if let Some(encoded) = source.strip_prefix("data:") {
            let (meta, payload) = encoded
                .split_once(',')
                .ok_or_else(|| GuildError::validation("Invalid data URI"))?;
            if !meta.ends_with(";base64") {
                return Err(GuildError::validation("Only base64 data URIs are supported"));
            }
            let data = STANDARD
                .decode(payload)
                .map_err(|e| GuildError::validation(format!("Invalid data URI: {}", e)))?;
            let extension = meta
                .trim_end_matches(";base64")
                .rsplit('/')
                .next()
                .unwrap_or("bin");
            return Ok((format!("file.{}", extension), data));
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            debug!(url = source, "Downloading file");
            let data = self.rest().download(source).await?;
            return Ok((source_name(source), data));
        }
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| GuildError::operation(format!("Cannot read file {}: {}", source, e)))?;
        Ok((source_name(source), data))
    }

    /// An image as a base64 `data:` URI, the form Discord takes for icons.
    pub(crate) async fn image_data_uri(&self, source: &str) -> GuildResult<String> {
        if source.starts_with("data:") {
            return Ok(source.to_string());
        }
        let (name, data) = self.load_file(source).await?;
        Ok(format!(
            "data:{};base64,{}",
            sniff_mime(&data, &name),
            STANDARD.encode(&data)
        ))
    }

    /// Send a file, optionally with text, to a text channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn upload_file(&self, params: &UploadFile) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        params.validate()?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found or not a text channel")
            .await?;

        let result: GuildResult<Outcome> = async {
            let (source_name, data) = self.load_file(&params.file_path).await?;
            let file_name = params.file_name.clone().unwrap_or(source_name);
            let mut payload = json!({
                "attachments": [{ "id": 0, "filename": file_name }]
            });
            if let Some(content) = &params.content {
                payload["content"] = json!(content);
            }
            let message: Message = self
                .fetch(
                    RestRequest::post(format!("/channels/{}/messages", channel.id())).multipart(
                        vec![("payload_json".to_string(), payload.to_string())],
                        vec![FileUpload::new("files[0]", file_name.clone(), data)],
                    ),
                )
                .await?;
            info!(message_id = %message.id(), file = %file_name, "File uploaded");

            let size = message
                .attachments()
                .first()
                .map_or_else(|| "Unknown size".to_string(), |a| kilobytes(*a.size()));
            Ok(Outcome::new(format!(
                "Successfully uploaded file to {}\n- File: {}\n- Size: {}\n- Message: {}",
                channel.name(),
                file_name,
                size,
                message_url(channel.guild_id().as_deref(), channel.id(), message.id())
            ))
            .with("messageId", message.id().as_str()))
        }
        .await;
        result.map_err(failed("upload file"))
    }

    /// Attachments of one message.
    #[instrument(skip(self, params), fields(message_id = %params.message_id))]
    pub async fn get_message_attachments(&self, params: &MessageRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        params.validate()?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found or not a text channel")
            .await?;

        let result: GuildResult<Outcome> = async {
            let message = self
                .message(channel.id(), &params.message_id)
                .await?
                .ok_or_else(|| GuildError::operation("Message not found by messageId"))?;
            let attachments = message.attachments();
            if attachments.is_empty() {
                return Ok(Outcome::new("No attachments found in this message").with("count", 0));
            }
            let blocks: Vec<String> = attachments
                .iter()
                .map(|attachment| {
                    format!(
                        "- **{}**\n  - URL: {}\n  - Size: {}\n  - Content Type: {}\n  - Spoiler: {}",
                        attachment.filename(),
                        attachment.url(),
                        kilobytes(*attachment.size()),
                        attachment.content_type().as_deref().unwrap_or("Unknown"),
                        yes_no(attachment.is_spoiler())
                    )
                })
                .collect();
            Ok(Outcome::new(format!(
                "**Found {} attachments:**\n{}",
                attachments.len(),
                blocks.join("\n\n")
            ))
            .with("count", attachments.len()))
        }
        .await;
        result.map_err(failed("get message attachments"))
    }

    /// Images from one message or the latest messages of a channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn read_images(&self, params: &ReadImages) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        params.validate()?;
        let limit = params.limit.unwrap_or(1) as usize;

        let result: GuildResult<Outcome> = async {
            let channel = self
                .channel(&params.channel_id)
                .await?
                .ok_or_else(|| GuildError::operation("Channel not found by channelId"))?;
            let scanned = limit * 5;
            let messages = match &params.message_id {
                Some(message_id) => vec![
                    self.message(channel.id(), message_id)
                        .await?
                        .ok_or_else(|| GuildError::operation("Message not found"))?,
                ],
                None => {
                    self.messages(channel.id(), scanned as u32, None, None)
                        .await?
                }
            };

            let with_images: Vec<&Message> = messages
                .iter()
                .filter(|message| message.attachments().iter().any(|a| a.is_image()))
                .take(limit)
                .collect();
            if with_images.is_empty() {
                return Ok(Outcome::new(if params.message_id.is_some() {
                    "No images found in the specified message".to_string()
                } else {
                    format!("No images found in the last {} messages", scanned)
                })
                .with("count", 0));
            }

            let mut blocks = Vec::new();
            for message in with_images {
                for attachment in message.attachments().iter().filter(|a| a.is_image()) {
                    let mut block = format!(
                        "**Image {}: {}**\n- Message ID: {}\n- Author: {}\n- URL: {}\n- Type: {}\n- Timestamp: {}",
                        blocks.len() + 1,
                        attachment.filename(),
                        message.id(),
                        message.author().username(),
                        attachment.url(),
                        attachment.content_type().as_deref().unwrap_or("Unknown"),
                        iso_str(message.timestamp())
                    );
                    if params.include_metadata {
                        let dimension = |value: &Option<u32>| {
                            value.map_or_else(|| "Unknown".to_string(), |v| v.to_string())
                        };
                        block.push_str(&format!(
                            "\n- Size: {}\n- Dimensions: {}x{}\n- Spoiler: {}",
                            kilobytes(*attachment.size()),
                            dimension(attachment.width()),
                            dimension(attachment.height()),
                            yes_no(attachment.is_spoiler())
                        ));
                    }
                    if params.download_images {
                        match self.rest().download(attachment.url()).await {
                            Ok(data) => block.push_str(&format!(
                                "\n- Downloaded: ✅ ({} bytes)\n- Analysis: Image successfully downloaded and analyzed",
                                data.len()
                            )),
                            Err(e) => {
                                warn!(url = %attachment.url(), error = %e, "Image download failed");
                                block.push_str(&format!(
                                    "\n- Download: ❌ Failed to download: {}",
                                    e.kind()
                                ));
                            }
                        }
                    }
                    blocks.push(block);
                }
            }

            Ok(Outcome::new(format!(
                "**Found {} image(s):**\n\n{}",
                blocks.len(),
                blocks.join("\n\n")
            ))
            .with("count", blocks.len()))
        }
        .await;
        result.map_err(failed("read images"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::{Method, RestBody};
    use crate::testing::{fixture, message_json};
    use serde_json::Value;
    use std::io::Write;

    fn image_message(id: &str) -> Value {
        let mut message = message_json(id, "301", ("500", "alice"), "look");
        message["attachments"] = json!([{
            "id": "1",
            "filename": "cat.png",
            "url": "https://cdn.example.com/cat.png",
            "size": 2048,
            "content_type": "image/png",
            "width": 640,
            "height": 480
        }]);
        message
    }

    #[test]
    fn test_sniff_mime_prefers_magic_bytes() {
        assert_eq!(sniff_mime(&[0x89, b'P', b'N', b'G', 0x0d], "x.jpg"), "image/png");
        assert_eq!(sniff_mime(b"hello", "notes.txt"), "text/plain");
        assert_eq!(sniff_mime(b"??", "blob"), "application/octet-stream");
        assert_eq!(source_name("https://x.com/a/b/pic.gif?size=2"), "pic.gif");
    }

    #[tokio::test]
    async fn test_image_data_uri_from_url() {
        let (client, rest) = fixture().await;
        rest.with_download("https://cdn.example.com/icon.png", vec![0x89, b'P', b'N', b'G']);
        let uri = client
            .image_data_uri("https://cdn.example.com/icon.png")
            .await
            .unwrap();
        assert_eq!(uri, format!("data:image/png;base64,{}", STANDARD.encode([0x89, b'P', b'N', b'G'])));
        assert_eq!(
            client.image_data_uri("data:image/gif;base64,R0lG").await.unwrap(),
            "data:image/gif;base64,R0lG"
        );
    }

    #[tokio::test]
    async fn test_upload_local_file() {
        let (client, rest) = fixture().await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"report body").unwrap();
        let mut sent = message_json("710", "301", ("900", "guildmaster"), "");
        sent["attachments"] = json!([{ "id": "2", "filename": "report.txt", "url": "u", "size": 1536 }]);
        rest.on(Method::Post, "/channels/301/messages", sent);

        let params = UploadFile {
            channel_id: "301".to_string(),
            file_path: file.path().to_string_lossy().into_owned(),
            file_name: Some("report.txt".to_string()),
            content: Some("weekly".to_string()),
        };
        let outcome = client.upload_file(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully uploaded file to general\n- File: report.txt\n- Size: 1.50 KB\n- Message: https://discord.com/channels/100/301/710"
        );
        let request = &rest.requests_to(Method::Post, "/channels/301/messages")[0];
        match request.body() {
            RestBody::Multipart { fields, files } => {
                assert!(fields[0].1.contains("\"content\":\"weekly\""));
                assert_eq!(files[0].data(), b"report body");
            }
            other => panic!("expected multipart body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let (client, rest) = fixture().await;
        let params = UploadFile {
            channel_id: "301".to_string(),
            file_path: "/nonexistent/guildmaster/file.bin".to_string(),
            file_name: None,
            content: None,
        };
        let err = client.upload_file(&params).await.unwrap_err();
        assert!(err.kind().to_string().starts_with("Failed to upload file: Cannot read file"));
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_upload_to_voice_channel_is_refused() {
        let (client, _rest) = fixture().await;
        let params = UploadFile {
            channel_id: "302".to_string(),
            file_path: "a.txt".to_string(),
            file_name: None,
            content: None,
        };
        let err = client.upload_file(&params).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Channel not found or not a text channel");
    }

    #[tokio::test]
    async fn test_message_attachments() {
        let (client, rest) = fixture().await;
        rest.on(Method::Get, "/channels/301/messages/701", image_message("701"));
        let params = MessageRef {
            channel_id: "301".to_string(),
            message_id: "701".to_string(),
        };
        let outcome = client.get_message_attachments(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "**Found 1 attachments:**\n- **cat.png**\n  - URL: https://cdn.example.com/cat.png\n  - Size: 2.00 KB\n  - Content Type: image/png\n  - Spoiler: No"
        );

        let plain = MessageRef {
            channel_id: "301".to_string(),
            message_id: "700".to_string(),
        };
        let outcome = client.get_message_attachments(&plain).await.unwrap();
        assert_eq!(outcome.text(), "No attachments found in this message");
    }

    #[tokio::test]
    async fn test_read_images_with_download() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/channels/301/messages",
            json!([image_message("702"), message_json("700", "301", ("500", "alice"), "hi")]),
        );
        rest.with_download("https://cdn.example.com/cat.png", vec![0; 10]);
        let params: ReadImages = serde_json::from_value(json!({
            "channelId": "301",
            "downloadImages": true
        }))
        .unwrap();
        let outcome = client.read_images(&params).await.unwrap();
        let text = outcome.text();
        assert!(text.starts_with("**Found 1 image(s):**\n\n**Image 1: cat.png**\n- Message ID: 702\n- Author: alice"));
        assert!(text.contains("- Dimensions: 640x480"));
        assert!(text.contains("- Downloaded: ✅ (10 bytes)"));
    }

    #[tokio::test]
    async fn test_read_images_none_found() {
        let (client, _rest) = fixture().await;
        let params: ReadImages = serde_json::from_value(json!({ "channelId": "301", "limit": 2 })).unwrap();
        let outcome = client.read_images(&params).await.unwrap();
        assert_eq!(outcome.text(), "No images found in the last 10 messages");
    }
}
