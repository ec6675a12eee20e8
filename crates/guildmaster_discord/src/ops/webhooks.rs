//! Webhook creation, listing, deletion and execution.

use super::messages::ChannelRef;
use super::no_validation;
use crate::client::{DiscordClient, Outcome, Validate, optional};
use crate::models::Webhook;
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

/// `create_webhook`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhook {
    /// Text channel
    pub channel_id: String,
    /// Webhook name
    pub name: String,
}

/// `delete_webhook`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteWebhook {
    /// The webhook
    pub webhook_id: String,
}

/// `send_webhook_message`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendWebhookMessage {
    /// `https://discord.com/api/webhooks/{id}/{token}`
    pub webhook_url: String,
    /// Message content
    pub message: String,
}

impl Validate for SendWebhookMessage {
    fn validate(&self) -> GuildResult<()> {
        webhook_route(&self.webhook_url).map(|_| ())
    }
}

no_validation!(CreateWebhook, DeleteWebhook);

/// The `/webhooks/{id}/{token}` route of a webhook URL.
fn webhook_route(url: &str) -> GuildResult<String> {
    let invalid = || GuildError::validation("Invalid webhook URL");
    let rest = url
        .split_once("/api/")
        .map(|(_, rest)| rest)
        .ok_or_else(invalid)?;
    // Versioned URLs look like /api/v10/webhooks/..
    let rest = match rest.split_once('/') {
        Some((version, tail))
            if version
                .strip_prefix('v')
                .is_some_and(|n| n.bytes().all(|b| b.is_ascii_digit())) =>
        {
            tail
        }
        _ => rest,
    };
    let mut parts = rest.trim_end_matches('/').split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("webhooks"), Some(id), Some(token), None)
            if !id.is_empty() && !token.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Ok(format!("/webhooks/{}/{}", id, token))
        }
        _ => Err(invalid()),
    }
}

impl DiscordClient {
    /// Create a webhook in a text channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, name = %params.name))]
    pub async fn create_webhook(&self, params: &CreateWebhook) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found by channelId")
            .await?;
        let webhook: Webhook = self
            .fetch(
                RestRequest::post(format!("/channels/{}/webhooks", channel.id()))
                    .json(json!({ "name": params.name })),
            )
            .await?;
        info!(webhook_id = %webhook.id(), "Webhook created");
        let url = webhook.webhook_url().unwrap_or_default();
        Ok(
            Outcome::new(format!("Created {} webhook: {}", params.name, url))
                .with("webhookId", webhook.id().as_str())
                .with("webhookUrl", url),
        )
    }

    /// Delete a webhook.
    #[instrument(skip(self, params), fields(webhook_id = %params.webhook_id))]
    pub async fn delete_webhook(&self, params: &DeleteWebhook) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let webhook: Webhook = optional(
            self.fetch(RestRequest::get(format!("/webhooks/{}", params.webhook_id)))
                .await,
        )?
        .ok_or_else(|| GuildError::operation("Webhook not found by webhookId"))?;
        self.send(RestRequest::delete(format!("/webhooks/{}", webhook.id())))
            .await?;
        let name = webhook.name().clone().unwrap_or_default();
        Ok(Outcome::new(format!("Deleted {} webhook", name)).with("webhookId", webhook.id().as_str()))
    }

    /// Webhooks of a text channel.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id))]
    pub async fn list_webhooks(&self, params: &ChannelRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .text_channel(&params.channel_id, "Channel not found by channelId")
            .await?;
        let webhooks: Vec<Webhook> = self
            .fetch(RestRequest::get(format!("/channels/{}/webhooks", channel.id())))
            .await?;
        if webhooks.is_empty() {
            return Err(GuildError::operation("No webhooks found"));
        }
        let lines: Vec<String> = webhooks
            .iter()
            .map(|webhook| {
                format!(
                    "- (ID: {}) **[{}]** ```{}```",
                    webhook.id(),
                    webhook.name().as_deref().unwrap_or_default(),
                    webhook.webhook_url().unwrap_or_default()
                )
            })
            .collect();
        Ok(Outcome::new(format!(
            "**Retrieved {} webhooks:** \n{}",
            lines.len(),
            lines.join("\n")
        ))
        .with("count", lines.len()))
    }

    /// Post a message through a webhook URL.
    #[instrument(skip(self, params))]
    pub async fn send_webhook_message(&self, params: &SendWebhookMessage) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let route = webhook_route(&params.webhook_url)?;
        self.send(
            RestRequest::post(route)
                .query("wait", true)
                .json(json!({ "content": params.message })),
        )
        .await?;
        Ok(Outcome::new("Message sent successfully via webhook"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::fixture;

    #[test]
    fn test_webhook_route_accepts_versioned_urls() {
        assert_eq!(
            webhook_route("https://discord.com/api/webhooks/42/abc").unwrap(),
            "/webhooks/42/abc"
        );
        assert_eq!(
            webhook_route("https://discord.com/api/v10/webhooks/42/abc/").unwrap(),
            "/webhooks/42/abc"
        );
        assert!(webhook_route("https://example.com/hooks/42").is_err());
        assert!(webhook_route("https://discord.com/api/webhooks/42").is_err());
    }

    #[tokio::test]
    async fn test_create_webhook_returns_url() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Post,
            "/channels/301/webhooks",
            json!({ "id": "42", "name": "alerts", "token": "tok", "channel_id": "301" }),
        );
        let params = CreateWebhook {
            channel_id: "301".to_string(),
            name: "alerts".to_string(),
        };
        let outcome = client.create_webhook(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Created alerts webhook: https://discord.com/api/webhooks/42/tok"
        );
    }

    #[tokio::test]
    async fn test_list_webhooks_empty_is_error() {
        let (client, rest) = fixture().await;
        rest.on(Method::Get, "/channels/301/webhooks", json!([]));
        let params = ChannelRef {
            channel_id: "301".to_string(),
        };
        let err = client.list_webhooks(&params).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "No webhooks found");
    }

    #[tokio::test]
    async fn test_delete_unknown_webhook() {
        let (client, rest) = fixture().await;
        let params = DeleteWebhook {
            webhook_id: "43".to_string(),
        };
        let err = client.delete_webhook(&params).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Webhook not found by webhookId");
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_send_webhook_message() {
        let (client, rest) = fixture().await;
        rest.on(Method::Post, "/webhooks/42/tok", json!({ "id": "1" }));
        let params = SendWebhookMessage {
            webhook_url: "https://discord.com/api/webhooks/42/tok".to_string(),
            message: "deploy finished".to_string(),
        };
        let outcome = client.send_webhook_message(&params).await.unwrap();
        assert_eq!(outcome.text(), "Message sent successfully via webhook");
        let post = &rest.requests_to(Method::Post, "/webhooks/42/tok")[0];
        assert_eq!(post.json_body().unwrap()["content"], "deploy finished");
    }
}
