//! Direct messages and username lookup.

use super::{de, no_validation};
use crate::client::{DiscordClient, Outcome};
use crate::format::{format_messages, message_url};
use crate::models::{Channel, Member, Message};
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

/// Page size Discord allows for member listing.
const MEMBER_PAGE: u32 = 1000;

/// `get_user_id_by_name`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserIdByName {
    /// `name` or `name#discriminator`
    pub username: String,
    /// Guild to search
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// `send_private_message`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPrivateMessage {
    /// Recipient
    pub user_id: String,
    /// Message content
    pub message: String,
}

/// `edit_private_message`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPrivateMessage {
    /// Recipient
    pub user_id: String,
    /// Message to edit
    pub message_id: String,
    /// Replacement content
    pub new_message: String,
}

/// `delete_private_message`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePrivateMessage {
    /// Recipient
    pub user_id: String,
    /// Message to delete
    pub message_id: String,
}

/// `read_private_messages`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPrivateMessages {
    /// Recipient
    pub user_id: String,
    /// How many messages (default 100)
    #[serde(default, deserialize_with = "de::count")]
    pub count: Option<u32>,
}

no_validation!(
    GetUserIdByName,
    SendPrivateMessage,
    EditPrivateMessage,
    DeletePrivateMessage,
    ReadPrivateMessages,
);

impl DiscordClient {
    /// Every member of a guild, paging through the list endpoint.
    pub(crate) async fn all_members(&self, guild_id: &str) -> GuildResult<Vec<Member>> {
        let mut members: Vec<Member> = Vec::new();
        loop {
            let after = members.last().map(|member| member.user_id().to_string());
            let page: Vec<Member> = self
                .fetch(
                    RestRequest::get(format!("/guilds/{}/members", guild_id))
                        .query("limit", MEMBER_PAGE)
                        .query_opt("after", after),
                )
                .await?;
            let full = page.len() as u32 == MEMBER_PAGE;
            members.extend(page);
            if !full {
                break;
            }
        }
        debug!(guild_id, count = members.len(), "Fetched guild members");
        Ok(members)
    }

    async fn dm_with(&self, user_id: &str) -> GuildResult<Channel> {
        self.user(user_id)
            .await?
            .ok_or_else(|| GuildError::operation("User not found by userId"))?;
        self.dm_channel(user_id).await
    }

    /// Resolve a username (optionally `name#discriminator`) to a user id.
    #[instrument(skip(self, params), fields(username = %params.username))]
    pub async fn get_user_id_by_name(&self, params: &GetUserIdByName) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild_id = self.resolve_guild(params.guild_id.as_deref())?;
        let guild = self.guild(&guild_id).await?;

        let (name, discriminator) = match params.username.rfind('#') {
            Some(at) => (
                &params.username[..at],
                Some(&params.username[at + 1..]),
            ),
            None => (params.username.as_str(), None),
        };

        let matches: Vec<Member> = self
            .all_members(guild.id())
            .await?
            .into_iter()
            .filter(|member| member.username().eq_ignore_ascii_case(name))
            .filter(|member| {
                discriminator.is_none_or(|wanted| {
                    member
                        .user()
                        .as_ref()
                        .is_some_and(|user| user.discriminator() == wanted)
                })
            })
            .collect();

        match matches.as_slice() {
            [] => Err(GuildError::operation(format!(
                "No user found with username {}",
                params.username
            ))),
            [only] => Ok(Outcome::new(only.user_id()).with("userId", only.user_id())),
            many => {
                let list: Vec<String> = many
                    .iter()
                    .map(|member| {
                        let discriminator = member
                            .user()
                            .as_ref()
                            .map(|user| user.discriminator().as_str())
                            .unwrap_or("0");
                        format!(
                            "{}#{} (ID: {})",
                            member.username(),
                            discriminator,
                            member.user_id()
                        )
                    })
                    .collect();
                Err(GuildError::operation(format!(
                    "Multiple users found with username '{}'. List: {}. Please specify the full username#discriminator.",
                    params.username,
                    list.join(", ")
                )))
            }
        }
    }

    /// DM a user.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn send_private_message(&self, params: &SendPrivateMessage) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let dm = self.dm_with(&params.user_id).await?;
        let sent: Message = self
            .fetch(
                RestRequest::post(format!("/channels/{}/messages", dm.id()))
                    .json(json!({ "content": params.message })),
            )
            .await?;
        let url = message_url(None, dm.id(), sent.id());
        Ok(
            Outcome::new(format!("Message sent successfully. Message link: {}", url))
                .with("messageId", sent.id().as_str()),
        )
    }

    /// Edit a DM the bot sent.
    #[instrument(skip(self, params), fields(user_id = %params.user_id, message_id = %params.message_id))]
    pub async fn edit_private_message(&self, params: &EditPrivateMessage) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let dm = self.dm_with(&params.user_id).await?;
        let message = self
            .message(dm.id(), &params.message_id)
            .await?
            .ok_or_else(|| GuildError::operation("Message not found by messageId"))?;
        let edited: Message = self
            .fetch(
                RestRequest::patch(format!("/channels/{}/messages/{}", dm.id(), message.id()))
                    .json(json!({ "content": params.new_message })),
            )
            .await?;
        Ok(Outcome::new(format!(
            "Message edited successfully. Message link: {}",
            message_url(None, dm.id(), edited.id())
        )))
    }

    /// Delete a DM the bot sent.
    #[instrument(skip(self, params), fields(user_id = %params.user_id, message_id = %params.message_id))]
    pub async fn delete_private_message(
        &self,
        params: &DeletePrivateMessage,
    ) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let dm = self.dm_with(&params.user_id).await?;
        let message = self
            .message(dm.id(), &params.message_id)
            .await?
            .ok_or_else(|| GuildError::operation("Message not found by messageId"))?;
        self.send(RestRequest::delete(format!(
            "/channels/{}/messages/{}",
            dm.id(),
            message.id()
        )))
        .await?;
        Ok(Outcome::new("Message deleted successfully"))
    }

    /// Read the DM history with a user.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn read_private_messages(&self, params: &ReadPrivateMessages) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let dm = self.dm_with(&params.user_id).await?;
        let messages = self
            .messages(dm.id(), params.count.unwrap_or(100), None, None)
            .await?;
        Ok(Outcome::new(format!(
            "**Retrieved {} messages:** \n{}",
            messages.len(),
            format_messages(&messages)
        ))
        .with("count", messages.len()))
    }
}
