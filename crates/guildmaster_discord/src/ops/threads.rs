//! Thread creation, archiving, locking and membership.

use super::server::GuildRef;
use super::{failed, no_validation};
use crate::client::{DiscordClient, Outcome, Validate, optional};
use crate::format::{from_millis, locale_datetime, snowflake_timestamp};
use crate::models::{ActiveThreads, Channel, ChannelKind};
use crate::permissions::bit_of;
use crate::rest::RestRequest;
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

/// Auto-archive durations Discord accepts, in minutes.
pub const AUTO_ARCHIVE_MINUTES: [u32; 4] = [60, 1440, 4320, 10080];

const DEFAULT_AUTO_ARCHIVE: u32 = 1440;

/// `create_thread`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThread {
    /// Text or announcement channel
    pub channel_id: String,
    /// Thread name
    pub name: String,
    /// Minutes of inactivity before archiving: 60, 1440, 4320 or 10080
    #[serde(default)]
    pub auto_archive_duration: Option<u32>,
    /// Start the thread from this message
    #[serde(default)]
    pub message_id: Option<String>,
}

/// `archive_thread`, `unarchive_thread`, `lock_thread`, `unlock_thread`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadAction {
    /// The thread
    pub thread_id: String,
    /// Audit log reason
    #[serde(default)]
    pub reason: Option<String>,
}

/// `join_thread`, `leave_thread`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRef {
    /// The thread
    pub thread_id: String,
}

impl Validate for CreateThread {
    fn validate(&self) -> GuildResult<()> {
        match self.auto_archive_duration {
            Some(minutes) if !AUTO_ARCHIVE_MINUTES.contains(&minutes) => {
                Err(GuildError::validation(
                    "Auto-archive duration must be 60, 1440, 4320 or 10080 minutes",
                ))
            }
            _ => Ok(()),
        }
    }
}

no_validation!(ThreadAction, ThreadRef);

/// Which thread flag a [`ThreadAction`] flips.
#[derive(Debug, Clone, Copy)]
enum ThreadFlag {
    Archived,
    Locked,
}

impl DiscordClient {
    async fn thread(&self, thread_id: &str) -> GuildResult<Channel> {
        self.channel(thread_id)
            .await?
            .filter(|channel| channel.kind().is_thread())
            .ok_or_else(|| GuildError::operation("Thread not found by threadId"))
    }

    async fn set_thread_flag(
        &self,
        thread: &Channel,
        flag: ThreadFlag,
        value: bool,
        reason: &str,
    ) -> GuildResult<()> {
        let body = match flag {
            ThreadFlag::Archived => json!({ "archived": value }),
            ThreadFlag::Locked => json!({ "locked": value }),
        };
        self.send(
            RestRequest::patch(format!("/channels/{}", thread.id()))
                .json(body)
                .reason(Some(reason)),
        )
        .await?;
        info!(thread_id = %thread.id(), ?flag, value, "Thread updated");
        Ok(())
    }

    async fn require_manage_threads(&self, thread: &Channel) -> GuildResult<()> {
        let guild_id = thread
            .guild_id()
            .as_deref()
            .ok_or_else(|| GuildError::operation("Thread not found by threadId"))?;
        let guild = self.guild(guild_id).await?;
        self.bot_context(guild)
            .await?
            .require(
                bit_of::MANAGE_THREADS,
                "Bot doesn't have permission to manage threads",
            )
    }

    async fn is_thread_member(&self, thread: &Channel) -> GuildResult<bool> {
        let me = self.ensure_ready().await?;
        let member = optional(
            self.send(RestRequest::get(format!(
                "/channels/{}/thread-members/{}",
                thread.id(),
                me.id()
            )))
            .await,
        )?;
        Ok(member.is_some_and(|value| !value.is_null()))
    }

    /// Start a public thread in a channel, or from one of its messages.
    #[instrument(skip(self, params), fields(channel_id = %params.channel_id, name = %params.name))]
    pub async fn create_thread(&self, params: &CreateThread) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let channel = self
            .channel(&params.channel_id)
            .await?
            .filter(|channel| {
                matches!(
                    channel.kind(),
                    ChannelKind::GuildText | ChannelKind::GuildAnnouncement
                )
            })
            .ok_or_else(|| GuildError::operation("Channel not found or not a text channel"))?;

        let result: GuildResult<Outcome> = async {
            params.validate()?;
            let minutes = params.auto_archive_duration.unwrap_or(DEFAULT_AUTO_ARCHIVE);
            let (thread, origin): (Channel, String) = match &params.message_id {
                Some(message_id) => {
                    let message = self
                        .message(channel.id(), message_id)
                        .await?
                        .ok_or_else(|| GuildError::operation("Message not found by messageId"))?;
                    let thread = self
                        .fetch(
                            RestRequest::post(format!(
                                "/channels/{}/messages/{}/threads",
                                channel.id(),
                                message.id()
                            ))
                            .json(json!({
                                "name": params.name,
                                "auto_archive_duration": minutes,
                            })),
                        )
                        .await?;
                    (thread, format!("from message in {}", channel.name()))
                }
                None => {
                    let thread = self
                        .fetch(
                            RestRequest::post(format!("/channels/{}/threads", channel.id())).json(
                                json!({
                                    "name": params.name,
                                    "auto_archive_duration": minutes,
                                    "type": ChannelKind::PublicThread.code(),
                                }),
                            ),
                        )
                        .await?;
                    (thread, format!("in {}", channel.name()))
                }
            };
            info!(thread_id = %thread.id(), "Thread created");
            Ok(Outcome::new(format!(
                "Successfully created thread \"{}\" (ID: {}) {}. Auto-archive: {} minutes",
                thread.name(),
                thread.id(),
                origin,
                minutes
            ))
            .with("threadId", thread.id().as_str()))
        }
        .await;
        result.map_err(failed("create thread"))
    }

    /// Archive a thread.
    #[instrument(skip(self, params), fields(thread_id = %params.thread_id))]
    pub async fn archive_thread(&self, params: &ThreadAction) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let thread = self.thread(&params.thread_id).await?;
        if is_archived(&thread) {
            return Ok(Outcome::new(format!(
                "Thread \"{}\" is already archived",
                thread.name()
            )));
        }
        let reason = params.reason.as_deref().unwrap_or("Thread archived via bot");
        self.set_thread_flag(&thread, ThreadFlag::Archived, true, reason)
            .await
            .map_err(failed("archive thread"))?;
        Ok(Outcome::new(format!(
            "Successfully archived thread \"{}\" (ID: {})",
            thread.name(),
            thread.id()
        ))
        .with("threadId", thread.id().as_str()))
    }

    /// Unarchive a thread.
    #[instrument(skip(self, params), fields(thread_id = %params.thread_id))]
    pub async fn unarchive_thread(&self, params: &ThreadAction) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let thread = self.thread(&params.thread_id).await?;
        if !is_archived(&thread) {
            return Ok(Outcome::new(format!(
                "Thread \"{}\" is not archived",
                thread.name()
            )));
        }
        let reason = params.reason.as_deref().unwrap_or("Thread unarchived via bot");
        self.set_thread_flag(&thread, ThreadFlag::Archived, false, reason)
            .await
            .map_err(failed("unarchive thread"))?;
        Ok(Outcome::new(format!(
            "Successfully unarchived thread \"{}\" (ID: {})",
            thread.name(),
            thread.id()
        ))
        .with("threadId", thread.id().as_str()))
    }

    /// Lock a thread so only moderators can post.
    #[instrument(skip(self, params), fields(thread_id = %params.thread_id))]
    pub async fn lock_thread(&self, params: &ThreadAction) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let thread = self.thread(&params.thread_id).await?;
        if is_locked(&thread) {
            return Ok(Outcome::new(format!(
                "Thread \"{}\" is already locked",
                thread.name()
            )));
        }
        self.require_manage_threads(&thread).await?;
        let reason = params.reason.as_deref().unwrap_or("Thread locked via bot");
        self.set_thread_flag(&thread, ThreadFlag::Locked, true, reason)
            .await
            .map_err(failed("lock thread"))?;
        Ok(Outcome::new(format!(
            "Successfully locked thread \"{}\" (ID: {}). New messages are now disabled.",
            thread.name(),
            thread.id()
        ))
        .with("threadId", thread.id().as_str()))
    }

    /// Unlock a thread.
    #[instrument(skip(self, params), fields(thread_id = %params.thread_id))]
    pub async fn unlock_thread(&self, params: &ThreadAction) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let thread = self.thread(&params.thread_id).await?;
        if !is_locked(&thread) {
            return Ok(Outcome::new(format!(
                "Thread \"{}\" is not locked",
                thread.name()
            )));
        }
        self.require_manage_threads(&thread).await?;
        let reason = params.reason.as_deref().unwrap_or("Thread unlocked via bot");
        self.set_thread_flag(&thread, ThreadFlag::Locked, false, reason)
            .await
            .map_err(failed("unlock thread"))?;
        Ok(Outcome::new(format!(
            "Successfully unlocked thread \"{}\" (ID: {}). New messages are now allowed.",
            thread.name(),
            thread.id()
        ))
        .with("threadId", thread.id().as_str()))
    }

    /// Add the bot to a thread.
    #[instrument(skip(self, params), fields(thread_id = %params.thread_id))]
    pub async fn join_thread(&self, params: &ThreadRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let thread = self.thread(&params.thread_id).await?;
        let result: GuildResult<Outcome> = async {
            if self.is_thread_member(&thread).await? {
                return Ok(Outcome::new(format!(
                    "Bot is already a member of thread \"{}\"",
                    thread.name()
                )));
            }
            self.send(RestRequest::put(format!(
                "/channels/{}/thread-members/@me",
                thread.id()
            )))
            .await?;
            Ok(Outcome::new(format!(
                "Successfully joined thread \"{}\" (ID: {})",
                thread.name(),
                thread.id()
            ))
            .with("threadId", thread.id().as_str()))
        }
        .await;
        result.map_err(failed("join thread"))
    }

    /// Remove the bot from a thread.
    #[instrument(skip(self, params), fields(thread_id = %params.thread_id))]
    pub async fn leave_thread(&self, params: &ThreadRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let thread = self.thread(&params.thread_id).await?;
        let result: GuildResult<Outcome> = async {
            if !self.is_thread_member(&thread).await? {
                return Ok(Outcome::new(format!(
                    "Bot is not a member of thread \"{}\"",
                    thread.name()
                )));
            }
            self.send(RestRequest::delete(format!(
                "/channels/{}/thread-members/@me",
                thread.id()
            )))
            .await?;
            Ok(Outcome::new(format!(
                "Successfully left thread \"{}\" (ID: {})",
                thread.name(),
                thread.id()
            ))
            .with("threadId", thread.id().as_str()))
        }
        .await;
        result.map_err(failed("leave thread"))
    }

    /// Active threads of the guild, grouped under their parent channels.
    #[instrument(skip(self, params))]
    pub async fn get_active_threads(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;

        let result: GuildResult<Outcome> = async {
            let active: ActiveThreads = self
                .fetch(RestRequest::get(format!("/guilds/{}/threads/active", guild.id())))
                .await?;
            let threads = active.threads();
            if threads.is_empty() {
                return Ok(Outcome::new("No active threads found in this server").with("count", 0));
            }

            let channels = self.guild_channels(guild.id()).await?;
            let mut parents: Vec<&str> = Vec::new();
            for thread in threads {
                let parent = thread.parent_id().as_deref().unwrap_or("unknown");
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }

            let mut lines = Vec::new();
            for parent in parents {
                let parent_name = channels
                    .iter()
                    .find(|channel| channel.id() == parent)
                    .map_or("Unknown Channel", |channel| channel.name().as_str());
                lines.push(format!("\n**Parent Channel: {}**", parent_name));
                for thread in threads
                    .iter()
                    .filter(|thread| thread.parent_id().as_deref().unwrap_or("unknown") == parent)
                {
                    lines.push(thread_entry(thread));
                }
            }

            Ok(Outcome::new(format!(
                "**Found {} active threads:**{}",
                threads.len(),
                lines.join("\n")
            ))
            .with("count", threads.len()))
        }
        .await;
        result.map_err(failed("fetch active threads"))
    }
}

fn is_archived(thread: &Channel) -> bool {
    thread
        .thread_metadata()
        .as_ref()
        .is_some_and(|meta| *meta.archived())
}

fn is_locked(thread: &Channel) -> bool {
    thread
        .thread_metadata()
        .as_ref()
        .is_some_and(|meta| *meta.locked())
}

fn thread_entry(thread: &Channel) -> String {
    let auto_archive = thread
        .thread_metadata()
        .as_ref()
        .map(|meta| *meta.auto_archive_duration())
        .filter(|minutes| *minutes > 0)
        .unwrap_or(60);
    let created = snowflake_timestamp(thread.id())
        .and_then(from_millis)
        .map_or_else(|| "Unknown".to_string(), locale_datetime);
    format!(
        "  - {}{} **{}** (ID: {})\n    - Members: {}\n    - Auto-archive: {} minutes\n    - Created: {}",
        if is_locked(thread) { "🔒" } else { "" },
        if is_archived(thread) { "📦" } else { "" },
        thread.name(),
        thread.id(),
        thread.member_count().unwrap_or(0),
        auto_archive,
        created
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::{fixture, thread_json};

    fn action(thread_id: &str) -> ThreadAction {
        ThreadAction {
            thread_id: thread_id.to_string(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_create_thread_from_message() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Post,
            "/channels/301/messages/700/threads",
            thread_json("800", "301", "hello-thread", false, false),
        );
        let params = CreateThread {
            channel_id: "301".to_string(),
            name: "hello-thread".to_string(),
            auto_archive_duration: Some(60),
            message_id: Some("700".to_string()),
        };
        let outcome = client.create_thread(&params).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully created thread \"hello-thread\" (ID: 800) from message in general. Auto-archive: 60 minutes"
        );
    }

    #[tokio::test]
    async fn test_create_thread_rejects_voice_channel() {
        let (client, _rest) = fixture().await;
        let params = CreateThread {
            channel_id: "302".to_string(),
            name: "nope".to_string(),
            auto_archive_duration: None,
            message_id: None,
        };
        let err = client.create_thread(&params).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Channel not found or not a text channel");
    }

    #[test]
    fn test_auto_archive_must_be_known_duration() {
        let params = CreateThread {
            channel_id: "301".to_string(),
            name: "t".to_string(),
            auto_archive_duration: Some(90),
            message_id: None,
        };
        assert!(params.validate().is_err());
    }

    #[tokio::test]
    async fn test_archive_is_idempotent() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/channels/800",
            thread_json("800", "301", "old", true, false),
        );
        let outcome = client.archive_thread(&action("800")).await.unwrap();
        assert_eq!(outcome.text(), "Thread \"old\" is already archived");
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_lock_thread_sends_reason() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/channels/800",
            thread_json("800", "301", "heated", false, false),
        );
        rest.on(Method::Patch, "/channels/800", json!({}));
        let outcome = client.lock_thread(&action("800")).await.unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully locked thread \"heated\" (ID: 800). New messages are now disabled."
        );
        let patch = &rest.requests_to(Method::Patch, "/channels/800")[0];
        assert_eq!(patch.json_body().unwrap()["locked"], true);
        assert_eq!(patch.audit_reason(), Some("Thread locked via bot"));
    }

    #[tokio::test]
    async fn test_join_thread_checks_membership() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/channels/800",
            thread_json("800", "301", "chat", false, false),
        );
        rest.on(
            Method::Get,
            "/channels/800/thread-members/900",
            json!({ "id": "800", "user_id": "900" }),
        );
        let outcome = client
            .join_thread(&ThreadRef {
                thread_id: "800".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.text(), "Bot is already a member of thread \"chat\"");
    }

    #[tokio::test]
    async fn test_not_a_thread() {
        let (client, _rest) = fixture().await;
        let err = client.archive_thread(&action("301")).await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Thread not found by threadId");
    }

    #[tokio::test]
    async fn test_active_threads_grouped_by_parent() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/guilds/100/threads/active",
            json!({
                "threads": [
                    thread_json("800", "301", "plans", false, true),
                    thread_json("801", "304", "memes", false, false),
                ],
                "members": []
            }),
        );
        let outcome = client
            .get_active_threads(&GuildRef::default())
            .await
            .unwrap();
        let text = outcome.text();
        assert!(text.starts_with("**Found 2 active threads:**\n**Parent Channel: general**\n  - 🔒 **plans** (ID: 800)"));
        assert!(text.contains("\n**Parent Channel: off-topic**\n  -  **memes** (ID: 801)\n    - Members: 2\n    - Auto-archive: 1440 minutes"));
    }
}
