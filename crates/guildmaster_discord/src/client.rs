//! The Discord client wrapper every operation runs against.

use crate::models::{Channel, Guild, Member, Message, Role, User};
use crate::permissions;
use crate::rest::{DiscordRest, RestRequest};
use crate::voice::VoiceManager;
use guildmaster_error::{GuildError, GuildResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Result of an operation: the prose returned to the agent plus the key
/// identifiers it produced.
#[derive(Debug, Clone, PartialEq, Default, derive_getters::Getters)]
pub struct Outcome {
    text: String,
    fields: Map<String, Value>,
}

impl Outcome {
    /// An outcome with no fields.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fields: Map::new(),
        }
    }

    /// Record a field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// A recorded field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Consume the outcome, keeping the text.
    pub fn into_text(self) -> String {
        self.text
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Shape and range checks run before any network call.
pub trait Validate {
    /// Check the parameters. The default accepts everything.
    fn validate(&self) -> GuildResult<()> {
        Ok(())
    }
}

/// The bot's standing in a guild.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct BotContext {
    guild: Guild,
    member: Member,
    permissions: u64,
    highest_role: Option<Role>,
}

impl BotContext {
    /// Whether the bot holds every bit in `bits`.
    pub fn has(&self, bits: u64) -> bool {
        self.permissions & bits == bits
    }

    /// Fail with `message` unless the bot holds `bits`.
    #[track_caller]
    pub fn require(&self, bits: u64, message: &str) -> GuildResult<()> {
        if self.has(bits) {
            Ok(())
        } else {
            Err(GuildError::permission(message))
        }
    }

    /// Position of the bot's highest role, 0 when it has none.
    pub fn highest_position(&self) -> i64 {
        self.highest_role.as_ref().map_or(0, |role| *role.position())
    }

    /// Whether the bot outranks a member: it is the owner, or its highest
    /// role sits above theirs, and the target is not the owner.
    pub fn outranks(&self, target: &Member) -> bool {
        if target.user_id() == self.guild.owner_id() {
            return false;
        }
        if self.member.user_id() == self.guild.owner_id() {
            return true;
        }
        self.highest_position() > highest_role(&self.guild, target).map_or(0, |r| *r.position())
    }

    /// Whether the bot may assign or remove `role`.
    pub fn can_manage_role(&self, role: &Role) -> bool {
        self.has(permissions::bit_of::MANAGE_ROLES)
            && !role.managed()
            && (self.member.user_id() == self.guild.owner_id()
                || *role.position() < self.highest_position())
    }
}

/// A member's highest role by position.
pub fn highest_role(guild: &Guild, member: &Member) -> Option<Role> {
    member
        .roles()
        .iter()
        .filter_map(|id| guild.role(id))
        .max_by_key(|role| *role.position())
        .or_else(|| guild.everyone_role())
        .cloned()
}

/// Decode a JSON response into a model.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> GuildResult<T> {
    serde_json::from_value(value).map_err(|e| {
        GuildError::new(guildmaster_error::GuildErrorKind::Unknown(format!(
            "Unexpected Discord response: {}",
            e
        )))
    })
}

/// Map a 404 to `None`.
pub(crate) fn optional<T>(result: GuildResult<T>) -> GuildResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind().is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Discord client wrapper.
///
/// Holds the REST backend, the default guild, the bot's own user once the
/// gateway reports `Ready`, and the voice sessions. Cloning is cheap and
/// clones share state.
#[derive(Debug, Clone)]
pub struct DiscordClient {
    rest: Arc<dyn DiscordRest>,
    default_guild: Option<String>,
    me: Arc<RwLock<Option<User>>>,
    voice: VoiceManager,
}

impl DiscordClient {
    /// Create a client over a REST backend.
    pub fn new(rest: Arc<dyn DiscordRest>, default_guild: Option<String>) -> Self {
        Self {
            rest,
            default_guild: default_guild.filter(|id| !id.is_empty()),
            me: Arc::new(RwLock::new(None)),
            voice: VoiceManager::default(),
        }
    }

    /// Replace the voice manager.
    pub fn with_voice(mut self, voice: VoiceManager) -> Self {
        self.voice = voice;
        self
    }

    /// The REST backend.
    pub fn rest(&self) -> &Arc<dyn DiscordRest> {
        &self.rest
    }

    /// The voice manager.
    pub fn voice(&self) -> &VoiceManager {
        &self.voice
    }

    /// The configured default guild.
    pub fn default_guild(&self) -> Option<&str> {
        self.default_guild.as_deref()
    }

    /// Record the bot's user; the client is ready from now on.
    pub async fn mark_ready(&self, user: User) {
        info!(user = %user.tag(), "Discord client ready");
        *self.me.write().await = Some(user);
    }

    /// Whether the gateway has reported `Ready`.
    pub async fn is_ready(&self) -> bool {
        self.me.read().await.is_some()
    }

    /// The bot's user, or an error until the client is ready.
    pub async fn ensure_ready(&self) -> GuildResult<User> {
        self.me
            .read()
            .await
            .clone()
            .ok_or_else(|| GuildError::operation("Discord client is not ready"))
    }

    /// The supplied guild id, else the default.
    #[track_caller]
    pub fn resolve_guild(&self, guild_id: Option<&str>) -> GuildResult<String> {
        guild_id
            .filter(|id| !id.is_empty())
            .or(self.default_guild.as_deref())
            .map(str::to_string)
            .ok_or_else(|| GuildError::validation("guildId cannot be null"))
    }

    /// Send a request and return the raw JSON.
    pub async fn send(&self, request: RestRequest) -> GuildResult<Value> {
        debug!(route = %request.route_key(), "Sending Discord request");
        self.rest.request(request).await
    }

    /// Send a request and decode the response.
    pub async fn fetch<T: DeserializeOwned>(&self, request: RestRequest) -> GuildResult<T> {
        decode(self.send(request).await?)
    }

    /// Guild with approximate counts; 404 becomes `missing`.
    pub async fn guild_or(&self, guild_id: &str, missing: &str) -> GuildResult<Guild> {
        let request = RestRequest::get(format!("/guilds/{}", guild_id)).query("with_counts", true);
        optional(self.fetch(request).await)?.ok_or_else(|| GuildError::operation(missing))
    }

    /// Guild, failing with `Discord server not found by guildId`.
    pub async fn guild(&self, guild_id: &str) -> GuildResult<Guild> {
        self.guild_or(guild_id, "Discord server not found by guildId")
            .await
    }

    /// Every channel of a guild, sorted by position.
    pub async fn guild_channels(&self, guild_id: &str) -> GuildResult<Vec<Channel>> {
        let mut channels: Vec<Channel> = self
            .fetch(RestRequest::get(format!("/guilds/{}/channels", guild_id)))
            .await?;
        channels.sort_by(|a, b| a.position().cmp(b.position()).then(a.id().cmp(b.id())));
        Ok(channels)
    }

    /// A channel, `None` when Discord does not know it.
    pub async fn channel(&self, channel_id: &str) -> GuildResult<Option<Channel>> {
        optional(
            self.fetch(RestRequest::get(format!("/channels/{}", channel_id)))
                .await,
        )
    }

    /// A channel that belongs to `guild_id`.
    pub async fn guild_channel(
        &self,
        guild_id: &str,
        channel_id: &str,
    ) -> GuildResult<Option<Channel>> {
        Ok(self
            .channel(channel_id)
            .await?
            .filter(|channel| channel.guild_id().as_deref() == Some(guild_id)))
    }

    /// A guild member, `None` when they are not in the guild.
    pub async fn member(&self, guild_id: &str, user_id: &str) -> GuildResult<Option<Member>> {
        optional(
            self.fetch(RestRequest::get(format!(
                "/guilds/{}/members/{}",
                guild_id, user_id
            )))
            .await,
        )
    }

    /// A user, `None` when unknown.
    pub async fn user(&self, user_id: &str) -> GuildResult<Option<User>> {
        optional(
            self.fetch(RestRequest::get(format!("/users/{}", user_id)))
                .await,
        )
    }

    /// A message, `None` when it does not exist.
    pub async fn message(&self, channel_id: &str, message_id: &str) -> GuildResult<Option<Message>> {
        optional(
            self.fetch(RestRequest::get(format!(
                "/channels/{}/messages/{}",
                channel_id, message_id
            )))
            .await,
        )
    }

    /// Latest messages of a channel, newest first.
    pub async fn messages(
        &self,
        channel_id: &str,
        limit: u32,
        before: Option<&str>,
        after: Option<&str>,
    ) -> GuildResult<Vec<Message>> {
        let request = RestRequest::get(format!("/channels/{}/messages", channel_id))
            .query("limit", limit.clamp(1, 100))
            .query_opt("before", before)
            .query_opt("after", after);
        self.fetch(request).await
    }

    /// The DM channel with a user.
    pub async fn dm_channel(&self, user_id: &str) -> GuildResult<Channel> {
        self.fetch(
            RestRequest::post("/users/@me/channels")
                .json(serde_json::json!({ "recipient_id": user_id })),
        )
        .await
    }

    /// The bot's standing in a guild: membership, permissions, highest role.
    pub async fn bot_context(&self, guild: Guild) -> GuildResult<BotContext> {
        let me = self.ensure_ready().await?;
        let member = self
            .member(guild.id(), me.id())
            .await?
            .ok_or_else(|| GuildError::operation("Bot is not a member of this server"))?;
        let permissions = permissions::member_permissions(&guild, &member);
        let highest_role = highest_role(&guild, &member);
        Ok(BotContext {
            guild,
            member,
            permissions,
            highest_role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::MockRest;
    use crate::testing::{BOT_ID, GUILD_ID, fixture};

    #[tokio::test]
    async fn test_not_ready_until_marked() {
        let client = DiscordClient::new(Arc::new(MockRest::new()), None);
        let err = client.ensure_ready().await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Discord client is not ready");
    }

    #[tokio::test]
    async fn test_resolve_guild_prefers_supplied_id() {
        let client = DiscordClient::new(Arc::new(MockRest::new()), Some("7".to_string()));
        assert_eq!(client.resolve_guild(Some("9")).unwrap(), "9");
        assert_eq!(client.resolve_guild(None).unwrap(), "7");

        let client = DiscordClient::new(Arc::new(MockRest::new()), None);
        let err = client.resolve_guild(None).unwrap_err();
        assert_eq!(err.kind().to_string(), "guildId cannot be null");
    }

    #[tokio::test]
    async fn test_bot_context_computes_hierarchy() {
        let (client, _rest) = fixture().await;
        let guild = client.guild(GUILD_ID).await.unwrap();
        let bot = client.bot_context(guild).await.unwrap();

        assert_eq!(bot.member().user_id(), BOT_ID);
        assert!(bot.has(permissions::bit_of::MANAGE_ROLES));
        assert_eq!(bot.highest_role().as_ref().unwrap().name(), "Bot");
        assert_eq!(bot.highest_position(), 5);
    }

    #[tokio::test]
    async fn test_missing_guild_message() {
        let (client, _rest) = fixture().await;
        let err = client.guild("404").await.unwrap_err();
        assert_eq!(err.kind().to_string(), "Discord server not found by guildId");
    }
}
