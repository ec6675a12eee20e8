//! JSON fixtures and test doubles shared by unit and integration tests.
//!
//! [`fixture`] builds a ready client over a [`MockRest`] scripted with one
//! guild:
//!
//! | id | kind | name |
//! |---|---|---|
//! | 100 | guild | Test Guild (owner 1, boost tier 1) |
//! | 201 / 202 / 205 / 206 | roles | Moderator (2), Member (1), Bot (5), Admin (6) |
//! | 300 | category | General Stuff |
//! | 301 | text (in 300) | general |
//! | 302 | voice (in 300) | Lounge |
//! | 303 | announcement | news |
//! | 304 | text | off-topic |
//! | 305 | stage | Town Hall |
//! | 500 / 501 / 900 | members | alice (Member), bob (Moderator), the bot |
//! | 700 | message in 301 | "hello" by alice |

use crate::client::DiscordClient;
use crate::models::User;
use crate::permissions::bit_of;
use crate::rest::{Method, MockRest};
use crate::voice::{PlayerState, VoiceDriver};
use async_trait::async_trait;
use guildmaster_error::{GuildError, GuildResult};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// The fixture guild.
pub const GUILD_ID: &str = "100";
/// The bot's user id.
pub const BOT_ID: &str = "900";
/// The guild owner's user id.
pub const OWNER_ID: &str = "1";

/// Channel type codes used by fixtures.
pub mod kind {
    /// Text
    pub const TEXT: u8 = 0;
    /// Voice
    pub const VOICE: u8 = 2;
    /// Category
    pub const CATEGORY: u8 = 4;
    /// Announcement
    pub const ANNOUNCEMENT: u8 = 5;
    /// Public thread
    pub const THREAD: u8 = 11;
    /// Stage
    pub const STAGE: u8 = 13;
    /// Forum
    pub const FORUM: u8 = 15;
}

/// A user object.
pub fn user_json(id: &str, username: &str) -> Value {
    json!({ "id": id, "username": username, "discriminator": "0" })
}

/// A role object.
pub fn role_json(id: &str, name: &str, position: i64, permissions: u64) -> Value {
    json!({
        "id": id,
        "name": name,
        "color": 0,
        "position": position,
        "permissions": permissions.to_string(),
        "managed": false,
        "mentionable": true
    })
}

/// A channel in the fixture guild.
pub fn channel_json(id: &str, kind: u8, name: &str, parent: Option<&str>) -> Value {
    json!({
        "id": id,
        "type": kind,
        "guild_id": GUILD_ID,
        "name": name,
        "parent_id": parent,
        "position": 0,
        "permission_overwrites": []
    })
}

/// A public thread under `parent` with its metadata flags set.
pub fn thread_json(id: &str, parent: &str, name: &str, archived: bool, locked: bool) -> Value {
    let mut thread = channel_json(id, kind::THREAD, name, Some(parent));
    thread["thread_metadata"] = json!({
        "archived": archived,
        "locked": locked,
        "auto_archive_duration": 1440
    });
    thread["member_count"] = json!(2);
    thread
}

/// A guild member.
pub fn member_json(id: &str, username: &str, roles: &[&str]) -> Value {
    json!({
        "user": user_json(id, username),
        "nick": null,
        "roles": roles,
        "joined_at": "2024-01-05T15:04:05.000000+00:00"
    })
}

/// A message.
pub fn message_json(id: &str, channel_id: &str, author: (&str, &str), content: &str) -> Value {
    json!({
        "id": id,
        "channel_id": channel_id,
        "content": content,
        "timestamp": "2024-03-01T12:00:00.000000+00:00",
        "author": user_json(author.0, author.1),
        "attachments": [],
        "reactions": [],
        "pinned": false
    })
}

/// The fixture guild object.
pub fn guild_json() -> Value {
    let bot_permissions = bit_of::MANAGE_ROLES
        | bit_of::MANAGE_CHANNELS
        | bit_of::MANAGE_GUILD
        | bit_of::MANAGE_MESSAGES
        | bit_of::KICK_MEMBERS
        | bit_of::BAN_MEMBERS
        | bit_of::MODERATE_MEMBERS
        | bit_of::MANAGE_GUILD_EXPRESSIONS
        | bit_of::MANAGE_WEBHOOKS
        | bit_of::MANAGE_EVENTS
        | bit_of::MANAGE_THREADS
        | bit_of::MANAGE_NICKNAMES
        | bit_of::VIEW_AUDIT_LOG
        | bit_of::VIEW_CHANNEL
        | bit_of::CONNECT;
    json!({
        "id": GUILD_ID,
        "name": "Test Guild",
        "owner_id": OWNER_ID,
        "description": null,
        "verification_level": 1,
        "premium_tier": 1,
        "premium_subscription_count": 3,
        "approximate_member_count": 4,
        "features": ["COMMUNITY"],
        "roles": [
            role_json(GUILD_ID, "@everyone", 0, bit_of::VIEW_CHANNEL),
            role_json("202", "Member", 1, 0),
            role_json("201", "Moderator", 2, bit_of::KICK_MEMBERS),
            role_json("205", "Bot", 5, bot_permissions),
            role_json("206", "Admin", 6, bit_of::ADMINISTRATOR)
        ],
        "emojis": []
    })
}

fn fixture_channels() -> Vec<Value> {
    let mut channels = vec![
        channel_json("300", kind::CATEGORY, "General Stuff", None),
        channel_json("301", kind::TEXT, "general", Some("300")),
        channel_json("302", kind::VOICE, "Lounge", Some("300")),
        channel_json("303", kind::ANNOUNCEMENT, "news", None),
        channel_json("304", kind::TEXT, "off-topic", None),
        channel_json("305", kind::STAGE, "Town Hall", None),
    ];
    for (position, channel) in channels.iter_mut().enumerate() {
        channel["position"] = json!(position);
    }
    channels[2]["bitrate"] = json!(64000);
    channels[2]["user_limit"] = json!(0);
    channels
}

/// Register the fixture guild on a mock.
pub fn script_guild(rest: &MockRest) {
    rest.on(Method::Get, &format!("/guilds/{}", GUILD_ID), guild_json());

    let channels = fixture_channels();
    for channel in &channels {
        let id = channel["id"].as_str().unwrap_or_default();
        rest.on(Method::Get, &format!("/channels/{}", id), channel.clone());
    }
    rest.on(
        Method::Get,
        &format!("/guilds/{}/channels", GUILD_ID),
        Value::Array(channels),
    );

    let members = [
        member_json(OWNER_ID, "owner", &[]),
        member_json("500", "alice", &["202"]),
        member_json("501", "bob", &["201"]),
        member_json(BOT_ID, "guildmaster", &["205"]),
    ];
    for member in &members {
        let id = member["user"]["id"].as_str().unwrap_or_default();
        rest.on(
            Method::Get,
            &format!("/guilds/{}/members/{}", GUILD_ID, id),
            member.clone(),
        );
        rest.on(Method::Get, &format!("/users/{}", id), member["user"].clone());
    }
    rest.on(
        Method::Get,
        &format!("/guilds/{}/members", GUILD_ID),
        Value::Array(members.to_vec()),
    );

    let hello = message_json("700", "301", ("500", "alice"), "hello");
    rest.on(Method::Get, "/channels/301/messages/700", hello.clone());
    rest.on(Method::Get, "/channels/301/messages", json!([hello]));
}

/// The bot user.
pub fn bot_user() -> User {
    serde_json::from_value(json!({
        "id": BOT_ID,
        "username": "guildmaster",
        "discriminator": "0",
        "bot": true
    }))
    .unwrap_or_default()
}

/// A ready client over the scripted fixture guild, defaulting to it.
pub async fn fixture() -> (DiscordClient, Arc<MockRest>) {
    let rest = Arc::new(MockRest::new());
    script_guild(&rest);
    let client = DiscordClient::new(rest.clone(), Some(GUILD_ID.to_string()));
    client.mark_ready(bot_user()).await;
    (client, rest)
}

/// A call made on a [`RecordingVoiceDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCall {
    /// `(guild, channel)`
    Connect(String, String),
    /// guild
    Disconnect(String),
    /// `(guild, source, volume)`
    Play(String, String, u16),
    /// guild
    Stop(String),
    /// `(guild, volume)`
    Volume(String, u16),
}

#[derive(Debug, Clone)]
enum PlayScript {
    Plays,
    Fails(String),
    Refuses(String),
}

/// Voice driver that records every call and answers `play` from a script.
#[derive(Debug)]
pub struct RecordingVoiceDriver {
    calls: Mutex<Vec<VoiceCall>>,
    script: PlayScript,
}

impl RecordingVoiceDriver {
    fn scripted(script: PlayScript) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script,
        }
    }

    /// Every track starts playing.
    pub fn playing() -> Self {
        Self::scripted(PlayScript::Plays)
    }

    /// Every track is accepted, then fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self::scripted(PlayScript::Fails(message.to_string()))
    }

    /// `play` itself fails with `message`.
    pub fn refusing(message: &str) -> Self {
        Self::scripted(PlayScript::Refuses(message.to_string()))
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<VoiceCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: VoiceCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl VoiceDriver for RecordingVoiceDriver {
    async fn connect(&self, guild_id: &str, channel_id: &str) -> GuildResult<()> {
        self.record(VoiceCall::Connect(guild_id.to_string(), channel_id.to_string()));
        Ok(())
    }

    async fn disconnect(&self, guild_id: &str) -> GuildResult<()> {
        self.record(VoiceCall::Disconnect(guild_id.to_string()));
        Ok(())
    }

    async fn play(
        &self,
        guild_id: &str,
        source: &str,
        volume: u16,
        state: Arc<watch::Sender<PlayerState>>,
    ) -> GuildResult<()> {
        self.record(VoiceCall::Play(
            guild_id.to_string(),
            source.to_string(),
            volume,
        ));
        match &self.script {
            PlayScript::Plays => {
                state.send_replace(PlayerState::Playing);
            }
            PlayScript::Fails(message) => {
                state.send_replace(PlayerState::Error(message.clone()));
            }
            PlayScript::Refuses(message) => return Err(GuildError::operation(message.clone())),
        }
        Ok(())
    }

    async fn stop(&self, guild_id: &str) -> GuildResult<()> {
        self.record(VoiceCall::Stop(guild_id.to_string()));
        Ok(())
    }

    async fn set_volume(&self, guild_id: &str, volume: u16) -> GuildResult<()> {
        self.record(VoiceCall::Volume(guild_id.to_string(), volume));
        Ok(())
    }
}
