//! Discord API objects, deserialized from REST responses.
//!
//! Only the fields operations read are modelled. Everything is
//! `#[serde(default)]` so partial objects (and test fixtures) deserialize.

use crate::format::snowflake_timestamp;
use serde::{Deserialize, Serialize};

/// Channel type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ChannelKind {
    /// 0
    GuildText,
    /// 1
    #[strum(to_string = "DM")]
    Dm,
    /// 2
    GuildVoice,
    /// 3
    #[strum(to_string = "GroupDM")]
    GroupDm,
    /// 4
    GuildCategory,
    /// 5
    GuildAnnouncement,
    /// 10
    AnnouncementThread,
    /// 11
    PublicThread,
    /// 12
    PrivateThread,
    /// 13
    GuildStageVoice,
    /// 14
    GuildDirectory,
    /// 15
    GuildForum,
    /// 16
    GuildMedia,
    /// Any code this crate does not know
    #[strum(to_string = "Unknown")]
    Unknown(u8),
}

impl ChannelKind {
    /// Map a wire code to a kind.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildAnnouncement,
            10 => Self::AnnouncementThread,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            13 => Self::GuildStageVoice,
            14 => Self::GuildDirectory,
            15 => Self::GuildForum,
            16 => Self::GuildMedia,
            other => Self::Unknown(other),
        }
    }

    /// The wire code.
    pub fn code(self) -> u8 {
        match self {
            Self::GuildText => 0,
            Self::Dm => 1,
            Self::GuildVoice => 2,
            Self::GroupDm => 3,
            Self::GuildCategory => 4,
            Self::GuildAnnouncement => 5,
            Self::AnnouncementThread => 10,
            Self::PublicThread => 11,
            Self::PrivateThread => 12,
            Self::GuildStageVoice => 13,
            Self::GuildDirectory => 14,
            Self::GuildForum => 15,
            Self::GuildMedia => 16,
            Self::Unknown(code) => code,
        }
    }

    /// Voice or stage.
    pub fn is_voice_based(self) -> bool {
        matches!(self, Self::GuildVoice | Self::GuildStageVoice)
    }

    /// Any of the three thread kinds.
    pub fn is_thread(self) -> bool {
        matches!(
            self,
            Self::AnnouncementThread | Self::PublicThread | Self::PrivateThread
        )
    }

    /// Whether the kind may sit under a category.
    pub fn accepts_parent(self) -> bool {
        !self.is_thread() && self != Self::GuildCategory
    }

    /// Icon used when listing channels.
    pub fn emoji(self) -> &'static str {
        match self {
            Self::GuildText => "💬",
            Self::GuildVoice => "🔊",
            Self::GuildAnnouncement => "📢",
            Self::GuildStageVoice => "🎭",
            Self::GuildForum => "💭",
            _ => "📄",
        }
    }
}

/// A Discord user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct User {
    id: String,
    username: String,
    discriminator: String,
    global_name: Option<String>,
    avatar: Option<String>,
    bot: bool,
}

impl User {
    /// `name#1234` for legacy accounts, the bare username otherwise.
    pub fn tag(&self) -> String {
        if self.discriminator.is_empty() || self.discriminator == "0" {
            self.username.clone()
        } else {
            format!("{}#{}", self.username, self.discriminator)
        }
    }

    /// CDN URL of the user's avatar.
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_ref()
            .map(|hash| format!("https://cdn.discordapp.com/avatars/{}/{}.png", self.id, hash))
    }

    /// Account creation time, in milliseconds since the epoch.
    pub fn created_at_ms(&self) -> Option<i64> {
        snowflake_timestamp(&self.id)
    }
}

/// A user's membership in a guild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Member {
    user: Option<User>,
    nick: Option<String>,
    roles: Vec<String>,
    joined_at: Option<String>,
    communication_disabled_until: Option<String>,
}

impl Member {
    /// The member's user id, empty when the user object is absent.
    pub fn user_id(&self) -> &str {
        self.user.as_ref().map_or("", |user| user.id.as_str())
    }

    /// The member's username.
    pub fn username(&self) -> &str {
        self.user.as_ref().map_or("", |user| user.username.as_str())
    }

    /// The member's tag.
    pub fn tag(&self) -> String {
        self.user.as_ref().map(User::tag).unwrap_or_default()
    }

    /// Nickname, else global display name, else username.
    pub fn display_name(&self) -> String {
        if let Some(nick) = &self.nick {
            return nick.clone();
        }
        match &self.user {
            Some(user) => user
                .global_name
                .clone()
                .unwrap_or_else(|| user.username.clone()),
            None => String::new(),
        }
    }
}

/// A guild role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Role {
    id: String,
    name: String,
    color: u32,
    position: i64,
    permissions: String,
    managed: bool,
    hoist: bool,
    mentionable: bool,
}

impl Role {
    /// The role's permission bit set.
    pub fn permission_bits(&self) -> u64 {
        self.permissions.parse().unwrap_or(0)
    }
}

/// A permission overwrite on a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Overwrite {
    id: String,
    /// 0 for a role, 1 for a member
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

impl Overwrite {
    /// Overwrite type for roles.
    pub const ROLE: u8 = 0;
    /// Overwrite type for members.
    pub const MEMBER: u8 = 1;

    /// Build an overwrite from bit sets.
    pub fn new(id: impl Into<String>, kind: u8, allow: u64, deny: u64) -> Self {
        Self {
            id: id.into(),
            kind,
            allow: allow.to_string(),
            deny: deny.to_string(),
        }
    }

    /// Allowed bits.
    pub fn allow_bits(&self) -> u64 {
        self.allow.parse().unwrap_or(0)
    }

    /// Denied bits.
    pub fn deny_bits(&self) -> u64 {
        self.deny.parse().unwrap_or(0)
    }
}

/// Thread-only channel state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct ThreadMetadata {
    archived: bool,
    locked: bool,
    auto_archive_duration: u32,
}

/// A guild channel, category, or thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Channel {
    id: String,
    #[serde(rename = "type")]
    #[getter(skip)]
    kind: u8,
    guild_id: Option<String>,
    name: String,
    parent_id: Option<String>,
    position: i64,
    topic: Option<String>,
    rate_limit_per_user: Option<u32>,
    user_limit: Option<u32>,
    bitrate: Option<u32>,
    permission_overwrites: Vec<Overwrite>,
    thread_metadata: Option<ThreadMetadata>,
    member_count: Option<u32>,
    message_count: Option<u32>,
}

impl Channel {
    /// The channel's kind.
    pub fn kind(&self) -> ChannelKind {
        ChannelKind::from_code(self.kind)
    }

    /// Whether this channel is a category.
    pub fn is_category(&self) -> bool {
        self.kind() == ChannelKind::GuildCategory
    }
}

/// Guild object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Guild {
    id: String,
    name: String,
    owner_id: String,
    description: Option<String>,
    icon: Option<String>,
    banner: Option<String>,
    verification_level: u8,
    premium_tier: u8,
    premium_subscription_count: Option<u32>,
    approximate_member_count: Option<u64>,
    max_members: Option<u64>,
    features: Vec<String>,
    roles: Vec<Role>,
    emojis: Vec<Emoji>,
}

impl Guild {
    /// Find a role by id.
    pub fn role(&self, id: &str) -> Option<&Role> {
        self.roles.iter().find(|role| role.id == id)
    }

    /// The `@everyone` role, which shares the guild's id.
    pub fn everyone_role(&self) -> Option<&Role> {
        self.role(&self.id)
    }
}

/// A message attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Attachment {
    id: String,
    filename: String,
    url: String,
    size: u64,
    content_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

impl Attachment {
    /// Whether the attachment is an image, by content type or extension.
    pub fn is_image(&self) -> bool {
        if let Some(content_type) = &self.content_type {
            return content_type.starts_with("image/");
        }
        let name = self.filename.to_ascii_lowercase();
        [".png", ".jpg", ".jpeg", ".gif", ".webp", ".bmp"]
            .iter()
            .any(|ext| name.ends_with(ext))
    }

    /// Discord marks spoilers by file name prefix.
    pub fn is_spoiler(&self) -> bool {
        self.filename.starts_with("SPOILER_")
    }
}

/// Emoji as it appears on a reaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct PartialEmoji {
    id: Option<String>,
    name: Option<String>,
}

impl PartialEmoji {
    /// Unicode emoji, or `name:id` for custom ones.
    pub fn label(&self) -> String {
        match (&self.id, &self.name) {
            (Some(id), Some(name)) => format!("{}:{}", name, id),
            (None, Some(name)) => name.clone(),
            (Some(id), None) => id.clone(),
            (None, None) => String::new(),
        }
    }
}

/// A reaction tally on a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Reaction {
    count: u32,
    emoji: PartialEmoji,
}

/// A channel message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Message {
    id: String,
    channel_id: String,
    guild_id: Option<String>,
    content: String,
    timestamp: String,
    author: User,
    attachments: Vec<Attachment>,
    reactions: Vec<Reaction>,
    pinned: bool,
    flags: u64,
}

impl Message {
    /// Flag set once a message has been published to following channels.
    pub const CROSSPOSTED: u64 = 1 << 0;

    /// Whether the message was already published.
    pub fn is_crossposted(&self) -> bool {
        self.flags & Self::CROSSPOSTED != 0
    }
}

/// A webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Webhook {
    id: String,
    name: Option<String>,
    token: Option<String>,
    channel_id: Option<String>,
}

impl Webhook {
    /// Execution URL, available when the token is known.
    pub fn webhook_url(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|token| format!("https://discord.com/api/webhooks/{}/{}", self.id, token))
    }
}

/// Channel summary embedded in invites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct PartialChannel {
    id: String,
    name: Option<String>,
}

/// An invite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Invite {
    code: String,
    channel: Option<PartialChannel>,
    inviter: Option<User>,
    uses: u32,
    max_uses: u32,
    max_age: u32,
    temporary: bool,
    expires_at: Option<String>,
}

impl Invite {
    /// Public invite link.
    pub fn url(&self) -> String {
        format!("https://discord.gg/{}", self.code)
    }
}

/// A custom guild emoji.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Emoji {
    id: Option<String>,
    name: String,
    animated: bool,
    roles: Vec<String>,
    user: Option<User>,
}

impl Emoji {
    /// Chat syntax for using the emoji.
    pub fn usage(&self) -> String {
        let id = self.id.as_deref().unwrap_or_default();
        if self.animated {
            format!("<a:{}:{}>", self.name, id)
        } else {
            format!("<:{}:{}>", self.name, id)
        }
    }
}

/// A custom guild sticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Sticker {
    id: String,
    name: String,
    description: Option<String>,
    tags: String,
    format_type: u8,
    user: Option<User>,
}

impl Sticker {
    /// Format name for the format code.
    pub fn format_name(&self) -> &'static str {
        match self.format_type {
            1 => "PNG",
            2 => "APNG",
            3 => "LOTTIE",
            4 => "GIF",
            _ => "Unknown",
        }
    }
}

/// Location data of an external event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct EntityMetadata {
    location: Option<String>,
}

/// A guild scheduled event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct ScheduledEvent {
    id: String,
    name: String,
    description: Option<String>,
    scheduled_start_time: String,
    scheduled_end_time: Option<String>,
    status: u8,
    entity_type: u8,
    channel_id: Option<String>,
    entity_metadata: Option<EntityMetadata>,
    user_count: Option<u64>,
}

impl ScheduledEvent {
    /// Entity type for stage events.
    pub const STAGE: u8 = 1;
    /// Entity type for voice events.
    pub const VOICE: u8 = 2;
    /// Entity type for events held elsewhere.
    pub const EXTERNAL: u8 = 3;

    /// External location, when the event has one.
    pub fn location(&self) -> Option<&str> {
        self.entity_metadata
            .as_ref()
            .and_then(|meta| meta.location.as_deref())
    }
}

/// Trigger configuration of an automod rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct TriggerMetadata {
    keyword_filter: Vec<String>,
    presets: Vec<u8>,
    allow_list: Vec<String>,
    mention_total_limit: Option<u32>,
}

/// An automod rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct AutoModRule {
    id: String,
    name: String,
    event_type: u8,
    trigger_type: u8,
    trigger_metadata: TriggerMetadata,
    actions: Vec<serde_json::Value>,
    enabled: bool,
}

/// A ban entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Ban {
    reason: Option<String>,
    user: User,
}

/// One audit log entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct AuditLogEntry {
    id: String,
    user_id: Option<String>,
    target_id: Option<String>,
    action_type: u32,
    reason: Option<String>,
}

/// Audit log page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct AuditLog {
    audit_log_entries: Vec<AuditLogEntry>,
    users: Vec<User>,
}

/// One channel of a welcome screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct WelcomeChannel {
    channel_id: String,
    description: String,
    emoji_id: Option<String>,
    emoji_name: Option<String>,
}

/// A guild welcome screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct WelcomeScreen {
    description: Option<String>,
    welcome_channels: Vec<WelcomeChannel>,
}

/// Channel listed in a guild widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct WidgetChannel {
    id: String,
    name: String,
    position: i64,
}

/// A guild widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct Widget {
    id: String,
    name: String,
    instant_invite: Option<String>,
    presence_count: u64,
    channels: Vec<WidgetChannel>,
}

/// Active threads of a guild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct ActiveThreads {
    threads: Vec<Channel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_kind_from_wire_type() {
        let channel: Channel =
            serde_json::from_value(json!({"id": "1", "type": 13, "name": "stage"})).unwrap();
        assert_eq!(channel.kind(), ChannelKind::GuildStageVoice);
        assert!(channel.kind().is_voice_based());
        assert_eq!(channel.kind().to_string(), "GuildStageVoice");
        assert_eq!(ChannelKind::from_code(99).to_string(), "Unknown");
        assert!(channel.kind().accepts_parent());
        assert!(!ChannelKind::GuildCategory.accepts_parent());
        assert!(!ChannelKind::PublicThread.accepts_parent());
    }

    #[test]
    fn test_user_tag() {
        let legacy: User =
            serde_json::from_value(json!({"id": "1", "username": "ana", "discriminator": "0420"}))
                .unwrap();
        assert_eq!(legacy.tag(), "ana#0420");

        let modern: User =
            serde_json::from_value(json!({"id": "1", "username": "ana", "discriminator": "0"}))
                .unwrap();
        assert_eq!(modern.tag(), "ana");
    }

    #[test]
    fn test_overwrite_serializes_with_type() {
        let overwrite = Overwrite::new("5", Overwrite::ROLE, 1024, 0);
        let value = serde_json::to_value(&overwrite).unwrap();
        assert_eq!(value, json!({"id": "5", "type": 0, "allow": "1024", "deny": "0"}));
    }

    #[test]
    fn test_attachment_image_detection() {
        let attachment: Attachment = serde_json::from_value(
            json!({"id": "1", "filename": "SPOILER_cat.PNG", "url": "u", "size": 10}),
        )
        .unwrap();
        assert!(attachment.is_image());
        assert!(attachment.is_spoiler());
    }
}
