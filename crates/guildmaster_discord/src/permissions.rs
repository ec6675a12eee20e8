//! Permission flag names and guild permission computation.

use crate::models::{Guild, Member};

/// Permission names, in flag order, with their bits.
pub const PERMISSIONS: &[(&str, u64)] = &[
    ("CreateInstantInvite", 1 << 0),
    ("KickMembers", 1 << 1),
    ("BanMembers", 1 << 2),
    ("Administrator", 1 << 3),
    ("ManageChannels", 1 << 4),
    ("ManageGuild", 1 << 5),
    ("AddReactions", 1 << 6),
    ("ViewAuditLog", 1 << 7),
    ("PrioritySpeaker", 1 << 8),
    ("Stream", 1 << 9),
    ("ViewChannel", 1 << 10),
    ("SendMessages", 1 << 11),
    ("SendTTSMessages", 1 << 12),
    ("ManageMessages", 1 << 13),
    ("EmbedLinks", 1 << 14),
    ("AttachFiles", 1 << 15),
    ("ReadMessageHistory", 1 << 16),
    ("MentionEveryone", 1 << 17),
    ("UseExternalEmojis", 1 << 18),
    ("ViewGuildInsights", 1 << 19),
    ("Connect", 1 << 20),
    ("Speak", 1 << 21),
    ("MuteMembers", 1 << 22),
    ("DeafenMembers", 1 << 23),
    ("MoveMembers", 1 << 24),
    ("UseVAD", 1 << 25),
    ("ChangeNickname", 1 << 26),
    ("ManageNicknames", 1 << 27),
    ("ManageRoles", 1 << 28),
    ("ManageWebhooks", 1 << 29),
    ("ManageGuildExpressions", 1 << 30),
    ("UseApplicationCommands", 1 << 31),
    ("RequestToSpeak", 1 << 32),
    ("ManageEvents", 1 << 33),
    ("ManageThreads", 1 << 34),
    ("CreatePublicThreads", 1 << 35),
    ("CreatePrivateThreads", 1 << 36),
    ("UseExternalStickers", 1 << 37),
    ("SendMessagesInThreads", 1 << 38),
    ("UseEmbeddedActivities", 1 << 39),
    ("ModerateMembers", 1 << 40),
    ("ViewCreatorMonetizationAnalytics", 1 << 41),
    ("UseSoundboard", 1 << 42),
    ("CreateGuildExpressions", 1 << 43),
    ("CreateEvents", 1 << 44),
    ("UseExternalSounds", 1 << 45),
    ("SendVoiceMessages", 1 << 46),
    ("SendPolls", 1 << 49),
    ("UseExternalApps", 1 << 50),
];

/// Bit for a permission name.
pub fn bit(name: &str) -> Option<u64> {
    PERMISSIONS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, bit)| *bit)
}

/// Every known permission.
pub fn all() -> u64 {
    PERMISSIONS.iter().fold(0, |acc, (_, bit)| acc | bit)
}

/// Combine names into a bit set, skipping unknown names.
pub fn bits_lenient<S: AsRef<str>>(names: &[S]) -> u64 {
    names
        .iter()
        .filter_map(|name| bit(name.as_ref()))
        .fold(0, |acc, bit| acc | bit)
}

/// Combine names into a bit set, or return the names that are unknown.
pub fn bits_strict<S: AsRef<str>>(names: &[S]) -> Result<u64, Vec<String>> {
    let mut bits = 0;
    let mut unknown = Vec::new();
    for name in names {
        match bit(name.as_ref()) {
            Some(b) => bits |= b,
            None => unknown.push(name.as_ref().to_string()),
        }
    }
    if unknown.is_empty() {
        Ok(bits)
    } else {
        Err(unknown)
    }
}

/// Names of the bits set in `bits`, in flag order.
pub fn names(bits: u64) -> Vec<&'static str> {
    PERMISSIONS
        .iter()
        .filter(|(_, bit)| bits & bit != 0)
        .map(|(name, _)| *name)
        .collect()
}

/// A member's guild-level permissions: the union of `@everyone` and their
/// roles. The owner and administrators hold everything.
pub fn member_permissions(guild: &Guild, member: &Member) -> u64 {
    if member.user_id() == guild.owner_id() {
        return all();
    }
    let mut bits = guild.everyone_role().map_or(0, |role| role.permission_bits());
    for role_id in member.roles() {
        if let Some(role) = guild.role(role_id) {
            bits |= role.permission_bits();
        }
    }
    if bits & bit_of::ADMINISTRATOR != 0 {
        return all();
    }
    bits
}

/// Frequently checked bits.
pub mod bit_of {
    /// KickMembers
    pub const KICK_MEMBERS: u64 = 1 << 1;
    /// BanMembers
    pub const BAN_MEMBERS: u64 = 1 << 2;
    /// Administrator
    pub const ADMINISTRATOR: u64 = 1 << 3;
    /// ManageChannels
    pub const MANAGE_CHANNELS: u64 = 1 << 4;
    /// ManageGuild
    pub const MANAGE_GUILD: u64 = 1 << 5;
    /// ViewAuditLog
    pub const VIEW_AUDIT_LOG: u64 = 1 << 7;
    /// ViewChannel
    pub const VIEW_CHANNEL: u64 = 1 << 10;
    /// ManageMessages
    pub const MANAGE_MESSAGES: u64 = 1 << 13;
    /// Connect
    pub const CONNECT: u64 = 1 << 20;
    /// ManageNicknames
    pub const MANAGE_NICKNAMES: u64 = 1 << 27;
    /// ManageRoles
    pub const MANAGE_ROLES: u64 = 1 << 28;
    /// ManageWebhooks
    pub const MANAGE_WEBHOOKS: u64 = 1 << 29;
    /// ManageGuildExpressions
    pub const MANAGE_GUILD_EXPRESSIONS: u64 = 1 << 30;
    /// ManageEvents
    pub const MANAGE_EVENTS: u64 = 1 << 33;
    /// ManageThreads
    pub const MANAGE_THREADS: u64 = 1 << 34;
    /// ModerateMembers
    pub const MODERATE_MEMBERS: u64 = 1 << 40;
}
