//! The closed set of actions the server dispatches, and the tool schema
//! advertised for them.

use serde_json::{Value, json};
use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// Every administrative action, by its snake_case wire name.
///
/// ```
/// use guildmaster_mcp::ActionName;
/// use std::str::FromStr;
///
/// let action = ActionName::from_str("send_message").unwrap();
/// assert_eq!(action, ActionName::SendMessage);
/// assert_eq!(action.to_string(), "send_message");
/// assert!(ActionName::from_str("sendMessage").is_err());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    EnumIter,
    EnumCount,
)]
#[strum(serialize_all = "snake_case")]
#[allow(missing_docs)]
pub enum ActionName {
    // Server
    GetServerInfo,
    EditServer,
    GetServerStats,
    GetServerWidget,
    GetWelcomeScreen,
    EditWelcomeScreen,

    // Messages
    SendMessage,
    EditMessage,
    DeleteMessage,
    ReadMessages,
    AddReaction,
    RemoveReaction,
    PinMessage,
    UnpinMessage,
    GetPinnedMessages,
    BulkDeleteMessages,
    CrosspostMessage,
    GetMessageHistory,
    ExportChatLog,

    // Direct messages
    GetUserIdByName,
    SendPrivateMessage,
    EditPrivateMessage,
    DeletePrivateMessage,
    ReadPrivateMessages,

    // Channels and categories
    CreateTextChannel,
    CreateVoiceChannel,
    CreateForumChannel,
    CreateAnnouncementChannel,
    CreateStageChannel,
    EditChannelAdvanced,
    DeleteChannel,
    FindChannel,
    ListChannels,
    CreateCategory,
    DeleteCategory,
    FindCategory,
    ListChannelsInCategory,
    ComprehensiveChannelManagement,

    // Channel privacy
    SetChannelPrivate,
    SetCategoryPrivate,
    BulkSetPrivacy,

    // Layout
    SetChannelPosition,
    SetChannelPositions,
    MoveChannelToCategory,
    SetCategoryPosition,
    OrganizeChannels,
    GetChannelStructure,

    // Permission overwrites
    SetChannelPermissions,
    GetChannelPermissions,
    SyncChannelPermissions,

    // Threads
    CreateThread,
    ArchiveThread,
    UnarchiveThread,
    LockThread,
    UnlockThread,
    JoinThread,
    LeaveThread,
    GetActiveThreads,

    // Webhooks
    CreateWebhook,
    DeleteWebhook,
    ListWebhooks,
    SendWebhookMessage,

    // Voice
    JoinVoiceChannel,
    LeaveVoiceChannel,
    PlayAudio,
    StopAudio,
    SetVolume,
    GetVoiceConnections,

    // Roles
    CreateRole,
    DeleteRole,
    EditRole,
    AddRoleToMember,
    RemoveRoleFromMember,
    GetRoles,
    SetRolePositions,

    // Members
    GetMembers,
    SearchMembers,
    EditMember,
    GetMemberInfo,

    // Moderation
    BanMember,
    UnbanMember,
    KickMember,
    TimeoutMember,
    RemoveTimeout,
    GetAuditLogs,
    GetBans,

    // Scheduled events
    CreateEvent,
    EditEvent,
    DeleteEvent,
    GetEvents,

    // Invites
    CreateInvite,
    DeleteInvite,
    GetInvites,

    // Emojis and stickers
    CreateEmoji,
    DeleteEmoji,
    GetEmojis,
    CreateSticker,
    DeleteSticker,
    GetStickers,

    // Files
    UploadFile,
    GetMessageAttachments,
    ReadImages,

    // Automod
    CreateAutomodRule,
    EditAutomodRule,
    DeleteAutomodRule,
    GetAutomodRules,

    // Interactive components
    SendModal,
    SendEmbed,
    SendButton,
    SendSelectMenu,
}

/// Grouping used to lay out the catalog in the tool description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, EnumIter)]
pub enum Area {
    /// Server
    #[strum(serialize = "Server")]
    Server,
    /// Messages
    #[strum(serialize = "Messages")]
    Messages,
    /// Direct messages
    #[strum(serialize = "Direct messages")]
    DirectMessages,
    /// Channels and categories
    #[strum(serialize = "Channels and categories")]
    Channels,
    /// Channel privacy
    #[strum(serialize = "Channel privacy")]
    Privacy,
    /// Layout
    #[strum(serialize = "Layout")]
    Layout,
    /// Permission overwrites
    #[strum(serialize = "Permission overwrites")]
    Permissions,
    /// Threads
    #[strum(serialize = "Threads")]
    Threads,
    /// Webhooks
    #[strum(serialize = "Webhooks")]
    Webhooks,
    /// Voice
    #[strum(serialize = "Voice")]
    Voice,
    /// Roles
    #[strum(serialize = "Roles")]
    Roles,
    /// Members
    #[strum(serialize = "Members")]
    Members,
    /// Moderation
    #[strum(serialize = "Moderation")]
    Moderation,
    /// Scheduled events
    #[strum(serialize = "Scheduled events")]
    Events,
    /// Invites
    #[strum(serialize = "Invites")]
    Invites,
    /// Emojis and stickers
    #[strum(serialize = "Emojis and stickers")]
    Expressions,
    /// Files
    #[strum(serialize = "Files")]
    Files,
    /// Automod
    #[strum(serialize = "Automod")]
    Automod,
    /// Interactive components
    #[strum(serialize = "Interactive components")]
    Components,
}

impl ActionName {
    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// The area this action belongs to.
    pub fn area(&self) -> Area {
        match self {
            ActionName::GetServerInfo
            | ActionName::EditServer
            | ActionName::GetServerStats
            | ActionName::GetServerWidget
            | ActionName::GetWelcomeScreen
            | ActionName::EditWelcomeScreen => Area::Server,
            ActionName::SendMessage
            | ActionName::EditMessage
            | ActionName::DeleteMessage
            | ActionName::ReadMessages
            | ActionName::AddReaction
            | ActionName::RemoveReaction
            | ActionName::PinMessage
            | ActionName::UnpinMessage
            | ActionName::GetPinnedMessages
            | ActionName::BulkDeleteMessages
            | ActionName::CrosspostMessage
            | ActionName::GetMessageHistory
            | ActionName::ExportChatLog => Area::Messages,
            ActionName::GetUserIdByName
            | ActionName::SendPrivateMessage
            | ActionName::EditPrivateMessage
            | ActionName::DeletePrivateMessage
            | ActionName::ReadPrivateMessages => Area::DirectMessages,
            ActionName::CreateTextChannel
            | ActionName::CreateVoiceChannel
            | ActionName::CreateForumChannel
            | ActionName::CreateAnnouncementChannel
            | ActionName::CreateStageChannel
            | ActionName::EditChannelAdvanced
            | ActionName::DeleteChannel
            | ActionName::FindChannel
            | ActionName::ListChannels
            | ActionName::CreateCategory
            | ActionName::DeleteCategory
            | ActionName::FindCategory
            | ActionName::ListChannelsInCategory
            | ActionName::ComprehensiveChannelManagement => Area::Channels,
            ActionName::SetChannelPrivate
            | ActionName::SetCategoryPrivate
            | ActionName::BulkSetPrivacy => Area::Privacy,
            ActionName::SetChannelPosition
            | ActionName::SetChannelPositions
            | ActionName::MoveChannelToCategory
            | ActionName::SetCategoryPosition
            | ActionName::OrganizeChannels
            | ActionName::GetChannelStructure => Area::Layout,
            ActionName::SetChannelPermissions
            | ActionName::GetChannelPermissions
            | ActionName::SyncChannelPermissions => Area::Permissions,
            ActionName::CreateThread
            | ActionName::ArchiveThread
            | ActionName::UnarchiveThread
            | ActionName::LockThread
            | ActionName::UnlockThread
            | ActionName::JoinThread
            | ActionName::LeaveThread
            | ActionName::GetActiveThreads => Area::Threads,
            ActionName::CreateWebhook
            | ActionName::DeleteWebhook
            | ActionName::ListWebhooks
            | ActionName::SendWebhookMessage => Area::Webhooks,
            ActionName::JoinVoiceChannel
            | ActionName::LeaveVoiceChannel
            | ActionName::PlayAudio
            | ActionName::StopAudio
            | ActionName::SetVolume
            | ActionName::GetVoiceConnections => Area::Voice,
            ActionName::CreateRole
            | ActionName::DeleteRole
            | ActionName::EditRole
            | ActionName::AddRoleToMember
            | ActionName::RemoveRoleFromMember
            | ActionName::GetRoles
            | ActionName::SetRolePositions => Area::Roles,
            ActionName::GetMembers
            | ActionName::SearchMembers
            | ActionName::EditMember
            | ActionName::GetMemberInfo => Area::Members,
            ActionName::BanMember
            | ActionName::UnbanMember
            | ActionName::KickMember
            | ActionName::TimeoutMember
            | ActionName::RemoveTimeout
            | ActionName::GetAuditLogs
            | ActionName::GetBans => Area::Moderation,
            ActionName::CreateEvent
            | ActionName::EditEvent
            | ActionName::DeleteEvent
            | ActionName::GetEvents => Area::Events,
            ActionName::CreateInvite
            | ActionName::DeleteInvite
            | ActionName::GetInvites => Area::Invites,
            ActionName::CreateEmoji
            | ActionName::DeleteEmoji
            | ActionName::GetEmojis
            | ActionName::CreateSticker
            | ActionName::DeleteSticker
            | ActionName::GetStickers => Area::Expressions,
            ActionName::UploadFile
            | ActionName::GetMessageAttachments
            | ActionName::ReadImages => Area::Files,
            ActionName::CreateAutomodRule
            | ActionName::EditAutomodRule
            | ActionName::DeleteAutomodRule
            | ActionName::GetAutomodRules => Area::Automod,
            ActionName::SendModal
            | ActionName::SendEmbed
            | ActionName::SendButton
            | ActionName::SendSelectMenu => Area::Components,
        }
    }
}

/// Name of the single tool the server exposes.
pub const TOOL_NAME: &str = "discord_manage";

/// Markdown listing of every action grouped by area.
pub fn catalog_text() -> String {
    let mut text = format!(
        "Manage a Discord server. Pass `action` plus that action's parameters \
         (camelCase) as a flat object. {} actions:\n",
        ActionName::COUNT
    );
    for area in Area::iter() {
        let names: Vec<&str> = ActionName::iter()
            .filter(|action| action.area() == area)
            .map(|action| action.as_str())
            .collect();
        text.push_str(&format!("\n**{}**: {}", area, names.join(", ")));
    }
    text
}

/// JSON Schema of the `discord_manage` input.
///
/// Only `action` is declared; the remaining properties are checked by the
/// action's own parameter record.
pub fn input_schema() -> Value {
    let actions: Vec<&str> = ActionName::iter().map(|action| action.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": actions,
                "description": "The action to perform"
            }
        },
        "required": ["action"],
        "additionalProperties": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn test_wire_names_round_trip() {
        for action in ActionName::iter() {
            assert_eq!(ActionName::from_str(action.as_str()).ok(), Some(action));
        }
    }

    #[test]
    fn test_wire_names_are_unique() {
        let names: HashSet<&str> = ActionName::iter().map(|a| a.as_str()).collect();
        assert_eq!(names.len(), ActionName::COUNT);
        assert_eq!(ActionName::COUNT, 110);
    }

    #[test]
    fn test_recovered_actions_use_snake_case() {
        assert_eq!(ActionName::GetUserIdByName.as_str(), "get_user_id_by_name");
        assert_eq!(
            ActionName::ComprehensiveChannelManagement.as_str(),
            "comprehensive_channel_management"
        );
        assert_eq!(ActionName::SyncChannelPermissions.area(), Area::Permissions);
    }

    #[test]
    fn test_every_area_has_actions() {
        for area in Area::iter() {
            assert!(ActionName::iter().any(|a| a.area() == area), "{} is empty", area);
        }
    }

    #[test]
    fn test_schema_lists_every_action() {
        let schema = input_schema();
        let listed = schema["properties"]["action"]["enum"].as_array().map(Vec::len);
        assert_eq!(listed, Some(ActionName::COUNT));
        assert_eq!(schema["required"], json!(["action"]));
        assert!(catalog_text().contains("**Emojis and stickers**: create_emoji"));
    }
}
