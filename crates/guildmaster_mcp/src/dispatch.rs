//! Action dispatch: from a wire name and a parameter bag to exactly one
//! client operation.

use crate::catalog::ActionName;
use guildmaster_discord::{DiscordClient, Outcome, Validate};
use guildmaster_error::{GuildError, GuildResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Decode a parameter bag into an action's record and run its checks.
///
/// A missing bag (`null`) is treated as an empty object so actions without
/// required parameters can be called bare.
pub fn parse<T: DeserializeOwned + Validate>(params: Value) -> GuildResult<T> {
    let params = match params {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    let record: T = serde_json::from_value(params)
        .map_err(|e| GuildError::validation(format!("Validation failed: {}", e)))?;
    record.validate()?;
    Ok(record)
}

/// Resolve a wire name, failing with `Unknown operation: <name>`.
pub fn resolve(name: &str) -> GuildResult<ActionName> {
    ActionName::from_str(name)
        .map_err(|_| GuildError::validation(format!("Unknown operation: {}", name)))
}

/// Routes actions to the [`DiscordClient`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Arc<DiscordClient>,
}

impl Dispatcher {
    /// Dispatcher over `client`.
    pub fn new(client: Arc<DiscordClient>) -> Self {
        Self { client }
    }

    /// The wrapped client.
    pub fn client(&self) -> &Arc<DiscordClient> {
        &self.client
    }

    /// Dispatch by wire name.
    pub async fn dispatch_named(&self, name: &str, params: Value) -> GuildResult<Outcome> {
        let action = resolve(name)?;
        self.dispatch(action, params).await
    }

    /// Decode `params` for `action` and run it.
    #[instrument(skip(self, params), fields(action = %action))]
    pub async fn dispatch(&self, action: ActionName, params: Value) -> GuildResult<Outcome> {
        debug!("Dispatching");
        let client = &self.client;
        macro_rules! call {
            ($method:ident) => {
                client.$method(&parse(params)?).await
            };
        }

        match action {
            ActionName::GetServerInfo => call!(get_server_info),
            ActionName::EditServer => call!(edit_server),
            ActionName::GetServerStats => call!(get_server_stats),
            ActionName::GetServerWidget => call!(get_server_widget),
            ActionName::GetWelcomeScreen => call!(get_welcome_screen),
            ActionName::EditWelcomeScreen => call!(edit_welcome_screen),
            ActionName::SendMessage => call!(send_message),
            ActionName::EditMessage => call!(edit_message),
            ActionName::DeleteMessage => call!(delete_message),
            ActionName::ReadMessages => call!(read_messages),
            ActionName::AddReaction => call!(add_reaction),
            ActionName::RemoveReaction => call!(remove_reaction),
            ActionName::PinMessage => call!(pin_message),
            ActionName::UnpinMessage => call!(unpin_message),
            ActionName::GetPinnedMessages => call!(get_pinned_messages),
            ActionName::BulkDeleteMessages => call!(bulk_delete_messages),
            ActionName::CrosspostMessage => call!(crosspost_message),
            ActionName::GetMessageHistory => call!(get_message_history),
            ActionName::ExportChatLog => call!(export_chat_log),
            ActionName::GetUserIdByName => call!(get_user_id_by_name),
            ActionName::SendPrivateMessage => call!(send_private_message),
            ActionName::EditPrivateMessage => call!(edit_private_message),
            ActionName::DeletePrivateMessage => call!(delete_private_message),
            ActionName::ReadPrivateMessages => call!(read_private_messages),
            ActionName::CreateTextChannel => call!(create_text_channel),
            ActionName::CreateVoiceChannel => call!(create_voice_channel),
            ActionName::CreateForumChannel => call!(create_forum_channel),
            ActionName::CreateAnnouncementChannel => call!(create_announcement_channel),
            ActionName::CreateStageChannel => call!(create_stage_channel),
            ActionName::EditChannelAdvanced => call!(edit_channel_advanced),
            ActionName::DeleteChannel => call!(delete_channel),
            ActionName::FindChannel => call!(find_channel),
            ActionName::ListChannels => call!(list_channels),
            ActionName::CreateCategory => call!(create_category),
            ActionName::DeleteCategory => call!(delete_category),
            ActionName::FindCategory => call!(find_category),
            ActionName::ListChannelsInCategory => call!(list_channels_in_category),
            ActionName::ComprehensiveChannelManagement => call!(comprehensive_channel_management),
            ActionName::SetChannelPrivate => call!(set_channel_private),
            ActionName::SetCategoryPrivate => call!(set_category_private),
            ActionName::BulkSetPrivacy => call!(bulk_set_privacy),
            ActionName::SetChannelPosition => call!(set_channel_position),
            ActionName::SetChannelPositions => call!(set_channel_positions),
            ActionName::MoveChannelToCategory => call!(move_channel_to_category),
            ActionName::SetCategoryPosition => call!(set_category_position),
            ActionName::OrganizeChannels => call!(organize_channels),
            ActionName::GetChannelStructure => call!(get_channel_structure),
            ActionName::SetChannelPermissions => call!(set_channel_permissions),
            ActionName::GetChannelPermissions => call!(get_channel_permissions),
            ActionName::SyncChannelPermissions => call!(sync_channel_permissions),
            ActionName::CreateThread => call!(create_thread),
            ActionName::ArchiveThread => call!(archive_thread),
            ActionName::UnarchiveThread => call!(unarchive_thread),
            ActionName::LockThread => call!(lock_thread),
            ActionName::UnlockThread => call!(unlock_thread),
            ActionName::JoinThread => call!(join_thread),
            ActionName::LeaveThread => call!(leave_thread),
            ActionName::GetActiveThreads => call!(get_active_threads),
            ActionName::CreateWebhook => call!(create_webhook),
            ActionName::DeleteWebhook => call!(delete_webhook),
            ActionName::ListWebhooks => call!(list_webhooks),
            ActionName::SendWebhookMessage => call!(send_webhook_message),
            ActionName::JoinVoiceChannel => call!(join_voice_channel),
            ActionName::LeaveVoiceChannel => call!(leave_voice_channel),
            ActionName::PlayAudio => call!(play_audio),
            ActionName::StopAudio => call!(stop_audio),
            ActionName::SetVolume => call!(set_volume),
            ActionName::GetVoiceConnections => call!(get_voice_connections),
            ActionName::CreateRole => call!(create_role),
            ActionName::DeleteRole => call!(delete_role),
            ActionName::EditRole => call!(edit_role),
            ActionName::AddRoleToMember => call!(add_role_to_member),
            ActionName::RemoveRoleFromMember => call!(remove_role_from_member),
            ActionName::GetRoles => call!(get_roles),
            ActionName::SetRolePositions => call!(set_role_positions),
            ActionName::GetMembers => call!(get_members),
            ActionName::SearchMembers => call!(search_members),
            ActionName::EditMember => call!(edit_member),
            ActionName::GetMemberInfo => call!(get_member_info),
            ActionName::BanMember => call!(ban_member),
            ActionName::UnbanMember => call!(unban_member),
            ActionName::KickMember => call!(kick_member),
            ActionName::TimeoutMember => call!(timeout_member),
            ActionName::RemoveTimeout => call!(remove_timeout),
            ActionName::GetAuditLogs => call!(get_audit_logs),
            ActionName::GetBans => call!(get_bans),
            ActionName::CreateEvent => call!(create_event),
            ActionName::EditEvent => call!(edit_event),
            ActionName::DeleteEvent => call!(delete_event),
            ActionName::GetEvents => call!(get_events),
            ActionName::CreateInvite => call!(create_invite),
            ActionName::DeleteInvite => call!(delete_invite),
            ActionName::GetInvites => call!(get_invites),
            ActionName::CreateEmoji => call!(create_emoji),
            ActionName::DeleteEmoji => call!(delete_emoji),
            ActionName::GetEmojis => call!(get_emojis),
            ActionName::CreateSticker => call!(create_sticker),
            ActionName::DeleteSticker => call!(delete_sticker),
            ActionName::GetStickers => call!(get_stickers),
            ActionName::UploadFile => call!(upload_file),
            ActionName::GetMessageAttachments => call!(get_message_attachments),
            ActionName::ReadImages => call!(read_images),
            ActionName::CreateAutomodRule => call!(create_automod_rule),
            ActionName::EditAutomodRule => call!(edit_automod_rule),
            ActionName::DeleteAutomodRule => call!(delete_automod_rule),
            ActionName::GetAutomodRules => call!(get_automod_rules),
            ActionName::SendModal => call!(send_modal),
            ActionName::SendEmbed => call!(send_embed),
            ActionName::SendButton => call!(send_button),
            ActionName::SendSelectMenu => call!(send_select_menu),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildmaster_discord::ops::channels::CreateVoiceChannel;
    use guildmaster_discord::ops::messages::SendMessage;
    use serde_json::json;

    #[test]
    fn test_parse_reports_missing_field() {
        let err = parse::<SendMessage>(json!({"channelId": "301"})).unwrap_err();
        let text = err.kind().to_string();
        assert!(text.starts_with("Validation failed: "), "{}", text);
        assert!(text.contains("message"), "{}", text);
    }

    #[test]
    fn test_parse_runs_record_checks() {
        let err = parse::<CreateVoiceChannel>(json!({"name": "general", "userLimit": 150}))
            .unwrap_err();
        assert!(err.kind().to_string().contains("0"), "{}", err.kind());
        assert!(err.kind().to_string().contains("99"), "{}", err.kind());
    }

    #[test]
    fn test_resolve_unknown_name() {
        let err = resolve("make_coffee").unwrap_err();
        assert_eq!(err.kind().to_string(), "Unknown operation: make_coffee");
        assert_eq!(resolve("get_roles").ok(), Some(ActionName::GetRoles));
    }
}
