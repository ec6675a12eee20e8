//! Dispatch through the gate and the `discord_manage` tool against the
//! scripted fixture guild.

use guildmaster_discord::rest::{Method, MockRest};
use guildmaster_discord::testing::{
    GUILD_ID, channel_json, fixture, kind, message_json, thread_json, user_json,
};
use guildmaster_error::GuildErrorKind;
use guildmaster_mcp::{
    ActionName, Dispatcher, Gate, McpError, McpTool, ToolRegistry, registry,
};
use guildmaster_rate_limit::RateLimitTable;
use serde_json::{Value, json};
use std::sync::Arc;
use strum::IntoEnumIterator;

async fn tools_with(gate: Gate) -> (ToolRegistry, Arc<MockRest>) {
    let (client, rest) = fixture().await;
    let dispatcher = Dispatcher::new(Arc::new(client));
    (registry(dispatcher, Arc::new(gate)), rest)
}

async fn manage(tools: &ToolRegistry, arguments: Value) -> Result<String, String> {
    tools
        .execute("discord_manage", arguments)
        .await
        .map(|outcome| outcome.into_text())
        .map_err(|e| e.to_string())
}

#[tokio::test]
async fn test_every_action_has_a_handler() {
    let (client, _rest) = fixture().await;
    let dispatcher = Dispatcher::new(Arc::new(client));
    for action in ActionName::iter() {
        if let Err(e) = dispatcher.dispatch_named(action.as_str(), json!({})).await {
            let text = e.kind().to_string();
            assert!(
                !text.starts_with("Unknown operation"),
                "{} is not mapped: {}",
                action,
                text
            );
        }
    }
}

/// One action called with its smallest valid arguments.
struct Case {
    action: &'static str,
    params: Value,
    replies: Vec<(Method, &'static str, Value)>,
    expect: &'static str,
}

fn case(
    action: &'static str,
    params: Value,
    replies: Vec<(Method, &'static str, Value)>,
    expect: &'static str,
) -> Case {
    Case {
        action,
        params,
        replies,
        expect,
    }
}

fn dm_channel() -> Value {
    let mut dm = channel_json("950", 1, "", None);
    dm["guild_id"] = json!(null);
    dm
}

fn sticker() -> Value {
    json!({
        "id": "810",
        "name": "wave",
        "description": "a wave",
        "tags": "wave",
        "format_type": 1,
        "user": user_json("1", "owner")
    })
}

fn automod_rule() -> Value {
    json!({
        "id": "820",
        "name": "No leaks",
        "event_type": 1,
        "trigger_type": 1,
        "trigger_metadata": { "keyword_filter": ["leak"], "allow_list": [] },
        "actions": [{ "type": 1 }],
        "enabled": true
    })
}

fn minimal_cases() -> Vec<Case> {
    let hello = message_json("700", "301", ("500", "alice"), "hello");
    let dm_message = message_json("801", "950", ("900", "guildmaster"), "psst");
    vec![
        case(
            "edit_welcome_screen",
            json!({"enabled": true, "description": "Welcome in"}),
            vec![(Method::Patch, "/guilds/100/welcome-screen", json!({}))],
            "Successfully edited welcome screen for \"Test Guild\"",
        ),
        case(
            "edit_message",
            json!({"channelId": "301", "messageId": "700", "newMessage": "hello again"}),
            vec![(
                Method::Patch,
                "/channels/301/messages/700",
                message_json("700", "301", ("500", "alice"), "hello again"),
            )],
            "Message edited successfully",
        ),
        case(
            "delete_message",
            json!({"channelId": "301", "messageId": "700"}),
            vec![(Method::Delete, "/channels/301/messages/700", Value::Null)],
            "Message deleted successfully",
        ),
        case(
            "add_reaction",
            json!({"channelId": "301", "messageId": "700", "emoji": "👍"}),
            vec![(Method::Put, "/channels/301/messages/700/reactions/👍/@me", Value::Null)],
            "Added reaction successfully",
        ),
        case(
            "remove_reaction",
            json!({"channelId": "301", "messageId": "700", "emoji": "👍"}),
            Vec::new(),
            "Removed reaction successfully",
        ),
        case(
            "pin_message",
            json!({"channelId": "301", "messageId": "700"}),
            vec![(Method::Put, "/channels/301/pins/700", Value::Null)],
            "Successfully pinned message in general",
        ),
        case(
            "get_pinned_messages",
            json!({"channelId": "301"}),
            vec![(Method::Get, "/channels/301/pins", json!([hello]))],
            "**Found 1 pinned messages in general:**",
        ),
        case(
            "get_message_history",
            json!({"channelId": "301"}),
            Vec::new(),
            "**Message History for #general**",
        ),
        case(
            "edit_private_message",
            json!({"userId": "500", "messageId": "801", "newMessage": "psst again"}),
            vec![
                (Method::Post, "/users/@me/channels", dm_channel()),
                (Method::Get, "/channels/950/messages/801", dm_message.clone()),
                (
                    Method::Patch,
                    "/channels/950/messages/801",
                    message_json("801", "950", ("900", "guildmaster"), "psst again"),
                ),
            ],
            "Message edited successfully",
        ),
        case(
            "delete_private_message",
            json!({"userId": "500", "messageId": "801"}),
            vec![
                (Method::Post, "/users/@me/channels", dm_channel()),
                (Method::Get, "/channels/950/messages/801", dm_message.clone()),
                (Method::Delete, "/channels/950/messages/801", Value::Null),
            ],
            "Message deleted successfully",
        ),
        case(
            "read_private_messages",
            json!({"userId": "500"}),
            vec![
                (Method::Post, "/users/@me/channels", dm_channel()),
                (Method::Get, "/channels/950/messages", json!([dm_message])),
            ],
            "**Retrieved 1 messages:**",
        ),
        case(
            "create_announcement_channel",
            json!({"name": "updates"}),
            vec![(
                Method::Post,
                "/guilds/100/channels",
                channel_json("310", kind::ANNOUNCEMENT, "updates", None),
            )],
            "Created announcement channel: updates (ID: 310)",
        ),
        case(
            "create_stage_channel",
            json!({"name": "Podium"}),
            vec![(
                Method::Post,
                "/guilds/100/channels",
                channel_json("311", kind::STAGE, "Podium", None),
            )],
            "Created stage channel: Podium (ID: 311)",
        ),
        case("list_channels", json!({}), Vec::new(), "Retrieved 6 channels"),
        case(
            "delete_category",
            json!({"categoryId": "300"}),
            vec![(Method::Delete, "/channels/300", Value::Null)],
            "Deleted category: General Stuff",
        ),
        case(
            "find_category",
            json!({"categoryName": "general stuff"}),
            Vec::new(),
            "Retrieved category: General Stuff, with ID: 300",
        ),
        case(
            "unarchive_thread",
            json!({"threadId": "600"}),
            vec![
                (Method::Get, "/channels/600", thread_json("600", "301", "ideas", true, false)),
                (Method::Patch, "/channels/600", Value::Null),
            ],
            "Successfully unarchived thread \"ideas\" (ID: 600)",
        ),
        case(
            "unlock_thread",
            json!({"threadId": "600"}),
            vec![
                (Method::Get, "/channels/600", thread_json("600", "301", "ideas", false, true)),
                (Method::Patch, "/channels/600", Value::Null),
            ],
            "Successfully unlocked thread \"ideas\" (ID: 600)",
        ),
        case(
            "leave_thread",
            json!({"threadId": "600"}),
            vec![
                (Method::Get, "/channels/600", thread_json("600", "301", "ideas", false, false)),
                (
                    Method::Get,
                    "/channels/600/thread-members/900",
                    json!({"id": "600", "user_id": "900"}),
                ),
                (Method::Delete, "/channels/600/thread-members/@me", Value::Null),
            ],
            "Successfully left thread \"ideas\" (ID: 600)",
        ),
        case(
            "delete_sticker",
            json!({"guildId": GUILD_ID, "stickerId": "810"}),
            vec![
                (Method::Get, "/guilds/100/stickers/810", sticker()),
                (Method::Delete, "/guilds/100/stickers/810", Value::Null),
            ],
            "Successfully deleted sticker \"wave\" (ID: 810)",
        ),
        case(
            "delete_automod_rule",
            json!({"guildId": GUILD_ID, "ruleId": "820"}),
            vec![
                (Method::Get, "/guilds/100/auto-moderation/rules/820", automod_rule()),
                (Method::Delete, "/guilds/100/auto-moderation/rules/820", Value::Null),
            ],
            "Successfully deleted automod rule \"No leaks\" (ID: 820)",
        ),
    ]
}

#[tokio::test]
async fn test_minimal_arguments_succeed_for_each_action() {
    for Case {
        action,
        mut params,
        replies,
        expect,
    } in minimal_cases()
    {
        let (tools, rest) = tools_with(Gate::default()).await;
        for (method, path, body) in &replies {
            rest.on(*method, path, body.clone());
        }
        params["action"] = json!(action);

        let text = match manage(&tools, params).await {
            Ok(text) => text,
            Err(e) => panic!("{} failed: {}", action, e),
        };
        assert!(text.contains(expect), "{}: {}", action, text);

        for (method, path, _) in replies.iter().filter(|(method, _, _)| *method != Method::Get) {
            assert!(
                !rest.requests_to(*method, path).is_empty(),
                "{} never sent {} {}",
                action,
                method,
                path
            );
        }
    }
}

#[tokio::test]
async fn test_unknown_action_names_the_identifier() {
    let (tools, rest) = tools_with(Gate::default()).await;
    let err = manage(&tools, json!({"action": "summon_dragon"})).await.unwrap_err();
    assert_eq!(err, "Unknown operation: summon_dragon");
    assert_eq!(rest.calls(), 0);
}

#[tokio::test]
async fn test_send_message_scenarios() {
    let (tools, rest) = tools_with(Gate::default()).await;
    rest.on(
        Method::Post,
        "/channels/301/messages",
        message_json("800", "301", ("900", "guildmaster"), "hi"),
    );

    let sent = manage(
        &tools,
        json!({"action": "send_message", "channelId": "301", "message": "hi"}),
    )
    .await
    .unwrap();
    assert!(sent.contains("Message sent successfully"), "{}", sent);

    let missing = manage(
        &tools,
        json!({"action": "send_message", "channelId": "123", "message": "hi"}),
    )
    .await
    .unwrap_err();
    assert!(missing.contains("Channel not found"), "{}", missing);
}

#[tokio::test]
async fn test_voice_user_limit_checked_before_any_request() {
    let (tools, rest) = tools_with(Gate::default()).await;
    let calls_before = rest.calls();
    let err = manage(
        &tools,
        json!({"action": "create_voice_channel", "name": "general", "userLimit": 150}),
    )
    .await
    .unwrap_err();
    assert!(err.contains("between 0 and 99"), "{}", err);
    assert_eq!(rest.calls(), calls_before);
}

#[tokio::test]
async fn test_missing_field_is_a_validation_failure() {
    let (tools, _rest) = tools_with(Gate::default()).await;
    let err = tools
        .execute("discord_manage", json!({"action": "send_message", "channelId": "301"}))
        .await
        .unwrap_err();
    match err {
        McpError::Tool(e) => {
            assert!(matches!(e.kind(), GuildErrorKind::Validation(_)));
            assert!(e.kind().to_string().contains("message"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_action_is_required() {
    let (tools, _rest) = tools_with(Gate::default()).await;
    let err = manage(&tools, json!({"channelId": "301"})).await.unwrap_err();
    assert_eq!(err, "Action parameter is required for discord_manage tool");
}

#[tokio::test]
async fn test_allow_list_gate() {
    let gate = Gate::new(
        vec!["get_roles".to_string()],
        Vec::new(),
        RateLimitTable::new(),
    );
    let (tools, rest) = tools_with(gate).await;

    let denied = manage(&tools, json!({"action": "delete_channel", "channelId": "304"}))
        .await
        .unwrap_err();
    assert_eq!(
        denied,
        "Permission denied: Action 'delete_channel' is not allowed"
    );
    assert!(rest.mutations().is_empty());

    let roles = manage(&tools, json!({"action": "get_roles"})).await.unwrap();
    assert!(roles.contains("Moderator"), "{}", roles);
}

#[tokio::test]
async fn test_deny_list_gate() {
    let gate = Gate::new(
        Vec::new(),
        vec!["ban_member".to_string()],
        RateLimitTable::new(),
    );
    let (tools, rest) = tools_with(gate).await;

    let denied = manage(&tools, json!({"action": "ban_member", "userId": "500"}))
        .await
        .unwrap_err();
    assert!(denied.starts_with("Permission denied"), "{}", denied);
    assert!(rest.mutations().is_empty());

    assert!(manage(&tools, json!({"action": "get_roles"})).await.is_ok());
}

#[tokio::test]
async fn test_bare_action_name_is_routed_to_manage() {
    let (tools, _rest) = tools_with(Gate::default()).await;
    let outcome = tools
        .execute("get_server_info", json!({"guildId": GUILD_ID}))
        .await
        .unwrap();
    assert!(outcome.text().contains("Test Guild"), "{}", outcome.text());

    let err = tools.execute("not_a_tool", json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "Unknown tool: not_a_tool");
}

#[tokio::test]
async fn test_bulk_privacy_reports_each_failure() {
    let (tools, rest) = tools_with(Gate::default()).await;
    rest.on(
        Method::Patch,
        "/channels/301",
        channel_json("301", kind::TEXT, "general", Some("300")),
    );
    let text = manage(
        &tools,
        json!({
            "action": "bulk_set_privacy",
            "guildId": GUILD_ID,
            "targets": [
                {"id": "301", "type": "channel", "isPrivate": true},
                {"id": "998", "type": "channel", "isPrivate": true},
                {"id": "999", "type": "channel", "isPrivate": false}
            ]
        }),
    )
    .await
    .unwrap();
    assert!(text.starts_with("Successfully updated 1 target(s). 2 failed."), "{}", text);
    assert!(text.contains("Failed channel 998"));
    assert!(text.contains("Failed channel 999"));
}

#[tokio::test]
async fn test_manage_tool_definition() {
    let (tools, _rest) = tools_with(Gate::default()).await;
    let listed = tools.list();
    assert_eq!(listed.len(), 1);
    let definition = listed[0].definition();
    assert_eq!(definition["name"], "discord_manage");
    assert!(
        definition["description"]
            .as_str()
            .unwrap()
            .contains("send_message")
    );
    assert_eq!(definition["inputSchema"]["required"], json!(["action"]));
}
