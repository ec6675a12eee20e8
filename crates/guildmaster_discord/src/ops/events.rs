//! Guild scheduled events.

use super::failed;
use super::server::GuildRef;
use crate::client::{DiscordClient, Outcome, Validate, optional};
use crate::format::{iso, locale_datetime, locale_datetime_str};
use crate::models::{ChannelKind, ScheduledEvent};
use crate::rest::RestRequest;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use guildmaster_error::{GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Events visible to guild members only.
const GUILD_ONLY: u8 = 2;

/// `create_event`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvent {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Event name
    pub name: String,
    /// Event description
    #[serde(default)]
    pub description: Option<String>,
    /// ISO 8601 start
    pub start_time: String,
    /// ISO 8601 end
    #[serde(default)]
    pub end_time: Option<String>,
    /// Where an external event takes place
    #[serde(default)]
    pub location: Option<String>,
    /// Voice or stage channel hosting the event
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// `edit_event`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditEvent {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The event
    pub event_id: String,
    /// New name
    #[serde(default)]
    pub name: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New ISO 8601 start
    #[serde(default)]
    pub start_time: Option<String>,
    /// New ISO 8601 end
    #[serde(default)]
    pub end_time: Option<String>,
    /// New location; external events only
    #[serde(default)]
    pub location: Option<String>,
}

/// `delete_event`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRef {
    /// Guild; the default guild when absent
    #[serde(default)]
    pub guild_id: Option<String>,
    /// The event
    pub event_id: String,
}

impl Validate for CreateEvent {
    fn validate(&self) -> GuildResult<()> {
        if self.name.is_empty() || self.start_time.is_empty() {
            return Err(GuildError::validation(
                "Event name and start time are required",
            ));
        }
        Ok(())
    }
}

impl Validate for EditEvent {
    fn validate(&self) -> GuildResult<()> {
        require_event_id(&self.event_id)
    }
}

impl Validate for EventRef {
    fn validate(&self) -> GuildResult<()> {
        require_event_id(&self.event_id)
    }
}

fn require_event_id(event_id: &str) -> GuildResult<()> {
    if event_id.is_empty() {
        return Err(GuildError::validation("Event ID is required"));
    }
    Ok(())
}

/// Parse an event time: RFC 3339, or a zone-less date-time or date read as UTC.
pub fn parse_event_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, pattern) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn status_name(status: u8) -> &'static str {
    match status {
        1 => "Scheduled",
        2 => "Active",
        3 => "Completed",
        4 => "Canceled",
        _ => "Unknown",
    }
}

fn entity_name(entity_type: u8) -> &'static str {
    match entity_type {
        ScheduledEvent::STAGE => "Stage",
        ScheduledEvent::VOICE => "Voice",
        _ => "External",
    }
}

fn end_text(event: &ScheduledEvent) -> String {
    event
        .scheduled_end_time()
        .as_deref()
        .map_or_else(|| "No end time".to_string(), locale_datetime_str)
}

impl DiscordClient {
    async fn scheduled_event(&self, guild_id: &str, event_id: &str) -> GuildResult<ScheduledEvent> {
        optional(
            self.fetch(RestRequest::get(format!(
                "/guilds/{}/scheduled-events/{}",
                guild_id, event_id
            )))
            .await,
        )?
        .ok_or_else(|| GuildError::operation("Event not found by eventId"))
    }

    /// Schedule an event in a voice channel or at an external location.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_event(&self, params: &CreateEvent) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        params.validate()?;

        let result: GuildResult<Outcome> = async {
            let start = parse_event_time(&params.start_time).ok_or_else(|| {
                GuildError::validation(
                    "Invalid start time format. Use ISO 8601 format (e.g., 2024-01-01T15:00:00Z)",
                )
            })?;
            let end = params
                .end_time
                .as_deref()
                .map(|value| {
                    parse_event_time(value).ok_or_else(|| {
                        GuildError::validation("Invalid end time format. Use ISO 8601 format")
                    })
                })
                .transpose()?;
            if start < Utc::now() {
                return Err(GuildError::validation("Start time cannot be in the past"));
            }

            let channel = match &params.channel_id {
                Some(channel_id) => self.guild_channel(guild.id(), channel_id).await?,
                None => None,
            };
            let entity_type = match channel.as_ref().map(|channel| channel.kind()) {
                Some(ChannelKind::GuildVoice) => ScheduledEvent::VOICE,
                Some(ChannelKind::GuildStageVoice) => ScheduledEvent::STAGE,
                Some(_) => {
                    return Err(GuildError::operation(
                        "Channel must be a voice or stage channel for voice events",
                    ));
                }
                None => ScheduledEvent::EXTERNAL,
            };

            let mut body = Map::new();
            body.insert("name".into(), json!(params.name));
            if let Some(description) = params.description.as_ref().filter(|d| !d.is_empty()) {
                body.insert("description".into(), json!(description));
            }
            body.insert("scheduled_start_time".into(), json!(iso(start)));
            if let Some(end) = end {
                body.insert("scheduled_end_time".into(), json!(iso(end)));
            }
            body.insert("privacy_level".into(), json!(GUILD_ONLY));
            body.insert("entity_type".into(), json!(entity_type));
            let location = match &channel {
                Some(channel) => {
                    body.insert("channel_id".into(), json!(channel.id()));
                    channel.name().clone()
                }
                None => {
                    let location = params
                        .location
                        .clone()
                        .unwrap_or_else(|| "External Location".to_string());
                    body.insert("entity_metadata".into(), json!({ "location": location }));
                    location
                }
            };

            let event: ScheduledEvent = self
                .fetch(
                    RestRequest::post(format!("/guilds/{}/scheduled-events", guild.id()))
                        .json(Value::Object(body)),
                )
                .await?;
            info!(event_id = %event.id(), "Scheduled event created");

            Ok(Outcome::new(format!(
                "Successfully created event \"{}\" (ID: {})\n- Start: {}\n- End: {}\n- Type: {}\n- Location: {}",
                event.name(),
                event.id(),
                locale_datetime_str(event.scheduled_start_time()),
                end_text(&event),
                entity_name(entity_type),
                location
            ))
            .with("eventId", event.id().as_str()))
        }
        .await;
        result.map_err(failed("create event"))
    }

    /// Change an event's name, description, times or location.
    #[instrument(skip(self, params), fields(event_id = %params.event_id))]
    pub async fn edit_event(&self, params: &EditEvent) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        params.validate()?;

        let result: GuildResult<Outcome> = async {
            let event = self.scheduled_event(guild.id(), &params.event_id).await?;
            let mut body = Map::new();
            let mut changes = Vec::new();

            if let Some(name) = &params.name {
                body.insert("name".into(), json!(name));
                changes.push(format!("name to \"{}\"", name));
            }
            if let Some(description) = &params.description {
                body.insert("description".into(), json!(description));
                changes.push("description".to_string());
            }
            if let Some(value) = &params.start_time {
                let start = parse_event_time(value)
                    .ok_or_else(|| GuildError::validation("Invalid start time format"))?;
                if start < Utc::now() {
                    return Err(GuildError::validation("Start time cannot be in the past"));
                }
                body.insert("scheduled_start_time".into(), json!(iso(start)));
                changes.push(format!("start time to {}", locale_datetime(start)));
            }
            if let Some(value) = &params.end_time {
                let end = parse_event_time(value)
                    .ok_or_else(|| GuildError::validation("Invalid end time format"))?;
                body.insert("scheduled_end_time".into(), json!(iso(end)));
                changes.push(format!("end time to {}", locale_datetime(end)));
            }
            if let Some(location) = &params.location
                && *event.entity_type() == ScheduledEvent::EXTERNAL
            {
                body.insert("entity_metadata".into(), json!({ "location": location }));
                changes.push(format!("location to \"{}\"", location));
            }

            if body.is_empty() {
                return Ok(Outcome::new("No changes specified for event edit"));
            }

            let updated: ScheduledEvent = self
                .fetch(
                    RestRequest::patch(format!(
                        "/guilds/{}/scheduled-events/{}",
                        guild.id(),
                        event.id()
                    ))
                    .json(Value::Object(body)),
                )
                .await?;
            Ok(Outcome::new(format!(
                "Successfully edited event \"{}\" (ID: {}). Changed: {}",
                updated.name(),
                params.event_id,
                changes.join(", ")
            ))
            .with("eventId", params.event_id.as_str()))
        }
        .await;
        result.map_err(failed("edit event"))
    }

    /// Cancel and remove an event.
    #[instrument(skip(self, params), fields(event_id = %params.event_id))]
    pub async fn delete_event(&self, params: &EventRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;
        params.validate()?;

        let result: GuildResult<Outcome> = async {
            let event = self.scheduled_event(guild.id(), &params.event_id).await?;
            self.send(RestRequest::delete(format!(
                "/guilds/{}/scheduled-events/{}",
                guild.id(),
                event.id()
            )))
            .await?;
            info!(event_id = %event.id(), "Scheduled event deleted");
            Ok(Outcome::new(format!(
                "Successfully deleted event \"{}\" (ID: {})",
                event.name(),
                params.event_id
            ))
            .with("eventId", params.event_id.as_str()))
        }
        .await;
        result.map_err(failed("delete event"))
    }

    /// Every scheduled event with its status and attendance.
    #[instrument(skip(self, params))]
    pub async fn get_events(&self, params: &GuildRef) -> GuildResult<Outcome> {
        self.ensure_ready().await?;
        let guild = self.resolved_guild(params.guild_id.as_deref()).await?;

        let result: GuildResult<Outcome> = async {
            let events: Vec<ScheduledEvent> = self
                .fetch(
                    RestRequest::get(format!("/guilds/{}/scheduled-events", guild.id()))
                        .query("with_user_count", true),
                )
                .await?;
            if events.is_empty() {
                return Ok(Outcome::new("No scheduled events found in this server").with("count", 0));
            }

            let channel_names: HashMap<String, String> = self
                .guild_channels(guild.id())
                .await?
                .into_iter()
                .map(|channel| (channel.id().clone(), channel.name().clone()))
                .collect();

            let blocks: Vec<String> = events
                .iter()
                .map(|event| {
                    let location = if *event.entity_type() == ScheduledEvent::EXTERNAL {
                        event.location().unwrap_or("External Location").to_string()
                    } else {
                        event
                            .channel_id()
                            .as_ref()
                            .and_then(|id| channel_names.get(id))
                            .cloned()
                            .unwrap_or_else(|| "Unknown Channel".to_string())
                    };
                    format!(
                        "- **{}** (ID: {})\n  - Description: {}\n  - Start: {}\n  - End: {}\n  - Status: {}\n  - Type: {}\n  - Location: {}\n  - Participants: {}",
                        event.name(),
                        event.id(),
                        event.description().as_deref().unwrap_or("No description"),
                        locale_datetime_str(event.scheduled_start_time()),
                        end_text(event),
                        status_name(*event.status()),
                        entity_name(*event.entity_type()),
                        location,
                        event.user_count().unwrap_or(0)
                    )
                })
                .collect();

            Ok(Outcome::new(format!(
                "**Found {} scheduled events:**\n{}",
                events.len(),
                blocks.join("\n\n")
            ))
            .with("count", events.len()))
        }
        .await;
        result.map_err(failed("fetch events"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::Method;
    use crate::testing::fixture;

    fn event_json(id: &str, name: &str, entity_type: u8) -> Value {
        let channel_id = if entity_type == ScheduledEvent::EXTERNAL {
            Value::Null
        } else {
            json!("302")
        };
        json!({
            "id": id,
            "name": name,
            "description": null,
            "scheduled_start_time": "2030-06-01T18:00:00+00:00",
            "scheduled_end_time": null,
            "status": 1,
            "entity_type": entity_type,
            "channel_id": channel_id,
            "entity_metadata": { "location": "Park" },
            "user_count": 7
        })
    }

    fn create(start: &str, channel_id: Option<&str>) -> CreateEvent {
        CreateEvent {
            guild_id: None,
            name: "Game night".to_string(),
            description: None,
            start_time: start.to_string(),
            end_time: None,
            location: None,
            channel_id: channel_id.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_event_time_forms() {
        assert!(parse_event_time("2030-01-01T15:00:00Z").is_some());
        assert!(parse_event_time("2030-01-01T15:00:00").is_some());
        assert!(parse_event_time("2030-01-01").is_some());
        assert!(parse_event_time("next tuesday").is_none());
    }

    #[tokio::test]
    async fn test_create_voice_event() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Post,
            "/guilds/100/scheduled-events",
            event_json("800", "Game night", ScheduledEvent::VOICE),
        );
        let outcome = client
            .create_event(&create("2030-06-01T18:00:00Z", Some("302")))
            .await
            .unwrap();
        assert_eq!(
            outcome.text(),
            "Successfully created event \"Game night\" (ID: 800)\n- Start: 6/1/2030, 6:00:00 PM\n- End: No end time\n- Type: Voice\n- Location: Lounge"
        );
        let body = rest.requests_to(Method::Post, "/guilds/100/scheduled-events")[0]
            .json_body()
            .cloned()
            .unwrap();
        assert_eq!(body["entity_type"], ScheduledEvent::VOICE);
        assert_eq!(body["channel_id"], "302");
        assert_eq!(body["privacy_level"], GUILD_ONLY);
    }

    #[tokio::test]
    async fn test_create_event_in_text_channel_is_refused() {
        let (client, rest) = fixture().await;
        let err = client
            .create_event(&create("2030-06-01T18:00:00Z", Some("301")))
            .await
            .unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to create event: Channel must be a voice or stage channel for voice events"
        );
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_create_event_in_past() {
        let (client, _rest) = fixture().await;
        let err = client
            .create_event(&create("2001-01-01T00:00:00Z", None))
            .await
            .unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to create event: Start time cannot be in the past"
        );
    }

    #[tokio::test]
    async fn test_edit_event_location_only_for_external() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/guilds/100/scheduled-events/800",
            event_json("800", "Game night", ScheduledEvent::VOICE),
        );
        let params = EditEvent {
            guild_id: None,
            event_id: "800".to_string(),
            name: None,
            description: None,
            start_time: None,
            end_time: None,
            location: Some("Library".to_string()),
        };
        let outcome = client.edit_event(&params).await.unwrap();
        assert_eq!(outcome.text(), "No changes specified for event edit");
        assert!(rest.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_event() {
        let (client, _rest) = fixture().await;
        let params = EventRef {
            guild_id: None,
            event_id: "801".to_string(),
        };
        let err = client.delete_event(&params).await.unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Failed to delete event: Event not found by eventId"
        );
    }

    #[tokio::test]
    async fn test_get_events_lists_details() {
        let (client, rest) = fixture().await;
        rest.on(
            Method::Get,
            "/guilds/100/scheduled-events",
            json!([event_json("801", "Picnic", ScheduledEvent::EXTERNAL)]),
        );
        let outcome = client.get_events(&GuildRef::default()).await.unwrap();
        assert_eq!(
            outcome.text(),
            "**Found 1 scheduled events:**\n- **Picnic** (ID: 801)\n  - Description: No description\n  - Start: 6/1/2030, 6:00:00 PM\n  - End: No end time\n  - Status: Scheduled\n  - Type: External\n  - Location: Park\n  - Participants: 7"
        );
    }
}
