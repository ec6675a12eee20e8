//! Text helpers shared by operation renderers.

use crate::models::Message;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Discord's epoch (2015-01-01T00:00:00Z) in milliseconds.
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Creation time embedded in a snowflake, in milliseconds since the epoch.
pub fn snowflake_timestamp(id: &str) -> Option<i64> {
    let raw: u64 = id.parse().ok()?;
    Some((raw >> 22) as i64 + DISCORD_EPOCH_MS)
}

/// Milliseconds since the epoch as a UTC time.
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Parse an RFC 3339 timestamp as Discord sends them.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// ISO 8601 with millisecond precision and a `Z` suffix.
pub fn iso(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Re-render a Discord timestamp as [`iso`]; unparsable input is returned as-is.
pub fn iso_str(value: &str) -> String {
    parse_timestamp(value).map_or_else(|| value.to_string(), iso)
}

/// `1/15/2024`
pub fn locale_date(time: DateTime<Utc>) -> String {
    time.format("%-m/%-d/%Y").to_string()
}

/// `1/15/2024, 3:04:05 PM`
pub fn locale_datetime(time: DateTime<Utc>) -> String {
    time.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// [`locale_datetime`] of a Discord timestamp; unparsable input is returned as-is.
pub fn locale_datetime_str(value: &str) -> String {
    parse_timestamp(value).map_or_else(|| value.to_string(), locale_datetime)
}

/// [`locale_date`] of a snowflake's creation time.
pub fn snowflake_date(id: &str) -> String {
    snowflake_timestamp(id)
        .and_then(from_millis)
        .map(locale_date)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Jump link for a message.
pub fn message_url(guild_id: Option<&str>, channel_id: &str, message_id: &str) -> String {
    format!(
        "https://discord.com/channels/{}/{}/{}",
        guild_id.unwrap_or("@me"),
        channel_id,
        message_id
    )
}

/// `#rrggbb`
pub fn hex_color(color: u32) -> String {
    format!("#{:06x}", color & 0x00ff_ffff)
}

/// Parse `#RRGGBB` or `RRGGBB`.
pub fn parse_hex_color(value: &str) -> Option<u32> {
    let digits = value.strip_prefix('#').unwrap_or(value);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Highest bitrate a guild may use at its boost tier.
pub fn max_bitrate(premium_tier: u8) -> u32 {
    match premium_tier {
        1 => 128_000,
        2 => 256_000,
        3 => 384_000,
        _ => 96_000,
    }
}

/// First `max` characters of `value`.
pub fn truncate(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((at, _)) => &value[..at],
        None => value,
    }
}

/// `Yes` / `No`
pub fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

/// One line per message, newest first as Discord returns them.
pub fn format_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| {
            let content = if message.content().is_empty() {
                "[No content]"
            } else {
                message.content().as_str()
            };
            format!(
                "- (ID: {}) **[{}]** `{}`: ```{}```",
                message.id(),
                message.author().username(),
                iso_str(message.timestamp()),
                content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_timestamp() {
        // 175928847299117063 is Discord's documented example, created 2016-04-30.
        let ms = snowflake_timestamp("175928847299117063").unwrap();
        assert_eq!(ms, 1_462_015_105_796);
        assert_eq!(iso(from_millis(ms).unwrap()), "2016-04-30T11:18:25.796Z");
        assert!(snowflake_timestamp("not-an-id").is_none());
    }

    #[test]
    fn test_locale_rendering() {
        let time = parse_timestamp("2024-01-05T15:04:05.000000+00:00").unwrap();
        assert_eq!(locale_date(time), "1/5/2024");
        assert_eq!(locale_datetime(time), "1/5/2024, 3:04:05 PM");
        assert_eq!(iso(time), "2024-01-05T15:04:05.000Z");
    }

    #[test]
    fn test_colors() {
        assert_eq!(hex_color(0xff0000), "#ff0000");
        assert_eq!(hex_color(0), "#000000");
        assert_eq!(parse_hex_color("#00FF7f"), Some(0x00ff7f));
        assert_eq!(parse_hex_color("00ff7f"), Some(0x00ff7f));
        assert_eq!(parse_hex_color("#GGGGGG"), None);
        assert_eq!(parse_hex_color("red"), None);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn test_message_url_for_direct_messages() {
        assert_eq!(
            message_url(None, "1", "2"),
            "https://discord.com/channels/@me/1/2"
        );
    }
}
