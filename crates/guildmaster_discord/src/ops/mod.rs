//! Administrative operations.
//!
//! Each module adds methods to [`DiscordClient`](crate::DiscordClient) for one
//! area and defines the parameter record of every method. Records
//! deserialize from the camelCase parameter bag callers send and implement
//! [`Validate`](crate::Validate) for the checks that must run before any
//! network call.

pub mod automod;
pub mod channels;
pub mod components;
pub(crate) mod de;
pub mod direct;
pub mod emoji;
pub mod events;
pub mod files;
pub mod invites;
pub mod layout;
pub mod manage;
pub mod members;
pub mod messages;
pub mod moderation;
pub mod overwrites;
pub mod privacy;
pub mod roles;
pub mod server;
pub mod threads;
pub mod voice;
pub mod webhooks;

/// Implement [`Validate`](crate::Validate) with the accept-all default.
macro_rules! no_validation {
    ($($params:ty),+ $(,)?) => {
        $(impl $crate::Validate for $params {})+
    };
}
pub(crate) use no_validation;

use guildmaster_error::GuildError;

/// Prefix an error with the operation that failed.
pub(crate) fn failed(action: &'static str) -> impl Fn(GuildError) -> GuildError {
    move |e| e.context(&format!("Failed to {}", action))
}
