//! Error types for guildmaster.
//!
//! Every failure that can reach an MCP caller is expressed as a [`GuildError`],
//! a [`GuildErrorKind`] tagged with the source location that produced it.
//!
//! # Error Hierarchy
//!
//! - [`GuildErrorKind`] names the condition (remote API failure, validation,
//!   permission, rate limit, operation failure, configuration, transport)
//! - [`GuildError`] wraps the kind with `#[track_caller]` location tracking
//! - [`ConfigError`] is the loader-side error, converted into a `GuildError`
//!   with `?`
//!
//! The `Display` of a kind is the prose an agent sees; the `Display` of the
//! wrapper adds the location for logs.
//!
//! # Examples
//!
//! ```
//! use guildmaster_error::{GuildError, GuildErrorKind, GuildResult};
//!
//! fn find_channel(id: &str) -> GuildResult<String> {
//!     Err(GuildError::operation(format!("Channel not found: {}", id)))
//! }
//!
//! let err = find_channel("42").unwrap_err();
//! assert_eq!(err.user_message(), "Error: Channel not found: 42");
//! assert!(matches!(err.kind(), GuildErrorKind::Operation(_)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod retry;

pub use config::ConfigError;
pub use error::{GuildError, GuildErrorKind, GuildResult};
pub use retry::RetryableError;
