//! Discord client wrapper for guildmaster.
//!
//! [`DiscordClient`] exposes one async method per administrative operation
//! (messages, channels, roles, members, moderation, events, voice, ...).
//! Every method takes a typed parameter record from [`ops`], runs its
//! domain checks, performs one or more REST calls through a
//! [`DiscordRest`](rest::DiscordRest) backend, and returns an [`Outcome`]:
//! the prose an agent reads plus the key identifiers it produced.
//!
//! The gateway connection ([`gateway`]) marks the client ready and
//! carries voice through songbird; all reads go over REST, so no cache is
//! held.
//!
//! # Features
//!
//! - `mock`: [`MockRest`](rest::MockRest) and the [`testing`] fixtures for
//!   downstream tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
pub mod format;
pub mod gateway;
pub mod models;
pub mod ops;
pub mod permissions;
pub mod rest;
#[cfg(any(test, feature = "mock"))]
pub mod testing;
pub mod voice;

pub use client::{BotContext, DiscordClient, Outcome, Validate, highest_role};
pub use gateway::{GatewayHandler, gateway_intents};
pub use rest::{DiscordRest, HttpRest, Method, RestRequest};
pub use voice::{PlayerState, SongbirdDriver, VoiceDriver, VoiceManager};
