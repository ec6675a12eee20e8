//! Per-guild voice sessions and audio players.
//!
//! [`VoiceManager`] keeps the bookkeeping (channel, player state, volume)
//! and hands media work to a [`VoiceDriver`]. The server runs on
//! [`SongbirdDriver`], which joins channels through songbird and streams
//! decoded audio into the call. Player state is published on a
//! `tokio::sync::watch` channel so `play` can await the first `Playing` or
//! `Error` transition.

use async_trait::async_trait;
use guildmaster_error::{GuildError, GuildResult};
use songbird::error::JoinError;
use songbird::input::{AudioStream, Input, LiveInput};
use songbird::tracks::{PlayMode, ReadyState, Track, TrackHandle};
use songbird::{Event, EventContext, Songbird, TrackEvent};
use std::collections::HashMap;
use std::io::Cursor;
use std::num::NonZeroU64;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

/// Voice connection status as reported by `get_voice_connections`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    /// Connected and able to play
    Ready,
    /// Dropped by Discord
    Disconnected,
}

/// Audio player state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Nothing queued
    #[default]
    Idle,
    /// Resource is being opened
    Buffering,
    /// Resource is playing
    Playing,
    /// Resource failed
    Error(String),
}

/// Media side of voice: connections and tracks.
#[async_trait]
pub trait VoiceDriver: Send + Sync + std::fmt::Debug {
    /// Connect to `channel_id`, moving any existing connection in the guild.
    async fn connect(&self, guild_id: &str, channel_id: &str) -> GuildResult<()>;

    /// Drop the guild's connection.
    async fn disconnect(&self, guild_id: &str) -> GuildResult<()>;

    /// Replace whatever plays in the guild with `source` (URL or local path).
    ///
    /// Progress is reported on `state`; once this returns `Ok` the driver
    /// must eventually publish `Playing` or `Error`.
    async fn play(
        &self,
        guild_id: &str,
        source: &str,
        volume: u16,
        state: Arc<watch::Sender<PlayerState>>,
    ) -> GuildResult<()>;

    /// Stop the guild's current track.
    async fn stop(&self, guild_id: &str) -> GuildResult<()>;

    /// Change the volume of the guild's current track, in percent.
    async fn set_volume(&self, guild_id: &str, volume: u16) -> GuildResult<()>;
}

/// Driver used before the gateway is connected.
#[derive(Debug, Default)]
pub struct DetachedDriver;

impl DetachedDriver {
    fn refuse() -> GuildError {
        GuildError::operation("Voice gateway is not connected")
    }
}

#[async_trait]
impl VoiceDriver for DetachedDriver {
    async fn connect(&self, _guild_id: &str, _channel_id: &str) -> GuildResult<()> {
        Err(Self::refuse())
    }

    async fn disconnect(&self, _guild_id: &str) -> GuildResult<()> {
        Err(Self::refuse())
    }

    async fn play(
        &self,
        _guild_id: &str,
        _source: &str,
        _volume: u16,
        _state: Arc<watch::Sender<PlayerState>>,
    ) -> GuildResult<()> {
        Err(Self::refuse())
    }

    async fn stop(&self, _guild_id: &str) -> GuildResult<()> {
        Err(Self::refuse())
    }

    async fn set_volume(&self, _guild_id: &str, _volume: u16) -> GuildResult<()> {
        Err(Self::refuse())
    }
}

fn snowflake(id: &str, what: &str) -> GuildResult<NonZeroU64> {
    id.parse()
        .map_err(|_| GuildError::validation(format!("Invalid {} id: {}", what, id)))
}

fn percent(volume: u16) -> f32 {
    f32::from(volume) / 100.0
}

/// Voice through songbird, registered on the serenity client.
#[derive(Clone)]
pub struct SongbirdDriver {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    tracks: Arc<Mutex<HashMap<String, TrackHandle>>>,
}

impl std::fmt::Debug for SongbirdDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SongbirdDriver").finish_non_exhaustive()
    }
}

impl SongbirdDriver {
    /// Driver over the songbird instance the gateway client was built with.
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self {
            songbird,
            http: reqwest::Client::new(),
            tracks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Raw bytes of a URL or local file.
    async fn load(&self, source: &str) -> GuildResult<Vec<u8>> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self
                .http
                .get(source)
                .send()
                .await
                .map_err(|e| GuildError::http(e.to_string()))?;
            if !response.status().is_success() {
                return Err(GuildError::operation(format!(
                    "HTTP {}",
                    response.status().as_u16()
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| GuildError::http(e.to_string()))?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(source)
                .await
                .map_err(|e| GuildError::operation(format!("{}: {}", source, e)))
        }
    }
}

#[async_trait]
impl VoiceDriver for SongbirdDriver {
    async fn connect(&self, guild_id: &str, channel_id: &str) -> GuildResult<()> {
        let guild = snowflake(guild_id, "guild")?;
        let channel = snowflake(channel_id, "channel")?;
        self.songbird
            .join(guild, channel)
            .await
            .map_err(|e| GuildError::operation(e.to_string()))?;
        Ok(())
    }

    async fn disconnect(&self, guild_id: &str) -> GuildResult<()> {
        let guild = snowflake(guild_id, "guild")?;
        self.tracks.lock().await.remove(guild_id);
        match self.songbird.remove(guild).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(GuildError::operation(e.to_string())),
        }
    }

    async fn play(
        &self,
        guild_id: &str,
        source: &str,
        volume: u16,
        state: Arc<watch::Sender<PlayerState>>,
    ) -> GuildResult<()> {
        let guild = snowflake(guild_id, "guild")?;
        let call = self
            .songbird
            .get(guild)
            .ok_or_else(|| GuildError::operation("Voice connection is not established"))?;
        let bytes = self.load(source).await?;
        debug!(source, size = bytes.len(), "Audio loaded");

        let input = Input::Live(
            LiveInput::Raw(AudioStream {
                input: Box::new(Cursor::new(bytes)),
                hint: None,
            }),
            None,
        );
        let handle = {
            let mut call = call.lock().await;
            call.stop();
            call.play(Track::new(input).volume(percent(volume)))
        };
        for event in [TrackEvent::Playable, TrackEvent::Error, TrackEvent::End] {
            handle
                .add_event(Event::Track(event), PlayerEvents {
                    state: state.clone(),
                })
                .map_err(|e| GuildError::operation(e.to_string()))?;
        }
        // The track may have become playable before the handlers landed.
        if let Ok(info) = handle.get_info().await {
            match &info.playing {
                PlayMode::Errored(e) => {
                    state.send_replace(PlayerState::Error(format!("{:?}", e)));
                }
                _ if matches!(info.ready, ReadyState::Playable) => {
                    state.send_replace(PlayerState::Playing);
                }
                _ => {}
            }
        }
        self.tracks.lock().await.insert(guild_id.to_string(), handle);
        Ok(())
    }

    async fn stop(&self, guild_id: &str) -> GuildResult<()> {
        let guild = snowflake(guild_id, "guild")?;
        self.tracks.lock().await.remove(guild_id);
        if let Some(call) = self.songbird.get(guild) {
            call.lock().await.stop();
        }
        Ok(())
    }

    async fn set_volume(&self, guild_id: &str, volume: u16) -> GuildResult<()> {
        if let Some(track) = self.tracks.lock().await.get(guild_id)
            && let Err(e) = track.set_volume(percent(volume))
        {
            // A finished track cannot be changed; the stored volume still
            // applies to the next one.
            debug!(guild_id, error = %e, "Volume not applied to current track");
        }
        Ok(())
    }
}

/// Forwards track events onto a player's state channel.
struct PlayerEvents {
    state: Arc<watch::Sender<PlayerState>>,
}

#[async_trait]
impl songbird::EventHandler for PlayerEvents {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let EventContext::Track(tracks) = ctx else {
            return None;
        };
        for (track, _) in tracks.iter() {
            let next = match &track.playing {
                PlayMode::Errored(e) => PlayerState::Error(format!("{:?}", e)),
                PlayMode::End | PlayMode::Stop => PlayerState::Idle,
                _ => PlayerState::Playing,
            };
            self.state.send_replace(next);
        }
        None
    }
}

/// Snapshot of one voice session.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct VoiceSession {
    guild_id: String,
    guild_name: String,
    channel_id: String,
    channel_name: String,
    status: ConnectionStatus,
    volume: u16,
}

#[derive(Debug)]
struct SessionEntry {
    session: VoiceSession,
    player: Arc<watch::Sender<PlayerState>>,
}

/// Owner of every voice session in the process.
#[derive(Debug, Clone)]
pub struct VoiceManager {
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    driver: Arc<dyn VoiceDriver>,
}

impl Default for VoiceManager {
    fn default() -> Self {
        Self::new(Arc::new(DetachedDriver))
    }
}

impl VoiceManager {
    /// Create a manager over a voice driver.
    pub fn new(driver: Arc<dyn VoiceDriver>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            driver,
        }
    }

    /// Join a voice channel, replacing any session in the guild. An existing
    /// player is kept.
    #[instrument(skip(self, guild_name, channel_name))]
    pub async fn join(
        &self,
        guild_id: &str,
        guild_name: &str,
        channel_id: &str,
        channel_name: &str,
    ) -> GuildResult<()> {
        self.driver.connect(guild_id, channel_id).await?;

        let mut sessions = self.sessions.lock().await;
        let player = sessions
            .get(guild_id)
            .map(|entry| entry.player.clone())
            .unwrap_or_else(|| Arc::new(watch::Sender::new(PlayerState::Idle)));
        let volume = sessions
            .get(guild_id)
            .map_or(100, |entry| entry.session.volume);
        sessions.insert(
            guild_id.to_string(),
            SessionEntry {
                session: VoiceSession {
                    guild_id: guild_id.to_string(),
                    guild_name: guild_name.to_string(),
                    channel_id: channel_id.to_string(),
                    channel_name: channel_name.to_string(),
                    status: ConnectionStatus::Ready,
                    volume,
                },
                player,
            },
        );
        info!("Joined voice channel");
        Ok(())
    }

    /// Leave voice in a guild and drop its player. Returns false when there
    /// was no session.
    #[instrument(skip(self))]
    pub async fn leave(&self, guild_id: &str) -> GuildResult<bool> {
        let Some(entry) = self.sessions.lock().await.remove(guild_id) else {
            return Ok(false);
        };
        entry.player.send_replace(PlayerState::Idle);
        self.driver.disconnect(guild_id).await?;
        info!("Left voice channel");
        Ok(true)
    }

    /// Record a connection status reported by the gateway.
    pub async fn set_status(&self, guild_id: &str, status: ConnectionStatus) {
        if let Some(entry) = self.sessions.lock().await.get_mut(guild_id) {
            debug!(guild_id, %status, "Voice connection status changed");
            entry.session.status = status;
        }
    }

    /// Snapshot of a guild's session.
    pub async fn session(&self, guild_id: &str) -> Option<VoiceSession> {
        self.sessions
            .lock()
            .await
            .get(guild_id)
            .map(|entry| entry.session.clone())
    }

    /// Every session, ordered by guild id.
    pub async fn sessions(&self) -> Vec<VoiceSession> {
        let mut sessions: Vec<_> = self
            .sessions
            .lock()
            .await
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        sessions.sort_by(|a, b| a.guild_id.cmp(&b.guild_id));
        sessions
    }

    /// Current player state of a guild.
    pub async fn player_state(&self, guild_id: &str) -> Option<PlayerState> {
        self.sessions
            .lock()
            .await
            .get(guild_id)
            .map(|entry| entry.player.borrow().clone())
    }

    /// Start `url` on the guild's player and wait until it is playing or
    /// has failed. Returns the terminal state; `None` when the guild has no
    /// session.
    #[instrument(skip(self))]
    pub async fn play(&self, guild_id: &str, url: &str) -> Option<PlayerState> {
        let (player, volume) = {
            let sessions = self.sessions.lock().await;
            let entry = sessions.get(guild_id)?;
            (entry.player.clone(), entry.session.volume)
        };

        player.send_replace(PlayerState::Buffering);
        let mut receiver = player.subscribe();
        if let Err(e) = self.driver.play(guild_id, url, volume, player.clone()).await {
            player.send_replace(PlayerState::Error(e.kind().to_string()));
        }

        let state = match receiver
            .wait_for(|state| matches!(state, PlayerState::Playing | PlayerState::Error(_)))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => PlayerState::Error("Audio player was dropped".to_string()),
        };
        if let PlayerState::Error(message) = &state {
            warn!(error = %message, "Audio playback failed");
        }
        Some(state)
    }

    /// Stop the guild's player. Returns false when there is none.
    pub async fn stop(&self, guild_id: &str) -> GuildResult<bool> {
        let player = match self.sessions.lock().await.get(guild_id) {
            Some(entry) => entry.player.clone(),
            None => return Ok(false),
        };
        self.driver.stop(guild_id).await?;
        player.send_replace(PlayerState::Idle);
        Ok(true)
    }

    /// Set the guild's playback volume in percent, on the current track and
    /// the ones after it. Returns false when there is no player.
    pub async fn set_volume(&self, guild_id: &str, volume: u16) -> GuildResult<bool> {
        match self.sessions.lock().await.get_mut(guild_id) {
            Some(entry) => entry.session.volume = volume,
            None => return Ok(false),
        }
        self.driver.set_volume(guild_id, volume).await?;
        Ok(true)
    }

    /// Stop every player and leave every channel.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.sessions.lock().await.drain().collect();
        for (guild_id, entry) in drained {
            entry.player.send_replace(PlayerState::Idle);
            if let Err(e) = self.driver.disconnect(&guild_id).await {
                debug!(guild_id = %guild_id, error = %e, "Voice leave on shutdown failed");
            }
        }
    }
}
