//! The guildmaster error kind and its location-tracking wrapper.

use crate::ConfigError;

/// Conditions a tool call can fail with.
///
/// The `Display` output of each variant is exactly the text returned to the
/// calling agent (after the `Error: ` prefix added by [`GuildError::user_message`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum GuildErrorKind {
    /// Discord rejected a request with a structured error body.
    #[display("{}", message)]
    DiscordApi {
        /// Message reported by Discord
        message: String,
        /// Discord JSON error code (e.g. 10003 for Unknown Channel)
        code: Option<u64>,
        /// HTTP status of the response
        status: Option<u16>,
        /// HTTP method of the failed request
        method: String,
        /// Route path of the failed request
        path: String,
    },

    /// Caller input did not match the declared shape or bounds.
    #[display("{}", _0)]
    Validation(String),

    /// The action or capability is not permitted.
    #[display("{}", _0)]
    Permission(String),

    /// Discord signalled throttling.
    #[display("Rate limited. Try again in {}ms", retry_after_ms)]
    RateLimit {
        /// Milliseconds until the limit resets
        retry_after_ms: u64,
        /// Whether the limit applies to every route
        global: bool,
    },

    /// An operation failed for a domain reason (missing entity, bad state).
    #[display("{}", _0)]
    Operation(String),

    /// The request never produced a response (connect, timeout, decode).
    #[display("HTTP request failed: {}", _0)]
    Http(String),

    /// Configuration could not be loaded or is incomplete.
    #[display("Configuration error: {}", _0)]
    Config(String),

    /// Anything without a recognizable shape.
    #[display("Unknown error occurred: {}", _0)]
    Unknown(String),
}

impl GuildErrorKind {
    /// Discord JSON error code, when the failure came from the API.
    pub fn api_code(&self) -> Option<u64> {
        match self {
            GuildErrorKind::DiscordApi { code, .. } => *code,
            _ => None,
        }
    }

    /// HTTP status, when the failure came from the API.
    pub fn status(&self) -> Option<u16> {
        match self {
            GuildErrorKind::DiscordApi { status, .. } => *status,
            _ => None,
        }
    }

    /// True for a 404 from Discord, the shape every "not found" lookup takes.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Guildmaster error with source location tracking.
///
/// # Examples
///
/// ```
/// use guildmaster_error::{GuildError, GuildErrorKind};
///
/// let err = GuildError::new(GuildErrorKind::RateLimit { retry_after_ms: 1500, global: false });
/// assert_eq!(err.kind().to_string(), "Rate limited. Try again in 1500ms");
/// assert!(format!("{}", err).contains("at line"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Guildmaster Error: {} at line {} in {}", kind, line, file)]
pub struct GuildError {
    /// The kind of error that occurred
    pub kind: GuildErrorKind,
    /// Line number where the error was created
    pub line: u32,
    /// File where the error was created
    pub file: &'static str,
}

impl GuildError {
    /// Create a new GuildError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GuildErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shape or bounds violation in caller input.
    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(GuildErrorKind::Validation(message.into()))
    }

    /// Missing capability or gated action.
    #[track_caller]
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(GuildErrorKind::Permission(message.into()))
    }

    /// Domain failure inside an operation.
    #[track_caller]
    pub fn operation(message: impl Into<String>) -> Self {
        Self::new(GuildErrorKind::Operation(message.into()))
    }

    /// Transport failure that produced no response.
    #[track_caller]
    pub fn http(message: impl Into<String>) -> Self {
        Self::new(GuildErrorKind::Http(message.into()))
    }

    /// Throttling signal from Discord.
    #[track_caller]
    pub fn rate_limit(retry_after_ms: u64, global: bool) -> Self {
        Self::new(GuildErrorKind::RateLimit {
            retry_after_ms,
            global,
        })
    }

    /// The error kind.
    pub fn kind(&self) -> &GuildErrorKind {
        &self.kind
    }

    /// Text returned to the calling agent.
    pub fn user_message(&self) -> String {
        format!("Error: {}", self.kind)
    }

    /// Re-wrap with a context prefix, keeping the kind's category.
    ///
    /// Mirrors the `Failed to <verb>: <cause>` wording operations use when a
    /// multi-step mutation fails part way through.
    #[track_caller]
    pub fn context(self, prefix: &str) -> Self {
        let message = format!("{}: {}", prefix, self.kind);
        let kind = match self.kind {
            GuildErrorKind::Permission(_) => GuildErrorKind::Permission(message),
            GuildErrorKind::Validation(_) => GuildErrorKind::Validation(message),
            GuildErrorKind::RateLimit { .. } => self.kind,
            GuildErrorKind::DiscordApi {
                code,
                status,
                method,
                path,
                ..
            } => GuildErrorKind::DiscordApi {
                message,
                code,
                status,
                method,
                path,
            },
            _ => GuildErrorKind::Operation(message),
        };
        Self::new(kind)
    }

    /// Fold transport-level failures into the operation category.
    ///
    /// Recognized kinds pass through untouched; `Http` becomes
    /// `Operation failed: <cause>`.
    pub fn normalize(self) -> Self {
        let GuildError { kind, line, file } = self;
        let kind = match kind {
            GuildErrorKind::Http(message) => {
                GuildErrorKind::Operation(format!("Operation failed: {}", message))
            }
            other => other,
        };
        Self { kind, line, file }
    }
}

impl From<ConfigError> for GuildError {
    #[track_caller]
    fn from(err: ConfigError) -> Self {
        Self::new(GuildErrorKind::Config(err.message))
    }
}

/// Result type for guildmaster operations.
pub type GuildResult<T> = std::result::Result<T, GuildError>;
