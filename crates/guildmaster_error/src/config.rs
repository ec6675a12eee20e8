//! Errors raised while loading settings.

/// A setting could not be loaded, or loaded to an unusable value.
///
/// `setting` names the environment variable or file key at fault when one
/// is known, so the startup message points at what to fix.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("{}", message)]
pub struct ConfigError {
    /// Rendered message
    pub message: String,
    /// Offending variable or key
    pub setting: Option<String>,
    /// Line number where the error was raised
    pub line: u32,
    /// File where the error was raised
    pub file: &'static str,
}

impl ConfigError {
    /// A loader failure not tied to one setting.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(message.into(), None)
    }

    /// A required setting has no value.
    ///
    /// ```
    /// use guildmaster_error::ConfigError;
    ///
    /// let err = ConfigError::missing("DISCORD_TOKEN");
    /// assert_eq!(err.to_string(), "DISCORD_TOKEN is not set");
    /// assert_eq!(err.setting.as_deref(), Some("DISCORD_TOKEN"));
    /// ```
    #[track_caller]
    pub fn missing(setting: &str) -> Self {
        Self::at(format!("{} is not set", setting), Some(setting))
    }

    /// A setting is present but does not parse as `expected`.
    ///
    /// ```
    /// use guildmaster_error::ConfigError;
    ///
    /// let err = ConfigError::invalid("TIMEOUT", "a non-negative number");
    /// assert_eq!(err.to_string(), "TIMEOUT must be a non-negative number");
    /// ```
    #[track_caller]
    pub fn invalid(setting: &str, expected: &str) -> Self {
        Self::at(format!("{} must be {}", setting, expected), Some(setting))
    }

    #[track_caller]
    fn at(message: String, setting: Option<&str>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message,
            setting: setting.map(str::to_string),
            line: location.line(),
            file: location.file(),
        }
    }
}
