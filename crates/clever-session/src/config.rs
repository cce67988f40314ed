//! Session configuration

use crate::error::ConfigError;
use clever_address::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Seed hashed into the default program id
pub const DEFAULT_PROGRAM_SEED: &[u8] = b"clever_todo";

/// What the session-establishing fetch does when the ledger is unreachable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Show the identity as uninitialized with no items
    #[default]
    ResetToUninitialized,
    /// Keep whatever the view held and mark it stale
    KeepStale,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Program that owns the todo records
    pub program_id: Address,
    /// Upper bound on waiting for a confirmation
    pub confirm_timeout_ms: u64,
    /// Upper bound on each fetch call
    pub fetch_timeout_ms: u64,
    /// Behaviour of the fetch run on identity change
    pub initial_fetch_failure: FetchFailurePolicy,
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_program_id(mut self, program_id: Address) -> Self {
        self.program_id = program_id;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout_ms = duration_ms(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = duration_ms(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_initial_fetch_failure(mut self, policy: FetchFailurePolicy) -> Self {
        self.initial_fetch_failure = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Parse TOML; missing keys take their defaults
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::Invalid` on
    /// out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` if either timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirm_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "confirm_timeout_ms must be positive".to_string(),
            ));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program_id: Address::hash_of(DEFAULT_PROGRAM_SEED),
            confirm_timeout_ms: 30_000,
            fetch_timeout_ms: 10_000,
            initial_fetch_failure: FetchFailurePolicy::default(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = SessionConfig::new();
        assert_eq!(config.confirm_timeout(), Duration::from_secs(30));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.initial_fetch_failure,
            FetchFailurePolicy::ResetToUninitialized
        );
        assert_eq!(config.program_id, Address::hash_of(b"clever_todo"));
    }

    #[test]
    fn builder_overrides() {
        let config = SessionConfig::new()
            .with_confirm_timeout(Duration::from_millis(500))
            .with_fetch_timeout(Duration::from_millis(250))
            .with_initial_fetch_failure(FetchFailurePolicy::KeepStale);
        assert_eq!(config.confirm_timeout_ms, 500);
        assert_eq!(config.fetch_timeout_ms, 250);
        assert_eq!(config.initial_fetch_failure, FetchFailurePolicy::KeepStale);
    }

    #[test]
    fn toml_partial_uses_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
confirm_timeout_ms = 1500
initial_fetch_failure = "keep_stale"
"#,
        )
        .unwrap();
        assert_eq!(config.confirm_timeout_ms, 1500);
        assert_eq!(config.fetch_timeout_ms, 10_000);
        assert_eq!(config.initial_fetch_failure, FetchFailurePolicy::KeepStale);
    }

    #[test]
    fn toml_program_id_is_hex() {
        let id = Address::hash_of(b"devnet");
        let config = SessionConfig::from_toml_str(&format!("program_id = \"{id}\"")).unwrap();
        assert_eq!(config.program_id, id);
    }

    #[test]
    fn toml_rejects_zero_timeout() {
        let result = SessionConfig::from_toml_str("fetch_timeout_ms = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn toml_rejects_garbage() {
        let result = SessionConfig::from_toml_str("confirm_timeout_ms = \"soon\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confirm_timeout_ms = 42").unwrap();
        let config = SessionConfig::from_path(file.path()).unwrap();
        assert_eq!(config.confirm_timeout_ms, 42);

        let missing = SessionConfig::from_path(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
