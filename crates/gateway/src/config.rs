//! Gateway configuration.
//!
//! Configuration is a TOML file whose path is taken from the `CONFIG`
//! environment variable. Keys use the gateway's historical PascalCase names:
//!
//! ```toml
//! StoreRoot = "/var/lib/keygate"
//! AuthSecret = "change-me"
//! ChallengeTTLSeconds = 30
//! ChallengeLength = 16
//! TokenTTLSeconds = 300
//!
//! # optional
//! ListenAddress = "0.0.0.0:8000"
//! SingleUseChallenges = false
//! SweepInterval = "1m"
//! ```

use std::{
    ffi::OsString,
    fmt,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use keygate_authn::{MAX_CHALLENGE_LENGTH, MAX_TTL};
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

/// Environment variable holding the configuration file path.
pub const CONFIG_ENV: &str = "CONFIG";

/// Port the gateway listens on when `ListenAddress` is not set.
pub const DEFAULT_PORT: u16 = 8000;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No configuration source could be found or read.
    #[error("configuration missing: {message}")]
    Missing {
        /// What was missing.
        message: String,
        /// Underlying I/O error, if a file could not be read.
        #[source]
        source: Option<std::io::Error>,
    },

    /// The file is not valid TOML or does not match the expected keys.
    #[error("configuration could not be parsed: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Configuration key.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}

/// Validated gateway configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding the durable store.
    #[serde(rename = "StoreRoot")]
    pub store_root: PathBuf,

    /// Shared secret clients hash with each challenge.
    #[serde(rename = "AuthSecret")]
    pub auth_secret: Zeroizing<String>,

    /// Lifetime of an issued challenge, in seconds.
    #[serde(rename = "ChallengeTTLSeconds")]
    pub challenge_ttl_seconds: u64,

    /// Random bytes per challenge.
    #[serde(rename = "ChallengeLength")]
    pub challenge_length: usize,

    /// Lifetime of an issued token, in seconds.
    #[serde(rename = "TokenTTLSeconds")]
    pub token_ttl_seconds: u64,

    /// Address the HTTP server binds to.
    #[serde(rename = "ListenAddress", default = "default_listen_address")]
    pub listen_address: SocketAddr,

    /// Remove a challenge once it has been answered correctly.
    #[serde(rename = "SingleUseChallenges", default)]
    pub single_use_challenges: bool,

    /// Period of the expired-challenge sweeper; no sweeper when unset.
    #[serde(rename = "SweepInterval", default, with = "humantime_serde")]
    pub sweep_interval: Option<Duration>,
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

impl Config {
    /// Loads configuration from the file named by `CONFIG`.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::var_os(CONFIG_ENV))
    }

    /// Loads configuration from `path`, as read from the environment.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] if `path` is `None` or the file cannot be read
    /// - [`ConfigError::Parse`] if the file is not valid
    /// - [`ConfigError::Invalid`] if a value is out of range
    pub fn load_from(path: Option<OsString>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Err(ConfigError::Missing {
                message: format!("environment variable with config path ({CONFIG_ENV}) not found"),
                source: None,
            });
        };
        Self::from_file(Path::new(&path))
    }

    /// Loads configuration from the file at `path`.
    ///
    /// # Errors
    ///
    /// As [`Config::load_from`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Missing {
            message: format!("cannot read {}", path.display()),
            source: Some(e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_root.as_os_str().is_empty() {
            return Err(ConfigError::invalid("StoreRoot", "must not be empty"));
        }
        if self.auth_secret.is_empty() {
            return Err(ConfigError::invalid("AuthSecret", "must not be empty"));
        }
        check_ttl("ChallengeTTLSeconds", self.challenge_ttl_seconds)?;
        if !(1..=MAX_CHALLENGE_LENGTH).contains(&self.challenge_length) {
            return Err(ConfigError::invalid(
                "ChallengeLength",
                format!("must be between 1 and {MAX_CHALLENGE_LENGTH}"),
            ));
        }
        check_ttl("TokenTTLSeconds", self.token_ttl_seconds)?;
        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::invalid("SweepInterval", "must be positive"));
        }
        Ok(())
    }

    /// Challenge lifetime.
    #[must_use]
    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_seconds)
    }

    /// Token lifetime.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }
}

fn check_ttl(field: &'static str, seconds: u64) -> Result<(), ConfigError> {
    if !(1..=MAX_TTL.as_secs()).contains(&seconds) {
        return Err(ConfigError::invalid(
            field,
            format!("must be between 1 and {}", MAX_TTL.as_secs()),
        ));
    }
    Ok(())
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("store_root", &self.store_root)
            .field("auth_secret", &"[REDACTED]")
            .field("challenge_ttl_seconds", &self.challenge_ttl_seconds)
            .field("challenge_length", &self.challenge_length)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("listen_address", &self.listen_address)
            .field("single_use_challenges", &self.single_use_challenges)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::io::Write as _;

    use rstest::rstest;

    use super::*;

    const MINIMAL: &str = r#"
StoreRoot = "/tmp/keygate"
AuthSecret = "s3cret"
ChallengeTTLSeconds = 30
ChallengeLength = 16
TokenTTLSeconds = 300
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.store_root, PathBuf::from("/tmp/keygate"));
        assert_eq!(config.auth_secret.as_str(), "s3cret");
        assert_eq!(config.challenge_ttl(), Duration::from_secs(30));
        assert_eq!(config.challenge_length, 16);
        assert_eq!(config.token_ttl(), Duration::from_secs(300));
        assert_eq!(config.listen_address, "0.0.0.0:8000".parse().unwrap());
        assert!(!config.single_use_challenges);
        assert_eq!(config.sweep_interval, None);
    }

    #[test]
    fn test_optional_keys() {
        let text = format!(
            "{MINIMAL}ListenAddress = \"127.0.0.1:9000\"\nSingleUseChallenges = true\nSweepInterval = \"90s\"\n"
        );
        let config = Config::from_toml_str(&text).unwrap();

        assert_eq!(config.listen_address, "127.0.0.1:9000".parse().unwrap());
        assert!(config.single_use_challenges);
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(90)));
    }

    #[rstest]
    #[case::missing_secret("AuthSecret")]
    #[case::missing_root("StoreRoot")]
    #[case::missing_token_ttl("TokenTTLSeconds")]
    fn test_missing_required_key_is_parse_error(#[case] key: &str) {
        let text: String =
            MINIMAL.lines().filter(|line| !line.starts_with(key)).map(|l| format!("{l}\n")).collect();
        assert!(matches!(Config::from_toml_str(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let text = format!("{MINIMAL}ChallengeTtl = 5\n");
        assert!(matches!(Config::from_toml_str(&text), Err(ConfigError::Parse(_))));
    }

    #[rstest]
    #[case::zero_challenge_ttl("ChallengeTTLSeconds = 30", "ChallengeTTLSeconds = 0", "ChallengeTTLSeconds")]
    #[case::zero_token_ttl("TokenTTLSeconds = 300", "TokenTTLSeconds = 0", "TokenTTLSeconds")]
    #[case::huge_challenge_ttl(
        "ChallengeTTLSeconds = 30",
        "ChallengeTTLSeconds = 100000000000000000",
        "ChallengeTTLSeconds"
    )]
    #[case::huge_token_ttl(
        "TokenTTLSeconds = 300",
        "TokenTTLSeconds = 9223372036854775807",
        "TokenTTLSeconds"
    )]
    #[case::zero_length("ChallengeLength = 16", "ChallengeLength = 0", "ChallengeLength")]
    #[case::huge_length("ChallengeLength = 16", "ChallengeLength = 65", "ChallengeLength")]
    #[case::empty_secret("AuthSecret = \"s3cret\"", "AuthSecret = \"\"", "AuthSecret")]
    #[case::empty_root("StoreRoot = \"/tmp/keygate\"", "StoreRoot = \"\"", "StoreRoot")]
    fn test_out_of_range_values_rejected(
        #[case] from: &str,
        #[case] to: &str,
        #[case] expected_field: &str,
    ) {
        let text = MINIMAL.replace(from, to);
        let result = Config::from_toml_str(&text);
        assert!(
            matches!(result, Err(ConfigError::Invalid { field, .. }) if field == expected_field),
            "got {result:?}"
        );
    }

    #[test]
    fn test_max_ttl_accepted() {
        let max = MAX_TTL.as_secs();
        let text = MINIMAL
            .replace("ChallengeTTLSeconds = 30", &format!("ChallengeTTLSeconds = {max}"))
            .replace("TokenTTLSeconds = 300", &format!("TokenTTLSeconds = {max}"));
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(config.challenge_ttl(), MAX_TTL);
        assert_eq!(config.token_ttl(), MAX_TTL);
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let text = format!("{MINIMAL}SweepInterval = \"0s\"\n");
        assert!(matches!(
            Config::from_toml_str(&text),
            Err(ConfigError::Invalid { field: "SweepInterval", .. })
        ));
    }

    #[test]
    fn test_missing_env_is_missing_error() {
        let err = Config::load_from(None).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { source: None, .. }));
        assert!(err.to_string().contains("CONFIG"));
    }

    #[test]
    fn test_unreadable_file_is_missing_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            Config::load_from(Some(path.into_os_string())),
            Err(ConfigError::Missing { source: Some(_), .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::load_from(Some(file.path().as_os_str().to_owned())).unwrap();
        assert_eq!(config.challenge_length, 16);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("s3cret"));
    }
}
