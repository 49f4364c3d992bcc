use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Configuration file name expected at the project root.
pub const CONFIG_FILE: &str = "Suitesync.toml";

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
///
/// [`FromStr`]: std::str::FromStr
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// General configuration.
#[derive(Deserialize)]
pub struct Config {
    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Diff the transpiled companion of a TypeScript source instead of the source itself.
    #[serde(default = "default_compare_transpiled")]
    pub compare_transpiled: bool,

    /// Require explicit confirmation before uploading to a production-like account.
    #[serde(default = "default_production_guard")]
    pub production_guard: bool,

    /// Name of the SuiteCloud CLI binary, resolved through `PATH`.
    #[serde(default = "default_suitecloud_binary")]
    pub suitecloud_binary: String,

    /// Name of the TypeScript compiler binary, resolved through `PATH`.
    #[serde(default = "default_tsc_binary")]
    pub tsc_binary: String,
}

fn default_compare_transpiled() -> bool {
    true
}

fn default_production_guard() -> bool {
    true
}

fn default_suitecloud_binary() -> String {
    String::from("suitecloud")
}

fn default_tsc_binary() -> String {
    String::from("tsc")
}

impl Config {
    /// Create new config using the configuration file at the provided
    /// project root merged with environment variables.
    ///
    /// Nested fields use a double underscore as the level separator, so the
    /// logging level is `SUITESYNC_LOGGING__LEVEL` while flat snake_case
    /// fields keep their single underscores (`SUITESYNC_PRODUCTION_GUARD`).
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new(project_root: Option<&Path>) -> Result<Self, figment::Error> {
        let config_file = project_root
            .map(|root| root.join(CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

        Figment::new()
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("SUITESYNC_").split("__"))
            .extract()
    }

    /// Create new config suitable for running unit tests.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        Self {
            #[cfg(feature = "logging")]
            logging: Logging::default(),
            compare_transpiled: true,
            production_guard: true,
            suitecloud_binary: default_suitecloud_binary(),
            tsc_binary: default_tsc_binary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_flat_and_nested_fields() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SUITESYNC_PRODUCTION_GUARD", "false");
            jail.set_env("SUITESYNC_LOGGING__LEVEL", "debug");

            let config = Config::new(None)?;

            assert!(!config.production_guard);
            assert!(config.compare_transpiled);

            #[cfg(feature = "logging")]
            assert_eq!(config.logging.level, LevelFilter::DEBUG);

            Ok(())
        });
    }
}
