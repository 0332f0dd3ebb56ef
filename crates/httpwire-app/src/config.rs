use std::path::PathBuf;

use anyhow::Context;
use clap::ArgMatches;
use httpwire::config::Limits;
use serde::Deserialize;

/// Contents of the `--config` file.
///
/// ```toml
/// [limits]
/// max_body_length = 1048576
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub limits: Limits,
}

impl AppConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(arg_matches: &ArgMatches) -> anyhow::Result<Self> {
        match arg_matches.get_one::<PathBuf>("config") {
            Some(path) => {
                tracing::debug!(?path, "loading config");

                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {:?}", path))?;

                Self::parse(&text).with_context(|| format!("invalid config file {:?}", path))
            }
            None => Ok(Self::default()),
        }
    }
}
