use anyhow::{Context, Result};
use clap::{Arg, Command};
use playback_core::{ConfigManager, ControllerConfig, EnvConfigOverride};
use std::path::PathBuf;

use crate::scenarios::Scenario;

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: Option<PathBuf>,
    pub scenarios: Vec<Scenario>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn command() -> Command {
        Command::new("Playback Simulator")
            .version("1.0")
            .author("Video Streaming Team")
            .about("Drives the playback controller through scripted fault scenarios")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Controller configuration file (created with defaults if missing)")
                    .required(false),
            )
            .arg(
                Arg::new("scenario")
                    .short('s')
                    .long("scenario")
                    .value_name("NAME")
                    .help("Scenario to run, or \"all\"")
                    .default_value("all"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level when RUST_LOG is not set")
                    .required(false),
            )
    }

    pub fn load() -> Result<Self> {
        Self::from_args(std::env::args_os())
    }

    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;

        let scenarios = match matches
            .get_one::<String>("scenario")
            .map(String::as_str)
            .unwrap_or("all")
        {
            "all" => Scenario::ALL.to_vec(),
            name => vec![name.parse::<Scenario>().map_err(anyhow::Error::msg)?],
        };

        Ok(Self {
            config_path: matches.get_one::<String>("config").map(PathBuf::from),
            scenarios,
            log_level: matches.get_one::<String>("log-level").cloned(),
        })
    }

    /// Controller configuration: file (if given), then `PLAYBACK_*` overrides.
    pub async fn controller_config(&self) -> Result<ControllerConfig> {
        let mut config = match &self.config_path {
            Some(path) => {
                let mut manager = ConfigManager::new(path);
                manager
                    .load()
                    .await
                    .with_context(|| format!("loading {}", path.display()))?;
                manager.into_config()
            }
            None => ControllerConfig::default(),
        };

        EnvConfigOverride::apply_overrides(&mut config);
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        config.validate()?;

        Ok(config)
    }
}
