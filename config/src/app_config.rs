use directories::ProjectDirs;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize, Default)]
pub(super) struct AppConfig {
    #[serde(default)]
    pub(super) data_dir: PathBuf,
    #[serde(default)]
    pub(super) config_dir: PathBuf,
}

/// The two places perfdash keeps files in.
#[derive(Clone, Copy)]
enum Location {
    /// Session blob and log file.
    Data,
    /// `config.yaml` and `preferences.yaml`.
    Config,
}

impl Location {
    fn env_var(self) -> &'static str {
        match self {
            Location::Data => "PERFDASH_DATA",
            Location::Config => "PERFDASH_CONFIG",
        }
    }

    fn resolve(self) -> PathBuf {
        let overridden = match self {
            Location::Data => DATA_OVERRIDE.clone(),
            Location::Config => CONFIG_OVERRIDE.clone(),
        };
        overridden
            .or_else(|| {
                let dirs = ProjectDirs::from("dev", "perf-dashboard", "perfdash")?;
                Some(match self {
                    Location::Data => dirs.data_local_dir().to_path_buf(),
                    Location::Config => dirs.config_local_dir().to_path_buf(),
                })
            })
            .unwrap_or_else(|| match self {
                Location::Data => PathBuf::from(".data"),
                Location::Config => PathBuf::from(".config"),
            })
    }
}

lazy_static::lazy_static! {
    static ref DATA_OVERRIDE: Option<PathBuf> = std::env::var_os(Location::Data.env_var()).map(PathBuf::from);
    static ref CONFIG_OVERRIDE: Option<PathBuf> = std::env::var_os(Location::Config.env_var()).map(PathBuf::from);
}

pub fn get_data_dir() -> PathBuf {
    Location::Data.resolve()
}

pub fn get_config_dir() -> PathBuf {
    Location::Config.resolve()
}
