#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod preferences;
mod time_range;

use app_config::AppConfig;
pub use app_config::{
    get_config_dir,
    get_data_dir,
};
pub use args::{
    version,
    Args,
};
use color_eyre::Result;
use eyre::Context as _;
pub use preferences::{
    PreferenceField,
    Preferences,
    PreferencesStore,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    path::Path,
    time::Duration,
};
pub use time_range::{
    ChartTheme,
    MetricKind,
    TimeRange,
};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    app_config: AppConfig,
    pub api_url: Url,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default, skip_serializing)]
    pub verbose: bool,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        let mut config: Self = serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config");
        config.app_config = AppConfig {
            data_dir: get_data_dir(),
            config_dir: get_config_dir(),
        };
        config
    }
}

impl Config {
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?;

        builder = builder.add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let config_files = [("config.yaml", config::FileFormat::Yaml)];

        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;

        Ok(cfg)
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.app_config.config_dir
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.app_config.config_dir).context("Failed to create config directory")?;
        let path = self.app_config.config_dir.join("config.yaml");
        let content = serde_yml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(&path, content).wrap_err_with(|| format!("Failed to write config to {:?}", path))
    }

    /// Updates the configuration based on optional command-line arguments.
    /// Saves the configuration if any changes were made.
    ///
    /// # Errors
    /// Returns an error if saving the updated configuration fails.
    #[instrument(level = "debug", skip(self, args))]
    pub fn update_from_args(&mut self, args: &Args) -> Result<()> {
        let mut changed = false;
        if let Some(api_url) = &args.api_url {
            let api_url = Url::parse(api_url).wrap_err_with(|| format!("Invalid API URL {api_url:?}"))?;
            if self.api_url != api_url {
                info!(old = %self.api_url, new = %api_url, "Updating API URL from args");
                self.api_url = api_url;
                changed = true;
            }
        }

        if let Some(timeout) = args.request_timeout_secs {
            if self.request_timeout_secs != timeout {
                info!(old = %self.request_timeout_secs, new = %timeout, "Updating request timeout from args");
                self.request_timeout_secs = timeout;
                changed = true;
            }
        }

        if changed {
            debug!("Configuration updated from command-line arguments, saving...");
            self.save()?;
        } else {
            debug!("No configuration changes from command-line arguments.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_parses() {
        let config = Config::default();
        assert_eq!(config.api_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn args_override_defaults() {
        let args = Args {
            api_url: Some("https://perf.example.com".to_string()),
            request_timeout_secs: Some(5),
            verbose: true,
        };
        let config = Config::new(args).unwrap();
        assert_eq!(config.api_url.as_str(), "https://perf.example.com/");
        assert_eq!(config.request_timeout_secs, 5);
        assert!(config.verbose);
    }
}
