use clap::Args as ClapArgs;

/// Connection settings that can override the stored configuration.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct Args {
    /// Base URL of the dashboard API, e.g. `https://perf.example.com`.
    #[clap(long, global = true, value_name = "URL", env = "PERFDASH_API_URL")]
    pub api_url: Option<String>,

    /// HTTP request timeout in seconds.
    #[clap(long = "timeout", global = true, value_name = "SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Log debug output to stderr.
    #[clap(long, short, global = true, action)]
    pub verbose: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(api_url) = &self.api_url {
                cache.insert("api_url".to_string(), api_url.clone().into());
            }
            if let Some(timeout) = self.request_timeout_secs {
                cache.insert("request_timeout_secs".to_string(), timeout.into());
            }
            if self.verbose {
                cache.insert("verbose".to_string(), true.into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "{}

Config directory: {config_dir_path}
Data directory: {data_dir_path}",
        env!("CARGO_PKG_VERSION")
    )
}
