use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use strum::{Display, EnumString};

use crate::domain::jobs::{MappingPolicy, DEFAULT_CHUNK_SIZE};
use crate::domain::search::ScorerConfig;
use crate::domain::services::MappingSettings;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub search: SearchSettings,
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub host: String,
    /// Origin allowed by CORS. Unset allows any origin.
    #[serde(default)]
    pub app_url: Option<String>,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct SearchSettings {
    pub solr_url: String,
    pub core: String,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub timeout_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub max_results: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub boost: f64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub auto_accept_threshold: f64,
    #[serde(default = "default_chunk_size")]
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub load_chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn mapping_settings(&self) -> MappingSettings {
        MappingSettings {
            scorer: ScorerConfig {
                boost: self.boost,
                max_results: self.max_results,
            },
            policy: MappingPolicy {
                auto_accept_threshold: self.auto_accept_threshold,
            },
            load_chunk_size: Some(self.load_chunk_size),
        }
    }
}

pub fn read_config() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no working directory: {}", e)))?;
    let config_directory = base_path.join("config");

    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".into());
    let environment = Environment::from_str(&environment).map_err(|_| {
        config::ConfigError::Message(format!("unknown APP_ENVIRONMENT '{}'", environment))
    })?;
    let environment_filename = format!("{}.yaml", environment);

    let settings = config::Config::builder()
        .add_source(config::File::from(config_directory.join("base.yaml")))
        .add_source(config::File::from(
            config_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("USAGI")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[derive(Display, Debug, EnumString, PartialEq)]
pub enum Environment {
    #[strum(ascii_case_insensitive, serialize = "local")]
    Local,
    #[strum(ascii_case_insensitive, serialize = "production")]
    Production,
}
