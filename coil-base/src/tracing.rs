use std::str::FromStr as _;

use coil::StdError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::{Config, ConfigSection};

/// Process-wide tracing setup.
pub struct Tracing;

impl Tracing {
    /// Installs the global subscriber described by `config`.
    ///
    /// Fails if a directive cannot be parsed or a global subscriber is
    /// already installed.
    pub fn init(config: &TracingConfig) -> Result<(), StdError> {
        let mut directives = Vec::new();
        for directive in &config.directives {
            directives.push(directive.parse::<Directive>()?);
        }
        tracing_subscriber::registry()
            .with(new_env_filter(&directives, config.level))
            .with(tracing_subscriber::fmt::Layer::default())
            .try_init()?;
        Ok(())
    }

    /// Installs the subscriber described by the `tracing` section of `config`.
    ///
    /// Does nothing if the section is missing.
    pub fn init_from(config: &Config) -> Result<(), StdError> {
        match config.section::<Option<TracingConfig>>()? {
            Some(v) => Self::init(&v),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(
        serialize_with = "serialize_level",
        deserialize_with = "deserialize_level",
        default = "default_level"
    )]
    pub level: tracing::Level,
    #[serde(default)]
    pub directives: Vec<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directives: Default::default(),
        }
    }
}

impl ConfigSection for TracingConfig {
    fn key() -> &'static str {
        "tracing"
    }
}

fn new_env_filter(directives: &[Directive], level: tracing::Level) -> EnvFilter {
    let mut filter = EnvFilter::default();
    for directive in directives {
        filter = filter.add_directive(directive.clone());
    }
    filter.add_directive(level.into())
}

fn serialize_level<S>(v: &tracing::Level, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(v.as_str())
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<tracing::Level, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    String::deserialize(deserializer)
        .and_then(|v| tracing::Level::from_str(&v).map_err(|v| Error::custom(format!("{v}"))))
}

fn default_level() -> tracing::Level {
    tracing::Level::DEBUG
}
