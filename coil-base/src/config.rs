use std::collections::BTreeMap;
use std::path::Path;

use coil::StdError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// JSON document made of named sections.
///
/// Several documents can be layered with [`merge_from`](Self::merge_from):
/// this is how extension manifests and per-environment files are combined.
/// Missing sections read as `null`, so optional sections can be read as
/// `Option<T>`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    sections: BTreeMap<String, Value>,
}

/// Config section with a well-known key.
pub trait ConfigSection: DeserializeOwned {
    fn key() -> &'static str;
}

impl<T> ConfigSection for Option<T>
where
    T: ConfigSection,
{
    fn key() -> &'static str {
        T::key()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserializes the section stored under `key`.
    pub fn get<T>(&self, key: impl AsRef<str>) -> Result<T, StdError>
    where
        T: DeserializeOwned,
    {
        let value = match self.sections.get(key.as_ref()) {
            Some(v) => T::deserialize(v)?,
            None => T::deserialize(&Value::Null)?,
        };
        Ok(value)
    }

    /// Reads the section stored under `T::key()`.
    pub fn section<T>(&self) -> Result<T, StdError>
    where
        T: ConfigSection,
    {
        self.get(T::key())
    }

    pub fn set<T>(&mut self, key: impl Into<String>, value: T) -> Result<(), StdError>
    where
        T: Serialize,
    {
        self.sections.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    ///
    /// # Panics
    ///
    /// Panics if `value` cannot be represented as JSON.
    pub fn with<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Serialize,
    {
        if let Err(err) = self.set(key, value) {
            panic!("Cannot serialize config section: {err}");
        }
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sections.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Layers `other` on top of this config.
    ///
    /// Objects are merged key by key, arrays are concatenated and any other
    /// value from `other` replaces the current one.
    pub fn merge_from(&mut self, other: Self) -> Result<(), StdError> {
        for (key, value) in other.sections {
            match self.sections.get_mut(&key) {
                Some(current) => merge_value(current, value),
                None => {
                    self.sections.insert(key, value);
                }
            }
        }
        Ok(())
    }

    pub fn parse(text: impl AsRef<str>) -> Result<Self, StdError> {
        Ok(serde_json::from_str(text.as_ref())?)
    }

    pub async fn parse_file(path: impl AsRef<Path>) -> Result<Self, StdError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        tracing::debug!(path = %path.display(), "Config file read");
        Self::parse(text)
    }

    /// Parses every file in order and layers each one on top of the previous.
    pub async fn load_files<I>(paths: I) -> Result<Self, StdError>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        let mut config = Self::new();
        for path in paths {
            config.merge_from(Self::parse_file(path).await?)?;
        }
        Ok(config)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }
}

fn merge_value(current: &mut Value, value: Value) {
    match (current, value) {
        (Value::Object(current), Value::Object(value)) => {
            for (key, value) in value {
                match current.get_mut(&key) {
                    Some(v) => merge_value(v, value),
                    None => {
                        current.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(current), Value::Array(value)) => current.extend(value),
        (current, value) => *current = value,
    }
}
