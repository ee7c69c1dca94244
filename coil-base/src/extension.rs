use std::collections::{HashMap, HashSet, hash_map};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use coil::{ContainerCallback, Extensions, ObjectCallback, ObjectPostWrapper, StdError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Config, ConfigSection};

/// Errors that can occur while loading extensions.
#[derive(Debug, Error)]
pub enum LoadExtensionError {
    /// A manifest file could not be read or parsed.
    #[error("Cannot load extension manifest {}: {source}", path.display())]
    Manifest { path: PathBuf, source: StdError },
    /// The merged manifests do not form a valid `extensions` section.
    #[error("Invalid extension manifest: {0}")]
    InvalidManifest(#[source] StdError),
    /// A manifest names an extension missing from the catalog.
    #[error("Unknown {kind} {name:?}")]
    UnknownExtension { kind: ExtensionKind, name: String },
    /// The catalog constructor of an extension failed.
    #[error("Cannot construct {kind} {name:?}: {source}")]
    Construct {
        kind: ExtensionKind,
        name: String,
        source: StdError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtensionKind {
    ContainerCallback,
    ObjectCallback,
    PostWrapper,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionKind::ContainerCallback => write!(f, "container callback"),
            ExtensionKind::ObjectCallback => write!(f, "object callback"),
            ExtensionKind::PostWrapper => write!(f, "post wrapper"),
        }
    }
}

/// The `extensions` config section: names of the extensions to enable.
///
/// ```json
/// {
///     "extensions": {
///         "container_callbacks": ["audit"],
///         "object_callbacks": ["metrics", "logging"],
///         "post_wrappers": ["retry"]
///     }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionsConfig {
    #[serde(default)]
    pub container_callbacks: Vec<String>,
    #[serde(default)]
    pub object_callbacks: Vec<String>,
    #[serde(default)]
    pub post_wrappers: Vec<String>,
}

impl ConfigSection for ExtensionsConfig {
    fn key() -> &'static str {
        "extensions"
    }
}

type Constructor<T> = Box<dyn Fn() -> Result<Arc<T>, StdError> + Send + Sync>;

/// Named constructors for every extension a manifest may enable.
///
/// Each kind has its own namespace, so a container callback and an object
/// callback may share a name.
#[derive(Default)]
pub struct ExtensionCatalog {
    container_callbacks: HashMap<String, Constructor<dyn ContainerCallback>>,
    object_callbacks: HashMap<String, Constructor<dyn ObjectCallback>>,
    post_wrappers: HashMap<String, Constructor<dyn ObjectPostWrapper>>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a container callback constructor under `name`.
    ///
    /// # Panics
    ///
    /// Panics if a container callback with the same name has already been added.
    pub fn add_container_callback<C, F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        C: ContainerCallback + 'static,
        F: Fn() -> Result<C, StdError> + Send + Sync + 'static,
    {
        insert(
            &mut self.container_callbacks,
            ExtensionKind::ContainerCallback,
            name.into(),
            Box::new(move || -> Result<Arc<dyn ContainerCallback>, StdError> {
                Ok(Arc::new(constructor()?))
            }),
        );
        self
    }

    /// Adds an object callback constructor under `name`.
    ///
    /// # Panics
    ///
    /// Panics if an object callback with the same name has already been added.
    pub fn add_object_callback<C, F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        C: ObjectCallback + 'static,
        F: Fn() -> Result<C, StdError> + Send + Sync + 'static,
    {
        insert(
            &mut self.object_callbacks,
            ExtensionKind::ObjectCallback,
            name.into(),
            Box::new(move || -> Result<Arc<dyn ObjectCallback>, StdError> {
                Ok(Arc::new(constructor()?))
            }),
        );
        self
    }

    /// Adds a post wrapper constructor under `name`.
    ///
    /// # Panics
    ///
    /// Panics if a post wrapper with the same name has already been added.
    pub fn add_post_wrapper<W, F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        W: ObjectPostWrapper + 'static,
        F: Fn() -> Result<W, StdError> + Send + Sync + 'static,
    {
        insert(
            &mut self.post_wrappers,
            ExtensionKind::PostWrapper,
            name.into(),
            Box::new(move || -> Result<Arc<dyn ObjectPostWrapper>, StdError> {
                Ok(Arc::new(constructor()?))
            }),
        );
        self
    }

    pub fn contains(&self, kind: ExtensionKind, name: &str) -> bool {
        match kind {
            ExtensionKind::ContainerCallback => self.container_callbacks.contains_key(name),
            ExtensionKind::ObjectCallback => self.object_callbacks.contains_key(name),
            ExtensionKind::PostWrapper => self.post_wrappers.contains_key(name),
        }
    }
}

fn insert<T: ?Sized>(
    table: &mut HashMap<String, Constructor<T>>,
    kind: ExtensionKind,
    name: String,
    constructor: Constructor<T>,
) {
    match table.entry(name) {
        hash_map::Entry::Occupied(v) => panic!("{kind} {} already added", v.key()),
        hash_map::Entry::Vacant(v) => {
            v.insert(constructor);
        }
    }
}

fn construct<T: ?Sized>(
    table: &HashMap<String, Constructor<T>>,
    kind: ExtensionKind,
    name: &str,
) -> Result<Arc<T>, LoadExtensionError> {
    let constructor = table
        .get(name)
        .ok_or_else(|| LoadExtensionError::UnknownExtension {
            kind,
            name: name.to_owned(),
        })?;
    constructor().map_err(|source| LoadExtensionError::Construct {
        kind,
        name: name.to_owned(),
        source,
    })
}

/// Provider of an extension manifest.
#[async_trait]
pub trait ExtensionSource: Send + Sync {
    async fn load_manifest(&self) -> Result<Config, LoadExtensionError>;
}

/// Manifest stored in a JSON file.
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExtensionSource for ManifestFile {
    async fn load_manifest(&self) -> Result<Config, LoadExtensionError> {
        Config::parse_file(&self.path)
            .await
            .map_err(|source| LoadExtensionError::Manifest {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl ExtensionSource for Config {
    async fn load_manifest(&self) -> Result<Config, LoadExtensionError> {
        Ok(self.clone())
    }
}

/// Builds [`Extensions`] from manifests and a catalog.
///
/// Manifests from all sources are merged in the order the sources were
/// added, so their extension lists are concatenated. A name listed more
/// than once is constructed once. Ordering by priority is left to the
/// container factory that receives the extensions.
pub struct ExtensionLoader {
    catalog: ExtensionCatalog,
    sources: Vec<Box<dyn ExtensionSource>>,
}

impl ExtensionLoader {
    pub fn new(catalog: ExtensionCatalog) -> Self {
        Self {
            catalog,
            sources: Vec::new(),
        }
    }

    pub fn add_source<S>(&mut self, source: S) -> &mut Self
    where
        S: ExtensionSource + 'static,
    {
        self.sources.push(Box::new(source));
        self
    }

    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: ExtensionSource + 'static,
    {
        self.add_source(source);
        self
    }

    /// Reads the merged `extensions` section of all sources.
    pub async fn manifest(&self) -> Result<ExtensionsConfig, LoadExtensionError> {
        let mut config = Config::new();
        for source in &self.sources {
            config
                .merge_from(source.load_manifest().await?)
                .map_err(LoadExtensionError::InvalidManifest)?;
        }
        let manifest = config
            .section::<Option<ExtensionsConfig>>()
            .map_err(LoadExtensionError::InvalidManifest)?;
        Ok(manifest.unwrap_or_default())
    }

    /// Constructs every extension named by the merged manifest.
    pub async fn load(&self) -> Result<Extensions, LoadExtensionError> {
        let manifest = self.manifest().await?;
        let mut extensions = Extensions::new();
        let catalog = &self.catalog;
        for name in unique(&manifest.container_callbacks) {
            extensions.add_shared_container_callback(construct(
                &catalog.container_callbacks,
                ExtensionKind::ContainerCallback,
                name,
            )?);
        }
        for name in unique(&manifest.object_callbacks) {
            extensions.add_shared_object_callback(construct(
                &catalog.object_callbacks,
                ExtensionKind::ObjectCallback,
                name,
            )?);
        }
        for name in unique(&manifest.post_wrappers) {
            extensions.add_shared_post_wrapper(construct(
                &catalog.post_wrappers,
                ExtensionKind::PostWrapper,
                name,
            )?);
        }
        tracing::debug!(
            container_callbacks = extensions.container_callbacks().len(),
            object_callbacks = extensions.object_callbacks().len(),
            post_wrappers = extensions.post_wrappers().len(),
            "Extensions loaded"
        );
        Ok(extensions)
    }
}

fn unique(names: &[String]) -> impl Iterator<Item = &str> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(String::as_str)
        .filter(move |v| seen.insert(*v))
}
