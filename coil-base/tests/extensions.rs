use std::fs;
use std::sync::{Arc, Mutex};

use coil::{
    Container, ContainerCallback, ContainerError, ContainerFactory, Definition,
    ExtendableContainerFactory, Object, ObjectCallback, ObjectContext, ObjectPostWrapper, StdError,
};
use coil_base::{
    Config, ExtensionCatalog, ExtensionKind, ExtensionLoader, ExtensionsConfig,
    LoadExtensionError, ManifestFile,
};
use tempfile::NamedTempFile;

struct Suffix {
    suffix: &'static str,
    priority: i32,
}

impl ObjectCallback for Suffix {
    fn after_wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError> {
        match ctx.downcast_ref::<String>() {
            Some(v) => Ok(Arc::new(format!("{v}{}", self.suffix))),
            None => Ok(ctx.object().clone()),
        }
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

struct Period {
    priority: i32,
}

impl ObjectPostWrapper for Period {
    fn wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError> {
        match ctx.downcast_ref::<String>() {
            Some(v) => Ok(Arc::new(format!("{v}."))),
            None => Ok(ctx.object().clone()),
        }
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

struct Double;

impl ObjectPostWrapper for Double {
    fn wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError> {
        match ctx.downcast_ref::<i32>() {
            Some(v) => Ok(Arc::new(v * 2)),
            None => Ok(ctx.object().clone()),
        }
    }
}

struct Audit {
    log: Arc<Mutex<Vec<String>>>,
}

impl ContainerCallback for Audit {
    fn after_container_init(&self, container: &Container) -> Result<(), StdError> {
        self.log
            .lock()
            .unwrap()
            .extend(container.get_object_ids());
        Ok(())
    }
}

fn catalog(log: Arc<Mutex<Vec<String>>>) -> ExtensionCatalog {
    let mut catalog = ExtensionCatalog::new();
    catalog
        .add_object_callback("exclaim", || {
            Ok(Suffix {
                suffix: "!",
                priority: 2,
            })
        })
        .add_object_callback("greet", || {
            Ok(Suffix {
                suffix: " hi",
                priority: 1,
            })
        })
        .add_object_callback("broken", || -> Result<Suffix, StdError> {
            Err("missing credentials".into())
        })
        .add_container_callback("audit", move || Ok(Audit { log: log.clone() }))
        .add_post_wrapper("period", || Ok(Period { priority: -5 }))
        .add_post_wrapper("double", || Ok(Double))
        // Kinds have separate namespaces.
        .add_post_wrapper("greet", || Ok(Period { priority: 1 }));
    catalog
}

fn init_container(container: &Container) -> Result<(), ContainerError> {
    container.register("greeting", Definition::new(|_| Ok("hello".to_string())))?;
    container.register("answer", Definition::new(|_| Ok(42i32)))?;
    Ok(())
}

fn manifest_file(text: &str) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    fs::write(file.path(), text).unwrap();
    file
}

#[tokio::test]
async fn test_load_extensions_from_files() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let base = manifest_file(r#"{"extensions": {"object_callbacks": ["exclaim"]}}"#);
    let local = manifest_file(
        r#"{"extensions": {"object_callbacks": ["greet"], "container_callbacks": ["audit"]}}"#,
    );

    let loader = ExtensionLoader::new(catalog(log.clone()))
        .with_source(ManifestFile::new(base.path()))
        .with_source(ManifestFile::new(local.path()));
    let manifest = loader.manifest().await.unwrap();
    assert_eq!(
        manifest,
        ExtensionsConfig {
            container_callbacks: vec!["audit".into()],
            object_callbacks: vec!["exclaim".into(), "greet".into()],
            post_wrappers: Vec::new(),
        }
    );

    let extensions = loader.load().await.unwrap();
    assert_eq!(extensions.container_callbacks().len(), 1);
    assert_eq!(extensions.object_callbacks().len(), 2);

    let container = ExtendableContainerFactory::new(init_container, extensions)
        .create()
        .unwrap();
    // Callbacks run by priority, not by manifest order.
    assert_eq!(container.get::<String>().unwrap().as_str(), "hello hi!");
    assert_eq!(*container.get::<i32>().unwrap(), 42);
    assert_eq!(*log.lock().unwrap(), vec!["answer", "greeting"]);
}

#[tokio::test]
async fn test_load_post_wrappers() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manifest = manifest_file(
        r#"{"extensions": {"object_callbacks": ["exclaim", "greet"], "post_wrappers": ["double", "period"]}}"#,
    );
    let loader = ExtensionLoader::new(catalog(log))
        .with_source(ManifestFile::new(manifest.path()));
    assert_eq!(
        loader.manifest().await.unwrap().post_wrappers,
        vec!["double", "period"]
    );

    let extensions = loader.load().await.unwrap();
    assert_eq!(extensions.object_callbacks().len(), 2);
    assert_eq!(extensions.post_wrappers().len(), 2);

    let container = ExtendableContainerFactory::new(init_container, extensions)
        .create()
        .unwrap();
    // Post wrappers run after every object callback, whatever their priority.
    assert_eq!(container.get::<String>().unwrap().as_str(), "hello hi!.");
    assert_eq!(*container.get::<i32>().unwrap(), 84);
}

#[tokio::test]
async fn test_load_unknown_post_wrapper() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manifest = Config::parse(r#"{"extensions": {"post_wrappers": ["exclaim"]}}"#).unwrap();
    let result = ExtensionLoader::new(catalog(log))
        .with_source(manifest)
        .load()
        .await;
    assert!(matches!(
        result,
        Err(LoadExtensionError::UnknownExtension {
            kind: ExtensionKind::PostWrapper,
            name,
        }) if name == "exclaim"
    ));
}

#[test]
fn test_catalog_namespaces() {
    let catalog = catalog(Arc::new(Mutex::new(Vec::new())));
    assert!(catalog.contains(ExtensionKind::ObjectCallback, "greet"));
    assert!(catalog.contains(ExtensionKind::PostWrapper, "greet"));
    assert!(!catalog.contains(ExtensionKind::ContainerCallback, "greet"));
    assert!(catalog.contains(ExtensionKind::ContainerCallback, "audit"));
}

#[tokio::test]
async fn test_load_extensions_deduplicates_names() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manifest = Config::parse(r#"{"extensions": {"object_callbacks": ["greet", "greet"]}}"#)
        .unwrap();
    let extensions = ExtensionLoader::new(catalog(log))
        .with_source(manifest.clone())
        .with_source(manifest)
        .load()
        .await
        .unwrap();
    assert_eq!(extensions.object_callbacks().len(), 1);

    let container = ExtendableContainerFactory::new(init_container, extensions)
        .create()
        .unwrap();
    assert_eq!(container.get::<String>().unwrap().as_str(), "hello hi");
}

#[tokio::test]
async fn test_load_extensions_without_manifest() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let extensions = ExtensionLoader::new(catalog(log.clone()))
        .with_source(Config::new())
        .load()
        .await
        .unwrap();
    assert!(extensions.is_empty());

    let extensions = ExtensionLoader::new(catalog(log)).load().await.unwrap();
    assert!(extensions.is_empty());
}

#[tokio::test]
async fn test_load_unknown_extension() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manifest =
        Config::parse(r#"{"extensions": {"container_callbacks": ["exclaim"]}}"#).unwrap();
    let result = ExtensionLoader::new(catalog(log))
        .with_source(manifest)
        .load()
        .await;
    assert!(matches!(
        result,
        Err(LoadExtensionError::UnknownExtension {
            kind: ExtensionKind::ContainerCallback,
            name,
        }) if name == "exclaim"
    ));
}

#[tokio::test]
async fn test_load_broken_extension() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manifest = Config::parse(r#"{"extensions": {"object_callbacks": ["broken"]}}"#).unwrap();
    let error = ExtensionLoader::new(catalog(log))
        .with_source(manifest)
        .load()
        .await
        .err()
        .unwrap();
    assert!(matches!(
        &error,
        LoadExtensionError::Construct { kind: ExtensionKind::ObjectCallback, name, .. } if name == "broken"
    ));
    assert!(error.to_string().contains("missing credentials"));
}

#[tokio::test]
async fn test_load_missing_manifest_file() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let result = ExtensionLoader::new(catalog(log))
        .with_source(ManifestFile::new("nonexistent_manifest.json"))
        .load()
        .await;
    assert!(matches!(result, Err(LoadExtensionError::Manifest { .. })));
}

#[tokio::test]
async fn test_load_invalid_manifest() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manifest = Config::parse(r#"{"extensions": {"object_callbacks": "greet"}}"#).unwrap();
    let result = ExtensionLoader::new(catalog(log))
        .with_source(manifest)
        .load()
        .await;
    assert!(matches!(result, Err(LoadExtensionError::InvalidManifest(_))));
}

#[test]
#[should_panic(expected = "already added")]
fn test_catalog_duplicate_name() {
    let mut catalog = ExtensionCatalog::new();
    catalog.add_object_callback("greet", || {
        Ok(Suffix {
            suffix: "",
            priority: 1,
        })
    });
    catalog.add_object_callback("greet", || {
        Ok(Suffix {
            suffix: "",
            priority: 1,
        })
    });
}
