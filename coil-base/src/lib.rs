//! # coil-base
//!
//! Supporting pieces for applications built on the [`coil`] registry:
//! JSON configuration, tracing setup and extensions loaded from manifests.
//!
//! ## Configuration
//!
//! ```rust
//! use coil_base::{Config, ConfigSection};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct DatabaseConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl ConfigSection for DatabaseConfig {
//!     fn key() -> &'static str {
//!         "database"
//!     }
//! }
//!
//! let config = Config::parse(r#"{"database": {"host": "localhost", "port": 5432}}"#).unwrap();
//! let database = config.section::<DatabaseConfig>().unwrap();
//! assert_eq!(database.port, 5432);
//! ```
//!
//! ## Extensions
//!
//! ```rust
//! use coil::{Container, ContainerError, ContainerFactory, Definition, ExtendableContainerFactory};
//! use coil::{Object, ObjectCallback, ObjectContext, StdError};
//! use coil_base::{Config, ExtensionCatalog, ExtensionLoader};
//! use std::sync::Arc;
//!
//! struct Exclaim;
//!
//! impl ObjectCallback for Exclaim {
//!     fn after_wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError> {
//!         match ctx.downcast_ref::<String>() {
//!             Some(v) => Ok(Arc::new(format!("{v}!"))),
//!             None => Ok(ctx.object().clone()),
//!         }
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut catalog = ExtensionCatalog::new();
//! catalog.add_object_callback("exclaim", || Ok(Exclaim));
//!
//! let manifest = Config::parse(r#"{"extensions": {"object_callbacks": ["exclaim"]}}"#).unwrap();
//! let extensions = ExtensionLoader::new(catalog)
//!     .with_source(manifest)
//!     .load()
//!     .await
//!     .unwrap();
//!
//! let factory = ExtendableContainerFactory::new(
//!     |container: &Container| -> Result<(), ContainerError> {
//!         container.register("greeting", Definition::new(|_| Ok("hello".to_string())))
//!     },
//!     extensions,
//! );
//! let container = factory.create().unwrap();
//! assert_eq!(container.get::<String>().unwrap().as_str(), "hello!");
//! # }
//! ```
//!
//! ## Features
//!
//! - `macros` (default): Enables the `config_section` attribute macro

mod config;
mod extension;
mod tracing;

pub use config::*;
pub use extension::*;
pub use tracing::*;

#[cfg(feature = "macros")]
pub use coil_base_macros::*;

pub use async_trait::async_trait;
