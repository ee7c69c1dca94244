//! # coil
//!
//! A lazy object registry: objects are described by definitions, wired
//! together by id or by type, built on first use and cached as singletons.
//!
//! ## Core Concepts
//!
//! - **Container**: Registry of definitions and the singletons built from them
//! - **ObjectDefinition**: Recipe for one object: declared type, dependencies,
//!   factory, init hook and wrap hook
//! - **Dependency**: Reference to another object, by id or by declared type
//! - **ObjectType**: Declared type plus the capabilities it can be looked up by
//! - **Extensions**: Callbacks and wrappers that observe or transform objects
//!   as they are built, applied by a container factory
//!
//! ## Basic Usage
//!
//! ```rust
//! use coil::{Container, ContainerError, Definition, Dependency};
//!
//! let container = Container::new();
//! container.register("port", Definition::new(|_| Ok(5432u16)))?;
//! container.register(
//!     "url",
//!     Definition::new(|args| Ok(format!("postgresql://localhost:{}", args.get::<u16>(0)?)))
//!         .depends_on(Dependency::of::<u16>()),
//! )?;
//!
//! let url = container.get_by_id::<String>("url")?;
//! assert_eq!(url.as_str(), "postgresql://localhost:5432");
//!
//! assert!(matches!(
//!     container.register("port", Definition::new(|_| Ok(0u16))),
//!     Err(ContainerError::IdDuplicated(_))
//! ));
//! # Ok::<(), ContainerError>(())
//! ```
//!
//! ## Extensions
//!
//! ```rust
//! use coil::{
//!     Container, ContainerError, ContainerFactory, Definition, PostWrapperContainerFactory,
//!     wrapper_fn,
//! };
//! use std::sync::Arc;
//!
//! let factory = PostWrapperContainerFactory::new(|| -> Result<Container, ContainerError> {
//!     let container = Container::new();
//!     container.register("answer", Definition::new(|_| Ok(41i32)))?;
//!     Ok(container)
//! })
//! .with_wrapper(wrapper_fn(1, |ctx| match ctx.downcast_ref::<i32>() {
//!     Some(v) => Ok(Arc::new(v + 1)),
//!     None => Ok(ctx.object().clone()),
//! }));
//!
//! let container = factory.create()?;
//! assert_eq!(*container.get::<i32>()?, 42);
//! # Ok::<(), ContainerError>(())
//! ```

mod container;
mod definition;
mod error;
mod extension;
mod factory;
mod types;

pub use container::*;
pub use definition::*;
pub use error::*;
pub use extension::{
    ContainerCallback, ObjectCallback, ObjectContext, ObjectPostWrapper, wrapper_fn,
};
pub use factory::*;
pub use types::*;
