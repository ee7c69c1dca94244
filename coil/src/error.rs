use std::fmt;

use thiserror::Error;

use crate::TypeRef;

/// Type alias for boxed errors that can be sent across threads.
///
/// Definition hooks and extension callbacks report failures with this type.
pub type StdError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// An object with this id is already registered.
    #[error("Object {0:?} is already registered")]
    IdDuplicated(String),
    /// No object with this id is registered.
    #[error("Object {0:?} is not registered")]
    IdNotFound(String),
    /// No registered object can satisfy the requested type.
    #[error("No object of type {0} is registered")]
    TypeNotFound(TypeRef),
    /// More than one registered object can satisfy the requested type.
    #[error("Multiple objects match type {ty}: {ids:?}")]
    MultiTypeMatch { ty: TypeRef, ids: Vec<String> },
    /// A dependency chain revisits an object that is still being resolved.
    #[error("Circular dependency detected: {}", chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },
    /// A definition hook failed while building an object.
    #[error("Cannot {stage} object {id:?}: {source}")]
    Hook {
        id: String,
        stage: Stage,
        source: StdError,
    },
    /// A container callback failed.
    #[error("Container callback error: {0}")]
    ContainerCallback(#[source] StdError),
}

impl ContainerError {
    /// Converts a hook failure into a container error.
    ///
    /// Container errors raised from inside a hook, for example by
    /// [`Args::get`](crate::Args::get), are passed through unchanged.
    pub(crate) fn from_hook(id: &str, stage: Stage, err: StdError) -> Self {
        match err.downcast::<ContainerError>() {
            Ok(err) => *err,
            Err(source) => Self::Hook {
                id: id.to_owned(),
                stage,
                source,
            },
        }
    }
}

/// Lifecycle stage of an object definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Create,
    Init,
    Wrap,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Create => write!(f, "create"),
            Stage::Init => write!(f, "init"),
            Stage::Wrap => write!(f, "wrap"),
        }
    }
}
