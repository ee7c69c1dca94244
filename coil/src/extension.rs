//! Extension points for observing and transforming the object lifecycle.
//!
//! Extensions are ordered by [`priority`](ObjectCallback::priority): lower
//! values run first. The order of extensions with equal priority is not
//! specified.

use std::any::Any;
use std::sync::Arc;

use crate::{Container, Object, ObjectDefinition, StdError};

/// Callback invoked once the container has been populated.
pub trait ContainerCallback: Send + Sync {
    fn after_container_init(&self, container: &Container) -> Result<(), StdError>;

    fn priority(&self) -> i32 {
        1
    }
}

/// Callback invoked for every object built by the container.
///
/// Both hooks are optional. [`after_wrap`](Self::after_wrap) may replace the
/// object; the returned value is passed to the next callback.
pub trait ObjectCallback: Send + Sync {
    fn after_init(&self, ctx: &ObjectContext<'_>) -> Result<(), StdError> {
        let _ = ctx;
        Ok(())
    }

    fn after_wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError> {
        Ok(ctx.object().clone())
    }

    fn priority(&self) -> i32 {
        1
    }
}

/// Wrapper applied to every object after its definition's own wrap hook.
pub trait ObjectPostWrapper: Send + Sync {
    fn wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError>;

    fn priority(&self) -> i32 {
        1
    }
}

struct FnPostWrapper<F> {
    priority: i32,
    func: F,
}

impl<F> ObjectPostWrapper for FnPostWrapper<F>
where
    F: Fn(&ObjectContext<'_>) -> Result<Object, StdError> + Send + Sync,
{
    fn wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError> {
        (self.func)(ctx)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Creates a post wrapper from a closure.
///
/// ```rust
/// use coil::{wrapper_fn, ObjectPostWrapper};
///
/// let wrapper = wrapper_fn(5, |ctx| Ok(ctx.object().clone()));
/// assert_eq!(wrapper.priority(), 5);
/// ```
pub fn wrapper_fn<F>(priority: i32, func: F) -> impl ObjectPostWrapper
where
    F: Fn(&ObjectContext<'_>) -> Result<Object, StdError> + Send + Sync + 'static,
{
    FnPostWrapper { priority, func }
}

/// Information passed to object callbacks and post wrappers.
pub struct ObjectContext<'a> {
    object: Object,
    id: &'a str,
    definition: &'a Arc<dyn ObjectDefinition>,
    container: &'a Container,
}

impl<'a> ObjectContext<'a> {
    pub(crate) fn new(
        object: Object,
        id: &'a str,
        definition: &'a Arc<dyn ObjectDefinition>,
        container: &'a Container,
    ) -> Self {
        Self {
            object,
            id,
            definition,
            container,
        }
    }

    /// The object as produced by the previous lifecycle step.
    pub fn object(&self) -> &Object {
        &self.object
    }

    pub fn into_object(self) -> Object {
        self.object
    }

    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: Any,
    {
        self.object.downcast_ref::<T>()
    }

    pub fn id(&self) -> &'a str {
        self.id
    }

    /// The definition being decorated, as held by the upstream container.
    pub fn definition(&self) -> &'a Arc<dyn ObjectDefinition> {
        self.definition
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }
}

pub(crate) fn sort_by_priority<T, F>(items: &mut [Arc<T>], priority: F)
where
    T: ?Sized,
    F: Fn(&T) -> i32,
{
    items.sort_by_key(|item| priority(&**item));
}
