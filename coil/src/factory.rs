use std::sync::Arc;

use crate::extension::sort_by_priority;
use crate::{
    Args, Container, ContainerCallback, ContainerError, Dependency, HookScope, Object,
    ObjectCallback, ObjectDefinition, ObjectPostWrapper, ObjectType, StdError,
};

/// Source of fully populated containers.
pub trait ContainerFactory {
    fn create(&self) -> Result<Container, ContainerError>;
}

impl<F> ContainerFactory for F
where
    F: Fn() -> Result<Container, ContainerError>,
{
    fn create(&self) -> Result<Container, ContainerError> {
        self()
    }
}

/// Registers the base definitions of an [`ExtendableContainerFactory`].
pub trait ContainerInitializer: Send + Sync {
    fn init_container(&self, container: &Container) -> Result<(), ContainerError>;
}

impl<F> ContainerInitializer for F
where
    F: Fn(&Container) -> Result<(), ContainerError> + Send + Sync,
{
    fn init_container(&self, container: &Container) -> Result<(), ContainerError> {
        self(container)
    }
}

/// Container callbacks, object callbacks and post wrappers supplied to an
/// [`ExtendableContainerFactory`].
///
/// The lists do not need to be sorted; the factory orders them by priority.
#[derive(Clone, Default)]
pub struct Extensions {
    container_callbacks: Vec<Arc<dyn ContainerCallback>>,
    object_callbacks: Vec<Arc<dyn ObjectCallback>>,
    post_wrappers: Vec<Arc<dyn ObjectPostWrapper>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_container_callback<C>(&mut self, callback: C) -> &mut Self
    where
        C: ContainerCallback + 'static,
    {
        self.add_shared_container_callback(Arc::new(callback))
    }

    pub fn add_shared_container_callback(
        &mut self,
        callback: Arc<dyn ContainerCallback>,
    ) -> &mut Self {
        self.container_callbacks.push(callback);
        self
    }

    pub fn add_object_callback<C>(&mut self, callback: C) -> &mut Self
    where
        C: ObjectCallback + 'static,
    {
        self.add_shared_object_callback(Arc::new(callback))
    }

    pub fn add_shared_object_callback(&mut self, callback: Arc<dyn ObjectCallback>) -> &mut Self {
        self.object_callbacks.push(callback);
        self
    }

    pub fn add_post_wrapper<W>(&mut self, wrapper: W) -> &mut Self
    where
        W: ObjectPostWrapper + 'static,
    {
        self.add_shared_post_wrapper(Arc::new(wrapper))
    }

    pub fn add_shared_post_wrapper(&mut self, wrapper: Arc<dyn ObjectPostWrapper>) -> &mut Self {
        self.post_wrappers.push(wrapper);
        self
    }

    pub fn with_container_callback<C>(mut self, callback: C) -> Self
    where
        C: ContainerCallback + 'static,
    {
        self.add_container_callback(callback);
        self
    }

    pub fn with_object_callback<C>(mut self, callback: C) -> Self
    where
        C: ObjectCallback + 'static,
    {
        self.add_object_callback(callback);
        self
    }

    pub fn with_post_wrapper<W>(mut self, wrapper: W) -> Self
    where
        W: ObjectPostWrapper + 'static,
    {
        self.add_post_wrapper(wrapper);
        self
    }

    /// Appends all callbacks and wrappers from `other`.
    pub fn merge(mut self, other: Extensions) -> Self {
        self.container_callbacks.extend(other.container_callbacks);
        self.object_callbacks.extend(other.object_callbacks);
        self.post_wrappers.extend(other.post_wrappers);
        self
    }

    pub fn container_callbacks(&self) -> &[Arc<dyn ContainerCallback>] {
        &self.container_callbacks
    }

    pub fn object_callbacks(&self) -> &[Arc<dyn ObjectCallback>] {
        &self.object_callbacks
    }

    pub fn post_wrappers(&self) -> &[Arc<dyn ObjectPostWrapper>] {
        &self.post_wrappers
    }

    pub fn is_empty(&self) -> bool {
        self.container_callbacks.is_empty()
            && self.object_callbacks.is_empty()
            && self.post_wrappers.is_empty()
    }
}

/// Factory that applies container and object callbacks to every container it creates.
///
/// Creating a container runs these steps:
///
/// 1. The initializer registers the base definitions into a new container.
/// 2. Every [`ContainerCallback`] runs once, in priority order.
/// 3. Every definition, including ones added by container callbacks, is
///    decorated so that [`ObjectCallback::after_init`] runs after the
///    definition's init hook and [`ObjectCallback::after_wrap`] is folded over
///    the result of its wrap hook, both in priority order. Post wrappers are
///    folded last, also in priority order.
///
/// Decorated definitions keep their declared type and dependencies.
///
/// # Examples
///
/// ```rust
/// use coil::{
///     Container, ContainerError, ContainerFactory, Definition, ExtendableContainerFactory,
///     Extensions, Object, ObjectCallback, ObjectContext, StdError,
/// };
/// use std::sync::Arc;
///
/// struct Shout;
///
/// impl ObjectCallback for Shout {
///     fn after_wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError> {
///         match ctx.downcast_ref::<String>() {
///             Some(v) => Ok(Arc::new(v.to_uppercase())),
///             None => Ok(ctx.object().clone()),
///         }
///     }
/// }
///
/// let factory = ExtendableContainerFactory::new(
///     |container: &Container| -> Result<(), ContainerError> {
///         container.register("greeting", Definition::new(|_| Ok("hello".to_string())))
///     },
///     Extensions::new().with_object_callback(Shout),
/// );
///
/// let container = factory.create()?;
/// assert_eq!(container.get::<String>()?.as_str(), "HELLO");
/// # Ok::<(), ContainerError>(())
/// ```
pub struct ExtendableContainerFactory<I> {
    initializer: I,
    container_callbacks: Vec<Arc<dyn ContainerCallback>>,
    object_callbacks: Arc<[Arc<dyn ObjectCallback>]>,
    post_wrappers: Arc<[Arc<dyn ObjectPostWrapper>]>,
}

impl<I> ExtendableContainerFactory<I>
where
    I: ContainerInitializer,
{
    pub fn new(initializer: I, extensions: Extensions) -> Self {
        let Extensions {
            mut container_callbacks,
            mut object_callbacks,
            mut post_wrappers,
        } = extensions;
        sort_by_priority(&mut container_callbacks[..], |v| v.priority());
        sort_by_priority(&mut object_callbacks[..], |v| v.priority());
        sort_by_priority(&mut post_wrappers[..], |v| v.priority());
        Self {
            initializer,
            container_callbacks,
            object_callbacks: object_callbacks.into(),
            post_wrappers: post_wrappers.into(),
        }
    }
}

impl<I> ContainerFactory for ExtendableContainerFactory<I>
where
    I: ContainerInitializer,
{
    fn create(&self) -> Result<Container, ContainerError> {
        let container = Container::new();
        self.initializer.init_container(&container)?;
        for callback in &self.container_callbacks {
            callback
                .after_container_init(&container)
                .map_err(ContainerError::ContainerCallback)?;
        }
        let container = container.decorated(|_, inner| {
            Arc::new(CallbackDefinition {
                inner,
                callbacks: self.object_callbacks.clone(),
                wrappers: self.post_wrappers.clone(),
            })
        });
        tracing::debug!(
            objects = container.len(),
            container_callbacks = self.container_callbacks.len(),
            object_callbacks = self.object_callbacks.len(),
            post_wrappers = self.post_wrappers.len(),
            "Container created"
        );
        Ok(container)
    }
}

/// Factory that applies post wrappers to the containers of another factory.
///
/// Wrappers are added explicitly and run in priority order after each
/// definition's own wrap hook, each one receiving the previous result.
pub struct PostWrapperContainerFactory<F> {
    factory: F,
    wrappers: Vec<Arc<dyn ObjectPostWrapper>>,
}

impl<F> PostWrapperContainerFactory<F>
where
    F: ContainerFactory,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            wrappers: Vec::new(),
        }
    }

    pub fn add_wrapper<W>(&mut self, wrapper: W) -> &mut Self
    where
        W: ObjectPostWrapper + 'static,
    {
        self.add_shared_wrapper(Arc::new(wrapper))
    }

    pub fn add_shared_wrapper(&mut self, wrapper: Arc<dyn ObjectPostWrapper>) -> &mut Self {
        self.wrappers.push(wrapper);
        self
    }

    pub fn with_wrapper<W>(mut self, wrapper: W) -> Self
    where
        W: ObjectPostWrapper + 'static,
    {
        self.add_wrapper(wrapper);
        self
    }
}

impl<F> ContainerFactory for PostWrapperContainerFactory<F>
where
    F: ContainerFactory,
{
    fn create(&self) -> Result<Container, ContainerError> {
        let container = self.factory.create()?;
        let mut wrappers = self.wrappers.clone();
        sort_by_priority(&mut wrappers[..], |v| v.priority());
        let wrappers: Arc<[Arc<dyn ObjectPostWrapper>]> = wrappers.into();
        let container = container.decorated(|_, inner| {
            Arc::new(PostWrapperDefinition {
                inner,
                wrappers: wrappers.clone(),
            })
        });
        tracing::debug!(
            objects = container.len(),
            wrappers = wrappers.len(),
            "Container created"
        );
        Ok(container)
    }
}

struct CallbackDefinition {
    inner: Arc<dyn ObjectDefinition>,
    callbacks: Arc<[Arc<dyn ObjectCallback>]>,
    wrappers: Arc<[Arc<dyn ObjectPostWrapper>]>,
}

impl ObjectDefinition for CallbackDefinition {
    fn object_type(&self) -> &ObjectType {
        self.inner.object_type()
    }

    fn dependencies(&self) -> &[Dependency] {
        self.inner.dependencies()
    }

    fn create_instance(&self, args: Args) -> Result<Object, StdError> {
        self.inner.create_instance(args)
    }

    fn init(&self, object: &Object, scope: &HookScope<'_>) -> Result<(), StdError> {
        self.inner.init(object, scope)?;
        for callback in self.callbacks.iter() {
            callback.after_init(&scope.context(object.clone(), &self.inner))?;
        }
        Ok(())
    }

    fn wrap(&self, object: Object, scope: &HookScope<'_>) -> Result<Object, StdError> {
        let object = self.inner.wrap(object, scope)?;
        let object = self.callbacks.iter().try_fold(object, |object, callback| {
            callback.after_wrap(&scope.context(object, &self.inner))
        })?;
        self.wrappers.iter().try_fold(object, |object, wrapper| {
            wrapper.wrap(&scope.context(object, &self.inner))
        })
    }
}

struct PostWrapperDefinition {
    inner: Arc<dyn ObjectDefinition>,
    wrappers: Arc<[Arc<dyn ObjectPostWrapper>]>,
}

impl ObjectDefinition for PostWrapperDefinition {
    fn object_type(&self) -> &ObjectType {
        self.inner.object_type()
    }

    fn dependencies(&self) -> &[Dependency] {
        self.inner.dependencies()
    }

    fn create_instance(&self, args: Args) -> Result<Object, StdError> {
        self.inner.create_instance(args)
    }

    fn init(&self, object: &Object, scope: &HookScope<'_>) -> Result<(), StdError> {
        self.inner.init(object, scope)
    }

    fn wrap(&self, object: Object, scope: &HookScope<'_>) -> Result<Object, StdError> {
        let object = self.inner.wrap(object, scope)?;
        self.wrappers.iter().try_fold(object, |object, wrapper| {
            wrapper.wrap(&scope.context(object, &self.inner))
        })
    }
}
