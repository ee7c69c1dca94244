use std::any::Any;
use std::sync::Arc;

use crate::{Container, ContainerError, Object, ObjectContext, ObjectType, StdError, TypeRef};

/// Reference to another registered object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dependency {
    /// The object registered under this id.
    ById(String),
    /// The single object whose declared type is assignable to this type.
    ByType(TypeRef),
}

impl Dependency {
    pub fn id(id: impl Into<String>) -> Self {
        Self::ById(id.into())
    }

    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self::ByType(TypeRef::of::<T>())
    }
}

/// Recipe for building one registered object.
///
/// The container calls the lifecycle methods at most once per id:
/// [`create_instance`](Self::create_instance) with the resolved
/// dependencies, then [`init`](Self::init), then [`wrap`](Self::wrap). The
/// result of `wrap` is what callers receive and what the container caches.
///
/// Hooks may fail with any error. A [`ContainerError`] is reported to the
/// caller as is; other errors are reported as [`ContainerError::Hook`].
pub trait ObjectDefinition: Send + Sync {
    /// Declared type used for type-based lookup.
    fn object_type(&self) -> &ObjectType;

    /// Dependencies passed positionally to [`create_instance`](Self::create_instance).
    fn dependencies(&self) -> &[Dependency] {
        &[]
    }

    /// Builds a new instance from the resolved dependencies.
    fn create_instance(&self, args: Args) -> Result<Object, StdError>;

    /// Runs after the instance has been created.
    fn init(&self, object: &Object, scope: &HookScope<'_>) -> Result<(), StdError> {
        let _ = (object, scope);
        Ok(())
    }

    /// Transforms the initialized instance.
    fn wrap(&self, object: Object, scope: &HookScope<'_>) -> Result<Object, StdError> {
        let _ = scope;
        Ok(object)
    }
}

/// The object being resolved and the container resolving it.
pub struct HookScope<'a> {
    id: &'a str,
    container: &'a Container,
}

impl<'a> HookScope<'a> {
    pub(crate) fn new(id: &'a str, container: &'a Container) -> Self {
        Self { id, container }
    }

    pub fn id(&self) -> &'a str {
        self.id
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// Builds a callback context for `object`, reporting `definition` as its definition.
    pub fn context<'b>(
        &'b self,
        object: Object,
        definition: &'b Arc<dyn ObjectDefinition>,
    ) -> ObjectContext<'b> {
        ObjectContext::new(object, self.id, definition, self.container)
    }
}

/// Resolved dependencies, in the order they were declared.
pub struct Args {
    values: Vec<Object>,
}

impl Args {
    pub(crate) fn new(values: Vec<Object>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn object(&self, index: usize) -> Result<&Object, StdError> {
        self.values
            .get(index)
            .ok_or_else(|| format!("Argument {index} is out of range").into())
    }

    /// Returns the argument at `index` as a `T`.
    ///
    /// Fails with [`ContainerError::TypeNotFound`] if the argument is not a `T`.
    pub fn get<T>(&self, index: usize) -> Result<Arc<T>, StdError>
    where
        T: Any + Send + Sync,
    {
        self.object(index)?
            .clone()
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeNotFound(TypeRef::of::<T>()).into())
    }

    pub fn into_vec(self) -> Vec<Object> {
        self.values
    }
}

type FactoryFn = Box<dyn Fn(&Args) -> Result<Object, StdError> + Send + Sync>;
type InitFn = Box<dyn Fn(&Object) -> Result<(), StdError> + Send + Sync>;
type WrapFn = Box<dyn Fn(Object) -> Result<Object, StdError> + Send + Sync>;

/// Object definition backed by closures.
///
/// ```rust
/// use coil::{Container, Definition, Dependency};
///
/// let container = Container::new();
/// container.register("name", Definition::new(|_| Ok("world".to_string())))?;
/// container.register(
///     "greeting",
///     Definition::new(|args| Ok(format!("hello {}", args.get::<String>(0)?)))
///         .depends_on(Dependency::id("name")),
/// )?;
///
/// let greeting = container.get_by_id::<String>("greeting")?;
/// assert_eq!(greeting.as_str(), "hello world");
/// # Ok::<(), coil::ContainerError>(())
/// ```
pub struct Definition {
    object_type: ObjectType,
    dependencies: Vec<Dependency>,
    factory: FactoryFn,
    init: Option<InitFn>,
    wrap: Option<WrapFn>,
}

impl Definition {
    /// Creates a definition whose declared type is the factory's output type.
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Args) -> Result<T, StdError> + Send + Sync + 'static,
    {
        Self {
            object_type: ObjectType::of::<T>(),
            dependencies: Vec::new(),
            factory: Box::new(move |args| Ok(Arc::new(factory(args)?) as Object)),
            init: None,
            wrap: None,
        }
    }

    /// Replaces the declared type.
    pub fn with_type(mut self, object_type: ObjectType) -> Self {
        self.object_type = object_type;
        self
    }

    /// Adds a capability to the declared type.
    pub fn implements<C>(mut self) -> Self
    where
        C: ?Sized + 'static,
    {
        self.object_type = self.object_type.implements::<C>();
        self
    }

    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Sets the init hook. The hook only sees instances of type `T`.
    pub fn on_init<T, F>(mut self, init: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<(), StdError> + Send + Sync + 'static,
    {
        self.init = Some(Box::new(move |object| match object.downcast_ref::<T>() {
            Some(value) => init(value),
            None => Err(ContainerError::TypeNotFound(TypeRef::of::<T>()).into()),
        }));
        self
    }

    pub fn on_wrap<F>(mut self, wrap: F) -> Self
    where
        F: Fn(Object) -> Result<Object, StdError> + Send + Sync + 'static,
    {
        self.wrap = Some(Box::new(wrap));
        self
    }
}

impl ObjectDefinition for Definition {
    fn object_type(&self) -> &ObjectType {
        &self.object_type
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn create_instance(&self, args: Args) -> Result<Object, StdError> {
        (self.factory)(&args)
    }

    fn init(&self, object: &Object, _scope: &HookScope<'_>) -> Result<(), StdError> {
        match &self.init {
            Some(init) => init(object),
            None => Ok(()),
        }
    }

    fn wrap(&self, object: Object, _scope: &HookScope<'_>) -> Result<Object, StdError> {
        match &self.wrap {
            Some(wrap) => wrap(object),
            None => Ok(object),
        }
    }
}
