use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::ReentrantMutex;

use crate::{
    Args, ContainerError, Dependency, HookScope, Object, ObjectDefinition, Stage, TypeRef,
};

/// Registry of object definitions and the singletons built from them.
///
/// Objects are built lazily: the first lookup of an id resolves the
/// definition's dependencies, runs its lifecycle hooks and caches the
/// result. Every later lookup returns the same instance.
///
/// Lookups and mutations are serialized by a single re-entrant lock, so
/// concurrent first lookups of an id build it exactly once. Nested lookups
/// made from inside hooks on the resolving thread are allowed; lookups made
/// from other threads wait until the outer resolution has finished.
///
/// # Examples
///
/// ```rust
/// use coil::{Container, Definition, Dependency};
/// use std::sync::Arc;
///
/// struct Database {
///     url: String,
/// }
///
/// struct UserService {
///     database: Arc<Database>,
/// }
///
/// let container = Container::new();
/// container.register(
///     "database",
///     Definition::new(|_| {
///         Ok(Database {
///             url: "postgresql://localhost:5432/users".to_string(),
///         })
///     }),
/// )?;
/// container.register(
///     "users",
///     Definition::new(|args| {
///         Ok(UserService {
///             database: args.get::<Database>(0)?,
///         })
///     })
///     .depends_on(Dependency::of::<Database>()),
/// )?;
///
/// let users = container.get::<UserService>()?;
/// let database = container.get_by_id::<Database>("database")?;
/// assert!(Arc::ptr_eq(&users.database, &database));
/// # Ok::<(), coil::ContainerError>(())
/// ```
pub struct Container {
    definitions: DashMap<String, Arc<dyn ObjectDefinition>>,
    state: ReentrantMutex<RefCell<ResolveState>>,
}

#[derive(Default)]
struct ResolveState {
    instances: HashMap<String, Object>,
    // Ids currently being resolved on the thread holding the lock.
    resolving: Vec<String>,
}

/// Marks an id as being resolved until dropped, so a panicking hook does
/// not leave the id behind in the resolution chain.
struct Resolving<'a> {
    state: &'a RefCell<ResolveState>,
}

impl<'a> Resolving<'a> {
    fn enter(state: &'a RefCell<ResolveState>, id: &str) -> Self {
        state.borrow_mut().resolving.push(id.to_owned());
        Self { state }
    }
}

impl Drop for Resolving<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().resolving.pop();
    }
}

impl Container {
    pub fn new() -> Self {
        Self {
            definitions: DashMap::new(),
            state: ReentrantMutex::new(RefCell::new(ResolveState::default())),
        }
    }

    /// Registers a definition under `id`.
    ///
    /// Nothing is built until the object is looked up.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::IdDuplicated`] if `id` is already registered.
    /// The existing definition is left untouched.
    pub fn register<D>(&self, id: impl Into<String>, definition: D) -> Result<(), ContainerError>
    where
        D: ObjectDefinition + 'static,
    {
        self.register_shared(id, Arc::new(definition))
    }

    /// Registers a shared definition under `id`.
    pub fn register_shared(
        &self,
        id: impl Into<String>,
        definition: Arc<dyn ObjectDefinition>,
    ) -> Result<(), ContainerError> {
        let _guard = self.state.lock();
        match self.definitions.entry(id.into()) {
            Entry::Occupied(v) => Err(ContainerError::IdDuplicated(v.key().clone())),
            Entry::Vacant(v) => {
                tracing::debug!(
                    id = v.key().as_str(),
                    ty = %definition.object_type().primary(),
                    "Object registered"
                );
                v.insert(definition);
                Ok(())
            }
        }
    }

    /// Returns the definition registered under `id`.
    pub fn get_definition(&self, id: &str) -> Result<Arc<dyn ObjectDefinition>, ContainerError> {
        self.definitions
            .get(id)
            .map(|v| v.value().clone())
            .ok_or_else(|| ContainerError::IdNotFound(id.to_owned()))
    }

    /// Replaces the definition registered under `id`.
    ///
    /// A cached instance of the old definition is discarded, so the next
    /// lookup builds the object from the new definition.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::IdNotFound`] if `id` is not registered.
    pub fn set_definition<D>(&self, id: &str, definition: D) -> Result<(), ContainerError>
    where
        D: ObjectDefinition + 'static,
    {
        self.set_shared_definition(id, Arc::new(definition))
    }

    pub fn set_shared_definition(
        &self,
        id: &str,
        definition: Arc<dyn ObjectDefinition>,
    ) -> Result<(), ContainerError> {
        let guard = self.state.lock();
        match self.definitions.get_mut(id) {
            Some(mut v) => *v = definition,
            None => return Err(ContainerError::IdNotFound(id.to_owned())),
        }
        guard.borrow_mut().instances.remove(id);
        tracing::debug!(id, "Object definition replaced");
        Ok(())
    }

    /// Returns the object registered under `id`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::IdNotFound`] if `id` is not registered, or
    /// any error raised while resolving dependencies or running hooks.
    pub fn get_object(&self, id: &str) -> Result<Object, ContainerError> {
        let guard = self.state.lock();
        if let Some(object) = guard.borrow().instances.get(id) {
            tracing::trace!(id, "Object cache hit");
            return Ok(object.clone());
        }
        let definition = self.get_definition(id)?;
        if let Some(pos) = guard.borrow().resolving.iter().position(|v| v == id) {
            let mut chain = guard.borrow().resolving[pos..].to_vec();
            chain.push(id.to_owned());
            return Err(ContainerError::CyclicDependency { chain });
        }
        let object = {
            let _resolving = Resolving::enter(&guard, id);
            self.instantiate(id, &definition)?
        };
        // A hook may have replaced the definition while it was being built.
        let current = self
            .definitions
            .get(id)
            .is_some_and(|v| Arc::ptr_eq(v.value(), &definition));
        if current {
            guard
                .borrow_mut()
                .instances
                .insert(id.to_owned(), object.clone());
        }
        Ok(object)
    }

    /// Returns the single object whose declared type is assignable to `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::TypeNotFound`] if no declared type matches
    /// and [`ContainerError::MultiTypeMatch`] if more than one does.
    pub fn get_object_by_type(&self, ty: &TypeRef) -> Result<Object, ContainerError> {
        let _guard = self.state.lock();
        let mut ids = self.matching_ids(ty);
        match ids.len() {
            0 => Err(ContainerError::TypeNotFound(*ty)),
            1 => self.get_object(&ids[0]),
            _ => {
                ids.sort();
                Err(ContainerError::MultiTypeMatch { ty: *ty, ids })
            }
        }
    }

    /// Returns the object registered under `id` if it can be used as a `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::IdNotFound`] if `id` is not registered and
    /// [`ContainerError::TypeNotFound`] if the resolved object is not a `ty`.
    pub fn get_object_with_type(&self, id: &str, ty: &TypeRef) -> Result<Object, ContainerError> {
        let _guard = self.state.lock();
        let definition = self.get_definition(id)?;
        let object = self.get_object(id)?;
        if definition.object_type().admits(&object, ty) {
            Ok(object)
        } else {
            Err(ContainerError::TypeNotFound(*ty))
        }
    }

    /// Builds every object whose declared type is assignable to `ty`.
    ///
    /// Returns one entry per matching id, or an empty map if nothing matches.
    pub fn get_objects(&self, ty: &TypeRef) -> Result<BTreeMap<String, Object>, ContainerError> {
        let _guard = self.state.lock();
        let mut objects = BTreeMap::new();
        for id in self.matching_ids(ty) {
            let object = self.get_object(&id)?;
            objects.insert(id, object);
        }
        Ok(objects)
    }

    /// Returns the single object assignable to `T`.
    pub fn get<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
    {
        let ty = TypeRef::of::<T>();
        self.get_object_by_type(&ty)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeNotFound(ty))
    }

    /// Returns the object registered under `id` as a `T`.
    pub fn get_by_id<T>(&self, id: &str) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
    {
        let ty = TypeRef::of::<T>();
        self.get_object_with_type(id, &ty)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeNotFound(ty))
    }

    /// Returns every object assignable to `T`, ordered by id.
    pub fn get_all<T>(&self) -> Result<Vec<Arc<T>>, ContainerError>
    where
        T: Any + Send + Sync,
    {
        let ty = TypeRef::of::<T>();
        self.get_objects(&ty)?
            .into_values()
            .map(|v| {
                v.downcast::<T>()
                    .map_err(|_| ContainerError::TypeNotFound(ty))
            })
            .collect()
    }

    pub fn get_object_ids(&self) -> BTreeSet<String> {
        self.definitions.iter().map(|v| v.key().clone()).collect()
    }

    /// Returns the distinct primary types of all registered definitions.
    pub fn get_object_types(&self) -> HashSet<TypeRef> {
        self.definitions
            .iter()
            .map(|v| v.value().object_type().primary())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Consumes the container and returns a new one with every definition
    /// replaced by `decorate(id, definition)`.
    ///
    /// Instances cached by this container are dropped.
    pub fn decorated<F>(self, mut decorate: F) -> Container
    where
        F: FnMut(&str, Arc<dyn ObjectDefinition>) -> Arc<dyn ObjectDefinition>,
    {
        let definitions = self
            .definitions
            .into_iter()
            .map(|(id, definition)| {
                let definition = decorate(&id, definition);
                (id, definition)
            })
            .collect();
        Container {
            definitions,
            state: ReentrantMutex::new(RefCell::new(ResolveState::default())),
        }
    }

    fn matching_ids(&self, ty: &TypeRef) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|v| v.value().object_type().is_assignable_to(ty))
            .map(|v| v.key().clone())
            .collect()
    }

    fn resolve_dependency(&self, dependency: &Dependency) -> Result<Object, ContainerError> {
        match dependency {
            Dependency::ById(id) => self.get_object(id),
            Dependency::ByType(ty) => self.get_object_by_type(ty),
        }
    }

    fn instantiate(
        &self,
        id: &str,
        definition: &Arc<dyn ObjectDefinition>,
    ) -> Result<Object, ContainerError> {
        let span = tracing::debug_span!("instantiate", id);
        let _enter = span.enter();
        let args = definition
            .dependencies()
            .iter()
            .map(|v| self.resolve_dependency(v))
            .collect::<Result<Vec<_>, _>>()?;
        let scope = HookScope::new(id, self);
        let object = definition
            .create_instance(Args::new(args))
            .map_err(|err| ContainerError::from_hook(id, Stage::Create, err))?;
        definition
            .init(&object, &scope)
            .map_err(|err| ContainerError::from_hook(id, Stage::Init, err))?;
        let object = definition
            .wrap(object, &scope)
            .map_err(|err| ContainerError::from_hook(id, Stage::Wrap, err))?;
        tracing::debug!("Object instantiated");
        Ok(object)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("ids", &self.get_object_ids())
            .finish()
    }
}
