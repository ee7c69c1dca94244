use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared handle to an instance managed by a [`Container`](crate::Container).
///
/// Instances are reference counted, so two lookups of the same singleton
/// can be compared with [`Arc::ptr_eq`].
pub type Object = Arc<dyn Any + Send + Sync>;

/// Stable identifier of a Rust type.
///
/// Equality and hashing only consider the [`TypeId`]; the name is kept for
/// error messages. Unsized types are accepted, so a trait object such as
/// `dyn Display` can be used as a capability marker.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
}

impl TypeRef {
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if the concrete value behind `object` is of this type.
    pub fn matches(&self, object: &Object) -> bool {
        let value: &dyn Any = &**object;
        value.type_id() == self.id
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Declared type of an object definition.
///
/// A declared type is a primary type plus the capabilities it can be looked
/// up by. Assignability is explicit: an object declared as `String` that
/// should also satisfy requests for `dyn Display` has to say so.
///
/// ```rust
/// use coil::{ObjectType, TypeRef};
/// use std::fmt::Display;
///
/// let ty = ObjectType::of::<String>().implements::<dyn Display>();
/// assert!(ty.is_assignable_to(&TypeRef::of::<String>()));
/// assert!(ty.is_assignable_to(&TypeRef::of::<dyn Display>()));
/// assert!(!ty.is_assignable_to(&TypeRef::of::<i32>()));
/// ```
#[derive(Clone, Debug)]
pub struct ObjectType {
    primary: TypeRef,
    capabilities: Vec<TypeRef>,
}

impl ObjectType {
    pub fn of<T>() -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            primary: TypeRef::of::<T>(),
            capabilities: Vec::new(),
        }
    }

    /// Adds a capability this type can be requested as.
    pub fn implements<C>(mut self) -> Self
    where
        C: ?Sized + 'static,
    {
        let capability = TypeRef::of::<C>();
        if capability != self.primary && !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn primary(&self) -> TypeRef {
        self.primary
    }

    pub fn capabilities(&self) -> &[TypeRef] {
        &self.capabilities
    }

    /// Returns `true` if an instance of this type can satisfy a request for `ty`.
    pub fn is_assignable_to(&self, ty: &TypeRef) -> bool {
        self.primary == *ty || self.capabilities.contains(ty)
    }

    /// Checks a resolved instance against a requested type.
    ///
    /// The instance qualifies if its concrete type is `ty`, or if it is still
    /// of the primary type and `ty` is one of the declared capabilities.
    pub(crate) fn admits(&self, object: &Object, ty: &TypeRef) -> bool {
        ty.matches(object) || (self.primary.matches(object) && self.is_assignable_to(ty))
    }
}
