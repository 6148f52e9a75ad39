//! Runtime type identity used to key adapters and capabilities.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a concrete Rust type.
///
/// Two keys are equal exactly when they were built from the same type. The
/// type name is carried along for diagnostics only and takes no part in
/// equality or hashing.
///
/// Unsized types are accepted, so trait objects such as `dyn AuditEvent` can
/// serve as notification supertypes.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this key was built from `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
