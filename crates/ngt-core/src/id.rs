//! Interface identity tokens
//!
//! Every interface lookup in the framework is keyed by an [`InterfaceId`].
//! The id wraps [`std::any::TypeId`] of the interface type, which works for
//! unsized types, so `dyn Trait` interfaces get ids directly. The type name
//! is carried alongside purely for log output and panics.

use std::any::{self, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable identifier for an interface type.
///
/// Two ids compare equal iff they denote the same interface type, and the
/// value is stable for the lifetime of the process. Because every module in a
/// deployment is built from the same workspace, [`TypeId`] identity holds
/// across dynamic-library boundaries as well.
///
/// # Example
///
/// ```
/// use ngt_core::InterfaceId;
///
/// trait Saver {}
///
/// let a = InterfaceId::of::<dyn Saver>();
/// let b = InterfaceId::of::<dyn Saver>();
/// assert_eq!(a, b);
/// assert_ne!(a, InterfaceId::of::<String>());
/// ```
#[derive(Clone, Copy)]
pub struct InterfaceId {
    id: TypeId,
    name: &'static str,
}

impl InterfaceId {
    /// Get the id for an interface type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: any::type_name::<T>(),
        }
    }

    /// Fully-qualified name of the interface type, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

// Equality and hashing go through the TypeId alone; the name is not
// guaranteed unique by the standard library.
impl PartialEq for InterfaceId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InterfaceId {}

impl Hash for InterfaceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceId({})", self.name)
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    trait Greeter {}
    trait Saver {}

    #[test]
    fn test_same_type_equal() {
        assert_eq!(InterfaceId::of::<dyn Greeter>(), InterfaceId::of::<dyn Greeter>());
        assert_eq!(InterfaceId::of::<u32>(), InterfaceId::of::<u32>());
    }

    #[test]
    fn test_distinct_types_differ() {
        assert_ne!(InterfaceId::of::<dyn Greeter>(), InterfaceId::of::<dyn Saver>());
        assert_ne!(InterfaceId::of::<dyn Greeter>(), InterfaceId::of::<u32>());
    }

    #[test]
    fn test_usable_as_map_key() {
        let mut map = HashMap::new();
        map.insert(InterfaceId::of::<dyn Greeter>(), 1);
        map.insert(InterfaceId::of::<dyn Saver>(), 2);
        assert_eq!(map[&InterfaceId::of::<dyn Greeter>()], 1);
        assert_eq!(map[&InterfaceId::of::<dyn Saver>()], 2);
    }

    #[test]
    fn test_name_carries_type_path() {
        let id = InterfaceId::of::<dyn Greeter>();
        assert!(id.name().contains("Greeter"));
        assert!(format!("{id:?}").contains("Greeter"));
    }
}
