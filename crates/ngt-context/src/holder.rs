//! Type-erased interface holders
//!
//! A concrete value advertises the interfaces it provides through a
//! [`Registration`] builder. Each `implements` call captures the unsize
//! coercion from the concrete type to the interface type right at the call
//! site and stores the resulting `Arc<dyn I>` type-erased, so later lookups
//! are a plain downcast by [`InterfaceId`] with no casting machinery at
//! query time.

use ngt_core::InterfaceId;
use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

/// Builder declaring which interfaces a concrete value provides.
///
/// The concrete type itself is always queryable; every advertised interface
/// is added with [`implements`](Registration::implements).
///
/// # Example
///
/// ```
/// use ngt_context::Registration;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".to_owned()
///     }
/// }
///
/// let reg = Registration::new(English).implements::<dyn Greeter>(|v| v);
/// let boxed = reg.seal();
/// assert!(boxed.get::<dyn Greeter>().is_some());
/// assert!(boxed.get::<English>().is_some());
/// ```
pub struct Registration<C: Send + Sync + 'static> {
    value: Arc<C>,
    provided: Vec<Provided>,
}

struct Provided {
    id: InterfaceId,
    // A Box<dyn Any> holding an Arc<I>
    erased: Box<dyn Any + Send + Sync>,
}

impl<C: Send + Sync + 'static> Registration<C> {
    /// Wrap an owned value.
    pub fn new(value: C) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an already-shared value, for callers that keep using it directly.
    pub fn from_arc(value: Arc<C>) -> Self {
        let concrete = Provided {
            id: InterfaceId::of::<C>(),
            erased: Box::new(value.clone()),
        };
        Self {
            value,
            provided: vec![concrete],
        }
    }

    /// Advertise that the value provides interface `I`.
    ///
    /// The cast function is evaluated immediately; pass the identity closure
    /// (`|v| v`) and let the coercion happen in its return position.
    pub fn implements<I>(mut self, cast: fn(Arc<C>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let erased = cast(self.value.clone());
        self.provided.push(Provided {
            id: InterfaceId::of::<I>(),
            erased: Box::new(erased),
        });
        self
    }

    /// Freeze the builder into the type-erased form contexts store.
    pub fn seal(self) -> InterfaceBox {
        InterfaceBox {
            provided: self.provided,
            concrete: any::type_name::<C>(),
        }
    }
}

impl<C: Send + Sync + 'static> fmt::Debug for Registration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("concrete", &any::type_name::<C>())
            .field("provided", &self.provided.len())
            .finish()
    }
}

/// A sealed, type-erased registration entry.
///
/// Contexts store these; listener callbacks receive a reference to the
/// affected entry and can probe it with [`get`](InterfaceBox::get) for the
/// interfaces they care about.
pub struct InterfaceBox {
    provided: Vec<Provided>,
    concrete: &'static str,
}

impl InterfaceBox {
    /// Retrieve the value as interface `T`, if this entry provides it.
    pub fn get<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        let id = InterfaceId::of::<T>();
        self.provided
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.erased.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Whether this entry provides the given interface.
    pub fn provides(&self, id: InterfaceId) -> bool {
        self.provided.iter().any(|p| p.id == id)
    }

    /// Ids of every interface this entry provides, declaration order.
    pub fn provided_ids(&self) -> impl Iterator<Item = InterfaceId> + '_ {
        self.provided.iter().map(|p| p.id)
    }

    /// Name of the concrete type behind the entry, for diagnostics.
    pub fn concrete_name(&self) -> &'static str {
        self.concrete
    }
}

impl fmt::Debug for InterfaceBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceBox")
            .field("concrete", &self.concrete)
            .field(
                "provided",
                &self.provided.iter().map(|p| p.id.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Build a [`Registration`] listing the interfaces a value provides.
///
/// ```
/// use ngt_context::{interfaces, Registration};
///
/// trait Loader: Send + Sync {}
/// trait Saver: Send + Sync {}
///
/// struct FileStore;
/// impl Loader for FileStore {}
/// impl Saver for FileStore {}
///
/// let reg = interfaces!(FileStore => dyn Loader, dyn Saver);
/// let boxed = reg.seal();
/// assert!(boxed.get::<dyn Loader>().is_some());
/// assert!(boxed.get::<dyn Saver>().is_some());
/// ```
#[macro_export]
macro_rules! interfaces {
    ($value:expr => $($iface:ty),+ $(,)?) => {
        $crate::Registration::new($value)$(.implements::<$iface>(|v| v))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Counter: Send + Sync {
        fn count(&self) -> u32;
    }

    trait Resettable: Send + Sync {}

    struct FixedCounter(u32);

    impl Counter for FixedCounter {
        fn count(&self) -> u32 {
            self.0
        }
    }

    impl Resettable for FixedCounter {}

    #[test]
    fn test_concrete_type_always_provided() {
        let boxed = Registration::new(FixedCounter(7)).seal();
        let concrete = boxed.get::<FixedCounter>().unwrap();
        assert_eq!(concrete.0, 7);
        assert!(boxed.get::<dyn Counter>().is_none());
    }

    #[test]
    fn test_implements_captures_cast() {
        let boxed = Registration::new(FixedCounter(3))
            .implements::<dyn Counter>(|v| v)
            .seal();
        let counter = boxed.get::<dyn Counter>().unwrap();
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn test_multiple_interfaces() {
        let boxed = interfaces!(FixedCounter(1) => dyn Counter, dyn Resettable).seal();
        assert!(boxed.get::<dyn Counter>().is_some());
        assert!(boxed.get::<dyn Resettable>().is_some());
        assert_eq!(boxed.provided_ids().count(), 3);
    }

    #[test]
    fn test_unprovided_interface_is_none() {
        trait Unrelated: Send + Sync {}
        let boxed = Registration::new(FixedCounter(0)).seal();
        assert!(boxed.get::<dyn Unrelated>().is_none());
        assert!(!boxed.provides(InterfaceId::of::<dyn Unrelated>()));
    }

    #[test]
    fn test_from_arc_shares_value() {
        let shared = Arc::new(FixedCounter(9));
        let boxed = Registration::from_arc(shared.clone())
            .implements::<dyn Counter>(|v| v)
            .seal();
        let queried = boxed.get::<FixedCounter>().unwrap();
        assert!(Arc::ptr_eq(&shared, &queried));
    }

    #[test]
    fn test_concrete_name() {
        let boxed = Registration::new(FixedCounter(0)).seal();
        assert!(boxed.concrete_name().contains("FixedCounter"));
    }
}
