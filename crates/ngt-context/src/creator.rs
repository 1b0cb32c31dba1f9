//! Context-scoped singleton factories
//!
//! Some interfaces must exist once per module context rather than once per
//! process; the canonical case is the per-plugin memory allocator, so each
//! module's allocations are attributed separately. A [`ContextCreator`] is
//! registered once (globally) and the context manager invokes it for every
//! context it knows about, plus every context created afterwards.

use crate::holder::InterfaceBox;
use ngt_core::InterfaceId;

/// Factory producing one interface instance per component context.
///
/// Register a creator globally with
/// `Registration::new(...).implements::<dyn ContextCreator>(|v| v)`;
/// the context manager reacts to the registration event and backfills every
/// live context.
pub trait ContextCreator: Send + Sync {
    /// Id of the interface the produced instances provide. Used for
    /// duplicate detection and diagnostics.
    fn interface_id(&self) -> InterfaceId;

    /// Produce the instance for the context with the given id.
    ///
    /// The returned entry is registered locally in that context; it must
    /// provide [`interface_id`](ContextCreator::interface_id).
    fn create(&self, context_id: &str) -> InterfaceBox;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::Registration;
    use std::sync::Arc;

    trait Tag: Send + Sync {
        fn context_id(&self) -> &str;
    }

    struct TagImpl(String);

    impl Tag for TagImpl {
        fn context_id(&self) -> &str {
            &self.0
        }
    }

    struct TagCreator;

    impl ContextCreator for TagCreator {
        fn interface_id(&self) -> InterfaceId {
            InterfaceId::of::<dyn Tag>()
        }

        fn create(&self, context_id: &str) -> InterfaceBox {
            Registration::new(TagImpl(context_id.to_owned()))
                .implements::<dyn Tag>(|v| v)
                .seal()
        }
    }

    #[test]
    fn test_creator_products_carry_context_id() {
        let creator: Arc<dyn ContextCreator> = Arc::new(TagCreator);
        let product = creator.create("plg_test");
        let tag = product.get::<dyn Tag>().unwrap();
        assert_eq!(tag.context_id(), "plg_test");
        assert!(product.provides(creator.interface_id()));
    }
}
