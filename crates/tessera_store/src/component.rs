//! Component kinds and type-erased component values.
//!
//! A pool holds values of arbitrary types side by side, so values are stored
//! as `Box<dyn ComponentValue>`. Any `'static + Clone` type qualifies; the
//! `Clone` bound is what lets [`Store::copy`](crate::Store::copy) produce
//! independent copies.

use std::any::Any;
use std::collections::HashSet;

use crate::entity::ComponentId;

/// The set of component identifiers an entity currently carries.
pub type ComponentSet = HashSet<ComponentId>;

/// How a component identifier was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Carries a per-entity value.
    Pool,
    /// Presence only.
    Tag,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentKind::Pool => f.write_str("pool"),
            ComponentKind::Tag => f.write_str("tag"),
        }
    }
}

/// A value stored in a pool.
///
/// Blanket-implemented for every `T: Any + Clone`; there is no need to
/// implement it by hand.
pub trait ComponentValue: Any {
    /// Deep-enough copy of the value, boxed.
    fn clone_boxed(&self) -> Box<dyn ComponentValue>;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Name of the concrete type, used in error messages.
    fn value_type_name(&self) -> &'static str;
}

impl<T: Any + Clone> ComponentValue for T {
    fn clone_boxed(&self) -> Box<dyn ComponentValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn value_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl std::fmt::Debug for dyn ComponentValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentValue<{}>", self.value_type_name())
    }
}
