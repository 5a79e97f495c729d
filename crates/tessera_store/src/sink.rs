//! The notification interface between the store and incremental views.

use crate::component::ComponentSet;
use crate::entity::Entity;

/// Receives change notifications from a [`Store`](crate::Store).
///
/// A sink is subscribed under two lists of components. When a component on
/// the *include* list is attached the store calls [`recheck`](Self::recheck);
/// when it is detached the store calls [`reject`](Self::reject). The
/// *exclude* list gets the mirror image. Both are called after the store's
/// indices already reflect the mutation, so `carried` is the entity's
/// post-mutation component set.
pub trait ViewSink {
    /// Re-evaluate `entity` against the sink's filter.
    fn recheck(&mut self, entity: Entity, carried: &ComponentSet);

    /// Drop `entity` unconditionally. Must tolerate entities not held.
    fn reject(&mut self, entity: Entity);
}
