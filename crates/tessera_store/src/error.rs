//! Store error types.

use crate::component::ComponentKind;
use crate::entity::{ComponentId, Entity};

/// Errors returned by [`Store`](crate::Store) and the views built on it.
///
/// Every error is a local contract violation reported at the call site. The
/// store is left unchanged by the failing operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The entity was never spawned or has already been despawned.
    #[error("{0} not found; make sure it was spawned and not despawned twice")]
    EntityNotFound(Entity),

    /// `spawn` was given an identifier that is still live and the store is
    /// configured to refuse reuse.
    #[error("{0} is already live")]
    EntityAlreadyExists(Entity),

    /// The component identifier was never declared or has been released.
    #[error("{0} is not a declared component")]
    ComponentKindNotFound(ComponentId),

    /// `declare_pool`/`declare_tag` was given an identifier that is already
    /// declared.
    #[error("{component} is already declared as a {kind}")]
    ComponentAlreadyDeclared {
        component: ComponentId,
        kind: ComponentKind,
    },

    /// The entity does not carry the requested component.
    #[error("{entity} carries no {component}")]
    EntityDataNotFound {
        entity: Entity,
        component: ComponentId,
    },

    /// A pool operation was applied to a tag.
    #[error("pool operation on {entity} with tag component {component}")]
    InvalidPool {
        entity: Entity,
        component: ComponentId,
    },

    /// A tag operation was applied to a pool.
    #[error("tag operation on {entity} with pool component {component}")]
    InvalidTag {
        entity: Entity,
        component: ComponentId,
    },

    /// The stored value is not of the requested Rust type.
    #[error("{component} on {entity} holds {stored}, not {requested}")]
    TypeMismatch {
        entity: Entity,
        component: ComponentId,
        stored: &'static str,
        requested: &'static str,
    },

    /// A projection was requested with a tuple whose arity differs from the
    /// number of selected components.
    #[error("selection has {selected} components but the requested tuple has {requested}")]
    SelectionArity { selected: usize, requested: usize },

    /// A prototype was instantiated into a store it is not bound to.
    #[error("prototype is bound to a different store")]
    ForeignStore,
}
