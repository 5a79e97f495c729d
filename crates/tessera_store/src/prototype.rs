//! Component-shape templates.
//!
//! A [`Prototype`] records which components a new entity should start with
//! and how to construct each value. Constructors run once per instantiation,
//! so two instances never share a value.

use std::any::Any;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::component::ComponentValue;
use crate::entity::{ComponentId, Entity, StoreId};
use crate::error::StoreError;
use crate::store::Store;

type Constructor = Rc<dyn Fn() -> Box<dyn ComponentValue>>;

#[derive(Clone)]
enum Entry {
    Pool {
        component: ComponentId,
        construct: Constructor,
    },
    Tag {
        component: ComponentId,
    },
}

impl Entry {
    fn component(&self) -> ComponentId {
        match self {
            Entry::Pool { component, .. } | Entry::Tag { component } => *component,
        }
    }
}

/// A reusable list of component entries bound to one store.
///
/// ```rust
/// use tessera_store::{Prototype, Store};
///
/// # fn main() -> Result<(), tessera_store::StoreError> {
/// let mut store = Store::new();
/// let pos = store.declare_pool(None)?;
/// let vel = store.declare_pool(None)?;
///
/// let movable = Prototype::new(&store)
///     .set(pos, || (0.0_f32, 0.0_f32))
///     .set(vel, || (5.0_f32, 5.0_f32));
///
/// let knight = movable.instantiate(&mut store, None)?;
/// let goblin = movable.instantiate(&mut store, None)?;
/// store.get_mut::<(f32, f32)>(goblin, pos)?.0 = 100.0;
/// assert_eq!(store.get::<(f32, f32)>(knight, pos)?.0, 0.0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Prototype {
    store: StoreId,
    entries: Vec<Entry>,
}

impl Prototype {
    /// Create an empty prototype bound to `store`.
    #[must_use]
    pub fn new(store: &Store) -> Self {
        Self {
            store: store.id(),
            entries: Vec::new(),
        }
    }

    /// Append a pool entry. `constructor` runs once per instantiation.
    #[must_use]
    pub fn set<T, F>(mut self, component: ComponentId, constructor: F) -> Self
    where
        T: Any + Clone,
        F: Fn() -> T + 'static,
    {
        self.entries.push(Entry::Pool {
            component,
            construct: Rc::new(move || Box::new(constructor())),
        });
        self
    }

    /// Append a tag entry.
    #[must_use]
    pub fn tag(mut self, component: ComponentId) -> Self {
        self.entries.push(Entry::Tag { component });
        self
    }

    /// Append every entry of `other`, after the existing ones.
    #[must_use]
    pub fn extend(mut self, other: &Prototype) -> Self {
        self.entries.extend(other.entries.iter().cloned());
        self
    }

    /// Bind future instantiations to a different store.
    pub fn retarget(&mut self, store: &Store) -> &mut Self {
        self.store = store.id();
        self
    }

    /// The store this prototype is bound to.
    #[must_use]
    pub fn bound_to(&self) -> StoreId {
        self.store
    }

    /// Components in entry order. A component may appear more than once; the
    /// last entry wins.
    pub fn components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.entries.iter().map(Entry::component)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn an entity (with `id` if given) and apply every entry in
    /// registration order.
    ///
    /// If an entry fails, a freshly spawned entity is despawned again before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// [`StoreError::ForeignStore`] if `store` is not the bound store,
    /// otherwise any error from [`Store::spawn`], [`Store::set`] or
    /// [`Store::tag`].
    pub fn instantiate(&self, store: &mut Store, id: Option<Entity>) -> Result<Entity, StoreError> {
        if store.id() != self.store {
            return Err(StoreError::ForeignStore);
        }

        let fresh = id.is_none_or(|entity| !store.is_alive(entity));
        let entity = store.spawn(id)?;
        if let Err(err) = self.apply(store, entity) {
            if fresh && let Err(cleanup) = store.despawn(entity) {
                warn!(%entity, error = %cleanup, "failed to despawn partial instance");
            }
            return Err(err);
        }

        debug!(%entity, entries = self.entries.len(), "instantiated prototype");
        Ok(entity)
    }

    fn apply(&self, store: &mut Store, entity: Entity) -> Result<(), StoreError> {
        for entry in &self.entries {
            match entry {
                Entry::Pool {
                    component,
                    construct,
                } => store.set_boxed(entity, *component, construct())?,
                Entry::Tag { component } => store.tag(entity, *component)?,
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Prototype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prototype")
            .field("store", &self.store)
            .field("components", &self.components().collect::<Vec<_>>())
            .finish()
    }
}
