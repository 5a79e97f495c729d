//! Chaining handle over a single entity.

use std::any::Any;

use crate::entity::{ComponentId, Entity};
use crate::error::StoreError;
use crate::store::Store;

/// A mutable borrow of the store focused on one entity.
///
/// ```rust
/// use tessera_store::Store;
///
/// # fn main() -> Result<(), tessera_store::StoreError> {
/// let mut store = Store::new();
/// let hp = store.declare_pool(None)?;
/// let boss = store.declare_tag(None)?;
///
/// let entity = store.handle(None)?.set(hp, 100_u32)?.tag(boss)?.id();
/// assert!(store.has(entity, boss));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EntityMut<'s> {
    store: &'s mut Store,
    entity: Entity,
}

impl<'s> EntityMut<'s> {
    pub(crate) fn new(store: &'s mut Store, entity: Entity) -> Self {
        Self { store, entity }
    }

    /// The entity this handle points at.
    #[must_use]
    pub fn id(&self) -> Entity {
        self.entity
    }

    /// See [`Store::set`].
    ///
    /// # Errors
    ///
    /// Same as [`Store::set`].
    pub fn set<T: Any + Clone>(
        &mut self,
        component: ComponentId,
        value: T,
    ) -> Result<&mut Self, StoreError> {
        self.store.set(self.entity, component, value)?;
        Ok(self)
    }

    /// See [`Store::tag`].
    ///
    /// # Errors
    ///
    /// Same as [`Store::tag`].
    pub fn tag(&mut self, component: ComponentId) -> Result<&mut Self, StoreError> {
        self.store.tag(self.entity, component)?;
        Ok(self)
    }

    /// See [`Store::unset`].
    ///
    /// # Errors
    ///
    /// Same as [`Store::unset`].
    pub fn unset(&mut self, component: ComponentId) -> Result<&mut Self, StoreError> {
        self.store.unset(self.entity, component)?;
        Ok(self)
    }

    /// See [`Store::untag`].
    ///
    /// # Errors
    ///
    /// Same as [`Store::untag`].
    pub fn untag(&mut self, component: ComponentId) -> Result<&mut Self, StoreError> {
        self.store.untag(self.entity, component)?;
        Ok(self)
    }

    /// See [`Store::get`].
    ///
    /// # Errors
    ///
    /// Same as [`Store::get`].
    pub fn get<T: Any>(&self, component: ComponentId) -> Result<&T, StoreError> {
        self.store.get(self.entity, component)
    }

    /// See [`Store::get_mut`].
    ///
    /// # Errors
    ///
    /// Same as [`Store::get_mut`].
    pub fn get_mut<T: Any>(&mut self, component: ComponentId) -> Result<&mut T, StoreError> {
        self.store.get_mut(self.entity, component)
    }

    /// See [`Store::has`].
    #[must_use]
    pub fn has(&self, component: ComponentId) -> bool {
        self.store.has(self.entity, component)
    }

    /// Despawn the entity, consuming the handle.
    ///
    /// # Errors
    ///
    /// Same as [`Store::despawn`].
    pub fn despawn(self) -> Result<Entity, StoreError> {
        self.store.despawn(self.entity)?;
        Ok(self.entity)
    }
}
