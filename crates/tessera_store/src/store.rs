//! The component store: the single source of truth for what exists.
//!
//! The [`Store`] keeps two indices in lockstep:
//!
//! - a membership index, entity → set of carried component ids;
//! - one column per declared component: pool values keyed by entity, or the
//!   carrier set of a tag.
//!
//! Every attach/detach is forwarded to the [`ViewSink`]s subscribed under
//! that component, after both indices have been updated.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Weak;

use tracing::{debug, trace};

use crate::component::{ComponentKind, ComponentSet, ComponentValue};
use crate::config::{RespawnPolicy, StoreConfig};
use crate::entity::{ComponentId, Entity, IdSource, RandomIds, StoreId};
use crate::error::StoreError;
use crate::filter::Filter;
use crate::handle::EntityMut;
use crate::sink::ViewSink;

/// Handle returned by [`Store::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    sink: Weak<RefCell<dyn ViewSink>>,
}

impl Subscriber {
    fn is_live(&self) -> bool {
        self.sink.strong_count() > 0
    }
}

/// A subscription as requested, kept so it can be re-attached when one of
/// its components is declared again after a release.
struct Subscription {
    filter: Filter,
    sink: Weak<RefCell<dyn ViewSink>>,
}

enum Column {
    Pool(HashMap<Entity, Box<dyn ComponentValue>>),
    Tag(HashSet<Entity>),
}

impl Column {
    fn kind(&self) -> ComponentKind {
        match self {
            Column::Pool(_) => ComponentKind::Pool,
            Column::Tag(_) => ComponentKind::Tag,
        }
    }

    fn len(&self) -> usize {
        match self {
            Column::Pool(values) => values.len(),
            Column::Tag(carriers) => carriers.len(),
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = Entity> + '_> {
        match self {
            Column::Pool(values) => Box::new(values.keys().copied()),
            Column::Tag(carriers) => Box::new(carriers.iter().copied()),
        }
    }

    fn remove(&mut self, entity: Entity) -> bool {
        match self {
            Column::Pool(values) => values.remove(&entity).is_some(),
            Column::Tag(carriers) => carriers.remove(&entity),
        }
    }
}

struct ComponentRecord {
    column: Column,
    /// Sinks whose filter requires this component.
    including: Vec<Subscriber>,
    /// Sinks whose filter forbids this component.
    excluding: Vec<Subscriber>,
}

impl ComponentRecord {
    fn new(column: Column) -> Self {
        Self {
            column,
            including: Vec::new(),
            excluding: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Attached,
    Detached,
}

/// Entity-component storage.
pub struct Store {
    id: StoreId,
    config: StoreConfig,
    ids: Box<dyn IdSource>,
    entities: HashMap<Entity, ComponentSet>,
    components: HashMap<ComponentId, ComponentRecord>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    next_subscription: u64,
}

impl Store {
    /// Create an empty store with the default configuration and random ids.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with the given configuration.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_ids(config, RandomIds)
    }

    /// Create an empty store drawing fresh identifiers from `ids`.
    #[must_use]
    pub fn with_ids(config: StoreConfig, ids: impl IdSource + 'static) -> Self {
        Self {
            id: StoreId::generate(),
            config,
            ids: Box::new(ids),
            entities: HashMap::new(),
            components: HashMap::new(),
            subscriptions: HashMap::new(),
            next_subscription: 1,
        }
    }

    /// Identity of this store.
    #[must_use]
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// The store's configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -- Entity lifecycle --

    /// Spawn an entity with no components.
    ///
    /// With `id` the entity takes that identifier; if it is already live the
    /// configured [`RespawnPolicy`] decides between failing and reuse.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityAlreadyExists`] under [`RespawnPolicy::Fail`].
    pub fn spawn(&mut self, id: Option<Entity>) -> Result<Entity, StoreError> {
        let entity = match id {
            Some(entity) => entity,
            None => self.fresh_entity(),
        };

        if self.entities.contains_key(&entity) {
            return match self.config.respawn {
                RespawnPolicy::Fail => Err(StoreError::EntityAlreadyExists(entity)),
                RespawnPolicy::Reuse => {
                    debug!(%entity, "reusing live entity");
                    Ok(entity)
                }
            };
        }

        self.entities.insert(entity, ComponentSet::new());
        debug!(%entity, "spawned entity");
        Ok(entity)
    }

    /// Despawn an entity, detaching every component first so that views are
    /// notified.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] if the entity is not live, including a
    /// second despawn of the same entity.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), StoreError> {
        let carried: Vec<ComponentId> = self
            .entities
            .get(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?
            .iter()
            .copied()
            .collect();

        for component in carried {
            self.detach(entity, component);
        }
        self.entities.remove(&entity);
        debug!(%entity, "despawned entity");
        Ok(())
    }

    /// Returns a chaining handle to a live entity.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] if the entity is not live.
    pub fn entity(&mut self, entity: Entity) -> Result<EntityMut<'_>, StoreError> {
        if !self.is_alive(entity) {
            return Err(StoreError::EntityNotFound(entity));
        }
        Ok(EntityMut::new(self, entity))
    }

    /// Returns a chaining handle, spawning the entity first unless `id`
    /// names a live one.
    ///
    /// # Errors
    ///
    /// Never fails for a live or fresh identifier; propagates `spawn`
    /// errors otherwise.
    pub fn handle(&mut self, id: Option<Entity>) -> Result<EntityMut<'_>, StoreError> {
        let entity = match id {
            Some(entity) if self.is_alive(entity) => entity,
            other => self.spawn(other)?,
        };
        Ok(EntityMut::new(self, entity))
    }

    /// Returns `true` if the entity is live.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Iterate over every live entity.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().copied()
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// The components an entity carries.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] if the entity is not live.
    pub fn components_of(&self, entity: Entity) -> Result<&ComponentSet, StoreError> {
        self.entities
            .get(&entity)
            .ok_or(StoreError::EntityNotFound(entity))
    }

    // -- Component declarations --

    /// Declare a value-bearing component.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentAlreadyDeclared`] if `id` is already declared.
    pub fn declare_pool(&mut self, id: Option<ComponentId>) -> Result<ComponentId, StoreError> {
        self.declare(id, Column::Pool(HashMap::new()))
    }

    /// Declare a presence-only component.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentAlreadyDeclared`] if `id` is already declared.
    pub fn declare_tag(&mut self, id: Option<ComponentId>) -> Result<ComponentId, StoreError> {
        self.declare(id, Column::Tag(HashSet::new()))
    }

    fn declare(&mut self, id: Option<ComponentId>, column: Column) -> Result<ComponentId, StoreError> {
        let component = match id {
            Some(component) => component,
            None => self.fresh_component(),
        };
        if let Some(existing) = self.components.get(&component) {
            return Err(StoreError::ComponentAlreadyDeclared {
                component,
                kind: existing.column.kind(),
            });
        }

        let kind = column.kind();
        let mut record = ComponentRecord::new(column);
        for (&subscription_id, subscription) in &self.subscriptions {
            if subscription.sink.strong_count() == 0 {
                continue;
            }
            let subscriber = || Subscriber {
                id: subscription_id,
                sink: subscription.sink.clone(),
            };
            if subscription.filter.include().contains(&component) {
                record.including.push(subscriber());
            }
            if subscription.filter.exclude().contains(&component) {
                record.excluding.push(subscriber());
            }
        }

        debug!(
            %component,
            %kind,
            resubscribed = record.including.len() + record.excluding.len(),
            "declared component"
        );
        self.components.insert(component, record);
        Ok(component)
    }

    /// Detach a component from every entity carrying it, then forget it.
    ///
    /// Views subscribed under the component are notified for every carrier.
    /// Their subscriptions come back if the same id is declared again.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentKindNotFound`] if the component is undeclared.
    pub fn release(&mut self, component: ComponentId) -> Result<(), StoreError> {
        let carriers: Vec<Entity> = self
            .components
            .get(&component)
            .ok_or(StoreError::ComponentKindNotFound(component))?
            .column
            .iter()
            .collect();

        for entity in &carriers {
            self.detach(*entity, component);
        }
        self.components.remove(&component);
        debug!(%component, carriers = carriers.len(), "released component");
        Ok(())
    }

    /// Returns `true` if the component is declared.
    #[must_use]
    pub fn is_declared(&self, component: ComponentId) -> bool {
        self.components.contains_key(&component)
    }

    /// How the component was declared, if it is.
    #[must_use]
    pub fn kind_of(&self, component: ComponentId) -> Option<ComponentKind> {
        self.components.get(&component).map(|r| r.column.kind())
    }

    /// Number of declared components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Iterate over the entities carrying a component. Empty for undeclared
    /// components.
    pub fn carriers(&self, component: ComponentId) -> impl Iterator<Item = Entity> + '_ {
        self.components
            .get(&component)
            .into_iter()
            .flat_map(|record| record.column.iter())
    }

    /// Number of entities carrying a component.
    #[must_use]
    pub fn carrier_count(&self, component: ComponentId) -> usize {
        self.components
            .get(&component)
            .map_or(0, |record| record.column.len())
    }

    // -- Component operations --

    /// Attach a pool component, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`], [`StoreError::ComponentKindNotFound`],
    /// or [`StoreError::InvalidPool`] if `component` is a tag.
    pub fn set<T: Any + Clone>(
        &mut self,
        entity: Entity,
        component: ComponentId,
        value: T,
    ) -> Result<(), StoreError> {
        self.set_boxed(entity, component, Box::new(value))
    }

    pub(crate) fn set_boxed(
        &mut self,
        entity: Entity,
        component: ComponentId,
        value: Box<dyn ComponentValue>,
    ) -> Result<(), StoreError> {
        let carried = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        let record = self
            .components
            .get_mut(&component)
            .ok_or(StoreError::ComponentKindNotFound(component))?;
        let Column::Pool(values) = &mut record.column else {
            return Err(StoreError::InvalidPool { entity, component });
        };

        values.insert(entity, value);
        carried.insert(component);
        self.notify(entity, component, Change::Attached);
        Ok(())
    }

    /// Attach a tag component.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`], [`StoreError::ComponentKindNotFound`],
    /// or [`StoreError::InvalidTag`] if `component` is a pool.
    pub fn tag(&mut self, entity: Entity, component: ComponentId) -> Result<(), StoreError> {
        let carried = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        let record = self
            .components
            .get_mut(&component)
            .ok_or(StoreError::ComponentKindNotFound(component))?;
        let Column::Tag(carriers) = &mut record.column else {
            return Err(StoreError::InvalidTag { entity, component });
        };

        carriers.insert(entity);
        carried.insert(component);
        self.notify(entity, component, Change::Attached);
        Ok(())
    }

    /// Detach a pool component.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`], [`StoreError::ComponentKindNotFound`],
    /// [`StoreError::InvalidPool`] if `component` is a tag, or
    /// [`StoreError::EntityDataNotFound`] if the entity does not carry it.
    pub fn unset(&mut self, entity: Entity, component: ComponentId) -> Result<(), StoreError> {
        self.detach_checked(entity, component, ComponentKind::Pool)
    }

    /// Detach a tag component.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`], [`StoreError::ComponentKindNotFound`],
    /// [`StoreError::InvalidTag`] if `component` is a pool, or
    /// [`StoreError::EntityDataNotFound`] if the entity does not carry it.
    pub fn untag(&mut self, entity: Entity, component: ComponentId) -> Result<(), StoreError> {
        self.detach_checked(entity, component, ComponentKind::Tag)
    }

    fn detach_checked(
        &mut self,
        entity: Entity,
        component: ComponentId,
        expected: ComponentKind,
    ) -> Result<(), StoreError> {
        let carried = self
            .entities
            .get(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        let record = self
            .components
            .get(&component)
            .ok_or(StoreError::ComponentKindNotFound(component))?;
        match (expected, record.column.kind()) {
            (ComponentKind::Pool, ComponentKind::Tag) => {
                return Err(StoreError::InvalidPool { entity, component });
            }
            (ComponentKind::Tag, ComponentKind::Pool) => {
                return Err(StoreError::InvalidTag { entity, component });
            }
            _ => {}
        }
        if !carried.contains(&component) {
            return Err(StoreError::EntityDataNotFound { entity, component });
        }

        self.detach(entity, component);
        Ok(())
    }

    /// Remove a component from both indices and notify. The caller has
    /// already validated the pair.
    fn detach(&mut self, entity: Entity, component: ComponentId) {
        if let Some(record) = self.components.get_mut(&component) {
            record.column.remove(entity);
        }
        if let Some(carried) = self.entities.get_mut(&entity) {
            carried.remove(&component);
        }
        self.notify(entity, component, Change::Detached);
    }

    /// Read a pool value.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentKindNotFound`] for undeclared components,
    /// [`StoreError::InvalidPool`] for tags, [`StoreError::EntityNotFound`]
    /// for dead entities, [`StoreError::EntityDataNotFound`] if the entity
    /// lacks the component and [`StoreError::TypeMismatch`] if the value is
    /// not a `T`.
    pub fn get<T: Any>(&self, entity: Entity, component: ComponentId) -> Result<&T, StoreError> {
        let value = self.get_value(entity, component)?;
        let stored = value.value_type_name();
        value
            .as_any()
            .downcast_ref::<T>()
            .ok_or(StoreError::TypeMismatch {
                entity,
                component,
                stored,
                requested: std::any::type_name::<T>(),
            })
    }

    /// Mutable access to a pool value. Views are not notified: the entity's
    /// component set does not change.
    ///
    /// # Errors
    ///
    /// Same as [`Store::get`].
    pub fn get_mut<T: Any>(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<&mut T, StoreError> {
        let value = self.value_slot_mut(entity, component)?;
        let stored = value.value_type_name();
        value
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(StoreError::TypeMismatch {
                entity,
                component,
                stored,
                requested: std::any::type_name::<T>(),
            })
    }

    /// Read a pool value without naming its type.
    ///
    /// # Errors
    ///
    /// Same as [`Store::get`], minus the type check.
    pub fn get_value(
        &self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<&(dyn ComponentValue + 'static), StoreError> {
        let record = self
            .components
            .get(&component)
            .ok_or(StoreError::ComponentKindNotFound(component))?;
        let Column::Pool(values) = &record.column else {
            return Err(StoreError::InvalidPool { entity, component });
        };
        if !self.is_alive(entity) {
            return Err(StoreError::EntityNotFound(entity));
        }
        values
            .get(&entity)
            .map(|value| &**value)
            .ok_or(StoreError::EntityDataNotFound { entity, component })
    }

    fn value_slot_mut(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<&mut (dyn ComponentValue + 'static), StoreError> {
        let alive = self.entities.contains_key(&entity);
        let record = self
            .components
            .get_mut(&component)
            .ok_or(StoreError::ComponentKindNotFound(component))?;
        let Column::Pool(values) = &mut record.column else {
            return Err(StoreError::InvalidPool { entity, component });
        };
        if !alive {
            return Err(StoreError::EntityNotFound(entity));
        }
        values
            .get_mut(&entity)
            .map(|value| &mut **value)
            .ok_or(StoreError::EntityDataNotFound { entity, component })
    }

    /// Returns `true` if a live entity carries the component. Unknown
    /// entities and components yield `false`.
    #[must_use]
    pub fn has(&self, entity: Entity, component: ComponentId) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|carried| carried.contains(&component))
    }

    /// Copy every component of `src` onto `dst`.
    ///
    /// Pool values are cloned, so the copy never aliases the original; tags
    /// are re-tagged. Existing values on `dst` are overwritten.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] if either entity is not live.
    pub fn copy(&mut self, src: Entity, dst: Entity) -> Result<(), StoreError> {
        if !self.is_alive(dst) {
            return Err(StoreError::EntityNotFound(dst));
        }
        let carried = self.components_of(src)?;

        let mut pools = Vec::new();
        let mut tags = Vec::new();
        for &component in carried {
            match self.components.get(&component).map(|r| &r.column) {
                Some(Column::Pool(values)) => {
                    if let Some(value) = values.get(&src) {
                        pools.push((component, (**value).clone_boxed()));
                    }
                }
                Some(Column::Tag(_)) => tags.push(component),
                None => {}
            }
        }

        for (component, value) in pools {
            self.set_boxed(dst, component, value)?;
        }
        for component in tags {
            self.tag(dst, component)?;
        }
        trace!(%src, %dst, "copied components");
        Ok(())
    }

    /// Spawn `dst` (or a fresh entity) and copy every component of `src`
    /// onto it.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] if `src` is not live, or any
    /// [`Store::spawn`] error.
    pub fn clone_entity(&mut self, src: Entity, dst: Option<Entity>) -> Result<Entity, StoreError> {
        if !self.is_alive(src) {
            return Err(StoreError::EntityNotFound(src));
        }
        let entity = self.spawn(dst)?;
        self.copy(src, entity)?;
        Ok(entity)
    }

    // -- Subscriptions --

    /// Subscribe a sink under a filter's include and exclude components.
    ///
    /// The store holds the sink weakly: once every strong reference is
    /// dropped, the subscription lapses and is pruned on the next
    /// subscribe, unsubscribe or fan-out.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentKindNotFound`] if the filter mentions an
    /// undeclared component. Nothing is subscribed in that case.
    pub fn subscribe(
        &mut self,
        filter: &Filter,
        sink: Weak<RefCell<dyn ViewSink>>,
    ) -> Result<SubscriptionId, StoreError> {
        if let Some(missing) = filter.components().find(|c| !self.is_declared(*c)) {
            return Err(StoreError::ComponentKindNotFound(missing));
        }

        self.prune_lapsed();
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;

        for component in filter.include() {
            if let Some(record) = self.components.get_mut(component) {
                record.including.push(Subscriber {
                    id,
                    sink: sink.clone(),
                });
            }
        }
        for component in filter.exclude() {
            if let Some(record) = self.components.get_mut(component) {
                record.excluding.push(Subscriber {
                    id,
                    sink: sink.clone(),
                });
            }
        }
        self.subscriptions.insert(
            id,
            Subscription {
                filter: filter.clone(),
                sink,
            },
        );
        Ok(id)
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.remove(&id);
        for record in self.components.values_mut() {
            record.including.retain(|s| s.id != id);
            record.excluding.retain(|s| s.id != id);
        }
        self.prune_lapsed();
    }

    /// Number of subscriptions whose sink is still alive.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .values()
            .filter(|s| s.sink.strong_count() > 0)
            .count()
    }

    fn prune_lapsed(&mut self) {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|_, s| s.sink.strong_count() > 0);
        if self.subscriptions.len() == before {
            return;
        }

        for record in self.components.values_mut() {
            record.including.retain(Subscriber::is_live);
            record.excluding.retain(Subscriber::is_live);
        }
        trace!(pruned = before - self.subscriptions.len(), "pruned lapsed subscriptions");
    }

    /// Number of live subscriptions under a component, both lists combined.
    #[must_use]
    pub fn subscriber_count(&self, component: ComponentId) -> usize {
        self.components.get(&component).map_or(0, |record| {
            record
                .including
                .iter()
                .chain(record.excluding.iter())
                .filter(|s| s.is_live())
                .count()
        })
    }

    fn notify(&mut self, entity: Entity, component: ComponentId, change: Change) {
        let Some(record) = self.components.get_mut(&component) else {
            return;
        };
        let Some(carried) = self.entities.get(&entity) else {
            return;
        };

        record.including.retain(Subscriber::is_live);
        record.excluding.retain(Subscriber::is_live);
        trace!(
            %entity,
            %component,
            ?change,
            including = record.including.len(),
            excluding = record.excluding.len(),
            "notifying views"
        );

        for subscriber in &record.including {
            if let Some(sink) = subscriber.sink.upgrade() {
                match change {
                    Change::Attached => sink.borrow_mut().recheck(entity, carried),
                    Change::Detached => sink.borrow_mut().reject(entity),
                }
            }
        }
        for subscriber in &record.excluding {
            if let Some(sink) = subscriber.sink.upgrade() {
                match change {
                    Change::Attached => sink.borrow_mut().reject(entity),
                    Change::Detached => sink.borrow_mut().recheck(entity, carried),
                }
            }
        }
    }

    // -- Identifier allocation --

    fn fresh_entity(&mut self) -> Entity {
        loop {
            let entity = Entity::from_uuid(self.ids.next_uuid());
            if !self.entities.contains_key(&entity) {
                return entity;
            }
        }
    }

    fn fresh_component(&mut self) -> ComponentId {
        loop {
            let component = ComponentId::from_uuid(self.ids.next_uuid());
            if !self.components.contains_key(&component) {
                return component;
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .field("components", &self.components.len())
            .finish()
    }
}
