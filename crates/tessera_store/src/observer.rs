//! Incrementally maintained views.
//!
//! An [`Observer`] keeps the set of entities matching its [`Filter`] up to
//! date at every mutation: the store notifies it through [`ViewSink`] each
//! time a component it filters on is attached or detached. There is no
//! rebuild step, but an observer registered after entities already exist
//! must [`scan`](Observer::scan) once to catch up.
//!
//! ```rust
//! use tessera_store::{Filter, Observer, Store};
//!
//! # fn main() -> Result<(), tessera_store::StoreError> {
//! let mut store = Store::new();
//! let pos = store.declare_pool(None)?;
//! let frozen = store.declare_tag(None)?;
//!
//! let mut movers = Observer::new(Filter::new().with(pos).without(frozen));
//! movers.register(&mut store)?;
//!
//! let e = store.spawn(None)?;
//! store.set(e, pos, (0.0_f32, 0.0_f32))?;
//! assert!(movers.contains(e));
//!
//! store.tag(e, frozen)?;
//! assert!(!movers.contains(e));
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;

use crate::component::ComponentSet;
use crate::entity::{ComponentId, Entity};
use crate::error::StoreError;
use crate::fetch::{Fetch, check_arity};
use crate::filter::Filter;
use crate::sink::ViewSink;
use crate::store::{Store, SubscriptionId};

#[derive(Debug)]
struct Matched {
    filter: Filter,
    entities: HashSet<Entity>,
}

impl ViewSink for Matched {
    fn recheck(&mut self, entity: Entity, carried: &ComponentSet) {
        if self.filter.matches(carried) {
            self.entities.insert(entity);
        } else {
            self.entities.remove(&entity);
        }
    }

    fn reject(&mut self, entity: Entity) {
        self.entities.remove(&entity);
    }
}

/// A live, filter-defined set of entities.
///
/// The matched set is shared with the store through a weak reference, so
/// dropping the observer ends its subscription. Accessors return snapshots;
/// no borrow of the matched set outlives a call.
#[derive(Debug)]
pub struct Observer {
    state: Rc<RefCell<Matched>>,
    selection: Vec<ComponentId>,
    subscription: Option<SubscriptionId>,
}

impl Observer {
    /// Create an unregistered observer.
    #[must_use]
    pub fn new(filter: Filter) -> Self {
        Self {
            state: Rc::new(RefCell::new(Matched {
                filter,
                entities: HashSet::new(),
            })),
            selection: Vec::new(),
            subscription: None,
        }
    }

    /// Append components to the projection used by [`Observer::fetch`].
    #[must_use]
    pub fn select(mut self, components: impl IntoIterator<Item = ComponentId>) -> Self {
        self.selection.extend(components);
        self
    }

    /// Remove components from the projection.
    #[must_use]
    pub fn deselect(mut self, components: impl IntoIterator<Item = ComponentId>) -> Self {
        for component in components {
            if let Some(pos) = self.selection.iter().position(|c| *c == component) {
                self.selection.remove(pos);
            }
        }
        self
    }

    /// Register with `store` and scan it, in one step.
    ///
    /// # Errors
    ///
    /// Same as [`Observer::register`].
    pub fn init(mut self, store: &mut Store) -> Result<Self, StoreError> {
        self.register(store)?;
        self.scan(store);
        Ok(self)
    }

    /// Subscribe to `store` under the filter's include and exclude sets.
    ///
    /// A previous registration is replaced. Entities that already exist are
    /// not picked up until [`Observer::scan`] runs.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentKindNotFound`] if the filter mentions an
    /// undeclared component.
    pub fn register(&mut self, store: &mut Store) -> Result<&mut Self, StoreError> {
        if let Some(previous) = self.subscription.take() {
            store.unsubscribe(previous);
        }

        let sink: Rc<RefCell<dyn ViewSink>> = self.state.clone();
        let filter = self.state.borrow().filter.clone();
        let id = store.subscribe(&filter, Rc::downgrade(&sink))?;
        self.subscription = Some(id);

        debug!(
            subscription = ?id,
            include = filter.include().len(),
            exclude = filter.exclude().len(),
            "registered observer"
        );
        Ok(self)
    }

    /// Unsubscribe from `store` and forget every matched entity.
    pub fn dispose(&mut self, store: &mut Store) {
        if let Some(id) = self.subscription.take() {
            store.unsubscribe(id);
            debug!(subscription = ?id, "disposed observer");
        }
        self.state.borrow_mut().entities.clear();
    }

    /// Returns `true` while subscribed to a store.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.subscription.is_some()
    }

    /// Re-evaluate one entity against the current store state. Dead
    /// entities are rejected.
    pub fn recheck(&self, store: &Store, entity: Entity) {
        let mut state = self.state.borrow_mut();
        match store.components_of(entity) {
            Ok(carried) => state.recheck(entity, carried),
            Err(_) => state.reject(entity),
        }
    }

    /// Drop one entity from the matched set. No-op if it is absent.
    pub fn reject(&self, entity: Entity) {
        self.state.borrow_mut().reject(entity);
    }

    /// Recheck every entity carrying at least one include component.
    pub fn scan(&self, store: &Store) {
        let mut state = self.state.borrow_mut();
        let include: Vec<ComponentId> = state.filter.include().iter().copied().collect();
        for component in include {
            for entity in store.carriers(component) {
                if let Ok(carried) = store.components_of(entity) {
                    state.recheck(entity, carried);
                }
            }
        }
        debug!(matched = state.entities.len(), "scanned observer");
    }

    /// The filter this observer maintains.
    #[must_use]
    pub fn filter(&self) -> Filter {
        self.state.borrow().filter.clone()
    }

    /// The projection used by [`Observer::fetch`].
    #[must_use]
    pub fn selection(&self) -> &[ComponentId] {
        &self.selection
    }

    /// Snapshot of the matched entities.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.state.borrow().entities.iter().copied().collect()
    }

    /// Returns `true` if `entity` is currently matched.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.state.borrow().entities.contains(&entity)
    }

    /// Number of matched entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().entities.len()
    }

    /// Returns `true` if nothing is matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().entities.is_empty()
    }

    /// Project the matched entities through the selection.
    ///
    /// The tuple type `F` must have one element per selected component, in
    /// selection order. The entity list is snapshotted up front.
    ///
    /// # Errors
    ///
    /// [`StoreError::SelectionArity`] up front; per item, any
    /// [`Store::get`] error.
    pub fn fetch<'s, F: Fetch>(
        &self,
        store: &'s Store,
    ) -> Result<
        impl Iterator<Item = Result<(Entity, F::Item<'s>), StoreError>> + use<'s, F>,
        StoreError,
    > {
        check_arity::<F>(self.selection.len())?;
        let selection = self.selection.clone();
        let entities = self.entities();
        Ok(entities
            .into_iter()
            .map(move |entity| F::fetch(store, entity, &selection).map(|item| (entity, item))))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::config::StoreConfig;
    use crate::entity::SequentialIds;
    use crate::query::Query;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Vec2 {
        x: f32,
        y: f32,
    }

    struct Scene {
        store: Store,
        pos: ComponentId,
        vel: ComponentId,
        frozen: ComponentId,
    }

    fn make_scene() -> Scene {
        let mut store = Store::with_ids(StoreConfig::default(), SequentialIds::new());
        let pos = store.declare_pool(Some(ComponentId::named("position"))).unwrap();
        let vel = store.declare_pool(Some(ComponentId::named("velocity"))).unwrap();
        let frozen = store.declare_tag(Some(ComponentId::named("frozen"))).unwrap();
        Scene {
            store,
            pos,
            vel,
            frozen,
        }
    }

    fn mover(scene: &mut Scene) -> Entity {
        let e = scene.store.spawn(None).unwrap();
        scene.store.set(e, scene.pos, Vec2 { x: 0.0, y: 0.0 }).unwrap();
        scene.store.set(e, scene.vel, Vec2 { x: 1.0, y: 1.0 }).unwrap();
        e
    }

    fn brute_force(store: &Store, filter: &Filter) -> HashSet<Entity> {
        store
            .entities()
            .filter(|e| filter.matches(store.components_of(*e).unwrap()))
            .collect()
    }

    #[test]
    fn test_frozen_scenario() {
        let mut scene = make_scene();
        let filter = Filter::new()
            .with(scene.pos)
            .with(scene.vel)
            .without(scene.frozen);
        let mut moveables = Observer::new(filter);
        moveables.register(&mut scene.store).unwrap();

        let a = mover(&mut scene);
        let b = mover(&mut scene);
        scene.store.tag(b, scene.frozen).unwrap();

        assert!(moveables.contains(a));
        assert!(!moveables.contains(b));

        scene.store.tag(a, scene.frozen).unwrap();
        assert!(!moveables.contains(a));

        scene.store.untag(a, scene.frozen).unwrap();
        assert!(moveables.contains(a));
    }

    #[test]
    fn test_unset_include_removes() {
        let mut scene = make_scene();
        let mut observer = Observer::new(Filter::new().with(scene.pos));
        observer.register(&mut scene.store).unwrap();
        let a = mover(&mut scene);
        let b = mover(&mut scene);
        assert_eq!(observer.len(), 2);

        scene.store.unset(a, scene.pos).unwrap();
        scene.store.unset(b, scene.pos).unwrap();
        assert!(observer.is_empty());
    }

    #[test]
    fn test_late_registration_needs_scan() {
        let mut scene = make_scene();
        let a = mover(&mut scene);
        let mut observer = Observer::new(Filter::new().with(scene.pos).with(scene.vel));
        observer.register(&mut scene.store).unwrap();
        assert!(!observer.contains(a));

        observer.scan(&scene.store);
        assert!(observer.contains(a));
    }

    #[test]
    fn test_scan_matches_query_build() {
        let mut scene = make_scene();
        let mut entities = Vec::new();
        for i in 0..12 {
            let e = mover(&mut scene);
            if i % 3 == 0 {
                scene.store.tag(e, scene.frozen).unwrap();
            }
            if i % 4 == 0 {
                scene.store.unset(e, scene.vel).unwrap();
            }
            entities.push(e);
        }
        let filter = Filter::new()
            .with(scene.pos)
            .with(scene.vel)
            .without(scene.frozen);

        let observer = Observer::new(filter.clone()).init(&mut scene.store).unwrap();
        let mut query = Query::new(filter);
        query.build(&scene.store);

        let observed: HashSet<Entity> = observer.entities().into_iter().collect();
        let queried: HashSet<Entity> = query.iter().collect();
        assert_eq!(observed, queried);
        assert!(!observed.is_empty());
    }

    #[test]
    fn test_despawn_removes_from_view() {
        let mut scene = make_scene();
        let observer = Observer::new(Filter::new().with(scene.pos))
            .init(&mut scene.store)
            .unwrap();
        let a = mover(&mut scene);
        assert!(observer.contains(a));

        scene.store.despawn(a).unwrap();
        assert!(!observer.contains(a));
        assert!(!scene.store.has(a, scene.pos));
    }

    #[test]
    fn test_despawn_of_excluded_entity_leaves_view_clean() {
        let mut scene = make_scene();
        let observer = Observer::new(Filter::new().with(scene.pos).without(scene.frozen))
            .init(&mut scene.store)
            .unwrap();
        let a = mover(&mut scene);
        scene.store.tag(a, scene.frozen).unwrap();

        scene.store.despawn(a).unwrap();
        assert!(observer.is_empty());
    }

    #[test]
    fn test_release_of_included_component_empties_view() {
        let mut scene = make_scene();
        let observer = Observer::new(Filter::new().with(scene.vel))
            .init(&mut scene.store)
            .unwrap();
        mover(&mut scene);
        mover(&mut scene);
        assert_eq!(observer.len(), 2);

        scene.store.release(scene.vel).unwrap();
        assert!(observer.is_empty());
    }

    #[test]
    fn test_release_of_excluded_component_admits_entities() {
        let mut scene = make_scene();
        let observer = Observer::new(Filter::new().with(scene.pos).without(scene.frozen))
            .init(&mut scene.store)
            .unwrap();
        let a = mover(&mut scene);
        scene.store.tag(a, scene.frozen).unwrap();
        assert!(!observer.contains(a));

        scene.store.release(scene.frozen).unwrap();
        assert!(observer.contains(a));
    }

    #[test]
    fn test_redeclared_component_stays_observed() {
        let mut scene = make_scene();
        let filter = Filter::new().with(scene.pos).without(scene.frozen);
        let observer = Observer::new(filter.clone())
            .init(&mut scene.store)
            .unwrap();

        scene.store.release(scene.frozen).unwrap();
        scene.store.declare_tag(Some(scene.frozen)).unwrap();

        let e = scene.store.spawn(None).unwrap();
        scene.store.set(e, scene.pos, Vec2 { x: 0.0, y: 0.0 }).unwrap();
        assert!(observer.contains(e));
        scene.store.tag(e, scene.frozen).unwrap();
        assert!(!observer.contains(e));
        assert_eq!(
            observer.entities().into_iter().collect::<HashSet<_>>(),
            brute_force(&scene.store, &filter)
        );
    }

    #[test]
    fn test_redeclared_include_component_stays_observed() {
        let mut scene = make_scene();
        let observer = Observer::new(Filter::new().with(scene.vel))
            .init(&mut scene.store)
            .unwrap();
        mover(&mut scene);

        scene.store.release(scene.vel).unwrap();
        scene.store.declare_pool(Some(scene.vel)).unwrap();
        assert!(observer.is_empty());

        let e = mover(&mut scene);
        assert!(observer.contains(e));
        assert_eq!(observer.len(), 1);
    }

    #[test]
    fn test_copy_onto_watched_entity_updates_view() {
        let mut scene = make_scene();
        let filter = Filter::new().with(scene.pos).without(scene.frozen);
        let observer = Observer::new(filter.clone())
            .init(&mut scene.store)
            .unwrap();

        let frozen_mover = mover(&mut scene);
        scene.store.tag(frozen_mover, scene.frozen).unwrap();
        let bare = scene.store.spawn(None).unwrap();
        assert!(!observer.contains(bare));

        scene.store.copy(frozen_mover, bare).unwrap();
        assert!(!observer.contains(bare));

        let runner = mover(&mut scene);
        let twin = scene.store.clone_entity(runner, None).unwrap();
        assert!(observer.contains(twin));
        scene.store.get_mut::<Vec2>(twin, scene.pos).unwrap().x = 9.0;
        assert_eq!(scene.store.get::<Vec2>(runner, scene.pos).unwrap().x, 0.0);

        assert_eq!(
            observer.entities().into_iter().collect::<HashSet<_>>(),
            brute_force(&scene.store, &filter)
        );
    }

    #[test]
    fn test_empty_include_matches_nothing() {
        let mut scene = make_scene();
        let a = mover(&mut scene);
        scene.store.tag(a, scene.frozen).unwrap();
        let observer = Observer::new(Filter::new().without(scene.frozen))
            .init(&mut scene.store)
            .unwrap();

        scene.store.untag(a, scene.frozen).unwrap();
        assert!(observer.is_empty());
    }

    #[test]
    fn test_contradictory_filter_never_matches() {
        let mut scene = make_scene();
        let observer = Observer::new(Filter::new().with(scene.pos).without(scene.pos))
            .init(&mut scene.store)
            .unwrap();
        mover(&mut scene);
        assert!(observer.is_empty());
    }

    #[test]
    fn test_register_with_undeclared_component_fails() {
        let mut scene = make_scene();
        let mut observer = Observer::new(Filter::new().with(ComponentId::named("nothing")));
        assert!(matches!(
            observer.register(&mut scene.store),
            Err(StoreError::ComponentKindNotFound(_))
        ));
        assert!(!observer.is_registered());
    }

    #[test]
    fn test_register_twice_keeps_one_subscription() {
        let mut scene = make_scene();
        let mut observer = Observer::new(Filter::new().with(scene.pos));
        observer.register(&mut scene.store).unwrap();
        observer.register(&mut scene.store).unwrap();
        assert_eq!(scene.store.subscriber_count(scene.pos), 1);
    }

    #[test]
    fn test_dispose_stops_updates() {
        let mut scene = make_scene();
        let mut observer = Observer::new(Filter::new().with(scene.pos))
            .init(&mut scene.store)
            .unwrap();
        mover(&mut scene);
        observer.dispose(&mut scene.store);
        assert!(observer.is_empty());
        assert!(!observer.is_registered());

        mover(&mut scene);
        assert!(observer.is_empty());
        assert_eq!(scene.store.subscriber_count(scene.pos), 0);
    }

    #[test]
    fn test_drop_ends_subscription() {
        let mut scene = make_scene();
        let observer = Observer::new(Filter::new().with(scene.pos))
            .init(&mut scene.store)
            .unwrap();
        assert_eq!(scene.store.subscriber_count(scene.pos), 1);
        drop(observer);
        assert_eq!(scene.store.subscriber_count(scene.pos), 0);
        mover(&mut scene);
    }

    #[test]
    fn test_manual_recheck_and_reject() {
        let mut scene = make_scene();
        let a = mover(&mut scene);
        let observer = Observer::new(Filter::new().with(scene.pos));

        observer.recheck(&scene.store, a);
        assert!(observer.contains(a));
        observer.recheck(&scene.store, a);
        assert_eq!(observer.len(), 1);

        observer.reject(a);
        observer.reject(a);
        assert!(observer.is_empty());

        observer.recheck(&scene.store, Entity::named("ghost"));
        assert!(observer.is_empty());
    }

    #[test]
    fn test_fetch_projects_in_selection_order() {
        let mut scene = make_scene();
        let observer = Observer::new(Filter::new().with(scene.pos).with(scene.vel))
            .select([scene.vel, scene.pos])
            .init(&mut scene.store)
            .unwrap();
        let a = mover(&mut scene);
        scene.store.get_mut::<Vec2>(a, scene.pos).unwrap().x = 9.0;

        let rows: Vec<_> = observer
            .fetch::<(Vec2, Vec2)>(&scene.store)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        let (entity, (vel, pos)) = &rows[0];
        assert_eq!(*entity, a);
        assert_eq!(vel.x, 1.0);
        assert_eq!(pos.x, 9.0);
    }

    #[test]
    fn test_fetch_arity_checked() {
        let mut scene = make_scene();
        let observer = Observer::new(Filter::new().with(scene.pos))
            .select([scene.pos, scene.vel])
            .deselect([scene.vel])
            .init(&mut scene.store)
            .unwrap();
        assert_eq!(observer.selection(), &[scene.pos]);
        assert!(matches!(
            observer.fetch::<(Vec2, Vec2)>(&scene.store),
            Err(StoreError::SelectionArity { .. })
        ));
    }

    #[test]
    fn test_eager_consistency_under_random_mutations() {
        let mut scene = make_scene();
        let tag = scene.store.declare_tag(None).unwrap();
        let components = [scene.pos, scene.vel, scene.frozen, tag];

        let filters = [
            Filter::new().with(scene.pos),
            Filter::new().with(scene.pos).with(scene.vel).without(scene.frozen),
            Filter::new().with(tag).without(scene.pos),
            Filter::new().with(scene.frozen).with(tag),
            Filter::new().without(scene.vel),
        ];
        let observers: Vec<Observer> = filters
            .iter()
            .map(|f| Observer::new(f.clone()).init(&mut scene.store).unwrap())
            .collect();

        let mut rng = StdRng::seed_from_u64(0x7e55_e7a);
        let mut live: Vec<Entity> = (0..8).map(|_| scene.store.spawn(None).unwrap()).collect();

        for _ in 0..2_000 {
            if rng.gen_bool(0.05) {
                let victim = live.swap_remove(rng.gen_range(0..live.len()));
                scene.store.despawn(victim).unwrap();
                live.push(scene.store.spawn(None).unwrap());
            } else {
                let entity = live[rng.gen_range(0..live.len())];
                let component = components[rng.gen_range(0..components.len())];
                let is_tag = component == scene.frozen || component == tag;
                match (scene.store.has(entity, component), is_tag) {
                    (true, true) => scene.store.untag(entity, component).unwrap(),
                    (true, false) => scene.store.unset(entity, component).unwrap(),
                    (false, true) => scene.store.tag(entity, component).unwrap(),
                    (false, false) => scene
                        .store
                        .set(entity, component, Vec2 { x: 0.0, y: 0.0 })
                        .unwrap(),
                }
            }

            for (observer, filter) in observers.iter().zip(filters.iter()) {
                let observed: HashSet<Entity> = observer.entities().into_iter().collect();
                assert_eq!(observed, brute_force(&scene.store, filter));
            }
        }
    }
}
