//! The demo's context: the store plus the views and ids its systems share.

use std::ops::Add;

use tessera_scene::Director;
use tessera_store::{ComponentId, Filter, Observer, Query, Store, StoreError};

/// A 2D vector used for both position and velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Component ids declared by [`World::new`].
#[derive(Debug, Clone, Copy)]
pub struct Components {
    /// `Vec2` pool.
    pub position: ComponentId,
    /// `Vec2` pool.
    pub velocity: ComponentId,
    /// `String` pool.
    pub name: ComponentId,
    /// Tag set on units that stopped moving.
    pub frozen: ComponentId,
}

/// Everything the systems of the race scene operate on.
#[derive(Debug)]
pub struct World {
    pub store: Store,
    pub components: Components,
    /// Units that carry position and velocity and are not frozen.
    pub movers: Observer,
    /// Frozen units, rebuilt when the standings are reported.
    pub finished: Query,
    pub director: Director,
    /// Updates seen so far.
    pub tick: u64,
}

impl World {
    /// Declare the demo components and register the views.
    ///
    /// # Errors
    ///
    /// Propagates store errors from declaring or registering.
    pub fn new(director: Director) -> Result<Self, StoreError> {
        let mut store = Store::new();
        let components = Components {
            position: store.declare_pool(Some(ComponentId::named("position")))?,
            velocity: store.declare_pool(Some(ComponentId::named("velocity")))?,
            name: store.declare_pool(Some(ComponentId::named("name")))?,
            frozen: store.declare_tag(Some(ComponentId::named("frozen")))?,
        };

        let movers = Observer::new(
            Filter::new()
                .with(components.position)
                .with(components.velocity)
                .without(components.frozen),
        )
        .select([components.position, components.velocity])
        .init(&mut store)?;
        let finished = Query::new(Filter::new().with(components.frozen));

        Ok(Self {
            store,
            components,
            movers,
            finished,
            director,
            tick: 0,
        })
    }

    /// The `name` component of `entity`, or `"?"` if it has none.
    #[must_use]
    pub fn name_of(&self, entity: tessera_store::Entity) -> &str {
        self.store
            .get::<String>(entity, self.components.name)
            .map_or("?", String::as_str)
    }
}
