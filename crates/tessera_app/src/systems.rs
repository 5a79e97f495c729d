//! Systems of the race scene.
//!
//! Units run along the x axis; once a unit crosses [`FINISH_LINE`] it is
//! tagged `frozen`, which drops it out of the movers view. The scene leaves
//! when no movers remain.

use anyhow::Result;
use tracing::{debug, info};

use tessera_store::{Entity, Prototype};

use crate::world::{Vec2, World};

/// X coordinate at which a unit stops.
pub const FINISH_LINE: f32 = 100.0;

/// Startup: populate the store from prototypes.
pub fn spawn_units(world: &mut World) -> Result<()> {
    let c = world.components;

    let unit = Prototype::new(&world.store).set(c.position, Vec2::default);
    let knight = Prototype::new(&world.store)
        .set(c.name, || String::from("knight"))
        .set(c.velocity, || Vec2::new(5.0, 0.0))
        .extend(&unit);
    let goblin = Prototype::new(&world.store)
        .set(c.name, || String::from("goblin"))
        .set(c.velocity, || Vec2::new(20.0, 1.0))
        .extend(&unit);

    knight.instantiate(&mut world.store, Some(Entity::named("knight")))?;
    for _ in 0..3 {
        goblin.instantiate(&mut world.store, None)?;
    }

    // Scenery: positioned but never moves.
    world
        .store
        .handle(None)?
        .set(c.name, String::from("statue"))?
        .set(c.position, Vec2::new(50.0, 50.0))?;

    info!(
        entities = world.store.entity_count(),
        movers = world.movers.len(),
        "spawned units"
    );
    Ok(())
}

/// Update: advance every mover by its velocity.
pub fn integrate(world: &mut World) -> Result<()> {
    let position = world.components.position;
    let moves: Vec<(Entity, Vec2)> = world
        .movers
        .fetch::<(Vec2, Vec2)>(&world.store)?
        .map(|row| row.map(|(entity, (pos, vel))| (entity, *pos + *vel)))
        .collect::<Result<_, _>>()?;

    for (entity, next) in moves {
        *world.store.get_mut::<Vec2>(entity, position)? = next;
    }
    Ok(())
}

/// Update: freeze movers past the finish line.
pub fn freeze_finishers(world: &mut World) -> Result<()> {
    let c = world.components;
    let finishers: Vec<Entity> = world
        .movers
        .entities()
        .into_iter()
        .filter(|entity| {
            world
                .store
                .get::<Vec2>(*entity, c.position)
                .is_ok_and(|pos| pos.x >= FINISH_LINE)
        })
        .collect();

    for entity in finishers {
        world.store.tag(entity, c.frozen)?;
        info!(%entity, name = world.name_of(entity), tick = world.tick, "crossed the finish line");
    }
    Ok(())
}

/// Update: count ticks and leave once nothing moves.
pub fn leave_when_settled(world: &mut World) -> Result<()> {
    world.tick += 1;
    debug!(tick = world.tick, movers = world.movers.len(), "tick done");
    if world.movers.is_empty() {
        info!(tick = world.tick, "every unit finished");
        world.director.leave();
    }
    Ok(())
}

/// Cleanup: report the frozen units.
pub fn report(world: &mut World) -> Result<()> {
    world.finished.build(&world.store);
    info!(
        finished = world.finished.len(),
        entities = world.store.entity_count(),
        "final standings"
    );
    for entity in world.finished.iter() {
        let pos = world.store.get::<Vec2>(entity, world.components.position)?;
        info!(%entity, name = world.name_of(entity), x = pos.x, y = pos.y, "finished");
    }
    Ok(())
}
