//! # tessera_app
//!
//! A small race simulation driving a tessera store through a scene.
//!
//! ## Startup Sequence
//!
//! 1. Initialise logging (`RUST_LOG` overrides the default `info` level).
//! 2. Read the scene config from `TESSERA_TICK_RATE` / `TESSERA_MAX_TICKS`.
//! 3. Declare components and register views.
//! 4. Wire the startup, update and cleanup channels and enter the scene.

mod systems;
mod world;

use std::rc::Rc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tessera_scene::{Channel, Director, Scene, SceneConfig};
use world::World;

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tessera_app=info".parse()?))
        .init();

    info!("tessera demo starting");

    let config = SceneConfig::from_env()?;
    let director = Director::new();
    let mut world = World::new(director.clone())?;

    let startup = Rc::new(Channel::new("startup"));
    startup.connect_system("spawn-units", systems::spawn_units);

    let physics = Rc::new(Channel::new("physics"));
    physics
        .connect_system("integrate", systems::integrate)
        .connect_system("freeze-finishers", systems::freeze_finishers);

    let update = Rc::new(Channel::new("update"));
    update
        .connect_channel(physics)
        .connect_system("leave-when-settled", systems::leave_when_settled);

    let cleanup = Rc::new(Channel::new("cleanup"));
    cleanup.connect_system("report", systems::report);

    let mut scene = Scene::new("race", startup, update, cleanup).with_config(config);
    let ticks = director.enter(&mut scene, &mut world)?;

    info!(ticks, "tessera demo finished");
    Ok(())
}
