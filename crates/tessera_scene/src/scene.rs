//! Scene run loop and the director that tracks active scenes.
//!
//! A [`Scene`] emits its startup channel once, its update channel until it
//! is asked to leave (or its tick limit is reached), and its cleanup channel
//! once. A [`Director`] keeps the stack of scenes currently running so that
//! systems can stop the innermost scene, or all of them, without any global
//! state.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::config::SceneConfig;
use crate::error::DispatchError;

/// A cheap handle on a scene's running flag.
#[derive(Debug, Clone)]
pub struct SceneHandle {
    name: Rc<str>,
    running: Rc<Cell<bool>>,
}

impl SceneHandle {
    fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            running: Rc::new(Cell::new(false)),
        }
    }

    /// The scene's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` while the scene's update loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Ask the scene to stop after the current update.
    pub fn leave(&self) {
        self.running.set(false);
    }

    /// Returns `true` if both handles refer to the same scene.
    #[must_use]
    pub fn is_same(&self, other: &SceneHandle) -> bool {
        Rc::ptr_eq(&self.running, &other.running)
    }
}

/// Startup, update and cleanup channels plus a run loop.
#[derive(Debug)]
pub struct Scene<C> {
    handle: SceneHandle,
    config: SceneConfig,
    startup: Rc<Channel<C>>,
    update: Rc<Channel<C>>,
    cleanup: Rc<Channel<C>>,
    ticks: u64,
}

impl<C> Scene<C> {
    /// Create a scene with the default (unthrottled, unlimited) config.
    #[must_use]
    pub fn new(
        name: &str,
        startup: Rc<Channel<C>>,
        update: Rc<Channel<C>>,
        cleanup: Rc<Channel<C>>,
    ) -> Self {
        Self {
            handle: SceneHandle::new(name),
            config: SceneConfig::default(),
            startup,
            update,
            cleanup,
            ticks: 0,
        }
    }

    /// Replace the run-loop configuration.
    #[must_use]
    pub fn with_config(mut self, config: SceneConfig) -> Self {
        self.config = config;
        self
    }

    /// The scene's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// A handle that can stop this scene from inside a system.
    #[must_use]
    pub fn handle(&self) -> SceneHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn startup(&self) -> &Rc<Channel<C>> {
        &self.startup
    }

    #[must_use]
    pub fn update(&self) -> &Rc<Channel<C>> {
        &self.update
    }

    #[must_use]
    pub fn cleanup(&self) -> &Rc<Channel<C>> {
        &self.cleanup
    }

    /// Updates completed by the last (or current) run.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run the scene to completion and return the number of updates.
    ///
    /// The running flag is raised before startup, so a startup system that
    /// leaves the scene skips the update loop entirely. Cleanup runs once
    /// the loop ends normally.
    ///
    /// # Errors
    ///
    /// The first [`DispatchError`] from any of the three channels. On a
    /// startup or update error the scene stops and cleanup is not emitted.
    pub fn run(&mut self, ctx: &mut C) -> Result<u64, DispatchError> {
        info!(
            scene = self.name(),
            tick_rate = ?self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "entering scene"
        );

        self.ticks = 0;
        self.handle.running.set(true);
        let outcome = self
            .startup
            .emit(ctx)
            .and_then(|_| self.run_updates(ctx));
        self.handle.running.set(false);
        outcome?;

        self.cleanup.emit(ctx)?;
        info!(scene = self.name(), ticks = self.ticks, "left scene");
        Ok(self.ticks)
    }

    fn run_updates(&mut self, ctx: &mut C) -> Result<(), DispatchError> {
        let budget = self.config.tick_budget();

        while self.handle.is_running() && !self.config.is_exhausted(self.ticks) {
            let start = Instant::now();
            self.update.emit(ctx)?;
            self.ticks += 1;

            if !self.handle.is_running() || self.config.is_exhausted(self.ticks) {
                break;
            }

            if let Some(budget) = budget {
                let elapsed = start.elapsed();
                if elapsed < budget {
                    std::thread::sleep(budget - elapsed);
                } else {
                    warn!(
                        scene = self.name(),
                        tick = self.ticks,
                        elapsed_ms = elapsed.as_millis() as u64,
                        budget_ms = budget.as_millis() as u64,
                        "tick exceeded time budget"
                    );
                }
            }
        }

        debug!(scene = self.name(), ticks = self.ticks, "update loop finished");
        Ok(())
    }
}

/// The stack of scenes currently running.
///
/// Cloning a director is cheap and every clone shares the same stack, so a
/// clone can be captured by systems or stored in the context.
#[derive(Debug, Clone, Default)]
pub struct Director {
    stack: Rc<RefCell<Vec<SceneHandle>>>,
}

impl Director {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the scene, run it to completion and pop it again.
    ///
    /// Scenes may be entered from inside other scenes' systems; the stack
    /// then reflects the nesting.
    ///
    /// # Errors
    ///
    /// Whatever [`Scene::run`] returns. The scene is popped either way.
    pub fn enter<C>(&self, scene: &mut Scene<C>, ctx: &mut C) -> Result<u64, DispatchError> {
        let depth = {
            let mut stack = self.stack.borrow_mut();
            stack.push(scene.handle());
            stack.len() - 1
        };

        let result = scene.run(ctx);
        self.stack.borrow_mut().truncate(depth);
        result
    }

    /// Stop the innermost scene. Returns `false` if no scene is active.
    pub fn leave(&self) -> bool {
        match self.stack.borrow().last() {
            Some(top) => {
                info!(scene = top.name(), "leaving scene");
                top.leave();
                true
            }
            None => false,
        }
    }

    /// Replace the innermost entry with `handle` and return the old entry.
    ///
    /// The replaced scene keeps running; later calls to [`Director::leave`]
    /// address `handle` instead. Does nothing if no scene is active.
    pub fn change(&self, handle: SceneHandle) -> Option<SceneHandle> {
        let mut stack = self.stack.borrow_mut();
        let top = stack.last_mut()?;
        debug!(from = top.name(), to = handle.name(), "changing scene");
        Some(std::mem::replace(top, handle))
    }

    /// Stop every active scene.
    pub fn shutdown(&self) {
        let stack = self.stack.borrow();
        for handle in stack.iter() {
            handle.leave();
        }
        info!(scenes = stack.len(), "shutting down");
    }

    /// The innermost entry, if any.
    #[must_use]
    pub fn current(&self) -> Option<SceneHandle> {
        self.stack.borrow().last().cloned()
    }

    /// Number of active entries.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}
