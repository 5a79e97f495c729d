//! # tessera_scene
//!
//! Dispatch and run-loop plumbing around a caller-owned context.
//!
//! This crate provides:
//!
//! - [`Channel`]: a named broadcast list of systems and nested channels,
//!   with cycle detection.
//! - [`Scene`]: startup, update and cleanup channels driven by a run loop.
//! - [`Director`]: the explicit stack of running scenes.
//! - [`SceneConfig`]: tick rate and tick limit, optionally from the
//!   environment.
//!
//! ## Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use tessera_scene::{Channel, Director, Scene, SceneConfig};
//!
//! # fn main() -> Result<(), tessera_scene::DispatchError> {
//! let startup = Rc::new(Channel::new("startup"));
//! let update = Rc::new(Channel::new("update"));
//! let cleanup = Rc::new(Channel::new("cleanup"));
//! update.connect_system("count", |frames: &mut u32| {
//!     *frames += 1;
//!     Ok(())
//! });
//!
//! let mut scene = Scene::new("main", startup, update, cleanup)
//!     .with_config(SceneConfig::new().with_max_ticks(3));
//!
//! let mut frames = 0;
//! Director::new().enter(&mut scene, &mut frames)?;
//! assert_eq!(frames, 3);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod scene;

pub use channel::{Channel, Response};
pub use config::SceneConfig;
pub use error::{ConfigError, DispatchError};
pub use scene::{Director, Scene, SceneHandle};
