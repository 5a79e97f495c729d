//! # tessera_store
//!
//! Entity-component storage and the views built on top of it.
//!
//! This crate provides:
//!
//! - [`Store`]: entities, declared pools and tags, and their values.
//! - [`Entity`] / [`ComponentId`]: UUID-backed identifiers.
//! - [`Filter`]: include/exclude component sets shared by both view kinds.
//! - [`Observer`]: an incremental view the store keeps up to date.
//! - [`Query`]: a batch view recomputed on demand.
//! - [`Prototype`]: a template for spawning entities with a fixed shape.
//! - [`Fetch`]: typed projection of matched entities onto component tuples.

pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod handle;
pub mod observer;
pub mod prototype;
pub mod query;
pub mod sink;
pub mod store;

pub use component::{ComponentKind, ComponentSet, ComponentValue};
pub use config::{RespawnPolicy, StoreConfig};
pub use entity::{ComponentId, Entity, IdSource, RandomIds, SequentialIds, StoreId};
pub use error::StoreError;
pub use fetch::Fetch;
pub use filter::Filter;
pub use handle::EntityMut;
pub use observer::Observer;
pub use prototype::Prototype;
pub use query::Query;
pub use sink::ViewSink;
pub use store::{Store, SubscriptionId};
