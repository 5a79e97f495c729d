//! Identifier types and identifier sources.
//!
//! An [`Entity`] and a [`ComponentId`] are both opaque UUID-backed tokens.
//! Fresh identifiers come from an [`IdSource`]; callers may also supply their
//! own, either as a raw UUID or derived from a name.

use uuid::Uuid;

/// Namespace used to derive identifiers from human-readable names.
const NAME_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_42a7_93c0_4e15_b8a2_5c07_e9d3_1f64);

/// A unique entity identifier.
///
/// Entities are pure identifiers. The store records which components an
/// entity carries; the entity itself carries nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(Uuid);

impl Entity {
    /// Wrap a raw UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Derive a deterministic identifier from a name.
    ///
    /// The same name always yields the same entity, so `Entity::named("k1")`
    /// can be used to spawn and later look up a well-known entity.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(Uuid::new_v5(&NAME_NAMESPACE, name.as_bytes()))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Identifies a kind of component: either a pool (value-bearing) or a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(Uuid);

impl ComponentId {
    /// Wrap a raw UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Derive a deterministic identifier from a name such as `"position"`.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(Uuid::new_v5(&NAME_NAMESPACE, name.as_bytes()))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Component({})", self.0)
    }
}

/// Identity of a [`Store`](crate::Store) instance.
///
/// Prototypes remember which store they are bound to by its `StoreId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(Uuid);

impl StoreId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Produces unique identifiers on demand.
///
/// A source must never hand out the same UUID twice.
pub trait IdSource {
    /// Returns a fresh UUID.
    fn next_uuid(&mut self) -> Uuid;
}

/// Random (v4) UUIDs. The default source for a store.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_uuid(&mut self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Monotonically increasing UUIDs starting at 1.
///
/// Deterministic, which makes it the source of choice for tests and replays.
#[derive(Debug)]
pub struct SequentialIds {
    next: u128,
}

impl SequentialIds {
    /// Creates a new source. The first UUID handed out is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the number of identifiers handed out so far.
    #[must_use]
    pub fn count(&self) -> u128 {
        self.next - 1
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for SequentialIds {
    fn next_uuid(&mut self) -> Uuid {
        let id = self.next;
        self.next += 1;
        Uuid::from_u128(id)
    }
}
