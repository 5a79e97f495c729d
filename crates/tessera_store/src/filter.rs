//! Include/exclude filters shared by observers and queries.

use std::collections::BTreeSet;

use crate::component::ComponentSet;
use crate::entity::ComponentId;

/// A match predicate over an entity's component set.
///
/// An entity matches when it carries every `include` component and no
/// `exclude` component. A filter with an empty `include` set matches
/// nothing: there is no component whose presence could admit an entity.
/// A component listed on both sides makes the filter unsatisfiable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    include: BTreeSet<ComponentId>,
    exclude: BTreeSet<ComponentId>,
}

impl Filter {
    /// Create an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a component.
    #[must_use]
    pub fn with(mut self, component: ComponentId) -> Self {
        self.include.insert(component);
        self
    }

    /// Require every component in `components`.
    #[must_use]
    pub fn with_all(mut self, components: impl IntoIterator<Item = ComponentId>) -> Self {
        self.include.extend(components);
        self
    }

    /// Reject entities carrying a component.
    #[must_use]
    pub fn without(mut self, component: ComponentId) -> Self {
        self.exclude.insert(component);
        self
    }

    /// Reject entities carrying any component in `components`.
    #[must_use]
    pub fn without_all(mut self, components: impl IntoIterator<Item = ComponentId>) -> Self {
        self.exclude.extend(components);
        self
    }

    /// Components an entity must carry.
    #[must_use]
    pub fn include(&self) -> &BTreeSet<ComponentId> {
        &self.include
    }

    /// Components an entity must not carry.
    #[must_use]
    pub fn exclude(&self) -> &BTreeSet<ComponentId> {
        &self.exclude
    }

    /// Every component the filter mentions, include side first.
    pub fn components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.include.iter().chain(self.exclude.iter()).copied()
    }

    /// Returns `true` if `carried` satisfies the filter.
    #[must_use]
    pub fn matches(&self, carried: &ComponentSet) -> bool {
        !self.include.is_empty()
            && self.include.iter().all(|c| carried.contains(c))
            && !self.exclude.iter().any(|c| carried.contains(c))
    }

    /// Returns `true` if some component is both included and excluded.
    #[must_use]
    pub fn is_contradictory(&self) -> bool {
        !self.include.is_disjoint(&self.exclude)
    }
}
