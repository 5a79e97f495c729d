//! Batch-built views.
//!
//! A [`Query`] computes its matched set on demand with set operations over
//! the store's per-component carrier sets. It has no hookup to the store:
//! results stay as they were at the last [`build`](Query::build) until the
//! caller builds again.

use std::collections::HashSet;

use tracing::debug;

use crate::entity::{ComponentId, Entity};
use crate::error::StoreError;
use crate::fetch::{Fetch, check_arity};
use crate::filter::Filter;
use crate::store::Store;

/// A filter-bound set of entities, recomputed only on [`Query::build`].
#[derive(Debug, Clone, Default)]
pub struct Query {
    filter: Filter,
    results: HashSet<Entity>,
}

impl Query {
    /// Create a query with an empty result set.
    #[must_use]
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            results: HashSet::new(),
        }
    }

    /// The filter this query evaluates.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Recompute the result set against `store`.
    ///
    /// The result is the intersection of the carrier sets of every include
    /// component minus every carrier of an exclude component. Undeclared
    /// include components have no carriers; undeclared exclude components
    /// exclude nothing. An empty include set yields an empty result.
    pub fn build(&mut self, store: &Store) -> &mut Self {
        self.results.clear();

        // Walk the smallest carrier set and probe the rest.
        let smallest = self
            .filter
            .include()
            .iter()
            .copied()
            .min_by_key(|c| store.carrier_count(*c));

        if let Some(first) = smallest {
            let filter = &self.filter;
            self.results.extend(store.carriers(first).filter(|entity| {
                filter.include().iter().all(|c| store.has(*entity, *c))
                    && !filter.exclude().iter().any(|c| store.has(*entity, *c))
            }));
        }

        debug!(
            include = self.filter.include().len(),
            exclude = self.filter.exclude().len(),
            matched = self.results.len(),
            "built query"
        );
        self
    }

    /// Iterate over the entities matched at the last build.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.results.iter().copied()
    }

    /// Returns `true` if `entity` was matched at the last build.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.results.contains(&entity)
    }

    /// Number of entities matched at the last build.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if the last build matched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Lazily project the last-built result set onto `components`, in that
    /// order. Never rebuilds.
    ///
    /// # Errors
    ///
    /// [`StoreError::SelectionArity`] up front if `F` does not have one
    /// element per component; per item, any [`Store::get`] error, e.g. for
    /// an entity despawned since the last build.
    pub fn select<'s, F: Fetch>(
        &'s self,
        store: &'s Store,
        components: &'s [ComponentId],
    ) -> Result<impl Iterator<Item = Result<(Entity, F::Item<'s>), StoreError>> + 's, StoreError>
    {
        check_arity::<F>(components.len())?;
        Ok(self
            .iter()
            .map(move |entity| F::fetch(store, entity, components).map(|item| (entity, item))))
    }
}
