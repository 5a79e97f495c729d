//! Typed projection of entities onto tuples of component references.
//!
//! Views hand out entity ids; [`Fetch`] turns an entity plus an ordered list
//! of pool ids into a tuple of typed references, e.g.
//! `(&Position, &Velocity)` for `[position, velocity]`.

use std::any::Any;

use crate::entity::{ComponentId, Entity};
use crate::error::StoreError;
use crate::store::Store;

/// A tuple of component types that can be read for one entity.
///
/// Implemented for tuples of one to six `Any` types. The `n`-th tuple
/// element is read from the `n`-th component id of the selection.
pub trait Fetch {
    /// The borrowed tuple produced for one entity.
    type Item<'s>;

    /// Number of components in the tuple.
    const ARITY: usize;

    /// Read the tuple for `entity`.
    ///
    /// # Errors
    ///
    /// [`StoreError::SelectionArity`] if `components.len()` differs from
    /// [`Fetch::ARITY`], otherwise any [`Store::get`] error.
    fn fetch<'s>(
        store: &'s Store,
        entity: Entity,
        components: &[ComponentId],
    ) -> Result<Self::Item<'s>, StoreError>;
}

/// Fails with [`StoreError::SelectionArity`] unless `selected` matches the
/// arity of `F`.
pub(crate) fn check_arity<F: Fetch>(selected: usize) -> Result<(), StoreError> {
    if selected != F::ARITY {
        return Err(StoreError::SelectionArity {
            selected,
            requested: F::ARITY,
        });
    }
    Ok(())
}

macro_rules! impl_fetch {
    ($arity:expr; $($ty:ident => $idx:tt),+) => {
        impl<$($ty: Any),+> Fetch for ($($ty,)+) {
            type Item<'s> = ($(&'s $ty,)+);

            const ARITY: usize = $arity;

            fn fetch<'s>(
                store: &'s Store,
                entity: Entity,
                components: &[ComponentId],
            ) -> Result<Self::Item<'s>, StoreError> {
                check_arity::<Self>(components.len())?;
                Ok(($(store.get::<$ty>(entity, components[$idx])?,)+))
            }
        }
    };
}

impl_fetch!(1; A => 0);
impl_fetch!(2; A => 0, B => 1);
impl_fetch!(3; A => 0, B => 1, C => 2);
impl_fetch!(4; A => 0, B => 1, C => 2, D => 3);
impl_fetch!(5; A => 0, B => 1, C => 2, D => 3, E => 4);
impl_fetch!(6; A => 0, B => 1, C => 2, D => 3, E => 4, G => 5);
