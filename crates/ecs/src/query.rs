//! Typed multi-component queries.
//!
//! A query names the component types it needs; an entity matches when it
//! holds every one of them. Tuples of queries are queries, so
//! `(&Model, &Transform)` fetches both or skips the entity.
//!
//! Mutable queries use take/restore: the matched boxes are moved out of the
//! entity for the duration of the callback, which lets several components of
//! one entity be borrowed mutably at once without unsafe code.

use std::any::TypeId;

use crate::entity::{Component, ComponentType, Entity};

/// Shared fetch of one or more components.
pub trait Query {
    type Item<'e>;

    fn component_types() -> Vec<ComponentType>;

    fn fetch(entity: &Entity) -> Option<Self::Item<'_>>;
}

impl<T: Component> Query for &T {
    type Item<'e> = &'e T;

    fn component_types() -> Vec<ComponentType> {
        vec![ComponentType::of::<T>()]
    }

    fn fetch(entity: &Entity) -> Option<Self::Item<'_>> {
        entity.get_component::<T>()
    }
}

/// Exclusive fetch of one or more components.
pub trait QueryMut {
    type Item<'e>;
    type Taken;

    fn component_types() -> Vec<ComponentType>;

    fn take(entity: &mut Entity) -> Option<Self::Taken>;

    fn view(taken: &mut Self::Taken) -> Self::Item<'_>;

    fn restore(entity: &mut Entity, taken: Self::Taken);
}

impl<T: Component> QueryMut for &mut T {
    type Item<'e> = &'e mut T;
    type Taken = Box<T>;

    fn component_types() -> Vec<ComponentType> {
        vec![ComponentType::of::<T>()]
    }

    fn take(entity: &mut Entity) -> Option<Self::Taken> {
        entity.take_boxed::<T>()
    }

    fn view(taken: &mut Self::Taken) -> Self::Item<'_> {
        taken
    }

    fn restore(entity: &mut Entity, taken: Self::Taken) {
        entity.restore_boxed(taken);
    }
}

impl<T: Component> QueryMut for &T {
    type Item<'e> = &'e T;
    type Taken = Box<T>;

    fn component_types() -> Vec<ComponentType> {
        vec![ComponentType::of::<T>()]
    }

    fn take(entity: &mut Entity) -> Option<Self::Taken> {
        entity.take_boxed::<T>()
    }

    fn view(taken: &mut Self::Taken) -> Self::Item<'_> {
        taken
    }

    fn restore(entity: &mut Entity, taken: Self::Taken) {
        entity.restore_boxed(taken);
    }
}

/// True when every type in `types` is present on `entity`.
pub(crate) fn matches(entity: &Entity, types: &[ComponentType]) -> bool {
    types.iter().all(|ty| entity.has_type(*ty))
}

/// True when no type appears twice. A mutable query naming the same
/// component twice can never be satisfied.
pub(crate) fn distinct(types: &[ComponentType]) -> bool {
    let mut ids: Vec<TypeId> = types.iter().map(|t| t.id()).collect();
    ids.sort_unstable();
    ids.windows(2).all(|w| w[0] != w[1])
}

macro_rules! impl_query_tuple {
    ($($P:ident),+) => {
        impl<$($P: Query),+> Query for ($($P,)+) {
            type Item<'e> = ($($P::Item<'e>,)+);

            fn component_types() -> Vec<ComponentType> {
                let mut types = Vec::new();
                $(types.extend($P::component_types());)+
                types
            }

            fn fetch(entity: &Entity) -> Option<Self::Item<'_>> {
                Some(($($P::fetch(entity)?,)+))
            }
        }

        impl<$($P: QueryMut),+> QueryMut for ($($P,)+) {
            type Item<'e> = ($($P::Item<'e>,)+);
            type Taken = ($($P::Taken,)+);

            fn component_types() -> Vec<ComponentType> {
                let mut types = Vec::new();
                $(types.extend($P::component_types());)+
                types
            }

            // Presence and distinctness are checked first so that no
            // component is taken unless all of them can be.
            fn take(entity: &mut Entity) -> Option<Self::Taken> {
                let types = <Self as QueryMut>::component_types();
                if !distinct(&types) || !matches(entity, &types) {
                    return None;
                }
                Some(($($P::take(entity)?,)+))
            }

            #[allow(non_snake_case)]
            fn view(taken: &mut Self::Taken) -> Self::Item<'_> {
                let ($($P,)+) = taken;
                ($($P::view($P),)+)
            }

            #[allow(non_snake_case)]
            fn restore(entity: &mut Entity, taken: Self::Taken) {
                let ($($P,)+) = taken;
                $($P::restore(entity, $P);)+
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);
impl_query_tuple!(A, B, C, D, E);
