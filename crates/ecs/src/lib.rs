//! Entity/component store with typed queries and systems.
//!
//! Components are arbitrary `'static` types tagged with [`Component`]; each
//! entity holds at most one instance per type. Queries are tuples of
//! component references, e.g. `ecs.for_each::<(&Model, &Transform)>(..)`.
//!
//! # Invariants
//! - Adding a component whose type is already present replaces it.
//! - Entities iterate in creation order, whatever their component set.
//! - Systems tick in registration order, once per `Ecs::update`.
//! - A query callback only ever sees entities holding every queried type.

mod entity;
mod query;
mod store;
mod system;

pub use entity::{Component, ComponentType, Entity};
pub use query::{Query, QueryMut};
pub use store::Ecs;
pub use system::System;

pub fn crate_info() -> &'static str {
    "prism-ecs v0.1.0"
}
