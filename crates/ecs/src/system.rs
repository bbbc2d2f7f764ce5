use std::any::{Any, TypeId};

use crate::store::Ecs;

/// Per-tick behaviour over the store.
///
/// The store is handed in on every call instead of being held by the
/// system, so systems can query and mutate entities freely.
pub trait System: Any {
    fn update(&mut self, ecs: &mut Ecs);

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub(crate) struct SystemEntry {
    pub(crate) type_id: TypeId,
    pub(crate) system: Box<dyn System>,
}

impl SystemEntry {
    pub(crate) fn new<S: System>(system: S) -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            system: Box::new(system),
        }
    }
}

/// Insert `entry`, replacing a system of the same type in place.
pub(crate) fn insert_entry(systems: &mut Vec<SystemEntry>, entry: SystemEntry) {
    match systems.iter_mut().find(|e| e.type_id == entry.type_id) {
        Some(existing) => {
            tracing::debug!("replacing system {}", entry.system.name());
            *existing = entry;
        }
        None => systems.push(entry),
    }
}
