use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};

use prism_common::EntityId;

use crate::entity::{ComponentType, Entity};
use crate::query::{Query, QueryMut, matches};
use crate::system::{System, SystemEntry, insert_entry};

/// Entity store plus the systems that tick over it.
///
/// Entities iterate in creation order. Lookup by id is O(1).
#[derive(Default)]
pub struct Ecs {
    entities: BTreeMap<u64, Entity>,
    index: HashMap<EntityId, u64>,
    next_seq: u64,
    systems: Vec<SystemEntry>,
    /// Systems registered while `update` has the list taken out.
    pending: Vec<SystemEntry>,
    /// Systems removed while `update` has the list taken out.
    removed: Vec<TypeId>,
    /// Systems taken out by the tick in progress.
    running: Vec<TypeId>,
    updating: bool,
}

impl Ecs {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Entities ---

    /// Allocate a fresh entity and return it for component setup.
    pub fn create_entity(&mut self) -> &mut Entity {
        let entity = Entity::new();
        let id = entity.id();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(id, seq);
        tracing::trace!("created entity {}", id.short());
        self.entities.entry(seq).or_insert(entity)
    }

    pub fn get_entity(&self, id: EntityId) -> Option<&Entity> {
        let seq = self.index.get(&id)?;
        self.entities.get(seq)
    }

    pub fn get_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let seq = self.index.get(&id)?;
        self.entities.get_mut(seq)
    }

    /// Drop the entity and all its components. Returns whether it existed.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        self.take_entity(id).is_some()
    }

    /// Detach the entity and hand it back, components included.
    pub fn take_entity(&mut self, id: EntityId) -> Option<Entity> {
        let seq = self.index.remove(&id)?;
        self.entities.remove(&seq)
    }

    /// Remove every entity, in creation order.
    pub fn drain_entities(&mut self) -> Vec<Entity> {
        self.index.clear();
        std::mem::take(&mut self.entities).into_values().collect()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    // --- Queries ---

    /// Call `f` on every entity holding all of `types`.
    pub fn for_each_with(&self, types: &[ComponentType], mut f: impl FnMut(&Entity)) {
        for entity in self.entities.values() {
            if matches(entity, types) {
                f(entity);
            }
        }
    }

    /// Call `f` with the fetched components of every matching entity.
    pub fn for_each<Q: Query>(&self, mut f: impl FnMut(EntityId, Q::Item<'_>)) {
        for entity in self.entities.values() {
            if let Some(item) = Q::fetch(entity) {
                f(entity.id(), item);
            }
        }
    }

    /// Iterator over matching entities and their fetched components.
    pub fn query<Q: Query>(&self) -> impl Iterator<Item = (EntityId, Q::Item<'_>)> {
        self.entities
            .values()
            .filter_map(|entity| Q::fetch(entity).map(|item| (entity.id(), item)))
    }

    /// Mutable variant of [`Ecs::for_each`]. Several components of the same
    /// entity may be borrowed mutably at once.
    pub fn for_each_mut<Q: QueryMut>(&mut self, mut f: impl FnMut(EntityId, Q::Item<'_>)) {
        for entity in self.entities.values_mut() {
            let Some(mut taken) = Q::take(entity) else {
                continue;
            };
            f(entity.id(), Q::view(&mut taken));
            Q::restore(entity, taken);
        }
    }

    pub fn count<Q: Query>(&self) -> usize {
        self.query::<Q>().count()
    }

    // --- Systems ---

    /// Register `system`. A system of the same type is replaced in place,
    /// keeping its position in the tick order.
    pub fn add_system<S: System>(&mut self, system: S) {
        let entry = SystemEntry::new(system);
        if self.updating {
            self.pending.push(entry);
        } else {
            insert_entry(&mut self.systems, entry);
        }
    }

    /// Unregister the system of type `S`. Returns whether one was registered.
    pub fn remove_system<S: System>(&mut self) -> bool {
        let id = TypeId::of::<S>();
        let had = self.has_system::<S>();
        self.systems.retain(|e| e.type_id != id);
        self.pending.retain(|e| e.type_id != id);
        if self.updating {
            self.removed.push(id);
        }
        had
    }

    pub fn has_system<S: System>(&self) -> bool {
        let id = TypeId::of::<S>();
        self.systems
            .iter()
            .chain(self.pending.iter())
            .any(|e| e.type_id == id)
            || self.is_running(id)
    }

    pub fn system_count(&self) -> usize {
        let running = self.running.iter().filter(|id| self.is_running(**id)).count();
        let replacing = self
            .pending
            .iter()
            .filter(|e| self.is_running(e.type_id))
            .count();
        self.systems.len() + self.pending.len() + running - replacing
    }

    /// Whether `id` was taken out by the current tick and not removed since.
    fn is_running(&self, id: TypeId) -> bool {
        self.running.contains(&id) && !self.removed.contains(&id)
    }

    /// Tick every system once, in registration order.
    ///
    /// Systems added during the tick run from the next tick on. A system
    /// removed during the tick does not run for the rest of it.
    pub fn update(&mut self) {
        if self.updating {
            tracing::warn!("Ecs::update called re-entrantly; ignored");
            return;
        }
        self.updating = true;
        let mut systems = std::mem::take(&mut self.systems);
        self.running = systems.iter().map(|e| e.type_id).collect();
        for entry in systems.iter_mut() {
            if self.removed.contains(&entry.type_id) {
                continue;
            }
            entry.system.update(self);
        }
        self.updating = false;
        self.running.clear();

        let removed = std::mem::take(&mut self.removed);
        systems.retain(|e| !removed.contains(&e.type_id));
        for entry in std::mem::take(&mut self.pending) {
            insert_entry(&mut systems, entry);
        }
        self.systems = systems;
    }
}

impl std::fmt::Debug for Ecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ecs")
            .field("entities", &self.entities.len())
            .field("systems", &self.system_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Component;

    #[derive(Debug, PartialEq)]
    struct A(i32);
    impl Component for A {}

    #[derive(Debug, PartialEq)]
    struct B(i32);
    impl Component for B {}

    fn abab_store() -> (Ecs, EntityId) {
        let mut ecs = Ecs::new();
        ecs.create_entity().add_component(A(1));
        ecs.create_entity().add_component(B(2));
        let both = ecs.create_entity();
        both.add_component(A(3));
        both.add_component(B(4));
        let both = both.id();
        ecs.create_entity();
        (ecs, both)
    }

    #[test]
    fn for_each_with_requires_every_type() {
        let (ecs, both) = abab_store();
        let mut hits = Vec::new();
        ecs.for_each_with(
            &[ComponentType::of::<A>(), ComponentType::of::<B>()],
            |e| hits.push(e.id()),
        );
        assert_eq!(hits, vec![both]);
    }

    #[test]
    fn typed_for_each_fetches_both() {
        let (ecs, both) = abab_store();
        let mut hits = Vec::new();
        ecs.for_each::<(&A, &B)>(|id, (a, b)| hits.push((id, a.0, b.0)));
        assert_eq!(hits, vec![(both, 3, 4)]);
    }

    #[test]
    fn empty_type_list_matches_everything() {
        let (ecs, _) = abab_store();
        let mut n = 0;
        ecs.for_each_with(&[], |_| n += 1);
        assert_eq!(n, 4);
    }

    #[test]
    fn iteration_follows_creation_order() {
        let mut ecs = Ecs::new();
        let ids: Vec<EntityId> = (0..20)
            .map(|i| {
                let e = ecs.create_entity();
                e.add_component(A(i));
                e.id()
            })
            .collect();
        let seen: Vec<EntityId> = ecs.query::<&A>().map(|(id, _)| id).collect();
        assert_eq!(seen, ids);
        let values: Vec<i32> = ecs.query::<&A>().map(|(_, a)| a.0).collect();
        assert_eq!(values, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn remove_entity_reports_existence() {
        let mut ecs = Ecs::new();
        let id = ecs.create_entity().id();
        assert!(ecs.remove_entity(id));
        assert!(!ecs.remove_entity(id));
        assert!(ecs.get_entity(id).is_none());
        assert_eq!(ecs.entity_count(), 0);
    }

    #[test]
    fn mutable_query_writes_through() {
        let (mut ecs, both) = abab_store();
        ecs.for_each_mut::<(&mut A, &B)>(|_, (a, b)| a.0 += b.0);
        let entity = ecs.get_entity(both).unwrap();
        assert_eq!(entity.get_component::<A>(), Some(&A(7)));
        assert_eq!(entity.get_component::<B>(), Some(&B(4)));
        assert_eq!(ecs.count::<&A>(), 2);
    }

    struct Counter {
        ticks: u32,
    }

    impl System for Counter {
        fn update(&mut self, ecs: &mut Ecs) {
            self.ticks += 1;
            let ticks = self.ticks as i32;
            ecs.for_each_mut::<&mut A>(|_, a| a.0 = ticks);
        }
    }

    struct Spawner;

    impl System for Spawner {
        fn update(&mut self, ecs: &mut Ecs) {
            ecs.create_entity().add_component(B(0));
            ecs.add_system(Counter { ticks: 100 });
        }
    }

    #[test]
    fn systems_run_in_registration_order() {
        let mut ecs = Ecs::new();
        ecs.create_entity().add_component(A(0));
        ecs.add_system(Counter { ticks: 0 });
        ecs.update();
        ecs.update();
        assert_eq!(ecs.query::<&A>().next().map(|(_, a)| a.0), Some(2));
        assert!(ecs.has_system::<Counter>());
        assert!(ecs.remove_system::<Counter>());
        assert!(!ecs.remove_system::<Counter>());
        assert_eq!(ecs.system_count(), 0);
    }

    struct Retire;

    impl System for Retire {
        fn update(&mut self, ecs: &mut Ecs) {
            let removed = ecs.remove_system::<Counter>();
            ecs.create_entity().add_component(A(removed as i32));
        }
    }

    #[test]
    fn system_removed_mid_tick_is_reported_and_skipped() {
        let mut ecs = Ecs::new();
        ecs.add_system(Retire);
        ecs.add_system(Counter { ticks: 0 });
        ecs.update();

        // Retire saw Counter registered, and Counter never ran.
        let removed: Vec<i32> = ecs.query::<&A>().map(|(_, a)| a.0).collect();
        assert_eq!(removed, vec![1]);
        assert!(!ecs.has_system::<Counter>());
        assert_eq!(ecs.system_count(), 1);
    }

    #[test]
    fn re_adding_a_system_type_replaces_it() {
        let mut ecs = Ecs::new();
        ecs.create_entity().add_component(A(0));
        ecs.add_system(Counter { ticks: 0 });
        ecs.add_system(Spawner);
        ecs.update();
        // Spawner replaced Counter during the tick; the store keeps one of each.
        assert_eq!(ecs.system_count(), 2);
        assert_eq!(ecs.count::<&B>(), 1);
        ecs.update();
        assert_eq!(ecs.query::<&A>().next().map(|(_, a)| a.0), Some(101));
    }
}
