use std::any::{Any, TypeId};
use std::collections::HashMap;

use prism_common::EntityId;

/// Marker for data that can be attached to an [`Entity`].
///
/// The storage key is `TypeId::of::<Self>()`, so each concrete type is its
/// own tag and at most one instance per type lives on an entity.
pub trait Component: Any {}

/// Runtime tag of a component type, for queries assembled at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
}

impl ComponentType {
    pub fn of<T: Component>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

struct Slot {
    /// Back-reference to the entity holding the component. Not an owner.
    owner: EntityId,
    value: Box<dyn Any>,
}

/// An id plus at most one component of each type.
pub struct Entity {
    id: EntityId,
    components: HashMap<TypeId, Slot>,
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("components", &self.components.len())
            .finish()
    }
}

impl Entity {
    pub(crate) fn new() -> Self {
        Self {
            id: EntityId::new(),
            components: HashMap::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Attach `component`, replacing one of the same type already on the
    /// entity. Returns the entity so attachments can be chained.
    pub fn add_component<T: Component>(&mut self, component: T) -> &mut Self {
        self.replace_component(component);
        self
    }

    /// Attach `component` and hand back the one of the same type it
    /// replaced, if any.
    pub fn replace_component<T: Component>(&mut self, component: T) -> Option<T> {
        let slot = Slot {
            owner: self.id,
            value: Box::new(component),
        };
        let previous = self.components.insert(TypeId::of::<T>(), slot)?;
        tracing::debug!(
            "entity {}: replacing {}",
            self.id.short(),
            std::any::type_name::<T>()
        );
        previous.value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.components
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.value.downcast_ref::<T>())
    }

    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components
            .get_mut(&TypeId::of::<T>())
            .and_then(|slot| slot.value.downcast_mut::<T>())
    }

    pub fn has_component<T: Component>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }

    pub fn has_type(&self, ty: ComponentType) -> bool {
        self.components.contains_key(&ty.id())
    }

    /// Detach and return the component of type `T`.
    pub fn remove_component<T: Component>(&mut self) -> Option<T> {
        self.take_boxed::<T>().map(|boxed| *boxed)
    }

    /// Entity recorded as the holder of the `T` component.
    pub fn owner_of<T: Component>(&self) -> Option<EntityId> {
        self.components
            .get(&TypeId::of::<T>())
            .map(|slot| slot.owner)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub(crate) fn take_boxed<T: Component>(&mut self) -> Option<Box<T>> {
        let slot = self.components.remove(&TypeId::of::<T>())?;
        match slot.value.downcast::<T>() {
            Ok(boxed) => Some(boxed),
            Err(value) => {
                self.components.insert(
                    TypeId::of::<T>(),
                    Slot {
                        owner: slot.owner,
                        value,
                    },
                );
                None
            }
        }
    }

    pub(crate) fn restore_boxed<T: Component>(&mut self, value: Box<T>) {
        self.components.insert(
            TypeId::of::<T>(),
            Slot {
                owner: self.id,
                value,
            },
        );
    }
}
