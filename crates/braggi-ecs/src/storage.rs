//! Dense per-type component storage.

use std::any::Any;

use hashbrown::HashMap;

use braggi_types::EntityId;

/// Anything stored as a component. `Default` supplies the zeroed row that
/// `add_component` hands back; the `Send + Sync` bounds let a world be
/// owned by whichever worker runs its field.
pub trait Component: Default + Send + Sync + 'static {}

impl<T: Default + Send + Sync + 'static> Component for T {}

/// Object-safe face of a [`ComponentArray`], used by the world for
/// type-erased removal and teardown.
pub(crate) trait AnyComponentArray: Send + Sync {
    /// Swap-with-last removal. Returns false when the entity has no row.
    fn remove(&mut self, entity: EntityId) -> bool;

    fn len(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Densely packed rows for one component type, with the two index maps of
/// the sparse-set scheme kept in lockstep.
pub(crate) struct ComponentArray<T: Component> {
    data: Vec<T>,
    entity_to_index: HashMap<EntityId, usize>,
    index_to_entity: Vec<EntityId>,
}

impl<T: Component> ComponentArray<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            entity_to_index: HashMap::with_capacity(capacity),
            index_to_entity: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace the entity's row, returning a reference that stays
    /// valid until the next removal touching this array.
    pub fn insert(&mut self, entity: EntityId, value: T) -> &mut T {
        if let Some(&idx) = self.entity_to_index.get(&entity) {
            self.data[idx] = value;
            return &mut self.data[idx];
        }
        let idx = self.data.len();
        self.data.push(value);
        self.index_to_entity.push(entity);
        self.entity_to_index.insert(entity, idx);
        &mut self.data[idx]
    }

    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.entity_to_index.get(&entity).map(|&idx| &self.data[idx])
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        match self.entity_to_index.get(&entity) {
            Some(&idx) => Some(&mut self.data[idx]),
            None => None,
        }
    }
}

impl<T: Component> AnyComponentArray for ComponentArray<T> {
    fn remove(&mut self, entity: EntityId) -> bool {
        let Some(idx) = self.entity_to_index.remove(&entity) else {
            return false;
        };
        let last = self.data.len() - 1;
        self.data.swap_remove(idx);
        self.index_to_entity.swap_remove(idx);
        if idx != last {
            // The former last row now lives at idx; fix its map entry.
            let moved = self.index_to_entity[idx];
            self.entity_to_index.insert(moved, idx);
        }
        true
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
