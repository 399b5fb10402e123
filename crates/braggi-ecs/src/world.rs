//! The ECS world: entities, masks, typed component arrays, systems.

use std::any::TypeId;

use hashbrown::HashMap;
use tracing::{debug, trace};

use braggi_error::{BraggiError, Result};
use braggi_region::Region;
use braggi_types::{ComponentTypeId, EntityId};

use crate::mask::ComponentMask;
use crate::storage::{AnyComponentArray, Component, ComponentArray};
use crate::system::System;

/// Component masks are a single 64-bit word, so this is the hard ceiling
/// on registered component types per world.
pub const MAX_COMPONENT_TYPES: usize = 64;

/// Component arrays are created lazily with this row capacity.
const INITIAL_ARRAY_CAPACITY: usize = 16;

struct ComponentTypeInfo {
    name: String,
    rust_type: TypeId,
}

/// Entities, their component masks, per-type dense storage, and systems.
///
/// Field order matters for teardown: systems drop before component arrays,
/// and the optional backing region drops last.
pub struct World {
    systems: Vec<Box<dyn System>>,
    masks: Vec<ComponentMask>,
    alive: Vec<bool>,
    free: Vec<EntityId>,
    types: Vec<ComponentTypeInfo>,
    by_type: HashMap<TypeId, ComponentTypeId>,
    arrays: Vec<Option<Box<dyn AnyComponentArray>>>,
    max_component_types: usize,
    region: Option<Region>,
}

impl World {
    /// A world sized for `entity_capacity` entities and at most
    /// `max_component_types` registered types (≤ [`MAX_COMPONENT_TYPES`]).
    pub fn new(entity_capacity: usize, max_component_types: usize) -> Result<Self> {
        if max_component_types > MAX_COMPONENT_TYPES {
            return Err(BraggiError::OutOfRange {
                what: "max_component_types".to_owned(),
                value: max_component_types.to_string(),
            });
        }
        Ok(Self {
            systems: Vec::new(),
            masks: Vec::with_capacity(entity_capacity),
            alive: Vec::with_capacity(entity_capacity),
            free: Vec::new(),
            types: Vec::new(),
            by_type: HashMap::new(),
            arrays: Vec::new(),
            max_component_types,
            region: None,
        })
    }

    /// A world that owns a parse-scoped [`Region`]; the region is torn down
    /// with the world.
    pub fn with_region(
        region: Region,
        entity_capacity: usize,
        max_component_types: usize,
    ) -> Result<Self> {
        let mut world = Self::new(entity_capacity, max_component_types)?;
        world.region = Some(region);
        Ok(world)
    }

    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    pub fn region_mut(&mut self) -> Option<&mut Region> {
        self.region.as_mut()
    }

    /// Register `T` under `name`. Re-registering the same Rust type returns
    /// the existing id; exceeding the cap fails.
    pub fn register_component<T: Component>(&mut self, name: &str) -> Result<ComponentTypeId> {
        let rust_type = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type) {
            debug!(component = name, id = %existing, "component type already registered");
            return Ok(existing);
        }
        if self.types.len() == self.max_component_types {
            return Err(BraggiError::ComponentRegistryFull {
                cap: self.max_component_types,
            });
        }
        let id = ComponentTypeId::new(self.types.len() as u32);
        self.types.push(ComponentTypeInfo {
            name: name.to_owned(),
            rust_type,
        });
        self.by_type.insert(rust_type, id);
        self.arrays.push(None);
        debug!(component = name, id = %id, "component type registered");
        Ok(id)
    }

    /// The id `T` was registered under, if any.
    pub fn component_type<T: Component>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub fn component_type_name(&self, ty: ComponentTypeId) -> Option<&str> {
        self.types.get(ty.index()).map(|info| info.name.as_str())
    }

    /// Create an entity, reusing the most recently freed id first.
    pub fn create_entity(&mut self) -> EntityId {
        if let Some(id) = self.free.pop() {
            self.masks[id.index()] = ComponentMask::empty();
            self.alive[id.index()] = true;
            trace!(entity = %id, "entity reused");
            return id;
        }
        let id = EntityId::new(self.masks.len() as u32);
        self.masks.push(ComponentMask::empty());
        self.alive.push(true);
        trace!(entity = %id, "entity created");
        id
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.alive.get(entity.index()).copied().unwrap_or(false)
    }

    /// Destroy an entity: remove every component row it holds, clear its
    /// mask, and push its id onto the free list for reuse.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(BraggiError::NoSuchEntity { entity: entity.get() });
        }
        let mask = self.masks[entity.index()];
        for idx in 0..self.types.len() {
            let ty = ComponentTypeId::new(idx as u32);
            if mask.contains(ty) {
                if let Some(array) = self.arrays[idx].as_mut() {
                    array.remove(entity);
                }
            }
        }
        self.masks[entity.index()] = ComponentMask::empty();
        self.alive[entity.index()] = false;
        self.free.push(entity);
        trace!(entity = %entity, "entity destroyed");
        Ok(())
    }

    /// Attach a default-initialised `T` to the entity and return the row.
    /// The reference stays valid until the next removal in `T`'s array or
    /// destruction of the entity.
    pub fn add_component<T: Component>(&mut self, entity: EntityId) -> Result<&mut T> {
        self.insert_component(entity, T::default())
    }

    /// Attach `value` to the entity, replacing any existing row.
    pub fn insert_component<T: Component>(&mut self, entity: EntityId, value: T) -> Result<&mut T> {
        if !self.is_alive(entity) {
            return Err(BraggiError::NoSuchEntity { entity: entity.get() });
        }
        let ty = self.component_type::<T>().ok_or_else(|| {
            BraggiError::internal(format!(
                "component type {} is not registered",
                std::any::type_name::<T>()
            ))
        })?;
        let slot = &mut self.arrays[ty.index()];
        let array = slot.get_or_insert_with(|| {
            Box::new(ComponentArray::<T>::with_capacity(INITIAL_ARRAY_CAPACITY))
        });
        let typed = array
            .as_any_mut()
            .downcast_mut::<ComponentArray<T>>()
            .ok_or_else(|| BraggiError::internal("component array type mismatch"))?;
        self.masks[entity.index()].set(ty);
        Ok(typed.insert(entity, value))
    }

    /// Detach `T` from the entity. A no-op when the entity does not carry it.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(BraggiError::NoSuchEntity { entity: entity.get() });
        }
        let Some(ty) = self.component_type::<T>() else {
            return Ok(());
        };
        if let Some(array) = self.arrays[ty.index()].as_mut() {
            array.remove(entity);
        }
        self.masks[entity.index()].clear(ty);
        Ok(())
    }

    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let ty = self.component_type::<T>()?;
        if !self.is_alive(entity) || !self.masks[entity.index()].contains(ty) {
            return None;
        }
        self.arrays[ty.index()]
            .as_ref()?
            .as_any()
            .downcast_ref::<ComponentArray<T>>()?
            .get(entity)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let ty = self.component_type::<T>()?;
        if !self.is_alive(entity) || !self.masks[entity.index()].contains(ty) {
            return None;
        }
        self.arrays[ty.index()]
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<ComponentArray<T>>()?
            .get_mut(entity)
    }

    pub fn has_component(&self, entity: EntityId, ty: ComponentTypeId) -> bool {
        self.is_alive(entity) && self.masks[entity.index()].contains(ty)
    }

    pub fn mask_of(&self, entity: EntityId) -> ComponentMask {
        self.masks
            .get(entity.index())
            .copied()
            .unwrap_or_default()
    }

    /// Live entities whose mask is a superset of `mask`, in ascending id
    /// order. The iterator borrows the world, so the world cannot be
    /// mutated while a query is in flight.
    pub fn query(&self, mask: ComponentMask) -> impl Iterator<Item = EntityId> + '_ {
        self.masks
            .iter()
            .enumerate()
            .filter(move |&(idx, m)| self.alive[idx] && m.contains_all(mask))
            .map(|(idx, _)| EntityId::new(idx as u32))
    }

    /// Like [`World::query`], but pairs each entity with its `T` row. The
    /// returned handles borrow the world, so they are scoped to the query.
    pub fn query_components<T: Component>(
        &self,
        mask: ComponentMask,
    ) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.query(mask)
            .filter_map(move |entity| self.get_component::<T>(entity).map(|c| (entity, c)))
    }

    pub fn entity_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    pub fn register_system(&mut self, system: Box<dyn System>) {
        debug!(system = system.name(), "system registered");
        self.systems.push(system);
    }

    /// Run every system once, in registration order.
    pub fn update(&mut self, dt: f64) {
        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            trace!(system = system.name(), "system update");
            system.update(self, dt);
        }
        // Keep anything a system registered while running.
        systems.append(&mut self.systems);
        self.systems = systems;
    }

    /// Run a single named system once.
    pub fn update_system(&mut self, name: &str, dt: f64) -> Result<()> {
        let idx = self
            .systems
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| BraggiError::internal(format!("no system named `{name}`")))?;
        let mut system = self.systems.remove(idx);
        system.update(self, dt);
        self.systems.insert(idx, system);
        Ok(())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_count())
            .field("component_types", &self.types.len())
            .field("systems", &self.systems.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    struct Health(u32);

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    struct Velocity(f32);

    fn world() -> World {
        World::new(32, 8).unwrap()
    }

    #[test]
    fn registration_caps_at_configured_max() {
        let mut w = World::new(4, 1).unwrap();
        w.register_component::<Health>("health").unwrap();
        let err = w.register_component::<Velocity>("velocity").unwrap_err();
        assert_eq!(err, BraggiError::ComponentRegistryFull { cap: 1 });
        // Same type re-registers as a no-op.
        let again = w.register_component::<Health>("health").unwrap();
        assert_eq!(again, ComponentTypeId::new(0));
    }

    #[test]
    fn add_get_remove_component() {
        let mut w = world();
        w.register_component::<Health>("health").unwrap();
        let e = w.create_entity();
        *w.add_component::<Health>(e).unwrap() = Health(9);
        assert_eq!(w.get_component::<Health>(e), Some(&Health(9)));
        w.remove_component::<Health>(e).unwrap();
        assert_eq!(w.get_component::<Health>(e), None);
    }

    #[test]
    fn destroy_entity_clears_components_and_reuses_id() {
        let mut w = world();
        let health = w.register_component::<Health>("health").unwrap();
        let e = w.create_entity();
        let other = w.create_entity();
        w.add_component::<Health>(e).unwrap();
        w.destroy_entity(e).unwrap();

        assert!(!w.is_alive(e));
        assert!(!w.has_component(e, health));
        assert_eq!(w.get_component::<Health>(e), None);

        // The freed id comes back before any new id is allocated.
        let reused = w.create_entity();
        assert_eq!(reused, e);
        assert!(w.mask_of(reused).is_empty());
        let fresh = w.create_entity();
        assert!(fresh.get() > other.get());
    }

    #[test]
    fn destroying_dead_entity_errors() {
        let mut w = world();
        let e = w.create_entity();
        w.destroy_entity(e).unwrap();
        assert_eq!(
            w.destroy_entity(e),
            Err(BraggiError::NoSuchEntity { entity: e.get() })
        );
    }

    #[test]
    fn query_yields_ascending_superset_masks() {
        let mut w = world();
        let a = w.register_component::<Health>("a").unwrap();
        let b = w.register_component::<Velocity>("b").unwrap();
        let entities: Vec<_> = (0..10).map(|_| w.create_entity()).collect();
        for e in &entities[..5] {
            w.add_component::<Health>(*e).unwrap();
        }
        for e in &entities[3..8] {
            w.add_component::<Velocity>(*e).unwrap();
        }
        let both = ComponentMask::empty().with(a).with(b);
        let hits: Vec<_> = w.query(both).map(EntityId::get).collect();
        assert_eq!(hits, vec![3, 4]);

        w.remove_component::<Health>(entities[4]).unwrap();
        let hits: Vec<_> = w.query(both).map(EntityId::get).collect();
        assert_eq!(hits, vec![3]);
    }

    #[test]
    fn typed_queries_pair_entities_with_rows() {
        let mut w = world();
        let a = w.register_component::<Health>("health").unwrap();
        let e0 = w.create_entity();
        let e1 = w.create_entity();
        *w.add_component::<Health>(e0).unwrap() = Health(3);
        *w.add_component::<Health>(e1).unwrap() = Health(7);

        let mask = ComponentMask::empty().with(a);
        let rows: Vec<(u32, u32)> = w
            .query_components::<Health>(mask)
            .map(|(e, h)| (e.get(), h.0))
            .collect();
        assert_eq!(rows, vec![(0, 3), (1, 7)]);
    }

    struct Counter {
        ticks: std::sync::Arc<std::sync::atomic::AtomicU32>,
    }

    impl System for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn update(&mut self, _world: &mut World, _dt: f64) {
            self.ticks
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    #[test]
    fn systems_run_in_registration_order() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let mut w = world();
        let ticks = Arc::new(AtomicU32::new(0));
        w.register_system(Box::new(Counter {
            ticks: Arc::clone(&ticks),
        }));
        w.update(0.0);
        w.update(0.0);
        assert_eq!(ticks.load(Ordering::Relaxed), 2);
        w.update_system("counter", 0.0).unwrap();
        assert_eq!(ticks.load(Ordering::Relaxed), 3);
        assert!(w.update_system("missing", 0.0).is_err());
    }

    #[test]
    fn world_can_carry_a_region() {
        use braggi_region::Region;
        use braggi_types::{Regime, RegionId};

        let region = Region::new(RegionId::new(0), 4096, Regime::Fifo);
        let mut w = World::with_region(region, 8, 4).unwrap();
        let slice = w.region_mut().unwrap().alloc(128).unwrap();
        assert_eq!(slice.len(), 128);
        assert_eq!(w.region().unwrap().regime(), Regime::Fifo);
    }
}
