//! World: entity records, per-kind component tables and the ordered system list

use super::component::{Component, ComponentKind, ComponentTables, ComponentValue};
use super::entity::{ComponentMask, Entity, EntityId};
use super::registry::{registry, ComponentRegistry};
use super::system::SystemDescriptor;

/// ECS store owned by exactly one room
pub struct World {
    entities: Vec<Entity>,
    tables: ComponentTables,
    systems: Vec<SystemDescriptor>,
    registry: &'static ComponentRegistry,
    query_scratch: Vec<EntityId>,
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            tables: ComponentTables::default(),
            systems: Vec::new(),
            registry: registry(),
            query_scratch: Vec::new(),
        }
    }

    /// Create a fresh entity. Ids start at 0 and are never reused.
    pub fn create_entity(&mut self) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(Entity::new(id));
        id
    }

    /// Deactivate `id` and purge its components. The record stays as a tombstone.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(id.0 as usize) else {
            return false;
        };
        if !entity.active {
            return false;
        }
        entity.active = false;
        entity.mask = ComponentMask::EMPTY;
        self.tables.purge(id);
        true
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    pub fn mask_of(&self, id: EntityId) -> Option<ComponentMask> {
        self.entity(id).map(|e| e.mask)
    }

    /// Total records, tombstones included
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn active_count(&self) -> usize {
        self.entities.iter().filter(|e| e.active).count()
    }

    /// Attach `component`, replacing any existing one of the same kind.
    /// Returns `None` when `id` is unknown or destroyed.
    pub fn add<T: Component>(&mut self, id: EntityId, component: T) -> Option<&mut T> {
        let bit = self.registry.id(T::KIND);
        let entity = self.entity_mut(id)?;
        entity.mask.insert(bit);
        let table = T::table_mut(&mut self.tables);
        table.insert(id, component);
        table.get_mut(&id)
    }

    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        T::table(&self.tables).get(&id)
    }

    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        T::table_mut(&mut self.tables).get_mut(&id)
    }

    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        T::table(&self.tables).contains_key(&id)
    }

    /// Detach the component of kind `T`, returning it
    pub fn remove<T: Component>(&mut self, id: EntityId) -> Option<T> {
        let bit = self.registry.id(T::KIND);
        let entity = self.entity_mut(id)?;
        entity.mask.remove(bit);
        T::table_mut(&mut self.tables).remove(&id)
    }

    /// Attach a tagged value; false when `id` is unknown or destroyed
    pub fn insert_value(&mut self, id: EntityId, value: ComponentValue) -> bool {
        let bit = self.registry.id(value.kind());
        let Some(entity) = self.entity_mut(id) else {
            return false;
        };
        entity.mask.insert(bit);
        self.tables.insert_value(id, value);
        true
    }

    pub fn value_of(&self, id: EntityId, kind: ComponentKind) -> Option<ComponentValue> {
        self.tables.value(kind, id)
    }

    pub fn remove_kind(&mut self, id: EntityId, kind: ComponentKind) -> Option<ComponentValue> {
        let bit = self.registry.id(kind);
        let entity = self.entity_mut(id)?;
        entity.mask.remove(bit);
        self.tables.remove_kind(kind, id)
    }

    /// Active entities whose mask covers `required`, in ascending id order.
    /// The empty mask matches every active entity.
    pub fn query(&self, required: ComponentMask) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.query_into(required, &mut out);
        out
    }

    /// Like `query`, writing into a caller-owned buffer
    pub fn query_into(&self, required: ComponentMask, out: &mut Vec<EntityId>) {
        out.clear();
        out.extend(
            self.entities
                .iter()
                .filter(|e| e.active && e.mask.is_superset_of(required))
                .map(|e| e.id),
        );
    }

    /// Register a system, keeping the list sorted by priority (ties keep registration order)
    pub fn add_system(&mut self, system: SystemDescriptor) {
        let at = self
            .systems
            .partition_point(|s| s.priority <= system.priority);
        self.systems.insert(at, system);
    }

    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name).collect()
    }

    /// Run every system once, in priority order
    pub fn update(&mut self, dt: f32) {
        let mut systems = std::mem::take(&mut self.systems);
        let mut matches = std::mem::take(&mut self.query_scratch);

        for system in systems.iter_mut() {
            self.query_into(system.required, &mut matches);
            system.run(self, &matches, dt);
        }

        // Systems registered while running are merged back in priority order
        let added = std::mem::replace(&mut self.systems, systems);
        for system in added {
            self.add_system(system);
        }
        self.query_scratch = matches;
    }

    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0 as usize).filter(|e| e.active)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0 as usize).filter(|e| e.active)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
