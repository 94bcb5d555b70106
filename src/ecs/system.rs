//! System descriptors

use super::entity::{ComponentMask, EntityId};
use super::world::World;

type RunFn = Box<dyn FnMut(&mut World, &[EntityId], f32) + Send>;

/// A per-tick transformation: required kinds, priority (lower runs first) and body
pub struct SystemDescriptor {
    pub name: &'static str,
    pub required: ComponentMask,
    pub priority: i32,
    run: RunFn,
}

impl SystemDescriptor {
    /// System that receives the whole query result at once
    pub fn new<F>(name: &'static str, required: ComponentMask, priority: i32, run: F) -> Self
    where
        F: FnMut(&mut World, &[EntityId], f32) + Send + 'static,
    {
        Self {
            name,
            required,
            priority,
            run: Box::new(run),
        }
    }

    /// System invoked once per matching entity
    pub fn per_entity(
        name: &'static str,
        required: ComponentMask,
        priority: i32,
        step: fn(&mut World, EntityId, f32),
    ) -> Self {
        Self::new(name, required, priority, move |world, ids, dt| {
            for &id in ids {
                step(world, id, dt);
            }
        })
    }

    pub(crate) fn run(&mut self, world: &mut World, matches: &[EntityId], dt: f32) {
        (self.run)(world, matches, dt);
    }
}

impl std::fmt::Debug for SystemDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemDescriptor")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
