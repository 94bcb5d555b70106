//! Component type registry
//!
//! Maps each component kind to a small integer. The same integer is the
//! entity mask bit and the wire type tag, so the mapping must never change
//! once a session starts ticking.

use std::sync::OnceLock;

use super::component::ComponentKind;

/// Wire/mask identifier of a component kind
pub type ComponentTypeId = u32;

/// Width of the entity component mask
pub const MAX_COMPONENT_KINDS: usize = 64;

/// Returned by `id` for a kind that was never registered
pub const UNASSIGNED: ComponentTypeId = ComponentTypeId::MAX;

const _: () = assert!(ComponentKind::ALL.len() <= MAX_COMPONENT_KINDS);

static REGISTRY: OnceLock<ComponentRegistry> = OnceLock::new();

/// Registry errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("component registry capacity of {capacity} kinds exceeded while registering {kind:?}")]
    CapacityExceeded {
        kind: ComponentKind,
        capacity: usize,
    },
}

/// Kind → id mapping assigned in first-request order
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    ids: [ComponentTypeId; ComponentKind::ALL.len()],
    kinds: Vec<ComponentKind>,
    capacity: usize,
}

impl ComponentRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: [UNASSIGNED; ComponentKind::ALL.len()],
            kinds: Vec::new(),
            capacity: capacity.min(MAX_COMPONENT_KINDS),
        }
    }

    /// Registry holding every known kind in declaration order
    fn standard() -> Self {
        let mut registry = Self::with_capacity(MAX_COMPONENT_KINDS);
        for kind in ComponentKind::ALL {
            // ALL fits in the mask width (checked at compile time above)
            let _ = registry.register(kind);
        }
        registry
    }

    /// Return the id for `kind`, assigning the next free id on first request
    pub fn register(&mut self, kind: ComponentKind) -> Result<ComponentTypeId, RegistryError> {
        let slot = kind.index();
        if self.ids[slot] != UNASSIGNED {
            return Ok(self.ids[slot]);
        }
        if self.kinds.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded {
                kind,
                capacity: self.capacity,
            });
        }
        let id = self.kinds.len() as ComponentTypeId;
        self.ids[slot] = id;
        self.kinds.push(kind);
        Ok(id)
    }

    pub fn id_of(&self, kind: ComponentKind) -> Option<ComponentTypeId> {
        let id = self.ids[kind.index()];
        (id != UNASSIGNED).then_some(id)
    }

    /// Id of `kind`, or `UNASSIGNED` when it was never registered
    pub fn id(&self, kind: ComponentKind) -> ComponentTypeId {
        self.ids[kind.index()]
    }

    pub fn kind_of(&self, id: ComponentTypeId) -> Option<ComponentKind> {
        self.kinds.get(id as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Populate the process-wide registry. Call once at startup, before any room ticks.
pub fn init() -> Result<&'static ComponentRegistry, RegistryError> {
    if let Some(registry) = REGISTRY.get() {
        return Ok(registry);
    }
    let mut registry = ComponentRegistry::with_capacity(MAX_COMPONENT_KINDS);
    for kind in ComponentKind::ALL {
        registry.register(kind)?;
    }
    Ok(REGISTRY.get_or_init(|| registry))
}

/// The process-wide registry (read-only)
pub fn registry() -> &'static ComponentRegistry {
    REGISTRY.get_or_init(ComponentRegistry::standard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_first_request_order() {
        let mut reg = ComponentRegistry::with_capacity(8);
        assert_eq!(reg.register(ComponentKind::Collider), Ok(0));
        assert_eq!(reg.register(ComponentKind::Position), Ok(1));
        assert_eq!(reg.register(ComponentKind::Collider), Ok(0));
        assert_eq!(reg.kind_of(1), Some(ComponentKind::Position));
        assert_eq!(reg.id_of(ComponentKind::Health), None);
        assert_eq!(reg.id(ComponentKind::Health), UNASSIGNED);
    }

    #[test]
    fn capacity_overflow_is_an_error() {
        let mut reg = ComponentRegistry::with_capacity(2);
        reg.register(ComponentKind::Position).unwrap();
        reg.register(ComponentKind::Velocity).unwrap();
        let err = reg.register(ComponentKind::Health).unwrap_err();
        assert_eq!(
            err,
            RegistryError::CapacityExceeded {
                kind: ComponentKind::Health,
                capacity: 2
            }
        );
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn global_registry_covers_every_kind() {
        let reg = init().unwrap();
        for kind in ComponentKind::ALL {
            let id = reg.id_of(kind).unwrap();
            assert_eq!(reg.kind_of(id), Some(kind));
        }
        assert!(std::ptr::eq(reg, registry()));
    }
}
