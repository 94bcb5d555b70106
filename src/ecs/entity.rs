//! Entity records and component masks

use std::fmt;

use serde::Serialize;

use super::component::ComponentKind;
use super::registry::{registry, ComponentTypeId, MAX_COMPONENT_KINDS};

/// Entity identifier, assigned monotonically by the World and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitmask of attached component kinds, indexed by registry id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComponentMask(pub u64);

impl ComponentMask {
    pub const EMPTY: Self = Self(0);

    /// Mask with the registry bits of every kind in `kinds`
    pub fn of(kinds: &[ComponentKind]) -> Self {
        let reg = registry();
        let mut mask = Self::EMPTY;
        for kind in kinds {
            mask.insert(reg.id(*kind));
        }
        mask
    }

    /// Set bit `id`. Ids outside the mask width are ignored.
    pub fn insert(&mut self, id: ComponentTypeId) {
        if (id as usize) < MAX_COMPONENT_KINDS {
            self.0 |= 1 << id;
        }
    }

    pub fn remove(&mut self, id: ComponentTypeId) {
        if (id as usize) < MAX_COMPONENT_KINDS {
            self.0 &= !(1 << id);
        }
    }

    pub fn contains(&self, id: ComponentTypeId) -> bool {
        (id as usize) < MAX_COMPONENT_KINDS && self.0 & (1 << id) != 0
    }

    /// True when every bit of `required` is set here
    pub fn is_superset_of(&self, required: ComponentMask) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }
}

/// Entity record. Destroyed entities stay in the World as inactive tombstones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub active: bool,
    pub mask: ComponentMask,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            active: true,
            mask: ComponentMask::EMPTY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_bits_are_ignored() {
        let mut mask = ComponentMask::EMPTY;
        mask.insert(3);
        mask.insert(64);
        mask.insert(u32::MAX);
        assert_eq!(mask, ComponentMask(1 << 3));
        assert!(!mask.contains(64));
        mask.remove(3);
        assert!(mask.is_empty());
    }

    #[test]
    fn superset_check() {
        let full = ComponentMask(0b1011);
        assert!(full.is_superset_of(ComponentMask(0b0011)));
        assert!(full.is_superset_of(ComponentMask::EMPTY));
        assert!(!full.is_superset_of(ComponentMask(0b0100)));
    }
}
