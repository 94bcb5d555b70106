//! Component kinds, component records and the per-kind storage tables

use std::collections::HashMap;

use bitflags::bitflags;
use serde::Serialize;

use super::entity::EntityId;
use crate::math::{Aabb, Vec3};

/// Closed set of component kinds known to the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComponentKind {
    Position,
    Velocity,
    Transform,
    Health,
    PlayerLink,
    Input,
    Collider,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::Position,
        ComponentKind::Velocity,
        ComponentKind::Transform,
        ComponentKind::Health,
        ComponentKind::PlayerLink,
        ComponentKind::Input,
        ComponentKind::Collider,
    ];

    /// Declaration index, used for registry slots
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Position => "position",
            ComponentKind::Velocity => "velocity",
            ComponentKind::Transform => "transform",
            ComponentKind::Health => "health",
            ComponentKind::PlayerLink => "player_link",
            ComponentKind::Input => "input",
            ComponentKind::Collider => "collider",
        }
    }
}

/// Player identifier as carried in packet headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlayerId(pub u32);

impl PlayerId {
    /// Reserved "unset/unknown" value
    pub const UNSET: Self = Self(u32::MAX);

    pub fn is_set(self) -> bool {
        self != Self::UNSET
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Held actions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InputFlags: u16 {
        const FORWARD = 1;
        const BACKWARD = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const JUMP = 1 << 4;
        const CROUCH = 1 << 5;
        const SPRINT = 1 << 6;
        const SHOOT = 1 << 7;
        const AIM = 1 << 8;

        const MOVEMENT = Self::FORWARD.bits()
            | Self::BACKWARD.bits()
            | Self::LEFT.bits()
            | Self::RIGHT.bits();
    }
}

impl Default for InputFlags {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub value: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub value: Vec3,
}

/// Render transform; `rotation.y` carries the look yaw
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: f32,
    pub maximum: f32,
    pub alive: bool,
}

impl Health {
    pub fn full(maximum: f32) -> Self {
        Self {
            current: maximum,
            maximum,
            alive: true,
        }
    }
}

/// Binds an entity to a connected player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerLink {
    pub player_id: PlayerId,
    /// Display attribute shown next to the player name
    pub rating: f32,
}

/// Latest input applied to a player entity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Input {
    pub flags: InputFlags,
    pub yaw: f32,
    pub pitch: f32,
    pub sequence: u32,
    /// Room tick at which the input was last updated
    pub input_tick: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub bounds: Aabb,
    pub half_extents: Vec3,
    pub is_static: bool,
    pub is_trigger: bool,
}

impl Collider {
    pub fn new(center: Vec3, half_extents: Vec3, is_static: bool) -> Self {
        Self {
            bounds: Aabb::from_center_half_extents(center, half_extents),
            half_extents,
            is_static,
            is_trigger: false,
        }
    }

    /// Recenter the bounds on `center`, keeping the half extents
    pub fn recenter(&mut self, center: Vec3) {
        self.bounds = Aabb::from_center_half_extents(center, self.half_extents);
    }
}

/// Typed component record with a fixed kind and a dedicated table
pub trait Component: Copy + Sized + 'static {
    const KIND: ComponentKind;

    fn table(tables: &ComponentTables) -> &HashMap<EntityId, Self>;

    fn table_mut(tables: &mut ComponentTables) -> &mut HashMap<EntityId, Self>;

    fn into_value(self) -> ComponentValue;
}

macro_rules! component_storage {
    ($($kind:ident => $field:ident),* $(,)?) => {
        /// A component of any kind, tagged with its kind
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum ComponentValue {
            $($kind($kind),)*
        }

        impl ComponentValue {
            pub fn kind(&self) -> ComponentKind {
                match self {
                    $(ComponentValue::$kind(_) => ComponentKind::$kind,)*
                }
            }
        }

        /// One table per kind, keyed by entity id
        #[derive(Debug, Default)]
        pub struct ComponentTables {
            $($field: HashMap<EntityId, $kind>,)*
        }

        impl ComponentTables {
            /// Insert a tagged value, returning the replaced value of the same kind
            pub fn insert_value(&mut self, id: EntityId, value: ComponentValue) -> Option<ComponentValue> {
                match value {
                    $(ComponentValue::$kind(c) => self.$field.insert(id, c).map(ComponentValue::$kind),)*
                }
            }

            pub fn value(&self, kind: ComponentKind, id: EntityId) -> Option<ComponentValue> {
                match kind {
                    $(ComponentKind::$kind => self.$field.get(&id).copied().map(ComponentValue::$kind),)*
                }
            }

            pub fn remove_kind(&mut self, kind: ComponentKind, id: EntityId) -> Option<ComponentValue> {
                match kind {
                    $(ComponentKind::$kind => self.$field.remove(&id).map(ComponentValue::$kind),)*
                }
            }

            pub fn contains(&self, kind: ComponentKind, id: EntityId) -> bool {
                match kind {
                    $(ComponentKind::$kind => self.$field.contains_key(&id),)*
                }
            }

            /// Drop every entry belonging to `id`
            pub fn purge(&mut self, id: EntityId) {
                $(self.$field.remove(&id);)*
            }

            pub fn len(&self, kind: ComponentKind) -> usize {
                match kind {
                    $(ComponentKind::$kind => self.$field.len(),)*
                }
            }
        }

        $(
            impl Component for $kind {
                const KIND: ComponentKind = ComponentKind::$kind;

                fn table(tables: &ComponentTables) -> &HashMap<EntityId, Self> {
                    &tables.$field
                }

                fn table_mut(tables: &mut ComponentTables) -> &mut HashMap<EntityId, Self> {
                    &mut tables.$field
                }

                fn into_value(self) -> ComponentValue {
                    ComponentValue::$kind(self)
                }
            }
        )*
    };
}

component_storage! {
    Position => position,
    Velocity => velocity,
    Transform => transform,
    Health => health,
    PlayerLink => player_link,
    Input => input,
    Collider => collider,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_flags_cover_directions_only() {
        let held = InputFlags::FORWARD | InputFlags::SPRINT;
        assert!(held.intersects(InputFlags::MOVEMENT));
        assert!(!(InputFlags::JUMP | InputFlags::AIM).intersects(InputFlags::MOVEMENT));
        assert_eq!(InputFlags::AIM.bits(), 256);
    }

    #[test]
    fn tables_round_trip_tagged_values() {
        let mut tables = ComponentTables::default();
        let id = EntityId(4);
        let health = ComponentValue::Health(Health::full(100.0));
        assert_eq!(tables.insert_value(id, health), None);
        assert_eq!(tables.value(ComponentKind::Health, id), Some(health));
        assert!(tables.contains(ComponentKind::Health, id));
        tables.purge(id);
        assert_eq!(tables.len(ComponentKind::Health), 0);
    }
}
