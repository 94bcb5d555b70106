//! Entity-component store

pub mod component;
pub mod entity;
pub mod registry;
pub mod system;
pub mod world;

pub use component::{
    Collider, Component, ComponentKind, ComponentValue, Health, Input, InputFlags, PlayerId,
    PlayerLink, Position, Transform, Velocity,
};
pub use entity::{ComponentMask, Entity, EntityId};
pub use registry::{ComponentRegistry, ComponentTypeId, RegistryError, MAX_COMPONENT_KINDS};
pub use system::SystemDescriptor;
pub use world::World;
