//! Broad-phase spatial index

pub mod bvh;

pub use bvh::{Bvh, BvhNode, NodeKind};
