//! Component payload codec
//!
//! Fixed little-endian layouts, one per component kind. Decoding reads from a
//! slice of exactly the declared record length; extra bytes belong to newer
//! encoders and are ignored.

use bytes::{Buf, BufMut};

use super::protocol::PacketError;
use crate::ecs::{
    Collider, ComponentKind, ComponentValue, Health, Input, InputFlags, PlayerId, PlayerLink,
    Position, Transform, Velocity,
};
use crate::math::{Aabb, Vec3};

/// Payload length written for `kind`
pub const fn encoded_len(kind: ComponentKind) -> usize {
    match kind {
        ComponentKind::Position | ComponentKind::Velocity => 12,
        ComponentKind::Transform => 24,
        ComponentKind::Health => 9,
        ComponentKind::PlayerLink => 8,
        ComponentKind::Input => 22,
        ComponentKind::Collider => 26,
    }
}

fn put_vec3(buf: &mut impl BufMut, v: Vec3) {
    buf.put_f32_le(v.x);
    buf.put_f32_le(v.y);
    buf.put_f32_le(v.z);
}

fn get_vec3(buf: &mut impl Buf) -> Vec3 {
    let x = buf.get_f32_le();
    let y = buf.get_f32_le();
    let z = buf.get_f32_le();
    Vec3::new(x, y, z)
}

/// Append the payload of `value` (without type id or length prefix)
pub fn encode_component(value: &ComponentValue, buf: &mut impl BufMut) {
    match value {
        ComponentValue::Position(p) => put_vec3(buf, p.value),
        ComponentValue::Velocity(v) => put_vec3(buf, v.value),
        ComponentValue::Transform(t) => {
            put_vec3(buf, t.position);
            put_vec3(buf, t.rotation);
        }
        ComponentValue::Health(h) => {
            buf.put_f32_le(h.current);
            buf.put_f32_le(h.maximum);
            buf.put_u8(h.alive as u8);
        }
        ComponentValue::PlayerLink(link) => {
            buf.put_u32_le(link.player_id.0);
            buf.put_f32_le(link.rating);
        }
        ComponentValue::Input(input) => {
            buf.put_u16_le(input.flags.bits());
            buf.put_f32_le(input.yaw);
            buf.put_f32_le(input.pitch);
            buf.put_u32_le(input.sequence);
            buf.put_u64_le(input.input_tick);
        }
        ComponentValue::Collider(c) => {
            put_vec3(buf, c.bounds.min);
            put_vec3(buf, c.bounds.max);
            buf.put_u8(c.is_static as u8);
            buf.put_u8(c.is_trigger as u8);
        }
    }
}

/// Decode a `kind` payload from exactly its declared bytes
pub fn decode_component(kind: ComponentKind, payload: &[u8]) -> Result<ComponentValue, PacketError> {
    let needed = encoded_len(kind);
    if payload.len() < needed {
        return Err(PacketError::Malformed("component payload shorter than its layout"));
    }
    let mut buf = payload;

    let value = match kind {
        ComponentKind::Position => ComponentValue::Position(Position {
            value: get_vec3(&mut buf),
        }),
        ComponentKind::Velocity => ComponentValue::Velocity(Velocity {
            value: get_vec3(&mut buf),
        }),
        ComponentKind::Transform => {
            let position = get_vec3(&mut buf);
            let rotation = get_vec3(&mut buf);
            ComponentValue::Transform(Transform { position, rotation })
        }
        ComponentKind::Health => {
            let current = buf.get_f32_le();
            let maximum = buf.get_f32_le();
            let alive = buf.get_u8() != 0;
            ComponentValue::Health(Health {
                current,
                maximum,
                alive,
            })
        }
        ComponentKind::PlayerLink => {
            let player_id = PlayerId(buf.get_u32_le());
            let rating = buf.get_f32_le();
            ComponentValue::PlayerLink(PlayerLink { player_id, rating })
        }
        ComponentKind::Input => {
            let flags = InputFlags::from_bits_truncate(buf.get_u16_le());
            let yaw = buf.get_f32_le();
            let pitch = buf.get_f32_le();
            let sequence = buf.get_u32_le();
            let input_tick = buf.get_u64_le();
            ComponentValue::Input(Input {
                flags,
                yaw,
                pitch,
                sequence,
                input_tick,
            })
        }
        ComponentKind::Collider => {
            let min = get_vec3(&mut buf);
            let max = get_vec3(&mut buf);
            let is_static = buf.get_u8() != 0;
            let is_trigger = buf.get_u8() != 0;
            let bounds = Aabb::new(min, max);
            ComponentValue::Collider(Collider {
                bounds,
                half_extents: bounds.half_extents(),
                is_static,
                is_trigger,
            })
        }
    };
    Ok(value)
}
