//! Snapshot building, decoding and throttling
//!
//! Body layout (after the packet header):
//!
//! ```text
//! entity_count: u8
//! repeat entity_count:
//!     entity_id: u32
//!     component_count: u8
//!     repeat component_count:
//!         type_id: u32
//!         len: u16
//!         payload: [u8; len]
//! ```
//!
//! Readers skip components whose `type_id` they do not know by `len`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ecs::registry::{registry, ComponentTypeId};
use crate::ecs::{Collider, ComponentKind, ComponentMask, ComponentValue, EntityId, PlayerId, World};
use crate::net::codec::{decode_component, encode_component, encoded_len};
use crate::net::protocol::ensure;
use crate::net::{Message, Packet, PacketError, PacketHeader, MAX_PACKET_SIZE};

use super::scheduler::Tick;

/// Components sent for player entities, in wire order
pub const PLAYER_COMPONENTS: [ComponentKind; 5] = [
    ComponentKind::Position,
    ComponentKind::PlayerLink,
    ComponentKind::Input,
    ComponentKind::Transform,
    ComponentKind::Health,
];

/// Components sent for static world entities, in wire order
pub const STATIC_COMPONENTS: [ComponentKind; 2] = [ComponentKind::Position, ComponentKind::Collider];

/// Entity count is a single byte on the wire
pub const MAX_SNAPSHOT_ENTITIES: usize = u8::MAX as usize;

/// Decides when a room emits its next snapshot
#[derive(Debug, Clone)]
pub struct SnapshotThrottle {
    interval: Tick,
    last_sent: Option<Tick>,
}

impl SnapshotThrottle {
    pub fn new(interval: Tick) -> Self {
        Self {
            interval: interval.max(1),
            last_sent: None,
        }
    }

    /// True on the first call, then once at least `interval` ticks have passed
    pub fn should_send(&mut self, tick: Tick) -> bool {
        let due = match self.last_sent {
            None => true,
            Some(last) => tick.saturating_sub(last) >= self.interval,
        };
        if due {
            self.last_sent = Some(tick);
        }
        due
    }
}

/// A finished snapshot datagram
#[derive(Debug, Clone)]
pub struct EncodedSnapshot {
    /// Header and body
    pub datagram: Bytes,
    pub entity_count: u8,
    /// Entities left out to stay within the datagram limits
    pub skipped: usize,
}

impl EncodedSnapshot {
    /// Copy of the datagram with the header's player id set to the recipient
    pub fn addressed_to(&self, player_id: PlayerId) -> Bytes {
        let mut datagram = BytesMut::from(&self.datagram[..]);
        let at = PacketHeader::PLAYER_ID_OFFSET;
        datagram[at..at + 4].copy_from_slice(&player_id.0.to_le_bytes());
        datagram.freeze()
    }
}

/// Serializes a room's world into snapshot datagrams, reusing its buffers
#[derive(Debug, Default)]
pub struct SnapshotEncoder {
    buf: BytesMut,
    record: BytesMut,
    scratch: Vec<EntityId>,
}

impl SnapshotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode all player entities then all static world entities
    pub fn encode(&mut self, world: &World, header: PacketHeader) -> EncodedSnapshot {
        self.buf.clear();
        Packet::new(header, Message::Snapshot(Bytes::new())).encode_into(&mut self.buf);
        let count_at = self.buf.len();
        self.buf.put_u8(0);

        let mut count = 0usize;
        let mut skipped = 0usize;

        world.query_into(ComponentMask::of(&[ComponentKind::PlayerLink]), &mut self.scratch);
        for i in 0..self.scratch.len() {
            let id = self.scratch[i];
            self.push_entity(world, id, &PLAYER_COMPONENTS, &mut count, &mut skipped);
        }

        world.query_into(
            ComponentMask::of(&[ComponentKind::Position, ComponentKind::Collider]),
            &mut self.scratch,
        );
        for i in 0..self.scratch.len() {
            let id = self.scratch[i];
            if !is_static_world(world, id) {
                continue;
            }
            self.push_entity(world, id, &STATIC_COMPONENTS, &mut count, &mut skipped);
        }

        self.buf[count_at] = count as u8;
        EncodedSnapshot {
            datagram: self.buf.split().freeze(),
            entity_count: count as u8,
            skipped,
        }
    }

    fn push_entity(
        &mut self,
        world: &World,
        id: EntityId,
        kinds: &[ComponentKind],
        count: &mut usize,
        skipped: &mut usize,
    ) {
        self.record.clear();
        write_entity(world, id, kinds, &mut self.record);

        if *count >= MAX_SNAPSHOT_ENTITIES || self.buf.len() + self.record.len() > MAX_PACKET_SIZE {
            *skipped += 1;
            return;
        }
        self.buf.extend_from_slice(&self.record);
        *count += 1;
    }
}

fn is_static_world(world: &World, id: EntityId) -> bool {
    let is_static = world.get::<Collider>(id).is_some_and(|c| c.is_static);
    is_static && world.value_of(id, ComponentKind::PlayerLink).is_none()
}

/// Write one entity record with the present components among `kinds`
pub fn write_entity(world: &World, id: EntityId, kinds: &[ComponentKind], buf: &mut BytesMut) {
    let registry = registry();
    let values: Vec<ComponentValue> = kinds
        .iter()
        .filter_map(|&kind| world.value_of(id, kind))
        .collect();

    buf.put_u32_le(id.0);
    buf.put_u8(values.len() as u8);
    for value in &values {
        let kind = value.kind();
        buf.put_u32_le(registry.id(kind));
        buf.put_u16_le(encoded_len(kind) as u16);
        encode_component(value, buf);
    }
}

/// An entity read back from a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntity {
    pub id: EntityId,
    pub components: Vec<ComponentValue>,
    /// Type ids that were skipped because this build does not know them
    pub unknown: Vec<ComponentTypeId>,
}

impl DecodedEntity {
    pub fn get(&self, kind: ComponentKind) -> Option<&ComponentValue> {
        self.components.iter().find(|c| c.kind() == kind)
    }

    pub fn is_player(&self) -> bool {
        self.get(ComponentKind::PlayerLink).is_some()
    }

    /// Static collider without a PlayerLink
    pub fn is_static_world(&self) -> bool {
        !self.is_player()
            && matches!(
                self.get(ComponentKind::Collider),
                Some(ComponentValue::Collider(c)) if c.is_static
            )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedSnapshot {
    pub entities: Vec<DecodedEntity>,
}

impl DecodedSnapshot {
    pub fn players(&self) -> impl Iterator<Item = &DecodedEntity> {
        self.entities.iter().filter(|e| e.is_player())
    }

    pub fn static_world(&self) -> impl Iterator<Item = &DecodedEntity> {
        self.entities.iter().filter(|e| e.is_static_world())
    }
}

/// Decode a snapshot body (the bytes after the packet header)
pub fn decode_snapshot(body: &[u8]) -> Result<DecodedSnapshot, PacketError> {
    let registry = registry();
    let mut buf = body;

    ensure(&buf, 1)?;
    let entity_count = buf.get_u8();
    let mut entities = Vec::with_capacity(entity_count as usize);

    for _ in 0..entity_count {
        ensure(&buf, 5)?;
        let id = EntityId(buf.get_u32_le());
        let component_count = buf.get_u8();

        let mut entity = DecodedEntity {
            id,
            components: Vec::with_capacity(component_count as usize),
            unknown: Vec::new(),
        };

        for _ in 0..component_count {
            ensure(&buf, 6)?;
            let type_id = buf.get_u32_le();
            let len = buf.get_u16_le() as usize;
            ensure(&buf, len)?;
            let (payload, rest) = buf.split_at(len);
            buf = rest;

            match registry.kind_of(type_id) {
                Some(kind) => entity.components.push(decode_component(kind, payload)?),
                None => entity.unknown.push(type_id),
            }
        }
        entities.push(entity);
    }

    Ok(DecodedSnapshot { entities })
}

/// Running totals for emitted snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub skipped_entities: u64,
    pub avg_entities_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, snapshot: &EncodedSnapshot) {
        self.total_snapshots += 1;
        self.total_bytes += snapshot.datagram.len() as u64;
        self.skipped_entities += snapshot.skipped as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_entities_per_snapshot = self.avg_entities_per_snapshot * ((n - 1.0) / n)
            + (f32::from(snapshot.entity_count) / n);
    }
}
