//! Datagram protocol: packet header and message payloads
//!
//! Every datagram starts with a fixed 17-byte header:
//!
//! | field       | type |
//! |-------------|------|
//! | type        | u8   |
//! | sequence    | u32  |
//! | server_tick | u64  |
//! | player_id   | u32  |
//!
//! All integers and floats are little-endian with no padding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ecs::{InputFlags, PlayerId};
use crate::game::RoomId;

/// Largest datagram either side sends or accepts
pub const MAX_PACKET_SIZE: usize = 1400;

/// Packet errors. Inbound packets that fail to decode are dropped.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet truncated: needed {needed} more bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),

    #[error("malformed packet: {0}")]
    Malformed(&'static str),
}

/// Fail with `Truncated` unless `buf` holds at least `needed` bytes
pub(crate) fn ensure(buf: &impl Buf, needed: usize) -> Result<(), PacketError> {
    if buf.remaining() < needed {
        return Err(PacketError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 0,
    Disconnect = 1,
    Heartbeat = 2,
    Input = 3,
    Snapshot = 4,
    Delta = 5,
    Ack = 6,
    Rpc = 7,
    FindMatch = 8,
    MatchFound = 9,
    CancelMatch = 10,
}

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => PacketType::Connect,
            1 => PacketType::Disconnect,
            2 => PacketType::Heartbeat,
            3 => PacketType::Input,
            4 => PacketType::Snapshot,
            5 => PacketType::Delta,
            6 => PacketType::Ack,
            7 => PacketType::Rpc,
            8 => PacketType::FindMatch,
            9 => PacketType::MatchFound,
            10 => PacketType::CancelMatch,
            other => return Err(PacketError::UnknownPacketType(other)),
        })
    }
}

/// Header fields other than the type byte, which follows from the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub sequence: u32,
    pub server_tick: u64,
    pub player_id: PlayerId,
}

impl PacketHeader {
    pub const SIZE: usize = 17;
    /// Byte offset of `player_id` within an encoded header
    pub const PLAYER_ID_OFFSET: usize = 13;

    pub fn new(sequence: u32, server_tick: u64, player_id: PlayerId) -> Self {
        Self {
            sequence,
            server_tick,
            player_id,
        }
    }
}

/// Held actions and look angles sent by a client
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputPayload {
    pub flags: InputFlags,
    pub yaw: f32,
    pub pitch: f32,
}

impl InputPayload {
    pub const SIZE: usize = 10;
}

/// Message body, one variant per packet type
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Connect,
    Disconnect,
    Heartbeat,
    Input(InputPayload),
    /// Encoded snapshot body, see `game::snapshot`
    Snapshot(Bytes),
    Delta(Bytes),
    Ack,
    Rpc(Bytes),
    /// Desired group size, or the server default when absent
    FindMatch { group_size: Option<u8> },
    MatchFound { room_id: RoomId },
    CancelMatch,
}

impl Message {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Message::Connect => PacketType::Connect,
            Message::Disconnect => PacketType::Disconnect,
            Message::Heartbeat => PacketType::Heartbeat,
            Message::Input(_) => PacketType::Input,
            Message::Snapshot(_) => PacketType::Snapshot,
            Message::Delta(_) => PacketType::Delta,
            Message::Ack => PacketType::Ack,
            Message::Rpc(_) => PacketType::Rpc,
            Message::FindMatch { .. } => PacketType::FindMatch,
            Message::MatchFound { .. } => PacketType::MatchFound,
            Message::CancelMatch => PacketType::CancelMatch,
        }
    }
}

/// A decoded datagram
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: PacketHeader,
    pub message: Message,
}

impl Packet {
    pub fn new(header: PacketHeader, message: Message) -> Self {
        Self { header, message }
    }

    /// Serialize header and body
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PacketHeader::SIZE + 16);
        self.encode_into(&mut buf);
        buf.freeze()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.message.packet_type() as u8);
        buf.put_u32_le(self.header.sequence);
        buf.put_u64_le(self.header.server_tick);
        buf.put_u32_le(self.header.player_id.0);

        match &self.message {
            Message::Input(input) => {
                buf.put_u16_le(input.flags.bits());
                buf.put_f32_le(input.yaw);
                buf.put_f32_le(input.pitch);
            }
            Message::Snapshot(body) | Message::Delta(body) | Message::Rpc(body) => {
                buf.put_slice(body);
            }
            Message::FindMatch { group_size } => {
                if let Some(size) = group_size {
                    buf.put_u8(*size);
                }
            }
            Message::MatchFound { room_id } => buf.put_u32_le(room_id.0),
            Message::Connect
            | Message::Disconnect
            | Message::Heartbeat
            | Message::Ack
            | Message::CancelMatch => {}
        }
    }

    /// Parse a datagram. Every read is bounds-checked; trailing bytes after a
    /// fixed-size body are ignored.
    pub fn decode(datagram: &[u8]) -> Result<Self, PacketError> {
        let mut buf = datagram;
        ensure(&buf, PacketHeader::SIZE)?;

        let packet_type = PacketType::try_from(buf.get_u8())?;
        let header = PacketHeader {
            sequence: buf.get_u32_le(),
            server_tick: buf.get_u64_le(),
            player_id: PlayerId(buf.get_u32_le()),
        };

        let message = match packet_type {
            PacketType::Connect => Message::Connect,
            PacketType::Disconnect => Message::Disconnect,
            PacketType::Heartbeat => Message::Heartbeat,
            PacketType::Ack => Message::Ack,
            PacketType::CancelMatch => Message::CancelMatch,
            PacketType::Input => {
                ensure(&buf, InputPayload::SIZE)?;
                let flags = InputFlags::from_bits_truncate(buf.get_u16_le());
                let yaw = buf.get_f32_le();
                let pitch = buf.get_f32_le();
                if !yaw.is_finite() || !pitch.is_finite() {
                    return Err(PacketError::Malformed("non-finite look angle"));
                }
                Message::Input(InputPayload { flags, yaw, pitch })
            }
            PacketType::Snapshot => Message::Snapshot(Bytes::copy_from_slice(buf)),
            PacketType::Delta => Message::Delta(Bytes::copy_from_slice(buf)),
            PacketType::Rpc => Message::Rpc(Bytes::copy_from_slice(buf)),
            PacketType::FindMatch => Message::FindMatch {
                group_size: buf.has_remaining().then(|| buf.get_u8()),
            },
            PacketType::MatchFound => {
                ensure(&buf, 4)?;
                Message::MatchFound {
                    room_id: RoomId(buf.get_u32_le()),
                }
            }
        };

        Ok(Self { header, message })
    }
}
