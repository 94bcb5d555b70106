//! Wire protocol and datagram transport

pub mod codec;
pub mod protocol;
pub mod transport;

pub use protocol::{
    InputPayload, Message, Packet, PacketError, PacketHeader, PacketType, MAX_PACKET_SIZE,
};
pub use transport::{MemoryNetwork, MemoryTransport, Transport, TransportError, UdpTransport};
