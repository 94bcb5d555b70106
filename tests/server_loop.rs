use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::time::{timeout, Instant};
use tokio_test::assert_ok;

use arena_server::app::RoomDirectory;
use arena_server::config::Config;
use arena_server::ecs::PlayerId;
use arena_server::game::{decode_snapshot, GameServer, RoomId};
use arena_server::net::{Message, Packet, PacketHeader, UdpTransport};

async fn client() -> UdpSocket {
    assert_ok!(UdpSocket::bind("127.0.0.1:0").await)
}

async fn send(socket: &UdpSocket, server: SocketAddr, message: Message) {
    let packet = Packet::new(PacketHeader::new(0, 0, PlayerId::UNSET), message);
    assert_ok!(socket.send_to(&packet.encode(), server).await);
}

/// Read packets until one matches or two seconds pass
async fn wait_for<F>(socket: &UdpSocket, mut wanted: F) -> Option<Packet>
where
    F: FnMut(&Packet) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut buf = [0u8; 2048];
    while Instant::now() < deadline {
        let Ok(Ok((len, _))) = timeout(Duration::from_millis(200), socket.recv_from(&mut buf)).await else {
            continue;
        };
        let packet = assert_ok!(Packet::decode(&buf[..len]));
        if wanted(&packet) {
            return Some(packet);
        }
    }
    None
}

#[tokio::test]
async fn clients_get_snapshots_then_a_match_over_udp() {
    let transport = assert_ok!(UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await);
    let directory = Arc::new(RoomDirectory::new());
    let config = Arc::new(Config {
        spawn_seed: Some(3),
        ..Config::default()
    });
    let server = GameServer::new(transport, config, directory.clone());
    let server_addr = assert_ok!(server.local_addr());

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run(async move {
        let _ = stopped.await;
    }));

    let a = client().await;
    let b = client().await;
    send(&a, server_addr, Message::Connect).await;
    send(&b, server_addr, Message::Connect).await;

    let snapshot = wait_for(&a, |p| matches!(p.message, Message::Snapshot(_)))
        .await
        .expect("no snapshot");
    let Message::Snapshot(body) = &snapshot.message else {
        unreachable!()
    };
    let decoded = assert_ok!(decode_snapshot(body));
    assert_eq!(decoded.static_world().count(), 13);
    assert!(decoded.players().count() >= 1);

    send(&a, server_addr, Message::FindMatch { group_size: None }).await;
    send(&b, server_addr, Message::FindMatch { group_size: None }).await;

    for socket in [&a, &b] {
        let found = wait_for(socket, |p| matches!(p.message, Message::MatchFound { .. }))
            .await
            .expect("no match found");
        assert_eq!(found.message, Message::MatchFound { room_id: RoomId(1) });
    }

    let _ = stop.send(());
    let counters = assert_ok!(handle.await);
    assert!(counters.packets_received >= 4);
    assert!(counters.snapshots_sent >= 1);

    // Shutdown withdraws every room from the admin view
    assert_eq!(directory.room_count(), 0);
}
