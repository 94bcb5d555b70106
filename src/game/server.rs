//! Authoritative server loop
//!
//! A single task owns the transport, every room, the matchmaking queue and
//! the anti-cheat counters. One iteration:
//!
//! 1. drain the socket (bounded number of receive attempts)
//! 2. run the fixed steps that became due in every active room
//! 3. form matches and move their players into fresh rooms
//! 4. emit throttled snapshots to each room's members
//! 5. publish summaries for the admin surface
//!
//! Players are identified by their source address; only `Connect` creates one.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::anticheat::{AntiCheat, AntiCheatSettings};
use crate::app::{RoomDirectory, RoomSummary, ServerSummary};
use crate::config::Config;
use crate::ecs::{PlayerId, Position};
use crate::matchmaking::{MatchmakingQueue, QueueError};
use crate::net::{InputPayload, Message, Packet, PacketHeader, Transport, TransportError};
use crate::util::rate_limit::LogGate;
use crate::util::time::{unix_millis, Timer};

use super::room::{Room, RoomId, RoomSettings};
use super::scheduler::{Tick, TickScheduler};
use super::snapshot::{SnapshotEncoder, SnapshotStats};

/// Pause between iterations
pub const IDLE_SLEEP: Duration = Duration::from_micros(100);

const RECV_BUFFER_SIZE: usize = 2048;

#[derive(Debug, Clone, Copy)]
struct ConnectedPlayer {
    id: PlayerId,
    addr: SocketAddr,
    room: RoomId,
    last_seen: Tick,
}

/// Totals since startup
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerCounters {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub snapshots_sent: u64,
    pub players_kicked: u64,
}

pub struct GameServer<T: Transport> {
    transport: T,
    config: Arc<Config>,
    scheduler: TickScheduler,
    rooms: BTreeMap<RoomId, Room>,
    next_room_id: u32,
    players: HashMap<PlayerId, ConnectedPlayer>,
    by_addr: HashMap<SocketAddr, PlayerId>,
    next_player_id: u32,
    matchmaking: MatchmakingQueue,
    anticheat: AntiCheat,
    encoder: SnapshotEncoder,
    snapshot_stats: SnapshotStats,
    counters: ServerCounters,
    directory: Arc<RoomDirectory>,
    recv_buf: Vec<u8>,
    sequence: u32,
    seed: u64,
    drop_log: LogGate,
    snapshot_log: LogGate,
}

impl<T: Transport> GameServer<T> {
    pub fn new(transport: T, config: Arc<Config>, directory: Arc<RoomDirectory>) -> Self {
        Self::starting_at(transport, config, directory, Instant::now())
    }

    /// Like `new`, with the first frame measured from `now`
    pub fn starting_at(
        transport: T,
        config: Arc<Config>,
        directory: Arc<RoomDirectory>,
        now: Instant,
    ) -> Self {
        let anticheat = AntiCheat::new(AntiCheatSettings {
            enabled: config.anti_cheat_enabled,
            max_packets_per_second: config.max_packets_per_second,
            max_movement_speed: config.max_movement_speed,
            kick_threshold: config.suspicion_kick_threshold,
        });

        Self {
            transport,
            scheduler: TickScheduler::starting_at(config.tick_rate, now),
            rooms: BTreeMap::new(),
            next_room_id: RoomId::LOBBY.0 + 1,
            players: HashMap::new(),
            by_addr: HashMap::new(),
            next_player_id: 0,
            matchmaking: MatchmakingQueue::new(
                config.matchmaking_queue_capacity,
                config.players_per_match,
            ),
            anticheat,
            encoder: SnapshotEncoder::new(),
            snapshot_stats: SnapshotStats::default(),
            counters: ServerCounters::default(),
            directory,
            recv_buf: vec![0; RECV_BUFFER_SIZE],
            sequence: 0,
            seed: config.spawn_seed.unwrap_or_else(rand::random),
            drop_log: LogGate::default(),
            snapshot_log: LogGate::default(),
            config,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.transport.local_addr()
    }

    pub fn server_tick(&self) -> Tick {
        self.scheduler.tick()
    }

    pub fn counters(&self) -> ServerCounters {
        self.counters
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_at(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.by_addr.get(&addr).copied()
    }

    pub fn player_room(&self, player_id: PlayerId) -> Option<RoomId> {
        self.players.get(&player_id).map(|p| p.room)
    }

    pub fn queue_len(&self) -> usize {
        self.matchmaking.len()
    }

    /// Run the loop until `shutdown` resolves. Shutdown is only observed
    /// between iterations.
    pub async fn run<F>(mut self, shutdown: F) -> ServerCounters
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            addr = ?self.transport.local_addr().ok(),
            tick_rate = self.config.tick_rate,
            "Game loop started"
        );

        loop {
            self.iterate(Instant::now());

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(IDLE_SLEEP) => {}
            }
        }

        self.shutdown();
        self.counters
    }

    /// One loop iteration with `now` as the frame time
    pub fn iterate(&mut self, now: Instant) {
        let timer = Timer::new();
        let elapsed = self.scheduler.measure(now);

        self.poll_transport();

        let steps = self.scheduler.advance(elapsed);
        for _ in 0..steps {
            self.run_step();
        }
        if steps > 0 {
            self.expire_idle_players();
            self.anticheat.sweep();
        }

        self.process_matchmaking();
        self.send_snapshots();
        self.close_empty_rooms();

        if steps > 0 {
            self.publish(timer.elapsed_micros());
        }
    }

    // ========================================================================
    // Inbound packets
    // ========================================================================

    fn poll_transport(&mut self) {
        for _ in 0..self.config.max_recv_per_iteration {
            let (len, from) = match self.transport.try_recv(&mut self.recv_buf) {
                Ok(Some(received)) => received,
                Ok(None) => break,
                Err(err) => {
                    if self.drop_log.allow() {
                        warn!(error = %err, "Receive failed");
                    }
                    break;
                }
            };
            self.counters.packets_received += 1;

            match Packet::decode(&self.recv_buf[..len]) {
                Ok(packet) => self.handle_packet(from, packet),
                Err(err) => {
                    self.counters.packets_dropped += 1;
                    if self.drop_log.allow() {
                        debug!(peer = %from, len, error = %err, "Dropped malformed packet");
                    }
                }
            }
        }
    }

    fn handle_packet(&mut self, from: SocketAddr, packet: Packet) {
        let player_id = match self.by_addr.get(&from).copied() {
            Some(id) => id,
            None if packet.message == Message::Connect => match self.connect(from) {
                Some(id) => id,
                None => return,
            },
            None => {
                if self.drop_log.allow() {
                    debug!(
                        peer = %from,
                        packet_type = ?packet.message.packet_type(),
                        "Ignoring packet from unknown peer"
                    );
                }
                return;
            }
        };

        let tick = self.scheduler.tick();
        if let Some(player) = self.players.get_mut(&player_id) {
            player.last_seen = tick;
        }

        match packet.message {
            Message::Disconnect => self.disconnect(player_id, "client request"),
            Message::Input(input) => self.handle_input(player_id, &input, packet.header.sequence),
            Message::FindMatch { group_size } => self.find_match(player_id, group_size),
            Message::CancelMatch => self.cancel_match(player_id),
            // Connect and heartbeat only refresh the peer; the rest are server-to-client
            Message::Connect
            | Message::Heartbeat
            | Message::Snapshot(_)
            | Message::Delta(_)
            | Message::Ack
            | Message::Rpc(_)
            | Message::MatchFound { .. } => {}
        }
    }

    /// Register a new peer. `None` once every id below the unset sentinel is used.
    fn connect(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        let id = PlayerId(self.next_player_id);
        let Some(next) = self.next_player_id.checked_add(1).filter(|_| id.is_set()) else {
            if self.drop_log.allow() {
                warn!(peer = %addr, "Player ids exhausted, refusing connect");
            }
            return None;
        };
        self.next_player_id = next;

        self.by_addr.insert(addr, id);
        self.players.insert(
            id,
            ConnectedPlayer {
                id,
                addr,
                room: RoomId::LOBBY,
                last_seen: self.scheduler.tick(),
            },
        );
        let entity = self.lobby().add_player(id);

        info!(player_id = %id, peer = %addr, entity_id = %entity, "Player connected");
        Some(id)
    }

    fn disconnect(&mut self, player_id: PlayerId, reason: &'static str) {
        let Some(player) = self.players.remove(&player_id) else {
            return;
        };
        self.by_addr.remove(&player.addr);
        if let Some(room) = self.rooms.get_mut(&player.room) {
            room.remove_player(player_id);
        }
        self.matchmaking.dequeue(player_id);
        self.anticheat.reset(player_id);

        info!(player_id = %player_id, peer = %player.addr, reason, "Player disconnected");
    }

    fn kick(&mut self, player_id: PlayerId) {
        self.send_to_player(player_id, Message::Disconnect);
        self.counters.players_kicked += 1;
        warn!(
            player_id = %player_id,
            suspicion = self.anticheat.suspicion(player_id),
            "Kicking player"
        );
        self.disconnect(player_id, "kicked");
    }

    fn handle_input(&mut self, player_id: PlayerId, input: &InputPayload, sequence: u32) {
        let verdict = self.anticheat.record_packet(player_id);
        if !verdict.accepted {
            if self.drop_log.allow() {
                warn!(player_id = %player_id, suspicion = verdict.suspicion, "Input rate exceeded");
            }
            if self.anticheat.should_kick(player_id) {
                self.kick(player_id);
            }
            return;
        }

        let Some(room_id) = self.player_room(player_id) else {
            return;
        };
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.apply_input(player_id, input, sequence);
        }
    }

    fn find_match(&mut self, player_id: PlayerId, group_size: Option<u8>) {
        match self.matchmaking.enqueue(player_id, group_size) {
            Ok(()) => info!(
                player_id = %player_id,
                queue_size = self.matchmaking.len(),
                "Player queued for match"
            ),
            Err(QueueError::AlreadyQueued(_)) => {
                debug!(player_id = %player_id, "Already queued");
            }
            Err(err) => warn!(player_id = %player_id, error = %err, "Matchmaking request rejected"),
        }
    }

    fn cancel_match(&mut self, player_id: PlayerId) {
        if self.matchmaking.dequeue(player_id).is_some() {
            info!(player_id = %player_id, "Player left matchmaking queue");
        }
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    fn run_step(&mut self) {
        let mut suspects = Vec::new();

        for room in self.rooms.values_mut() {
            if !room.is_active() {
                continue;
            }
            room.step();

            if !self.anticheat.settings().enabled {
                continue;
            }
            let dt = room.dt();
            for &player_id in room.players() {
                let Some(position) = room
                    .player_entity(player_id)
                    .and_then(|entity| room.world().get::<Position>(entity))
                else {
                    continue;
                };
                let verdict = self.anticheat.check_movement(player_id, position.value, dt);
                if !verdict.accepted {
                    warn!(
                        room_id = %room.id(),
                        player_id = %player_id,
                        suspicion = verdict.suspicion,
                        "Movement speed over limit"
                    );
                    if self.anticheat.should_kick(player_id) {
                        suspects.push(player_id);
                    }
                }
            }
        }

        for player_id in suspects {
            self.kick(player_id);
        }
    }

    fn expire_idle_players(&mut self) {
        let tick = self.scheduler.tick();
        let timeout = self.config.player_timeout_ticks;
        let idle: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| tick.saturating_sub(p.last_seen) > timeout)
            .map(|p| p.id)
            .collect();

        for player_id in idle {
            self.disconnect(player_id, "timed out");
        }
    }

    fn process_matchmaking(&mut self) {
        for group in self.matchmaking.process() {
            let room_id = RoomId(self.next_room_id);
            self.next_room_id += 1;
            let mut room = Room::new(room_id, self.room_settings(room_id));

            for &player_id in &group {
                let Some(player) = self.players.get_mut(&player_id) else {
                    continue;
                };
                let previous = std::mem::replace(&mut player.room, room_id);
                if let Some(old_room) = self.rooms.get_mut(&previous) {
                    old_room.remove_player(player_id);
                }
                room.add_player(player_id);
                // New spawn point is not a movement sample
                self.anticheat.reset(player_id);
            }

            info!(room_id = %room_id, players = group.len(), "Match formed");
            self.rooms.insert(room_id, room);

            for &player_id in &group {
                self.send_to_player(player_id, Message::MatchFound { room_id });
            }
        }
    }

    fn close_empty_rooms(&mut self) {
        let empty: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(id, room)| **id != RoomId::LOBBY && room.players().is_empty())
            .map(|(id, _)| *id)
            .collect();

        for id in empty {
            if let Some(mut room) = self.rooms.remove(&id) {
                room.close();
                self.directory.remove_room(id);
            }
        }
    }

    fn lobby(&mut self) -> &mut Room {
        let settings = self.room_settings(RoomId::LOBBY);
        self.rooms
            .entry(RoomId::LOBBY)
            .or_insert_with(|| Room::new(RoomId::LOBBY, settings))
    }

    fn room_settings(&self, id: RoomId) -> RoomSettings {
        RoomSettings {
            tick_rate: self.config.tick_rate,
            snapshot_interval_ticks: self.config.snapshot_interval_ticks,
            input_timeout_ticks: self.config.input_timeout_ticks,
            seed: self.seed.wrapping_add(u64::from(id.0)),
        }
    }

    // ========================================================================
    // Outbound packets
    // ========================================================================

    fn send_snapshots(&mut self) {
        for room in self.rooms.values_mut() {
            if room.players().is_empty() || !room.snapshot_due() {
                continue;
            }

            let header = PacketHeader::new(self.sequence, room.tick(), PlayerId::UNSET);
            self.sequence = self.sequence.wrapping_add(1);
            let snapshot = self.encoder.encode(room.world(), header);
            self.snapshot_stats.record(&snapshot);

            if snapshot.skipped > 0 && self.snapshot_log.allow() {
                warn!(
                    room_id = %room.id(),
                    sent = snapshot.entity_count,
                    skipped = snapshot.skipped,
                    "Snapshot over datagram limits, entities left out"
                );
            }

            for &player_id in room.players() {
                let Some(player) = self.players.get(&player_id) else {
                    continue;
                };
                let datagram = snapshot.addressed_to(player_id);
                match self.transport.send_to(&datagram, player.addr) {
                    Ok(_) => self.counters.snapshots_sent += 1,
                    Err(err) => {
                        if self.drop_log.allow() {
                            warn!(player_id = %player_id, peer = %player.addr, error = %err, "Snapshot send failed");
                        }
                    }
                }
            }
        }
    }

    fn send_to_player(&mut self, player_id: PlayerId, message: Message) {
        let Some(addr) = self.players.get(&player_id).map(|p| p.addr) else {
            return;
        };
        let header = PacketHeader::new(self.sequence, self.scheduler.tick(), player_id);
        self.sequence = self.sequence.wrapping_add(1);

        let datagram = Packet::new(header, message).encode();
        if let Err(err) = self.transport.send_to(&datagram, addr) {
            if self.drop_log.allow() {
                warn!(player_id = %player_id, peer = %addr, error = %err, "Send failed");
            }
        }
    }

    fn publish(&self, iteration_micros: u64) {
        let now_ms = unix_millis();
        for room in self.rooms.values() {
            self.directory.publish_room(RoomSummary {
                id: room.id(),
                state: room.state(),
                tick: room.tick(),
                players: room.players().to_vec(),
                active_entities: room.world().active_count(),
                walls: room.walls().len(),
                updated_at_ms: now_ms,
            });
        }

        self.directory.publish_server(ServerSummary {
            server_tick: self.scheduler.tick(),
            connected_players: self.players.len(),
            queue_size: self.matchmaking.len(),
            packets_received: self.counters.packets_received,
            packets_dropped: self.counters.packets_dropped,
            snapshots_sent: self.counters.snapshots_sent,
            snapshot_bytes: self.snapshot_stats.total_bytes,
            skipped_entities: self.snapshot_stats.skipped_entities,
            players_kicked: self.counters.players_kicked,
            last_iteration_micros: iteration_micros,
        });
    }

    fn shutdown(&mut self) {
        let players: Vec<PlayerId> = self.players.keys().copied().collect();
        for player_id in players {
            self.send_to_player(player_id, Message::Disconnect);
        }
        for (id, room) in self.rooms.iter_mut() {
            room.close();
            self.directory.remove_room(*id);
        }
        self.transport.close();

        info!(
            server_tick = self.scheduler.tick(),
            packets_received = self.counters.packets_received,
            snapshots_sent = self.counters.snapshots_sent,
            avg_entities = self.snapshot_stats.avg_entities_per_snapshot,
            "Game loop stopped"
        );
    }
}
