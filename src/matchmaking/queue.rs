//! Matchmaking queue implementation

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::ecs::PlayerId;

/// Largest group a player may ask for
pub const MAX_GROUP_SIZE: u8 = 16;

/// Queue errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("player {0} is already queued")]
    AlreadyQueued(PlayerId),

    #[error("matchmaking queue is full ({capacity} players)")]
    QueueFull { capacity: usize },

    #[error("invalid group size {0}")]
    InvalidGroupSize(u8),
}

/// Player in the matchmaking queue
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub player_id: PlayerId,
    pub group_size: u8,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// Bounded FIFO queue grouping players who asked for the same group size
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedPlayer>,
    queued: HashSet<PlayerId>,
    capacity: usize,
    default_group_size: u8,
}

impl MatchmakingQueue {
    pub fn new(capacity: usize, default_group_size: u8) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            capacity,
            default_group_size: default_group_size.clamp(1, MAX_GROUP_SIZE),
        }
    }

    /// Add a player wanting a group of `group_size` (default when `None`)
    pub fn enqueue(&mut self, player_id: PlayerId, group_size: Option<u8>) -> Result<(), QueueError> {
        let group_size = group_size.unwrap_or(self.default_group_size);
        if group_size == 0 || group_size > MAX_GROUP_SIZE {
            return Err(QueueError::InvalidGroupSize(group_size));
        }
        if self.queued.contains(&player_id) {
            return Err(QueueError::AlreadyQueued(player_id));
        }
        if self.queue.len() >= self.capacity {
            return Err(QueueError::QueueFull {
                capacity: self.capacity,
            });
        }

        self.queued.insert(player_id);
        self.queue.push_back(QueuedPlayer {
            player_id,
            group_size,
            queued_at: Instant::now(),
        });
        Ok(())
    }

    /// Remove a player from the queue
    pub fn dequeue(&mut self, player_id: PlayerId) -> Option<QueuedPlayer> {
        if !self.queued.remove(&player_id) {
            return None;
        }
        let pos = self.queue.iter().position(|p| p.player_id == player_id)?;
        self.queue.remove(pos)
    }

    /// Check if a player is in the queue
    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.queued.contains(&player_id)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn default_group_size(&self) -> u8 {
        self.default_group_size
    }

    /// Form every complete group. Groups are filled in queue order; the group
    /// size whose oldest waiting player completes first is served first.
    pub fn process(&mut self) -> Vec<Vec<PlayerId>> {
        let mut groups = Vec::new();
        while let Some(size) = self.next_complete_size() {
            let mut group = Vec::with_capacity(size as usize);
            let mut i = 0;
            while i < self.queue.len() && group.len() < size as usize {
                if self.queue[i].group_size == size {
                    if let Some(player) = self.queue.remove(i) {
                        self.queued.remove(&player.player_id);
                        group.push(player.player_id);
                    }
                } else {
                    i += 1;
                }
            }
            groups.push(group);
        }
        groups
    }

    /// Group size of the earliest-completing group, if any
    fn next_complete_size(&self) -> Option<u8> {
        let mut counts = [0usize; MAX_GROUP_SIZE as usize + 1];
        for player in &self.queue {
            let size = player.group_size as usize;
            counts[size] += 1;
            if counts[size] >= size {
                return Some(player.group_size);
            }
        }
        None
    }
}

impl Default for MatchmakingQueue {
    fn default() -> Self {
        Self::new(256, 2)
    }
}
