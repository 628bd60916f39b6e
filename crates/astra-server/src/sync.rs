//! The cross-thread boundary between a session and the network layer.
//!
//! Inbound: the network thread queues player commands; the session drains
//! them at the start of its tick (dropping entries older than the input TTL).
//! Outbound: systems and the session queue typed payloads into per-type
//! buffers during the tick; after the barrier the network thread drains them
//! as framed packets.
//!
//! Drain order is part of the protocol contract: snapshots, then spawns,
//! destroys, cell merges, projectiles, explosions, scores, powerups,
//! respawns, level-ups, wave starts, wave completes, eliminations, skins,
//! leaderboards. Sequence numbers are assigned at drain time and are strictly
//! monotonic per session.
//!
//! Both queues hold their mutex only for push/drain; nothing sleeps under a
//! lock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::BytesMut;

use astra_protocol::packet::{frame, PacketType};
use astra_protocol::payload::{self, Wire};

// ---------------------------------------------------------------------------
// Network entity ids
// ---------------------------------------------------------------------------

/// Allocator for on-the-wire entity ids, shared between the session and the
/// systems that spawn networked entities. Starts at 1; 0 means "none".
#[derive(Clone)]
pub struct NetIdAlloc {
    next: Arc<std::sync::atomic::AtomicU32>,
}

impl NetIdAlloc {
    pub fn new() -> Self {
        Self {
            next: Arc::new(std::sync::atomic::AtomicU32::new(1)),
        }
    }

    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

impl Default for NetIdAlloc {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Inbound commands
// ---------------------------------------------------------------------------

/// A decoded gameplay command from a client.
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    Move(payload::ClientInput),
    Split,
    EjectMass { dir_x: f32, dir_y: f32 },
    SetSkin(u8),
}

/// A queued command plus arrival metadata for the TTL check.
#[derive(Debug, Clone)]
pub struct QueuedInput {
    pub player_id: u32,
    pub command: PlayerCommand,
    pub received: Instant,
}

// ---------------------------------------------------------------------------
// Outbound buffers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Outbox {
    snapshots: Vec<BytesMut>,
    spawns: Vec<payload::ServerEntitySpawn>,
    destroys: Vec<payload::ServerEntityDestroy>,
    merges: Vec<payload::ServerCellMerge>,
    projectiles: Vec<payload::ServerProjectileSpawn>,
    explosions: Vec<payload::ServerExplosion>,
    scores: Vec<payload::ServerScoreUpdate>,
    powerups: Vec<payload::ServerPowerupCollected>,
    respawns: Vec<payload::ServerPlayerRespawn>,
    level_ups: Vec<payload::ServerPlayerLevelUp>,
    wave_starts: Vec<payload::ServerWaveStart>,
    wave_completes: Vec<payload::ServerWaveComplete>,
    eliminations: Vec<payload::ServerPlayerEaten>,
    skins: Vec<payload::ServerPlayerSkin>,
    leaderboards: Vec<BytesMut>,
}

struct NetSyncInner {
    inputs: Mutex<VecDeque<QueuedInput>>,
    outbox: Mutex<Outbox>,
    sequence: Mutex<u16>,
}

// ---------------------------------------------------------------------------
// NetSync
// ---------------------------------------------------------------------------

/// Shared handle to one session's network queues. Cloning is cheap; systems
/// hold clones and queue payloads as they produce them.
#[derive(Clone)]
pub struct NetSync {
    inner: Arc<NetSyncInner>,
}

impl NetSync {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NetSyncInner {
                inputs: Mutex::new(VecDeque::new()),
                outbox: Mutex::new(Outbox::default()),
                sequence: Mutex::new(0),
            }),
        }
    }

    // -- inbound ------------------------------------------------------------

    /// Queue a command from the network thread.
    pub fn queue_input(&self, player_id: u32, command: PlayerCommand) {
        self.inner.inputs.lock().unwrap().push_back(QueuedInput {
            player_id,
            command,
            received: Instant::now(),
        });
    }

    /// Drain all queued commands, dropping entries older than `ttl` seconds.
    /// Returns `(fresh_commands, dropped_count)`.
    pub fn drain_inputs(&self, ttl: f32) -> (Vec<QueuedInput>, usize) {
        let drained: Vec<QueuedInput> = self.inner.inputs.lock().unwrap().drain(..).collect();
        let now = Instant::now();
        let before = drained.len();
        let fresh: Vec<QueuedInput> = drained
            .into_iter()
            .filter(|input| now.duration_since(input.received).as_secs_f32() <= ttl)
            .collect();
        let dropped = before - fresh.len();
        (fresh, dropped)
    }

    /// Number of commands waiting.
    pub fn pending_inputs(&self) -> usize {
        self.inner.inputs.lock().unwrap().len()
    }

    // -- outbound: typed queues ---------------------------------------------

    pub fn queue_snapshot(&self, encoded: BytesMut) {
        self.inner.outbox.lock().unwrap().snapshots.push(encoded);
    }

    pub fn queue_entity_spawn(&self, spawn: payload::ServerEntitySpawn) {
        self.inner.outbox.lock().unwrap().spawns.push(spawn);
    }

    pub fn queue_entity_destroy(&self, destroy: payload::ServerEntityDestroy) {
        self.inner.outbox.lock().unwrap().destroys.push(destroy);
    }

    pub fn queue_cell_merge(&self, merge: payload::ServerCellMerge) {
        self.inner.outbox.lock().unwrap().merges.push(merge);
    }

    pub fn queue_projectile_spawn(&self, projectile: payload::ServerProjectileSpawn) {
        self.inner.outbox.lock().unwrap().projectiles.push(projectile);
    }

    pub fn queue_explosion(&self, explosion: payload::ServerExplosion) {
        self.inner.outbox.lock().unwrap().explosions.push(explosion);
    }

    pub fn queue_score_update(&self, score: payload::ServerScoreUpdate) {
        self.inner.outbox.lock().unwrap().scores.push(score);
    }

    pub fn queue_powerup_collected(&self, powerup: payload::ServerPowerupCollected) {
        self.inner.outbox.lock().unwrap().powerups.push(powerup);
    }

    pub fn queue_player_respawn(&self, respawn: payload::ServerPlayerRespawn) {
        self.inner.outbox.lock().unwrap().respawns.push(respawn);
    }

    pub fn queue_level_up(&self, level_up: payload::ServerPlayerLevelUp) {
        self.inner.outbox.lock().unwrap().level_ups.push(level_up);
    }

    pub fn queue_wave_start(&self, wave_start: payload::ServerWaveStart) {
        self.inner.outbox.lock().unwrap().wave_starts.push(wave_start);
    }

    pub fn queue_wave_complete(&self, wave_complete: payload::ServerWaveComplete) {
        self.inner.outbox.lock().unwrap().wave_completes.push(wave_complete);
    }

    pub fn queue_player_eaten(&self, eaten: payload::ServerPlayerEaten) {
        self.inner.outbox.lock().unwrap().eliminations.push(eaten);
    }

    pub fn queue_player_skin(&self, skin: payload::ServerPlayerSkin) {
        self.inner.outbox.lock().unwrap().skins.push(skin);
    }

    pub fn queue_leaderboard(&self, encoded: BytesMut) {
        self.inner.outbox.lock().unwrap().leaderboards.push(encoded);
    }

    // -- outbound: drain ----------------------------------------------------

    fn next_sequence(&self) -> u16 {
        let mut seq = self.inner.sequence.lock().unwrap();
        let current = *seq;
        *seq = seq.wrapping_add(1);
        current
    }

    /// Drain every buffered payload as complete framed packets, in the
    /// documented priority order, assigning monotonic sequence numbers.
    pub fn drain_packets(&self) -> Vec<BytesMut> {
        let outbox = {
            let mut guard = self.inner.outbox.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        let mut packets = Vec::new();
        let mut push = |packet_type: PacketType, body: &[u8], packets: &mut Vec<BytesMut>| {
            packets.push(frame(packet_type, self.next_sequence(), body));
        };

        for snapshot in &outbox.snapshots {
            push(PacketType::ServerSnapshot, snapshot, &mut packets);
        }
        for spawn in &outbox.spawns {
            push(PacketType::ServerEntitySpawn, &spawn.to_bytes(), &mut packets);
        }
        for destroy in &outbox.destroys {
            push(PacketType::ServerEntityDestroy, &destroy.to_bytes(), &mut packets);
        }
        for merge in &outbox.merges {
            push(PacketType::ServerCellMerge, &merge.to_bytes(), &mut packets);
        }
        for projectile in &outbox.projectiles {
            push(PacketType::ServerProjectileSpawn, &projectile.to_bytes(), &mut packets);
        }
        for explosion in &outbox.explosions {
            push(PacketType::ServerExplosion, &explosion.to_bytes(), &mut packets);
        }
        for score in &outbox.scores {
            push(PacketType::ServerScoreUpdate, &score.to_bytes(), &mut packets);
        }
        for powerup in &outbox.powerups {
            push(PacketType::ServerPowerupCollected, &powerup.to_bytes(), &mut packets);
        }
        for respawn in &outbox.respawns {
            push(PacketType::ServerPlayerRespawn, &respawn.to_bytes(), &mut packets);
        }
        for level_up in &outbox.level_ups {
            push(PacketType::ServerPlayerLevelUp, &level_up.to_bytes(), &mut packets);
        }
        for wave_start in &outbox.wave_starts {
            push(PacketType::ServerWaveStart, &wave_start.to_bytes(), &mut packets);
        }
        for wave_complete in &outbox.wave_completes {
            push(PacketType::ServerWaveComplete, &wave_complete.to_bytes(), &mut packets);
        }
        for eaten in &outbox.eliminations {
            push(PacketType::ServerPlayerEaten, &eaten.to_bytes(), &mut packets);
        }
        for skin in &outbox.skins {
            push(PacketType::ServerPlayerSkin, &skin.to_bytes(), &mut packets);
        }
        for leaderboard in &outbox.leaderboards {
            push(PacketType::ServerLeaderboard, leaderboard, &mut packets);
        }
        packets
    }
}

impl Default for NetSync {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
