//! Lives, checkpoints, and respawns (Scroller mode).
//!
//! On a player death the system decrements that player's lives. With lives
//! left, a respawn is scheduled 3 seconds out at the active checkpoint, with
//! full health, a fresh BASIC weapon, and a spawn-protection window. When
//! every player is out of lives the game is over.

use tracing::info;

use astra_ecs::prelude::*;
use astra_protocol::payload::ServerPlayerRespawn;

use crate::components::{
    Checkpoint, CheckpointManager, Collider, Controllable, GameStatus, Health, InputState,
    Invulnerability, NetworkId, Player, PlayerLevel, PlayerLives, Position, Score, ScrollState,
    Velocity, Weapon, WeaponKind,
};
use crate::config::scroller;
use crate::events::{EntityDeathEvent, GameOverEvent};
use crate::sync::NetSync;

/// Pending respawn bookkeeping, kept on a singleton alongside the
/// checkpoint list because the dead player no longer has an entity.
#[derive(Debug, Clone)]
pub struct PendingRespawn {
    pub player_id: u32,
    pub name: String,
    pub skin_id: u8,
    pub color_id: u8,
    pub score: u32,
    pub lives_remaining: u8,
    pub timer: f32,
    pub checkpoint_index: usize,
}

/// Singleton component holding respawns in flight.
#[derive(Debug, Clone, Default)]
pub struct RespawnQueue {
    pub pending: Vec<PendingRespawn>,
}

pub struct CheckpointSystem {
    net: NetSync,
}

impl CheckpointSystem {
    pub fn new(net: NetSync) -> Self {
        Self { net }
    }

    fn respawn_player(registry: &mut Registry, net: &NetSync, pending: &PendingRespawn) {
        let (x, y) = {
            let managers = registry.components::<CheckpointManager>();
            let entry = managers.iter().next();
            entry
                .and_then(|(_, m)| m.checkpoints.get(pending.checkpoint_index).copied())
                .map(|cp: Checkpoint| (cp.spawn_x, cp.spawn_y))
                .unwrap_or((scroller::PLAYER_SPAWN_X, scroller::PLAYER_SPAWN_Y_BASE))
        };

        let entity = registry.spawn_entity();
        registry.add_component(entity, Position { x, y });
        registry.add_component(entity, Velocity::default());
        registry.add_component(entity, Health::full(scroller::PLAYER_MAX_HEALTH));
        registry.add_component(
            entity,
            Controllable {
                speed: scroller::PLAYER_MOVEMENT_SPEED,
            },
        );
        registry.add_component(
            entity,
            Collider {
                width: scroller::HITBOX_SMALL,
                height: scroller::HITBOX_SMALL,
            },
        );
        registry.add_component(
            entity,
            Invulnerability {
                time_remaining: scroller::INVULNERABILITY_TIME,
            },
        );
        registry.add_component(
            entity,
            Score {
                value: pending.score,
            },
        );
        registry.add_component(entity, Weapon::new(WeaponKind::Basic));
        registry.add_component(entity, PlayerLevel::new(pending.color_id));
        registry.add_component(entity, InputState::default());
        registry.add_component(
            entity,
            Player {
                player_id: pending.player_id,
                name: pending.name.clone(),
                skin_id: pending.skin_id,
            },
        );
        registry.add_component(
            entity,
            PlayerLives {
                lives_remaining: pending.lives_remaining,
                respawn_pending: false,
                respawn_timer: 0.0,
            },
        );
        registry.add_component(entity, NetworkId { id: entity.id() });

        info!(
            player = pending.player_id,
            lives = pending.lives_remaining,
            "player respawned at checkpoint"
        );
        net.queue_player_respawn(ServerPlayerRespawn {
            player_id: pending.player_id,
            spawn_x: x,
            spawn_y: y,
            lives_remaining: pending.lives_remaining,
        });
    }
}

impl System for CheckpointSystem {
    fn name(&self) -> &'static str {
        "checkpoint"
    }

    fn init(&mut self, registry: &mut Registry) {
        registry
            .event_bus()
            .subscribe::<EntityDeathEvent, _>(move |registry, event| {
                if !event.is_player {
                    return;
                }
                // Capture everything the respawn needs before the entity is
                // swept away at end of tick.
                let snapshot = {
                    let players = registry.components::<Player>();
                    let lives = registry.components::<PlayerLives>();
                    let scores = registry.components::<Score>();
                    let levels = registry.components::<PlayerLevel>();
                    let Some(player) = players.get(event.entity) else {
                        return;
                    };
                    let Some(player_lives) = lives.get(event.entity) else {
                        return;
                    };
                    let remaining = player_lives.lives_remaining.saturating_sub(1);
                    PendingRespawn {
                        player_id: player.player_id,
                        name: player.name.clone(),
                        skin_id: player.skin_id,
                        color_id: levels.get(event.entity).map_or(0, |l| l.color_id),
                        score: scores.get(event.entity).map_or(0, |s| s.value),
                        lives_remaining: remaining,
                        timer: scroller::RESPAWN_DELAY,
                        checkpoint_index: registry
                            .components::<CheckpointManager>()
                            .iter()
                            .next()
                            .map_or(0, |(_, m)| m.active_index),
                    }
                };

                info!(
                    player = snapshot.player_id,
                    lives = snapshot.lives_remaining,
                    "player died"
                );

                if snapshot.lives_remaining > 0 {
                    let mut queues = registry.components_mut::<RespawnQueue>();
                    let entry = queues.iter_mut().next();
                    if let Some((_, queue)) = entry {
                        queue.pending.push(snapshot);
                    }
                } else {
                    // Out of lives. If nobody is left alive or pending, the
                    // run is over.
                    let any_alive = registry.components::<PlayerLives>().len() > 1
                        || registry
                            .components::<RespawnQueue>()
                            .iter()
                            .next()
                            .is_some_and(|(_, q)| !q.pending.is_empty());
                    if !any_alive {
                        let mut statuses = registry.components_mut::<GameStatus>();
                        if let Some((_, status)) = statuses.iter_mut().next() {
                            status.game_over = true;
                        }
                        drop(statuses);
                        registry.publish(&GameOverEvent { victory: false });
                    }
                }
            });
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        // Advance the active checkpoint with the scroll.
        let current_scroll = registry
            .components::<ScrollState>()
            .iter()
            .next()
            .map_or(0.0, |(_, s)| s.current_scroll);
        {
            let mut managers = registry.components_mut::<CheckpointManager>();
            let entry = managers.iter_mut().next();
            if let Some((_, manager)) = entry {
                while manager.active_index + 1 < manager.checkpoints.len()
                    && manager.checkpoints[manager.active_index + 1].scroll_distance
                        <= current_scroll
                {
                    manager.active_index += 1;
                }
            }
        }

        // Tick respawn timers and collect the ones that are due.
        let due: Vec<PendingRespawn> = {
            let mut queues = registry.components_mut::<RespawnQueue>();
            let Some((_, queue)) = queues.iter_mut().next() else {
                return;
            };
            for pending in queue.pending.iter_mut() {
                pending.timer -= dt;
            }
            let (ready, waiting): (Vec<_>, Vec<_>) =
                queue.pending.drain(..).partition(|p| p.timer <= 0.0);
            queue.pending = waiting;
            ready
        };

        for pending in due {
            Self::respawn_player(registry, &self.net, &pending);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
