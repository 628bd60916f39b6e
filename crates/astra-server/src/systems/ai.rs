//! Enemy steering (Scroller mode).
//!
//! Each enemy kind moves differently:
//!
//! - Basic weaves: straight leftward drift with a vertical sine component
//!   keyed off its own x position.
//! - Fast seeks: when the nearest player is inside the detection range, it
//!   homes at full speed; otherwise it reverts to a straight line.
//! - Tank holds a slow, steady line.
//! - Boss velocities belong to the boss system and are left untouched.
//!
//! Shooting is not handled here; the shooting system owns fire control and
//! its positional gating.

use astra_ecs::prelude::*;

use crate::components::{Ai, Controllable, Enemy, EnemyKind, Position, Velocity};

/// Frequency of the basic weave, in radians per world unit of x.
const SINE_FREQUENCY: f32 = 0.01;
/// Vertical speed amplitude of the basic weave, world-units/sec.
const SINE_AMPLITUDE: f32 = 50.0;

pub struct AiSystem;

impl AiSystem {
    /// Offset and squared distance to the nearest player, if any.
    fn nearest_player_delta(
        players: &ComponentStorage<Controllable>,
        positions: &ComponentStorage<Position>,
        from: Position,
    ) -> Option<(f32, f32, f32)> {
        let mut best: Option<(f32, f32, f32)> = None;
        for (entity, _) in players.iter() {
            let Some(pos) = positions.get(entity) else {
                continue;
            };
            let dx = pos.x - from.x;
            let dy = pos.y - from.y;
            let dist_sq = dx * dx + dy * dy;
            if best.map_or(true, |(_, _, d)| dist_sq < d) {
                best = Some((dx, dy, dist_sq));
            }
        }
        best
    }
}

impl System for AiSystem {
    fn name(&self) -> &'static str {
        "enemy_ai"
    }

    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let ais = registry.components::<Ai>();
        let enemies = registry.components::<Enemy>();
        let players = registry.components::<Controllable>();
        let positions = registry.components::<Position>();
        let mut velocities = registry.components_mut::<Velocity>();

        for (entity, ai) in ais.iter() {
            let Some(enemy) = enemies.get(entity) else {
                continue;
            };
            let (Some(&pos), Some(vel)) = (positions.get(entity), velocities.get_mut(entity))
            else {
                continue;
            };
            match enemy.kind {
                EnemyKind::Basic => {
                    vel.x = -ai.move_speed;
                    vel.y = (pos.x * SINE_FREQUENCY).sin() * SINE_AMPLITUDE;
                }
                EnemyKind::Tank => {
                    vel.x = -ai.move_speed;
                    vel.y = 0.0;
                }
                EnemyKind::Fast => {
                    match Self::nearest_player_delta(&players, &positions, pos) {
                        Some((dx, dy, dist_sq))
                            if dist_sq > 0.0
                                && dist_sq < ai.detection_range * ai.detection_range =>
                        {
                            let dist = dist_sq.sqrt();
                            vel.x = (dx / dist) * ai.move_speed;
                            vel.y = (dy / dist) * ai.move_speed;
                        }
                        _ => {
                            vel.x = -ai.move_speed;
                            vel.y = 0.0;
                        }
                    }
                }
                // The boss system owns boss movement.
                EnemyKind::Boss => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
