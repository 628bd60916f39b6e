//! Boss behavior (Scroller mode): phases, attack patterns, movement.
//!
//! A boss advances through three phases as its health drops past 66% and
//! 33%. Each phase selects one attack pattern and one movement pattern from
//! the boss's [`BossPhase`] configuration. Attack patterns spawn enemy
//! projectiles directly.

use rand::Rng;
use rand_pcg::Pcg64Mcg;
use tracing::info;

use astra_ecs::prelude::*;
use astra_protocol::packet::EntityType;
use astra_protocol::payload::ServerProjectileSpawn;

use crate::components::{
    BossAttack, BossAttackConfig, BossMovement, BossPhase, Collider, Controllable, Damage, Enemy,
    EnemyKind, Faction, FiredBy, Health, NetworkId, NoFriction, Position, Projectile, Velocity,
};
use crate::spawn::spawn_enemy;
use crate::sync::NetSync;

const BOSS_PROJECTILE_SIZE: f32 = 16.0;
const BOSS_PROJECTILE_LIFETIME: f32 = 6.0;
const SINE_AMPLITUDE: f32 = 140.0;
const FIGURE_EIGHT_AMPLITUDE: f32 = 120.0;
const CHASE_SPEED: f32 = 90.0;
/// Spring constant pulling a boss back toward its anchor column.
const ANCHOR_PULL: f32 = 2.0;

/// The stock three-phase configuration used when a level file does not
/// override it.
pub fn default_boss_phase(anchor_x: f32, anchor_y: f32) -> BossPhase {
    BossPhase {
        current_phase: 0,
        phase_timer: 0.0,
        attack_cooldown: 2.0,
        attacks: [
            BossAttackConfig {
                attack: BossAttack::AimedTriple,
                projectile_count: 3,
                projectile_speed: 280.0,
                damage: 10,
                interval: 2.0,
            },
            BossAttackConfig {
                attack: BossAttack::Spiral,
                projectile_count: 4,
                projectile_speed: 240.0,
                damage: 12,
                interval: 0.5,
            },
            BossAttackConfig {
                attack: BossAttack::Spray360,
                projectile_count: 16,
                projectile_speed: 260.0,
                damage: 15,
                interval: 2.5,
            },
        ],
        movements: [BossMovement::Sine, BossMovement::FigureEight, BossMovement::Chase],
        anchor_x,
        anchor_y,
    }
}

/// Spawn a boss enemy with phase state attached.
pub fn spawn_boss(registry: &mut Registry, net: &NetSync, x: f32, y: f32) -> Entity {
    let entity = spawn_enemy(registry, net, EnemyKind::Boss, x, y);
    // Bosses hold their column instead of drifting off the left edge.
    if let Some(vel) = registry.components_mut::<Velocity>().get_mut(entity) {
        vel.x = 0.0;
    }
    registry.add_component(entity, default_boss_phase(x, y));
    entity
}

// ---------------------------------------------------------------------------
// BossSystem
// ---------------------------------------------------------------------------

pub struct BossSystem {
    net: NetSync,
    rng: Pcg64Mcg,
}

impl BossSystem {
    pub fn new(net: NetSync, seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            net,
            rng: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    fn phase_for_health(health: &Health) -> u8 {
        let pct = health.current as f32 / health.max.max(1) as f32;
        if pct > 0.66 {
            0
        } else if pct > 0.33 {
            1
        } else {
            2
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_shot(
        &mut self,
        registry: &mut Registry,
        boss: Entity,
        x: f32,
        y: f32,
        angle_deg: f32,
        speed: f32,
        damage: i32,
    ) {
        let radians = angle_deg.to_radians();
        let velocity = Velocity {
            x: radians.cos() * speed,
            y: radians.sin() * speed,
        };
        let entity = registry.spawn_entity();
        registry.add_component(entity, Position { x, y });
        registry.add_component(entity, velocity);
        registry.add_component(
            entity,
            Collider {
                width: BOSS_PROJECTILE_SIZE,
                height: BOSS_PROJECTILE_SIZE,
            },
        );
        registry.add_component(entity, Damage { amount: damage });
        registry.add_component(
            entity,
            Projectile {
                angle_deg,
                lifetime: BOSS_PROJECTILE_LIFETIME,
                time_alive: 0.0,
                faction: Faction::Enemy,
            },
        );
        registry.add_component(entity, FiredBy { shooter: boss });
        registry.add_component(entity, NoFriction);
        registry.add_component(entity, NetworkId { id: entity.id() });
        self.net.queue_projectile_spawn(ServerProjectileSpawn {
            entity_id: entity.id(),
            entity_type: EntityType::ProjectileEnemy,
            spawn_x: x,
            spawn_y: y,
            velocity_x: velocity.x,
            velocity_y: velocity.y,
            damage: damage.max(0) as u16,
        });
    }

    fn nearest_player_angle(registry: &Registry, from: Position) -> Option<f32> {
        let players = registry.components::<Controllable>();
        let positions = registry.components::<Position>();
        let mut best: Option<(f32, f32)> = None;
        for (entity, _) in players.iter() {
            let Some(pos) = positions.get(entity) else {
                continue;
            };
            let dx = pos.x - from.x;
            let dy = pos.y - from.y;
            let dist = dx * dx + dy * dy;
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((dy.atan2(dx).to_degrees(), dist));
            }
        }
        best.map(|(angle, _)| angle)
    }

    fn execute_attack(
        &mut self,
        registry: &mut Registry,
        boss: Entity,
        position: Position,
        config: BossAttackConfig,
        phase_timer: f32,
    ) {
        let count = config.projectile_count.max(1);
        match config.attack {
            BossAttack::Spray360 => {
                let step = 360.0 / count as f32;
                for i in 0..count {
                    self.spawn_shot(
                        registry,
                        boss,
                        position.x,
                        position.y,
                        step * i as f32,
                        config.projectile_speed,
                        config.damage,
                    );
                }
            }
            BossAttack::AimedBurst => {
                let angle =
                    Self::nearest_player_angle(registry, position).unwrap_or(180.0);
                for i in 0..count {
                    // Staggered speeds give the burst depth along one ray.
                    let speed = config.projectile_speed * (1.0 + 0.15 * i as f32);
                    self.spawn_shot(
                        registry, boss, position.x, position.y, angle, speed, config.damage,
                    );
                }
            }
            BossAttack::Spiral => {
                let base = phase_timer * 90.0;
                let step = 360.0 / count as f32;
                for i in 0..count {
                    self.spawn_shot(
                        registry,
                        boss,
                        position.x,
                        position.y,
                        base + step * i as f32,
                        config.projectile_speed,
                        config.damage,
                    );
                }
            }
            BossAttack::LaserSweep => {
                // The sweep oscillates around the leftward axis.
                let sweep = 180.0 + (phase_timer * 1.5).sin() * 45.0;
                for i in 0..count {
                    let speed = config.projectile_speed * (1.0 + 0.1 * i as f32);
                    self.spawn_shot(
                        registry, boss, position.x, position.y, sweep, speed, config.damage,
                    );
                }
            }
            BossAttack::AimedTriple => {
                let angle =
                    Self::nearest_player_angle(registry, position).unwrap_or(180.0);
                for offset in [-15.0f32, 0.0, 15.0] {
                    self.spawn_shot(
                        registry,
                        boss,
                        position.x,
                        position.y,
                        angle + offset,
                        config.projectile_speed,
                        config.damage,
                    );
                }
            }
            BossAttack::RandomBarrage => {
                for _ in 0..count {
                    let angle = self.rng.gen_range(0.0..360.0f32);
                    self.spawn_shot(
                        registry,
                        boss,
                        position.x,
                        position.y,
                        angle,
                        config.projectile_speed,
                        config.damage,
                    );
                }
            }
        }
    }

    fn apply_movement(
        registry: &Registry,
        boss: Entity,
        phase: &BossPhase,
        movement: BossMovement,
    ) {
        let positions = registry.components::<Position>();
        let Some(&pos) = positions.get(boss) else {
            return;
        };
        let target_velocity = match movement {
            BossMovement::Sine => Velocity {
                x: (phase.anchor_x - pos.x) * ANCHOR_PULL,
                y: (phase.phase_timer * 1.5).cos() * SINE_AMPLITUDE,
            },
            BossMovement::FigureEight => Velocity {
                x: (phase.phase_timer * 2.0).cos() * FIGURE_EIGHT_AMPLITUDE
                    + (phase.anchor_x - pos.x) * ANCHOR_PULL * 0.2,
                y: phase.phase_timer.cos() * FIGURE_EIGHT_AMPLITUDE,
            },
            BossMovement::Chase => {
                let chase_y = {
                    let players = registry.components::<Controllable>();
                    let mut nearest: Option<(f32, f32)> = None;
                    for (entity, _) in players.iter() {
                        if let Some(p) = positions.get(entity) {
                            let d = (p.x - pos.x).powi(2) + (p.y - pos.y).powi(2);
                            if nearest.map_or(true, |(_, nd)| d < nd) {
                                nearest = Some((p.y, d));
                            }
                        }
                    }
                    nearest.map(|(y, _)| y)
                };
                match chase_y {
                    Some(y) => Velocity {
                        x: (phase.anchor_x - pos.x) * ANCHOR_PULL,
                        y: (y - pos.y).signum() * CHASE_SPEED,
                    },
                    None => Velocity::default(),
                }
            }
        };
        drop(positions);
        let mut velocities = registry.components_mut::<Velocity>();
        if let Some(vel) = velocities.get_mut(boss) {
            *vel = target_velocity;
        }
    }
}

impl System for BossSystem {
    fn name(&self) -> &'static str {
        "boss"
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        // Snapshot boss state, then act per boss.
        let bosses: Vec<(Entity, Health)> = {
            let phases = registry.components::<BossPhase>();
            let healths = registry.components::<Health>();
            phases
                .iter()
                .filter_map(|(entity, _)| healths.get(entity).map(|h| (entity, *h)))
                .collect()
        };

        for (boss, health) in bosses {
            // Phase transition on health thresholds.
            let desired = Self::phase_for_health(&health);
            let (config, movement, position, fire) = {
                let mut phases = registry.components_mut::<BossPhase>();
                let Some(phase) = phases.get_mut(boss) else {
                    continue;
                };
                if desired > phase.current_phase {
                    info!(
                        boss = boss.id(),
                        from = phase.current_phase,
                        to = desired,
                        "boss phase transition"
                    );
                    phase.current_phase = desired;
                    phase.phase_timer = 0.0;
                    phase.attack_cooldown = 1.0;
                }
                phase.phase_timer += dt;
                phase.attack_cooldown -= dt;
                let index = phase.current_phase.min(2) as usize;
                let config = phase.attacks[index];
                let fire = phase.attack_cooldown <= 0.0;
                if fire {
                    phase.attack_cooldown = config.interval;
                }
                let position = registry
                    .components::<Position>()
                    .get(boss)
                    .copied()
                    .unwrap_or_default();
                (config, phase.movements[index], position, fire)
            };

            if fire {
                let timer = registry
                    .components::<BossPhase>()
                    .get(boss)
                    .map_or(0.0, |p| p.phase_timer);
                self.execute_attack(registry, boss, position, config, timer);
            }

            let phase_snapshot = registry.components::<BossPhase>().get(boss).cloned();
            if let Some(phase) = phase_snapshot {
                Self::apply_movement(registry, boss, &phase, movement);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Enemy, InputState};
    use crate::spawn::enemy_stats;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register_component::<Position>();
        reg.register_component::<Velocity>();
        reg.register_component::<Health>();
        reg.register_component::<Collider>();
        reg.register_component::<Enemy>();
        reg.register_component::<crate::components::Ai>();
        reg.register_component::<NoFriction>();
        reg.register_component::<NetworkId>();
        reg.register_component::<BossPhase>();
        reg.register_component::<Projectile>();
        reg.register_component::<Damage>();
        reg.register_component::<FiredBy>();
        reg.register_component::<Controllable>();
        reg.register_component::<InputState>();
        reg
    }

    #[test]
    fn boss_spawns_with_phase_zero_and_full_health() {
        let mut reg = registry();
        let boss = spawn_boss(&mut reg, &NetSync::new(), 1600.0, 500.0);
        assert_eq!(
            reg.components::<BossPhase>().get(boss).unwrap().current_phase,
            0
        );
        let (_, expected_health, _, _) = enemy_stats(EnemyKind::Boss);
        assert_eq!(
            reg.components::<Health>().get(boss).unwrap().max,
            expected_health
        );
    }

    #[test]
    fn phases_advance_at_health_thresholds() {
        let mut reg = registry();
        let boss = spawn_boss(&mut reg, &NetSync::new(), 1600.0, 500.0);
        let mut sys = BossSystem::new(NetSync::new(), 11);

        // Drop below 66%.
        reg.components_mut::<Health>().get_mut(boss).unwrap().current = 600;
        sys.update(&mut reg, 0.05);
        assert_eq!(
            reg.components::<BossPhase>().get(boss).unwrap().current_phase,
            1
        );

        // Drop below 33%.
        reg.components_mut::<Health>().get_mut(boss).unwrap().current = 200;
        sys.update(&mut reg, 0.05);
        assert_eq!(
            reg.components::<BossPhase>().get(boss).unwrap().current_phase,
            2
        );
    }

    #[test]
    fn phases_never_regress() {
        let mut reg = registry();
        let boss = spawn_boss(&mut reg, &NetSync::new(), 1600.0, 500.0);
        let mut sys = BossSystem::new(NetSync::new(), 11);

        reg.components_mut::<Health>().get_mut(boss).unwrap().current = 200;
        sys.update(&mut reg, 0.05);
        // Healing back up must not lower the phase.
        reg.components_mut::<Health>().get_mut(boss).unwrap().current = 900;
        sys.update(&mut reg, 0.05);
        assert_eq!(
            reg.components::<BossPhase>().get(boss).unwrap().current_phase,
            2
        );
    }

    #[test]
    fn attack_fires_on_cooldown_expiry() {
        let mut reg = registry();
        let boss = spawn_boss(&mut reg, &NetSync::new(), 1600.0, 500.0);
        let mut sys = BossSystem::new(NetSync::new(), 11);

        // Initial cooldown is 2.0s; one long tick triggers the phase-0
        // aimed triple.
        reg.components_mut::<BossPhase>()
            .get_mut(boss)
            .unwrap()
            .attack_cooldown = 0.01;
        sys.update(&mut reg, 0.05);
        assert_eq!(reg.components::<Projectile>().len(), 3);
        for (_, projectile) in reg.components::<Projectile>().iter() {
            assert_eq!(projectile.faction, Faction::Enemy);
        }
    }

    #[test]
    fn spray_360_covers_the_circle() {
        let mut reg = registry();
        let boss = spawn_boss(&mut reg, &NetSync::new(), 1600.0, 500.0);
        let mut sys = BossSystem::new(NetSync::new(), 11);

        {
            let mut phases = reg.components_mut::<BossPhase>();
            let phase = phases.get_mut(boss).unwrap();
            phase.current_phase = 2;
            phase.attack_cooldown = 0.01;
        }
        reg.components_mut::<Health>().get_mut(boss).unwrap().current = 100;
        sys.update(&mut reg, 0.05);

        let projectiles = reg.components::<Projectile>();
        assert_eq!(projectiles.len(), 16);
        // Some go left, some go right.
        let mut left = 0;
        let mut right = 0;
        drop(projectiles);
        for (_, vel) in reg.components::<Velocity>().iter() {
            if vel.x < -1.0 {
                left += 1;
            } else if vel.x > 1.0 {
                right += 1;
            }
        }
        assert!(left > 0 && right > 0);
    }
}
