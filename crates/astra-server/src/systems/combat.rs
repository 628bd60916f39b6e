//! Weapons and shooting (Scroller mode).
//!
//! Trigger edges arrive as [`FireStartEvent`]/[`FireStopEvent`] from the
//! input system. Five weapon kinds:
//!
//! - BASIC: one forward projectile per cooldown.
//! - SPREAD: a symmetric fan of projectiles.
//! - BURST: projectiles at a tight intra-burst delay, then the full cooldown.
//! - CHARGE: accumulates while held; on release fires one projectile whose
//!   size, damage, and tint interpolate with charge time (blue at min charge
//!   toward cyan-white at full charge).
//! - LASER: a continuous beam while held; a raycast each tick finds the
//!   first blocker (enemy or wall) in range and burns it on a damage tick.
//!
//! Enemies with weapons fire periodically at the nearest player ahead of
//! them, fall back to suppressive fire straight ahead while on screen with
//! no player found, and hold the shot when the player is behind them; tanks
//! fire a three-way spread.

use astra_ecs::prelude::*;
use astra_protocol::packet::EntityType;
use astra_protocol::payload::ServerProjectileSpawn;

use crate::components::{
    Collider, Controllable, Damage, Enemy, EnemyKind, Faction, FiredBy, LaserBeam, NetworkId,
    NoFriction, Position, Projectile, ToDestroy, Velocity, Wall, Weapon, WeaponKind,
};
use crate::config::scroller;
use crate::events::{DamageEvent, FireStartEvent, FireStopEvent};
use crate::sync::NetSync;

/// Per-kind weapon tuning.
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    pub projectile_count: u32,
    pub spread_angle: f32,
    pub damage: i32,
    pub projectile_speed: f32,
    pub fire_rate: f32,
    pub burst_delay: f32,
}

/// Stats table for every weapon kind.
pub fn weapon_stats(kind: WeaponKind) -> WeaponStats {
    match kind {
        WeaponKind::Basic => WeaponStats {
            projectile_count: 1,
            spread_angle: 0.0,
            damage: 10,
            projectile_speed: 400.0,
            fire_rate: 0.5,
            burst_delay: 0.0,
        },
        WeaponKind::Spread => WeaponStats {
            projectile_count: 3,
            spread_angle: 30.0,
            damage: 8,
            projectile_speed: 400.0,
            fire_rate: 0.6,
            burst_delay: 0.0,
        },
        WeaponKind::Burst => WeaponStats {
            projectile_count: 3,
            spread_angle: 0.0,
            damage: 6,
            projectile_speed: 500.0,
            fire_rate: 0.8,
            burst_delay: 0.08,
        },
        WeaponKind::Laser => WeaponStats {
            projectile_count: 0,
            spread_angle: 0.0,
            damage: 4,
            projectile_speed: 0.0,
            fire_rate: 0.1,
            burst_delay: 0.0,
        },
        WeaponKind::Charge => WeaponStats {
            projectile_count: 1,
            spread_angle: 0.0,
            damage: CHARGE_DAMAGE_MIN,
            projectile_speed: 500.0,
            fire_rate: 0.4,
            burst_delay: 0.0,
        },
    }
}

pub const PROJECTILE_LIFETIME: f32 = 5.0;
pub const PROJECTILE_WIDTH: f32 = 20.0;
pub const PROJECTILE_HEIGHT: f32 = 10.0;

pub const CHARGE_TIME_MIN: f32 = 0.15;
pub const CHARGE_TIME_MAX: f32 = 1.5;
pub const CHARGE_DAMAGE_MIN: i32 = 10;
pub const CHARGE_DAMAGE_MAX: i32 = 60;
pub const CHARGE_WIDTH_MIN: f32 = 20.0;
pub const CHARGE_WIDTH_MAX: f32 = 80.0;
pub const CHARGE_HEIGHT_MIN: f32 = 10.0;
pub const CHARGE_HEIGHT_MAX: f32 = 40.0;

pub const LASER_RANGE: f32 = 900.0;

pub const ENEMY_FIRE_RATE: f32 = 2.0;
pub const ENEMY_PROJECTILE_SPEED: f32 = 300.0;
pub const ENEMY_PROJECTILE_DAMAGE: i32 = 10;
pub const TANK_SPREAD_DEG: f32 = 15.0;

// ---------------------------------------------------------------------------
// ShootingSystem
// ---------------------------------------------------------------------------

pub struct ShootingSystem {
    net: NetSync,
}

impl ShootingSystem {
    pub fn new(net: NetSync) -> Self {
        Self { net }
    }

    /// Spawn one projectile and queue its payload.
    #[allow(clippy::too_many_arguments)]
    fn spawn_projectile(
        registry: &mut Registry,
        net: &NetSync,
        shooter: Entity,
        faction: Faction,
        x: f32,
        y: f32,
        angle_deg: f32,
        speed: f32,
        damage: i32,
        width: f32,
        height: f32,
    ) -> Entity {
        let radians = angle_deg.to_radians();
        let velocity = Velocity {
            x: radians.cos() * speed,
            y: radians.sin() * speed,
        };
        let entity = registry.spawn_entity();
        registry.add_component(entity, Position { x, y });
        registry.add_component(entity, velocity);
        registry.add_component(entity, Collider { width, height });
        registry.add_component(entity, Damage { amount: damage });
        registry.add_component(
            entity,
            Projectile {
                angle_deg,
                lifetime: PROJECTILE_LIFETIME,
                time_alive: 0.0,
                faction,
            },
        );
        registry.add_component(entity, FiredBy { shooter });
        registry.add_component(entity, NoFriction);
        registry.add_component(entity, NetworkId { id: entity.id() });

        net.queue_projectile_spawn(ServerProjectileSpawn {
            entity_id: entity.id(),
            entity_type: match faction {
                Faction::Player => EntityType::ProjectilePlayer,
                Faction::Enemy => EntityType::ProjectileEnemy,
            },
            spawn_x: x,
            spawn_y: y,
            velocity_x: velocity.x,
            velocity_y: velocity.y,
            damage: damage.max(0) as u16,
        });
        entity
    }

    /// Fire a player's weapon once (one trigger pull / burst step / charge
    /// release), updating the weapon's fire-control state.
    fn fire_player_weapon(registry: &mut Registry, net: &NetSync, shooter: Entity) {
        let Some(mut weapon) = registry.components::<Weapon>().get(shooter).cloned() else {
            return;
        };
        let stats = weapon_stats(weapon.kind);
        let (shooter_pos, shooter_size) = {
            let positions = registry.components::<Position>();
            let colliders = registry.components::<Collider>();
            let Some(&pos) = positions.get(shooter) else {
                return;
            };
            let size = colliders
                .get(shooter)
                .map_or((0.0, 0.0), |c| (c.width, c.height));
            (pos, size)
        };

        let mut width = PROJECTILE_WIDTH;
        let mut height = PROJECTILE_HEIGHT;
        let mut damage = stats.damage;
        let mut count = stats.projectile_count;

        match weapon.kind {
            WeaponKind::Charge => {
                let t = ((weapon.charge_duration - CHARGE_TIME_MIN)
                    / (CHARGE_TIME_MAX - CHARGE_TIME_MIN))
                    .clamp(0.0, 1.0);
                if weapon.charge_duration >= CHARGE_TIME_MIN {
                    damage = CHARGE_DAMAGE_MIN
                        + (t * (CHARGE_DAMAGE_MAX - CHARGE_DAMAGE_MIN) as f32) as i32;
                    width = CHARGE_WIDTH_MIN + t * (CHARGE_WIDTH_MAX - CHARGE_WIDTH_MIN);
                    height = CHARGE_HEIGHT_MIN + t * (CHARGE_HEIGHT_MAX - CHARGE_HEIGHT_MIN);
                } else {
                    damage = CHARGE_DAMAGE_MIN;
                    width = CHARGE_WIDTH_MIN;
                    height = CHARGE_HEIGHT_MIN;
                }
                count = 1;
            }
            WeaponKind::Burst => {
                count = 1;
            }
            _ => {}
        }

        let (mut start_angle, mut angle_step) = (0.0f32, 0.0f32);
        if weapon.kind == WeaponKind::Spread && count > 1 {
            angle_step = stats.spread_angle / (count - 1) as f32;
            start_angle = -stats.spread_angle / 2.0;
        }

        let spawn_x = shooter_pos.x + shooter_size.0 + 5.0;
        let spawn_y = shooter_pos.y + shooter_size.1 / 2.0 - height / 2.0;

        for i in 0..count {
            let angle = start_angle + angle_step * i as f32;
            Self::spawn_projectile(
                registry,
                net,
                shooter,
                Faction::Player,
                spawn_x,
                spawn_y,
                angle,
                stats.projectile_speed,
                damage,
                width,
                height,
            );
        }

        // Fire-control bookkeeping.
        match weapon.kind {
            WeaponKind::Burst => {
                weapon.burst_count += 1;
                if weapon.burst_count >= stats.projectile_count {
                    weapon.burst_count = 0;
                }
                weapon.time_since_last_fire = 0.0;
            }
            WeaponKind::Charge => {
                weapon.is_charging = false;
                weapon.charge_duration = 0.0;
                weapon.time_since_last_fire = 0.0;
            }
            _ => {
                weapon.time_since_last_fire = 0.0;
            }
        }
        registry.add_component(shooter, weapon);
    }

    /// First enemy or wall hit by a horizontal ray from `origin`, within
    /// `range`. Returns the blocker and the beam length.
    fn raycast_beam(registry: &Registry, origin: Position, range: f32) -> (Option<Entity>, f32) {
        let positions = registry.components::<Position>();
        let colliders = registry.components::<Collider>();
        let enemies = registry.components::<Enemy>();
        let walls = registry.components::<Wall>();

        let mut best: Option<(Entity, f32)> = None;
        let mut consider = |entity: Entity| {
            let (Some(pos), Some(col)) = (positions.get(entity), colliders.get(entity)) else {
                return;
            };
            // The ray is horizontal: the blocker must straddle the beam's y.
            if origin.y < pos.y || origin.y > pos.y + col.height {
                return;
            }
            let distance = pos.x - origin.x;
            if distance < 0.0 || distance > range {
                return;
            }
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((entity, distance));
            }
        };
        for (entity, _) in enemies.iter() {
            consider(entity);
        }
        for (entity, _) in walls.iter() {
            consider(entity);
        }
        match best {
            Some((entity, distance)) => (Some(entity), distance),
            None => (None, range),
        }
    }

    fn nearest_player(registry: &Registry, from: Position) -> Option<(Entity, Position)> {
        let players = registry.components::<Controllable>();
        let positions = registry.components::<Position>();
        let mut best: Option<(Entity, Position, f32)> = None;
        for (entity, _) in players.iter() {
            let Some(&pos) = positions.get(entity) else {
                continue;
            };
            let dx = pos.x - from.x;
            let dy = pos.y - from.y;
            let dist = dx * dx + dy * dy;
            if best.map_or(true, |(_, _, d)| dist < d) {
                best = Some((entity, pos, dist));
            }
        }
        best.map(|(entity, pos, _)| (entity, pos))
    }
}

impl System for ShootingSystem {
    fn name(&self) -> &'static str {
        "shooting"
    }

    fn init(&mut self, registry: &mut Registry) {
        let bus = registry.event_bus();

        let net = self.net.clone();
        bus.subscribe::<FireStartEvent, _>(move |registry, event| {
            let ready = {
                let mut weapons = registry.components_mut::<Weapon>();
                let Some(weapon) = weapons.get_mut(event.player) else {
                    return;
                };
                weapon.trigger_held = true;
                weapon.kind != WeaponKind::Charge
                    && weapon.time_since_last_fire >= weapon_stats(weapon.kind).fire_rate
            };
            if ready {
                Self::fire_player_weapon(registry, &net, event.player);
            }
        });

        let net = self.net.clone();
        bus.subscribe::<FireStopEvent, _>(move |registry, event| {
            let release_charge = {
                let mut weapons = registry.components_mut::<Weapon>();
                let Some(weapon) = weapons.get_mut(event.player) else {
                    return;
                };
                weapon.trigger_held = false;
                weapon.kind == WeaponKind::Charge
            };
            if release_charge {
                Self::fire_player_weapon(registry, &net, event.player);
            }
            registry.remove_component::<LaserBeam>(event.player);
        });
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        // Age cooldowns and charges; collect work while borrows are held.
        let mut auto_fire = Vec::new();
        let mut burst_continue = Vec::new();
        let mut laser_holders = Vec::new();
        let mut enemy_shots = Vec::new();
        {
            let mut weapons = registry.components_mut::<Weapon>();
            let enemies = registry.components::<Enemy>();
            for (entity, weapon) in weapons.iter_mut() {
                if weapon.time_since_last_fire < f32::MAX {
                    weapon.time_since_last_fire += dt;
                }
                let stats = weapon_stats(weapon.kind);

                if let Some(enemy) = enemies.get(entity) {
                    // The cooldown is spent only if the gun actually fires,
                    // so a withheld shot stays ready.
                    if weapon.time_since_last_fire >= ENEMY_FIRE_RATE {
                        enemy_shots.push((entity, enemy.kind));
                    }
                    continue;
                }

                if weapon.trigger_held {
                    match weapon.kind {
                        WeaponKind::Charge => {
                            weapon.is_charging = true;
                            weapon.charge_duration += dt;
                        }
                        WeaponKind::Laser => {
                            laser_holders.push(entity);
                        }
                        _ => {
                            if weapon.time_since_last_fire >= stats.fire_rate {
                                auto_fire.push(entity);
                            }
                        }
                    }
                }

                if weapon.kind == WeaponKind::Burst
                    && weapon.burst_count > 0
                    && weapon.time_since_last_fire >= stats.burst_delay
                {
                    burst_continue.push(entity);
                }
            }
        }

        for shooter in auto_fire {
            Self::fire_player_weapon(registry, &self.net, shooter);
        }
        for shooter in burst_continue {
            Self::fire_player_weapon(registry, &self.net, shooter);
        }

        // Lasers: recompute the beam and burn the first blocker on each
        // damage tick.
        for shooter in laser_holders {
            let Some(origin) = registry.components::<Position>().get(shooter).copied() else {
                continue;
            };
            let beam_origin = Position {
                x: origin.x
                    + registry
                        .components::<Collider>()
                        .get(shooter)
                        .map_or(0.0, |c| c.width),
                y: origin.y
                    + registry
                        .components::<Collider>()
                        .get(shooter)
                        .map_or(0.0, |c| c.height / 2.0),
            };
            let (blocker, length) = Self::raycast_beam(registry, beam_origin, LASER_RANGE);
            registry.add_component(
                shooter,
                LaserBeam {
                    shooter,
                    length,
                    range: LASER_RANGE,
                },
            );

            let stats = weapon_stats(WeaponKind::Laser);
            let burn = {
                let mut weapons = registry.components_mut::<Weapon>();
                let Some(weapon) = weapons.get_mut(shooter) else {
                    continue;
                };
                if weapon.time_since_last_fire >= stats.fire_rate {
                    weapon.time_since_last_fire = 0.0;
                    true
                } else {
                    false
                }
            };
            if burn {
                if let Some(blocker) = blocker {
                    if registry.has_component::<Enemy>(blocker) {
                        registry.publish(&DamageEvent {
                            target: blocker,
                            source: shooter,
                            amount: stats.damage,
                        });
                    }
                }
            }
        }

        // Enemy fire. A gun shoots at the nearest player when that player is
        // ahead of it (to its left); with nobody found at all, it lays
        // suppressive fire straight ahead while on screen. A player behind
        // the gun holds the shot.
        for (enemy, kind) in enemy_shots {
            let Some(enemy_pos) = registry.components::<Position>().get(enemy).copied() else {
                continue;
            };
            let angle = match Self::nearest_player(registry, enemy_pos) {
                Some((_, player_pos)) if player_pos.x < enemy_pos.x => (player_pos.y
                    - enemy_pos.y)
                    .atan2(player_pos.x - enemy_pos.x)
                    .to_degrees(),
                Some(_) => continue,
                None => {
                    if enemy_pos.x <= 0.0 || enemy_pos.x >= scroller::VIEW_WIDTH {
                        continue;
                    }
                    180.0
                }
            };
            {
                let mut weapons = registry.components_mut::<Weapon>();
                if let Some(weapon) = weapons.get_mut(enemy) {
                    weapon.time_since_last_fire = 0.0;
                }
            }
            let fan = [angle - TANK_SPREAD_DEG, angle, angle + TANK_SPREAD_DEG];
            let angles: &[f32] = if kind == EnemyKind::Tank {
                &fan[..]
            } else {
                &fan[1..2]
            };
            let spawn_y = enemy_pos.y
                + registry
                    .components::<Collider>()
                    .get(enemy)
                    .map_or(0.0, |c| c.height / 2.0);
            for &a in angles {
                Self::spawn_projectile(
                    registry,
                    &self.net,
                    enemy,
                    Faction::Enemy,
                    enemy_pos.x - PROJECTILE_WIDTH - 10.0,
                    spawn_y,
                    a,
                    ENEMY_PROJECTILE_SPEED,
                    ENEMY_PROJECTILE_DAMAGE,
                    PROJECTILE_WIDTH,
                    PROJECTILE_HEIGHT,
                );
            }
        }

        // Age projectiles; expired ones are swept at end of tick.
        let mut expired = Vec::new();
        {
            let mut projectiles = registry.components_mut::<Projectile>();
            for (entity, projectile) in projectiles.iter_mut() {
                projectile.time_alive += dt;
                if projectile.time_alive >= projectile.lifetime {
                    expired.push(entity);
                }
            }
        }
        for entity in expired {
            registry.add_component(entity, ToDestroy);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::InputState;
    use crate::systems::movement::PlayerInputSystem;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register_component::<Position>();
        reg.register_component::<Velocity>();
        reg.register_component::<Collider>();
        reg.register_component::<Weapon>();
        reg.register_component::<Projectile>();
        reg.register_component::<Damage>();
        reg.register_component::<FiredBy>();
        reg.register_component::<NoFriction>();
        reg.register_component::<NetworkId>();
        reg.register_component::<Enemy>();
        reg.register_component::<Controllable>();
        reg.register_component::<Wall>();
        reg.register_component::<LaserBeam>();
        reg.register_component::<ToDestroy>();
        reg.register_component::<InputState>();
        reg
    }

    fn spawn_gunner(reg: &mut Registry, kind: WeaponKind) -> Entity {
        let e = reg.spawn_entity();
        reg.add_component(e, Position { x: 100.0, y: 100.0 });
        reg.add_component(e, Velocity::default());
        reg.add_component(e, Collider { width: 80.0, height: 80.0 });
        reg.add_component(e, Controllable { speed: 300.0 });
        reg.add_component(e, Weapon::new(kind));
        reg.add_component(e, InputState::default());
        e
    }

    #[test]
    fn basic_fires_once_per_cooldown() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));
        let gunner = spawn_gunner(&mut reg, WeaponKind::Basic);

        reg.publish(&FireStartEvent { player: gunner });
        assert_eq!(reg.components::<Projectile>().len(), 1);

        // Trigger held, but the cooldown gates further shots.
        let mut sys = ShootingSystem::new(NetSync::new());
        sys.update(&mut reg, 0.1);
        assert_eq!(reg.components::<Projectile>().len(), 1);

        // After the cooldown elapses the held trigger fires again.
        for _ in 0..5 {
            sys.update(&mut reg, 0.1);
        }
        assert_eq!(reg.components::<Projectile>().len(), 2);
    }

    #[test]
    fn spread_fans_out_symmetrically() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));
        let gunner = spawn_gunner(&mut reg, WeaponKind::Spread);

        reg.publish(&FireStartEvent { player: gunner });
        let projectiles = reg.components::<Projectile>();
        let mut angles: Vec<f32> = projectiles.iter().map(|(_, p)| p.angle_deg).collect();
        angles.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(angles.len(), 3);
        assert_eq!(angles[0], -15.0);
        assert_eq!(angles[1], 0.0);
        assert_eq!(angles[2], 15.0);
    }

    #[test]
    fn burst_fires_at_intra_burst_delay() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));
        let gunner = spawn_gunner(&mut reg, WeaponKind::Burst);

        reg.publish(&FireStartEvent { player: gunner });
        assert_eq!(reg.components::<Projectile>().len(), 1);

        let mut sys = ShootingSystem::new(NetSync::new());
        // One burst_delay later the second shot leaves, then the third.
        sys.update(&mut reg, 0.09);
        assert_eq!(reg.components::<Projectile>().len(), 2);
        sys.update(&mut reg, 0.09);
        assert_eq!(reg.components::<Projectile>().len(), 3);
        // The burst is over; nothing until the full cooldown.
        sys.update(&mut reg, 0.09);
        assert_eq!(reg.components::<Projectile>().len(), 3);
    }

    #[test]
    fn charge_fires_on_release_with_scaled_damage() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));
        let gunner = spawn_gunner(&mut reg, WeaponKind::Charge);

        reg.publish(&FireStartEvent { player: gunner });
        assert_eq!(reg.components::<Projectile>().len(), 0);

        let mut sys = ShootingSystem::new(NetSync::new());
        // Hold to full charge.
        for _ in 0..40 {
            sys.update(&mut reg, 0.05);
        }
        reg.publish(&FireStopEvent { player: gunner });

        let projectiles = reg.components::<Projectile>();
        assert_eq!(projectiles.len(), 1);
        let (shot, _) = projectiles.iter().next().unwrap();
        drop(projectiles);
        assert_eq!(
            reg.components::<Damage>().get(shot).unwrap().amount,
            CHARGE_DAMAGE_MAX
        );
        let collider = *reg.components::<Collider>().get(shot).unwrap();
        assert_eq!(collider.width, CHARGE_WIDTH_MAX);
    }

    #[test]
    fn uncharged_release_fires_minimum_shot() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));
        let gunner = spawn_gunner(&mut reg, WeaponKind::Charge);

        reg.publish(&FireStartEvent { player: gunner });
        let mut sys = ShootingSystem::new(NetSync::new());
        sys.update(&mut reg, 0.05); // well under CHARGE_TIME_MIN
        reg.publish(&FireStopEvent { player: gunner });

        let projectiles = reg.components::<Projectile>();
        let (shot, _) = projectiles.iter().next().unwrap();
        drop(projectiles);
        assert_eq!(
            reg.components::<Damage>().get(shot).unwrap().amount,
            CHARGE_DAMAGE_MIN
        );
    }

    #[test]
    fn laser_burns_first_blocker_only() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));
        let gunner = spawn_gunner(&mut reg, WeaponKind::Laser);

        // Two enemies downrange; only the nearer one takes the burn.
        let near = reg.spawn_entity();
        reg.add_component(near, Position { x: 400.0, y: 110.0 });
        reg.add_component(near, Collider { width: 64.0, height: 64.0 });
        reg.add_component(near, Enemy { kind: EnemyKind::Basic, score_value: 100 });
        let far = reg.spawn_entity();
        reg.add_component(far, Position { x: 700.0, y: 110.0 });
        reg.add_component(far, Collider { width: 64.0, height: 64.0 });
        reg.add_component(far, Enemy { kind: EnemyKind::Basic, score_value: 100 });

        let hits = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = hits.clone();
        reg.event_bus().subscribe::<DamageEvent, _>(move |_reg, ev| {
            sink.lock().unwrap().push(ev.target);
        });

        reg.publish(&FireStartEvent { player: gunner });
        let mut sys = ShootingSystem::new(NetSync::new());
        sys.update(&mut reg, 0.2);

        assert_eq!(*hits.lock().unwrap(), vec![near]);
        assert!(reg.has_component::<LaserBeam>(gunner));

        reg.publish(&FireStopEvent { player: gunner });
        assert!(!reg.has_component::<LaserBeam>(gunner));
    }

    #[test]
    fn tank_fires_three_way_spread_at_nearest_player() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));
        let _player = spawn_gunner(&mut reg, WeaponKind::Basic);

        let tank = reg.spawn_entity();
        reg.add_component(tank, Position { x: 800.0, y: 100.0 });
        reg.add_component(tank, Collider { width: 96.0, height: 96.0 });
        reg.add_component(tank, Enemy { kind: EnemyKind::Tank, score_value: 300 });
        let mut weapon = Weapon::new(WeaponKind::Basic);
        weapon.time_since_last_fire = ENEMY_FIRE_RATE;
        reg.add_component(tank, weapon);

        let mut sys = ShootingSystem::new(NetSync::new());
        sys.update(&mut reg, 0.05);

        let enemy_shots: Vec<Projectile> = reg
            .components::<Projectile>()
            .iter()
            .filter(|(_, p)| p.faction == Faction::Enemy)
            .map(|(_, p)| *p)
            .collect();
        assert_eq!(enemy_shots.len(), 3);
    }

    #[test]
    fn enemy_holds_fire_when_the_player_is_behind_it() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));
        // The player sits to the enemy's right.
        let player = spawn_gunner(&mut reg, WeaponKind::Basic);
        reg.components_mut::<Position>().get_mut(player).unwrap().x = 1200.0;

        let enemy = reg.spawn_entity();
        reg.add_component(enemy, Position { x: 400.0, y: 100.0 });
        reg.add_component(enemy, Collider { width: 64.0, height: 64.0 });
        reg.add_component(enemy, Enemy { kind: EnemyKind::Basic, score_value: 100 });
        let mut weapon = Weapon::new(WeaponKind::Basic);
        weapon.time_since_last_fire = ENEMY_FIRE_RATE;
        reg.add_component(enemy, weapon);

        let mut sys = ShootingSystem::new(NetSync::new());
        sys.update(&mut reg, 0.05);

        let enemy_shots = reg
            .components::<Projectile>()
            .iter()
            .filter(|(_, p)| p.faction == Faction::Enemy)
            .count();
        assert_eq!(enemy_shots, 0);
        // The withheld shot is still ready for the moment the player passes.
        assert!(
            reg.components::<Weapon>().get(enemy).unwrap().time_since_last_fire
                >= ENEMY_FIRE_RATE
        );
    }

    #[test]
    fn enemy_lays_suppressive_fire_on_screen_without_a_target() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));

        let on_screen = reg.spawn_entity();
        reg.add_component(on_screen, Position { x: 800.0, y: 300.0 });
        reg.add_component(on_screen, Collider { width: 64.0, height: 64.0 });
        reg.add_component(on_screen, Enemy { kind: EnemyKind::Basic, score_value: 100 });
        reg.add_component(on_screen, Weapon::new(WeaponKind::Basic));

        // Still marching in from beyond the right edge: no suppressive fire.
        let off_screen = reg.spawn_entity();
        reg.add_component(off_screen, Position { x: 2100.0, y: 300.0 });
        reg.add_component(off_screen, Collider { width: 64.0, height: 64.0 });
        reg.add_component(off_screen, Enemy { kind: EnemyKind::Basic, score_value: 100 });
        reg.add_component(off_screen, Weapon::new(WeaponKind::Basic));

        let mut sys = ShootingSystem::new(NetSync::new());
        sys.update(&mut reg, 0.05);

        let shots: Vec<Entity> = reg
            .components::<Projectile>()
            .iter()
            .map(|(e, _)| e)
            .collect();
        assert_eq!(shots.len(), 1);
        // Straight ahead, leftward.
        let vel = *reg.components::<Velocity>().get(shots[0]).unwrap();
        assert!(vel.x < 0.0);
        assert!(vel.y.abs() < 1e-3);
    }

    #[test]
    fn projectiles_expire_after_lifetime() {
        let mut reg = registry();
        reg.register_system(ShootingSystem::new(NetSync::new()));
        let gunner = spawn_gunner(&mut reg, WeaponKind::Basic);
        reg.publish(&FireStartEvent { player: gunner });

        let projectiles = reg.components::<Projectile>();
        let (shot, _) = projectiles.iter().next().unwrap();
        drop(projectiles);

        let mut sys = ShootingSystem::new(NetSync::new());
        // Let go of the trigger so nothing new spawns.
        reg.publish(&FireStopEvent { player: gunner });
        for _ in 0..110 {
            sys.update(&mut reg, 0.05);
        }
        assert!(reg.has_component::<ToDestroy>(shot));
    }
}
