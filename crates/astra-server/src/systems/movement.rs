//! Movement: input-to-velocity, integration, target steering, map bounds.
//!
//! All simulation math is IEEE 754 single-precision. Direction normalization
//! falls back to `(1, 0)` when the vector is shorter than `1e-3`.

use astra_ecs::prelude::*;

use crate::components::{
    CircleCollider, Collider, Controllable, EjectedMass, InputState, Mass, MergeTimer,
    MovementTarget, Position, SpeedBoost, SplitVelocity, ToDestroy, Velocity,
};
use crate::config::arena;
use crate::events::{FireStartEvent, FireStopEvent};

/// Normalize a direction, falling back to `(1, 0)` for degenerate input.
pub fn normalize_dir(x: f32, y: f32) -> (f32, f32) {
    let len = (x * x + y * y).sqrt();
    if len < 1e-3 {
        (1.0, 0.0)
    } else {
        (x / len, y / len)
    }
}

// ---------------------------------------------------------------------------
// PlayerInputSystem
// ---------------------------------------------------------------------------

/// Turns the fire edges of [`InputState`] into trigger events and clears
/// them. Direction handling stays in [`MovementSystem`].
pub struct PlayerInputSystem;

impl System for PlayerInputSystem {
    fn name(&self) -> &'static str {
        "player_input"
    }

    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let mut fire_starts = Vec::new();
        let mut fire_stops = Vec::new();
        {
            let mut inputs = registry.components_mut::<InputState>();
            for (entity, input) in inputs.iter_mut() {
                if input.fire_pressed {
                    fire_starts.push(entity);
                    input.fire_pressed = false;
                }
                if input.fire_released {
                    fire_stops.push(entity);
                    input.fire_released = false;
                }
            }
        }
        for player in fire_starts {
            registry.publish(&FireStartEvent { player });
        }
        for player in fire_stops {
            registry.publish(&FireStopEvent { player });
        }
    }
}

// ---------------------------------------------------------------------------
// MovementSystem
// ---------------------------------------------------------------------------

/// Applies `Controllable.speed` along the current input direction to produce
/// velocity. A zero direction stops the entity.
pub struct MovementSystem;

impl System for MovementSystem {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let controllables = registry.components::<Controllable>();
        let inputs = registry.components::<InputState>();
        let boosts = registry.components::<SpeedBoost>();
        let mut velocities = registry.components_mut::<Velocity>();

        for (entity, ctrl) in controllables.iter() {
            let Some(input) = inputs.get(entity) else {
                continue;
            };
            let Some(vel) = velocities.get_mut(entity) else {
                continue;
            };
            let mut speed = ctrl.speed;
            if let Some(boost) = boosts.get(entity) {
                if boost.time_remaining > 0.0 {
                    speed *= boost.multiplier;
                }
            }
            if input.dir_x == 0.0 && input.dir_y == 0.0 {
                vel.x = 0.0;
                vel.y = 0.0;
            } else {
                let (nx, ny) = normalize_dir(input.dir_x, input.dir_y);
                vel.x = nx * speed;
                vel.y = ny * speed;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PhysiqueSystem
// ---------------------------------------------------------------------------

/// Integrates `position += velocity * dt` for every entity with both.
pub struct PhysiqueSystem;

impl System for PhysiqueSystem {
    fn name(&self) -> &'static str {
        "physique"
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        let velocities = registry.components::<Velocity>();
        let mut positions = registry.components_mut::<Position>();
        for (entity, vel) in velocities.iter() {
            if let Some(pos) = positions.get_mut(entity) {
                pos.x += vel.x * dt;
                pos.y += vel.y * dt;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MovementTargetSystem (Arena)
// ---------------------------------------------------------------------------

/// Steers cells toward their [`MovementTarget`] at mass-derived speed, decays
/// split boosts, and applies friction and decay to ejected mass.
pub struct MovementTargetSystem;

impl System for MovementTargetSystem {
    fn name(&self) -> &'static str {
        "movement_target"
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        // Steering + split boost.
        {
            let masses = registry.components::<Mass>();
            let targets = registry.components::<MovementTarget>();
            let positions = registry.components::<Position>();
            let mut velocities = registry.components_mut::<Velocity>();
            let mut split_vels = registry.components_mut::<SplitVelocity>();

            for (entity, mass) in masses.iter() {
                let (Some(pos), Some(vel)) = (positions.get(entity), velocities.get_mut(entity))
                else {
                    continue;
                };
                if let Some(target) = targets.get(entity) {
                    let dx = target.x - pos.x;
                    let dy = target.y - pos.y;
                    let dist = (dx * dx + dy * dy).sqrt();
                    if dist > 1.0 {
                        let speed = arena::mass_to_speed(mass.value);
                        vel.x = (dx / dist) * speed;
                        vel.y = (dy / dist) * speed;
                    } else {
                        vel.x = 0.0;
                        vel.y = 0.0;
                    }
                }
                if let Some(split) = split_vels.get_mut(entity) {
                    vel.x += split.vx;
                    vel.y += split.vy;
                    let speed = (split.vx * split.vx + split.vy * split.vy).sqrt();
                    let decay = split.decay_rate * dt;
                    if speed > decay {
                        let factor = (speed - decay) / speed;
                        split.vx *= factor;
                        split.vy *= factor;
                    } else {
                        split.vx = 0.0;
                        split.vy = 0.0;
                    }
                }
            }
        }

        // Remove fully decayed split boosts outside the iteration.
        let spent: Vec<Entity> = registry
            .components::<SplitVelocity>()
            .iter()
            .filter(|(_, s)| s.vx == 0.0 && s.vy == 0.0)
            .map(|(e, _)| e)
            .collect();
        for entity in spent {
            registry.remove_component::<SplitVelocity>(entity);
        }

        // Ejected mass: friction and decay.
        let mut expired = Vec::new();
        {
            let mut ejected = registry.components_mut::<EjectedMass>();
            let mut velocities = registry.components_mut::<Velocity>();
            for (entity, eject) in ejected.iter_mut() {
                eject.decay_timer -= dt;
                if eject.decay_timer <= 0.0 {
                    expired.push(entity);
                    continue;
                }
                if let Some(vel) = velocities.get_mut(entity) {
                    let speed = (vel.x * vel.x + vel.y * vel.y).sqrt();
                    let friction = arena::EJECT_FRICTION * dt;
                    if speed > friction {
                        let factor = (speed - friction) / speed;
                        vel.x *= factor;
                        vel.y *= factor;
                    } else {
                        vel.x = 0.0;
                        vel.y = 0.0;
                    }
                }
            }
        }
        for entity in expired {
            registry.add_component(entity, ToDestroy);
        }
    }
}

// ---------------------------------------------------------------------------
// MergeTimerSystem (Arena)
// ---------------------------------------------------------------------------

/// Counts merge cooldowns down and flips `can_merge` when they elapse.
pub struct MergeTimerSystem;

impl System for MergeTimerSystem {
    fn name(&self) -> &'static str {
        "merge_timer"
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        let mut timers = registry.components_mut::<MergeTimer>();
        for (_, timer) in timers.iter_mut() {
            if !timer.can_merge {
                timer.time_remaining -= dt;
                if timer.time_remaining <= 0.0 {
                    timer.time_remaining = 0.0;
                    timer.can_merge = true;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MapBoundsSystem
// ---------------------------------------------------------------------------

/// Clamps entities to the map. Circle colliders clamp center to
/// `[radius, size - radius]`; AABB colliders clamp the anchor to
/// `[0, size - extent]`, but only for player-steered boxes: walls, enemies,
/// and projectiles scroll off the left edge and are reaped there instead.
/// Idempotent: applying twice yields the same position.
pub struct MapBoundsSystem {
    pub width: f32,
    pub height: f32,
}

impl MapBoundsSystem {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl System for MapBoundsSystem {
    fn name(&self) -> &'static str {
        "map_bounds"
    }

    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let circles = registry.components::<CircleCollider>();
        let boxes = registry.components::<Collider>();
        let mut positions = registry.components_mut::<Position>();

        for i in 0..positions.len() {
            let entity = positions.entity_at(i);
            let pos = positions.value_at_mut(i);
            if let Some(circle) = circles.get(entity) {
                pos.x = pos.x.clamp(circle.radius, self.width - circle.radius);
                pos.y = pos.y.clamp(circle.radius, self.height - circle.radius);
            } else if let Some(aabb) = boxes.get(entity) {
                if registry.has_component::<Controllable>(entity) {
                    pos.x = pos.x.clamp(0.0, self.width - aabb.width);
                    pos.y = pos.y.clamp(0.0, self.height - aabb.height);
                }
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

    fn arena_registry() -> Registry {
        let mut reg = Registry::new();
        reg.register_component::<Position>();
        reg.register_component::<Velocity>();
        reg.register_component::<Mass>();
        reg.register_component::<MovementTarget>();
        reg.register_component::<SplitVelocity>();
        reg.register_component::<EjectedMass>();
        reg.register_component::<MergeTimer>();
        reg.register_component::<CircleCollider>();
        reg.register_component::<Collider>();
        reg.register_component::<Controllable>();
        reg.register_component::<ToDestroy>();
        reg
    }

    #[test]
    fn physique_integrates_exactly() {
        let mut reg = Registry::new();
        reg.register_component::<Position>();
        reg.register_component::<Velocity>();
        let e = reg.spawn_entity();
        reg.add_component(e, Position { x: 10.0, y: -4.0 });
        reg.add_component(e, Velocity { x: 32.0, y: 8.0 });

        let dt = 0.03125f32;
        PhysiqueSystem.update(&mut reg, dt);

        let pos = *reg.components::<Position>().get(e).unwrap();
        assert_eq!(pos.x, 10.0 + 32.0 * dt);
        assert_eq!(pos.y, -4.0 + 8.0 * dt);
    }

    #[test]
    fn target_steering_moves_toward_target() {
        let mut reg = arena_registry();
        let e = reg.spawn_entity();
        reg.add_component(e, Position { x: 0.0, y: 0.0 });
        reg.add_component(e, Velocity::default());
        reg.add_component(e, Mass { value: 16.0 });
        reg.add_component(e, MovementTarget { x: 100.0, y: 0.0 });

        MovementTargetSystem.update(&mut reg, 0.05);
        let vel = *reg.components::<Velocity>().get(e).unwrap();
        assert!(vel.x > 0.0);
        assert_eq!(vel.y, 0.0);
        let expected = arena::mass_to_speed(16.0);
        assert!((vel.x - expected).abs() < 1e-3);
    }

    #[test]
    fn target_within_one_unit_stops() {
        let mut reg = arena_registry();
        let e = reg.spawn_entity();
        reg.add_component(e, Position { x: 50.0, y: 50.0 });
        reg.add_component(e, Velocity { x: 10.0, y: 10.0 });
        reg.add_component(e, Mass { value: 16.0 });
        reg.add_component(e, MovementTarget { x: 50.4, y: 50.4 });

        MovementTargetSystem.update(&mut reg, 0.05);
        let vel = *reg.components::<Velocity>().get(e).unwrap();
        assert_eq!((vel.x, vel.y), (0.0, 0.0));
    }

    #[test]
    fn split_velocity_decays_to_removal() {
        let mut reg = arena_registry();
        let e = reg.spawn_entity();
        reg.add_component(e, Position { x: 0.0, y: 0.0 });
        reg.add_component(e, Velocity::default());
        reg.add_component(e, Mass { value: 20.0 });
        reg.add_component(
            e,
            SplitVelocity {
                vx: 100.0,
                vy: 0.0,
                decay_rate: 1000.0,
            },
        );

        MovementTargetSystem.update(&mut reg, 0.05);
        assert!(reg.has_component::<SplitVelocity>(e));
        let remaining = reg.components::<SplitVelocity>().get(e).unwrap().vx;
        assert!(remaining < 100.0 && remaining > 0.0);

        MovementTargetSystem.update(&mut reg, 0.05);
        MovementTargetSystem.update(&mut reg, 0.05);
        assert!(!reg.has_component::<SplitVelocity>(e));
    }

    #[test]
    fn ejected_mass_expires_into_to_destroy() {
        let mut reg = arena_registry();
        let e = reg.spawn_entity();
        reg.add_component(e, Position { x: 0.0, y: 0.0 });
        reg.add_component(e, Velocity { x: 50.0, y: 0.0 });
        reg.add_component(
            e,
            EjectedMass {
                decay_timer: 0.04,
                original_owner: 1,
            },
        );

        MovementTargetSystem.update(&mut reg, 0.05);
        assert!(reg.has_component::<ToDestroy>(e));
    }

    #[test]
    fn map_bounds_is_idempotent() {
        let mut reg = arena_registry();
        let circle = reg.spawn_entity();
        reg.add_component(circle, Position { x: -50.0, y: 9999.0 });
        reg.add_component(circle, CircleCollider { radius: 25.0 });

        let aabb = reg.spawn_entity();
        reg.add_component(aabb, Position { x: 5000.0, y: -3.0 });
        reg.add_component(
            aabb,
            Collider {
                width: 80.0,
                height: 80.0,
            },
        );
        reg.add_component(aabb, Controllable { speed: 300.0 });

        let mut bounds = MapBoundsSystem::new(4000.0, 4000.0);
        bounds.update(&mut reg, 0.0);
        let first_circle = *reg.components::<Position>().get(circle).unwrap();
        let first_aabb = *reg.components::<Position>().get(aabb).unwrap();

        bounds.update(&mut reg, 0.0);
        assert_eq!(*reg.components::<Position>().get(circle).unwrap(), first_circle);
        assert_eq!(*reg.components::<Position>().get(aabb).unwrap(), first_aabb);

        assert_eq!(first_circle.x, 25.0);
        assert_eq!(first_circle.y, 4000.0 - 25.0);
        assert_eq!(first_aabb.x, 4000.0 - 80.0);
        assert_eq!(first_aabb.y, 0.0);
    }

    #[test]
    fn normalize_falls_back_below_epsilon() {
        assert_eq!(normalize_dir(0.0, 0.0), (1.0, 0.0));
        assert_eq!(normalize_dir(1e-4, -1e-4), (1.0, 0.0));
        let (x, y) = normalize_dir(3.0, 4.0);
        assert!((x - 0.6).abs() < 1e-6 && (y - 0.8).abs() < 1e-6);
    }
}
