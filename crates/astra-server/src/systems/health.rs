//! Damage application and death bookkeeping.
//!
//! [`HealthSystem`] is almost entirely event-driven: it subscribes to
//! [`DamageEvent`] (published synchronously by the collision pass) and to
//! [`PlayerHitEvent`] (body contact). Health reaching zero raises
//! [`EntityDeathEvent`], and for enemies also [`EnemyKilledEvent`] with kill
//! credit, an explosion scatter, and a bonus drop roll.

use std::sync::{Arc, Mutex};

use rand::Rng;
use rand_pcg::Pcg64Mcg;
use tracing::debug;

use astra_ecs::prelude::*;
use astra_protocol::packet::DestroyReason;
use astra_protocol::payload::ServerExplosion;

use crate::components::{
    BonusKind, Controllable, DestroyInfo, Enemy, FiredBy, Health, Player, Position, ToDestroy,
};
use crate::config::scroller;
use crate::events::{
    BonusSpawnEvent, DamageEvent, EnemyKilledEvent, EntityDeathEvent, ExplosionEvent,
    PlayerHitEvent,
};
use crate::sync::NetSync;

// ---------------------------------------------------------------------------
// HealthSystem
// ---------------------------------------------------------------------------

pub struct HealthSystem {
    net: NetSync,
    rng: Arc<Mutex<Pcg64Mcg>>,
}

impl HealthSystem {
    pub fn new(net: NetSync, seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            net,
            rng: Arc::new(Mutex::new(Pcg64Mcg::seed_from_u64(seed))),
        }
    }

    /// Resolve the player entity credited for destroying `source` (a
    /// projectile carrying [`FiredBy`]).
    fn kill_credit(registry: &Registry, source: Entity) -> (Entity, u32) {
        let shooter = registry
            .components::<FiredBy>()
            .get(source)
            .map(|f| f.shooter)
            .unwrap_or(Entity::NULL);
        let player_id = registry
            .components::<Player>()
            .get(shooter)
            .map_or(0, |p| p.player_id);
        (shooter, player_id)
    }
}

impl System for HealthSystem {
    fn name(&self) -> &'static str {
        "health"
    }

    fn init(&mut self, registry: &mut Registry) {
        let bus = registry.event_bus();

        // Body contact converts to plain damage; the DamageEvent handler
        // below does the rest.
        bus.subscribe::<PlayerHitEvent, _>(move |registry, event| {
            registry.publish(&DamageEvent {
                target: event.player,
                source: event.enemy,
                amount: scroller::ENEMY_CONTACT_DAMAGE,
            });
        });

        let net = self.net.clone();
        let rng = Arc::clone(&self.rng);
        bus.subscribe::<DamageEvent, _>(move |registry, event| {
            let (dead, is_player, is_enemy) = {
                let mut healths = registry.components_mut::<Health>();
                let Some(health) = healths.get_mut(event.target) else {
                    return;
                };
                let old = health.current;
                health.current = (health.current - event.amount).max(0);
                debug!(
                    entity = event.target.id(),
                    amount = event.amount,
                    from = old,
                    to = health.current,
                    "damage applied"
                );
                (
                    old > 0 && health.current == 0,
                    registry.components::<Controllable>().contains(event.target),
                    registry.components::<Enemy>().contains(event.target),
                )
            };
            if !dead {
                return;
            }

            let (killer, killer_id) = Self::kill_credit(registry, event.source);
            let position = registry
                .components::<Position>()
                .get(event.target)
                .copied()
                .unwrap_or_default();

            registry.add_component(event.target, ToDestroy);
            registry.add_component(
                event.target,
                DestroyInfo {
                    reason: DestroyReason::Killed,
                    killer_id,
                },
            );

            registry.publish(&EntityDeathEvent {
                entity: event.target,
                is_player,
            });

            if is_enemy {
                let score_value = registry
                    .components::<Enemy>()
                    .get(event.target)
                    .map_or(0, |e| e.score_value);
                registry.publish(&EnemyKilledEvent {
                    enemy: event.target,
                    killer,
                    score_value,
                });

                // Explosion scatter around the corpse.
                let (bursts, drop_roll) = {
                    let mut rng = rng.lock().unwrap();
                    let count = rng.gen_range(3..=6);
                    let bursts: Vec<(f32, f32, f32)> = (0..count)
                        .map(|_| {
                            let radius = rng.gen_range(18.0..60.0f32);
                            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                            let scale = rng.gen_range(0.6..1.0f32);
                            (
                                position.x + angle.cos() * radius,
                                position.y + angle.sin() * radius,
                                scale,
                            )
                        })
                        .collect();
                    (bursts, rng.gen_bool(scroller::BONUS_DROP_CHANCE))
                };
                for (x, y, scale) in bursts {
                    net.queue_explosion(ServerExplosion {
                        position_x: x,
                        position_y: y,
                        scale,
                        source_id: event.target.id(),
                    });
                    registry.publish(&ExplosionEvent {
                        source: event.target,
                        x,
                        y,
                        scale,
                    });
                }

                if drop_roll {
                    let kind = {
                        let mut rng = rng.lock().unwrap();
                        match rng.gen_range(0..3) {
                            0 => BonusKind::Health,
                            1 => BonusKind::Shield,
                            _ => BonusKind::Speed,
                        }
                    };
                    registry.publish(&BonusSpawnEvent {
                        x: position.x,
                        y: position.y,
                        kind,
                    });
                }
            }
        });
    }

    fn update(&mut self, _registry: &mut Registry, _dt: f32) {
        // All work happens in the event handlers.
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::EnemyKind;

    fn registry_with_health_system() -> Registry {
        let mut reg = Registry::new();
        reg.register_component::<Health>();
        reg.register_component::<Controllable>();
        reg.register_component::<Enemy>();
        reg.register_component::<Position>();
        reg.register_component::<FiredBy>();
        reg.register_component::<Player>();
        reg.register_component::<ToDestroy>();
        reg.register_component::<DestroyInfo>();
        reg.register_system(HealthSystem::new(NetSync::new(), 7));
        reg
    }

    #[test]
    fn damage_is_applied_and_clamped() {
        let mut reg = registry_with_health_system();
        let e = reg.spawn_entity();
        reg.add_component(e, Health::full(20));

        reg.publish(&DamageEvent {
            target: e,
            source: Entity::NULL,
            amount: 15,
        });
        assert_eq!(reg.components::<Health>().get(e).unwrap().current, 5);

        reg.publish(&DamageEvent {
            target: e,
            source: Entity::NULL,
            amount: 50,
        });
        assert_eq!(reg.components::<Health>().get(e).unwrap().current, 0);
        assert!(reg.has_component::<ToDestroy>(e));
    }

    #[test]
    fn target_without_health_is_skipped() {
        let mut reg = registry_with_health_system();
        let e = reg.spawn_entity();
        reg.publish(&DamageEvent {
            target: e,
            source: Entity::NULL,
            amount: 10,
        });
        assert!(!reg.has_component::<ToDestroy>(e));
    }

    #[test]
    fn enemy_death_credits_the_shooter() {
        let mut reg = registry_with_health_system();

        let player = reg.spawn_entity();
        reg.add_component(
            player,
            Player {
                player_id: 3,
                name: "ace".into(),
                skin_id: 0,
            },
        );

        let projectile = reg.spawn_entity();
        reg.add_component(projectile, FiredBy { shooter: player });

        let enemy = reg.spawn_entity();
        reg.add_component(enemy, Health::full(10));
        reg.add_component(enemy, Position { x: 500.0, y: 100.0 });
        reg.add_component(
            enemy,
            Enemy {
                kind: EnemyKind::Basic,
                score_value: 100,
            },
        );

        let kills = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = kills.clone();
        reg.event_bus()
            .subscribe::<EnemyKilledEvent, _>(move |_reg, ev| {
                sink.lock().unwrap().push((ev.killer, ev.score_value));
            });

        reg.publish(&DamageEvent {
            target: enemy,
            source: projectile,
            amount: 10,
        });

        assert_eq!(*kills.lock().unwrap(), vec![(player, 100)]);
        let info = *reg.components::<DestroyInfo>().get(enemy).unwrap();
        assert_eq!(info.killer_id, 3);
    }

    #[test]
    fn exactly_one_kill_event_per_enemy() {
        let mut reg = registry_with_health_system();
        let enemy = reg.spawn_entity();
        reg.add_component(enemy, Health::full(10));
        reg.add_component(
            enemy,
            Enemy {
                kind: EnemyKind::Basic,
                score_value: 100,
            },
        );

        let count = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let sink = count.clone();
        reg.event_bus()
            .subscribe::<EnemyKilledEvent, _>(move |_reg, _ev| {
                sink.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            });

        reg.publish(&DamageEvent {
            target: enemy,
            source: Entity::NULL,
            amount: 10,
        });
        // Health is already 0; a second damage event must not re-kill.
        reg.publish(&DamageEvent {
            target: enemy,
            source: Entity::NULL,
            amount: 10,
        });
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
