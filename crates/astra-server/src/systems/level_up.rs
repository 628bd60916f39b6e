//! Score-driven level progression.
//!
//! After every scored kill the killer is checked against the fixed
//! thresholds. Crossing one raises the level, swaps the weapon to the
//! level's kind, resizes the ship's hitbox, and queues a LevelUp payload.
//! Level-ups are total: a player whose score passed `LEVEL_THRESHOLDS[k]`
//! is at least level `k + 1` by the next snapshot.

use tracing::info;

use astra_ecs::prelude::*;
use astra_protocol::payload::ServerPlayerLevelUp;

use crate::components::{Collider, Player, PlayerLevel, Score, Weapon, WeaponKind};
use crate::config::scroller;
use crate::events::EnemyKilledEvent;
use crate::sync::NetSync;

/// The level a score entitles the player to (1..=5).
pub fn level_for_score(score: u32) -> u8 {
    let mut level = 1;
    for (index, &threshold) in scroller::LEVEL_THRESHOLDS.iter().enumerate() {
        if score >= threshold {
            level = index as u8 + 1;
        }
    }
    level
}

/// Weapon kind granted at each level.
pub fn weapon_for_level(level: u8) -> WeaponKind {
    match level {
        1 => WeaponKind::Basic,
        2 => WeaponKind::Spread,
        3 => WeaponKind::Burst,
        4 => WeaponKind::Laser,
        _ => WeaponKind::Charge,
    }
}

/// Hitbox side length for each level's ship class: levels 1 = small,
/// 2 and 4 = medium, 3 and 5 = large.
pub fn hitbox_for_level(level: u8) -> f32 {
    match level {
        1 => scroller::HITBOX_SMALL,
        2 | 4 => scroller::HITBOX_MEDIUM,
        _ => scroller::HITBOX_LARGE,
    }
}

// ---------------------------------------------------------------------------
// LevelUpSystem
// ---------------------------------------------------------------------------

pub struct LevelUpSystem {
    net: NetSync,
}

impl LevelUpSystem {
    pub fn new(net: NetSync) -> Self {
        Self { net }
    }

    fn check_player(registry: &mut Registry, net: &NetSync, entity: Entity) {
        let Some(score) = registry.components::<Score>().get(entity).map(|s| s.value) else {
            return;
        };
        let new_level = level_for_score(score);

        let leveled = {
            let mut levels = registry.components_mut::<PlayerLevel>();
            let Some(level) = levels.get_mut(entity) else {
                return;
            };
            if new_level <= level.current_level {
                return;
            }
            let old = level.current_level;
            level.current_level = new_level;
            level.level_up_pending = true;
            level.level_up_timer = 2.0;
            info!(
                entity = entity.id(),
                from = old,
                to = new_level,
                score,
                "player leveled up"
            );
            level.skin_id()
        };

        {
            let mut weapons = registry.components_mut::<Weapon>();
            if let Some(weapon) = weapons.get_mut(entity) {
                *weapon = Weapon::new(weapon_for_level(new_level));
            }
        }
        {
            let size = hitbox_for_level(new_level);
            let mut colliders = registry.components_mut::<Collider>();
            if let Some(collider) = colliders.get_mut(entity) {
                collider.width = size;
                collider.height = size;
            }
        }

        let player_id = registry
            .components::<Player>()
            .get(entity)
            .map_or(0, |p| p.player_id);
        net.queue_level_up(ServerPlayerLevelUp {
            player_id,
            level: new_level,
            skin_id: leveled,
        });
    }
}

impl System for LevelUpSystem {
    fn name(&self) -> &'static str {
        "level_up"
    }

    fn init(&mut self, registry: &mut Registry) {
        let net = self.net.clone();
        registry
            .event_bus()
            .subscribe::<EnemyKilledEvent, _>(move |registry, event| {
                if !event.killer.is_null() {
                    Self::check_player(registry, &net, event.killer);
                }
            });
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        // Cool the level-up visual flag down.
        let mut levels = registry.components_mut::<PlayerLevel>();
        for (_, level) in levels.iter_mut() {
            if level.level_up_pending {
                level.level_up_timer -= dt;
                if level.level_up_timer <= 0.0 {
                    level.level_up_pending = false;
                    level.level_up_timer = 0.0;
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

    #[test]
    fn thresholds_map_to_levels() {
        assert_eq!(level_for_score(0), 1);
        assert_eq!(level_for_score(1999), 1);
        assert_eq!(level_for_score(2000), 2);
        assert_eq!(level_for_score(5000), 3);
        assert_eq!(level_for_score(10_000), 4);
        assert_eq!(level_for_score(19_999), 4);
        assert_eq!(level_for_score(20_000), 5);
        assert_eq!(level_for_score(u32::MAX), 5);
    }

    #[test]
    fn weapons_follow_levels() {
        assert_eq!(weapon_for_level(1), WeaponKind::Basic);
        assert_eq!(weapon_for_level(2), WeaponKind::Spread);
        assert_eq!(weapon_for_level(3), WeaponKind::Burst);
        assert_eq!(weapon_for_level(4), WeaponKind::Laser);
        assert_eq!(weapon_for_level(5), WeaponKind::Charge);
    }

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register_component::<Score>();
        reg.register_component::<PlayerLevel>();
        reg.register_component::<Weapon>();
        reg.register_component::<Collider>();
        reg.register_component::<Player>();
        reg.register_system(LevelUpSystem::new(NetSync::new()));
        reg
    }

    fn spawn_player(reg: &mut Registry, score: u32) -> Entity {
        let e = reg.spawn_entity();
        reg.add_component(e, Score { value: score });
        reg.add_component(e, PlayerLevel::new(0));
        reg.add_component(e, Weapon::new(WeaponKind::Basic));
        reg.add_component(
            e,
            Collider {
                width: scroller::HITBOX_SMALL,
                height: scroller::HITBOX_SMALL,
            },
        );
        reg.add_component(
            e,
            Player {
                player_id: 1,
                name: "ace".into(),
                skin_id: 0,
            },
        );
        e
    }

    #[test]
    fn crossing_a_threshold_upgrades_everything() {
        let mut reg = registry();
        let player = spawn_player(&mut reg, 2100);

        reg.publish(&EnemyKilledEvent {
            enemy: Entity::from_raw(50),
            killer: player,
            score_value: 100,
        });

        assert_eq!(
            reg.components::<PlayerLevel>()
                .get(player)
                .unwrap()
                .current_level,
            2
        );
        assert_eq!(
            reg.components::<Weapon>().get(player).unwrap().kind,
            WeaponKind::Spread
        );
        assert_eq!(
            reg.components::<Collider>().get(player).unwrap().width,
            scroller::HITBOX_MEDIUM
        );
    }

    #[test]
    fn level_never_goes_down() {
        let mut reg = registry();
        let player = spawn_player(&mut reg, 5500);

        reg.publish(&EnemyKilledEvent {
            enemy: Entity::from_raw(50),
            killer: player,
            score_value: 0,
        });
        assert_eq!(
            reg.components::<PlayerLevel>()
                .get(player)
                .unwrap()
                .current_level,
            3
        );

        // A later check with the same score must not re-trigger.
        reg.publish(&EnemyKilledEvent {
            enemy: Entity::from_raw(51),
            killer: player,
            score_value: 0,
        });
        assert_eq!(
            reg.components::<PlayerLevel>()
                .get(player)
                .unwrap()
                .current_level,
            3
        );
    }

    #[test]
    fn skipping_levels_in_one_kill_lands_on_the_right_one() {
        let mut reg = registry();
        let player = spawn_player(&mut reg, 12_000);

        reg.publish(&EnemyKilledEvent {
            enemy: Entity::from_raw(50),
            killer: player,
            score_value: 2000,
        });
        assert_eq!(
            reg.components::<PlayerLevel>()
                .get(player)
                .unwrap()
                .current_level,
            4
        );
        assert_eq!(
            reg.components::<Weapon>().get(player).unwrap().kind,
            WeaponKind::Laser
        );
    }
}
