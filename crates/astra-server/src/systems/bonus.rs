//! Pickups (Scroller mode).
//!
//! [`BonusSpawnEvent`] (enemy drops) materializes a drifting pickup;
//! [`PowerupCollectedEvent`] (from the collision pass) applies it: health
//! restores hit points, shield arms a one-hit shield, speed applies a timed
//! multiplier. The update pass expires speed boosts.

use astra_ecs::prelude::*;
use astra_protocol::payload::ServerPowerupCollected;

use crate::components::{BonusKind, Health, Player, ScrollState, Shield, SpeedBoost};
use crate::config::scroller;
use crate::events::{BonusSpawnEvent, PowerupCollectedEvent};
use crate::spawn::spawn_bonus;
use crate::sync::NetSync;

pub struct BonusSystem {
    net: NetSync,
}

impl BonusSystem {
    pub fn new(net: NetSync) -> Self {
        Self { net }
    }
}

impl System for BonusSystem {
    fn name(&self) -> &'static str {
        "bonus"
    }

    fn init(&mut self, registry: &mut Registry) {
        let bus = registry.event_bus();

        let net = self.net.clone();
        bus.subscribe::<BonusSpawnEvent, _>(move |registry, event| {
            let scroll_speed = registry
                .components::<ScrollState>()
                .iter()
                .next()
                .map_or(scroller::SCROLL_SPEED, |(_, s)| s.scroll_speed);
            spawn_bonus(registry, &net, event.kind, scroll_speed, event.x, event.y);
        });

        let net = self.net.clone();
        bus.subscribe::<PowerupCollectedEvent, _>(move |registry, event| {
            match event.kind {
                BonusKind::Health => {
                    let mut healths = registry.components_mut::<Health>();
                    if let Some(health) = healths.get_mut(event.player) {
                        health.current =
                            (health.current + scroller::BONUS_HEALTH_AMOUNT).min(health.max);
                    }
                }
                BonusKind::Shield => {
                    registry.add_component(event.player, Shield { active: true });
                }
                BonusKind::Speed => {
                    let original_speed = registry
                        .components::<crate::components::Controllable>()
                        .get(event.player)
                        .map_or(scroller::PLAYER_MOVEMENT_SPEED, |c| c.speed);
                    registry.add_component(
                        event.player,
                        SpeedBoost {
                            time_remaining: scroller::BONUS_SPEED_DURATION,
                            multiplier: scroller::BONUS_SPEED_MULTIPLIER,
                            original_speed,
                        },
                    );
                }
            }
            let player_id = registry
                .components::<Player>()
                .get(event.player)
                .map_or(0, |p| p.player_id);
            net.queue_powerup_collected(ServerPowerupCollected {
                player_id,
                bonus_kind: event.kind as u8,
                position_x: event.x,
                position_y: event.y,
            });
        });
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        let expired: Vec<Entity> = {
            let mut boosts = registry.components_mut::<SpeedBoost>();
            let mut done = Vec::new();
            for (entity, boost) in boosts.iter_mut() {
                boost.time_remaining -= dt;
                if boost.time_remaining <= 0.0 {
                    done.push(entity);
                }
            }
            done
        };
        for entity in expired {
            registry.remove_component::<SpeedBoost>(entity);
        }
    }
}
