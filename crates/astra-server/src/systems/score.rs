//! Kill scoring.
//!
//! Subscribes to [`EnemyKilledEvent`]: the killer's [`Score`] increases by
//! the enemy's configured value, exactly once per enemy death, and a score
//! update payload is queued.

use astra_ecs::prelude::*;
use astra_protocol::payload::ServerScoreUpdate;

use crate::components::{Player, Score};
use crate::events::EnemyKilledEvent;
use crate::sync::NetSync;

pub struct ScoreSystem {
    net: NetSync,
}

impl ScoreSystem {
    pub fn new(net: NetSync) -> Self {
        Self { net }
    }
}

impl System for ScoreSystem {
    fn name(&self) -> &'static str {
        "score"
    }

    fn init(&mut self, registry: &mut Registry) {
        let net = self.net.clone();
        registry
            .event_bus()
            .subscribe::<EnemyKilledEvent, _>(move |registry, event| {
                if event.killer.is_null() {
                    return;
                }
                let new_total = {
                    let mut scores = registry.components_mut::<Score>();
                    let Some(score) = scores.get_mut(event.killer) else {
                        return;
                    };
                    score.value += event.score_value;
                    score.value
                };
                let player_id = registry
                    .components::<Player>()
                    .get(event.killer)
                    .map_or(0, |p| p.player_id);
                net.queue_score_update(ServerScoreUpdate {
                    player_id,
                    score: new_total,
                    delta: event.score_value,
                });
            });
    }

    fn update(&mut self, _registry: &mut Registry, _dt: f32) {}
}
