//! Terminal destroy sweep.
//!
//! Runs after the snapshot is serialized: every entity tagged [`ToDestroy`]
//! is removed from the registry atomically, and a destroy payload is queued
//! for each one that was network-visible. The reason and kill credit come
//! from the optional [`DestroyInfo`] left by whoever doomed the entity.

use astra_ecs::prelude::*;
use astra_protocol::packet::DestroyReason;
use astra_protocol::payload::ServerEntityDestroy;

use crate::components::{DestroyInfo, NetworkId, Position, ToDestroy};
use crate::sync::NetSync;

pub struct DestroySystem {
    net: NetSync,
}

impl DestroySystem {
    pub fn new(net: NetSync) -> Self {
        Self { net }
    }
}

impl System for DestroySystem {
    fn name(&self) -> &'static str {
        "destroy"
    }

    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let doomed = registry.components::<ToDestroy>().entities();
        for entity in doomed {
            let net_id = registry.components::<NetworkId>().get(entity).map(|n| n.id);
            if let Some(net_id) = net_id {
                let info = registry
                    .components::<DestroyInfo>()
                    .get(entity)
                    .copied()
                    .unwrap_or(DestroyInfo {
                        reason: DestroyReason::Killed,
                        killer_id: 0,
                    });
                let position = registry
                    .components::<Position>()
                    .get(entity)
                    .copied()
                    .unwrap_or_default();
                self.net.queue_entity_destroy(ServerEntityDestroy {
                    entity_id: net_id,
                    reason: info.reason,
                    position_x: position.x,
                    position_y: position.y,
                    killer_id: info.killer_id,
                });
            }
            registry.kill_entity(entity);
        }
    }
}
