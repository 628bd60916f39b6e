//! World snapshot builder.
//!
//! A snapshot is a delta-free dump of every live, network-visible entity,
//! emitted at a fixed cadence below the tick rate. The builder walks the
//! Position storage; each entity that is not doomed and has a network id
//! produces exactly one record. Entity typing follows tag priority: player,
//! enemy, projectile, bonus, wall, food, virus, ejected mass, player cell.

use bytes::BytesMut;

use astra_ecs::prelude::*;
use astra_protocol::packet::EntityType;
use astra_protocol::payload::{encode_snapshot, pack_velocity, EntityState};

use crate::components::{
    Bonus, CellOwner, Enemy, EjectedMass, Faction, Food, Health, Invulnerability, Mass, NetworkId,
    Player, PlayerCell, PlayerLevel, Position, Projectile, Shield, ToDestroy, Velocity, Virus,
    Wall,
};
use crate::spawn::{bonus_entity_type, enemy_entity_type};

/// Snapshot flag bits.
pub mod snapshot_flags {
    pub const INVULNERABLE: u8 = 1 << 0;
    pub const SHIELDED: u8 = 1 << 1;
}

/// Classify an entity by tag priority. Returns `None` for entities that are
/// not part of the world state (singletons and other untyped helpers).
fn classify(registry: &Registry, entity: Entity) -> Option<EntityType> {
    if registry.has_component::<Player>(entity) {
        return Some(EntityType::Player);
    }
    if let Some(enemy) = registry.components::<Enemy>().get(entity) {
        return Some(enemy_entity_type(enemy.kind));
    }
    if let Some(projectile) = registry.components::<Projectile>().get(entity) {
        return Some(match projectile.faction {
            Faction::Player => EntityType::ProjectilePlayer,
            Faction::Enemy => EntityType::ProjectileEnemy,
        });
    }
    if let Some(bonus) = registry.components::<Bonus>().get(entity) {
        return Some(bonus_entity_type(bonus.kind));
    }
    if registry.has_component::<Wall>(entity) {
        return Some(EntityType::Wall);
    }
    if registry.has_component::<Food>(entity) {
        return Some(EntityType::Food);
    }
    if registry.has_component::<Virus>(entity) {
        return Some(EntityType::Virus);
    }
    if registry.has_component::<EjectedMass>(entity) {
        return Some(EntityType::EjectedMass);
    }
    if registry.has_component::<PlayerCell>(entity) {
        return Some(EntityType::PlayerCell);
    }
    None
}

/// Build the entity records for one snapshot.
pub fn collect_states(registry: &Registry) -> Vec<EntityState> {
    let positions = registry.components::<Position>();
    let velocities = registry.components::<Velocity>();
    let healths = registry.components::<Health>();
    let masses = registry.components::<Mass>();
    let net_ids = registry.components::<NetworkId>();
    let doomed = registry.components::<ToDestroy>();
    let invulnerabilities = registry.components::<Invulnerability>();
    let shields = registry.components::<Shield>();
    let players = registry.components::<Player>();
    let player_cells = registry.components::<PlayerCell>();
    let owners = registry.components::<CellOwner>();
    let levels = registry.components::<PlayerLevel>();
    let enemies = registry.components::<Enemy>();

    let mut states = Vec::with_capacity(positions.len());
    for (entity, position) in positions.iter() {
        if doomed.contains(entity) {
            continue;
        }
        let Some(net_id) = net_ids.get(entity) else {
            continue;
        };
        let Some(entity_type) = classify(registry, entity) else {
            continue;
        };

        let velocity = velocities.get(entity).copied().unwrap_or_default();
        // Arena entities report mass through the health field's dynamic
        // range; Scroller entities report hit points.
        let health = match healths.get(entity) {
            Some(h) => h.current.clamp(0, u16::MAX as i32) as u16,
            None => masses
                .get(entity)
                .map_or(0, |m| m.value.clamp(0.0, u16::MAX as f32) as u16),
        };

        let mut flags = 0u8;
        if invulnerabilities
            .get(entity)
            .is_some_and(|i| i.time_remaining > 0.0)
        {
            flags |= snapshot_flags::INVULNERABLE;
        }
        if shields.get(entity).is_some_and(|s| s.active) {
            flags |= snapshot_flags::SHIELDED;
        }

        let owner_id = if let Some(player) = players.get(entity) {
            player.player_id
        } else if let Some(cell) = player_cells.get(entity) {
            cell.player_id
        } else if let Some(owner) = owners.get(entity) {
            owner.owner_id
        } else {
            0
        };

        let subtype = if let Some(level) = levels.get(entity) {
            level.skin_id()
        } else if let Some(enemy) = enemies.get(entity) {
            enemy.kind as u8
        } else {
            0
        };

        states.push(EntityState {
            entity_id: net_id.id,
            entity_type,
            position_x: position.x,
            position_y: position.y,
            velocity_x: pack_velocity(velocity.x),
            velocity_y: pack_velocity(velocity.y),
            health,
            flags,
            owner_id,
            subtype,
        });
    }
    states
}

/// Serialize a complete snapshot payload for the given tick.
pub fn build_snapshot(registry: &Registry, server_tick: u32) -> BytesMut {
    let states = collect_states(registry);
    encode_snapshot(server_tick, &states)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
