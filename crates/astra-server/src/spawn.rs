//! Entity spawning helpers.
//!
//! Every helper attaches the full component set its entity class requires and
//! queues the matching EntitySpawn payload (walls excepted: the server keeps
//! them for collision only and clients build them from the tile map).

use astra_ecs::prelude::*;
use astra_protocol::packet::EntityType;
use astra_protocol::payload::ServerEntitySpawn;

use crate::components::{
    Ai, Bonus, BonusKind, CellOwner, CircleCollider, Collider, EjectedMass, Enemy, EnemyKind,
    Food, Health, Mass, MovementTarget, NetworkId, NoFriction, Position, Velocity, Virus, Wall,
};
use crate::config::{arena, scroller};
use crate::sync::{NetIdAlloc, NetSync};

fn queue_spawn(
    net: &NetSync,
    net_id: u32,
    entity_type: EntityType,
    x: f32,
    y: f32,
    stat: f32,
    color: u32,
    owner_id: u32,
) {
    net.queue_entity_spawn(ServerEntitySpawn {
        entity_id: net_id,
        entity_type,
        spawn_x: x,
        spawn_y: y,
        stat,
        color,
        owner_id,
        owner_tag: [0; 4],
    });
}

// ---------------------------------------------------------------------------
// Scroller spawns
// ---------------------------------------------------------------------------

/// Per-variant enemy stats: (speed, health, size, score).
pub fn enemy_stats(kind: EnemyKind) -> (f32, i32, f32, u32) {
    match kind {
        EnemyKind::Basic => (100.0, 20, 64.0, 100),
        EnemyKind::Fast => (200.0, 10, 48.0, 150),
        EnemyKind::Tank => (60.0, 60, 96.0, 300),
        EnemyKind::Boss => (30.0, 1000, 192.0, 2000),
    }
}

pub fn enemy_entity_type(kind: EnemyKind) -> EntityType {
    match kind {
        EnemyKind::Basic => EntityType::EnemyBasic,
        EnemyKind::Fast => EntityType::EnemyFast,
        EnemyKind::Tank => EntityType::EnemyTank,
        EnemyKind::Boss => EntityType::EnemyBoss,
    }
}

/// Spawn an enemy moving left at its variant speed. The steering system
/// takes over from the initial velocity on the first tick.
pub fn spawn_enemy(
    registry: &mut Registry,
    net: &NetSync,
    kind: EnemyKind,
    x: f32,
    y: f32,
) -> Entity {
    let (speed, health, size, score_value) = enemy_stats(kind);
    let entity = registry.spawn_entity();
    registry.add_component(entity, Position { x, y });
    registry.add_component(entity, Velocity { x: -speed, y: 0.0 });
    registry.add_component(entity, Health::full(health));
    registry.add_component(entity, Enemy { kind, score_value });
    registry.add_component(
        entity,
        Ai {
            detection_range: scroller::ENEMY_DETECTION_RANGE,
            move_speed: speed,
        },
    );
    registry.add_component(entity, NoFriction);
    registry.add_component(
        entity,
        Collider {
            width: size,
            height: size,
        },
    );
    registry.add_component(entity, NetworkId { id: entity.id() });
    queue_spawn(
        net,
        entity.id(),
        enemy_entity_type(kind),
        x,
        y,
        health as f32,
        0,
        0,
    );
    entity
}

/// Spawn a wall segment scrolling with the map. Not announced to clients.
pub fn spawn_wall(
    registry: &mut Registry,
    scroll_speed: f32,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> Entity {
    let entity = registry.spawn_entity();
    registry.add_component(entity, Position { x, y });
    registry.add_component(
        entity,
        Velocity {
            x: -scroll_speed,
            y: 0.0,
        },
    );
    registry.add_component(entity, Collider { width, height });
    registry.add_component(entity, Wall);
    registry.add_component(entity, NoFriction);
    registry.add_component(entity, NetworkId { id: entity.id() });
    entity
}

pub fn bonus_entity_type(kind: BonusKind) -> EntityType {
    match kind {
        BonusKind::Health => EntityType::BonusHealth,
        BonusKind::Shield => EntityType::BonusShield,
        BonusKind::Speed => EntityType::BonusSpeed,
    }
}

/// Spawn a pickup drifting left with the scroll.
pub fn spawn_bonus(
    registry: &mut Registry,
    net: &NetSync,
    kind: BonusKind,
    scroll_speed: f32,
    x: f32,
    y: f32,
) -> Entity {
    let entity = registry.spawn_entity();
    registry.add_component(entity, Position { x, y });
    registry.add_component(
        entity,
        Velocity {
            x: -scroll_speed,
            y: 0.0,
        },
    );
    registry.add_component(
        entity,
        Collider {
            width: scroller::BONUS_SIZE,
            height: scroller::BONUS_SIZE,
        },
    );
    registry.add_component(
        entity,
        Bonus {
            kind,
            radius: scroller::BONUS_SIZE / 2.0,
        },
    );
    registry.add_component(entity, NoFriction);
    registry.add_component(entity, NetworkId { id: entity.id() });
    queue_spawn(net, entity.id(), bonus_entity_type(kind), x, y, 0.0, 0, 0);
    entity
}

// ---------------------------------------------------------------------------
// Arena spawns
// ---------------------------------------------------------------------------

/// Spawn a food pellet.
pub fn spawn_food(
    registry: &mut Registry,
    net: &NetSync,
    ids: &NetIdAlloc,
    x: f32,
    y: f32,
    color: u32,
) -> Entity {
    let entity = registry.spawn_entity();
    let net_id = ids.next();
    registry.add_component(entity, Position { x, y });
    registry.add_component(entity, Velocity::default());
    registry.add_component(
        entity,
        Mass {
            value: arena::FOOD_MASS,
        },
    );
    registry.add_component(
        entity,
        CircleCollider {
            radius: arena::mass_to_radius(arena::FOOD_MASS),
        },
    );
    registry.add_component(
        entity,
        Food {
            nutrition: arena::FOOD_MASS,
            color,
        },
    );
    registry.add_component(entity, NetworkId { id: net_id });
    queue_spawn(
        net,
        net_id,
        EntityType::Food,
        x,
        y,
        arena::FOOD_MASS,
        color,
        0,
    );
    entity
}

/// Spawn a resting virus.
pub fn spawn_virus(
    registry: &mut Registry,
    net: &NetSync,
    ids: &NetIdAlloc,
    x: f32,
    y: f32,
) -> Entity {
    let entity = registry.spawn_entity();
    let net_id = ids.next();
    registry.add_component(entity, Position { x, y });
    registry.add_component(entity, Velocity::default());
    registry.add_component(
        entity,
        Mass {
            value: arena::VIRUS_MASS,
        },
    );
    registry.add_component(
        entity,
        CircleCollider {
            radius: arena::mass_to_radius(arena::VIRUS_MASS),
        },
    );
    registry.add_component(entity, Virus::resting());
    registry.add_component(entity, NetworkId { id: net_id });
    queue_spawn(
        net,
        net_id,
        EntityType::Virus,
        x,
        y,
        arena::VIRUS_MASS,
        0,
        0,
    );
    entity
}

/// Spawn a virus shot out of a fed one; it decelerates under virus friction.
pub fn spawn_shot_virus(
    registry: &mut Registry,
    net: &NetSync,
    ids: &NetIdAlloc,
    x: f32,
    y: f32,
    dir_x: f32,
    dir_y: f32,
) -> Entity {
    let entity = registry.spawn_entity();
    let net_id = ids.next();
    registry.add_component(entity, Position { x, y });
    registry.add_component(
        entity,
        Velocity {
            x: dir_x * arena::VIRUS_SHOOT_SPEED,
            y: dir_y * arena::VIRUS_SHOOT_SPEED,
        },
    );
    registry.add_component(
        entity,
        Mass {
            value: arena::VIRUS_SHOOT_MASS,
        },
    );
    registry.add_component(
        entity,
        CircleCollider {
            radius: arena::mass_to_radius(arena::VIRUS_SHOOT_MASS),
        },
    );
    registry.add_component(entity, Virus::moving());
    registry.add_component(entity, NetworkId { id: net_id });
    queue_spawn(
        net,
        net_id,
        EntityType::Virus,
        x,
        y,
        arena::VIRUS_SHOOT_MASS,
        0,
        0,
    );
    entity
}

/// Spawn one cell for a player.
#[allow(clippy::too_many_arguments)]
pub fn spawn_player_cell(
    registry: &mut Registry,
    net: &NetSync,
    ids: &NetIdAlloc,
    player_id: u32,
    name: &str,
    color: u32,
    x: f32,
    y: f32,
    mass: f32,
) -> Entity {
    let entity = registry.spawn_entity();
    let net_id = ids.next();
    registry.add_component(entity, Position { x, y });
    registry.add_component(entity, Velocity::default());
    registry.add_component(entity, Mass { value: mass });
    registry.add_component(
        entity,
        CircleCollider {
            radius: arena::mass_to_radius(mass),
        },
    );
    registry.add_component(
        entity,
        crate::components::PlayerCell {
            player_id,
            color,
            name: name.to_owned(),
        },
    );
    registry.add_component(entity, CellOwner { owner_id: player_id });
    registry.add_component(entity, MovementTarget { x, y });
    registry.add_component(entity, NetworkId { id: net_id });
    queue_spawn(
        net,
        net_id,
        EntityType::PlayerCell,
        x,
        y,
        mass,
        color,
        player_id,
    );
    entity
}

/// Spawn a blob of ejected mass travelling along `dir`.
#[allow(clippy::too_many_arguments)]
pub fn spawn_ejected_mass(
    registry: &mut Registry,
    net: &NetSync,
    ids: &NetIdAlloc,
    owner_id: u32,
    color: u32,
    x: f32,
    y: f32,
    dir_x: f32,
    dir_y: f32,
) -> Entity {
    let entity = registry.spawn_entity();
    let net_id = ids.next();
    registry.add_component(entity, Position { x, y });
    registry.add_component(
        entity,
        Velocity {
            x: dir_x * arena::EJECT_SPEED,
            y: dir_y * arena::EJECT_SPEED,
        },
    );
    registry.add_component(
        entity,
        Mass {
            value: arena::EJECT_MASS_VALUE,
        },
    );
    registry.add_component(
        entity,
        CircleCollider {
            radius: arena::mass_to_radius(arena::EJECT_MASS_VALUE),
        },
    );
    registry.add_component(
        entity,
        EjectedMass {
            decay_timer: arena::EJECT_DECAY_TIME,
            original_owner: owner_id,
        },
    );
    registry.add_component(entity, NetworkId { id: net_id });
    queue_spawn(
        net,
        net_id,
        EntityType::EjectedMass,
        x,
        y,
        arena::EJECT_MASS_VALUE,
        color,
        owner_id,
    );
    entity
}
