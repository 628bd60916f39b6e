//! AABB collision phase (Scroller mode).
//!
//! Brute-force pairwise scans over typed pairs, dispatched by component
//! presence. Pairs are gathered first with storage borrows held, then
//! resolved with borrows released, because resolution publishes events whose
//! handlers mutate storages (damage application, death bookkeeping).

use astra_ecs::prelude::*;

use crate::components::{
    Bonus, Collider, Controllable, Enemy, Faction, Invulnerability, Position, Projectile, Shield,
    ToDestroy, Wall,
};
use crate::config::scroller;
use crate::events::{DamageEvent, PlayerHitEvent, PowerupCollectedEvent};

/// Open-interval AABB overlap; zero-sized colliders never overlap.
pub fn aabb_overlap(p1: Position, c1: Collider, p2: Position, c2: Collider) -> bool {
    if c1.width <= 0.0 || c1.height <= 0.0 || c2.width <= 0.0 || c2.height <= 0.0 {
        return false;
    }
    p1.x + c1.width > p2.x
        && p1.x < p2.x + c2.width
        && p1.y + c1.height > p2.y
        && p1.y < p2.y + c2.height
}

// ---------------------------------------------------------------------------
// CollisionSystem
// ---------------------------------------------------------------------------

/// Resolves the six Scroller collision contracts each tick and ticks
/// invulnerability windows down.
pub struct CollisionSystem;

#[derive(Clone, Copy)]
enum Contact {
    ProjectileHitEnemy { projectile: Entity, enemy: Entity },
    ProjectileHitPlayer { projectile: Entity, player: Entity },
    ProjectileHitWall { projectile: Entity },
    PlayerTouchedEnemy { player: Entity, enemy: Entity },
    PlayerTouchedWall { player: Entity, wall: Entity },
    PlayerTouchedBonus { player: Entity, bonus: Entity },
}

impl CollisionSystem {
    fn gather(&self, registry: &Registry) -> Vec<Contact> {
        let positions = registry.components::<Position>();
        let colliders = registry.components::<Collider>();
        let projectiles = registry.components::<Projectile>();
        let enemies = registry.components::<Enemy>();
        let players = registry.components::<Controllable>();
        let walls = registry.components::<Wall>();
        let bonuses = registry.components::<Bonus>();

        let mut contacts = Vec::new();

        let boxed = |entity: Entity| -> Option<(Position, Collider)> {
            Some((*positions.get(entity)?, *colliders.get(entity)?))
        };

        for (proj_entity, projectile) in projectiles.iter() {
            let Some((proj_pos, proj_col)) = boxed(proj_entity) else {
                continue;
            };
            match projectile.faction {
                Faction::Player => {
                    for (enemy_entity, _) in enemies.iter() {
                        let Some((enemy_pos, enemy_col)) = boxed(enemy_entity) else {
                            continue;
                        };
                        if aabb_overlap(proj_pos, proj_col, enemy_pos, enemy_col) {
                            contacts.push(Contact::ProjectileHitEnemy {
                                projectile: proj_entity,
                                enemy: enemy_entity,
                            });
                        }
                    }
                }
                Faction::Enemy => {
                    for (player_entity, _) in players.iter() {
                        let Some((player_pos, player_col)) = boxed(player_entity) else {
                            continue;
                        };
                        if aabb_overlap(proj_pos, proj_col, player_pos, player_col) {
                            contacts.push(Contact::ProjectileHitPlayer {
                                projectile: proj_entity,
                                player: player_entity,
                            });
                        }
                    }
                }
            }
            for (wall_entity, _) in walls.iter() {
                let Some((wall_pos, wall_col)) = boxed(wall_entity) else {
                    continue;
                };
                if aabb_overlap(proj_pos, proj_col, wall_pos, wall_col) {
                    contacts.push(Contact::ProjectileHitWall {
                        projectile: proj_entity,
                    });
                }
            }
        }

        for (player_entity, _) in players.iter() {
            let Some((player_pos, player_col)) = boxed(player_entity) else {
                continue;
            };
            for (enemy_entity, _) in enemies.iter() {
                let Some((enemy_pos, enemy_col)) = boxed(enemy_entity) else {
                    continue;
                };
                if aabb_overlap(player_pos, player_col, enemy_pos, enemy_col) {
                    contacts.push(Contact::PlayerTouchedEnemy {
                        player: player_entity,
                        enemy: enemy_entity,
                    });
                }
            }
            for (wall_entity, _) in walls.iter() {
                let Some((wall_pos, wall_col)) = boxed(wall_entity) else {
                    continue;
                };
                if aabb_overlap(player_pos, player_col, wall_pos, wall_col) {
                    contacts.push(Contact::PlayerTouchedWall {
                        player: player_entity,
                        wall: wall_entity,
                    });
                }
            }
            for (bonus_entity, _) in bonuses.iter() {
                let Some((bonus_pos, bonus_col)) = boxed(bonus_entity) else {
                    continue;
                };
                if aabb_overlap(player_pos, player_col, bonus_pos, bonus_col) {
                    contacts.push(Contact::PlayerTouchedBonus {
                        player: player_entity,
                        bonus: bonus_entity,
                    });
                }
            }
        }

        contacts
    }

    /// Push `player` out of `wall` along the axis of smaller overlap by
    /// exactly the overlap amount.
    fn push_out_of_wall(registry: &Registry, player: Entity, wall: Entity) {
        let colliders = registry.components::<Collider>();
        let mut positions = registry.components_mut::<Position>();
        let (Some(&player_col), Some(&wall_col)) = (colliders.get(player), colliders.get(wall))
        else {
            return;
        };
        let Some(&wall_pos) = positions.get(wall) else {
            return;
        };
        let Some(player_pos) = positions.get_mut(player) else {
            return;
        };

        let overlap_left = (player_pos.x + player_col.width) - wall_pos.x;
        let overlap_right = (wall_pos.x + wall_col.width) - player_pos.x;
        let overlap_top = (player_pos.y + player_col.height) - wall_pos.y;
        let overlap_bottom = (wall_pos.y + wall_col.height) - player_pos.y;

        let min_x = overlap_left.min(overlap_right);
        let min_y = overlap_top.min(overlap_bottom);

        if min_x < min_y {
            if overlap_left < overlap_right {
                player_pos.x -= overlap_left;
            } else {
                player_pos.x += overlap_right;
            }
        } else if overlap_top < overlap_bottom {
            player_pos.y -= overlap_top;
        } else {
            player_pos.y += overlap_bottom;
        }
    }

    fn is_invulnerable(registry: &Registry, entity: Entity) -> bool {
        registry
            .components::<Invulnerability>()
            .get(entity)
            .is_some_and(|inv| inv.time_remaining > 0.0)
    }

    fn grant_invulnerability(registry: &Registry, entity: Entity) {
        registry.add_component(
            entity,
            Invulnerability {
                time_remaining: scroller::INVULNERABILITY_TIME,
            },
        );
    }
}

impl System for CollisionSystem {
    fn name(&self) -> &'static str {
        "collision"
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        // Tick invulnerability windows.
        {
            let mut invulnerabilities = registry.components_mut::<Invulnerability>();
            for (_, inv) in invulnerabilities.iter_mut() {
                if inv.time_remaining > 0.0 {
                    inv.time_remaining -= dt;
                }
            }
        }

        let contacts = self.gather(registry);

        for contact in contacts {
            match contact {
                Contact::ProjectileHitEnemy { projectile, enemy } => {
                    // A projectile spends itself on the first enemy it hits.
                    if registry.has_component::<ToDestroy>(projectile)
                        || registry.has_component::<ToDestroy>(enemy)
                    {
                        continue;
                    }
                    registry.add_component(projectile, ToDestroy);
                    let amount = registry
                        .components::<crate::components::Damage>()
                        .get(projectile)
                        .map_or(10, |d| d.amount);
                    registry.publish(&DamageEvent {
                        target: enemy,
                        source: projectile,
                        amount,
                    });
                }
                Contact::ProjectileHitPlayer { projectile, player } => {
                    if registry.has_component::<ToDestroy>(projectile) {
                        continue;
                    }
                    if Self::is_invulnerable(registry, player) {
                        continue;
                    }
                    registry.add_component(projectile, ToDestroy);
                    // An active shield soaks the hit.
                    let shielded = {
                        let mut shields = registry.components_mut::<Shield>();
                        match shields.get_mut(player) {
                            Some(shield) if shield.active => {
                                shield.active = false;
                                true
                            }
                            _ => false,
                        }
                    };
                    Self::grant_invulnerability(registry, player);
                    if !shielded {
                        let amount = registry
                            .components::<crate::components::Damage>()
                            .get(projectile)
                            .map_or(10, |d| d.amount);
                        registry.publish(&DamageEvent {
                            target: player,
                            source: projectile,
                            amount,
                        });
                    }
                }
                Contact::ProjectileHitWall { projectile } => {
                    registry.add_component(projectile, ToDestroy);
                }
                Contact::PlayerTouchedEnemy { player, enemy } => {
                    if Self::is_invulnerable(registry, player)
                        || registry.has_component::<ToDestroy>(enemy)
                    {
                        continue;
                    }
                    Self::grant_invulnerability(registry, player);
                    registry.publish(&PlayerHitEvent { player, enemy });
                }
                Contact::PlayerTouchedWall { player, wall } => {
                    Self::push_out_of_wall(registry, player, wall);
                }
                Contact::PlayerTouchedBonus { player, bonus } => {
                    if registry.has_component::<ToDestroy>(bonus) {
                        continue;
                    }
                    let Some(kind) = registry.components::<Bonus>().get(bonus).map(|b| b.kind)
                    else {
                        continue;
                    };
                    let (x, y) = registry
                        .components::<Position>()
                        .get(bonus)
                        .map_or((0.0, 0.0), |p| (p.x, p.y));
                    registry.add_component(bonus, ToDestroy);
                    registry.publish(&PowerupCollectedEvent {
                        player,
                        kind,
                        x,
                        y,
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
