//! Circle collision phase (Arena mode): eating, merging, viruses.
//!
//! The scan partitions collidable entities into cells, food, ejected mass,
//! and viruses, then resolves each interaction class. Contacts are gathered
//! with storage borrows held and resolved afterwards, with staleness checks,
//! so event handlers are free to mutate storages.

use astra_ecs::prelude::*;
use astra_protocol::packet::DestroyReason;
use astra_protocol::payload::ServerCellMerge;

use crate::components::{
    CellOwner, CircleCollider, DestroyInfo, EjectedMass, Food, Mass, MergeTimer, PlayerCell,
    Position, ToDestroy, Velocity, Virus,
};
use crate::config::arena;
use crate::events::{CellAteCellEvent, CellAteFoodEvent, CellHitVirusEvent, CellMergedEvent};
use crate::spawn::spawn_shot_virus;
use crate::sync::{NetIdAlloc, NetSync};

fn distance(a: Position, b: Position) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Eat predicate for cell-vs-pellet interactions: the pellet's center must be
/// well inside the eater.
fn eats(eater_pos: Position, eater_radius: f32, prey_pos: Position, prey_radius: f32) -> bool {
    distance(eater_pos, prey_pos) < eater_radius - prey_radius * 0.5
}

// ---------------------------------------------------------------------------
// Contact gathering
// ---------------------------------------------------------------------------

enum CellContact {
    AteFood { cell: Entity, food: Entity },
    AteEjected { cell: Entity, ejected: Entity },
    HitVirus { cell: Entity, virus: Entity },
    FedVirus { virus: Entity, ejected: Entity },
    Merge { a: Entity, b: Entity },
    Push { a: Entity, b: Entity },
    Eat { eater: Entity, eaten: Entity },
}

// ---------------------------------------------------------------------------
// CellCollisionSystem
// ---------------------------------------------------------------------------

pub struct CellCollisionSystem {
    net: NetSync,
    ids: NetIdAlloc,
}

impl CellCollisionSystem {
    pub fn new(net: NetSync, ids: NetIdAlloc) -> Self {
        Self { net, ids }
    }

    fn owner_of(registry: &Registry, entity: Entity) -> u32 {
        if let Some(cell) = registry.components::<PlayerCell>().get(entity) {
            return cell.player_id;
        }
        registry
            .components::<CellOwner>()
            .get(entity)
            .map_or(0, |o| o.owner_id)
    }

    #[allow(clippy::type_complexity)]
    fn gather(&self, registry: &Registry) -> Vec<CellContact> {
        let positions = registry.components::<Position>();
        let colliders = registry.components::<CircleCollider>();
        let masses = registry.components::<Mass>();
        let foods = registry.components::<Food>();
        let player_cells = registry.components::<PlayerCell>();
        let owners = registry.components::<CellOwner>();
        let ejected_masses = registry.components::<EjectedMass>();
        let viruses = registry.components::<Virus>();
        let velocities = registry.components::<Velocity>();
        let merge_timers = registry.components::<MergeTimer>();
        let doomed = registry.components::<ToDestroy>();

        // Partition by class.
        let mut cells: Vec<Entity> = Vec::new();
        let mut food_entities: Vec<Entity> = Vec::new();
        let mut ejected_entities: Vec<Entity> = Vec::new();
        let mut virus_entities: Vec<Entity> = Vec::new();
        for (entity, _) in positions.iter() {
            if !colliders.contains(entity) || doomed.contains(entity) {
                continue;
            }
            if foods.contains(entity) {
                food_entities.push(entity);
            } else if ejected_masses.contains(entity) {
                ejected_entities.push(entity);
            } else if viruses.contains(entity) {
                virus_entities.push(entity);
            } else if player_cells.contains(entity) || owners.contains(entity) {
                cells.push(entity);
            }
        }

        let circle = |entity: Entity| -> Option<(Position, f32)> {
            Some((*positions.get(entity)?, colliders.get(entity)?.radius))
        };
        let owner = |entity: Entity| -> u32 {
            if let Some(cell) = player_cells.get(entity) {
                cell.player_id
            } else {
                owners.get(entity).map_or(0, |o| o.owner_id)
            }
        };
        let speed = |entity: Entity| -> f32 {
            velocities
                .get(entity)
                .map_or(0.0, |v| (v.x * v.x + v.y * v.y).sqrt())
        };

        let mut contacts = Vec::new();

        for &cell in &cells {
            let Some((cell_pos, cell_radius)) = circle(cell) else {
                continue;
            };
            let Some(cell_mass) = masses.get(cell).map(|m| m.value) else {
                continue;
            };
            let cell_owner = owner(cell);

            for &food in &food_entities {
                let Some((food_pos, food_radius)) = circle(food) else {
                    continue;
                };
                if eats(cell_pos, cell_radius, food_pos, food_radius) {
                    contacts.push(CellContact::AteFood { cell, food });
                }
            }

            for &ejected in &ejected_entities {
                let Some((ejected_pos, ejected_radius)) = circle(ejected) else {
                    continue;
                };
                // Freshly ejected mass cannot be re-eaten by its owner while
                // it is still flying.
                let ejected_owner = ejected_masses
                    .get(ejected)
                    .map_or(0, |e| e.original_owner);
                if ejected_owner == cell_owner && speed(ejected) > arena::EJECT_REEAT_SPEED {
                    continue;
                }
                if eats(cell_pos, cell_radius, ejected_pos, ejected_radius) {
                    contacts.push(CellContact::AteEjected { cell, ejected });
                }
            }

            for &virus in &virus_entities {
                let Some((virus_pos, virus_radius)) = circle(virus) else {
                    continue;
                };
                if cell_mass >= arena::VIRUS_SPLIT_MASS
                    && distance(cell_pos, virus_pos) < (cell_radius + virus_radius) * 0.6
                {
                    contacts.push(CellContact::HitVirus { cell, virus });
                }
            }
        }

        // Moving ejected mass feeds viruses.
        for &virus in &virus_entities {
            let Some((virus_pos, virus_radius)) = circle(virus) else {
                continue;
            };
            for &ejected in &ejected_entities {
                let Some((ejected_pos, ejected_radius)) = circle(ejected) else {
                    continue;
                };
                if speed(ejected) < 10.0 {
                    continue;
                }
                if eats(virus_pos, virus_radius, ejected_pos, ejected_radius) {
                    contacts.push(CellContact::FedVirus { virus, ejected });
                }
            }
        }

        // Cell-vs-cell.
        for i in 0..cells.len() {
            let a = cells[i];
            let Some((pos_a, radius_a)) = circle(a) else {
                continue;
            };
            let Some(mass_a) = masses.get(a).map(|m| m.value) else {
                continue;
            };
            let owner_a = owner(a);
            for &b in &cells[i + 1..] {
                let Some((pos_b, radius_b)) = circle(b) else {
                    continue;
                };
                let Some(mass_b) = masses.get(b).map(|m| m.value) else {
                    continue;
                };
                let owner_b = owner(b);
                let dist = distance(pos_a, pos_b);
                let combined = radius_a + radius_b;

                if owner_a == owner_b && owner_a != 0 {
                    let can_merge = |entity: Entity| {
                        merge_timers.get(entity).map_or(true, |t| t.can_merge)
                    };
                    if can_merge(a) && can_merge(b) {
                        if dist < combined * 0.6 {
                            contacts.push(CellContact::Merge { a, b });
                        }
                    } else if dist < combined && dist > 1e-3 {
                        contacts.push(CellContact::Push { a, b });
                    }
                    continue;
                }

                if dist < combined * arena::EAT_OVERLAP_RATIO {
                    if arena::can_eat(mass_a, mass_b) {
                        contacts.push(CellContact::Eat { eater: a, eaten: b });
                    } else if arena::can_eat(mass_b, mass_a) {
                        contacts.push(CellContact::Eat { eater: b, eaten: a });
                    }
                }
            }
        }

        contacts
    }

    fn consume(
        &self,
        registry: &mut Registry,
        eater: Entity,
        prey: Entity,
        reason: DestroyReason,
    ) -> Option<f32> {
        if registry.has_component::<ToDestroy>(prey) || registry.has_component::<ToDestroy>(eater)
        {
            return None;
        }
        let gained = registry.components::<Mass>().get(prey)?.value;
        {
            let mut masses = registry.components_mut::<Mass>();
            masses.get_mut(eater)?.value += gained;
        }
        let killer_id = Self::owner_of(registry, eater);
        registry.add_component(prey, ToDestroy);
        registry.add_component(prey, DestroyInfo { reason, killer_id });
        Some(gained)
    }
}

impl System for CellCollisionSystem {
    fn name(&self) -> &'static str {
        "cell_collision"
    }

    fn update(&mut self, registry: &mut Registry, _dt: f32) {
        let contacts = self.gather(registry);

        for contact in contacts {
            match contact {
                CellContact::AteFood { cell, food } => {
                    let nutrition = registry
                        .components::<Food>()
                        .get(food)
                        .map_or(arena::FOOD_MASS, |f| f.nutrition);
                    if self
                        .consume(registry, cell, food, DestroyReason::Eaten)
                        .is_some()
                    {
                        let eater_player = Self::owner_of(registry, cell);
                        registry.publish(&CellAteFoodEvent {
                            eater: cell,
                            eaten: food,
                            eater_player,
                            mass_gained: nutrition,
                        });
                    }
                }
                CellContact::AteEjected { cell, ejected } => {
                    if let Some(gained) =
                        self.consume(registry, cell, ejected, DestroyReason::Eaten)
                    {
                        let eater_player = Self::owner_of(registry, cell);
                        registry.publish(&CellAteFoodEvent {
                            eater: cell,
                            eaten: ejected,
                            eater_player,
                            mass_gained: gained,
                        });
                    }
                }
                CellContact::HitVirus { cell, virus } => {
                    if registry.has_component::<ToDestroy>(cell)
                        || registry.has_component::<ToDestroy>(virus)
                    {
                        continue;
                    }
                    let player = Self::owner_of(registry, cell);
                    // The session's handler performs the split and decides
                    // whether the virus is consumed.
                    registry.publish(&CellHitVirusEvent {
                        cell,
                        virus,
                        player,
                    });
                }
                CellContact::FedVirus { virus, ejected } => {
                    if registry.has_component::<ToDestroy>(ejected)
                        || registry.has_component::<ToDestroy>(virus)
                    {
                        continue;
                    }
                    let feed_velocity = registry
                        .components::<Velocity>()
                        .get(ejected)
                        .copied()
                        .unwrap_or_default();
                    let (virus_pos, ejected_pos) = {
                        let positions = registry.components::<Position>();
                        (
                            positions.get(virus).copied().unwrap_or_default(),
                            positions.get(ejected).copied().unwrap_or_default(),
                        )
                    };
                    registry.add_component(ejected, ToDestroy);
                    registry.add_component(
                        ejected,
                        DestroyInfo {
                            reason: DestroyReason::Eaten,
                            killer_id: 0,
                        },
                    );

                    let pop = {
                        let mut viruses = registry.components_mut::<Virus>();
                        let Some(virus_state) = viruses.get_mut(virus) else {
                            continue;
                        };
                        virus_state.fed_count += 1;
                        virus_state.absorption_scale = arena::VIRUS_ABSORB_SCALE;
                        virus_state.absorption_timer = arena::VIRUS_ABSORB_TIME;
                        if virus_state.fed_count >= arena::VIRUS_POP_THRESHOLD {
                            virus_state.fed_count = 0;
                            true
                        } else {
                            false
                        }
                    };
                    if pop {
                        // Shoot along the feeding mass's trajectory; fall back
                        // to the virus-to-mass axis, then to +x.
                        let speed = (feed_velocity.x * feed_velocity.x
                            + feed_velocity.y * feed_velocity.y)
                            .sqrt();
                        let (dir_x, dir_y) = if speed > 1e-3 {
                            (feed_velocity.x / speed, feed_velocity.y / speed)
                        } else {
                            let dx = ejected_pos.x - virus_pos.x;
                            let dy = ejected_pos.y - virus_pos.y;
                            let len = (dx * dx + dy * dy).sqrt();
                            if len > 1e-3 {
                                (dx / len, dy / len)
                            } else {
                                (1.0, 0.0)
                            }
                        };
                        spawn_shot_virus(
                            registry,
                            &self.net,
                            &self.ids,
                            virus_pos.x,
                            virus_pos.y,
                            dir_x,
                            dir_y,
                        );
                    }
                }
                CellContact::Merge { a, b } => {
                    if registry.has_component::<ToDestroy>(a)
                        || registry.has_component::<ToDestroy>(b)
                    {
                        continue;
                    }
                    let (mass_a, mass_b) = {
                        let masses = registry.components::<Mass>();
                        match (masses.get(a), masses.get(b)) {
                            (Some(ma), Some(mb)) => (ma.value, mb.value),
                            _ => continue,
                        }
                    };
                    let (survivor, absorbed, absorbed_mass) = if mass_a >= mass_b {
                        (a, b, mass_b)
                    } else {
                        (b, a, mass_a)
                    };
                    let combined = mass_a + mass_b;
                    {
                        let mut masses = registry.components_mut::<Mass>();
                        if let Some(mass) = masses.get_mut(survivor) {
                            mass.value = combined;
                        }
                        let mut colliders = registry.components_mut::<CircleCollider>();
                        if let Some(collider) = colliders.get_mut(survivor) {
                            collider.radius = arena::mass_to_radius(combined);
                        }
                    }
                    let owner = Self::owner_of(registry, survivor);
                    registry.add_component(absorbed, ToDestroy);
                    registry.add_component(
                        absorbed,
                        DestroyInfo {
                            reason: DestroyReason::Merged,
                            killer_id: owner,
                        },
                    );
                    let wire_ids = {
                        let net_ids = registry.components::<crate::components::NetworkId>();
                        (
                            net_ids.get(survivor).map_or(0, |n| n.id),
                            net_ids.get(absorbed).map_or(0, |n| n.id),
                        )
                    };
                    self.net.queue_cell_merge(ServerCellMerge {
                        surviving_id: wire_ids.0,
                        absorbed_id: wire_ids.1,
                        combined_mass: combined,
                    });
                    registry.publish(&CellMergedEvent {
                        survivor,
                        absorbed,
                        owner,
                        combined_mass: combined,
                    });
                    let _ = absorbed_mass;
                }
                CellContact::Push { a, b } => {
                    if registry.has_component::<ToDestroy>(a)
                        || registry.has_component::<ToDestroy>(b)
                    {
                        continue;
                    }
                    let combined = {
                        let colliders = registry.components::<CircleCollider>();
                        match (colliders.get(a), colliders.get(b)) {
                            (Some(ca), Some(cb)) => ca.radius + cb.radius,
                            _ => continue,
                        }
                    };
                    let mut positions = registry.components_mut::<Position>();
                    let (Some(&pos_a), Some(&pos_b)) = (positions.get(a), positions.get(b))
                    else {
                        continue;
                    };
                    let dist = distance(pos_a, pos_b);
                    if dist <= 1e-3 || dist >= combined {
                        continue;
                    }
                    let overlap = combined - dist;
                    let nx = (pos_b.x - pos_a.x) / dist;
                    let ny = (pos_b.y - pos_a.y) / dist;
                    let push = overlap * 0.5;
                    if let Some(pa) = positions.get_mut(a) {
                        pa.x -= nx * push;
                        pa.y -= ny * push;
                    }
                    if let Some(pb) = positions.get_mut(b) {
                        pb.x += nx * push;
                        pb.y += ny * push;
                    }
                }
                CellContact::Eat { eater, eaten } => {
                    let eaten_player = Self::owner_of(registry, eaten);
                    if let Some(gained) = self.consume(registry, eater, eaten, DestroyReason::Eaten)
                    {
                        let eater_player = Self::owner_of(registry, eater);
                        registry.publish(&CellAteCellEvent {
                            eater,
                            eaten,
                            eater_player,
                            eaten_player,
                            mass_gained: gained,
                        });
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
