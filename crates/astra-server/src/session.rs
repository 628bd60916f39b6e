//! A session: one self-contained authoritative world.
//!
//! The session owns its registry (pre-registered with the mode's components
//! and systems in the pipeline order), the wave/level managers (Scroller),
//! the player table, and the [`NetSync`] boundary shared with the network
//! thread. `tick(dt)` runs the fixed pipeline: drain inputs, advance scroll,
//! run systems, mode-specific post passes, snapshot on its own cadence, and
//! finally the destroy sweep.
//!
//! Sessions are `Send` and are ticked by worker threads; nothing in here is
//! touched by two threads at once (see [`crate::pool`]).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::Rng;
use rand_pcg::Pcg64Mcg;
use tracing::{debug, info};

use astra_ecs::prelude::*;
use astra_protocol::packet::{DestroyReason, EntityType};
use astra_protocol::payload::{
    encode_leaderboard, LeaderboardEntry, ServerEntitySpawn, ServerPlayerEaten, ServerPlayerSkin,
};

use crate::components::*;
use crate::config::{self, arena, scroller};
use crate::events::{CellAteCellEvent, CellHitVirusEvent, PlayerEliminatedEvent};
use crate::levels::{LevelSpec, LevelSystem};
use crate::snapshot::build_snapshot;
use crate::spawn;
use crate::sync::{NetIdAlloc, NetSync, PlayerCommand};
use crate::systems::checkpoint::RespawnQueue;
use crate::systems::*;
use crate::waves::WaveManager;

/// Which game a session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Scroller,
    Arena,
}

/// Lobby-side player bookkeeping. The authoritative state lives in the ECS;
/// this only remembers identity for resync and respawn.
#[derive(Debug, Clone)]
pub struct PlayerMeta {
    pub name: String,
    pub skin_id: u8,
    pub color: u32,
}

/// Cell colors handed out to arena players, cycled by player id.
const ARENA_PALETTE: [u32; 8] = [
    0xE74C3CFF, 0x3498DBFF, 0x2ECC71FF, 0xF1C40FFF, 0x9B59B6FF, 0xE67E22FF, 0x1ABC9CFF,
    0xFD79A8FF,
];

/// Records of who ate whom this tick, fed by the collision pass and drained
/// by the elimination check.
type EatLog = Arc<Mutex<Vec<CellAteCellEvent>>>;

pub struct Session {
    id: u32,
    mode: GameMode,
    registry: Registry,
    net: NetSync,
    ids: NetIdAlloc,
    players: HashMap<u32, PlayerMeta>,
    wave_manager: Option<Arc<Mutex<WaveManager>>>,
    destroy_system: DestroySystem,
    eat_log: EatLog,
    rng: Pcg64Mcg,
    tick_count: u64,
    snapshot_timer: f32,
    leaderboard_timer: f32,
    active: bool,
}

impl Session {
    // -- construction -------------------------------------------------------

    /// Build a Scroller session over the given map, with optional multi-level
    /// progression.
    pub fn scroller(id: u32, wave_manager: WaveManager, levels: Vec<LevelSpec>) -> Self {
        use rand::SeedableRng;
        let net = NetSync::new();
        let ids = NetIdAlloc::new();
        let mut registry = Registry::new();
        Self::register_components(&mut registry);

        // Singletons.
        let scroll_speed = wave_manager.scroll_speed();
        let checkpoints: Vec<Checkpoint> = std::iter::once(0.0)
            .chain(wave_manager.checkpoints().iter().copied())
            .map(|distance| Checkpoint {
                scroll_distance: distance,
                spawn_x: scroller::PLAYER_SPAWN_X,
                spawn_y: scroller::PLAYER_SPAWN_Y_BASE,
            })
            .collect();
        let singleton = registry.spawn_entity();
        registry.add_component(
            singleton,
            ScrollState {
                current_scroll: 0.0,
                scroll_speed,
            },
        );
        registry.add_component(singleton, GameStatus::default());
        registry.add_component(
            singleton,
            CheckpointManager {
                checkpoints,
                active_index: 0,
            },
        );
        registry.add_component(singleton, RespawnQueue::default());

        let wave_manager = Arc::new(Mutex::new(wave_manager));
        let seed = id as u64;

        // The pipeline, in contract order. Enemy steering runs between the
        // player movement pass and integration so both factions' velocities
        // are fresh when positions advance.
        registry.register_system(PlayerInputSystem);
        registry.register_system(MovementSystem);
        registry.register_system(AiSystem);
        registry.register_system(PhysiqueSystem);
        registry.register_system(CollisionSystem);
        registry.register_system(MapBoundsSystem::new(
            scroller::VIEW_WIDTH,
            scroller::VIEW_HEIGHT,
        ));
        registry.register_system(HealthSystem::new(net.clone(), seed));
        registry.register_system(crate::waves::WaveSystem::new(
            Arc::clone(&wave_manager),
            net.clone(),
        ));
        if !levels.is_empty() {
            registry.register_system(LevelSystem::new(
                levels,
                Arc::clone(&wave_manager),
                net.clone(),
            ));
        }
        registry.register_system(BossSystem::new(net.clone(), seed));
        registry.register_system(CheckpointSystem::new(net.clone()));
        registry.register_system(ShootingSystem::new(net.clone()));
        registry.register_system(ScoreSystem::new(net.clone()));
        registry.register_system(BonusSystem::new(net.clone()));
        registry.register_system(LevelUpSystem::new(net.clone()));

        info!(session = id, "scroller session created");
        Self {
            id,
            mode: GameMode::Scroller,
            registry,
            net: net.clone(),
            ids,
            players: HashMap::new(),
            wave_manager: Some(wave_manager),
            destroy_system: DestroySystem::new(net),
            eat_log: EatLog::default(),
            rng: Pcg64Mcg::seed_from_u64(seed),
            tick_count: 0,
            snapshot_timer: 0.0,
            leaderboard_timer: 0.0,
            active: true,
        }
    }

    /// Build an Arena session.
    pub fn arena(id: u32) -> Self {
        use rand::SeedableRng;
        let net = NetSync::new();
        let ids = NetIdAlloc::new();
        let mut registry = Registry::new();
        Self::register_components(&mut registry);

        let seed = id as u64;
        let eat_log = EatLog::default();

        // Session-level reactions to collision events.
        Self::subscribe_virus_splits(&registry, net.clone(), ids.clone());
        {
            let log = Arc::clone(&eat_log);
            registry
                .event_bus()
                .subscribe::<CellAteCellEvent, _>(move |_registry, event| {
                    log.lock().unwrap().push(*event);
                });
        }

        // Pipeline order: steering, integration, mass, merge cooldowns,
        // collision, bounds, hazards, food.
        registry.register_system(MovementTargetSystem);
        registry.register_system(PhysiqueSystem);
        registry.register_system(MassSystem);
        registry.register_system(MergeTimerSystem);
        registry.register_system(CellCollisionSystem::new(net.clone(), ids.clone()));
        registry.register_system(MapBoundsSystem::new(arena::MAP_WIDTH, arena::MAP_HEIGHT));
        registry.register_system(VirusSystem::new(net.clone(), ids.clone(), seed));
        registry.register_system(FoodSpawnerSystem::new(net.clone(), ids.clone(), seed));

        info!(session = id, "arena session created");
        Self {
            id,
            mode: GameMode::Arena,
            registry,
            net: net.clone(),
            ids,
            players: HashMap::new(),
            wave_manager: None,
            destroy_system: DestroySystem::new(net),
            eat_log,
            rng: Pcg64Mcg::seed_from_u64(seed ^ 0x9E3779B97F4A7C15),
            tick_count: 0,
            snapshot_timer: 0.0,
            leaderboard_timer: 0.0,
            active: true,
        }
    }

    /// Register the full component set. Both modes carry the union: the
    /// snapshot builder probes every tag storage, and an unregistered type
    /// would turn a probe into a panic.
    fn register_components(registry: &mut Registry) {
        // Core.
        registry.register_component::<Position>();
        registry.register_component::<Velocity>();
        registry.register_component::<Collider>();
        registry.register_component::<CircleCollider>();
        registry.register_component::<Controllable>();
        registry.register_component::<NoFriction>();
        registry.register_component::<ToDestroy>();
        registry.register_component::<DestroyInfo>();
        registry.register_component::<Player>();
        registry.register_component::<NetworkId>();
        registry.register_component::<Health>();
        registry.register_component::<Damage>();
        registry.register_component::<Score>();
        registry.register_component::<Invulnerability>();
        // Scroller.
        registry.register_component::<Projectile>();
        registry.register_component::<FiredBy>();
        registry.register_component::<Weapon>();
        registry.register_component::<LaserBeam>();
        registry.register_component::<Enemy>();
        registry.register_component::<Ai>();
        registry.register_component::<Wall>();
        registry.register_component::<Bonus>();
        registry.register_component::<Shield>();
        registry.register_component::<SpeedBoost>();
        registry.register_component::<PlayerLevel>();
        registry.register_component::<PlayerLives>();
        registry.register_component::<InputState>();
        registry.register_component::<BossPhase>();
        registry.register_component::<ScrollState>();
        registry.register_component::<GameStatus>();
        registry.register_component::<CheckpointManager>();
        registry.register_component::<RespawnQueue>();
        // Arena.
        registry.register_component::<Mass>();
        registry.register_component::<PlayerCell>();
        registry.register_component::<CellOwner>();
        registry.register_component::<Food>();
        registry.register_component::<Virus>();
        registry.register_component::<EjectedMass>();
        registry.register_component::<MovementTarget>();
        registry.register_component::<MergeTimer>();
        registry.register_component::<SplitVelocity>();
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn net(&self) -> NetSync {
        self.net.clone()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, player_id: u32) -> bool {
        self.players.contains_key(&player_id)
    }

    /// Resolve a player's avatar entity (Scroller). O(players).
    pub fn player_entity(&self, player_id: u32) -> Option<Entity> {
        self.registry
            .components::<Player>()
            .iter()
            .find(|(_, p)| p.player_id == player_id)
            .map(|(entity, _)| entity)
    }

    /// All live cells owned by a player (Arena).
    pub fn player_cells(&self, player_id: u32) -> Vec<Entity> {
        let doomed = self.registry.components::<ToDestroy>();
        self.registry
            .components::<CellOwner>()
            .iter()
            .filter(|(entity, owner)| owner.owner_id == player_id && !doomed.contains(*entity))
            .map(|(entity, _)| entity)
            .collect()
    }

    // -- player lifecycle ---------------------------------------------------

    /// Add a player. Scroller spawns the ship at the staggered spawn column;
    /// Arena drops a starting cell at a random spot.
    pub fn add_player(&mut self, player_id: u32, name: &str, skin_id: u8) {
        if self.players.contains_key(&player_id) {
            debug!(session = self.id, player = player_id, "player already in session");
            return;
        }
        let color = ARENA_PALETTE[player_id as usize % ARENA_PALETTE.len()];
        self.players.insert(
            player_id,
            PlayerMeta {
                name: name.to_owned(),
                skin_id,
                color,
            },
        );

        match self.mode {
            GameMode::Scroller => {
                let index = self.players.len() - 1;
                let x = scroller::PLAYER_SPAWN_X;
                let y = scroller::PLAYER_SPAWN_Y_BASE
                    + index as f32 * scroller::PLAYER_SPAWN_Y_OFFSET;
                self.spawn_player_ship(player_id, name, skin_id, x, y);
            }
            GameMode::Arena => {
                let x = self.rng.gen_range(arena::MAP_WIDTH * 0.2..arena::MAP_WIDTH * 0.8);
                let y = self.rng.gen_range(arena::MAP_HEIGHT * 0.2..arena::MAP_HEIGHT * 0.8);
                spawn::spawn_player_cell(
                    &mut self.registry,
                    &self.net,
                    &self.ids,
                    player_id,
                    name,
                    color,
                    x,
                    y,
                    arena::STARTING_MASS,
                );
            }
        }
        info!(session = self.id, player = player_id, name, "player added");
    }

    fn spawn_player_ship(&mut self, player_id: u32, name: &str, skin_id: u8, x: f32, y: f32) {
        let registry = &mut self.registry;
        let entity = registry.spawn_entity();
        registry.add_component(entity, Position { x, y });
        registry.add_component(entity, Velocity::default());
        registry.add_component(entity, Health::full(scroller::PLAYER_MAX_HEALTH));
        registry.add_component(
            entity,
            Controllable {
                speed: scroller::PLAYER_MOVEMENT_SPEED,
            },
        );
        registry.add_component(
            entity,
            Collider {
                width: scroller::HITBOX_SMALL,
                height: scroller::HITBOX_SMALL,
            },
        );
        registry.add_component(
            entity,
            Invulnerability {
                time_remaining: scroller::INVULNERABILITY_TIME,
            },
        );
        registry.add_component(entity, Score::default());
        registry.add_component(entity, Weapon::new(WeaponKind::Basic));
        registry.add_component(entity, PlayerLevel::new(skin_id / 5));
        registry.add_component(entity, InputState::default());
        registry.add_component(
            entity,
            PlayerLives {
                lives_remaining: scroller::PLAYER_LIVES,
                respawn_pending: false,
                respawn_timer: 0.0,
            },
        );
        registry.add_component(
            entity,
            Player {
                player_id,
                name: name.to_owned(),
                skin_id,
            },
        );
        registry.add_component(entity, NetworkId { id: entity.id() });

        self.net.queue_entity_spawn(ServerEntitySpawn {
            entity_id: entity.id(),
            entity_type: EntityType::Player,
            spawn_x: x,
            spawn_y: y,
            stat: scroller::PLAYER_MAX_HEALTH as f32,
            color: skin_id as u32,
            owner_id: player_id,
            owner_tag: [0; 4],
        });
    }

    /// Remove a player and doom their entities; the destroy sweep announces
    /// the removals next tick.
    pub fn remove_player(&mut self, player_id: u32) {
        if self.players.remove(&player_id).is_none() {
            return;
        }
        match self.mode {
            GameMode::Scroller => {
                if let Some(entity) = self.player_entity(player_id) {
                    self.registry.add_component(entity, ToDestroy);
                }
            }
            GameMode::Arena => {
                for cell in self.player_cells(player_id) {
                    self.registry.add_component(cell, ToDestroy);
                }
            }
        }
        info!(session = self.id, player = player_id, "player removed");
    }

    /// Queue an input for the next tick (called from the network thread).
    pub fn handle_input(&self, player_id: u32, command: PlayerCommand) {
        self.net.queue_input(player_id, command);
    }

    // -- tick ---------------------------------------------------------------

    /// Advance the session by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        self.tick_count += 1;

        self.apply_inputs();

        if self.mode == GameMode::Scroller {
            let mut scrolls = self.registry.components_mut::<ScrollState>();
            let entry = scrolls.iter_mut().next();
            if let Some((_, scroll)) = entry {
                scroll.current_scroll += scroll.scroll_speed * dt;
            }
        }

        self.registry.run_systems(dt);

        match self.mode {
            GameMode::Scroller => {
                self.reap_offscreen();
                self.check_game_end();
            }
            GameMode::Arena => {
                self.check_eliminations();
                self.leaderboard_timer += dt;
                if self.leaderboard_timer >= config::LEADERBOARD_INTERVAL {
                    self.leaderboard_timer = 0.0;
                    self.net.queue_leaderboard(encode_leaderboard(&self.leaderboard()));
                }
            }
        }

        // The tolerance absorbs the binary rounding of the interval, so a
        // cadence that divides the tick rate emits on the exact tick.
        self.snapshot_timer += dt;
        if self.snapshot_timer + 1e-6 >= config::SNAPSHOT_INTERVAL {
            self.snapshot_timer -= config::SNAPSHOT_INTERVAL;
            let snapshot = build_snapshot(&self.registry, self.tick_count as u32);
            self.net.queue_snapshot(snapshot);
        }

        self.destroy_system.update(&mut self.registry, dt);
    }

    fn apply_inputs(&mut self) {
        let (inputs, dropped) = self.net.drain_inputs(config::INPUT_TTL);
        if dropped > 0 {
            debug!(session = self.id, dropped, "dropped stale inputs");
        }
        for input in inputs {
            if !self.players.contains_key(&input.player_id) {
                debug!(
                    session = self.id,
                    player = input.player_id,
                    "input for unknown player dropped"
                );
                continue;
            }
            match (self.mode, input.command) {
                (GameMode::Scroller, PlayerCommand::Move(packet)) => {
                    let Some(entity) = self.player_entity(input.player_id) else {
                        continue;
                    };
                    let flags = packet.flags();
                    use astra_protocol::packet::input_flags as f;
                    let mut dir_x = 0.0;
                    let mut dir_y = 0.0;
                    if flags & f::UP != 0 {
                        dir_y -= 1.0;
                    }
                    if flags & f::DOWN != 0 {
                        dir_y += 1.0;
                    }
                    if flags & f::LEFT != 0 {
                        dir_x -= 1.0;
                    }
                    if flags & f::RIGHT != 0 {
                        dir_x += 1.0;
                    }
                    let mut states = self.registry.components_mut::<InputState>();
                    if let Some(state) = states.get_mut(entity) {
                        state.dir_x = dir_x;
                        state.dir_y = dir_y;
                        state.fire_pressed |= flags & f::FIRE != 0;
                        state.fire_released |= flags & f::FIRE_RELEASE != 0;
                    }
                }
                (GameMode::Arena, PlayerCommand::Move(packet)) => {
                    let cells = self.player_cells(input.player_id);
                    let mut targets = self.registry.components_mut::<MovementTarget>();
                    for cell in cells {
                        if let Some(target) = targets.get_mut(cell) {
                            target.x = packet.target_x;
                            target.y = packet.target_y;
                        }
                    }
                }
                (GameMode::Arena, PlayerCommand::Split) => {
                    self.player_split(input.player_id);
                }
                (GameMode::Arena, PlayerCommand::EjectMass { dir_x, dir_y }) => {
                    self.player_eject_mass(input.player_id, dir_x, dir_y);
                }
                (_, PlayerCommand::SetSkin(skin_id)) => {
                    if let Some(meta) = self.players.get_mut(&input.player_id) {
                        meta.skin_id = skin_id;
                    }
                    self.net.queue_player_skin(ServerPlayerSkin {
                        player_id: input.player_id,
                        skin_id,
                    });
                }
                _ => {}
            }
        }
    }

    // -- Arena: split and eject ---------------------------------------------

    /// Split every eligible cell toward its movement target.
    pub fn player_split(&mut self, player_id: u32) {
        let Some(meta) = self.players.get(&player_id).cloned() else {
            return;
        };
        let cells = self.player_cells(player_id);
        let eligible: Vec<Entity> = {
            let masses = self.registry.components::<Mass>();
            cells
                .iter()
                .copied()
                .filter(|&cell| {
                    masses
                        .get(cell)
                        .is_some_and(|m| m.value >= arena::MIN_SPLIT_MASS)
                })
                .collect()
        };

        let mut budget = arena::MAX_CELLS_PER_PLAYER.saturating_sub(cells.len());
        for cell in eligible {
            if budget == 0 {
                break;
            }
            budget -= 1;

            let (new_mass, origin, target) = {
                let mut masses = self.registry.components_mut::<Mass>();
                let positions = self.registry.components::<Position>();
                let targets = self.registry.components::<MovementTarget>();
                let Some(mass) = masses.get_mut(cell) else {
                    continue;
                };
                let Some(&origin) = positions.get(cell) else {
                    continue;
                };
                let new_mass = mass.value * arena::SPLIT_LOSS_FACTOR;
                mass.value = new_mass;
                let target = targets
                    .get(cell)
                    .copied()
                    .unwrap_or(MovementTarget { x: origin.x, y: origin.y });
                (new_mass, origin, target)
            };

            let dx = target.x - origin.x;
            let dy = target.y - origin.y;
            let len = (dx * dx + dy * dy).sqrt();
            let (dir_x, dir_y) = if len > 1e-3 {
                (dx / len, dy / len)
            } else {
                (1.0, 0.0)
            };

            let radius = arena::mass_to_radius(new_mass);
            let new_cell = spawn::spawn_player_cell(
                &mut self.registry,
                &self.net,
                &self.ids,
                player_id,
                &meta.name,
                meta.color,
                origin.x + dir_x * radius * 2.0,
                origin.y + dir_y * radius * 2.0,
                new_mass,
            );
            self.registry.add_component(
                new_cell,
                MovementTarget {
                    x: target.x,
                    y: target.y,
                },
            );
            self.registry.add_component(
                new_cell,
                SplitVelocity {
                    vx: dir_x * arena::SPLIT_SPEED_BOOST,
                    vy: dir_y * arena::SPLIT_SPEED_BOOST,
                    decay_rate: arena::SPLIT_DECAY_RATE,
                },
            );
            let merge_time = arena::merge_time_for_mass(new_mass);
            for entity in [cell, new_cell] {
                self.registry.add_component(
                    entity,
                    MergeTimer {
                        time_remaining: merge_time,
                        can_merge: false,
                    },
                );
            }
        }
    }

    /// Eject a blob of mass from every cell heavy enough.
    pub fn player_eject_mass(&mut self, player_id: u32, dir_x: f32, dir_y: f32) {
        let Some(meta) = self.players.get(&player_id).cloned() else {
            return;
        };
        let len = (dir_x * dir_x + dir_y * dir_y).sqrt();
        let (dir_x, dir_y) = if len > 1e-3 {
            (dir_x / len, dir_y / len)
        } else {
            (1.0, 0.0)
        };

        for cell in self.player_cells(player_id) {
            let origin = {
                let mut masses = self.registry.components_mut::<Mass>();
                let positions = self.registry.components::<Position>();
                let Some(mass) = masses.get_mut(cell) else {
                    continue;
                };
                if mass.value < arena::MIN_EJECT_MASS {
                    continue;
                }
                mass.value -= arena::EJECT_MASS_COST;
                let Some(&pos) = positions.get(cell) else {
                    continue;
                };
                let radius = arena::mass_to_radius(mass.value);
                Position {
                    x: pos.x + dir_x * (radius + 20.0),
                    y: pos.y + dir_y * (radius + 20.0),
                }
            };
            spawn::spawn_ejected_mass(
                &mut self.registry,
                &self.net,
                &self.ids,
                player_id,
                meta.color,
                origin.x,
                origin.y,
                dir_x,
                dir_y,
            );
        }
    }

    /// Burst a cell that ran into a virus into several pieces, then consume
    /// the virus. Registered as a bus subscriber at construction.
    fn subscribe_virus_splits(registry: &Registry, net: NetSync, ids: NetIdAlloc) {
        registry
            .event_bus()
            .subscribe::<CellHitVirusEvent, _>(move |registry, event| {
                let owner = event.player;
                let cell_count = {
                    let owners = registry.components::<CellOwner>();
                    let doomed = registry.components::<ToDestroy>();
                    owners
                        .iter()
                        .filter(|(e, o)| o.owner_id == owner && !doomed.contains(*e))
                        .count()
                };
                let split_count = (arena::VIRUS_SPLIT_COUNT - 1)
                    .min(arena::MAX_CELLS_PER_PLAYER.saturating_sub(cell_count));
                if split_count == 0 {
                    // No room to split: the virus survives the contact.
                    return;
                }

                let (piece_mass, origin, name, color) = {
                    let mut masses = registry.components_mut::<Mass>();
                    let positions = registry.components::<Position>();
                    let cells = registry.components::<PlayerCell>();
                    let Some(mass) = masses.get_mut(event.cell) else {
                        return;
                    };
                    let Some(&origin) = positions.get(event.cell) else {
                        return;
                    };
                    let Some(cell_info) = cells.get(event.cell) else {
                        return;
                    };
                    let piece_mass =
                        (mass.value / (split_count + 1) as f32).max(arena::MIN_MASS);
                    mass.value = piece_mass;
                    (piece_mass, origin, cell_info.name.clone(), cell_info.color)
                };

                let merge_time = arena::merge_time_for_mass(piece_mass);
                registry.add_component(
                    event.cell,
                    MergeTimer {
                        time_remaining: merge_time,
                        can_merge: false,
                    },
                );

                for i in 0..split_count {
                    let angle = std::f32::consts::TAU * i as f32 / split_count as f32;
                    let (dir_x, dir_y) = (angle.cos(), angle.sin());
                    let radius = arena::mass_to_radius(piece_mass);
                    let piece = spawn::spawn_player_cell(
                        registry,
                        &net,
                        &ids,
                        owner,
                        &name,
                        color,
                        origin.x + dir_x * radius * 1.5,
                        origin.y + dir_y * radius * 1.5,
                        piece_mass,
                    );
                    registry.add_component(
                        piece,
                        SplitVelocity {
                            vx: dir_x * arena::SPLIT_SPEED_BOOST,
                            vy: dir_y * arena::SPLIT_SPEED_BOOST,
                            decay_rate: arena::SPLIT_DECAY_RATE,
                        },
                    );
                    registry.add_component(
                        piece,
                        MergeTimer {
                            time_remaining: merge_time,
                            can_merge: false,
                        },
                    );
                }

                // The split succeeded; the virus is consumed.
                registry.add_component(event.virus, ToDestroy);
                registry.add_component(
                    event.virus,
                    DestroyInfo {
                        reason: DestroyReason::Eaten,
                        killer_id: owner,
                    },
                );
            });
    }

    // -- post passes --------------------------------------------------------

    /// Doom every non-player entity that scrolled past the left reap line.
    fn reap_offscreen(&mut self) {
        let victims: Vec<Entity> = {
            let positions = self.registry.components::<Position>();
            let players = self.registry.components::<Player>();
            let scroll_states = self.registry.components::<ScrollState>();
            positions
                .iter()
                .filter(|(entity, pos)| {
                    !players.contains(*entity)
                        && !scroll_states.contains(*entity)
                        && pos.x < scroller::OFFSCREEN_LEFT
                })
                .map(|(entity, _)| entity)
                .collect()
        };
        for victim in victims {
            self.registry.add_component(victim, ToDestroy);
            self.registry.add_component(
                victim,
                DestroyInfo {
                    reason: DestroyReason::OutOfBounds,
                    killer_id: 0,
                },
            );
        }
    }

    /// Stop the session once the status singleton reports an ending.
    fn check_game_end(&mut self) {
        let status = self
            .registry
            .components::<GameStatus>()
            .iter()
            .next()
            .map(|(_, s)| *s);
        if let Some(status) = status {
            if status.game_over || status.victory {
                if self.active {
                    info!(
                        session = self.id,
                        victory = status.victory,
                        "session finished"
                    );
                }
                self.active = false;
            }
        }
    }

    /// A player whose last cell died this tick is eliminated.
    fn check_eliminations(&mut self) {
        let eats: Vec<CellAteCellEvent> = self.eat_log.lock().unwrap().drain(..).collect();
        if eats.is_empty() {
            return;
        }
        let mut eliminated = Vec::new();
        for eat in &eats {
            if eat.eaten_player == 0 {
                continue;
            }
            if self.players.contains_key(&eat.eaten_player)
                && self.player_cells(eat.eaten_player).is_empty()
            {
                eliminated.push((eat.eaten_player, eat.eater_player, eat.mass_gained));
            }
        }
        for (player_id, killer_id, final_mass) in eliminated {
            info!(
                session = self.id,
                player = player_id,
                killer = killer_id,
                "player eliminated"
            );
            self.net.queue_player_eaten(ServerPlayerEaten {
                player_id,
                killer_id,
                final_mass,
            });
            self.registry.publish(&PlayerEliminatedEvent {
                player_id,
                killer_id,
                final_mass,
            });
            self.players.remove(&player_id);
        }
    }

    /// Top players by total mass (Arena).
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut totals: HashMap<u32, f32> = HashMap::new();
        {
            let owners = self.registry.components::<CellOwner>();
            let masses = self.registry.components::<Mass>();
            for (entity, owner) in owners.iter() {
                if let Some(mass) = masses.get(entity) {
                    *totals.entry(owner.owner_id).or_default() += mass.value;
                }
            }
        }
        let mut entries: Vec<LeaderboardEntry> = totals
            .into_iter()
            .filter_map(|(player_id, total)| {
                self.players
                    .get(&player_id)
                    .map(|meta| LeaderboardEntry::new(player_id, &meta.name, total))
            })
            .collect();
        entries.sort_by(|a, b| b.total_mass.partial_cmp(&a.total_mass).unwrap());
        entries.truncate(10);
        entries
    }

    // -- resync -------------------------------------------------------------

    /// Re-emit spawn payloads for every live entity so a rejoining client can
    /// rebuild its world: players first, then enemies, then projectiles
    /// (Scroller) or cells, viruses, ejected mass (Arena), plus the last
    /// wave payloads.
    pub fn resync_client(&mut self, player_id: u32, client_id: u32) {
        debug!(
            session = self.id,
            player = player_id,
            client = client_id,
            "resyncing client"
        );
        match self.mode {
            GameMode::Scroller => self.resync_scroller(),
            GameMode::Arena => self.resync_arena(),
        }
    }

    fn queue_respawn_payload(
        &self,
        entity: Entity,
        entity_type: EntityType,
        stat: f32,
        color: u32,
        owner_id: u32,
    ) {
        let Some(&position) = self.registry.components::<Position>().get(entity) else {
            return;
        };
        let Some(net_id) = self.registry.components::<NetworkId>().get(entity).map(|n| n.id)
        else {
            return;
        };
        self.net.queue_entity_spawn(ServerEntitySpawn {
            entity_id: net_id,
            entity_type,
            spawn_x: position.x,
            spawn_y: position.y,
            stat,
            color,
            owner_id,
            owner_tag: [0; 4],
        });
    }

    fn resync_scroller(&mut self) {
        // Players.
        let players: Vec<(Entity, u32, u8)> = self
            .registry
            .components::<Player>()
            .iter()
            .map(|(entity, p)| (entity, p.player_id, p.skin_id))
            .collect();
        for (entity, player_id, skin_id) in players {
            let health = self
                .registry
                .components::<Health>()
                .get(entity)
                .map_or(0.0, |h| h.current as f32);
            self.queue_respawn_payload(
                entity,
                EntityType::Player,
                health,
                skin_id as u32,
                player_id,
            );
        }
        // Enemies.
        let enemies: Vec<(Entity, EnemyKind)> = self
            .registry
            .components::<Enemy>()
            .iter()
            .map(|(entity, e)| (entity, e.kind))
            .collect();
        for (entity, kind) in enemies {
            let health = self
                .registry
                .components::<Health>()
                .get(entity)
                .map_or(0.0, |h| h.current as f32);
            self.queue_respawn_payload(entity, spawn::enemy_entity_type(kind), health, 0, 0);
        }
        // Projectiles.
        let projectiles: Vec<(Entity, Faction)> = self
            .registry
            .components::<Projectile>()
            .iter()
            .map(|(entity, p)| (entity, p.faction))
            .collect();
        for (entity, faction) in projectiles {
            let entity_type = match faction {
                Faction::Player => EntityType::ProjectilePlayer,
                Faction::Enemy => EntityType::ProjectileEnemy,
            };
            self.queue_respawn_payload(entity, entity_type, 0.0, 0, 0);
        }
        // Wave context.
        if let Some(manager) = &self.wave_manager {
            let (start, complete) = manager.lock().unwrap().last_payloads();
            if let Some(start) = start {
                self.net.queue_wave_start(start);
            }
            if let Some(complete) = complete {
                self.net.queue_wave_complete(complete);
            }
        }
    }

    fn resync_arena(&mut self) {
        let cells: Vec<(Entity, u32, u32)> = self
            .registry
            .components::<PlayerCell>()
            .iter()
            .map(|(entity, c)| (entity, c.player_id, c.color))
            .collect();
        for (entity, owner, color) in cells {
            let mass = self
                .registry
                .components::<Mass>()
                .get(entity)
                .map_or(0.0, |m| m.value);
            self.queue_respawn_payload(entity, EntityType::PlayerCell, mass, color, owner);
        }
        let viruses: Vec<Entity> = self.registry.components::<Virus>().entities();
        for entity in viruses {
            self.queue_respawn_payload(entity, EntityType::Virus, arena::VIRUS_MASS, 0, 0);
        }
        let ejected: Vec<(Entity, u32)> = self
            .registry
            .components::<EjectedMass>()
            .iter()
            .map(|(entity, e)| (entity, e.original_owner))
            .collect();
        for (entity, owner) in ejected {
            self.queue_respawn_payload(
                entity,
                EntityType::EjectedMass,
                arena::EJECT_MASS_VALUE,
                0,
                owner,
            );
        }
    }
}
