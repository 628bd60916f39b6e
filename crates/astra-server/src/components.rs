//! Game components for both modes.
//!
//! Components are plain data. Scroller-specific and Arena-specific types live
//! side by side; a session only registers the set its mode uses, plus the
//! shared core (Position, Velocity, Health, ToDestroy, ...).

use astra_ecs::prelude::Entity;
use astra_protocol::packet::DestroyReason;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Core: movement and physics
// ---------------------------------------------------------------------------

/// World-space position in units. For AABB colliders this anchors the
/// top-left corner; circle colliders are centered on it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Velocity in world-units/sec.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned box collider, anchored at the entity's position (top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub width: f32,
    pub height: f32,
}

/// Circle collider centered on the entity's position (Arena mode).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleCollider {
    pub radius: f32,
}

/// Player-steerable movement at a fixed speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Controllable {
    pub speed: f32,
}

/// Exempt from the generic friction pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NoFriction;

/// Destruction sentinel: tagged entities are removed by the destroy sweep at
/// the end of the tick, before the next snapshot is serialized.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ToDestroy;

/// Optional companion to [`ToDestroy`]: why the entity is going away and who
/// gets credit. The destroy sweep reads this when emitting the destroy
/// payload; absent means `Killed` by nobody.
#[derive(Debug, Clone, Copy)]
pub struct DestroyInfo {
    pub reason: DestroyReason,
    pub killer_id: u32,
}

// ---------------------------------------------------------------------------
// Core: identity and stats
// ---------------------------------------------------------------------------

/// Marks a player avatar and carries its lobby identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: u32,
    pub name: String,
    pub skin_id: u8,
}

/// Stable id used on the wire for this entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkId {
    pub id: u32,
}

/// Hit points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }
}

/// Damage dealt by a projectile on a successful hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Damage {
    pub amount: i32,
}

/// Accumulated score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Score {
    pub value: u32,
}

/// Damage immunity window, ticked down by the collision system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Invulnerability {
    pub time_remaining: f32,
}

// ---------------------------------------------------------------------------
// Scroller: combat
// ---------------------------------------------------------------------------

/// Which side fired a projectile; picks the collision pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    Player,
    Enemy,
}

/// A projectile in flight. Ages each tick; exceeding `lifetime` marks it
/// [`ToDestroy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub angle_deg: f32,
    pub lifetime: f32,
    pub time_alive: f32,
    pub faction: Faction,
}

/// Relation back to the entity that fired a projectile, for kill credit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiredBy {
    pub shooter: Entity,
}

/// Weapon kinds, one per player level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponKind {
    Basic,
    Spread,
    Burst,
    Laser,
    Charge,
}

/// A weapon and its fire-control state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub kind: WeaponKind,
    pub time_since_last_fire: f32,
    pub trigger_held: bool,
    /// BURST: shots already fired in the current burst.
    pub burst_count: u32,
    /// CHARGE: whether a charge is building.
    pub is_charging: bool,
    /// CHARGE: seconds the trigger has been held.
    pub charge_duration: f32,
}

impl Weapon {
    pub fn new(kind: WeaponKind) -> Self {
        Self {
            kind,
            time_since_last_fire: f32::MAX,
            trigger_held: false,
            burst_count: 0,
            is_charging: false,
            charge_duration: 0.0,
        }
    }
}

/// A live laser beam attached to a shooter; length is recomputed by raycast
/// each tick while the trigger is held.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaserBeam {
    pub shooter: Entity,
    pub length: f32,
    pub range: f32,
}

// ---------------------------------------------------------------------------
// Scroller: enemies, walls, bonuses
// ---------------------------------------------------------------------------

/// Enemy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyKind {
    Basic,
    Fast,
    Tank,
    Boss,
}

/// Marks an enemy and carries its scoring value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub kind: EnemyKind,
    pub score_value: u32,
}

/// Enemy steering profile. The behavior switches on the enemy kind: Basic
/// weaves on a sine track, Fast seeks players inside `detection_range`,
/// Tank holds a steady line. Bosses are driven by the boss system instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ai {
    pub detection_range: f32,
    pub move_speed: f32,
}

/// Static obstacle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Wall;

/// Pickup kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BonusKind {
    Health,
    Shield,
    Speed,
}

/// A floating pickup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bonus {
    pub kind: BonusKind,
    pub radius: f32,
}

/// One-hit shield from the shield bonus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shield {
    pub active: bool,
}

/// Temporary speed multiplier from the speed bonus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBoost {
    pub time_remaining: f32,
    pub multiplier: f32,
    pub original_speed: f32,
}

// ---------------------------------------------------------------------------
// Scroller: progression
// ---------------------------------------------------------------------------

/// Per-player level progression. Level 1..=5; the ship class, weapon, and
/// hitbox all follow the level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerLevel {
    pub current_level: u8,
    pub color_id: u8,
    pub level_up_pending: bool,
    pub level_up_timer: f32,
}

impl PlayerLevel {
    pub fn new(color_id: u8) -> Self {
        Self {
            current_level: 1,
            color_id,
            level_up_pending: false,
            level_up_timer: 0.0,
        }
    }

    /// skin_id encodes color and ship class: `color * 5 + (level - 1)`.
    pub fn skin_id(&self) -> u8 {
        self.color_id * 5 + (self.current_level - 1)
    }
}

/// Remaining lives and pending-respawn state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerLives {
    pub lives_remaining: u8,
    pub respawn_pending: bool,
    pub respawn_timer: f32,
}

/// Scroller input state, written by the session from drained input packets
/// and consumed by the input system.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputState {
    pub dir_x: f32,
    pub dir_y: f32,
    pub fire_pressed: bool,
    pub fire_released: bool,
}

// ---------------------------------------------------------------------------
// Scroller: bosses
// ---------------------------------------------------------------------------

/// Boss attack patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossAttack {
    Spray360,
    AimedBurst,
    Spiral,
    LaserSweep,
    AimedTriple,
    RandomBarrage,
}

/// Boss movement patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossMovement {
    Sine,
    FigureEight,
    Chase,
}

/// Parameters for one boss attack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BossAttackConfig {
    pub attack: BossAttack,
    pub projectile_count: u32,
    pub projectile_speed: f32,
    pub damage: i32,
    pub interval: f32,
}

/// Per-boss phase state. Phases advance at 66% and 33% health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossPhase {
    pub current_phase: u8,
    pub phase_timer: f32,
    pub attack_cooldown: f32,
    pub attacks: [BossAttackConfig; 3],
    pub movements: [BossMovement; 3],
    pub anchor_x: f32,
    pub anchor_y: f32,
}

// ---------------------------------------------------------------------------
// Scroller: singletons
// ---------------------------------------------------------------------------

/// Singleton component tracking the session's scroll state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollState {
    pub current_scroll: f32,
    pub scroll_speed: f32,
}

/// Singleton component: overall game status, written by the checkpoint and
/// level systems, read by the session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GameStatus {
    pub game_over: bool,
    pub victory: bool,
}

/// A scroll-distance marker where dead players respawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub scroll_distance: f32,
    pub spawn_x: f32,
    pub spawn_y: f32,
}

/// Singleton component: the ordered checkpoint list plus the active index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointManager {
    pub checkpoints: Vec<Checkpoint>,
    pub active_index: usize,
}

// ---------------------------------------------------------------------------
// Arena: cells and hazards
// ---------------------------------------------------------------------------

/// Cell mass. Radius and speed derive from it (see [`crate::config::arena`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mass {
    pub value: f32,
}

/// A player-controlled cell. A player owns one of these per live cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCell {
    pub player_id: u32,
    pub color: u32,
    pub name: String,
}

/// Ownership relation for cells created by splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellOwner {
    pub owner_id: u32,
}

/// Food pellet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub nutrition: f32,
    pub color: u32,
}

/// Virus hazard. Splits big cells, eats ejected mass, pops after enough
/// feeds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Virus {
    pub fed_count: u32,
    pub absorption_scale: f32,
    pub absorption_timer: f32,
    pub is_moving: bool,
}

impl Virus {
    pub fn resting() -> Self {
        Self {
            fed_count: 0,
            absorption_scale: 1.0,
            absorption_timer: 0.0,
            is_moving: false,
        }
    }

    pub fn moving() -> Self {
        Self {
            is_moving: true,
            ..Self::resting()
        }
    }
}

/// Mass ejected by a player; decays away if nobody eats it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EjectedMass {
    pub decay_timer: f32,
    pub original_owner: u32,
}

/// Where a cell is steering (mouse-follow movement).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MovementTarget {
    pub x: f32,
    pub y: f32,
}

/// Cooldown before two sibling cells may merge back together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeTimer {
    pub time_remaining: f32,
    pub can_merge: bool,
}

/// Post-split velocity boost, decayed linearly to zero then removed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitVelocity {
    pub vx: f32,
    pub vy: f32,
    pub decay_rate: f32,
}
