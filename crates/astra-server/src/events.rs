//! Gameplay events carried by the session's event bus.
//!
//! Synchronous publish order within a tick is the ordering contract systems
//! rely on: collision publishes [`DamageEvent`], the health system applies it
//! and may publish [`EntityDeathEvent`] / [`EnemyKilledEvent`] before the
//! collision pass resumes.

use astra_ecs::prelude::Entity;

use crate::components::BonusKind;

// ---------------------------------------------------------------------------
// Combat events (Scroller)
// ---------------------------------------------------------------------------

/// A projectile (or hazard) dealt damage to `target`.
#[derive(Debug, Clone, Copy)]
pub struct DamageEvent {
    pub target: Entity,
    pub source: Entity,
    pub amount: i32,
}

/// An entity's health reached zero.
#[derive(Debug, Clone, Copy)]
pub struct EntityDeathEvent {
    pub entity: Entity,
    pub is_player: bool,
}

/// An enemy was destroyed; carries kill credit for scoring.
#[derive(Debug, Clone, Copy)]
pub struct EnemyKilledEvent {
    pub enemy: Entity,
    /// The player entity credited with the kill; null when unattributable.
    pub killer: Entity,
    pub score_value: u32,
}

/// A player pressed the fire trigger this tick.
#[derive(Debug, Clone, Copy)]
pub struct FireStartEvent {
    pub player: Entity,
}

/// A player released the fire trigger this tick.
#[derive(Debug, Clone, Copy)]
pub struct FireStopEvent {
    pub player: Entity,
}

/// A player body-collided with an enemy (outside invulnerability).
#[derive(Debug, Clone, Copy)]
pub struct PlayerHitEvent {
    pub player: Entity,
    pub enemy: Entity,
}

/// Visual explosion burst at a point.
#[derive(Debug, Clone, Copy)]
pub struct ExplosionEvent {
    pub source: Entity,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

/// A bonus should spawn at a point (enemy drop).
#[derive(Debug, Clone, Copy)]
pub struct BonusSpawnEvent {
    pub x: f32,
    pub y: f32,
    pub kind: BonusKind,
}

/// A player picked up a bonus.
#[derive(Debug, Clone, Copy)]
pub struct PowerupCollectedEvent {
    pub player: Entity,
    pub kind: BonusKind,
    pub x: f32,
    pub y: f32,
}

// ---------------------------------------------------------------------------
// Cell events (Arena)
// ---------------------------------------------------------------------------

/// A cell consumed a food pellet or ejected mass.
#[derive(Debug, Clone, Copy)]
pub struct CellAteFoodEvent {
    pub eater: Entity,
    pub eaten: Entity,
    pub eater_player: u32,
    pub mass_gained: f32,
}

/// A cell ate another player's cell.
#[derive(Debug, Clone, Copy)]
pub struct CellAteCellEvent {
    pub eater: Entity,
    pub eaten: Entity,
    pub eater_player: u32,
    pub eaten_player: u32,
    pub mass_gained: f32,
}

/// Two sibling cells merged back together.
#[derive(Debug, Clone, Copy)]
pub struct CellMergedEvent {
    pub survivor: Entity,
    pub absorbed: Entity,
    pub owner: u32,
    pub combined_mass: f32,
}

/// A big cell touched a virus; the session decides the split outcome.
#[derive(Debug, Clone, Copy)]
pub struct CellHitVirusEvent {
    pub cell: Entity,
    pub virus: Entity,
    pub player: u32,
}

/// A player lost their last cell.
#[derive(Debug, Clone, Copy)]
pub struct PlayerEliminatedEvent {
    pub player_id: u32,
    pub killer_id: u32,
    pub final_mass: f32,
}

// ---------------------------------------------------------------------------
// Wave / session events
// ---------------------------------------------------------------------------

/// A wave's trigger fired and its spawns were instantiated.
#[derive(Debug, Clone, Copy)]
pub struct WaveStartedEvent {
    pub wave_number: u32,
}

/// A wave finished (immediately after spawning, or once its enemies died,
/// per map configuration).
#[derive(Debug, Clone, Copy)]
pub struct WaveCompletedEvent {
    pub wave_number: u32,
    pub all_waves_complete: bool,
}

/// All players are out of lives.
#[derive(Debug, Clone, Copy)]
pub struct GameOverEvent {
    pub victory: bool,
}
