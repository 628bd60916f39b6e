//! Compiled server defaults and gameplay tuning constants.
//!
//! Ports can be overridden by CLI arguments or the `ASTRA_SERVER_PORT_TCP` /
//! `ASTRA_SERVER_PORT_UDP` environment variables; everything else is fixed at
//! build time. Wave, level, and map data come from JSON files in the assets
//! directory (see [`crate::waves`]).

/// Protocol version byte carried in CLIENT_CONNECT.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default TCP control port.
pub const DEFAULT_TCP_PORT: u16 = 4242;
/// Default UDP data port.
pub const DEFAULT_UDP_PORT: u16 = 4243;

/// Simulation tick rate in Hz.
pub const TICK_RATE: u32 = 32;
/// Seconds per simulation tick.
pub const TICK_INTERVAL: f32 = 1.0 / TICK_RATE as f32;
/// Seconds between world snapshots (20 Hz, below the tick rate).
pub const SNAPSHOT_INTERVAL: f32 = 0.05;
/// Seconds between leaderboard broadcasts (Arena mode).
pub const LEADERBOARD_INTERVAL: f32 = 1.0;
/// Largest dt a tick is allowed to consume; the excess is dropped.
pub const MAX_TICK_DT: f32 = 0.1;

/// Worker threads in the session pool.
pub const SESSION_WORKERS: usize = 6;

/// Seconds of silence (no input, no ping) before a client is dropped.
pub const CLIENT_TIMEOUT: f32 = 10.0;
/// Inputs older than this are dropped at the session boundary.
pub const INPUT_TTL: f32 = 1.0;
/// Lobby capacity.
pub const MAX_PLAYERS: usize = 16;

// ---------------------------------------------------------------------------
// Scroller mode
// ---------------------------------------------------------------------------

/// Tuning for the horizontally scrolling shooter.
pub mod scroller {
    /// Playfield size in world units.
    pub const VIEW_WIDTH: f32 = 1920.0;
    pub const VIEW_HEIGHT: f32 = 1080.0;

    /// Default scroll speed; maps may override it.
    pub const SCROLL_SPEED: f32 = 100.0;

    pub const PLAYER_MOVEMENT_SPEED: f32 = 300.0;
    pub const PLAYER_MAX_HEALTH: i32 = 100;
    pub const PLAYER_SPAWN_X: f32 = 100.0;
    pub const PLAYER_SPAWN_Y_BASE: f32 = 300.0;
    pub const PLAYER_SPAWN_Y_OFFSET: f32 = 120.0;
    pub const PLAYER_LIVES: u8 = 3;
    /// Seconds of invulnerability granted on spawn and on taking a hit.
    pub const INVULNERABILITY_TIME: f32 = 3.0;
    /// Seconds between death and checkpoint respawn.
    pub const RESPAWN_DELAY: f32 = 3.0;

    /// Entities scrolled this far past the left edge are reaped.
    pub const OFFSCREEN_LEFT: f32 = -300.0;

    /// Player ship hitboxes by size class.
    pub const HITBOX_SMALL: f32 = 80.0;
    pub const HITBOX_MEDIUM: f32 = 104.0;
    pub const HITBOX_LARGE: f32 = 128.0;

    /// Score thresholds for levels 1..=5.
    pub const LEVEL_THRESHOLDS: [u32; 5] = [0, 2000, 5000, 10_000, 20_000];
    pub const MAX_LEVEL: u8 = 5;

    /// Damage a body collision with an enemy deals to the player.
    pub const ENEMY_CONTACT_DAMAGE: i32 = 20;
    /// Radius within which seeking enemies lock onto a player.
    pub const ENEMY_DETECTION_RANGE: f32 = 800.0;

    pub const WALL_TILE: f32 = 64.0;
    pub const BONUS_SIZE: f32 = 80.0;
    /// Chance an enemy drops a bonus on death.
    pub const BONUS_DROP_CHANCE: f64 = 0.15;
    pub const BONUS_SPEED_MULTIPLIER: f32 = 1.6;
    pub const BONUS_SPEED_DURATION: f32 = 6.0;
    pub const BONUS_HEALTH_AMOUNT: i32 = 30;
}

// ---------------------------------------------------------------------------
// Arena mode
// ---------------------------------------------------------------------------

/// Tuning for the cell-eating arena.
pub mod arena {
    pub const MAP_WIDTH: f32 = 4000.0;
    pub const MAP_HEIGHT: f32 = 4000.0;

    pub const STARTING_MASS: f32 = 20.0;
    pub const MIN_MASS: f32 = 10.0;
    /// Cells above this mass slowly decay.
    pub const MASS_DECAY_THRESHOLD: f32 = 100.0;
    /// Fraction of mass lost per second above the threshold.
    pub const MASS_DECAY_RATE: f32 = 0.002;

    /// Base speed divided by sqrt(mass) gives cell speed.
    pub const BASE_SPEED: f32 = 400.0;

    /// A cell eats another when centers are within this fraction of the
    /// combined radii.
    pub const EAT_OVERLAP_RATIO: f32 = 0.75;
    /// The eater must be at least this many times heavier.
    pub const EAT_MASS_RATIO: f32 = 1.25;

    pub const FOOD_MASS: f32 = 1.0;
    pub const INITIAL_FOOD: usize = 100;
    pub const MAX_FOOD: usize = 500;
    pub const FOOD_SPAWN_BATCH: usize = 25;
    /// Seconds between ramp-up batches.
    pub const FOOD_SPAWN_INTERVAL: f32 = 0.5;
    /// Replacement spawns per second once ramped up.
    pub const FOOD_SPAWN_RATE: f32 = 2.0;

    pub const MAX_CELLS_PER_PLAYER: usize = 8;
    pub const MIN_SPLIT_MASS: f32 = 36.0;
    pub const SPLIT_LOSS_FACTOR: f32 = 0.5;
    pub const SPLIT_SPEED_BOOST: f32 = 400.0;
    /// World-units/sec^2 of split-boost decay.
    pub const SPLIT_DECAY_RATE: f32 = 800.0;

    pub const MIN_EJECT_MASS: f32 = 36.0;
    pub const EJECT_MASS_COST: f32 = 18.0;
    pub const EJECT_MASS_VALUE: f32 = 14.0;
    pub const EJECT_SPEED: f32 = 600.0;
    pub const EJECT_DECAY_TIME: f32 = 20.0;
    /// Ejected mass moving faster than this cannot be re-eaten by its owner.
    pub const EJECT_REEAT_SPEED: f32 = 50.0;
    /// Linear friction applied to ejected mass, world-units/sec^2.
    pub const EJECT_FRICTION: f32 = 300.0;

    pub const VIRUS_MASS: f32 = 100.0;
    /// Cells at or above this mass split when touching a virus.
    pub const VIRUS_SPLIT_MASS: f32 = 130.0;
    /// Pieces a virus-triggered split bursts into.
    pub const VIRUS_SPLIT_COUNT: usize = 8;
    /// Ejected-mass feeds before a virus shoots a new one.
    pub const VIRUS_POP_THRESHOLD: u32 = 7;
    pub const INITIAL_VIRUSES: usize = 10;
    pub const MAX_VIRUSES: usize = 15;
    pub const VIRUS_SHOOT_SPEED: f32 = 700.0;
    pub const VIRUS_SHOOT_MASS: f32 = 100.0;
    /// Friction applied to shot viruses, world-units/sec^2.
    pub const VIRUS_FRICTION: f32 = 300.0;
    pub const VIRUS_RESPAWN_INTERVAL: f32 = 5.0;
    /// Absorption pulse: scale and duration when a virus swallows a feed.
    pub const VIRUS_ABSORB_SCALE: f32 = 1.25;
    pub const VIRUS_ABSORB_TIME: f32 = 0.4;

    /// Collider radius for a given mass: `10 * sqrt(mass / pi)`.
    pub fn mass_to_radius(mass: f32) -> f32 {
        10.0 * (mass / std::f32::consts::PI).sqrt()
    }

    /// Movement speed for a given mass: `BASE_SPEED / sqrt(mass)`.
    pub fn mass_to_speed(mass: f32) -> f32 {
        BASE_SPEED / mass.max(MIN_MASS * 0.1).sqrt()
    }

    /// Whether a cell of `eater` mass may eat one of `eaten` mass.
    pub fn can_eat(eater: f32, eaten: f32) -> bool {
        eater >= EAT_MASS_RATIO * eaten
    }

    /// Seconds two freshly split cells must wait before merging back.
    pub fn merge_time_for_mass(mass: f32) -> f32 {
        30.0 + mass * 0.02
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::arena::*;

    #[test]
    fn radius_formula_matches_documented_curve() {
        // r = 10 * sqrt(m / pi)
        let r = mass_to_radius(std::f32::consts::PI);
        assert!((r - 10.0).abs() < 1e-4);
        assert!(mass_to_radius(20.0) > mass_to_radius(10.0));
    }

    #[test]
    fn heavier_cells_are_slower() {
        assert!(mass_to_speed(10.0) > mass_to_speed(40.0));
        let v = mass_to_speed(100.0);
        assert!((v - BASE_SPEED / 10.0).abs() < 1e-3);
    }

    #[test]
    fn eat_threshold_is_strict_ratio() {
        assert!(can_eat(20.0, 10.0));
        assert!(can_eat(12.5, 10.0));
        assert!(!can_eat(12.4, 10.0));
        assert!(!can_eat(10.0, 10.0));
    }

    #[test]
    fn scenario_geometry_allows_the_canonical_eat() {
        // Two cells 10 units apart, masses 20 and 10, must satisfy the
        // overlap predicate so the heavier one eats.
        let r_a = mass_to_radius(20.0);
        let r_b = mass_to_radius(10.0);
        assert!(10.0 < EAT_OVERLAP_RATIO * (r_a + r_b));
        assert!(can_eat(20.0, 10.0));
    }
}
