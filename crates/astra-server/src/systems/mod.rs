//! Simulation systems.
//!
//! Registration order is execution order; sessions register the pipeline
//! their mode needs (see [`crate::session`]).

pub mod ai;
pub mod bonus;
pub mod boss;
pub mod cell_collision;
pub mod checkpoint;
pub mod collision;
pub mod combat;
pub mod destroy;
pub mod food;
pub mod health;
pub mod level_up;
pub mod mass;
pub mod movement;
pub mod score;
pub mod virus;

pub use ai::AiSystem;
pub use bonus::BonusSystem;
pub use boss::BossSystem;
pub use cell_collision::CellCollisionSystem;
pub use checkpoint::CheckpointSystem;
pub use collision::CollisionSystem;
pub use combat::ShootingSystem;
pub use destroy::DestroySystem;
pub use food::FoodSpawnerSystem;
pub use health::HealthSystem;
pub use level_up::LevelUpSystem;
pub use mass::MassSystem;
pub use movement::{
    MapBoundsSystem, MergeTimerSystem, MovementSystem, MovementTargetSystem, PlayerInputSystem,
    PhysiqueSystem,
};
pub use score::ScoreSystem;
pub use virus::VirusSystem;
