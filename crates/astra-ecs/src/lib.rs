//! astra-ecs -- sparse-set Entity Component System with a typed event bus.
//!
//! This crate provides the simulation substrate for the astra game server.
//! Entities are plain monotonically increasing ids; each component type is
//! held in its own sparse-set storage; systems are named passes executed in
//! registration order; and a typed publish/subscribe bus carries gameplay
//! events between systems within a tick.
//!
//! # Quick Start
//!
//! ```
//! use astra_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Velocity { x: f32, y: f32 }
//!
//! let mut registry = Registry::new();
//! registry.register_component::<Position>();
//! registry.register_component::<Velocity>();
//!
//! let e = registry.spawn_entity();
//! registry.add_component(e, Position { x: 0.0, y: 0.0 });
//! registry.add_component(e, Velocity { x: 1.0, y: 0.0 });
//!
//! // Integrate one step.
//! let dt = 0.5f32;
//! let mut positions = registry.components_mut::<Position>();
//! for (entity, vel) in registry.components::<Velocity>().iter() {
//!     if let Some(pos) = positions.get_mut(entity) {
//!         pos.x += vel.x * dt;
//!         pos.y += vel.y * dt;
//!     }
//! }
//! drop(positions);
//!
//! assert_eq!(registry.components::<Position>().get(e), Some(&Position { x: 0.5, y: 0.0 }));
//! ```

pub mod entity;
pub mod events;
pub mod registry;
pub mod storage;
pub mod system;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A component type was used before being registered.
    #[error("component type `{name}` is not registered; call register_component::<{name}>() first")]
    UnknownComponent { name: &'static str },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::entity::{Entity, EntityAllocator};
    pub use crate::events::{EventBus, SubscriptionId};
    pub use crate::registry::{Component, Registry};
    pub use crate::storage::ComponentStorage;
    pub use crate::system::System;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
