//! Mass bookkeeping (Arena mode).
//!
//! Keeps collider radii in sync with mass (the invariant other systems rely
//! on: radius equals `mass_to_radius(mass)` immediately after this system
//! runs) and decays oversized cells.

use astra_ecs::prelude::*;

use crate::components::{CircleCollider, Mass};
use crate::config::arena;

pub struct MassSystem;

impl System for MassSystem {
    fn name(&self) -> &'static str {
        "mass"
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        let mut masses = registry.components_mut::<Mass>();
        let mut colliders = registry.components_mut::<CircleCollider>();
        for (entity, mass) in masses.iter_mut() {
            if mass.value > arena::MASS_DECAY_THRESHOLD {
                let decay = mass.value * arena::MASS_DECAY_RATE * dt;
                mass.value = (mass.value - decay).max(arena::MIN_MASS);
            }
            if let Some(collider) = colliders.get_mut(entity) {
                collider.radius = arena::mass_to_radius(mass.value);
            }
        }
    }
}
