//! Virus upkeep (Arena mode): absorption pulse animation, shot-virus
//! friction, and slow repopulation.

use rand::Rng;
use rand_pcg::Pcg64Mcg;

use astra_ecs::prelude::*;

use crate::components::{CircleCollider, Mass, Position, Velocity, Virus};
use crate::config::arena;
use crate::spawn::spawn_virus;
use crate::sync::{NetIdAlloc, NetSync};

pub struct VirusSystem {
    net: NetSync,
    ids: NetIdAlloc,
    rng: Pcg64Mcg,
    respawn_timer: f32,
}

impl VirusSystem {
    pub fn new(net: NetSync, ids: NetIdAlloc, seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            net,
            ids,
            rng: Pcg64Mcg::seed_from_u64(seed),
            respawn_timer: 0.0,
        }
    }

    /// Seed the initial virus field. Called once at session setup.
    pub fn seed_initial(&mut self, registry: &mut Registry) {
        for _ in 0..arena::INITIAL_VIRUSES {
            let x = self
                .rng
                .gen_range(arena::MAP_WIDTH * 0.1..arena::MAP_WIDTH * 0.9);
            let y = self
                .rng
                .gen_range(arena::MAP_HEIGHT * 0.1..arena::MAP_HEIGHT * 0.9);
            spawn_virus(registry, &self.net, &self.ids, x, y);
        }
    }
}

impl System for VirusSystem {
    fn name(&self) -> &'static str {
        "virus"
    }

    fn init(&mut self, registry: &mut Registry) {
        self.seed_initial(registry);
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        let virus_count = {
            let mut viruses = registry.components_mut::<Virus>();
            let mut velocities = registry.components_mut::<Velocity>();
            let mut masses = registry.components_mut::<Mass>();
            let mut colliders = registry.components_mut::<CircleCollider>();

            for (entity, virus) in viruses.iter_mut() {
                // Shot viruses coast to a stop.
                if virus.is_moving {
                    if let Some(vel) = velocities.get_mut(entity) {
                        let speed = (vel.x * vel.x + vel.y * vel.y).sqrt();
                        let friction = arena::VIRUS_FRICTION * dt;
                        if speed > friction {
                            let factor = (speed - friction) / speed;
                            vel.x *= factor;
                            vel.y *= factor;
                        } else {
                            vel.x = 0.0;
                            vel.y = 0.0;
                            virus.is_moving = false;
                        }
                    }
                }

                // Absorption pulse: briefly inflate mass and radius, then
                // settle back to the base mass.
                if virus.absorption_timer > 0.0 {
                    virus.absorption_timer -= dt;
                    if virus.absorption_timer <= 0.0 {
                        virus.absorption_timer = 0.0;
                        virus.absorption_scale = 1.0;
                    }
                    let scaled =
                        arena::VIRUS_MASS * virus.absorption_scale * virus.absorption_scale;
                    if let Some(mass) = masses.get_mut(entity) {
                        mass.value = scaled;
                    }
                    if let Some(collider) = colliders.get_mut(entity) {
                        collider.radius = arena::mass_to_radius(scaled);
                    }
                } else if let Some(mass) = masses.get_mut(entity) {
                    if mass.value != arena::VIRUS_MASS {
                        mass.value = arena::VIRUS_MASS;
                        if let Some(collider) = colliders.get_mut(entity) {
                            collider.radius = arena::mass_to_radius(arena::VIRUS_MASS);
                        }
                    }
                }
            }
            viruses.len()
        };

        // Repopulate slowly when below the cap.
        if virus_count < arena::MAX_VIRUSES {
            self.respawn_timer += dt;
            if self.respawn_timer >= arena::VIRUS_RESPAWN_INTERVAL {
                self.respawn_timer = 0.0;
                let x = self
                    .rng
                    .gen_range(arena::MAP_WIDTH * 0.1..arena::MAP_WIDTH * 0.9);
                let y = self
                    .rng
                    .gen_range(arena::MAP_HEIGHT * 0.1..arena::MAP_HEIGHT * 0.9);
                spawn_virus(registry, &self.net, &self.ids, x, y);
            }
        } else {
            self.respawn_timer = 0.0;
        }
    }
}
