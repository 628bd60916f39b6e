//! Food spawning (Arena mode).
//!
//! Two regimes: a ramp-up phase spawning batches until the field is full,
//! then a slow replacement drip as players graze it down. Batching the
//! initial fill avoids a spawn-payload spike on session start.

use rand::Rng;
use rand_pcg::Pcg64Mcg;

use astra_ecs::prelude::*;

use crate::components::Food;
use crate::config::arena;
use crate::spawn::spawn_food;
use crate::sync::{NetIdAlloc, NetSync};

pub struct FoodSpawnerSystem {
    net: NetSync,
    ids: NetIdAlloc,
    rng: Pcg64Mcg,
    spawn_timer: f32,
    ramp_up_complete: bool,
}

impl FoodSpawnerSystem {
    pub fn new(net: NetSync, ids: NetIdAlloc, seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            net,
            ids,
            rng: Pcg64Mcg::seed_from_u64(seed),
            spawn_timer: 0.0,
            ramp_up_complete: false,
        }
    }

    fn random_color(&mut self) -> u32 {
        let r: u32 = self.rng.gen_range(0..=255);
        let g: u32 = self.rng.gen_range(0..=255);
        let b: u32 = self.rng.gen_range(0..=255);
        (r << 24) | (g << 16) | (b << 8) | 0xFF
    }

    fn spawn_one(&mut self, registry: &mut Registry) {
        let x = self.rng.gen_range(0.0..arena::MAP_WIDTH);
        let y = self.rng.gen_range(0.0..arena::MAP_HEIGHT);
        let color = self.random_color();
        spawn_food(registry, &self.net, &self.ids, x, y, color);
    }

    fn spawn_batch(&mut self, registry: &mut Registry, count: usize) {
        for _ in 0..count {
            self.spawn_one(registry);
        }
    }
}

impl System for FoodSpawnerSystem {
    fn name(&self) -> &'static str {
        "food_spawner"
    }

    fn init(&mut self, registry: &mut Registry) {
        self.spawn_batch(registry, arena::INITIAL_FOOD);
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        self.spawn_timer += dt;
        let food_count = registry.components::<Food>().len();

        if food_count >= arena::MAX_FOOD {
            self.ramp_up_complete = true;
            return;
        }

        if !self.ramp_up_complete {
            if self.spawn_timer >= arena::FOOD_SPAWN_INTERVAL {
                let to_spawn = arena::FOOD_SPAWN_BATCH.min(arena::MAX_FOOD - food_count);
                self.spawn_batch(registry, to_spawn);
                self.spawn_timer = 0.0;
            }
        } else {
            let interval = 1.0 / arena::FOOD_SPAWN_RATE;
            if self.spawn_timer >= interval {
                self.spawn_one(registry);
                self.spawn_timer = 0.0;
            }
        }
    }
}
