//! Level progression state machine (Scroller mode).
//!
//! Phases: LevelStart -> Waves -> BossTransition -> BossFight ->
//! LevelComplete -> next level or FinalVictory. Waves advance to the boss
//! transition once every wave has fired and no enemies remain; the boss
//! fight ends when the boss entity is destroyed.

use std::sync::{Arc, Mutex};

use tracing::info;

use astra_ecs::prelude::*;

use crate::components::{Enemy, EnemyKind, GameStatus};
use crate::config::scroller;
use crate::events::GameOverEvent;
use crate::systems::boss::spawn_boss;
use crate::sync::NetSync;
use crate::waves::{any_enemy_alive, MapConfig, WaveManager};

/// One level: a wave map plus a boss at the end.
#[derive(Debug, Clone)]
pub struct LevelSpec {
    pub name: String,
    pub map: MapConfig,
}

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelPhase {
    LevelStart,
    Waves,
    BossTransition,
    BossFight,
    LevelComplete,
    FinalVictory,
}

const LEVEL_START_DELAY: f32 = 2.0;
const BOSS_TRANSITION_DELAY: f32 = 2.0;
const LEVEL_COMPLETE_DELAY: f32 = 3.0;

// ---------------------------------------------------------------------------
// LevelSystem
// ---------------------------------------------------------------------------

pub struct LevelSystem {
    levels: Vec<LevelSpec>,
    current_level: usize,
    phase: LevelPhase,
    phase_timer: f32,
    wave_manager: Arc<Mutex<WaveManager>>,
    net: NetSync,
}

impl LevelSystem {
    pub fn new(levels: Vec<LevelSpec>, wave_manager: Arc<Mutex<WaveManager>>, net: NetSync) -> Self {
        Self {
            levels,
            current_level: 0,
            phase: LevelPhase::LevelStart,
            phase_timer: 0.0,
            wave_manager,
            net,
        }
    }

    pub fn phase(&self) -> LevelPhase {
        self.phase
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    fn enter(&mut self, phase: LevelPhase) {
        info!(level = self.current_level, ?phase, "level phase transition");
        self.phase = phase;
        self.phase_timer = 0.0;
    }

    fn boss_alive(registry: &Registry) -> bool {
        registry
            .components::<Enemy>()
            .iter()
            .any(|(_, e)| e.kind == EnemyKind::Boss)
    }
}

impl System for LevelSystem {
    fn name(&self) -> &'static str {
        "level"
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        self.phase_timer += dt;

        match self.phase {
            LevelPhase::LevelStart => {
                if self.phase_timer >= LEVEL_START_DELAY {
                    self.enter(LevelPhase::Waves);
                }
            }
            LevelPhase::Waves => {
                let waves_done = self.wave_manager.lock().unwrap().all_waves_complete();
                if waves_done && !any_enemy_alive(registry) {
                    self.enter(LevelPhase::BossTransition);
                }
            }
            LevelPhase::BossTransition => {
                if self.phase_timer >= BOSS_TRANSITION_DELAY {
                    spawn_boss(
                        registry,
                        &self.net,
                        scroller::VIEW_WIDTH - 300.0,
                        scroller::VIEW_HEIGHT / 2.0,
                    );
                    self.enter(LevelPhase::BossFight);
                }
            }
            LevelPhase::BossFight => {
                if !Self::boss_alive(registry) {
                    self.enter(LevelPhase::LevelComplete);
                }
            }
            LevelPhase::LevelComplete => {
                if self.phase_timer >= LEVEL_COMPLETE_DELAY {
                    self.current_level += 1;
                    if self.current_level < self.levels.len() {
                        let map = self.levels[self.current_level].map.clone();
                        let mut manager = self.wave_manager.lock().unwrap();
                        *manager = WaveManager::new(map);
                        drop(manager);
                        self.enter(LevelPhase::LevelStart);
                    } else {
                        self.enter(LevelPhase::FinalVictory);
                        {
                            let mut statuses = registry.components_mut::<GameStatus>();
                            let entry = statuses.iter_mut().next();
                            if let Some((_, status)) = entry {
                                status.victory = true;
                            }
                        }
                        registry.publish(&GameOverEvent { victory: true });
                    }
                }
            }
            LevelPhase::FinalVictory => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
