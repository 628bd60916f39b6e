//! Wave configuration and spawning.
//!
//! Waves load from JSON map files at startup (fatal on failure). Each wave
//! has a trigger (a scroll distance and a time delay, both of which must be
//! satisfied) and a list of spawn specs expanded by pattern. Completion
//! semantics are per map: `"immediate"` marks a wave complete the moment its
//! spawns exist; `"on_clear"` waits until every spawned enemy is dead.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use astra_ecs::prelude::*;
use astra_protocol::payload::{encode_fixed_str, ServerWaveComplete, ServerWaveStart};

use crate::components::{BonusKind, Enemy, EnemyKind, ScrollState};
use crate::config::scroller;
use crate::events::{WaveCompletedEvent, WaveStartedEvent};
use crate::spawn::{spawn_bonus, spawn_enemy, spawn_wall};
use crate::sync::NetSync;

// ---------------------------------------------------------------------------
// Configuration schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPattern {
    Single,
    Line,
    Grid,
    Formation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// The wave completes as soon as its spawns are instantiated.
    Immediate,
    /// The wave completes once all enemies it spawned are dead.
    OnClear,
}

impl Default for CompletionMode {
    fn default() -> Self {
        CompletionMode::Immediate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub enemy_type: String,
    #[serde(default)]
    pub bonus_type: String,
    pub position_x: f32,
    pub position_y: f32,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_pattern")]
    pub pattern: SpawnPattern,
    #[serde(default = "default_spacing")]
    pub spacing: f32,
}

fn default_count() -> u32 {
    1
}
fn default_pattern() -> SpawnPattern {
    SpawnPattern::Single
}
fn default_spacing() -> f32 {
    100.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WaveTrigger {
    pub scroll_distance: f32,
    #[serde(default)]
    pub time_delay: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveConfig {
    pub wave_number: u32,
    pub trigger: WaveTrigger,
    pub spawns: Vec<SpawnConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub scroll_speed: Option<f32>,
    #[serde(default)]
    pub loop_waves: bool,
    #[serde(default)]
    pub completion: CompletionMode,
    #[serde(default)]
    pub checkpoints: Vec<f32>,
    pub waves: Vec<WaveConfig>,
}

impl MapConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading wave config {}", path.display()))?;
        let config: MapConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing wave config {}", path.display()))?;
        Ok(config)
    }

    /// Map id to wave file name, mirroring the shipped assets.
    pub fn file_for_map(map_id: u16) -> &'static str {
        match map_id {
            2 => "asteroid_belt.json",
            3 => "mothership.json",
            _ => "nebula_outpost.json",
        }
    }
}

/// Expand a spawn spec into concrete positions.
pub fn expand_pattern(spec: &SpawnConfig) -> Vec<(f32, f32)> {
    let count = spec.count.max(1) as usize;
    match spec.pattern {
        SpawnPattern::Single => vec![(spec.position_x, spec.position_y)],
        SpawnPattern::Line => (0..count)
            .map(|i| (spec.position_x, spec.position_y + i as f32 * spec.spacing))
            .collect(),
        SpawnPattern::Grid => {
            let cols = (count as f32).sqrt().ceil() as usize;
            (0..count)
                .map(|i| {
                    (
                        spec.position_x + (i % cols) as f32 * spec.spacing,
                        spec.position_y + (i / cols) as f32 * spec.spacing,
                    )
                })
                .collect()
        }
        SpawnPattern::Formation => {
            // V formation: the leader in front, wing pairs trailing behind
            // above and below.
            (0..count)
                .map(|i| {
                    let rank = ((i + 1) / 2) as f32;
                    let side = if i % 2 == 1 { -1.0 } else { 1.0 };
                    let offset = if i == 0 { 0.0 } else { rank * spec.spacing * side };
                    (spec.position_x + rank * spec.spacing, spec.position_y + offset)
                })
                .collect()
        }
    }
}

fn parse_enemy_kind(name: &str) -> EnemyKind {
    match name {
        "fast" => EnemyKind::Fast,
        "tank" => EnemyKind::Tank,
        "boss" => EnemyKind::Boss,
        _ => EnemyKind::Basic,
    }
}

fn parse_bonus_kind(name: &str) -> BonusKind {
    match name {
        "shield" => BonusKind::Shield,
        "speed" => BonusKind::Speed,
        _ => BonusKind::Health,
    }
}

// ---------------------------------------------------------------------------
// WaveManager
// ---------------------------------------------------------------------------

/// A wave that fired but has not completed yet (`on_clear` mode).
#[derive(Debug)]
struct OpenWave {
    wave_number: u32,
    enemies: Vec<Entity>,
}

#[derive(Debug)]
pub struct WaveManager {
    config: MapConfig,
    current_wave_index: usize,
    accumulated_time: f32,
    open_waves: Vec<OpenWave>,
    last_wave_start: Option<ServerWaveStart>,
    last_wave_complete: Option<ServerWaveComplete>,
}

impl WaveManager {
    pub fn new(config: MapConfig) -> Self {
        Self {
            config,
            current_wave_index: 0,
            accumulated_time: 0.0,
            open_waves: Vec::new(),
            last_wave_start: None,
            last_wave_complete: None,
        }
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let config = MapConfig::load(path)?;
        info!(
            map = %config.name,
            waves = config.waves.len(),
            "loaded wave configuration"
        );
        Ok(Self::new(config))
    }

    pub fn total_waves(&self) -> u32 {
        self.config.waves.len() as u32
    }

    pub fn scroll_speed(&self) -> f32 {
        self.config.scroll_speed.unwrap_or(scroller::SCROLL_SPEED)
    }

    pub fn checkpoints(&self) -> &[f32] {
        &self.config.checkpoints
    }

    /// True once every wave has fired and (in `on_clear` mode) completed.
    pub fn all_waves_complete(&self) -> bool {
        self.current_wave_index >= self.config.waves.len() && self.open_waves.is_empty()
    }

    /// The most recent wave start/complete payloads, for client resync.
    pub fn last_payloads(&self) -> (Option<ServerWaveStart>, Option<ServerWaveComplete>) {
        (self.last_wave_start.clone(), self.last_wave_complete)
    }

    pub fn reset(&mut self) {
        self.current_wave_index = 0;
        self.accumulated_time = 0.0;
        self.open_waves.clear();
    }

    /// Advance wave state by one tick. Fires at most one wave per call.
    pub fn update(
        &mut self,
        registry: &mut Registry,
        net: &NetSync,
        dt: f32,
        current_scroll: f32,
    ) {
        self.accumulated_time += dt;

        if self.current_wave_index >= self.config.waves.len() {
            if self.config.loop_waves && self.open_waves.is_empty() {
                self.reset();
            }
        } else {
            let trigger = self.config.waves[self.current_wave_index].trigger;
            if current_scroll >= trigger.scroll_distance
                && self.accumulated_time >= trigger.time_delay
            {
                let wave = self.config.waves[self.current_wave_index].clone();
                self.current_wave_index += 1;
                self.fire_wave(registry, net, &wave);
            }
        }

        self.settle_open_waves(registry, net);
    }

    fn fire_wave(&mut self, registry: &mut Registry, net: &NetSync, wave: &WaveConfig) {
        info!(wave = wave.wave_number, "wave triggered");
        let mut spawned_enemies = Vec::new();
        let mut expected_enemies: u16 = 0;
        let scroll_speed = self.scroll_speed();

        for spec in &wave.spawns {
            for (x, y) in expand_pattern(spec) {
                match spec.kind.as_str() {
                    "enemy" => {
                        let kind = parse_enemy_kind(&spec.enemy_type);
                        let entity = spawn_enemy(registry, net, kind, x, y);
                        // Wave enemies shoot; the shooting system aims them
                        // at the nearest player.
                        registry.add_component(
                            entity,
                            crate::components::Weapon::new(crate::components::WeaponKind::Basic),
                        );
                        spawned_enemies.push(entity);
                        expected_enemies += 1;
                    }
                    "wall" => {
                        spawn_wall(
                            registry,
                            scroll_speed,
                            x,
                            y,
                            scroller::WALL_TILE,
                            scroller::WALL_TILE,
                        );
                    }
                    "powerup" => {
                        spawn_bonus(
                            registry,
                            net,
                            parse_bonus_kind(&spec.bonus_type),
                            scroll_speed,
                            x,
                            y,
                        );
                    }
                    other => {
                        warn!(kind = other, "unknown spawn type in wave config");
                    }
                }
            }
        }

        let start = ServerWaveStart {
            wave_number: wave.wave_number,
            total_waves: self.total_waves() as u16,
            scroll_distance: wave.trigger.scroll_distance,
            expected_enemies,
            wave_name: encode_fixed_str(&format!("Wave {}", wave.wave_number)),
        };
        net.queue_wave_start(start.clone());
        self.last_wave_start = Some(start);
        registry.publish(&WaveStartedEvent {
            wave_number: wave.wave_number,
        });

        match self.config.completion {
            CompletionMode::Immediate => {
                self.complete_wave(registry, net, wave.wave_number, expected_enemies)
            }
            CompletionMode::OnClear => self.open_waves.push(OpenWave {
                wave_number: wave.wave_number,
                enemies: spawned_enemies,
            }),
        }
    }

    fn settle_open_waves(&mut self, registry: &mut Registry, net: &NetSync) {
        let mut finished = Vec::new();
        self.open_waves.retain(|open| {
            let cleared = open.enemies.iter().all(|&e| !registry.entity_exists(e));
            if cleared {
                finished.push((open.wave_number, open.enemies.len() as u16));
            }
            !cleared
        });
        for (wave_number, enemies_killed) in finished {
            self.complete_wave(registry, net, wave_number, enemies_killed);
        }
    }

    fn complete_wave(
        &mut self,
        registry: &mut Registry,
        net: &NetSync,
        wave_number: u32,
        enemies_killed: u16,
    ) {
        let all_complete = self.all_waves_complete();
        let complete = ServerWaveComplete {
            wave_number,
            completion_time_ms: (self.accumulated_time * 1000.0) as u32,
            enemies_killed,
            bonus_points: 0,
            all_waves_complete: all_complete as u8,
        };
        net.queue_wave_complete(complete);
        self.last_wave_complete = Some(complete);
        registry.publish(&WaveCompletedEvent {
            wave_number,
            all_waves_complete: all_complete,
        });
        info!(wave = wave_number, all_complete, "wave completed");
    }
}

// ---------------------------------------------------------------------------
// WaveSystem
// ---------------------------------------------------------------------------

/// System wrapper driving a shared [`WaveManager`] from the scroll singleton.
pub struct WaveSystem {
    manager: Arc<Mutex<WaveManager>>,
    net: NetSync,
}

impl WaveSystem {
    pub fn new(manager: Arc<Mutex<WaveManager>>, net: NetSync) -> Self {
        Self { manager, net }
    }
}

impl System for WaveSystem {
    fn name(&self) -> &'static str {
        "waves"
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        let current_scroll = registry
            .components::<ScrollState>()
            .iter()
            .next()
            .map_or(0.0, |(_, s)| s.current_scroll);
        self.manager
            .lock()
            .unwrap()
            .update(registry, &self.net, dt, current_scroll);
    }
}

/// Whether any enemy is still alive (used by the level state machine).
pub fn any_enemy_alive(registry: &Registry) -> bool {
    !registry.components::<Enemy>().is_empty()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        Collider, Health, NetworkId, NoFriction, Position, ToDestroy, Velocity, Wall,
    };

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register_component::<Position>();
        reg.register_component::<Velocity>();
        reg.register_component::<Health>();
        reg.register_component::<Enemy>();
        reg.register_component::<crate::components::Ai>();
        reg.register_component::<NoFriction>();
        reg.register_component::<Collider>();
        reg.register_component::<NetworkId>();
        reg.register_component::<Wall>();
        reg.register_component::<crate::components::Bonus>();
        reg.register_component::<crate::components::Weapon>();
        reg.register_component::<ToDestroy>();
        reg.register_component::<ScrollState>();
        reg
    }

    fn one_wave_config(completion: CompletionMode) -> MapConfig {
        MapConfig {
            name: "test".into(),
            scroll_speed: Some(50.0),
            loop_waves: false,
            completion,
            checkpoints: vec![],
            waves: vec![WaveConfig {
                wave_number: 1,
                trigger: WaveTrigger {
                    scroll_distance: 200.0,
                    time_delay: 0.0,
                },
                spawns: vec![SpawnConfig {
                    kind: "enemy".into(),
                    enemy_type: "basic".into(),
                    bonus_type: String::new(),
                    position_x: 1800.0,
                    position_y: 100.0,
                    count: 3,
                    pattern: SpawnPattern::Line,
                    spacing: 100.0,
                }],
            }],
        }
    }

    #[test]
    fn line_pattern_spaces_vertically() {
        let spec = SpawnConfig {
            kind: "enemy".into(),
            enemy_type: "basic".into(),
            bonus_type: String::new(),
            position_x: 1800.0,
            position_y: 100.0,
            count: 3,
            pattern: SpawnPattern::Line,
            spacing: 100.0,
        };
        let positions = expand_pattern(&spec);
        assert_eq!(
            positions,
            vec![(1800.0, 100.0), (1800.0, 200.0), (1800.0, 300.0)]
        );
    }

    #[test]
    fn grid_pattern_wraps_rows() {
        let spec = SpawnConfig {
            kind: "enemy".into(),
            enemy_type: "basic".into(),
            bonus_type: String::new(),
            position_x: 0.0,
            position_y: 0.0,
            count: 4,
            pattern: SpawnPattern::Grid,
            spacing: 50.0,
        };
        let positions = expand_pattern(&spec);
        assert_eq!(
            positions,
            vec![(0.0, 0.0), (50.0, 0.0), (0.0, 50.0), (50.0, 50.0)]
        );
    }

    #[test]
    fn wave_fires_once_when_both_trigger_conditions_hold() {
        let mut reg = registry();
        let net = NetSync::new();
        let mut manager = WaveManager::new(one_wave_config(CompletionMode::Immediate));

        let started = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let completed = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let s = started.clone();
        reg.event_bus()
            .subscribe::<WaveStartedEvent, _>(move |_reg, _ev| {
                s.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            });
        let c = completed.clone();
        reg.event_bus()
            .subscribe::<WaveCompletedEvent, _>(move |_reg, _ev| {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            });

        // Simulate 10s at scroll_speed 50: the wave fires once when scroll
        // crosses 200 at t=4s, and never again.
        let dt = 0.1;
        let mut scroll = 0.0;
        for _ in 0..100 {
            scroll += 50.0 * dt;
            manager.update(&mut reg, &net, dt, scroll);
        }

        assert_eq!(started.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(completed.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(reg.components::<Enemy>().len(), 3);
        assert!(manager.all_waves_complete());

        // The spawned line sits at the configured rows.
        let mut ys: Vec<f32> = reg
            .components::<Enemy>()
            .iter()
            .map(|(e, _)| reg.components::<Position>().get(e).unwrap().y)
            .collect();
        ys.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ys, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn time_delay_gates_the_trigger() {
        let mut reg = registry();
        let net = NetSync::new();
        let mut config = one_wave_config(CompletionMode::Immediate);
        config.waves[0].trigger.time_delay = 5.0;
        let mut manager = WaveManager::new(config);

        // Scroll condition satisfied immediately, but time is not.
        manager.update(&mut reg, &net, 0.1, 1000.0);
        assert_eq!(reg.components::<Enemy>().len(), 0);

        for _ in 0..60 {
            manager.update(&mut reg, &net, 0.1, 1000.0);
        }
        assert_eq!(reg.components::<Enemy>().len(), 3);
    }

    #[test]
    fn on_clear_waits_for_enemy_deaths() {
        let mut reg = registry();
        let net = NetSync::new();
        let mut manager = WaveManager::new(one_wave_config(CompletionMode::OnClear));

        manager.update(&mut reg, &net, 0.1, 500.0);
        assert!(!manager.all_waves_complete());

        let enemies: Vec<Entity> = reg.components::<Enemy>().entities();
        for enemy in enemies {
            reg.kill_entity(enemy);
        }
        manager.update(&mut reg, &net, 0.1, 500.0);
        assert!(manager.all_waves_complete());
        let (_, complete) = manager.last_payloads();
        assert_eq!(complete.unwrap().all_waves_complete, 1);
    }
}
