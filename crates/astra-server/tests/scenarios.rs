//! End-to-end scenarios over full sessions: combat, invulnerability, cell
//! eating, wave triggers, snapshot cadence, parallel session pools, and
//! client resync.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use astra_ecs::prelude::*;
use astra_protocol::packet::{input_flags, validate, DestroyReason, PacketType};
use astra_protocol::payload::{decode_snapshot, ClientInput, ServerEntityDestroy, Wire};
use astra_server::components::*;
use astra_server::config::SNAPSHOT_INTERVAL;
use astra_server::events::*;
use astra_server::pool::{SessionPool, SessionTask};
use astra_server::session::Session;
use astra_server::spawn;
use astra_server::sync::PlayerCommand;
use astra_server::systems::{CellCollisionSystem, CollisionSystem, HealthSystem};
use astra_server::sync::{NetIdAlloc, NetSync};
use astra_server::waves::{CompletionMode, MapConfig, SpawnConfig, SpawnPattern, WaveConfig,
    WaveManager, WaveTrigger};

const TICK_DT: f32 = 1.0 / 32.0;

fn empty_map(scroll_speed: f32) -> MapConfig {
    MapConfig {
        name: "test".into(),
        scroll_speed: Some(scroll_speed),
        loop_waves: false,
        completion: CompletionMode::Immediate,
        checkpoints: vec![],
        waves: vec![],
    }
}

fn one_wave_map() -> MapConfig {
    MapConfig {
        name: "s4".into(),
        scroll_speed: Some(50.0),
        loop_waves: false,
        completion: CompletionMode::Immediate,
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

/// Build the S1 fixture: a firing player at (100, 100) and a stationary
/// basic enemy (20 hp) at (500, 100). Returns the enemy entity.
fn setup_s1(session: &mut Session) -> Entity {
    session.add_player(1, "ace", 0);
    let player = session.player_entity(1).unwrap();
    {
        let registry = session.registry_mut();
        let mut positions = registry.components_mut::<Position>();
        let pos = positions.get_mut(player).unwrap();
        pos.x = 100.0;
        pos.y = 100.0;
    }

    // The scenario needs a pinned target: strip the steering profile and
    // park the enemy.
    let net = session.net();
    let enemy = spawn::spawn_enemy(session.registry_mut(), &net, EnemyKind::Basic, 500.0, 100.0);
    {
        let registry = session.registry_mut();
        let _ = registry.remove_component::<Ai>(enemy);
        let mut velocities = registry.components_mut::<Velocity>();
        velocities.get_mut(enemy).unwrap().x = 0.0;
    }

    // Hold the trigger from the first tick on.
    session.handle_input(
        1,
        PlayerCommand::Move(ClientInput::from_flags(1, input_flags::FIRE, 1)),
    );
    enemy
}

// ---------------------------------------------------------------------------
// S1 -- damage and kill
// ---------------------------------------------------------------------------

#[test]
fn s1_two_hits_kill_the_enemy_within_two_seconds() {
    let mut session = Session::scroller(1, WaveManager::new(empty_map(100.0)), vec![]);
    let enemy = setup_s1(&mut session);

    let hits = Arc::new(AtomicU32::new(0));
    let kills = Arc::new(AtomicU32::new(0));
    {
        let hits = hits.clone();
        let target = enemy;
        session
            .registry()
            .event_bus()
            .subscribe::<DamageEvent, _>(move |_reg, ev| {
                if ev.target == target {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            });
        let kills = kills.clone();
        session
            .registry()
            .event_bus()
            .subscribe::<EnemyKilledEvent, _>(move |_reg, _ev| {
                kills.fetch_add(1, Ordering::SeqCst);
            });
    }

    // Drain the join/spawn payloads so only tick traffic remains.
    session.net().drain_packets();

    let mut destroy_payloads = Vec::new();
    for _ in 0..64 {
        session.tick(TICK_DT);
        for packet in session.net().drain_packets() {
            let (header, payload) = validate(&packet).unwrap();
            if header.packet_type == PacketType::ServerEntityDestroy {
                let destroy = ServerEntityDestroy::decode(payload).unwrap();
                if destroy.entity_id == enemy.id() {
                    destroy_payloads.push(destroy);
                }
            }
        }
    }

    assert_eq!(hits.load(Ordering::SeqCst), 2, "exactly two projectile hits");
    assert_eq!(kills.load(Ordering::SeqCst), 1, "exactly one kill event");
    assert!(!session.registry().entity_exists(enemy));
    assert_eq!(destroy_payloads.len(), 1, "exactly one destroy payload");
    assert_eq!(destroy_payloads[0].reason, DestroyReason::Killed);

    // Kill credit: the shooter's score went up by the basic enemy's value,
    // exactly once.
    let player = session.player_entity(1).unwrap();
    assert_eq!(
        session.registry().components::<Score>().get(player).unwrap().value,
        100
    );
}

// ---------------------------------------------------------------------------
// S2 -- invulnerability window
// ---------------------------------------------------------------------------

#[test]
fn s2_invulnerability_gates_repeat_contact_damage() {
    let mut reg = Registry::new();
    reg.register_component::<Position>();
    reg.register_component::<Velocity>();
    reg.register_component::<Collider>();
    reg.register_component::<Controllable>();
    reg.register_component::<Enemy>();
    reg.register_component::<Projectile>();
    reg.register_component::<Wall>();
    reg.register_component::<Bonus>();
    reg.register_component::<Shield>();
    reg.register_component::<Invulnerability>();
    reg.register_component::<Health>();
    reg.register_component::<Damage>();
    reg.register_component::<FiredBy>();
    reg.register_component::<Player>();
    reg.register_component::<ToDestroy>();
    reg.register_component::<DestroyInfo>();
    reg.register_system(CollisionSystem);
    reg.register_system(HealthSystem::new(NetSync::new(), 1));

    let player = reg.spawn_entity();
    reg.add_component(player, Position { x: 100.0, y: 100.0 });
    reg.add_component(player, Collider { width: 80.0, height: 80.0 });
    reg.add_component(player, Controllable { speed: 300.0 });
    reg.add_component(player, Health::full(100));

    // An enemy parked on top of the player.
    let enemy = reg.spawn_entity();
    reg.add_component(enemy, Position { x: 120.0, y: 100.0 });
    reg.add_component(enemy, Collider { width: 64.0, height: 64.0 });
    reg.add_component(
        enemy,
        Enemy {
            kind: EnemyKind::Basic,
            score_value: 100,
        },
    );

    let dt = 0.05f32;
    let hp_at = |reg: &Registry| reg.components::<Health>().get(player).unwrap().current;

    // t = 0: first contact lands.
    reg.run_systems(dt);
    assert_eq!(hp_at(&reg), 80);

    // Up to t = 1.5 s: still invulnerable, zero further damage.
    for _ in 0..29 {
        reg.run_systems(dt);
    }
    assert_eq!(hp_at(&reg), 80);

    // Past t = 3.1 s: the window expired and the contact hits again.
    for _ in 0..33 {
        reg.run_systems(dt);
    }
    assert_eq!(hp_at(&reg), 60);
}

// ---------------------------------------------------------------------------
// S3 -- cell eating
// ---------------------------------------------------------------------------

#[test]
fn s3_heavier_cell_eats_lighter_on_overlap() {
    let mut reg = Registry::new();
    reg.register_component::<Position>();
    reg.register_component::<Velocity>();
    reg.register_component::<Mass>();
    reg.register_component::<CircleCollider>();
    reg.register_component::<Food>();
    reg.register_component::<PlayerCell>();
    reg.register_component::<CellOwner>();
    reg.register_component::<EjectedMass>();
    reg.register_component::<Virus>();
    reg.register_component::<MergeTimer>();
    reg.register_component::<MovementTarget>();
    reg.register_component::<NetworkId>();
    reg.register_component::<ToDestroy>();
    reg.register_component::<DestroyInfo>();

    let net = NetSync::new();
    let ids = NetIdAlloc::new();
    let cell_a = spawn::spawn_player_cell(&mut reg, &net, &ids, 1, "a", 0xFF0000FF, 100.0, 100.0, 20.0);
    let cell_b = spawn::spawn_player_cell(&mut reg, &net, &ids, 2, "b", 0x00FF00FF, 110.0, 100.0, 10.0);

    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let sink = events.clone();
        reg.event_bus()
            .subscribe::<CellAteCellEvent, _>(move |_reg, ev| {
                sink.lock().unwrap().push((ev.eater, ev.eaten));
            });
    }

    // Radii from the mass curve make 10 units a deep overlap, and
    // 20 >= 1.25 * 10, so A eats B in one tick.
    reg.register_system(CellCollisionSystem::new(net, ids));
    reg.run_systems(TICK_DT);

    assert_eq!(reg.components::<Mass>().get(cell_a).unwrap().value, 30.0);
    assert!(reg.has_component::<ToDestroy>(cell_b));
    assert_eq!(*events.lock().unwrap(), vec![(cell_a, cell_b)]);
}

// ---------------------------------------------------------------------------
// S4 -- wave trigger
// ---------------------------------------------------------------------------

#[test]
fn s4_wave_fires_exactly_once() {
    let mut session = Session::scroller(4, WaveManager::new(one_wave_map()), vec![]);

    let started = Arc::new(AtomicU32::new(0));
    let completed = Arc::new(AtomicU32::new(0));
    {
        let sink = started.clone();
        session
            .registry()
            .event_bus()
            .subscribe::<WaveStartedEvent, _>(move |_reg, _ev| {
                sink.fetch_add(1, Ordering::SeqCst);
            });
        let sink = completed.clone();
        session
            .registry()
            .event_bus()
            .subscribe::<WaveCompletedEvent, _>(move |_reg, _ev| {
                sink.fetch_add(1, Ordering::SeqCst);
            });
    }

    // 5 s at scroll speed 50 crosses the 200-unit trigger once. The spawn
    // rows are checked on the firing tick itself, before enemy steering
    // starts weaving them.
    let mut spawn_rows_checked = false;
    for _ in 0..160 {
        session.tick(TICK_DT);
        if started.load(Ordering::SeqCst) == 1 && !spawn_rows_checked {
            spawn_rows_checked = true;
            let registry = session.registry();
            let enemies = registry.components::<Enemy>();
            let positions = registry.components::<Position>();
            let mut ys: Vec<f32> = enemies
                .iter()
                .map(|(e, _)| positions.get(e).unwrap().y)
                .collect();
            ys.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_eq!(ys, vec![100.0, 200.0, 300.0]);
        }
    }
    assert!(spawn_rows_checked, "the wave must have fired");
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(session.registry().components::<Enemy>().len(), 3);

    // Another 5 s must not re-fire the wave.
    for _ in 0..160 {
        session.tick(TICK_DT);
    }
    assert_eq!(started.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// S5 -- snapshot cadence
// ---------------------------------------------------------------------------

#[test]
fn s5_snapshot_cadence_and_contents() {
    let mut session = Session::scroller(5, WaveManager::new(empty_map(100.0)), vec![]);
    session.add_player(1, "one", 0);
    session.add_player(2, "two", 5);
    let net = session.net();
    for i in 0..3 {
        let enemy = spawn::spawn_enemy(
            session.registry_mut(),
            &net,
            EnemyKind::Basic,
            900.0,
            200.0 + i as f32 * 150.0,
        );
        // Parked fixtures: no steering, no drift.
        let registry = session.registry_mut();
        let _ = registry.remove_component::<Ai>(enemy);
        registry.components_mut::<Velocity>().get_mut(enemy).unwrap().x = 0.0;
    }
    session.net().drain_packets();

    let mut snapshots = Vec::new();
    for _ in 0..32 {
        session.tick(TICK_DT);
        for packet in session.net().drain_packets() {
            let (header, payload) = validate(&packet).unwrap();
            if header.packet_type == PacketType::ServerSnapshot {
                snapshots.push(decode_snapshot(payload).unwrap());
            }
        }
    }

    // 1 s of simulation at a 0.05 s snapshot interval: exactly 20 snapshots.
    assert_eq!(snapshots.len(), 20);
    let mut last_tick = 0;
    for (header, states) in &snapshots {
        assert_eq!(states.len(), 5, "two players and three enemies");
        assert!(header.server_tick > last_tick, "server_tick must increase");
        last_tick = header.server_tick;
    }
    assert_eq!(SNAPSHOT_INTERVAL, 0.05);
}

// ---------------------------------------------------------------------------
// S6 -- parallel sessions
// ---------------------------------------------------------------------------

#[test]
fn s6_eight_sessions_converge_under_a_six_worker_pool() {
    let pool = SessionPool::new(6);
    let mut fixtures = Vec::new();
    for id in 0..8u32 {
        let mut session = Session::scroller(id, WaveManager::new(empty_map(100.0)), vec![]);
        let enemy = setup_s1(&mut session);
        fixtures.push((Arc::new(Mutex::new(session)), enemy));
    }

    // 2 s of simulation, one barrier per tick.
    for _ in 0..64 {
        let tasks = fixtures
            .iter()
            .map(|(session, _)| SessionTask {
                session: Arc::clone(session),
                dt: TICK_DT,
            })
            .collect();
        pool.schedule_batch(tasks);
        pool.wait_for_completion();
    }

    for (session, enemy) in &fixtures {
        let session = session.lock().unwrap();
        assert!(
            !session.registry().entity_exists(*enemy),
            "every session must have destroyed its enemy"
        );
        assert_eq!(session.tick_count(), 64);
    }
}

// ---------------------------------------------------------------------------
// Resync
// ---------------------------------------------------------------------------

#[test]
fn resync_emits_one_spawn_per_live_entity() {
    let mut session = Session::scroller(9, WaveManager::new(empty_map(100.0)), vec![]);
    session.add_player(1, "one", 0);
    session.add_player(2, "two", 0);
    let net = session.net();
    let e1 = spawn::spawn_enemy(session.registry_mut(), &net, EnemyKind::Fast, 800.0, 300.0);
    let e2 = spawn::spawn_enemy(session.registry_mut(), &net, EnemyKind::Tank, 900.0, 500.0);

    // One live projectile.
    session.handle_input(
        1,
        PlayerCommand::Move(ClientInput::from_flags(1, input_flags::FIRE, 1)),
    );
    session.tick(TICK_DT);
    session.net().drain_packets();

    session.resync_client(1, 1);
    let mut spawn_ids = Vec::new();
    for packet in session.net().drain_packets() {
        let (header, payload) = validate(&packet).unwrap();
        if header.packet_type == PacketType::ServerEntitySpawn {
            let spawn = astra_protocol::payload::ServerEntitySpawn::decode(payload).unwrap();
            spawn_ids.push(spawn.entity_id);
        }
    }

    let expected = {
        let registry = session.registry();
        let players = registry.components::<Player>().len();
        let enemies = registry.components::<Enemy>().len();
        let projectiles = registry.components::<Projectile>().len();
        players + enemies + projectiles
    };
    assert!(expected >= 5, "fixture should have players, enemies, a shot");
    assert_eq!(spawn_ids.len(), expected);

    // Exactly one spawn per entity: no duplicates.
    let mut deduped = spawn_ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), spawn_ids.len());
    assert!(spawn_ids.contains(&e1.id()));
    assert!(spawn_ids.contains(&e2.id()));
}
