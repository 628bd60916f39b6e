//! Property tests over the simulation invariants: exact integration,
//! idempotent bounds clamping, and antisymmetric eating.

use astra_ecs::prelude::*;
use astra_server::components::*;
use astra_server::config::arena;
use astra_server::spawn;
use astra_server::sync::{NetIdAlloc, NetSync};
use astra_server::systems::{CellCollisionSystem, MapBoundsSystem, PhysiqueSystem};
use proptest::prelude::*;

fn finite_f32(range: std::ops::Range<i32>) -> impl Strategy<Value = f32> {
    range.prop_map(|v| v as f32 * 0.25)
}

fn movement_registry() -> Registry {
    let mut reg = Registry::new();
    reg.register_component::<Position>();
    reg.register_component::<Velocity>();
    reg.register_component::<Collider>();
    reg.register_component::<CircleCollider>();
    reg.register_component::<Controllable>();
    reg
}

fn arena_registry() -> Registry {
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
    reg
}

proptest! {
    /// Invariant: after one integration step, `new_pos == old_pos + vel * dt`
    /// exactly, in IEEE single precision.
    #[test]
    fn physique_integration_is_exact(
        x in finite_f32(-40_000..40_000),
        y in finite_f32(-40_000..40_000),
        vx in finite_f32(-4_000..4_000),
        vy in finite_f32(-4_000..4_000),
        dt_steps in 1..8u32,
    ) {
        let dt = dt_steps as f32 / 256.0;
        let mut reg = movement_registry();
        let e = reg.spawn_entity();
        reg.add_component(e, Position { x, y });
        reg.add_component(e, Velocity { x: vx, y: vy });

        PhysiqueSystem.update(&mut reg, dt);

        let pos = *reg.components::<Position>().get(e).unwrap();
        prop_assert_eq!(pos.x.to_bits(), (x + vx * dt).to_bits());
        prop_assert_eq!(pos.y.to_bits(), (y + vy * dt).to_bits());
    }

    /// Invariant: the bounds clamp is idempotent.
    #[test]
    fn map_bounds_clamp_is_idempotent(
        x in finite_f32(-80_000..80_000),
        y in finite_f32(-80_000..80_000),
        radius in finite_f32(4..400),
    ) {
        let mut reg = movement_registry();
        let e = reg.spawn_entity();
        reg.add_component(e, Position { x, y });
        reg.add_component(e, CircleCollider { radius });

        let mut bounds = MapBoundsSystem::new(arena::MAP_WIDTH, arena::MAP_HEIGHT);
        bounds.update(&mut reg, 0.0);
        let once = *reg.components::<Position>().get(e).unwrap();
        bounds.update(&mut reg, 0.0);
        let twice = *reg.components::<Position>().get(e).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Invariant: eating is antisymmetric. Whatever the masses and overlap,
    /// at most one of a pair of cells dies in a tick, and the dead one is
    /// never the heavier.
    #[test]
    fn cell_eating_is_antisymmetric(
        mass_a in finite_f32(40..2_000),
        mass_b in finite_f32(40..2_000),
        separation in finite_f32(0..200),
    ) {
        let mut reg = arena_registry();
        let net = NetSync::new();
        let ids = NetIdAlloc::new();
        let a = spawn::spawn_player_cell(
            &mut reg, &net, &ids, 1, "a", 0, 500.0, 500.0, mass_a,
        );
        let b = spawn::spawn_player_cell(
            &mut reg, &net, &ids, 2, "b", 0, 500.0 + separation, 500.0, mass_b,
        );

        let mut system = CellCollisionSystem::new(net, ids);
        system.update(&mut reg, 1.0 / 32.0);

        let a_dead = reg.has_component::<ToDestroy>(a);
        let b_dead = reg.has_component::<ToDestroy>(b);
        prop_assert!(!(a_dead && b_dead), "both cells of a pair died");
        if a_dead {
            prop_assert!(arena::can_eat(mass_b, mass_a));
        }
        if b_dead {
            prop_assert!(arena::can_eat(mass_a, mass_b));
        }
    }
}
