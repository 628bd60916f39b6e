//! The [`Registry`] composes the entity allocator, per-type component
//! storages, the event bus, and the system list.
//!
//! # Borrowing model
//!
//! Every component storage sits behind its own `RefCell`, so component access
//! takes `&self`: a system may hold a mutable borrow of one storage while
//! reading several others, which is the access pattern every simulation pass
//! needs. A registry is only ever touched by the thread currently ticking its
//! session, so the run-time borrow checks never see contention; a borrow
//! panic means two borrows of the *same* storage in one scope, which is a
//! programmer error.
//!
//! # Ordering contract
//!
//! System registration order *is* execution order. [`run_systems`]
//! (Registry::run_systems) walks the list front to back every tick; tests
//! rely on this and it must stay stable.

use std::any::{type_name, Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::entity::{Entity, EntityAllocator};
use crate::events::EventBus;
use crate::storage::ComponentStorage;
use crate::system::System;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Component marker
// ---------------------------------------------------------------------------

/// Marker trait for component types. Blanket-implemented: any `Send + 'static`
/// type can be a component.
pub trait Component: Send + 'static {}

impl<T: Send + 'static> Component for T {}

// ---------------------------------------------------------------------------
// Type-erased storage
// ---------------------------------------------------------------------------

/// Object-safe view of a storage, enough for entity teardown.
trait AnyStorage: Send {
    fn remove_entity(&self, entity: Entity);
    fn as_any(&self) -> &dyn Any;
}

struct StorageCell<T: Component>(RefCell<ComponentStorage<T>>);

impl<T: Component> AnyStorage for StorageCell<T> {
    fn remove_entity(&self, entity: Entity) {
        self.0.borrow_mut().remove(entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The per-session ECS container.
pub struct Registry {
    allocator: EntityAllocator,
    alive: HashSet<Entity>,
    storages: HashMap<TypeId, Box<dyn AnyStorage>>,
    bus: EventBus,
    systems: Vec<Box<dyn System>>,
}

impl Registry {
    /// Create an empty registry with no registered components or systems.
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            alive: HashSet::new(),
            storages: HashMap::new(),
            bus: EventBus::new(),
            systems: Vec::new(),
        }
    }

    // -- component registration ---------------------------------------------

    /// Register a component type. Idempotent; registering twice keeps the
    /// existing storage.
    pub fn register_component<T: Component>(&mut self) {
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(StorageCell::<T>(RefCell::new(ComponentStorage::new()))));
    }

    fn cell<T: Component>(&self) -> Result<&StorageCell<T>, EcsError> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref::<StorageCell<T>>())
            .ok_or_else(|| EcsError::UnknownComponent {
                name: type_name::<T>(),
            })
    }

    fn cell_or_panic<T: Component>(&self) -> &StorageCell<T> {
        self.cell::<T>().unwrap_or_else(|e| panic!("{e}"))
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Allocate a fresh entity. Visible to subsequent systems within the
    /// same tick.
    pub fn spawn_entity(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        self.alive.insert(entity);
        entity
    }

    /// Destroy an entity: remove it from every storage and forget it.
    /// No-op for entities that are already dead.
    pub fn kill_entity(&mut self, entity: Entity) {
        if !self.alive.remove(&entity) {
            return;
        }
        for storage in self.storages.values() {
            storage.remove_entity(entity);
        }
        trace!(entity = entity.id(), "entity destroyed");
    }

    /// Whether `entity` is currently alive.
    pub fn entity_exists(&self, entity: Entity) -> bool {
        self.alive.contains(&entity)
    }

    /// Number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.alive.len()
    }

    // -- component access ---------------------------------------------------

    /// Attach (or replace) a component on an entity.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    pub fn add_component<T: Component>(&self, entity: Entity, component: T) {
        self.cell_or_panic::<T>().0.borrow_mut().insert(entity, component);
    }

    /// Detach a component from an entity, returning it if present.
    pub fn remove_component<T: Component>(&self, entity: Entity) -> Option<T> {
        self.cell_or_panic::<T>().0.borrow_mut().remove(entity)
    }

    /// Whether `entity` has a `T` component. O(1); returns `false` for
    /// unregistered types, so presence probes never panic.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        match self.cell::<T>() {
            Ok(cell) => cell.0.borrow().contains(entity),
            Err(_) => false,
        }
    }

    /// Shared borrow of the `T` storage.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered, or if the storage is already
    /// mutably borrowed in this scope.
    pub fn components<T: Component>(&self) -> Ref<'_, ComponentStorage<T>> {
        self.cell_or_panic::<T>().0.borrow()
    }

    /// Mutable borrow of the `T` storage.
    pub fn components_mut<T: Component>(&self) -> RefMut<'_, ComponentStorage<T>> {
        self.cell_or_panic::<T>().0.borrow_mut()
    }

    /// Fallible variant of [`components`](Self::components) for callers that
    /// treat an unregistered type as empty rather than a defect.
    pub fn try_components<T: Component>(&self) -> Result<Ref<'_, ComponentStorage<T>>, EcsError> {
        Ok(self.cell::<T>()?.0.borrow())
    }

    // -- events -------------------------------------------------------------

    /// A shared handle to this registry's event bus.
    pub fn event_bus(&self) -> EventBus {
        self.bus.clone()
    }

    /// Publish an event synchronously through this registry's bus.
    pub fn publish<E: Any>(&mut self, event: &E) {
        let bus = self.bus.clone();
        bus.publish(self, event);
    }

    /// Drain the deferred event queue.
    pub fn process_deferred_events(&mut self) {
        let bus = self.bus.clone();
        bus.process_deferred(self);
    }

    // -- systems ------------------------------------------------------------

    /// Register a system. Systems execute in registration order; the
    /// system's `init` runs immediately, before it joins the list.
    pub fn register_system<S: System + 'static>(&mut self, mut system: S) {
        system.init(self);
        self.systems.push(Box::new(system));
    }

    /// Run every registered system once, in registration order.
    ///
    /// Systems registered *during* a run are not executed until the next
    /// call.
    pub fn run_systems(&mut self, dt: f32) {
        let mut systems = std::mem::take(&mut self.systems);
        for system in systems.iter_mut() {
            trace!(system = system.name(), "running system");
            system.update(self, dt);
        }
        debug_assert!(
            self.systems.is_empty(),
            "systems must not be registered while a tick is running"
        );
        self.systems = systems;
    }

    /// Names of all registered systems, in execution order.
    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name()).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.alive.len())
            .field("component_types", &self.storages.len())
            .field("systems", &self.systems.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Vel {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Hp(i32);

    fn setup() -> Registry {
        let mut reg = Registry::new();
        reg.register_component::<Pos>();
        reg.register_component::<Vel>();
        reg.register_component::<Hp>();
        reg
    }

    #[test]
    fn spawn_add_get() {
        let mut reg = setup();
        let e = reg.spawn_entity();
        reg.add_component(e, Pos { x: 1.0, y: 2.0 });

        assert!(reg.has_component::<Pos>(e));
        assert!(!reg.has_component::<Vel>(e));
        assert_eq!(reg.components::<Pos>().get(e), Some(&Pos { x: 1.0, y: 2.0 }));
    }

    #[test]
    fn kill_entity_clears_every_storage() {
        let mut reg = setup();
        let e = reg.spawn_entity();
        reg.add_component(e, Pos { x: 0.0, y: 0.0 });
        reg.add_component(e, Vel { x: 1.0, y: 1.0 });
        reg.add_component(e, Hp(5));

        reg.kill_entity(e);

        assert!(!reg.entity_exists(e));
        assert!(!reg.has_component::<Pos>(e));
        assert!(!reg.has_component::<Vel>(e));
        assert!(!reg.has_component::<Hp>(e));
        assert!(reg.components::<Pos>().iter().all(|(ent, _)| ent != e));
    }

    #[test]
    fn kill_is_idempotent() {
        let mut reg = setup();
        let e = reg.spawn_entity();
        reg.kill_entity(e);
        reg.kill_entity(e);
        assert_eq!(reg.entity_count(), 0);
    }

    #[test]
    fn simultaneous_borrows_of_distinct_storages() {
        let mut reg = setup();
        let e = reg.spawn_entity();
        reg.add_component(e, Pos { x: 0.0, y: 0.0 });
        reg.add_component(e, Vel { x: 3.0, y: -1.0 });

        let mut positions = reg.components_mut::<Pos>();
        let velocities = reg.components::<Vel>();
        let vel = velocities.get(e).unwrap();
        let pos = positions.get_mut(e).unwrap();
        pos.x += vel.x;
        pos.y += vel.y;
        drop(positions);

        assert_eq!(reg.components::<Pos>().get(e), Some(&Pos { x: 3.0, y: -1.0 }));
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn unregistered_component_panics() {
        struct Nope;
        let reg = Registry::new();
        let _ = reg.components::<Nope>();
    }

    #[test]
    fn has_component_on_unregistered_type_is_false() {
        struct Nope;
        let mut reg = Registry::new();
        let e = reg.spawn_entity();
        assert!(!reg.has_component::<Nope>(e));
    }

    #[test]
    fn systems_run_in_registration_order() {
        use crate::system::System;

        struct Tag(&'static str, std::sync::Arc<std::sync::Mutex<Vec<&'static str>>>);
        impl System for Tag {
            fn name(&self) -> &'static str {
                self.0
            }
            fn update(&mut self, _reg: &mut Registry, _dt: f32) {
                self.1.lock().unwrap().push(self.0);
            }
        }

        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut reg = Registry::new();
        reg.register_system(Tag("alpha", order.clone()));
        reg.register_system(Tag("beta", order.clone()));
        reg.register_system(Tag("gamma", order.clone()));

        assert_eq!(reg.system_names(), vec!["alpha", "beta", "gamma"]);
        reg.run_systems(0.016);
        reg.run_systems(0.016);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["alpha", "beta", "gamma", "alpha", "beta", "gamma"]
        );
    }

    #[test]
    fn publish_through_registry_reaches_bus_subscribers() {
        struct Bump(Entity);

        let mut reg = setup();
        let e = reg.spawn_entity();
        reg.add_component(e, Hp(1));

        reg.event_bus().subscribe::<Bump, _>(|reg, ev| {
            if let Some(hp) = reg.components_mut::<Hp>().get_mut(ev.0) {
                hp.0 += 1;
            }
        });

        reg.publish(&Bump(e));
        assert_eq!(reg.components::<Hp>().get(e), Some(&Hp(2)));
    }
}
