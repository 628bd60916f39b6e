//! The [`System`] trait: a named pass over the registry, run once per tick.

use crate::registry::Registry;

/// A simulation system.
///
/// Systems are registered on a [`Registry`] and executed in registration
/// order by [`Registry::run_systems`]. A system that finds an entity missing
/// an expected component skips that entity; it never aborts the tick.
pub trait System: Send {
    /// Short name for logging and ordering assertions.
    fn name(&self) -> &'static str;

    /// One-time setup, called when the system is registered. The usual place
    /// to subscribe to events.
    fn init(&mut self, _registry: &mut Registry) {}

    /// Advance this system by `dt` seconds.
    fn update(&mut self, registry: &mut Registry, dt: f32);
}
