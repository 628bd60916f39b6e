//! astra-server -- the authoritative simulation and its server plumbing.
//!
//! Layering, leaves first: components and events are plain data; systems are
//! passes over the registry; a [`session::Session`] wires one world together
//! with its [`sync::NetSync`] queue boundary; the [`pool::SessionPool`] ticks
//! many sessions in parallel behind a barrier; and the [`net`] adapter moves
//! packets between sockets and sessions.

pub mod components;
pub mod config;
pub mod events;
pub mod levels;
pub mod net;
pub mod pool;
pub mod server;
pub mod session;
pub mod snapshot;
pub mod spawn;
pub mod sync;
pub mod systems;
pub mod waves;
