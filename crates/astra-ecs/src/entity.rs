//! Entity identifiers and allocation.
//!
//! An [`Entity`] is an opaque 32-bit handle. Id 0 is reserved as the null
//! entity and is never handed out by the allocator; systems use it as an
//! "absent" sentinel in relation components.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A stable entity identifier, unique within one registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u32);

impl Entity {
    /// The reserved null entity (id 0). Never allocated.
    pub const NULL: Entity = Entity(0);

    /// Construct an entity from a raw id.
    #[inline]
    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Raw `u32` representation, used as the sparse-array index and as the
    /// on-wire entity id.
    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }

    /// Whether this is the reserved null entity.
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out monotonically increasing entity ids, starting at 1.
///
/// Ids are never recycled; a registry lives for one game session, so the
/// 32-bit space is far larger than any session will consume.
#[derive(Debug)]
pub struct EntityAllocator {
    next: u32,
}

impl EntityAllocator {
    /// Create a new allocator. The first allocated entity has id 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate a fresh [`Entity`].
    pub fn allocate(&mut self) -> Entity {
        let id = self.next;
        self.next = self.next.checked_add(1).expect("entity id space exhausted");
        Entity(id)
    }

    /// Number of ids handed out so far.
    pub fn allocated_count(&self) -> u32 {
        self.next - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
