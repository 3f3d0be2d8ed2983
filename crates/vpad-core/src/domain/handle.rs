//! Opaque handles for attached virtual controllers.
//!
//! # Why generation-checked handles? (for beginners)
//!
//! The host keeps its controllers in a small table of slots.  When a
//! controller is detached its slot is freed and may later be reused by a new
//! controller.  If handles were plain slot indices, a caller holding an old
//! handle would silently drive the *new* controller in that slot.
//!
//! Each handle therefore also carries the slot's *generation*: a counter that
//! is bumped every time the slot is freed.  A lookup only succeeds when both
//! the index and the generation match, so stale handles are rejected with a
//! cheap comparison instead of aliasing another controller.

use std::fmt;

/// Caller-held reference to one attached virtual controller.
///
/// Handles are `Copy`; copying one does not duplicate the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerHandle {
    index: u32,
    generation: u32,
}

impl ControllerHandle {
    /// Builds a handle from its slot index and generation.
    ///
    /// Only the controller table should mint handles; a handle built by hand
    /// is valid only if it happens to match a live slot.
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_with_different_generations_are_distinct() {
        let first = ControllerHandle::from_parts(0, 0);
        let reused = ControllerHandle::from_parts(0, 1);
        assert_ne!(first, reused);
        assert_eq!(first.index(), reused.index());
    }

    #[test]
    fn test_display_shows_index_and_generation() {
        assert_eq!(ControllerHandle::from_parts(3, 7).to_string(), "#3.7");
    }
}
