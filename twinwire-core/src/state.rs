//! Bus state tracking
//!
//! One bit: whether the bus is known good, or must be recovered before
//! any further traffic.

/// Dirty/clean state of the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusState {
    dirty: bool,
}

impl Default for BusState {
    fn default() -> Self {
        Self::new()
    }
}

impl BusState {
    /// Create a new tracker. The bus starts in an unknown (dirty) state.
    pub const fn new() -> Self {
        Self { dirty: true }
    }

    /// Record that the last transaction did not complete as designed
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Record that the bus is in a known good state
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Check whether recovery is required
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }
}
