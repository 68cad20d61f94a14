//! A value type offered both inline and boxed.
//!
//! [`MagicAdder`] is the single source of truth: a `#[repr(C)]` struct with
//! one `u32` field, small enough to pass by value across a C boundary.
//! [`HeapAdder`] is the same value behind an owned allocation for callers
//! that need a stable pointer. Both process input through [`process`].

use std::ops::Deref;

use tracing::debug;

use crate::error::{HandleKind, Result, TetherError};

/// Adds a fixed amount to every value it processes.
///
/// The layout is part of the C ABI: it must match
/// `typedef struct magic_adder_t { uint32_t amount; } magic_adder_t;`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MagicAdder {
    amount: u32,
}

impl MagicAdder {
    /// Create a new [`MagicAdder`]. Never allocates.
    pub const fn new(amount: u32) -> MagicAdder {
        MagicAdder { amount }
    }

    pub const fn amount(&self) -> u32 {
        self.amount
    }

    /// Process a value using this [`MagicAdder`].
    pub fn process_value(&self, value: u32) -> u32 {
        process(self, value)
    }
}

/// `amount + value`, wrapping at `2^32`.
pub fn process(adder: &MagicAdder, value: u32) -> u32 {
    adder.amount.wrapping_add(value)
}

/// A heap-allocated [`MagicAdder`].
///
/// Created fallibly, released exactly once: [`HeapAdder::destroy`] consumes
/// the box, and dropping it releases the allocation too.
#[derive(Debug, PartialEq, Eq)]
pub struct HeapAdder {
    // A one-element array so the allocation can go through `Vec::try_reserve`.
    slot: Box<[MagicAdder; 1]>,
}

impl HeapAdder {
    /// Allocate a new adder, reporting exhaustion instead of aborting.
    pub fn try_new(amount: u32) -> Result<HeapAdder> {
        let failed = || TetherError::AllocationFailed {
            kind: HandleKind::Adder,
        };
        let mut storage = Vec::new();
        storage.try_reserve_exact(1).map_err(|_| failed())?;
        storage.push(MagicAdder::new(amount));
        let slot: Box<[MagicAdder; 1]> = storage
            .into_boxed_slice()
            .try_into()
            .map_err(|_| failed())?;
        debug!(kind = "adder", amount, "allocated");
        Ok(HeapAdder { slot })
    }

    /// Copy out the inline value.
    pub fn value(&self) -> MagicAdder {
        self.slot[0]
    }

    /// Release the allocation.
    pub fn destroy(self) {
        debug!(kind = "adder", amount = self.amount(), "destroyed");
    }

    /// Give up the wrapper and keep the raw allocation.
    pub fn into_boxed(self) -> Box<[MagicAdder; 1]> {
        self.slot
    }

    /// Rewrap an allocation produced by [`HeapAdder::into_boxed`].
    pub fn from_boxed(slot: Box<[MagicAdder; 1]>) -> HeapAdder {
        HeapAdder { slot }
    }
}

impl Deref for HeapAdder {
    type Target = MagicAdder;

    fn deref(&self) -> &MagicAdder {
        &self.slot[0]
    }
}

impl AsRef<MagicAdder> for HeapAdder {
    fn as_ref(&self) -> &MagicAdder {
        self
    }
}
