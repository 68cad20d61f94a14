//! `magicadder_*` exports: one value type, by value and by pointer.

use std::ptr;

use tether_core::{HeapAdder, MagicAdder};

use crate::error::{set_error, set_last_error, LibdatabaseStatus};
use crate::state::lock_state;

/// Create a new [`MagicAdder`], on the stack
#[no_mangle]
pub extern "C" fn magicadder_new(amount: u32) -> MagicAdder {
    MagicAdder::new(amount)
}

/// Use a [`MagicAdder`] to process a number.
///
/// Accepts both a by-value adder's address and a `magicadder_allocate`
/// result. NULL yields 0 and sets the last error.
#[no_mangle]
pub extern "C" fn magicadder_process_value(adder: *const MagicAdder, value: u32) -> u32 {
    // SAFETY: Caller guarantees `adder` is NULL or points to a live
    // `magic_adder_t` (a local value or an unfreed allocation).
    match unsafe { adder.as_ref() } {
        Some(ma) => ma.process_value(value),
        None => {
            set_last_error("Null adder pointer");
            0
        }
    }
}

/// Heap allocate a new [`MagicAdder`]. Returns NULL if allocation fails.
#[no_mangle]
pub extern "C" fn magicadder_allocate(amount: u32) -> *mut MagicAdder {
    let Ok(mut state) = lock_state() else {
        return ptr::null_mut();
    };
    // Reserve tracking space first so a tracked allocation never needs undoing.
    if !state.reserve_adder() {
        set_last_error("Allocation failed for adder");
        return ptr::null_mut();
    }
    match HeapAdder::try_new(amount) {
        Ok(heap) => {
            let raw = Box::into_raw(heap.into_boxed()).cast::<MagicAdder>();
            state.track_adder(raw.addr());
            raw
        }
        Err(e) => {
            set_error(&e);
            ptr::null_mut()
        }
    }
}

/// Destroy a [`MagicAdder`] that was created with `magicadder_allocate`.
///
/// NULL is a no-op. A pointer that did not come from `magicadder_allocate`,
/// or was already freed, is refused with `STALE_HANDLE` and left untouched.
#[no_mangle]
pub extern "C" fn magicadder_free(adder: *mut MagicAdder) -> LibdatabaseStatus {
    if adder.is_null() {
        return LibdatabaseStatus::Ok;
    }
    let mut state = match lock_state() {
        Ok(state) => state,
        Err(status) => return status,
    };
    if !state.release_adder(adder.addr()) {
        set_last_error("Adder pointer was not allocated by magicadder_allocate or was already freed");
        return LibdatabaseStatus::StaleHandle;
    }
    // SAFETY: The address was produced by `Box::into_raw` on a
    // `Box<[MagicAdder; 1]>` in `magicadder_allocate`, and it has just been
    // removed from the live set under the lock, so it is reclaimed once.
    let boxed = unsafe { Box::from_raw(adder.cast::<[MagicAdder; 1]>()) };
    HeapAdder::from_boxed(boxed).destroy();
    LibdatabaseStatus::Ok
}
