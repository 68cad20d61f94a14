//! Process-wide state behind the C ABI.
//!
//! One [`Registry`] serves every C caller. C handles are opaque pointers
//! whose address is a packed [`HandleId`] token; they are never dereferenced,
//! so a stale or forged handle is a failed lookup rather than a wild read.
//! The token's spare high bits carry the handle kind, so a `table_t *` passed
//! where a `database_t *` is expected never resolves.
//! Heap adders are real allocations, tracked by address so that freeing an
//! unknown or already-freed pointer is refused.

use std::marker::{PhantomData, PhantomPinned};
use std::sync::{LazyLock, Mutex, MutexGuard};

use tether_core::{DatabaseHandle, HandleId, OwnerId, Registry, RowHandle, TableHandle};

use crate::error::{set_last_error, LibdatabaseStatus};

#[cfg(not(target_pointer_width = "64"))]
compile_error!("tether-capi packs 64-bit handle tokens into pointers and needs a 64-bit target");

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident => $typed:ident, tag = $tag:expr) => {
        $(#[$meta])*
        #[repr(C)]
        pub struct $name {
            _opaque: [u8; 0],
            _marker: PhantomData<(*mut u8, PhantomPinned)>,
        }

        impl $name {
            pub(crate) fn into_ptr(handle: $typed) -> *mut $name {
                token_ptr($tag, handle.id())
            }

            /// Decode a pointer issued by the registry owned by `owner`.
            pub(crate) fn from_ptr(ptr: *const $name, owner: OwnerId) -> Option<$typed> {
                id_from_ptr($tag, ptr, owner).map($typed::from_id)
            }
        }
    };
}

opaque_handle!(
    /// C `database_t`.
    OpaqueDatabase => DatabaseHandle, tag = 1
);
opaque_handle!(
    /// C `table_t`.
    OpaqueTable => TableHandle, tag = 2
);
opaque_handle!(
    /// C `row_t`.
    OpaqueRow => RowHandle, tag = 3
);

const TAG_SHIFT: u32 = u64::BITS - HandleId::TOKEN_SPARE_BITS;
const TOKEN_MASK: u64 = u64::MAX >> HandleId::TOKEN_SPARE_BITS;

fn token_ptr<T>(tag: u64, id: HandleId) -> *mut T {
    std::ptr::without_provenance_mut((id.to_token() | (tag << TAG_SHIFT)) as usize)
}

/// Non-null pointers that do not decode, or carry another kind's tag, map to
/// [`HandleId::INVALID`].
fn id_from_ptr<T>(tag: u64, ptr: *const T, owner: OwnerId) -> Option<HandleId> {
    if ptr.is_null() {
        return None;
    }
    let token = ptr.addr() as u64;
    if token >> TAG_SHIFT != tag {
        return Some(HandleId::INVALID);
    }
    Some(HandleId::from_token(owner, token & TOKEN_MASK).unwrap_or(HandleId::INVALID))
}

/// Everything the C ABI owns.
pub struct CapiState {
    pub registry: Registry,
    /// Addresses of live `magicadder_allocate` results, sorted.
    adders: Vec<usize>,
}

impl CapiState {
    fn new() -> Self {
        Self {
            registry: Registry::new(),
            adders: Vec::new(),
        }
    }

    /// Make room to track one more adder without allocating later.
    pub fn reserve_adder(&mut self) -> bool {
        self.adders.try_reserve(1).is_ok()
    }

    /// Track a new adder. [`CapiState::reserve_adder`] must have succeeded.
    pub fn track_adder(&mut self, addr: usize) {
        if let Err(pos) = self.adders.binary_search(&addr) {
            self.adders.insert(pos, addr);
        }
    }

    /// Stop tracking an adder. Returns false if it was never tracked or was
    /// already released.
    pub fn release_adder(&mut self, addr: usize) -> bool {
        match self.adders.binary_search(&addr) {
            Ok(pos) => {
                self.adders.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn live_adders(&self) -> usize {
        self.adders.len()
    }
}

static STATE: LazyLock<Mutex<CapiState>> = LazyLock::new(|| Mutex::new(CapiState::new()));

/// Lock the shared state for the duration of one C call.
pub fn lock_state() -> Result<MutexGuard<'static, CapiState>, LibdatabaseStatus> {
    STATE.lock().map_err(|_| {
        set_last_error("Failed to acquire libdatabase state lock");
        LibdatabaseStatus::Internal
    })
}
