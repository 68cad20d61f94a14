//! Generation-checked slot arena.
//!
//! Objects live in slots addressed by a [`HandleId`]: a slot index plus the
//! generation the slot had when the object was inserted. Removing an object
//! bumps the slot generation, so every id that referred to it stops
//! resolving. A stale id is therefore a failed lookup, never a dangling
//! reference.
//!
//! Every arena also carries an [`OwnerId`] and stamps it into the ids it
//! issues, so an id presented to an arena that did not issue it never
//! resolves, even when that arena has a live object in the same slot.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::RegistryConfig;
use crate::error::{HandleKind, Result, TetherError};

/// Counter for generating unique owner ids. Zero is never issued.
static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

/// Identity of the arena (or group of arenas) that issued an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u32);

impl OwnerId {
    /// Owner of no arena. Ids carrying it never resolve.
    pub const NONE: OwnerId = OwnerId(0);

    /// Create a fresh owner id
    pub fn fresh() -> Self {
        let mut id = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            // Wrapped after 2^32 owners.
            id = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        }
        OwnerId(id)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Owner, index and generation of an arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId {
    owner: OwnerId,
    index: u32,
    generation: u32,
}

impl HandleId {
    /// An id that resolves in no arena.
    pub const INVALID: HandleId = HandleId::new(OwnerId::NONE, u32::MAX, u32::MAX);

    pub const fn new(owner: OwnerId, index: u32, generation: u32) -> Self {
        Self {
            owner,
            index,
            generation,
        }
    }

    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack index and generation into a non-zero 64-bit token.
    ///
    /// The low half holds `index + 1`, the high half the generation. Slot
    /// indices never reach `u32::MAX`, so the low half is never zero, and
    /// generations never exceed [`RegistryConfig::MAX_GENERATION`], so the
    /// top [`HandleId::TOKEN_SPARE_BITS`] bits are always clear for the caller
    /// to use. The owner is not packed: whoever decodes the token supplies it.
    pub const fn to_token(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64 + 1)
    }

    /// High bits of a token that [`HandleId::to_token`] leaves clear.
    pub const TOKEN_SPARE_BITS: u32 = 2;

    /// Unpack a token produced by [`HandleId::to_token`] on behalf of
    /// `owner`. Zero, an empty index half and a generation beyond
    /// [`RegistryConfig::MAX_GENERATION`] yield `None`.
    pub const fn from_token(owner: OwnerId, token: u64) -> Option<Self> {
        let low = (token & 0xFFFF_FFFF) as u32;
        let generation = (token >> 32) as u32;
        if low == 0 || generation > RegistryConfig::MAX_GENERATION {
            return None;
        }
        Some(Self {
            owner,
            index: low - 1,
            generation,
        })
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32 },
}

impl<T> Slot<T> {
    fn generation(&self) -> u32 {
        match self {
            Slot::Occupied { generation, .. } | Slot::Vacant { generation } => *generation,
        }
    }
}

/// Slot storage with free-list reuse and generation checks on every access.
#[derive(Debug)]
pub struct Arena<T> {
    kind: HandleKind,
    owner: OwnerId,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    max_live: Option<usize>,
}

impl<T> Arena<T> {
    /// Create an empty arena for objects of `kind` with an owner id of its
    /// own.
    pub fn new(kind: HandleKind) -> Self {
        Self::with_owner(kind, OwnerId::fresh())
    }

    /// Create an empty arena that issues ids stamped with `owner`. Arenas
    /// sharing an owner must hold different kinds of object.
    pub fn with_owner(kind: HandleKind, owner: OwnerId) -> Self {
        Self {
            kind,
            owner,
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            max_live: RegistryConfig::DEFAULT_MAX_LIVE_HANDLES,
        }
    }

    /// Create an arena with room for `capacity` objects and an optional cap on
    /// simultaneously live objects.
    pub fn with_limits(
        kind: HandleKind,
        owner: OwnerId,
        capacity: usize,
        max_live: Option<usize>,
    ) -> Self {
        let mut arena = Self::with_owner(kind, owner);
        arena.max_live = max_live;
        // A failed up-front reservation is not an error; insertion retries it.
        let _ = arena.slots.try_reserve_exact(capacity);
        let _ = arena.free.try_reserve_exact(capacity);
        arena
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots that can be occupied without reallocating.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    fn allocation_failed(&self) -> TetherError {
        TetherError::AllocationFailed { kind: self.kind }
    }

    /// Insert a value and return its id.
    ///
    /// Exhausted memory, the live-object limit and the slot index ceiling are
    /// all reported as [`TetherError::AllocationFailed`].
    pub fn try_insert(&mut self, value: T) -> Result<HandleId> {
        if self.max_live.is_some_and(|max| self.len >= max) {
            return Err(self.allocation_failed());
        }

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let generation = slot.generation();
            *slot = Slot::Occupied { generation, value };
            self.len += 1;
            return Ok(HandleId::new(self.owner, index, generation));
        }

        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|index| *index <= RegistryConfig::MAX_SLOT_INDEX)
            .ok_or_else(|| self.allocation_failed())?;

        // The free list can hold every slot, so `remove` never allocates.
        let free_needed = self.slots.len() + 1 - self.free.len();
        self.slots
            .try_reserve(1)
            .map_err(|_| self.allocation_failed())?;
        self.free
            .try_reserve(free_needed)
            .map_err(|_| self.allocation_failed())?;

        self.slots.push(Slot::Occupied {
            generation: 0,
            value,
        });
        self.len += 1;
        Ok(HandleId::new(self.owner, index, 0))
    }

    /// Resolve an id. Foreign, out-of-range, vacant and stale ids all yield
    /// `None`.
    pub fn get(&self, id: HandleId) -> Option<&T> {
        if id.owner != self.owner {
            return None;
        }
        match self.slots.get(id.index as usize)? {
            Slot::Occupied { generation, value } if *generation == id.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut T> {
        if id.owner != self.owner {
            return None;
        }
        match self.slots.get_mut(id.index as usize)? {
            Slot::Occupied { generation, value } if *generation == id.generation => Some(value),
            _ => None,
        }
    }

    /// Resolve an id or report it as stale.
    pub fn lookup(&self, id: HandleId) -> Result<&T> {
        self.get(id).ok_or(TetherError::StaleHandle {
            kind: self.kind,
            id,
        })
    }

    pub fn lookup_mut(&mut self, id: HandleId) -> Result<&mut T> {
        let kind = self.kind;
        self.get_mut(id)
            .ok_or(TetherError::StaleHandle { kind, id })
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.get(id).is_some()
    }

    /// Remove the object behind `id`, invalidating every copy of the id.
    ///
    /// A slot whose generation would pass [`RegistryConfig::MAX_GENERATION`]
    /// is retired instead of reused.
    pub fn remove(&mut self, id: HandleId) -> Option<T> {
        if id.owner != self.owner {
            return None;
        }
        let slot = self.slots.get_mut(id.index as usize)?;
        if !matches!(slot, Slot::Occupied { generation, .. } if *generation == id.generation) {
            return None;
        }

        let next = id
            .generation
            .checked_add(1)
            .filter(|generation| *generation <= RegistryConfig::MAX_GENERATION);
        let old = std::mem::replace(
            slot,
            Slot::Vacant {
                generation: next.unwrap_or(id.generation),
            },
        );
        self.len -= 1;
        if next.is_some() {
            self.free.push(id.index);
        }

        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Iterate over live objects with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (HandleId, &T)> + '_ {
        let owner = self.owner;
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(index, slot)| match slot {
                Slot::Occupied { generation, value } => {
                    Some((HandleId::new(owner, index as u32, *generation), value))
                }
                Slot::Vacant { .. } => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena = Arena::new(HandleKind::Row);
        let a = arena.try_insert("a").unwrap();
        let b = arena.try_insert("b").unwrap();

        assert_ne!(a, b);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_removed_id_is_stale() {
        let mut arena = Arena::new(HandleKind::Table);
        let id = arena.try_insert(7u32).unwrap();

        assert_eq!(arena.remove(id), Some(7));
        assert_eq!(arena.get(id), None);
        assert_eq!(arena.remove(id), None);
        assert!(arena.is_empty());
        assert_eq!(
            arena.lookup(id),
            Err(TetherError::StaleHandle {
                kind: HandleKind::Table,
                id
            })
        );
    }

    #[test]
    fn test_reused_slot_does_not_alias() {
        let mut arena = Arena::new(HandleKind::Database);
        let old = arena.try_insert(1).unwrap();
        arena.remove(old);
        let new = arena.try_insert(2).unwrap();

        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn test_out_of_range_id() {
        let arena: Arena<u8> = Arena::new(HandleKind::Row);
        assert_eq!(arena.get(HandleId::new(arena.owner(), 42, 0)), None);
        assert_eq!(arena.get(HandleId::INVALID), None);
    }

    #[test]
    fn test_max_live_limit() {
        let mut arena = Arena::with_limits(HandleKind::Row, OwnerId::fresh(), 2, Some(2));
        let first = arena.try_insert(()).unwrap();
        arena.try_insert(()).unwrap();

        assert_eq!(
            arena.try_insert(()),
            Err(TetherError::AllocationFailed {
                kind: HandleKind::Row
            })
        );

        arena.remove(first);
        assert!(arena.try_insert(()).is_ok());
    }

    #[test]
    fn test_exhausted_generation_retires_slot() {
        let mut arena = Arena::new(HandleKind::Row);
        let id = arena.try_insert(0u8).unwrap();
        arena.slots[0] = Slot::Occupied {
            generation: RegistryConfig::MAX_GENERATION,
            value: 0,
        };
        let last = HandleId::new(id.owner(), id.index(), RegistryConfig::MAX_GENERATION);

        assert_eq!(arena.remove(last), Some(0));
        let next = arena.try_insert(1).unwrap();
        assert_ne!(next.index(), last.index());
        assert_eq!(arena.get(last), None);
    }

    #[test]
    fn test_token_packing() {
        let owner = OwnerId::fresh();
        let id = HandleId::new(owner, 5, 9);
        let token = id.to_token();

        assert_ne!(token, 0);
        assert_eq!(HandleId::from_token(owner, token), Some(id));
        assert_eq!(HandleId::from_token(owner, 0), None);
        assert_eq!(HandleId::from_token(owner, 1 << 32), None);

        let max = HandleId::new(
            owner,
            RegistryConfig::MAX_SLOT_INDEX,
            RegistryConfig::MAX_GENERATION,
        );
        let token = max.to_token();
        assert_eq!(token >> (64 - HandleId::TOKEN_SPARE_BITS), 0);
        assert_eq!(HandleId::from_token(owner, token), Some(max));
        assert_eq!(HandleId::from_token(owner, token | (1 << 63)), None);
    }

    #[test]
    fn test_foreign_id_never_resolves() {
        let mut a = Arena::new(HandleKind::Table);
        let mut b = Arena::new(HandleKind::Table);
        let a_id = a.try_insert("a").unwrap();
        let b_id = b.try_insert("b").unwrap();

        // Same slot, same generation, different owner.
        assert_eq!(a_id.index(), b_id.index());
        assert_eq!(a_id.generation(), b_id.generation());
        assert_ne!(a_id.owner(), b_id.owner());

        assert_eq!(b.get(a_id), None);
        assert_eq!(b.get_mut(a_id), None);
        assert_eq!(b.remove(a_id), None);
        assert_eq!(b.get(b_id), Some(&"b"));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_fresh_owners_are_distinct() {
        let first = OwnerId::fresh();
        let second = OwnerId::fresh();
        assert_ne!(first, second);
        assert_ne!(first, OwnerId::NONE);
        assert_ne!(second, OwnerId::NONE);
    }

    #[test]
    fn test_iter_skips_vacant() {
        let mut arena = Arena::new(HandleKind::Table);
        let a = arena.try_insert('a').unwrap();
        let b = arena.try_insert('b').unwrap();
        arena.remove(a);

        let live: Vec<_> = arena.iter().collect();
        assert_eq!(live, vec![(b, &'b')]);
    }
}
