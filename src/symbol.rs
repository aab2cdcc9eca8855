//! Variable identity for the term model.
//!
//! A variable's numeric [`VarId`] is its sole identity key: two variables are the
//! same variable iff their ids match, whatever their names. The [`VarAllocator`]
//! mints ids for a unification session or a knowledge store; there is no global
//! interner.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Unique, niche-optimized identifier for a variable.
///
/// Uses `NonZeroU64` so that `Option<VarId>` is the same size as `VarId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VarId(NonZeroU64);

impl VarId {
    /// Create a `VarId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(VarId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "var:{}", self.0)
    }
}

/// Default first id handed out by allocators owned by a knowledge store.
///
/// Ids below this are left to callers (parsers, tests) that number their own
/// variables, so freshly minted alpha-conversion variables never collide with them.
pub const DEFAULT_FRESH_BASE: u64 = 1 << 40;

/// Thread-safe variable id allocator.
///
/// Produces monotonically increasing ids. Safe to share across threads via
/// `Arc<VarAllocator>`; a wrapped-around counter saturates at `u64::MAX`
/// rather than handing out zero.
#[derive(Debug)]
pub struct VarAllocator {
    next: AtomicU64,
}

impl VarAllocator {
    /// Create an allocator that starts from id 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Create an allocator that starts from a given id.
    pub fn starting_from(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.max(1)),
        }
    }

    /// Allocate the next variable id.
    pub fn fresh(&self) -> VarId {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        VarId::new(raw).unwrap_or(VarId(NonZeroU64::MAX))
    }

    /// Return the next id that *would* be allocated, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for VarAllocator {
    fn default() -> Self {
        Self::new()
    }
}
