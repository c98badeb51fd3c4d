//! Named reader/writer locks serializing metadata mutations.
//!
//! Every mutating processor funnels through a small set of process-wide
//! locks. Deadlock freedom rests on a fixed acquisition order: `snapshot`
//! before `space` before `listener`, with `id` as a leaf taken last. The
//! registry enforces that order with a thread-local acquisition stack; an
//! out-of-order acquisition panics in debug builds. Lock upgrades are not
//! supported: an operation that may mutate acquires the writer up front.

use std::cell::RefCell;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The named locks, ordered by acquisition rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockName {
    /// Serializes snapshot and backup coordination.
    Snapshot,
    /// Serializes space creation, drop and placement reads.
    Space,
    /// Serializes listener registration.
    Listener,
    /// Serializes the id counter; a leaf, always taken last.
    Id,
}

impl LockName {
    fn rank(self) -> u8 {
        match self {
            LockName::Snapshot => 0,
            LockName::Space => 1,
            LockName::Listener => 2,
            LockName::Id => 3,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LockName::Snapshot => "snapshot",
            LockName::Space => "space",
            LockName::Listener => "listener",
            LockName::Id => "id",
        }
    }
}

thread_local! {
    static HELD: RefCell<Vec<LockName>> = const { RefCell::new(Vec::new()) };
}

fn push_held(name: LockName) {
    HELD.with(|held| {
        let mut held = held.borrow_mut();
        if cfg!(debug_assertions) {
            if let Some(last) = held.last() {
                assert!(
                    last.rank() < name.rank(),
                    "lock order violation: {} acquired while holding {}",
                    name.label(),
                    last.label(),
                );
            }
        }
        held.push(name);
    });
}

fn pop_held(name: LockName) {
    HELD.with(|held| {
        let mut held = held.borrow_mut();
        if let Some(pos) = held.iter().rposition(|&n| n == name) {
            held.remove(pos);
        }
    });
}

/// Shared hold on one named lock.
pub struct ReadGuard<'a> {
    _guard: RwLockReadGuard<'a, ()>,
    name: LockName,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        pop_held(self.name);
    }
}

/// Exclusive hold on one named lock.
pub struct WriteGuard<'a> {
    _guard: RwLockWriteGuard<'a, ()>,
    name: LockName,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        pop_held(self.name);
    }
}

/// Registry owning the named locks.
#[derive(Default)]
pub struct LockRegistry {
    snapshot: RwLock<()>,
    space: RwLock<()>,
    listener: RwLock<()>,
    id: RwLock<()>,
}

impl LockRegistry {
    /// A registry with all locks free.
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, name: LockName) -> &RwLock<()> {
        match name {
            LockName::Snapshot => &self.snapshot,
            LockName::Space => &self.space,
            LockName::Listener => &self.listener,
            LockName::Id => &self.id,
        }
    }

    /// Acquire one named lock shared.
    pub fn read(&self, name: LockName) -> ReadGuard<'_> {
        push_held(name);
        ReadGuard {
            _guard: self.cell(name).read(),
            name,
        }
    }

    /// Acquire one named lock exclusive.
    pub fn write(&self, name: LockName) -> WriteGuard<'_> {
        push_held(name);
        WriteGuard {
            _guard: self.cell(name).write(),
            name,
        }
    }
}
