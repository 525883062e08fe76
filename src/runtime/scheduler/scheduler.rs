// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Cooperative group scheduler.
//!
//! Many OS threads call into one [Scheduler] concurrently; a single process-wide lock serializes
//! every join/leave/yield end-to-end across all groups, so the core is single-threaded in effect
//! and the table and rings are free of data races. A thread blocks only after the lock has been
//! released and resumes only when another member's leave or yield designates it current.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::{
        group_table::GroupTable,
        notifier::{
            StdNotifier,
            ThreadNotifier,
        },
        ring::{
            MembershipRing,
            WakeTarget,
        },
        GroupId,
    },
};
use ::std::{
    ops::Deref,
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    thread::{
        self,
        Thread,
        ThreadId,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Upper bound on the number of distinct group identifiers. Mirrors the historical fixed slot
/// count; overridable at construction time.
pub const DEFAULT_MAX_GROUP_IDS: u64 = 10_000;

//======================================================================================================================
// Structures
//======================================================================================================================

/// The scheduling core: a group table behind the scheduling lock, plus the park/wake mechanism.
pub struct Scheduler {
    /// The scheduling lock. Guards the table and every ring; never held across a suspension point.
    groups: Mutex<GroupTable>,
    /// Suspend/resume primitives, invoked only after the lock is released.
    notifier: Box<dyn ThreadNotifier>,
    /// Group identifiers must be below this bound.
    max_group_ids: u64,
}

/// A scheduler handle that can be cloned across the threads that share it.
#[derive(Clone)]
pub struct SharedScheduler(Arc<Scheduler>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Scheduler {
    pub fn new(max_group_ids: u64, notifier: Box<dyn ThreadNotifier>) -> Self {
        Self {
            groups: Mutex::new(GroupTable::default()),
            notifier,
            max_group_ids,
        }
    }

    /// Joins the calling thread to group `gid`, creating the group on first use. The sole member
    /// of a previously-empty group returns immediately; a thread joining an occupied group is
    /// appended after the tail and blocks until a later yield or leave designates it current.
    pub fn join(&self, gid: GroupId) -> Result<(), Fail> {
        self.check_group_id(gid)?;
        let thread: Thread = thread::current();
        let tid: ThreadId = thread.id();
        trace!("join(): gid={}, tid={:?}", gid, tid);

        let runnable: Arc<AtomicBool>;
        {
            let mut table: MutexGuard<GroupTable> = self.lock_table();
            let ring: &mut MembershipRing = table.get_or_create(gid);
            let first: bool = ring.is_empty();
            runnable = Arc::new(AtomicBool::new(first));
            ring.insert(tid, thread, runnable.clone())?;
            if first {
                // Sole member: already designated current, so the caller keeps running.
                return Ok(());
            }
        }
        self.suspend(&runnable);
        trace!("join(): gid={}, tid={:?} resumed", gid, tid);
        Ok(())
    }

    /// Removes the calling thread from group `gid`. The member to remove is located by the
    /// caller's thread identity, not by an explicit handle. If the departing member held the turn,
    /// its successor becomes current and is woken. The caller never suspends here.
    pub fn leave(&self, gid: GroupId) -> Result<(), Fail> {
        self.check_group_id(gid)?;
        let tid: ThreadId = thread::current().id();
        trace!("leave(): gid={}, tid={:?}", gid, tid);

        let target: Option<WakeTarget> = {
            let mut table: MutexGuard<GroupTable> = self.lock_table();
            let ring: &mut MembershipRing = match table.lookup_mut(gid) {
                Some(ring) => ring,
                None => {
                    let cause: String = format!("group was never created: gid={}", gid);
                    error!("leave(): {}", &cause);
                    return Err(Fail::new(libc::EINVAL, &cause));
                },
            };
            let target: Option<WakeTarget> = ring.remove(tid)?;
            if let Some(target) = &target {
                // Mark the successor runnable while the lock still pins the ring state.
                target.set_runnable();
            }
            target
        };
        if let Some(target) = target {
            debug!("leave(): gid={}, waking tid={:?}", gid, target.thread().id());
            self.notifier.wake(target.thread());
        }
        Ok(())
    }

    /// Relinquishes the caller's turn. The supplied group id is accepted but not used to locate
    /// the group: the caller's group is found by scanning all groups for the one whose current
    /// member is the calling thread. Yielding in a single-member group is free and never suspends.
    pub fn yield_turn(&self, _gid: GroupId) -> Result<(), Fail> {
        let tid: ThreadId = thread::current().id();
        trace!("yield_turn(): tid={:?}", tid);

        let (runnable, target): (Arc<AtomicBool>, WakeTarget) = {
            let mut table: MutexGuard<GroupTable> = self.lock_table();
            let (found, ring): (GroupId, &mut MembershipRing) = match table.find_group_of_current(tid) {
                Some(found) => found,
                None => {
                    let cause: String = format!("calling thread is not current in any group: tid={:?}", tid);
                    error!("yield_turn(): {}", &cause);
                    return Err(Fail::new(libc::EINVAL, &cause));
                },
            };
            match ring.advance() {
                // Yielding to yourself is free.
                None => return Ok(()),
                Some((outgoing, target)) => {
                    debug!("yield_turn(): gid={}, turn passes to tid={:?}", found, target.thread().id());
                    outgoing.store(false, Ordering::Release);
                    target.set_runnable();
                    (outgoing, target)
                },
            }
        };
        self.notifier.wake(target.thread());
        self.suspend(&runnable);
        trace!("yield_turn(): tid={:?} resumed", tid);
        Ok(())
    }

    /// Number of members currently in `gid`. Groups that were never created count as empty.
    pub fn num_members(&self, gid: GroupId) -> usize {
        self.lock_table().num_members(gid)
    }

    /// Parks the calling thread until it is designated current. The flag check makes wakes that
    /// arrive before the park harmless and absorbs spurious park returns.
    fn suspend(&self, runnable: &AtomicBool) {
        while !runnable.load(Ordering::Acquire) {
            self.notifier.park();
        }
    }

    fn check_group_id(&self, gid: GroupId) -> Result<(), Fail> {
        if u64::from(gid) >= self.max_group_ids {
            let cause: String = format!("group id out of range: gid={}, max={}", gid, self.max_group_ids);
            error!("check_group_id(): {}", &cause);
            return Err(Fail::new(libc::ERANGE, &cause));
        }
        Ok(())
    }

    /// Acquires the scheduling lock. Acquisition is not part of the error taxonomy: the lock is
    /// never re-entered and never held across a suspension point, and a poisoning panic continues
    /// with the inner state.
    fn lock_table(&self) -> MutexGuard<GroupTable> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn check_rings(&self) {
        self.lock_table().check_rings();
    }
}

impl SharedScheduler {
    pub fn new(scheduler: Scheduler) -> Self {
        Self(Arc::new(scheduler))
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GROUP_IDS, Box::new(StdNotifier))
    }
}

impl Default for SharedScheduler {
    fn default() -> Self {
        Self::new(Scheduler::default())
    }
}

impl Deref for SharedScheduler {
    type Target = Scheduler;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use crate::runtime::scheduler::{
        GroupId,
        Scheduler,
        SharedScheduler,
        StdNotifier,
    };
    use ::anyhow::Result;
    use ::rand::{
        rngs::SmallRng,
        RngCore,
        SeedableRng,
    };
    use ::std::{
        thread,
        thread::JoinHandle,
    };

    #[test]
    fn join_on_empty_group_returns_immediately() -> Result<()> {
        let scheduler: Scheduler = Scheduler::default();
        let gid: GroupId = GroupId::from(1);

        // This would hang instead of returning if the sole member were suspended.
        scheduler.join(gid)?;
        crate::ensure_eq!(scheduler.num_members(gid), 1);

        scheduler.leave(gid)?;
        crate::ensure_eq!(scheduler.num_members(gid), 0);

        Ok(())
    }

    #[test]
    fn singleton_yield_is_a_noop() -> Result<()> {
        let scheduler: Scheduler = Scheduler::default();
        let gid: GroupId = GroupId::from(1);

        scheduler.join(gid)?;
        // Never suspends and never changes current.
        scheduler.yield_turn(gid)?;
        scheduler.yield_turn(gid)?;
        crate::ensure_eq!(scheduler.num_members(gid), 1);
        scheduler.leave(gid)?;

        Ok(())
    }

    #[test]
    fn rejoin_after_group_empties() -> Result<()> {
        let scheduler: Scheduler = Scheduler::default();
        let gid: GroupId = GroupId::from(9);

        scheduler.join(gid)?;
        scheduler.leave(gid)?;

        // The emptied entry must behave exactly like a first-ever join.
        scheduler.join(gid)?;
        crate::ensure_eq!(scheduler.num_members(gid), 1);
        scheduler.leave(gid)?;

        Ok(())
    }

    #[test]
    fn leave_without_join_fails() -> Result<()> {
        let scheduler: Scheduler = Scheduler::default();

        crate::ensure_eq!(scheduler.leave(GroupId::from(1)).is_err(), true);

        // Same for a group that exists but no longer has this thread.
        scheduler.join(GroupId::from(2))?;
        scheduler.leave(GroupId::from(2))?;
        crate::ensure_eq!(scheduler.leave(GroupId::from(2)).is_err(), true);

        Ok(())
    }

    #[test]
    fn yield_without_turn_fails() -> Result<()> {
        let scheduler: Scheduler = Scheduler::default();

        crate::ensure_eq!(scheduler.yield_turn(GroupId::from(1)).is_err(), true);

        Ok(())
    }

    #[test]
    fn duplicate_join_fails_without_suspending() -> Result<()> {
        let scheduler: Scheduler = Scheduler::default();
        let gid: GroupId = GroupId::from(4);

        scheduler.join(gid)?;
        // The membership check fires before the suspension point, so this returns.
        crate::ensure_eq!(scheduler.join(gid).is_err(), true);
        crate::ensure_eq!(scheduler.num_members(gid), 1);
        scheduler.leave(gid)?;

        Ok(())
    }

    #[test]
    fn group_id_out_of_range_fails() -> Result<()> {
        let scheduler: Scheduler = Scheduler::new(16, Box::new(StdNotifier));

        crate::ensure_eq!(scheduler.join(GroupId::from(16)).is_err(), true);
        crate::ensure_eq!(scheduler.join(GroupId::from(15)).is_ok(), true);
        scheduler.leave(GroupId::from(15))?;

        Ok(())
    }

    /// Randomized cross-group stress: several groups rotate concurrently while the main thread
    /// samples ring circularity and member-count conservation under the lock.
    #[test]
    fn concurrent_stress_preserves_ring_invariants() -> Result<()> {
        const NUM_GROUPS: u64 = 4;
        const THREADS_PER_GROUP: usize = 3;

        let scheduler: SharedScheduler = SharedScheduler::default();
        let mut rng: SmallRng = SmallRng::seed_from_u64(42);
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        for gid in 0..NUM_GROUPS {
            for _ in 0..THREADS_PER_GROUP {
                let rounds: u32 = 8 + rng.next_u32() % 64;
                let scheduler: SharedScheduler = scheduler.clone();
                handles.push(thread::spawn(move || {
                    scheduler.join(GroupId::from(gid)).unwrap();
                    for _ in 0..rounds {
                        scheduler.yield_turn(GroupId::from(gid)).unwrap();
                    }
                    scheduler.leave(GroupId::from(gid)).unwrap();
                }));
            }
        }

        while handles.iter().any(|handle: &JoinHandle<()>| !handle.is_finished()) {
            scheduler.check_rings();
            for gid in 0..NUM_GROUPS {
                assert!(scheduler.num_members(GroupId::from(gid)) <= THREADS_PER_GROUP);
            }
            thread::yield_now();
        }
        for handle in handles {
            handle.join().unwrap();
        }

        scheduler.check_rings();
        for gid in 0..NUM_GROUPS {
            crate::ensure_eq!(scheduler.num_members(GroupId::from(gid)), 0);
        }

        Ok(())
    }
}
