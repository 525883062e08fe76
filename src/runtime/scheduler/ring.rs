// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Membership ring for one scheduling group.
//!
//! Members are stored in a [Slab] arena and linked into a circular order through stable arena
//! indices. The ring only ever references indices; the arena owns every record, so no member
//! outlives its group membership.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::slab::Slab;
use ::std::{
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
    },
    thread::{
        Thread,
        ThreadId,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// One thread's participation record within a group. Created on join, destroyed on leave, never
/// implicitly.
struct Member {
    /// Identity of the participating thread. Unique within the group.
    tid: ThreadId,
    /// Arena index of the successor in ring order.
    next: usize,
    /// Handle used to unpark the thread. Never used to extend its lifetime.
    thread: Thread,
    /// Block/wake flag, shared with the owning thread while it is parked.
    runnable: Arc<AtomicBool>,
}

/// A wake target collected while the scheduling lock is held and acted on after it is released.
pub struct WakeTarget {
    thread: Thread,
    runnable: Arc<AtomicBool>,
}

/// The circular, insertion-ordered sequence of members of one group. The tail's successor link
/// always points back to the head; an empty ring has no head, tail, or current member.
#[derive(Default)]
pub struct MembershipRing {
    /// Arena that owns all member records of this group.
    members: Slab<Member>,
    head: Option<usize>,
    tail: Option<usize>,
    /// The member presently designated runnable. Always a live arena index while non-empty.
    current: Option<usize>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl WakeTarget {
    /// Marks the target thread runnable. This must happen before the thread is unparked.
    pub fn set_runnable(&self) {
        self.runnable.store(true, Ordering::Release);
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }
}

impl MembershipRing {
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Thread identity of the current member, if any.
    pub fn current_thread_id(&self) -> Option<ThreadId> {
        self.current.map(|index: usize| self.members[index].tid)
    }

    /// Appends a member after the tail, preserving circularity. The first member of an empty ring
    /// becomes head, tail, and current all at once, with its successor link closed on itself.
    pub fn insert(&mut self, tid: ThreadId, thread: Thread, runnable: Arc<AtomicBool>) -> Result<(), Fail> {
        if self.contains(tid) {
            let cause: String = format!("thread is already a member of this group: tid={:?}", tid);
            error!("insert(): {}", &cause);
            return Err(Fail::new(libc::EEXIST, &cause));
        }

        match self.head {
            None => {
                let index: usize = self.members.vacant_key();
                let inserted: usize = self.members.insert(Member {
                    tid,
                    next: index,
                    thread,
                    runnable,
                });
                debug_assert_eq!(inserted, index);
                self.head = Some(index);
                self.tail = Some(index);
                self.current = Some(index);
            },
            Some(head) => {
                let tail: usize = self.tail.expect("non-empty ring must have a tail");
                let index: usize = self.members.insert(Member {
                    tid,
                    next: head,
                    thread,
                    runnable,
                });
                self.members[tail].next = index;
                self.tail = Some(index);
            },
        }
        Ok(())
    }

    /// Removes the member whose thread identity equals `tid`, located by linear traversal. If the
    /// removed member was current, current moves to its successor and that member is returned as a
    /// wake target. Traversal cost is linear in group size.
    pub fn remove(&mut self, tid: ThreadId) -> Result<Option<WakeTarget>, Fail> {
        let head: usize = match self.head {
            Some(head) => head,
            None => {
                let cause: String = "group has no members".to_string();
                error!("remove(): {}", &cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };

        // Singleton ring: removing the last member empties the group.
        if self.members[head].next == head {
            if self.members[head].tid != tid {
                let cause: String = format!("calling thread is not a member of this group: tid={:?}", tid);
                error!("remove(): {}", &cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            }
            self.members.remove(head);
            self.head = None;
            self.tail = None;
            self.current = None;
            return Ok(None);
        }

        // Walk (predecessor, node) pairs once around the ring. The tail is the head's predecessor.
        let mut prev: usize = self.tail.expect("non-empty ring must have a tail");
        let mut node: usize = head;
        loop {
            if self.members[node].tid == tid {
                break;
            }
            prev = node;
            node = self.members[node].next;
            if node == head {
                let cause: String = format!("calling thread is not a member of this group: tid={:?}", tid);
                error!("remove(): {}", &cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            }
        }

        // Splice the node out.
        let successor: usize = self.members[node].next;
        self.members[prev].next = successor;
        if self.head == Some(node) {
            self.head = Some(successor);
        }
        if self.tail == Some(node) {
            self.tail = Some(prev);
        }
        let was_current: bool = self.current == Some(node);
        self.members.remove(node);

        // Hand the turn to the successor so progress continues.
        if was_current {
            self.current = Some(successor);
            let member: &Member = &self.members[successor];
            return Ok(Some(WakeTarget {
                thread: member.thread.clone(),
                runnable: member.runnable.clone(),
            }));
        }
        Ok(None)
    }

    /// Advances current to its successor. Returns the outgoing member's runnable flag and the
    /// incoming member as a wake target, or [None] when the ring has a single member (yielding to
    /// yourself is free).
    pub fn advance(&mut self) -> Option<(Arc<AtomicBool>, WakeTarget)> {
        let current: usize = self.current?;
        let next: usize = self.members[current].next;
        if next == current {
            return None;
        }
        let outgoing: Arc<AtomicBool> = self.members[current].runnable.clone();
        self.current = Some(next);
        let member: &Member = &self.members[next];
        Some((
            outgoing,
            WakeTarget {
                thread: member.thread.clone(),
                runnable: member.runnable.clone(),
            },
        ))
    }

    /// Checks whether `tid` belongs to this ring.
    fn contains(&self, tid: ThreadId) -> bool {
        self.members.iter().any(|(_, member): (usize, &Member)| member.tid == tid)
    }

    /// Asserts the ring invariant: following successor links from head visits every member exactly
    /// once, ends at tail, and the tail links back to head. Current must be a live member.
    #[cfg(test)]
    pub fn check_circularity(&self) {
        let head: usize = match self.head {
            Some(head) => head,
            None => {
                assert!(self.tail.is_none(), "empty ring must have no tail");
                assert!(self.current.is_none(), "empty ring must have no current");
                assert_eq!(self.members.len(), 0, "empty ring must own no members");
                return;
            },
        };
        let tail: usize = self.tail.expect("non-empty ring must have a tail");
        let current: usize = self.current.expect("non-empty ring must have a current");
        let mut visited: usize = 0;
        let mut node: usize = head;
        let mut seen_current: bool = false;
        loop {
            assert!(self.members.contains(node), "successor link points at a freed member");
            visited += 1;
            assert!(visited <= self.members.len(), "ring traversal does not close");
            if node == current {
                seen_current = true;
            }
            if node == tail {
                break;
            }
            node = self.members[node].next;
        }
        assert_eq!(visited, self.members.len(), "ring traversal skips members");
        assert_eq!(self.members[tail].next, head, "tail must link back to head");
        assert!(seen_current, "current must be reachable from head");
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
