// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::scheduler::{
    ring::MembershipRing,
    GroupId,
};
use ::std::{
    collections::HashMap,
    thread::ThreadId,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Mapping from group identifier to membership ring. Entries are created lazily on first join and
/// are immortal once created: a ring that empties stays in the table so that a later join on the
/// same identifier behaves like a first-ever one. All access happens under the scheduling lock.
#[derive(Default)]
pub struct GroupTable {
    groups: HashMap<GroupId, MembershipRing>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl GroupTable {
    /// Looks up the ring of an existing group.
    pub fn lookup_mut(&mut self, gid: GroupId) -> Option<&mut MembershipRing> {
        self.groups.get_mut(&gid)
    }

    /// Returns the ring for `gid`, creating an empty one on first access. Idempotent thereafter.
    pub fn get_or_create(&mut self, gid: GroupId) -> &mut MembershipRing {
        self.groups.entry(gid).or_insert_with(|| {
            debug!("get_or_create(): new group gid={}", gid);
            MembershipRing::default()
        })
    }

    /// Finds the group whose current member's thread identity equals `tid`, scanning all groups.
    /// This is the lookup used by yield, which does not trust its group-id argument.
    pub fn find_group_of_current(&mut self, tid: ThreadId) -> Option<(GroupId, &mut MembershipRing)> {
        self.groups
            .iter_mut()
            .find(|(_, ring): &(&GroupId, &mut MembershipRing)| ring.current_thread_id() == Some(tid))
            .map(|(gid, ring): (&GroupId, &mut MembershipRing)| (*gid, ring))
    }

    /// Number of members in `gid`. Groups that were never created count as empty.
    pub fn num_members(&self, gid: GroupId) -> usize {
        self.groups.get(&gid).map_or(0, |ring: &MembershipRing| ring.len())
    }

    /// Asserts the ring invariant on every group.
    #[cfg(test)]
    pub fn check_rings(&self) {
        for ring in self.groups.values() {
            ring.check_circularity();
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
