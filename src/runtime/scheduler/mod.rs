// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod group_table;
mod notifier;
mod ring;
#[allow(clippy::module_inception)]
mod scheduler;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    group_table::GroupTable,
    notifier::{
        StdNotifier,
        ThreadNotifier,
    },
    ring::{
        MembershipRing,
        WakeTarget,
    },
    scheduler::{
        Scheduler,
        SharedScheduler,
        DEFAULT_MAX_GROUP_IDS,
    },
};

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::fmt;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Identifier of a scheduling group. Expected to be a dense small integer, not an opaque random
/// value.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GroupId(u64);

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<u64> for GroupId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<GroupId> for u64 {
    fn from(value: GroupId) -> Self {
        value.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
