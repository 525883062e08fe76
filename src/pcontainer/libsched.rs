// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    pcontainer::config::Config,
    runtime::{
        fail::Fail,
        logging,
        scheduler::{
            GroupId,
            Scheduler,
            SharedScheduler,
            StdNotifier,
        },
    },
};
use ::libc::c_uint;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Join the group named by the request (creating it on first use).
pub const PCONTAINER_IOCTL_CREATE: c_uint = 1;
/// Remove the calling thread from the group it previously joined.
pub const PCONTAINER_IOCTL_DELETE: c_uint = 2;
/// Relinquish the caller's turn to the next member of its group.
pub const PCONTAINER_IOCTL_CSWITCH: c_uint = 3;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Control dispatcher: routes opaque requests from the control channel to the three scheduling
/// operations. Clones share the same underlying scheduler.
#[derive(Clone)]
pub struct LibSched {
    scheduler: SharedScheduler,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl LibSched {
    /// Instantiates the dispatcher, reading the configuration named by `CONFIG_PATH` if set.
    pub fn new() -> Result<Self, Fail> {
        logging::initialize();
        let config: Config = Config::from_env()?;
        Self::with_config(&config)
    }

    /// Instantiates the dispatcher from an explicit configuration.
    pub fn with_config(config: &Config) -> Result<Self, Fail> {
        let max_group_ids: u64 = config.max_group_ids()?;
        let scheduler: Scheduler = Scheduler::new(max_group_ids, Box::new(StdNotifier));
        Ok(Self {
            scheduler: SharedScheduler::new(scheduler),
        })
    }

    /// Decodes `cmd` and invokes the matching scheduling operation.
    pub fn ioctl(&self, cmd: c_uint, gid: GroupId) -> Result<(), Fail> {
        match cmd {
            PCONTAINER_IOCTL_CREATE => self.create(gid),
            PCONTAINER_IOCTL_DELETE => self.delete(gid),
            PCONTAINER_IOCTL_CSWITCH => self.switch(gid),
            _ => {
                let cause: String = format!("operation not supported: cmd={}", cmd);
                warn!("ioctl(): {}", &cause);
                Err(Fail::new(libc::ENOTTY, &cause))
            },
        }
    }

    /// CREATE: joins the calling thread to group `gid`.
    pub fn create(&self, gid: GroupId) -> Result<(), Fail> {
        self.scheduler.join(gid)
    }

    /// DELETE: removes the calling thread from group `gid`.
    pub fn delete(&self, gid: GroupId) -> Result<(), Fail> {
        self.scheduler.leave(gid)
    }

    /// SWITCH: relinquishes the caller's turn. The group id is accepted for interface symmetry
    /// but is not used to locate the group (see [Scheduler::yield_turn]).
    pub fn switch(&self, gid: GroupId) -> Result<(), Fail> {
        self.scheduler.yield_turn(gid)
    }

    /// Number of members currently in `gid`.
    pub fn num_members(&self, gid: GroupId) -> usize {
        self.scheduler.num_members(gid)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
