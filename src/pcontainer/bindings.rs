// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! C control boundary. Requests cross this boundary as a by-value payload copy per call; the copy
//! is validated before the scheduling lock is touched.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    pcontainer::libsched::LibSched,
    runtime::{
        fail::Fail,
        logging,
        scheduler::GroupId,
    },
};
use ::libc::{
    c_int,
    c_uint,
};
use ::std::{
    ptr,
    sync::OnceLock,
};

//======================================================================================================================
// Static Variables
//======================================================================================================================

/// Module-wide dispatcher instance, installed by [pcontainer_init].
static LIBSCHED: OnceLock<LibSched> = OnceLock::new();

//======================================================================================================================
// Structures
//======================================================================================================================

/// Control-request payload.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
#[allow(non_camel_case_types)]
pub struct pcontainer_request_t {
    /// Identifier of the group the request applies to.
    pub group_id: u64,
}

//======================================================================================================================
// init
//======================================================================================================================

/// Initializes the scheduling module. Idempotent; later calls keep the first instance.
#[no_mangle]
pub extern "C" fn pcontainer_init() -> c_int {
    logging::initialize();
    trace!("pcontainer_init()");

    if LIBSCHED.get().is_some() {
        return 0;
    }
    match LibSched::new() {
        Ok(libsched) => {
            let _ = LIBSCHED.set(libsched);
            0
        },
        Err(e) => {
            warn!("failed to initialize scheduler: {:?}", e.cause);
            -e.errno
        },
    }
}

//======================================================================================================================
// ioctl
//======================================================================================================================

/// Control entry point: copies the request payload, decodes `cmd`, and runs the matching
/// scheduling operation. Returns 0 on normal completion (including the suspend/resume round trip)
/// and a negated errno on failure.
#[no_mangle]
pub extern "C" fn pcontainer_ioctl(cmd: c_uint, request: *const pcontainer_request_t) -> c_int {
    let request: pcontainer_request_t = match copy_request(request) {
        Ok(request) => request,
        Err(e) => {
            warn!("pcontainer_ioctl(): {:?}", e.cause);
            return -e.errno;
        },
    };
    trace!("pcontainer_ioctl(): cmd={}, group_id={}", cmd, request.group_id);

    let libsched: &LibSched = match LIBSCHED.get() {
        Some(libsched) => libsched,
        None => {
            warn!("pcontainer_ioctl(): module is not initialized");
            return -libc::ENODEV;
        },
    };
    match libsched.ioctl(cmd, GroupId::from(request.group_id)) {
        Ok(()) => 0,
        Err(e) => -e.errno,
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Copies the request payload across the boundary. Reported as a boundary-copy failure before any
/// scheduler state is involved.
fn copy_request(request: *const pcontainer_request_t) -> Result<pcontainer_request_t, Fail> {
    if request.is_null() {
        return Err(Fail::new(libc::EFAULT, "failed to copy request payload"));
    }
    Ok(unsafe { ptr::read(request) })
}
