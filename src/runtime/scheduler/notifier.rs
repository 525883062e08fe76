// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::thread::{
    self,
    Thread,
};

//======================================================================================================================
// Traits
//======================================================================================================================

/// OS-level suspend/resume primitives. Keeping these behind a trait means the scheduling core calls
/// park and wake at well-defined points without depending on a specific threading facility. Both
/// are invoked only after the scheduling lock has been released.
pub trait ThreadNotifier: Send + Sync {
    /// Parks the calling thread once. May return spuriously; callers re-check their wake condition.
    fn park(&self);

    /// Wakes `thread`. A wake delivered before the matching park must not be lost.
    fn wake(&self, thread: &Thread);
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Notifier backed by the standard library's park/unpark token protocol.
pub struct StdNotifier;

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl ThreadNotifier for StdNotifier {
    fn park(&self) {
        thread::park();
    }

    fn wake(&self, thread: &Thread) {
        thread.unpark();
    }
}
