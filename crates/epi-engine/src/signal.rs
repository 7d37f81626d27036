//! Manual-reset event used for the per-worker start/finish rendezvous.

use parking_lot::{Condvar, Mutex};

/// A boolean flag that threads can block on until it is set.
///
/// Stays set until explicitly [`reset`][Self::reset]; every waiter is woken
/// by [`set`][Self::set].
#[derive(Default)]
pub(crate) struct Signal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub(crate) fn set(&self) {
        let mut flag = self.flag.lock();
        *flag = true;
        self.cond.notify_all();
    }

    pub(crate) fn reset(&self) {
        *self.flag.lock() = false;
    }

    /// Block until the flag is set.  Does not clear it.
    pub(crate) fn wait(&self) {
        let mut flag = self.flag.lock();
        while !*flag {
            self.cond.wait(&mut flag);
        }
    }

    #[inline]
    pub(crate) fn is_set(&self) -> bool {
        *self.flag.lock()
    }
}
