#[cfg(feature = "loom")]
mod imp {
    use core::time::Duration;
    pub(crate) use loom::{
        cell::UnsafeCell,
        sync::atomic::{AtomicBool, AtomicU8, Ordering},
    };

    /// Loom-backed mutex exposing the same infallible `lock` as `parking_lot`.
    pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(loom::sync::Mutex::new(value))
        }

        pub(crate) fn lock(&self) -> loom::sync::MutexGuard<'_, T> {
            self.0.lock().unwrap()
        }
    }

    /// One-shot gate that blocks waiters until it is opened.
    pub(crate) struct Latch {
        open: loom::sync::Mutex<bool>,
        cvar: loom::sync::Condvar,
    }

    impl Default for Latch {
        fn default() -> Self {
            Self {
                open: loom::sync::Mutex::new(false),
                cvar: loom::sync::Condvar::new(),
            }
        }
    }

    impl Latch {
        pub(crate) fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cvar.notify_all();
        }

        /// Loom does not model time: bounded waits degrade to a poll.
        pub(crate) fn wait(&self, timeout: Option<Duration>) -> bool {
            let mut open = self.open.lock().unwrap();
            if timeout.is_some() {
                return *open;
            }
            while !*open {
                open = self.cvar.wait(open).unwrap();
            }
            true
        }
    }
}

#[cfg(not(feature = "loom"))]
mod imp {
    use crate::types::SyncUnsafeCell;
    pub(crate) use core::{
        cell::UnsafeCell,
        sync::atomic::{AtomicBool, AtomicU8, Ordering},
    };
    use core::time::Duration;
    pub(crate) use parking_lot::Mutex;
    use parking_lot::Condvar;
    use std::time::Instant;

    /// One-shot gate that blocks waiters until it is opened.
    #[derive(Debug, Default)]
    pub(crate) struct Latch {
        open: Mutex<bool>,
        cvar: Condvar,
    }

    impl Latch {
        pub(crate) fn open(&self) {
            *self.open.lock() = true;
            self.cvar.notify_all();
        }

        /// Returns whether the latch is open when the wait ends.
        pub(crate) fn wait(&self, timeout: Option<Duration>) -> bool {
            let mut open = self.open.lock();
            if timeout.is_some_and(|timeout| timeout.is_zero()) {
                return *open;
            }
            // A deadline that overflows `Instant` is as good as no deadline.
            match timeout.and_then(|timeout| Instant::now().checked_add(timeout)) {
                None => {
                    while !*open {
                        self.cvar.wait(&mut open);
                    }
                    true
                }
                Some(deadline) => {
                    while !*open {
                        if self.cvar.wait_until(&mut open, deadline).timed_out() {
                            return *open;
                        }
                    }
                    true
                }
            }
        }
    }

    /// Gives raw pointers loom's closure-based `with` access, so output slots
    /// are read and written the same way in both builds.
    pub(crate) trait LoomPtrCompat: Sized {
        type Ptr;
        fn with<R>(self, f: impl FnOnce(Self::Ptr) -> R) -> R;
    }

    impl<T> LoomPtrCompat for *const T {
        type Ptr = *const T;
        fn with<R>(self, f: impl FnOnce(Self::Ptr) -> R) -> R {
            f(self)
        }
    }

    impl<T> LoomPtrCompat for *mut T {
        type Ptr = *mut T;
        fn with<R>(self, f: impl FnOnce(Self::Ptr) -> R) -> R {
            f(self)
        }
    }

    /// Loom's `UnsafeCell::get_mut(&self)`, used by `publish` to fill a slot.
    pub(crate) trait LoomUnsafeCellCompat<T> {
        fn get_mut(&self) -> impl LoomPtrCompat<Ptr = *mut T>;
    }

    impl<T> LoomUnsafeCellCompat<T> for SyncUnsafeCell<T> {
        fn get_mut(&self) -> impl LoomPtrCompat<Ptr = *mut T> {
            self.get()
        }
    }
}

pub(crate) use imp::*;
