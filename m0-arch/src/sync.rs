//! Interrupt-masking lock.
//!
//! Provides [`IrqLock`], the single synchronisation primitive the kernel
//! uses. On a single-core Cortex-M0 there is nothing to spin against:
//! masking interrupts *is* mutual exclusion. The lock flag only catches
//! re-entry from the same context, which would otherwise corrupt state
//! silently.
//!
//! # Example
//!
//! ```ignore
//! use m0_arch::sync::IrqLock;
//!
//! static COUNTER: IrqLock<u64> = IrqLock::new(0);
//!
//! fn increment() {
//!     let mut guard = COUNTER.lock();
//!     *guard += 1;
//! }   // Interrupts restored here
//! ```

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::cpu::{disable_interrupts, restore_interrupts};

/// A lock that masks interrupts while held.
///
/// ARMv6-M has no compare-and-swap, so the flag is a plain load/store pair;
/// that is sound here because interrupts are already masked when the flag
/// is examined and there is exactly one core.
///
/// # Safety Invariants
///
/// - The guard must be dropped (restoring interrupts) before blocking
/// - Critical sections must be short: the whole system is stalled
pub struct IrqLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: IrqLock provides mutual exclusion for its data; the data is only
// reachable through the guard, which masks interrupts for its lifetime.
unsafe impl<T: Send> Sync for IrqLock<T> {}
unsafe impl<T: Send> Send for IrqLock<T> {}

impl<T> IrqLock<T> {
    /// Create a new lock holding `value`.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, masking interrupts.
    ///
    /// Returns a guard that restores the previous interrupt state when
    /// dropped.
    ///
    /// # Panics
    ///
    /// Panics if the lock is already held. With interrupts masked and one
    /// core, a held lock can only mean re-entry from the owning context,
    /// which would never make progress.
    #[must_use]
    pub fn lock(&self) -> IrqLockGuard<'_, T> {
        let was_enabled = disable_interrupts();
        if self.locked.load(Ordering::Relaxed) {
            panic!("IrqLock held recursively");
        }
        self.locked.store(true, Ordering::Relaxed);

        IrqLockGuard {
            lock: self,
            was_enabled,
            _not_send: core::marker::PhantomData,
        }
    }

    /// Get the address of the protected data without taking the lock.
    ///
    /// For last-resort paths (the panic handler) that must read state even
    /// if the lock was held when the world ended.
    #[must_use]
    pub const fn as_mut_ptr(&self) -> *mut T {
        self.data.get()
    }

    /// Get a mutable reference to the underlying data.
    ///
    /// Safe because `&mut self` guarantees exclusive access.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consume the lock and return the inner value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for IrqLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Guard providing access to the locked data.
///
/// Interrupts stay masked while this guard exists. Dropping it releases
/// the flag and then restores the saved interrupt state, in that order, so
/// no interrupt can observe the flag still set.
///
/// The guard is `!Send`: moving it to another execution context would
/// restore the wrong interrupt state.
pub struct IrqLockGuard<'a, T> {
    lock: &'a IrqLock<T>,
    was_enabled: bool,
    _not_send: core::marker::PhantomData<*const ()>,
}

impl<T> Deref for IrqLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock, so access is exclusive.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for IrqLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock, so access is exclusive.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for IrqLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Relaxed);
        restore_interrupts(self.was_enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_round_trip() {
        let lock = IrqLock::new(5u32);
        {
            let mut guard = lock.lock();
            *guard += 1;
        }
        assert_eq!(*lock.lock(), 6);
    }

    #[test]
    fn test_get_mut() {
        let mut lock = IrqLock::new(1u32);
        *lock.get_mut() = 9;
        assert_eq!(lock.into_inner(), 9);
    }

    #[test]
    #[should_panic(expected = "held recursively")]
    fn test_reentry_panics() {
        let lock = IrqLock::new(());
        let _a = lock.lock();
        let _b = lock.lock();
    }
}
