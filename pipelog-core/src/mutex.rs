//! Thread-owned mutual exclusion.
//!
//! [`OwnedMutex`] records which thread holds it, so the holder can be queried on
//! every platform and only the holder can release it. [`CriticalSection`] is the
//! scoped guard, and [`MutexValue`] couples the lock with a payload.

use std::{
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, ThreadId},
    time::Duration,
};

use crate::error::PipelogError;

/// A non-reentrant lock that tracks its owning thread.
///
/// Locking a mutex the calling thread already holds blocks forever.
#[derive(Debug, Default)]
pub struct OwnedMutex {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl OwnedMutex {
    pub const fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    // The inner critical sections never panic, so poisoning carries no information.
    fn state(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the mutex is unlocked, then takes it for the calling thread.
    pub fn lock(&self) {
        let state = self.state();
        let mut state = self
            .released
            .wait_while(state, |owner| owner.is_some())
            .unwrap_or_else(PoisonError::into_inner);
        *state = Some(thread::current().id());
    }

    /// Takes the mutex if it is unlocked. Never blocks on the holder.
    pub fn try_lock(&self) -> bool {
        let mut state = self.state();
        if state.is_some() {
            return false;
        }
        *state = Some(thread::current().id());
        true
    }

    /// Waits up to `timeout` for the mutex. Returns whether it was acquired.
    pub fn time_lock(&self, timeout: Duration) -> bool {
        let state = self.state();
        let (mut state, _) = self
            .released
            .wait_timeout_while(state, timeout, |owner| owner.is_some())
            .unwrap_or_else(PoisonError::into_inner);
        if state.is_some() {
            return false;
        }
        *state = Some(thread::current().id());
        true
    }

    pub fn time_lock_micros(&self, timeout_micros: u64) -> bool {
        self.time_lock(Duration::from_micros(timeout_micros))
    }

    /// Releases the mutex.
    ///
    /// Unlocking an unlocked mutex is a no-op. Unlocking a mutex held by another
    /// thread leaves it untouched and reports [`PipelogError::NotOwner`].
    pub fn unlock(&self) -> Result<(), PipelogError> {
        let mut state = self.state();
        match *state {
            None => Ok(()),
            Some(holder) if holder == thread::current().id() => {
                *state = None;
                drop(state);
                self.released.notify_all();
                Ok(())
            }
            Some(holder) => Err(PipelogError::NotOwner { holder }),
        }
    }

    /// Identity of the thread currently holding the mutex.
    pub fn owner(&self) -> Option<ThreadId> {
        *self.state()
    }

    pub fn is_locked(&self) -> bool {
        self.owner().is_some()
    }

    pub fn is_owned_by_current(&self) -> bool {
        self.owner() == Some(thread::current().id())
    }
}

/// Holds an [`OwnedMutex`] for the lifetime of the value.
///
/// The guard is tied to the locking thread and releases on every exit path,
/// including `?` propagation and unwinding.
#[must_use = "the mutex is released as soon as the critical section is dropped"]
pub struct CriticalSection<'a> {
    mutex: &'a OwnedMutex,
    _not_send: PhantomData<*const ()>,
}

impl<'a> CriticalSection<'a> {
    pub fn new(mutex: &'a OwnedMutex) -> Self {
        mutex.lock();
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }

    /// Like [`CriticalSection::new`] but gives up after `timeout`.
    pub fn with_timeout(mutex: &'a OwnedMutex, timeout: Duration) -> Result<Self, PipelogError> {
        if !mutex.time_lock(timeout) {
            return Err(PipelogError::LockTimeout);
        }
        Ok(Self {
            mutex,
            _not_send: PhantomData,
        })
    }
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        // Cannot fail: the guard is !Send, so the dropping thread is the holder.
        let _ = self.mutex.unlock();
    }
}

/// A value guarded by an [`OwnedMutex`].
#[derive(Debug, Default)]
pub struct MutexValue<T> {
    mutex: OwnedMutex,
    value: UnsafeCell<T>,
}

// Access to `value` goes through the owned mutex, except for the unsafe
// unsynchronized accessor whose caller takes responsibility.
unsafe impl<T: Send> Send for MutexValue<T> {}
unsafe impl<T: Send> Sync for MutexValue<T> {}

impl<T> MutexValue<T> {
    pub const fn new(value: T) -> Self {
        Self {
            mutex: OwnedMutex::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Blocks until the lock is held and returns mutable access to the value.
    /// The lock is released when the returned guard is dropped.
    pub fn lock_data(&self) -> MutexValueGuard<'_, T> {
        self.mutex.lock();
        MutexValueGuard::new(self)
    }

    pub fn try_lock_data(&self) -> Option<MutexValueGuard<'_, T>> {
        self.mutex.try_lock().then(|| MutexValueGuard::new(self))
    }

    pub fn time_lock_data(&self, timeout: Duration) -> Result<MutexValueGuard<'_, T>, PipelogError> {
        if !self.mutex.time_lock(timeout) {
            return Err(PipelogError::LockTimeout);
        }
        Ok(MutexValueGuard::new(self))
    }

    /// Returns the value without taking the lock.
    ///
    /// Only available for `T: Sync`, so shared access from several threads at
    /// once is itself sound:
    ///
    /// ```compile_fail
    /// use std::cell::Cell;
    /// use pipelog_core::MutexValue;
    ///
    /// let value = MutexValue::new(Cell::new(0u32));
    /// unsafe { value.data_unsynchronized() }.set(1);
    /// ```
    ///
    /// # Safety
    /// No other thread may hold mutable access through [`MutexValue::lock_data`]
    /// for as long as the returned reference is alive.
    pub unsafe fn data_unsynchronized(&self) -> &T
    where
        T: Sync,
    {
        unsafe { &*self.value.get() }
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.mutex.owner()
    }

    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }
}

/// Mutable access to the value of a locked [`MutexValue`].
pub struct MutexValueGuard<'a, T> {
    source: &'a MutexValue<T>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, T> MutexValueGuard<'a, T> {
    fn new(source: &'a MutexValue<T>) -> Self {
        Self {
            source,
            _not_send: PhantomData,
        }
    }
}

impl<T> Deref for MutexValueGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.source.value.get() }
    }
}

impl<T> DerefMut for MutexValueGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.source.value.get() }
    }
}

impl<T> Drop for MutexValueGuard<'_, T> {
    fn drop(&mut self) {
        let _ = self.source.mutex.unlock();
    }
}
