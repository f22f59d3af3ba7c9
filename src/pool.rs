//! Scratch value cell pool
//!
//! Conversions that need a temporary [`Data`] cell borrow one from the pool.
//! The [`Scratch`] guard resets the cell and puts it back when it goes out of
//! scope, on the error path as well, so a cell never carries a value, a
//! native tag or a nested type into its next use.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use crate::data::Data;

/// Bounded pool of idle cells
#[derive(Debug)]
pub(crate) struct ScratchPool {
    idle: Mutex<Vec<Data>>,
    capacity: usize,
}

impl ScratchPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Data>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Borrow a reset cell
    pub(crate) fn get(&self) -> Scratch<'_> {
        let data = self.lock().pop().unwrap_or_default();
        Scratch { pool: self, data }
    }

    /// Number of idle cells
    pub(crate) fn idle(&self) -> usize {
        self.lock().len()
    }

    fn put(&self, mut data: Data) {
        data.reset();
        let mut idle = self.lock();
        if idle.len() < self.capacity {
            idle.push(data);
        }
    }
}

/// A cell borrowed from a [`ScratchPool`]
pub(crate) struct Scratch<'a> {
    pool: &'a ScratchPool,
    data: Data,
}

impl Deref for Scratch<'_> {
    type Target = Data;

    fn deref(&self) -> &Data {
        &self.data
    }
}

impl DerefMut for Scratch<'_> {
    fn deref_mut(&mut self) -> &mut Data {
        &mut self.data
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_come_back_reset() {
        let pool = ScratchPool::new(2);
        {
            let mut cell = pool.get();
            cell.set_i64(42);
            assert!(!cell.is_null());
        }
        assert_eq!(pool.idle(), 1);
        let cell = pool.get();
        assert!(cell.is_null());
        assert_eq!(cell.native_type(), None);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_capacity_bounds_idle_cells() {
        let pool = ScratchPool::new(1);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);

        let disabled = ScratchPool::new(0);
        drop(disabled.get());
        assert_eq!(disabled.idle(), 0);
    }
}
