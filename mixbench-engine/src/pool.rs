//! The working set of objects believed to exist in the bucket.
//!
//! [`ObjectPool`] pairs a `HashMap` from object name to position with a dense `Vec` of records.
//! Insertion, uniform random selection and removal are all O(1): removal swaps the last record
//! into the vacated position and patches its index. The lock is only ever held for one of these
//! operations, never across a storage call.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use mixbench_types::ObjectRecord;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug)]
struct PoolInner {
    index: HashMap<String, usize>,
    records: Vec<ObjectRecord>,
    rng: SmallRng,
}

/// A concurrency-safe set of [`ObjectRecord`]s with uniform random selection.
#[derive(Debug)]
pub struct ObjectPool {
    inner: Mutex<PoolInner>,
}

impl ObjectPool {
    /// Creates an empty pool with a random selection seed.
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Creates an empty pool whose random selection is driven by the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                index: HashMap::new(),
                records: Vec::new(),
                rng: SmallRng::seed_from_u64(seed),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a newly created object.
    ///
    /// Adding a name that is already present replaces its record.
    pub fn add(&self, record: ObjectRecord) {
        let mut inner = self.lock();
        let inner = &mut *inner;

        let existing = inner.index.get(&record.name).copied();
        match existing {
            Some(position) => inner.records[position] = record,
            None => {
                inner.index.insert(record.name.clone(), inner.records.len());
                inner.records.push(record);
            }
        }
    }

    /// Picks one record uniformly at random and removes it.
    ///
    /// Returns `None` if the pool is empty.
    pub fn remove_random(&self) -> Option<ObjectRecord> {
        let mut inner = self.lock();
        let inner = &mut *inner;

        if inner.records.is_empty() {
            return None;
        }

        let position = inner.rng.random_range(0..inner.records.len());
        let record = inner.records.swap_remove(position);
        inner.index.remove(&record.name);

        if let Some(moved) = inner.records.get(position)
            && let Some(slot) = inner.index.get_mut(&moved.name)
        {
            *slot = position;
        }

        Some(record)
    }

    /// Picks one record uniformly at random without removing it.
    ///
    /// Returns `None` if the pool is empty.
    pub fn peek_random(&self) -> Option<ObjectRecord> {
        let mut inner = self.lock();
        let inner = &mut *inner;

        if inner.records.is_empty() {
            return None;
        }

        let position = inner.rng.random_range(0..inner.records.len());
        Some(inner.records[position].clone())
    }

    /// Removes the record with the given name.
    pub fn remove(&self, name: &str) -> Option<ObjectRecord> {
        let mut inner = self.lock();
        let inner = &mut *inner;

        let position = inner.index.remove(name)?;
        let record = inner.records.swap_remove(position);

        if let Some(moved) = inner.records.get(position)
            && let Some(slot) = inner.index.get_mut(&moved.name)
        {
            *slot = position;
        }

        Some(record)
    }

    /// Returns `true` if an object with the given name is in the pool.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().index.contains_key(name)
    }

    /// Current number of objects.
    ///
    /// This is a diagnostic snapshot and may be stale by the time it is read.
    pub fn size(&self) -> usize {
        self.lock().records.len()
    }

    /// Returns `true` if the pool is currently empty.
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Removes and returns every record, leaving the pool empty.
    pub fn drain(&self) -> Vec<ObjectRecord> {
        let mut inner = self.lock();
        inner.index.clear();
        std::mem::take(&mut inner.records)
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new()
    }
}
