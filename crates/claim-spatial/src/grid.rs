//! Sparse spatial grid bucketing footprints by cell.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::{Bounds, CellKey};

/// Sparse grid mapping each touched cell to the items whose footprint covers it.
///
/// Items in a bucket are kept sorted so lookups are deterministic regardless
/// of insertion order.
#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    cells: HashMap<CellKey, SmallVec<[T; 4]>>,
}

impl<T> Default for SpatialGrid<T> {
    fn default() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }
}

impl<T: Copy + Ord> SpatialGrid<T> {
    /// Create an empty grid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `item` in every cell its footprint touches.
    pub fn insert(&mut self, item: T, bounds: &Bounds) {
        for key in bounds.cells() {
            let bucket = self.cells.entry(key).or_default();
            if let Err(at) = bucket.binary_search(&item) {
                bucket.insert(at, item);
            }
        }
    }

    /// Remove `item` from every cell of `bounds`, dropping emptied cells.
    pub fn remove(&mut self, item: T, bounds: &Bounds) {
        for key in bounds.cells() {
            let Some(bucket) = self.cells.get_mut(&key) else {
                continue;
            };
            if let Ok(at) = bucket.binary_search(&item) {
                bucket.remove(at);
            }
            if bucket.is_empty() {
                self.cells.remove(&key);
            }
        }
    }

    /// Items whose footprint touches the cell holding `(x, z)`.
    #[must_use]
    pub fn candidates_at(&self, x: i32, z: i32) -> &[T] {
        self.cells
            .get(&CellKey::containing(x, z))
            .map(|bucket| bucket.as_slice())
            .unwrap_or_default()
    }

    /// Items whose footprint touches any cell of `bounds`, sorted and deduplicated.
    #[must_use]
    pub fn candidates_in(&self, bounds: &Bounds) -> Vec<T> {
        let mut out: Vec<T> = bounds
            .cells()
            .filter_map(|key| self.cells.get(&key))
            .flat_map(|bucket| bucket.iter().copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if no cell is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
