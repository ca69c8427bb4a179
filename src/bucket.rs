//! An immutable block of rows and the filter family indexing it.
//!
//! A bucket is built once from an insert batch and never re-indexed. Its
//! index is a sparse map from `(occurrence ordinal, column)` to one
//! [`Filter`](crate::quaternary::Filter) per shard: ordinal 0 is the count
//! shard, answering `T - 1` for a value occurring `T` times in the column;
//! ordinals `k >= 1` are position shards, answering the row index of the
//! k-th occurrence. All shard answers are `loglen`-bit integers, where
//! `loglen` is the bit length of the highest row index.
//!
//! Filters answer arbitrarily for keys they were never built from, so every
//! decoded row index is reduced modulo the row count and the row's cell is
//! re-verified before the row is trusted. Deletion tombstones rows in place
//! (an empty row is a *hole*); the filter family is deliberately left
//! stale, and verification is what keeps stale answers harmless.

mod build;
mod planner;

use std::collections::HashMap;

use crate::quaternary::Filter;
use crate::Row;

pub(crate) use build::new_bucket;

#[derive(Debug)]
pub(crate) struct Bucket {
    rows: Vec<Row>,
    index: HashMap<(usize, usize), Filter>,
    loglen: u32,
}

impl Bucket {
    /// Raw shard answer for `val` at `(ordinal, col)`; 0 when the bucket is
    /// trivial or the shard was never built.
    fn filter(&self, ordinal: usize, col: usize, val: &str) -> u64 {
        if self.loglen == 0 {
            return 0;
        }
        match self.index.get(&(ordinal, col)) {
            Some(filter) => filter.get(val),
            None => 0,
        }
    }

    /// Optimistic occurrence count of `val` in column `col`: exact when the
    /// value was in the build batch, arbitrary otherwise. Callers bound
    /// their shard walks with it and rely on row verification to discard
    /// the excess.
    pub(crate) fn count_existing(&self, col: usize, val: &str) -> usize {
        if self.rows.is_empty() {
            return 0;
        }
        self.filter(0, col, val) as usize + 1
    }

    /// Verified occurrence count: 0 unless the first-occurrence shard
    /// decodes to a row that really holds `val` at `col`.
    pub(crate) fn count(&self, col: usize, val: &str) -> usize {
        if self.rows.is_empty() {
            return 0;
        }
        let idx = self.filter(1, col, val) as usize % self.rows.len();
        let row = &self.rows[idx];
        if col < row.len() && row[col] == val {
            self.count_existing(col, val)
        } else {
            0
        }
    }

    /// The first decodable row holding `val` at `col`.
    pub(crate) fn get(&self, col: usize, val: &str) -> Option<&[String]> {
        if self.rows.is_empty() {
            return None;
        }
        for ordinal in 1..=self.count_existing(col, val) {
            let idx = self.filter(ordinal, col, val) as usize % self.rows.len();
            let row = &self.rows[idx];
            if col < row.len() && row[col] == val {
                return Some(row);
            }
        }
        None
    }

    /// Every live row holding `val` at `col`, in first-seen order.
    pub(crate) fn get_all(&self, col: usize, val: &str) -> Vec<&[String]> {
        let mut rows = Vec::new();
        if self.rows.is_empty() {
            return rows;
        }
        for ordinal in 1..=self.count_existing(col, val) {
            let idx = self.filter(ordinal, col, val) as usize % self.rows.len();
            let row = &self.rows[idx];
            if col < row.len() && row[col] == val {
                rows.push(row.as_slice());
            }
        }
        rows
    }

    /// Tombstones every row holding `val` at `col`.
    pub(crate) fn remove(&mut self, col: usize, val: &str) {
        if self.rows.is_empty() {
            return;
        }
        let len = self.rows.len();
        for ordinal in 1..=self.count_existing(col, val) {
            let idx = self.filter(ordinal, col, val) as usize % len;
            let row = &self.rows[idx];
            if col < row.len() && row[col] == val {
                self.rows[idx] = Row::new();
            }
        }
    }

    /// The backing row array, holes included.
    pub(crate) fn all(&self) -> &[Row] {
        &self.rows
    }
}
