//! The table: an append-only list of buckets with fan-out reads.

use std::collections::HashMap;

use crate::bucket::new_bucket;
use crate::bucket::Bucket;
use crate::quaternary::BuildError;
use crate::Row;

/// A memory compact in-memory multicolumn string table aka multimap.
///
/// Every insert batch becomes one immutable [bucket](crate::bucket); reads
/// fan out over the buckets and concatenate their answers in insertion
/// order. Deletions tombstone rows in place, leaving holes that persist
/// until [`Table::compact`] rebuilds the table over its live rows.
///
/// The table is not synchronized. Mutating operations must not race with
/// anything else touching the same table; that coordination belongs to the
/// caller.
#[derive(Debug, Default)]
pub struct Table {
    buckets: Vec<Bucket>,
}

impl Table {
    /// Creates an empty table.
    pub fn new() -> Self {
        Table {
            buckets: Vec::new(),
        }
    }

    /// Inserts a batch of rows, dropping any holes it contains.
    pub fn insert(&mut self, rows: Vec<Row>) -> Result<(), BuildError> {
        let rows: Vec<Row> = rows.into_iter().filter(|row| !row.is_empty()).collect();
        if !rows.is_empty() {
            self.buckets.push(new_bucket(rows)?);
        }
        Ok(())
    }

    /// Inserts a batch of rows as-is; empty rows become permanent holes.
    pub fn insert_holes(&mut self, rows: Vec<Row>) -> Result<(), BuildError> {
        if !rows.is_empty() {
            self.buckets.push(new_bucket(rows)?);
        }
        Ok(())
    }

    /// Counts the rows holding `val` in column `col`.
    ///
    /// Exact over freshly built buckets. After deletions the count of a
    /// value whose first-seen row was tombstoned through a *different*
    /// column can drift until the next [`Table::compact`].
    pub fn count(&self, col: usize, val: &str) -> usize {
        self.buckets
            .iter()
            .map(|bucket| bucket.count(col, val))
            .sum()
    }

    /// Loads an arbitrary single row holding `val` in column `col`.
    pub fn get(&self, col: usize, val: &str) -> Option<&[String]> {
        self.buckets.iter().find_map(|bucket| bucket.get(col, val))
    }

    /// Loads every live row holding `val` in column `col`.
    pub fn get_all(&self, col: usize, val: &str) -> Vec<&[String]> {
        self.get_all_holes(col, val)
            .into_iter()
            .filter(|row| !row.is_empty())
            .collect()
    }

    /// Like [`Table::get_all`], but keeps whatever holes the buckets hand
    /// back instead of suppressing them.
    pub fn get_all_holes(&self, col: usize, val: &str) -> Vec<&[String]> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.get_all(col, val))
            .collect()
    }

    /// Tombstones every row holding `val` in column `col`.
    pub fn remove(&mut self, col: usize, val: &str) {
        for bucket in &mut self.buckets {
            bucket.remove(col, val);
        }
    }

    /// Loads every live row matching all `(column, value)` clauses.
    ///
    /// Panics when `clauses` is empty: an empty AND matches everything,
    /// which is never what a caller meant.
    pub fn query_by<S: AsRef<str>>(&self, clauses: &HashMap<usize, S>) -> Vec<&[String]> {
        assert!(!clauses.is_empty(), "query_by: clauses must not be empty");
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.get_by(clauses))
            .filter(|row| !row.is_empty())
            .collect()
    }

    /// Like [`Table::query_by`], but holes the planner could not refute are
    /// kept in the result as empty rows.
    ///
    /// Panics when `clauses` is empty.
    pub fn query_by_holes<S: AsRef<str>>(&self, clauses: &HashMap<usize, S>) -> Vec<&[String]> {
        assert!(
            !clauses.is_empty(),
            "query_by_holes: clauses must not be empty"
        );
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.get_by(clauses))
            .collect()
    }

    /// Tombstones every live row matching all clauses and returns how many
    /// rows were emptied.
    ///
    /// Panics when `clauses` is empty.
    pub fn delete_by<S: AsRef<str>>(&mut self, clauses: &HashMap<usize, S>) -> usize {
        assert!(!clauses.is_empty(), "delete_by: clauses must not be empty");
        self.buckets
            .iter_mut()
            .map(|bucket| bucket.remove_by(clauses))
            .sum()
    }

    /// Rebuilds the table as a single bucket over its live rows, dropping
    /// every hole accumulated by deletions.
    ///
    /// The old buckets are only replaced once the rebuild succeeded, so a
    /// build error leaves the table untouched.
    pub fn compact(&mut self) -> Result<(), BuildError> {
        let rows: Vec<Row> = self.all().into_iter().map(|row| row.to_vec()).collect();
        let mut buckets = Vec::new();
        if !rows.is_empty() {
            buckets.push(new_bucket(rows)?);
        }
        self.buckets = buckets;
        Ok(())
    }

    /// Every live row in the table, in insertion order.
    pub fn all(&self) -> Vec<&[String]> {
        self.all_holes()
            .into_iter()
            .filter(|row| !row.is_empty())
            .collect()
    }

    /// Every row slot in the table, holes included.
    pub fn all_holes(&self) -> Vec<&[String]> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.all().iter().map(Row::as_slice))
            .collect()
    }
}
