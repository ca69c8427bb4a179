//! The multi-clause planner behind `get_by` and `remove_by`.
//!
//! Clauses are AND-combined `(column, value)` equality constraints. The
//! planner orders them by their optimistic counts, walks the position
//! shards of the most selective clause to seed candidate rows, and prunes
//! the candidates against the remaining clauses by reading the rows
//! directly. Only the seed clause walks position shards.

use std::collections::HashMap;

use crate::Row;

use super::Bucket;

struct Clause<'a> {
    col: usize,
    val: &'a str,
    count: usize,
}

impl<'a> Clause<'a> {
    /// Whether `row` is compatible with this clause. A hole has no cells
    /// left to refute anything, so it stays compatible; the table layer
    /// decides whether holes surface or not.
    fn admits(&self, row: &Row) -> bool {
        row.is_empty() || (self.col < row.len() && row[self.col] == self.val)
    }
}

impl Bucket {
    /// Candidate row positions compatible with every clause, in discovery
    /// order. Empty when any clause reports no occurrences at all.
    fn select_by<S: AsRef<str>>(&self, clauses: &HashMap<usize, S>) -> Vec<usize> {
        if clauses.is_empty() || self.rows.is_empty() {
            return Vec::new();
        }

        let mut ordered: Vec<Clause> = Vec::with_capacity(clauses.len());
        for (&col, val) in clauses {
            let val = val.as_ref();
            let count = self.count_existing(col, val);
            if count == 0 {
                return Vec::new();
            }
            ordered.push(Clause { col, val, count });
        }
        // Cheapest seed first; longer values win ties as the likelier
        // discriminator.
        ordered.sort_unstable_by(|a, b| {
            a.count
                .cmp(&b.count)
                .then_with(|| b.val.len().cmp(&a.val.len()))
        });

        let len = self.rows.len();
        let seed = &ordered[0];
        let mut positions = Vec::with_capacity(seed.count);
        for ordinal in 1..=seed.count {
            let idx = self.filter(ordinal, seed.col, seed.val) as usize % len;
            if seed.admits(&self.rows[idx]) {
                positions.push(idx);
            }
        }

        for clause in &ordered[1..] {
            if positions.is_empty() {
                break;
            }
            positions.retain(|&idx| clause.admits(&self.rows[idx]));
        }
        positions
    }

    /// Rows compatible with every clause; holes the planner could not
    /// refute are handed back as empty rows.
    pub(crate) fn get_by<S: AsRef<str>>(&self, clauses: &HashMap<usize, S>) -> Vec<&[String]> {
        self.select_by(clauses)
            .into_iter()
            .map(|idx| self.rows[idx].as_slice())
            .collect()
    }

    /// Tombstones every live row matching all clauses and returns how many
    /// rows this call emptied.
    pub(crate) fn remove_by<S: AsRef<str>>(&mut self, clauses: &HashMap<usize, S>) -> usize {
        let mut removed = 0;
        for idx in self.select_by(clauses) {
            if !self.rows[idx].is_empty() {
                self.rows[idx] = Row::new();
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::new_bucket;

    fn rows(data: &[&[&str]]) -> Vec<Row> {
        data.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn single_clause() {
        let bucket = new_bucket(rows(&[
            &["apple", "red"],
            &["banana", "yellow"],
            &["apple", "green"],
            &["cherry", "red"],
        ]))
        .unwrap();

        let result = bucket.get_by(&HashMap::from([(0, "apple")]));
        assert_eq!(result.len(), 2);
        for row in result {
            assert_eq!(row[0], "apple");
        }
    }

    #[test]
    fn multi_clause() {
        let bucket = new_bucket(rows(&[
            &["user1", "admin", "active"],
            &["user2", "member", "inactive"],
            &["user3", "admin", "inactive"],
            &["user4", "member", "active"],
        ]))
        .unwrap();

        let result = bucket.get_by(&HashMap::from([(1, "admin"), (2, "inactive")]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].join(","), "user3,admin,inactive");
    }

    #[test]
    fn no_match_returns_nothing() {
        let bucket = new_bucket(rows(&[&["a", "b"], &["c", "d"]])).unwrap();
        assert!(bucket.get_by(&HashMap::from([(0, "x")])).is_empty());
    }

    #[test]
    fn empty_clause_map_selects_nothing() {
        let bucket = new_bucket(rows(&[&["a", "b"], &["c", "d"]])).unwrap();
        assert!(bucket.get_by(&HashMap::<usize, &str>::new()).is_empty());
    }

    #[test]
    fn remove_by_tombstones_matches() {
        let mut bucket = new_bucket(rows(&[
            &["1", "keep"],
            &["2", "remove"],
            &["3", "remove"],
            &["4", "keep"],
        ]))
        .unwrap();

        assert_eq!(bucket.remove_by(&HashMap::from([(1, "remove")])), 2);

        let live: Vec<_> = bucket.all().iter().filter(|row| !row.is_empty()).collect();
        assert_eq!(live.len(), 2);
        for row in live {
            assert_ne!(row[1], "remove");
        }
        // Re-running over the holes tombstones nothing further.
        assert_eq!(bucket.remove_by(&HashMap::from([(1, "remove")])), 0);
    }

    #[test]
    fn remove_by_multi_clause() {
        let mut bucket = new_bucket(rows(&[
            &["a", "x", "1"],
            &["a", "y", "2"],
            &["b", "x", "2"],
            &["b", "y", "1"],
        ]))
        .unwrap();

        assert_eq!(bucket.remove_by(&HashMap::from([(0, "a"), (2, "2")])), 1);
        for row in bucket.all().iter().filter(|row| !row.is_empty()) {
            assert!(!(row[0] == "a" && row[2] == "2"));
        }
        assert_eq!(bucket.all().iter().filter(|row| !row.is_empty()).count(), 3);
    }
}
