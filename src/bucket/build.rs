//! Bucket construction: one gather pass over the batch, then one filter
//! build per non-empty shard.

use std::collections::HashMap;
use std::thread;

use crossbeam_channel::bounded;

use crate::quaternary::BuildError;
use crate::quaternary::Filter;
use crate::Row;

use super::Bucket;

/// Batches at least this large gather their keys and build their shard
/// filters on a worker pool. Below it the sequential path wins outright.
const PARALLEL_THRESHOLD: usize = 4096;

/// Row positions of every `(column, value)` cell, in row order.
type Occurrences<'a> = HashMap<(usize, &'a str), Vec<u64>>;

/// Per-shard filter inputs, keyed by `(occurrence ordinal, column)`.
type ShardMaps<'a> = HashMap<(usize, usize), HashMap<&'a str, u64>>;

/// Builds a bucket from one insert batch. Rows are stored as given; holes
/// contribute no index keys. The sequential and parallel paths produce
/// buckets with identical observable behavior.
pub(crate) fn new_bucket(rows: Vec<Row>) -> Result<Bucket, BuildError> {
    if rows.len() <= 1 {
        return Ok(Bucket {
            rows,
            index: HashMap::new(),
            loglen: 0,
        });
    }
    let loglen = usize::BITS - (rows.len() - 1).leading_zeros();
    let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let index = if rows.len() >= PARALLEL_THRESHOLD && workers > 1 {
        let shards = shard_maps(gather_parallel(&rows, workers));
        build_filters_parallel(shards, loglen, workers)?
    } else {
        build_filters(shard_maps(gather(&rows, 0, rows.len())), loglen)?
    };
    Ok(Bucket {
        rows,
        index,
        loglen,
    })
}

fn gather(rows: &[Row], lo: usize, hi: usize) -> Occurrences<'_> {
    let mut occurrences = Occurrences::new();
    for (y, row) in rows[lo..hi].iter().enumerate() {
        for (x, cell) in row.iter().enumerate() {
            occurrences
                .entry((x, cell.as_str()))
                .or_default()
                .push((lo + y) as u64);
        }
    }
    occurrences
}

/// Chunked gather. Locals merge in row order, so every per-value position
/// list comes out identical to the sequential gather's.
fn gather_parallel(rows: &[Row], workers: usize) -> Occurrences<'_> {
    let chunk = rows.len().div_ceil(workers);
    let locals: Vec<Occurrences<'_>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let lo = (w * chunk).min(rows.len());
                let hi = ((w + 1) * chunk).min(rows.len());
                scope.spawn(move || gather(rows, lo, hi))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("gather worker panicked"))
            .collect()
    });

    let mut merged = Occurrences::new();
    for local in locals {
        for (key, mut positions) in local {
            merged.entry(key).or_default().append(&mut positions);
        }
    }
    merged
}

/// Splits occurrence lists into shard inputs: the count shard holds
/// `T - 1` at ordinal 0, and the k-th occurrence's row index lands in the
/// position shard at ordinal k.
fn shard_maps(occurrences: Occurrences<'_>) -> ShardMaps<'_> {
    let mut shards = ShardMaps::new();
    for ((col, val), positions) in occurrences {
        shards
            .entry((0, col))
            .or_default()
            .insert(val, positions.len() as u64 - 1);
        for (ordinal, &y) in positions.iter().enumerate() {
            shards.entry((ordinal + 1, col)).or_default().insert(val, y);
        }
    }
    shards
}

fn build_filters(
    shards: ShardMaps<'_>,
    loglen: u32,
) -> Result<HashMap<(usize, usize), Filter>, BuildError> {
    let mut index = HashMap::with_capacity(shards.len());
    for (key, mapping) in shards {
        index.insert(key, Filter::build(&mapping, loglen)?);
    }
    Ok(index)
}

fn build_filters_parallel(
    shards: ShardMaps<'_>,
    loglen: u32,
    workers: usize,
) -> Result<HashMap<(usize, usize), Filter>, BuildError> {
    let total = shards.len();
    let (task_tx, task_rx) = bounded(total);
    let (done_tx, done_rx) = bounded(total);
    for task in shards {
        task_tx.send(task).expect("task channel rejected a shard");
    }
    drop(task_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                for (key, mapping) in task_rx {
                    let built = Filter::build(&mapping, loglen).map(|filter| (key, filter));
                    if done_tx.send(built).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        let mut index = HashMap::with_capacity(total);
        for built in done_rx {
            let (key, filter) = built?;
            index.insert(key, filter);
        }
        Ok(index)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Big enough to cross [`PARALLEL_THRESHOLD`]; answers must be
    /// indistinguishable from a small sequential bucket's.
    #[test]
    fn parallel_build_answers_like_sequential() {
        let data: Vec<Row> = (0..6000)
            .map(|i| vec![format!("id{i}"), format!("g{}", i % 7), "fixed".to_string()])
            .collect();
        let bucket = new_bucket(data.clone()).unwrap();

        let expected_g3 = data.iter().filter(|row| row[1] == "g3").count();
        assert_eq!(bucket.count(0, "id123"), 1);
        assert_eq!(bucket.get(0, "id123").unwrap()[1], "g4");
        assert_eq!(bucket.count(1, "g3"), expected_g3);
        assert_eq!(bucket.get_all(1, "g3").len(), expected_g3);
        assert_eq!(bucket.get_all(2, "fixed").len(), 6000);
        assert_eq!(bucket.count(1, "g9"), 0);
    }
}
