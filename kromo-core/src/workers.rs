//! Fixed-size Rayon pools for the parallel generators and colouring engine.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{GraphError, Result};

/// Builds a dedicated pool with exactly `workers` threads.
pub(crate) fn worker_pool(workers: usize) -> Result<ThreadPool> {
    if workers == 0 {
        return Err(GraphError::InvalidWorkerCount { got: workers });
    }
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|idx| format!("kromo-worker-{idx}"))
        .build()
        .map_err(|error| GraphError::WorkerPool {
            message: error.to_string(),
        })
}

/// Splits `0..len` into `parts` contiguous ranges whose sizes differ by at
/// most one. Trailing ranges are empty when `parts > len`.
///
/// # Examples
/// ```
/// let ranges = kromo_core::partition(5, 2);
/// assert_eq!(ranges, vec![0..3, 3..5]);
/// ```
#[must_use]
#[expect(
    clippy::integer_division,
    clippy::integer_division_remainder_used,
    reason = "Block sizes are the floor quotient plus one for each leftover index."
)]
pub fn partition(len: usize, parts: usize) -> Vec<std::ops::Range<usize>> {
    let buckets = parts.max(1);
    let base = len / buckets;
    let extra = len % buckets;
    let mut start = 0;
    (0..buckets)
        .map(|part| {
            let size = base + usize::from(part < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}
