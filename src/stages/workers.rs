use std::ops::Range;
use std::thread;

/// Split `0..len` into at most `parallelism` contiguous chunks and run `work`
/// on each, returning the chunk results in range order.
///
/// Chunks run on scoped threads and share nothing mutable; with
/// `parallelism <= 1` the single chunk runs on the calling thread.
pub fn run_chunked<T, F>(len: usize, parallelism: usize, work: F) -> Vec<T>
where
    T: Send,
    F: Fn(Range<usize>) -> T + Sync,
{
    let workers = parallelism.clamp(1, len.max(1));
    if workers == 1 {
        return vec![work(0..len)];
    }

    let chunk = len.div_ceil(workers);
    let ranges: Vec<Range<usize>> = (0..len)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(len))
        .collect();

    let work = &work;
    thread::scope(|scope| {
        let handles: Vec<_> = ranges
            .into_iter()
            .map(|range| scope.spawn(move || work(range)))
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_are_merged_in_order() {
        let sequential: Vec<usize> = run_chunked(10, 1, |r| r.collect::<Vec<_>>())
            .into_iter()
            .flatten()
            .collect();
        let parallel: Vec<usize> = run_chunked(10, 3, |r| r.collect::<Vec<_>>())
            .into_iter()
            .flatten()
            .collect();

        assert_eq!(sequential, (0..10).collect::<Vec<_>>());
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_empty_input() {
        let chunks = run_chunked(0, 4, |r| r.len());
        assert_eq!(chunks, vec![0]);
    }
}
