//! Bounded worker-pool fan-out for per-item pipeline work.
//!
//! The dispatcher never inspects what an item is: the per-chunk transform
//! is an external function, and items are only counted for sharding.
//! Chunks are submitted in FIFO order but complete in arbitrary order;
//! output ordering correctness is the responsibility of each item's own
//! addressing (e.g. per-frame file names).

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::{panic, path::PathBuf};

use crossbeam_channel::unbounded;

/// One unit of per-frame work produced by the external pipeline; opaque
/// to the dispatcher beyond being enumerable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePayload {
    pub frame_number: usize,
    pub frame_path: PathBuf,
}

/// Worker-pool sizing for [`run_parallel`].
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Number of OS worker threads in the pool.
    pub thread_count: usize,
    /// Multiplier on the per-submission chunk size.
    pub queue_count: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            thread_count: num_cpus::get(),
            queue_count: 1,
        }
    }
}

/// Chunk size used when sharding `item_count` items across the pool.
fn shard_size(item_count: usize, options: &DispatchOptions) -> usize {
    (item_count / options.thread_count.max(1) * options.queue_count).max(1)
}

/// Shards `items` across a fixed pool of workers, each invoking
/// `process` on one chunk at a time with the shared progress callback.
///
/// The first worker error stops the remaining workers from pulling
/// further chunks and propagates to the caller; whatever progress was
/// already reported stands. A panicking worker propagates its panic —
/// this is the one boundary where failures are not returned as values.
pub fn run_parallel<T, F, P, E>(
    items: Vec<T>,
    process: F,
    options: DispatchOptions,
    on_progress: P,
) -> Result<(), E>
where
    T: Send,
    F: Fn(Vec<T>, &P) -> Result<(), E> + Sync,
    P: Fn(usize) + Sync,
    E: Send,
{
    if items.is_empty() {
        return Ok(());
    }
    let shard = shard_size(items.len(), &options);
    tracing::debug!(
        items = items.len(),
        shard,
        threads = options.thread_count,
        "dispatching parallel work"
    );

    let (sender, receiver) = unbounded();
    let mut items = items.into_iter();
    loop {
        let chunk: Vec<T> = items.by_ref().take(shard).collect();
        if chunk.is_empty() {
            break;
        }
        if sender.send(chunk).is_err() {
            break;
        }
    }
    drop(sender);

    let failed = AtomicBool::new(false);
    thread::scope(|scope| {
        let workers: Vec<_> = (0..options.thread_count.max(1))
            .map(|_| {
                scope.spawn(|| {
                    while let Ok(chunk) = receiver.recv() {
                        if failed.load(Ordering::Acquire) {
                            break;
                        }
                        if let Err(error) = process(chunk, &on_progress) {
                            failed.store(true, Ordering::Release);
                            return Err(error);
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        let mut outcome = Ok(());
        for worker in workers {
            match worker.join() {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    if outcome.is_ok() {
                        outcome = Err(error);
                    }
                }
                Err(panic) => panic::resume_unwind(panic),
            }
        }
        outcome
    })
}
