pub mod evaluation;
pub mod ground_truth;
pub mod realign;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

/// Dedicated rayon pool with `threads` workers, defaulting to one per CPU.
pub fn worker_pool(threads: Option<usize>) -> Result<ThreadPool> {
    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    Ok(ThreadPoolBuilder::new().num_threads(threads).build()?)
}
