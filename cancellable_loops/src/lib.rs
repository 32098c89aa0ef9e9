//! # cancellable_loops
//!
//! Parallel, cancellable map over a batch of work items with progress reporting.
//!
//! Used to run per-pattern work (for example background extraction) over a whole
//! stack of diffraction patterns. The loop
//!
//! - runs on the Rayon thread pool,
//! - stops picking up new items as soon as an abort flag is raised,
//! - publishes the fraction of finished items into a shared progress slot, and
//! - preserves the input order in its output.
//!
//! ## Example
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//! use std::sync::RwLock;
//! use cancellable_loops::par_try_map_cancellable;
//!
//! let abort_flag = AtomicBool::new(false);
//! let progress = RwLock::new(None);
//!
//! let squares: Result<Option<Vec<u32>>, ()> =
//!     par_try_map_cancellable(vec![1u32, 2, 3], 3, &abort_flag, &progress, |i| Ok(i * i));
//!
//! assert_eq!(squares, Ok(Some(vec![1, 4, 9])));
//! assert_eq!(*progress.read().unwrap(), None);
//! ```

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

/// Maps `func` over `iter` in parallel until done, failed or cancelled.
///
/// # Arguments
///
/// * `iter` - The work items
/// * `total` - Number of items, used to normalise the progress value
/// * `abort_flag` - Raised by another thread to cancel the run
/// * `progress` - Receives `Some(fraction_done)` while running and `None` afterwards
/// * `func` - Fallible work function
///
/// # Returns
///
/// * `Ok(Some(results))` in input order when every item was processed
/// * `Ok(None)` when the run was cancelled; the abort flag is lowered again so the
///   next run starts clean
/// * `Err(e)` with the first error encountered
pub fn par_try_map_cancellable<I, F, R, E>(
    iter: I,
    total: usize,
    abort_flag: &AtomicBool,
    progress: &RwLock<Option<f32>>,
    func: F,
) -> Result<Option<Vec<R>>, E>
where
    I: IntoParallelIterator,
    I::Item: Send,
    F: Fn(I::Item) -> Result<R, E> + Sync + Send,
    R: Send,
    E: Send,
{
    let done = AtomicUsize::new(0);
    let total = total.max(1);

    let mapped: Result<Vec<Option<R>>, E> = iter
        .into_par_iter()
        .map(|item| {
            if abort_flag.load(Ordering::Relaxed) {
                return Ok(None);
            }
            let result = func(item)?;
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Ok(mut p) = progress.write() {
                *p = Some(finished as f32 / total as f32);
            }
            Ok(Some(result))
        })
        .collect();

    if let Ok(mut p) = progress.write() {
        *p = None;
    }

    let mapped = mapped?;
    if abort_flag.load(Ordering::Relaxed) {
        abort_flag.store(false, Ordering::Relaxed);
        return Ok(None);
    }
    Ok(mapped.into_iter().collect())
}
