use crate::error::{FilterError, FilterResult};
use crate::filters3d::reducer::NeighborhoodReducer;
use crate::filters3d::volume::Volume;
use crate::utils::{available_workers, clamp_workers, Sample};
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(any(feature = "rayon", test))]
use std::sync::Arc;
#[cfg(feature = "rayon")]
use std::sync::OnceLock;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

/// A contiguous run of output planes owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slab {
    /// First plane of the slab
    pub z_start: u32,
    /// One past the last plane of the slab
    pub z_end: u32,
}

impl Slab {
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.z_end - self.z_start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.z_end == self.z_start
    }

    #[must_use]
    pub const fn range(&self) -> Range<u32> {
        self.z_start..self.z_end
    }
}

/// Splits `[0, depth)` into at most `workers` contiguous slabs of
/// `ceil(depth / workers)` planes, the last one truncated.
///
/// The slabs are disjoint, in order, and cover the whole range. No slab is
/// empty; fewer slabs than workers are returned when the planes run out.
#[must_use]
pub fn partition_slabs(depth: u32, workers: usize) -> Vec<Slab> {
    let workers = clamp_workers(workers) as u64;
    let chunk = (u64::from(depth).div_ceil(workers)).max(1) as u32;

    let mut slabs = Vec::new();
    let mut z_start = 0;
    while z_start < depth {
        let z_end = z_start.saturating_add(chunk).min(depth);
        slabs.push(Slab { z_start, z_end });
        z_start = z_end;
    }
    slabs
}

/// Runs a reducer over a volume on a fixed number of workers.
///
/// Every worker reads the whole unmodified input, since windows reach across
/// slab boundaries, and writes only its own slab of the output. The call
/// returns after all workers have finished.
///
/// The worker pool is built on the first run, with one thread per slab of
/// that run up to `workers`, and reused by every later run of the same
/// scheduler. Clones taken after the first run share its pool.
#[derive(Debug, Clone)]
pub struct SlabScheduler {
    workers: usize,
    #[cfg(feature = "rayon")]
    pool: OnceLock<Arc<rayon::ThreadPool>>,
    #[cfg(test)]
    failure: Option<FailurePlan>,
}

impl Default for SlabScheduler {
    fn default() -> Self {
        Self::new(available_workers())
    }
}

impl PartialEq for SlabScheduler {
    fn eq(&self, other: &Self) -> bool {
        self.workers == other.workers
    }
}

impl Eq for SlabScheduler {}

impl SlabScheduler {
    /// `workers` is clamped to at least one.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: clamp_workers(workers),
            #[cfg(feature = "rayon")]
            pool: OnceLock::new(),
            #[cfg(test)]
            failure: None,
        }
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Reduces the whole volume.
    ///
    /// # Errors
    ///
    /// * `FilterError::WorkerFailure` - if the output cannot be allocated, the
    ///   worker pool cannot be started, or any worker fails; the first failure
    ///   seen is returned once every worker has been joined
    pub fn run<O: Sample>(
        &self,
        reducer: &NeighborhoodReducer,
        input: &Volume<f32>,
    ) -> FilterResult<Volume<O>> {
        #[cfg(test)]
        let failing = self.failure.as_ref().and_then(FailurePlan::next_run);

        self.run_with(input.dimensions(), |slab, out| {
            #[cfg(test)]
            if failing == Some(slab.z_start) {
                panic!("injected failure");
            }
            reducer.reduce_slab(input, slab.range(), out)
        })
    }

    /// Partitions `dimensions` into slabs and runs `work` once per slab on
    /// that slab's share of a fresh output buffer.
    pub(crate) fn run_with<O, F>(
        &self,
        dimensions: (u32, u32, u32),
        work: F,
    ) -> FilterResult<Volume<O>>
    where
        O: Sample,
        F: Fn(Slab, &mut [O]) -> FilterResult<()> + Sync,
    {
        let (width, height, depth) = dimensions;
        let plane_len = width as usize * height as usize;
        let slabs = partition_slabs(depth, self.workers);
        log::debug!(
            "Reducing {}x{}x{} volume as {} slab(s) on {} worker(s)",
            width,
            height,
            depth,
            slabs.len(),
            self.workers
        );

        let len = plane_len * depth as usize;
        let mut output: Vec<O> = Vec::new();
        output.try_reserve_exact(len).map_err(|e| {
            FilterError::WorkerFailure(format!("cannot allocate output volume: {}", e))
        })?;
        output.resize(len, O::zero());

        if let Some(first) = slabs.first() {
            let chunk = first.len() as usize * plane_len;
            if chunk > 0 {
                self.dispatch(&work, &slabs, &mut output, chunk)?;
            }
        }

        Volume::from_raw(width, height, depth, output)
    }

    #[cfg(feature = "rayon")]
    fn pool(&self, slabs: usize) -> FilterResult<&rayon::ThreadPool> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool.as_ref());
        }
        let threads = self.workers.min(slabs.max(1));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("filters3d-slab-{}", i))
            .build()
            .map_err(|e| FilterError::WorkerFailure(format!("cannot start workers: {}", e)))?;
        log::debug!("Started {} slab worker(s)", threads);
        Ok(self.pool.get_or_init(|| Arc::new(pool)).as_ref())
    }

    #[cfg(feature = "rayon")]
    fn dispatch<O, F>(
        &self,
        work: &F,
        slabs: &[Slab],
        output: &mut [O],
        chunk: usize,
    ) -> FilterResult<()>
    where
        O: Sample,
        F: Fn(Slab, &mut [O]) -> FilterResult<()> + Sync,
    {
        self.pool(slabs.len())?.install(|| {
            output
                .par_chunks_mut(chunk)
                .zip(slabs.par_iter())
                .try_for_each(|(out, slab)| guard_slab(*slab, || work(*slab, out)))
        })
    }

    #[cfg(not(feature = "rayon"))]
    fn dispatch<O, F>(
        &self,
        work: &F,
        slabs: &[Slab],
        output: &mut [O],
        chunk: usize,
    ) -> FilterResult<()>
    where
        O: Sample,
        F: Fn(Slab, &mut [O]) -> FilterResult<()> + Sync,
    {
        output
            .chunks_mut(chunk)
            .zip(slabs)
            .try_for_each(|(out, slab)| guard_slab(*slab, || work(*slab, out)))
    }

    /// Makes the slab starting at `z_start` panic during run number `run`
    /// (0-based) of this scheduler.
    #[cfg(test)]
    pub(crate) fn failing_at(mut self, run: usize, z_start: u32) -> Self {
        self.failure = Some(FailurePlan {
            run,
            z_start,
            runs: Arc::new(AtomicUsize::new(0)),
        });
        self
    }
}

#[cfg(test)]
#[derive(Debug, Clone)]
struct FailurePlan {
    run: usize,
    z_start: u32,
    runs: Arc<AtomicUsize>,
}

#[cfg(test)]
impl FailurePlan {
    fn next_run(&self) -> Option<u32> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        (run == self.run).then_some(self.z_start)
    }
}

/// Turns a panic inside a slab worker into a `WorkerFailure`.
fn guard_slab<F>(slab: Slab, work: F) -> FilterResult<()>
where
    F: FnOnce() -> FilterResult<()>,
{
    catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(FilterError::WorkerFailure(format!(
            "slab {}..{} panicked: {}",
            slab.z_start, slab.z_end, reason
        )))
    })
}
