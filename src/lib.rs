//! Windowed 3D neighborhood filters for volumes and hyperstacks.
//!
//! Each output voxel is a reduction (mean, median, min, max or variance)
//! over a box or ellipsoid window around it. Windows are truncated at the
//! volume border. Work is split into contiguous z-slabs that run in parallel.

mod error;
mod filters3d;
mod utils;

#[cfg(test)]
mod test_utils;

use image::{ImageBuffer, Pixel};

pub use error::{FilterError, FilterResult};
pub use filters3d::config::FilterConfig;
pub use filters3d::hyperstack::{
    ChannelFrameSelection, FilterOutcome, Hyperstack, HyperstackWalker, NoProgress,
    ProgressMonitor, StackPlanes,
};
pub use filters3d::neighborhood::{Kernel, NeighborhoodSpec, Offset, ReductionKind, WindowShape};
pub use filters3d::reducer::NeighborhoodReducer;
pub use filters3d::scheduler::{partition_slabs, Slab, SlabScheduler};
pub use filters3d::volume::{BitDepth, Volume, VolumeData};
pub use filters3d::volume_filter::Filter3D;
pub use utils::Sample;

pub type Image<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;

/// Filters the selected (channel, frame) pairs of `image`.
///
/// Depth-preserving kinds overwrite `image` once every pair has succeeded
/// and return [`FilterOutcome::Replaced`]. Variance returns a new 32-bit
/// stack in [`FilterOutcome::Created`].
///
/// # Errors
///
/// See [`HyperstackWalker::run`]; parameters are validated before any work starts.
///
/// # Examples
///
/// ```rust
/// use filters3d::{filter, FilterConfig, FilterOutcome, Hyperstack, NoProgress, ReductionKind, Volume};
///
/// let volume = Volume::<u8>::from_fn(5, 5, 5, |_, _, _| 10);
/// let mut stack = Hyperstack::from_volume(volume.into()).unwrap();
/// let config = FilterConfig::new(ReductionKind::Mean, 1.0, 1.0, 1.0);
/// let outcome = filter(&mut stack, &config, &NoProgress).unwrap();
/// assert_eq!(outcome, FilterOutcome::Replaced { pairs: 1 });
/// ```
pub fn filter(
    image: &mut Hyperstack,
    config: &FilterConfig,
    monitor: &dyn ProgressMonitor,
) -> FilterResult<FilterOutcome> {
    config.validate()?;
    let walker = HyperstackWalker::new(
        config.spec(),
        config.selection,
        SlabScheduler::new(config.worker_count()),
    );
    walker.run(image, monitor)
}
