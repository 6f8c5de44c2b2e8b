use crate::error::FilterResult;
use crate::filters3d::neighborhood::NeighborhoodSpec;
use crate::filters3d::reducer::NeighborhoodReducer;
use crate::filters3d::scheduler::SlabScheduler;
use crate::filters3d::volume::{Volume, VolumeData};
use crate::utils::{available_workers, validate_non_empty_volume, Sample};

/// 3D neighborhood filtering of a single volume
///
/// Mean, Median, Min and Max keep the input bit depth. Variance always
/// produces a 32-bit float volume.
///
/// # Examples
///
/// ```rust
/// use filters3d::{Filter3D, NeighborhoodSpec, ReductionKind, Volume, VolumeData};
///
/// let volume = Volume::<u8>::from_fn(5, 5, 5, |_, _, _| 10);
/// let spec = NeighborhoodSpec::new(1.0, 1.0, 1.0, ReductionKind::Mean);
/// let VolumeData::Gray8(mean) = volume.filter_3d(&spec, 2).unwrap() else {
///     unreachable!()
/// };
/// assert!(mean.as_slice().iter().all(|&v| v == 10));
/// ```
pub trait Filter3D {
    /// Filters on `workers` parallel slabs (clamped to at least one).
    ///
    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - bad radii or an empty volume
    /// * `FilterError::WorkerFailure` - a slab worker failed
    fn filter_3d(&self, spec: &NeighborhoodSpec, workers: usize) -> FilterResult<VolumeData>;

    /// Filters using every available execution unit.
    fn filter_3d_auto(&self, spec: &NeighborhoodSpec) -> FilterResult<VolumeData> {
        self.filter_3d(spec, available_workers())
    }
}

impl<T> Filter3D for Volume<T>
where
    T: Sample,
    Volume<T>: Into<VolumeData>,
{
    fn filter_3d(&self, spec: &NeighborhoodSpec, workers: usize) -> FilterResult<VolumeData> {
        validate_non_empty_volume(self.dimensions(), "filter_3d")?;
        let spec = if self.depth() == 1 {
            spec.planar()
        } else {
            *spec
        };
        let reducer = NeighborhoodReducer::new(spec)?;
        let scheduler = SlabScheduler::new(workers);
        let working = self.to_working();

        log::info!(
            "Applying {:?} filter to {}x{}x{} volume",
            spec.kind,
            self.width(),
            self.height(),
            self.depth()
        );
        if spec.kind.preserves_depth() {
            Ok(scheduler.run::<T>(&reducer, &working)?.into())
        } else {
            Ok(VolumeData::Gray32(scheduler.run::<f32>(&reducer, &working)?))
        }
    }
}

impl Filter3D for VolumeData {
    fn filter_3d(&self, spec: &NeighborhoodSpec, workers: usize) -> FilterResult<VolumeData> {
        match self {
            Self::Gray8(v) => v.filter_3d(spec, workers),
            Self::Gray16(v) => v.filter_3d(spec, workers),
            Self::Gray32(v) => v.filter_3d(spec, workers),
        }
    }
}
