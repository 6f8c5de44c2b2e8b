use crate::error::{FilterError, FilterResult};
use crate::filters3d::neighborhood::{Kernel, NeighborhoodSpec, ReductionKind};
use crate::filters3d::volume::Volume;
use crate::utils::Sample;
use std::ops::Range;

/// Computes one neighborhood statistic per voxel.
///
/// The reducer reads from the full input volume and writes a caller-chosen
/// range of output planes, so several reducers can fill disjoint slabs of
/// the same output concurrently. Window offsets that fall outside the
/// volume are left out of the sample set; nothing is padded or wrapped.
#[derive(Debug, Clone)]
pub struct NeighborhoodReducer {
    spec: NeighborhoodSpec,
    kernel: Kernel,
}

impl NeighborhoodReducer {
    /// Validates `spec` and precomputes its window.
    ///
    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - if any radius is negative or not finite
    pub fn new(spec: NeighborhoodSpec) -> FilterResult<Self> {
        spec.validate()?;
        Ok(Self {
            kernel: Kernel::from_spec(&spec),
            spec,
        })
    }

    #[must_use]
    pub const fn spec(&self) -> &NeighborhoodSpec {
        &self.spec
    }

    #[must_use]
    pub const fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Reduces planes `z_range` of the output.
    ///
    /// `output` holds exactly those planes, plane-major, so its length must
    /// be `z_range.len() * width * height`.
    ///
    /// # Errors
    ///
    /// * `FilterError::DimensionMismatch` - if the range or output slice
    ///   does not fit the input volume
    /// * `FilterError::WorkerFailure` - if the scratch buffer cannot be allocated
    pub fn reduce_slab<O: Sample>(
        &self,
        input: &Volume<f32>,
        z_range: Range<u32>,
        output: &mut [O],
    ) -> FilterResult<()> {
        let (width, height, depth) = input.dimensions();
        let planes = z_range.end.saturating_sub(z_range.start);
        if z_range.end > depth || output.len() != planes as usize * input.plane_len() {
            return Err(FilterError::DimensionMismatch {
                expected: (width, height, planes),
                actual: (
                    width,
                    height,
                    (output.len() / input.plane_len().max(1)) as u32,
                ),
            });
        }

        let mut scratch = Vec::new();
        scratch.try_reserve_exact(self.kernel.len()).map_err(|e| {
            FilterError::WorkerFailure(format!("cannot allocate window buffer: {}", e))
        })?;

        let mut slots = output.iter_mut();
        for z in z_range {
            for y in 0..height {
                for x in 0..width {
                    let value = self.reduce_voxel(input, x, y, z, &mut scratch);
                    if let Some(slot) = slots.next() {
                        *slot = value;
                    }
                }
            }
        }
        Ok(())
    }

    /// Computes the statistic for one voxel.
    ///
    /// `scratch` is reused between calls to avoid an allocation per voxel.
    fn reduce_voxel<O: Sample>(
        &self,
        input: &Volume<f32>,
        x: u32,
        y: u32,
        z: u32,
        scratch: &mut Vec<f32>,
    ) -> O {
        if self.spec.is_identity() {
            return O::from_rank(input.get(x, y, z));
        }

        self.gather(input, x, y, z, scratch);
        match self.spec.kind {
            ReductionKind::Mean => O::from_mean(mean(scratch)),
            ReductionKind::Variance => O::from_mean(variance(scratch)),
            ReductionKind::Min => O::from_rank(minimum(scratch)),
            ReductionKind::Max => O::from_rank(maximum(scratch)),
            ReductionKind::Median => O::from_rank(lower_median(scratch)),
        }
    }

    fn gather(&self, input: &Volume<f32>, x: u32, y: u32, z: u32, scratch: &mut Vec<f32>) {
        let (width, height, depth) = input.dimensions();
        let (x, y, z) = (x as i64, y as i64, z as i64);
        let data = input.as_slice();
        let plane_len = input.plane_len();

        scratch.clear();
        for offset in self.kernel.offsets() {
            let sx = x + i64::from(offset.dx);
            let sy = y + i64::from(offset.dy);
            let sz = z + i64::from(offset.dz);
            if sx < 0
                || sy < 0
                || sz < 0
                || sx >= i64::from(width)
                || sy >= i64::from(height)
                || sz >= i64::from(depth)
            {
                continue;
            }
            let idx = sz as usize * plane_len + sy as usize * width as usize + sx as usize;
            scratch.push(data[idx]);
        }
    }
}

fn mean(samples: &[f32]) -> f64 {
    debug_assert!(!samples.is_empty());
    let sum: f64 = samples.iter().map(|&v| f64::from(v)).sum();
    sum / samples.len() as f64
}

fn variance(samples: &[f32]) -> f64 {
    let m = mean(samples);
    let sum_sq: f64 = samples
        .iter()
        .map(|&v| {
            let d = f64::from(v) - m;
            d * d
        })
        .sum();
    sum_sq / samples.len() as f64
}

fn minimum(samples: &[f32]) -> f32 {
    samples.iter().copied().fold(f32::INFINITY, f32::min)
}

fn maximum(samples: &[f32]) -> f32 {
    samples.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// Element `(n - 1) / 2` of the ascending order.
///
/// This is the value left after discarding the `n / 2` largest samples and
/// taking the next largest, so even-sized windows report the lower median.
// TODO: add an interpolated median kind that averages the two middle samples.
fn lower_median(samples: &mut [f32]) -> f32 {
    debug_assert!(!samples.is_empty());
    let mid = (samples.len() - 1) / 2;
    let (_, median, _) = samples.select_nth_unstable_by(mid, f32::total_cmp);
    *median
}
