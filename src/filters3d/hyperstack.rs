use crate::error::{FilterError, FilterResult};
use crate::filters3d::neighborhood::{NeighborhoodSpec, ReductionKind};
use crate::filters3d::reducer::NeighborhoodReducer;
use crate::filters3d::scheduler::SlabScheduler;
use crate::filters3d::volume::{BitDepth, Volume, VolumeData};
use crate::utils::Sample;
use crate::Image;
use image::{ImageBuffer, Luma, Rgb};

/// Plane storage of a hyperstack, one variant per sample type
#[derive(Debug, Clone, PartialEq)]
pub enum StackPlanes {
    Gray8(Vec<Image<Luma<u8>>>),
    Gray16(Vec<Image<Luma<u16>>>),
    Gray32(Vec<Image<Luma<f32>>>),
    Rgb(Vec<Image<Rgb<u8>>>),
}

impl StackPlanes {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Gray8(p) => p.len(),
            Self::Gray16(p) => p.len(),
            Self::Gray32(p) => p.len(),
            Self::Rgb(p) => p.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn bit_depth(&self) -> BitDepth {
        match self {
            Self::Gray8(_) => BitDepth::Eight,
            Self::Gray16(_) => BitDepth::Sixteen,
            Self::Gray32(_) => BitDepth::ThirtyTwo,
            Self::Rgb(_) => BitDepth::Rgb,
        }
    }

    fn plane_dimensions(&self) -> Vec<(u32, u32)> {
        match self {
            Self::Gray8(p) => p.iter().map(ImageBuffer::dimensions).collect(),
            Self::Gray16(p) => p.iter().map(ImageBuffer::dimensions).collect(),
            Self::Gray32(p) => p.iter().map(ImageBuffer::dimensions).collect(),
            Self::Rgb(p) => p.iter().map(ImageBuffer::dimensions).collect(),
        }
    }

    /// Writes `staged` planes over the planes at `indices`, in order.
    fn replace(&mut self, indices: &[usize], staged: Self) -> FilterResult<()> {
        fn put<P>(target: &mut [P], indices: &[usize], planes: Vec<P>) {
            for (&idx, plane) in indices.iter().zip(planes) {
                target[idx] = plane;
            }
        }

        match (self, staged) {
            (Self::Gray8(t), Self::Gray8(s)) => put(t, indices, s),
            (Self::Gray16(t), Self::Gray16(s)) => put(t, indices, s),
            (Self::Gray32(t), Self::Gray32(s)) => put(t, indices, s),
            (Self::Rgb(t), Self::Rgb(s)) => put(t, indices, s),
            (target, staged) => {
                return Err(FilterError::UnsupportedImageType(format!(
                    "cannot store {:?} planes in a {:?} stack",
                    staged.bit_depth(),
                    target.bit_depth()
                )))
            }
        }
        Ok(())
    }

    /// Float copy of every grey plane.
    fn to_gray32(&self) -> FilterResult<Vec<Image<Luma<f32>>>> {
        fn convert<T: Sample>(planes: &[Image<Luma<T>>]) -> Vec<Image<Luma<f32>>> {
            planes
                .iter()
                .map(|p| {
                    ImageBuffer::from_fn(p.width(), p.height(), |x, y| {
                        Luma([p.get_pixel(x, y)[0].to_working()])
                    })
                })
                .collect()
        }

        match self {
            Self::Gray8(p) => Ok(convert(p)),
            Self::Gray16(p) => Ok(convert(p)),
            Self::Gray32(p) => Ok(p.clone()),
            Self::Rgb(_) => Err(FilterError::UnsupportedImageType(
                "RGB planes have no single float representation".to_string(),
            )),
        }
    }
}

/// Planes indexed by channel, slice and frame.
///
/// Planes are ordered channel fastest, then slice, then frame, so the plane
/// of `(c, z, t)` sits at `t * slices * channels + z * channels + c`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperstack {
    width: u32,
    height: u32,
    channels: u32,
    slices: u32,
    frames: u32,
    inverted_lut: bool,
    planes: StackPlanes,
}

impl Hyperstack {
    /// Assembles a hyperstack from its planes.
    ///
    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - if any dimension is zero, the plane
    ///   count is not `channels * slices * frames`, or the planes are empty
    /// * `FilterError::DimensionMismatch` - if the planes differ in size
    pub fn new(channels: u32, slices: u32, frames: u32, planes: StackPlanes) -> FilterResult<Self> {
        if channels == 0 || slices == 0 || frames == 0 {
            return Err(FilterError::invalid(format!(
                "hyperstack dimensions must be non-zero, got {} channel(s), {} slice(s), {} frame(s)",
                channels, slices, frames
            )));
        }
        let expected = channels as usize * slices as usize * frames as usize;
        if planes.len() != expected {
            return Err(FilterError::invalid(format!(
                "{} plane(s) given, {}x{}x{} hyperstack needs {}",
                planes.len(),
                channels,
                slices,
                frames,
                expected
            )));
        }

        let dims = planes.plane_dimensions();
        let (width, height) = dims[0];
        if width == 0 || height == 0 {
            return Err(FilterError::invalid(format!(
                "planes must be non-empty, got {}x{}",
                width, height
            )));
        }
        if let Some(&(w, h)) = dims.iter().find(|&&d| d != (width, height)) {
            return Err(FilterError::DimensionMismatch {
                expected: (width, height, 1),
                actual: (w, h, 1),
            });
        }

        Ok(Self {
            width,
            height,
            channels,
            slices,
            frames,
            inverted_lut: false,
            planes,
        })
    }

    /// A single-channel, single-frame stack holding one volume.
    ///
    /// # Errors
    ///
    /// Same as [`Hyperstack::new`].
    pub fn from_volume(volume: VolumeData) -> FilterResult<Self> {
        let depth = volume.dimensions().2;
        let planes = match volume {
            VolumeData::Gray8(v) => StackPlanes::Gray8(v.into_planes()),
            VolumeData::Gray16(v) => StackPlanes::Gray16(v.into_planes()),
            VolumeData::Gray32(v) => StackPlanes::Gray32(v.into_planes()),
        };
        Self::new(1, depth, 1, planes)
    }

    /// Marks the stack as displayed through an inverted lookup table.
    #[must_use]
    pub fn with_inverted_lut(mut self, inverted: bool) -> Self {
        self.inverted_lut = inverted;
        self
    }

    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub const fn channels(&self) -> u32 {
        self.channels
    }

    #[must_use]
    pub const fn slices(&self) -> u32 {
        self.slices
    }

    #[must_use]
    pub const fn frames(&self) -> u32 {
        self.frames
    }

    #[must_use]
    pub const fn inverted_lut(&self) -> bool {
        self.inverted_lut
    }

    #[must_use]
    pub const fn bit_depth(&self) -> BitDepth {
        self.planes.bit_depth()
    }

    #[must_use]
    pub const fn planes(&self) -> &StackPlanes {
        &self.planes
    }

    #[must_use]
    pub fn into_planes(self) -> StackPlanes {
        self.planes
    }

    /// Linear plane index of `(channel, slice, frame)`, all 0-based.
    #[must_use]
    pub const fn stack_index(&self, channel: u32, slice: u32, frame: u32) -> usize {
        (frame as usize * self.slices as usize + slice as usize) * self.channels as usize
            + channel as usize
    }

    /// Plane indices of the z-stack at `(channel, frame)`.
    fn volume_indices(&self, channel: u32, frame: u32) -> Vec<usize> {
        (0..self.slices)
            .map(|z| self.stack_index(channel, z, frame))
            .collect()
    }

    /// Copies out the grey volume at `(channel, frame)`.
    ///
    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - if the pair is out of range
    /// * `FilterError::UnsupportedImageType` - for RGB stacks
    pub fn volume(&self, channel: u32, frame: u32) -> FilterResult<VolumeData> {
        if channel >= self.channels || frame >= self.frames {
            return Err(FilterError::invalid(format!(
                "channel {} / frame {} outside {} channel(s) / {} frame(s)",
                channel, frame, self.channels, self.frames
            )));
        }
        let indices = self.volume_indices(channel, frame);
        Ok(match &self.planes {
            StackPlanes::Gray8(p) => Volume::from_planes(indices.iter().map(|&i| &p[i]))?.into(),
            StackPlanes::Gray16(p) => Volume::from_planes(indices.iter().map(|&i| &p[i]))?.into(),
            StackPlanes::Gray32(p) => Volume::from_planes(indices.iter().map(|&i| &p[i]))?.into(),
            StackPlanes::Rgb(_) => {
                return Err(FilterError::UnsupportedImageType(
                    "RGB planes do not form a single grey volume".to_string(),
                ))
            }
        })
    }
}

/// Which (channel, frame) pairs to filter
///
/// `None` on an axis selects every index on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelFrameSelection {
    pub channel: Option<u32>,
    pub frame: Option<u32>,
}

impl ChannelFrameSelection {
    /// Every channel of every frame.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            channel: None,
            frame: None,
        }
    }

    #[must_use]
    pub const fn only_channel(mut self, channel: u32) -> Self {
        self.channel = Some(channel);
        self
    }

    #[must_use]
    pub const fn only_frame(mut self, frame: u32) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Selected pairs as `(channel, frame)`, frame-major.
    ///
    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - if a restricted index is out of range
    pub fn pairs(&self, channels: u32, frames: u32) -> FilterResult<Vec<(u32, u32)>> {
        let channel_range = restrict(self.channel, channels, "channel")?;
        let frame_range = restrict(self.frame, frames, "frame")?;
        Ok(frame_range
            .flat_map(|t| channel_range.clone().map(move |c| (c, t)))
            .collect())
    }
}

fn restrict(index: Option<u32>, count: u32, axis: &str) -> FilterResult<std::ops::Range<u32>> {
    match index {
        None => Ok(0..count),
        Some(i) if i < count => Ok(i..i + 1),
        Some(i) => Err(FilterError::invalid(format!(
            "{} {} out of range (stack has {})",
            axis, i, count
        ))),
    }
}

/// Receives advisory progress from a running filter and may ask it to stop
///
/// Progress and status are for display only. `stop_requested` is polled
/// before each (channel, frame) pair, never inside a pair.
pub trait ProgressMonitor {
    /// Fraction of the selected pairs completed, in `0.0..=1.0`.
    fn progress(&self, _fraction: f64) {}

    /// Human-readable description of the pair being filtered.
    fn status(&self, _message: &str) {}

    /// Polled before each pair; `true` stops the run there.
    fn stop_requested(&self) -> bool {
        false
    }
}

/// A monitor that ignores progress and never stops
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressMonitor for NoProgress {}

/// Result of a successful hyperstack filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// The source planes were overwritten; `pairs` were filtered
    Replaced { pairs: usize },
    /// The output depth differs, so a new stack was built
    Created(Hyperstack),
}

/// Drives the slab scheduler over the selected (channel, frame) pairs.
#[derive(Debug, Clone)]
pub struct HyperstackWalker {
    spec: NeighborhoodSpec,
    selection: ChannelFrameSelection,
    scheduler: SlabScheduler,
}

impl HyperstackWalker {
    #[must_use]
    pub const fn new(
        spec: NeighborhoodSpec,
        selection: ChannelFrameSelection,
        scheduler: SlabScheduler,
    ) -> Self {
        Self {
            spec,
            selection,
            scheduler,
        }
    }

    #[must_use]
    pub const fn spec(&self) -> &NeighborhoodSpec {
        &self.spec
    }

    #[must_use]
    pub const fn selection(&self) -> &ChannelFrameSelection {
        &self.selection
    }

    #[must_use]
    pub const fn scheduler(&self) -> &SlabScheduler {
        &self.scheduler
    }

    /// Filters `image`.
    ///
    /// Depth-preserving kinds stage every pair and overwrite the source only
    /// once all selected pairs have succeeded. Variance builds a new 32-bit
    /// stack and leaves the source alone.
    ///
    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - bad radii, selection, or a kind the
    ///   image type cannot take
    /// * `FilterError::UnsupportedImageType` - multi-channel RGB stacks
    /// * `FilterError::WorkerFailure` - a slab worker failed; nothing is committed
    /// * `FilterError::Cancelled` - the monitor asked to stop; pairs finished
    ///   before the request are committed to `image` for depth-preserving
    ///   kinds, and returned as a new 32-bit stack in `partial` for Variance
    pub fn run(
        &self,
        image: &mut Hyperstack,
        monitor: &dyn ProgressMonitor,
    ) -> FilterResult<FilterOutcome> {
        self.spec.validate()?;
        self.check_image_type(image)?;
        let pairs = self.selection.pairs(image.channels, image.frames)?;

        let spec = if image.slices == 1 {
            log::debug!("Single slice per volume, ignoring radius_z");
            self.spec.planar()
        } else {
            self.spec
        };
        let reducer = NeighborhoodReducer::new(spec)?;
        let invert = image.inverted_lut
            && spec.kind.respects_inverted_lut()
            && matches!(image.bit_depth(), BitDepth::Eight | BitDepth::Sixteen);

        log::info!(
            "Applying {:?} filter (radius {}, {}, {}) to {} channel/frame pair(s)",
            spec.kind,
            spec.radius_x,
            spec.radius_y,
            spec.radius_z,
            pairs.len()
        );

        let outcome = if spec.kind.preserves_depth() {
            self.run_in_place(image, &reducer, &pairs, invert, monitor)?
        } else {
            self.run_into_float(image, &reducer, &pairs, monitor)?
        };

        log::info!("{:?} filter completed", spec.kind);
        Ok(outcome)
    }

    fn check_image_type(&self, image: &Hyperstack) -> FilterResult<()> {
        if image.bit_depth() != BitDepth::Rgb {
            return Ok(());
        }
        if image.channels > 1 {
            return Err(FilterError::UnsupportedImageType(format!(
                "RGB stack with {} channels cannot be split into colour volumes",
                image.channels
            )));
        }
        if self.spec.kind == ReductionKind::Variance {
            return Err(FilterError::invalid(
                "Variance is not supported for RGB images",
            ));
        }
        Ok(())
    }

    fn run_in_place(
        &self,
        image: &mut Hyperstack,
        reducer: &NeighborhoodReducer,
        pairs: &[(u32, u32)],
        invert: bool,
        monitor: &dyn ProgressMonitor,
    ) -> FilterResult<FilterOutcome> {
        let total = pairs.len();
        let mut staged: Vec<(Vec<usize>, StackPlanes)> = Vec::with_capacity(total);
        monitor.progress(0.0);

        for (i, &(channel, frame)) in pairs.iter().enumerate() {
            if monitor.stop_requested() {
                log::warn!("Filter cancelled after {} of {} pair(s)", i, total);
                for (indices, planes) in staged {
                    image.planes.replace(&indices, planes)?;
                }
                return Err(FilterError::Cancelled {
                    completed: i,
                    total,
                    partial: None,
                });
            }

            monitor.status(&format!(
                "Filtering channel {}, frame {} ({}/{})",
                channel + 1,
                frame + 1,
                i + 1,
                total
            ));
            log::debug!("Filtering channel {} frame {}", channel, frame);

            let indices = image.volume_indices(channel, frame);
            let filtered = self.filter_pair_same_depth(&image.planes, &indices, reducer, invert)?;
            staged.push((indices, filtered));
            monitor.progress((i + 1) as f64 / total as f64);
        }

        for (indices, planes) in staged {
            image.planes.replace(&indices, planes)?;
        }
        Ok(FilterOutcome::Replaced { pairs: total })
    }

    fn run_into_float(
        &self,
        image: &Hyperstack,
        reducer: &NeighborhoodReducer,
        pairs: &[(u32, u32)],
        monitor: &dyn ProgressMonitor,
    ) -> FilterResult<FilterOutcome> {
        let total = pairs.len();
        let mut result = image.planes.to_gray32()?;
        monitor.progress(0.0);

        for (i, &(channel, frame)) in pairs.iter().enumerate() {
            if monitor.stop_requested() {
                log::warn!(
                    "Filter cancelled after {} of {} pair(s), publishing partial result",
                    i,
                    total
                );
                return Err(FilterError::Cancelled {
                    completed: i,
                    total,
                    partial: Some(Box::new(float_stack(image, result)?)),
                });
            }

            monitor.status(&format!(
                "Filtering channel {}, frame {} ({}/{})",
                channel + 1,
                frame + 1,
                i + 1,
                total
            ));

            let indices = image.volume_indices(channel, frame);
            let working = image.volume(channel, frame)?.to_working();
            let filtered: Volume<f32> = self.scheduler.run(reducer, &working)?;
            for (&idx, plane) in indices.iter().zip(filtered.into_planes()) {
                result[idx] = plane;
            }
            monitor.progress((i + 1) as f64 / total as f64);
        }

        Ok(FilterOutcome::Created(float_stack(image, result)?))
    }

    fn filter_pair_same_depth(
        &self,
        planes: &StackPlanes,
        indices: &[usize],
        reducer: &NeighborhoodReducer,
        invert: bool,
    ) -> FilterResult<StackPlanes> {
        Ok(match planes {
            StackPlanes::Gray8(p) => StackPlanes::Gray8(self.filter_gray(p, indices, reducer, invert)?),
            StackPlanes::Gray16(p) => {
                StackPlanes::Gray16(self.filter_gray(p, indices, reducer, invert)?)
            }
            StackPlanes::Gray32(p) => {
                StackPlanes::Gray32(self.filter_gray(p, indices, reducer, false)?)
            }
            StackPlanes::Rgb(p) => StackPlanes::Rgb(self.filter_rgb(p, indices, reducer)?),
        })
    }

    fn filter_gray<T: Sample>(
        &self,
        planes: &[Image<Luma<T>>],
        indices: &[usize],
        reducer: &NeighborhoodReducer,
        invert: bool,
    ) -> FilterResult<Vec<Image<Luma<T>>>> {
        let volume = Volume::from_planes(indices.iter().map(|&i| &planes[i]))?;
        let working = if invert {
            volume.map(|v: T| v.invert().to_working())
        } else {
            volume.to_working()
        };

        let filtered: Volume<T> = self.scheduler.run(reducer, &working)?;
        let filtered = if invert {
            filtered.map(Sample::invert)
        } else {
            filtered
        };
        Ok(filtered.into_planes())
    }

    /// Filters the red, green and blue volumes separately and recombines them.
    fn filter_rgb(
        &self,
        planes: &[Image<Rgb<u8>>],
        indices: &[usize],
        reducer: &NeighborhoodReducer,
    ) -> FilterResult<Vec<Image<Rgb<u8>>>> {
        let (width, height) = planes[indices[0]].dimensions();
        let depth = indices.len() as u32;

        let mut filtered = Vec::with_capacity(3);
        for channel in 0..3 {
            let component = Volume::from_fn(width, height, depth, |x, y, z| {
                f32::from(planes[indices[z as usize]].get_pixel(x, y)[channel])
            });
            let out: Volume<u8> = self.scheduler.run(reducer, &component)?;
            filtered.push(out);
        }

        Ok((0..depth)
            .map(|z| {
                ImageBuffer::from_fn(width, height, |x, y| {
                    Rgb([
                        filtered[0].get(x, y, z),
                        filtered[1].get(x, y, z),
                        filtered[2].get(x, y, z),
                    ])
                })
            })
            .collect())
    }
}

/// Wraps float planes in a stack shaped like `like`.
fn float_stack(like: &Hyperstack, planes: Vec<Image<Luma<f32>>>) -> FilterResult<Hyperstack> {
    Ok(Hyperstack::new(
        like.channels,
        like.slices,
        like.frames,
        StackPlanes::Gray32(planes),
    )?
    .with_inverted_lut(like.inverted_lut))
}
