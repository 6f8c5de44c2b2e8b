use crate::error::FilterResult;
use crate::filters3d::hyperstack::ChannelFrameSelection;
use crate::filters3d::neighborhood::{NeighborhoodSpec, ReductionKind, WindowShape};
use crate::utils::{available_workers, clamp_workers};

/// Everything a filter invocation needs, passed explicitly instead of being
/// read from process-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    pub radius_x: f32,
    pub radius_y: f32,
    pub radius_z: f32,
    pub kind: ReductionKind,
    pub shape: WindowShape,
    pub selection: ChannelFrameSelection,
    /// Worker count; `None` uses every available execution unit
    pub threads: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            radius_x: 2.0,
            radius_y: 2.0,
            radius_z: 2.0,
            kind: ReductionKind::Median,
            shape: WindowShape::Box,
            selection: ChannelFrameSelection::all(),
            threads: None,
        }
    }
}

impl FilterConfig {
    #[must_use]
    pub fn new(kind: ReductionKind, radius_x: f32, radius_y: f32, radius_z: f32) -> Self {
        Self {
            radius_x,
            radius_y,
            radius_z,
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_radii(mut self, radius_x: f32, radius_y: f32, radius_z: f32) -> Self {
        self.radius_x = radius_x;
        self.radius_y = radius_y;
        self.radius_z = radius_z;
        self
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: ReductionKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn with_shape(mut self, shape: WindowShape) -> Self {
        self.shape = shape;
        self
    }

    #[must_use]
    pub const fn with_selection(mut self, selection: ChannelFrameSelection) -> Self {
        self.selection = selection;
        self
    }

    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    #[must_use]
    pub const fn spec(&self) -> NeighborhoodSpec {
        NeighborhoodSpec::new(self.radius_x, self.radius_y, self.radius_z, self.kind)
            .with_shape(self.shape)
    }

    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - if a radius is negative or not finite
    pub fn validate(&self) -> FilterResult<()> {
        self.spec().validate()
    }

    /// Resolved worker count, at least one.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.threads.map_or_else(available_workers, clamp_workers)
    }
}
