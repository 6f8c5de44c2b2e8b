use crate::error::FilterResult;
use crate::utils::validate_radius;
use itertools::iproduct;

/// Statistic computed over each voxel's neighborhood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReductionKind {
    /// Arithmetic mean of the included samples
    Mean,
    /// Lower median of the included samples
    Median,
    /// Smallest included sample
    Min,
    /// Largest included sample
    Max,
    /// Population variance, always written as 32-bit float
    Variance,
}

impl ReductionKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Mean,
        Self::Median,
        Self::Min,
        Self::Max,
        Self::Variance,
    ];

    /// Whether the output keeps the input bit depth.
    #[must_use]
    pub const fn preserves_depth(self) -> bool {
        !matches!(self, Self::Variance)
    }

    /// Whether the kind is computed on display values under an inverted LUT.
    #[must_use]
    pub const fn respects_inverted_lut(self) -> bool {
        self.preserves_depth()
    }
}

/// Shape of the window inside its bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowShape {
    /// Every offset of the `(2rx+1) x (2ry+1) x (2rz+1)` box
    #[default]
    Box,
    /// Offsets inside the ellipsoid with semi-axes `rx`, `ry`, `rz`
    Ellipsoid,
}

/// Radii and statistic of a neighborhood reduction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborhoodSpec {
    /// Half-width of the window along x, in voxels
    pub radius_x: f32,
    /// Half-width of the window along y, in voxels
    pub radius_y: f32,
    /// Half-width of the window along z, in planes
    pub radius_z: f32,
    /// Statistic computed over the window
    pub kind: ReductionKind,
    /// Which offsets of the bounding box belong to the window
    pub shape: WindowShape,
}

impl NeighborhoodSpec {
    /// Creates a box-shaped neighborhood.
    #[must_use]
    pub const fn new(radius_x: f32, radius_y: f32, radius_z: f32, kind: ReductionKind) -> Self {
        Self {
            radius_x,
            radius_y,
            radius_z,
            kind,
            shape: WindowShape::Box,
        }
    }

    #[must_use]
    pub const fn with_shape(mut self, shape: WindowShape) -> Self {
        self.shape = shape;
        self
    }

    /// Same spec with `radius_z` forced to zero, for single-slice stacks.
    #[must_use]
    pub const fn planar(mut self) -> Self {
        self.radius_z = 0.0;
        self
    }

    /// Checks that every radius is finite and non-negative.
    ///
    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - naming the offending axis
    pub fn validate(&self) -> FilterResult<()> {
        validate_radius(self.radius_x, "x")?;
        validate_radius(self.radius_y, "y")?;
        validate_radius(self.radius_z, "z")?;
        Ok(())
    }

    /// True when all radii are zero; the reduction is then a plain copy.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.radius_x == 0.0 && self.radius_y == 0.0 && self.radius_z == 0.0
    }

    /// Integer half-extents of the bounding box.
    #[must_use]
    pub fn extents(&self) -> (i32, i32, i32) {
        (
            self.radius_x.ceil() as i32,
            self.radius_y.ceil() as i32,
            self.radius_z.ceil() as i32,
        )
    }
}

/// One window offset relative to the center voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    /// Column offset
    pub dx: i32,
    /// Row offset
    pub dy: i32,
    /// Plane offset
    pub dz: i32,
}

/// The offsets that make up a window, in z, y, x order.
///
/// That order is also the summation order of the mean and variance, so it
/// must stay fixed for results to be reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    offsets: Vec<Offset>,
    extents: (i32, i32, i32),
}

impl Kernel {
    /// Builds the offset list for a validated spec.
    #[must_use]
    pub fn from_spec(spec: &NeighborhoodSpec) -> Self {
        let (ex, ey, ez) = spec.extents();
        let offsets = iproduct!(-ez..=ez, -ey..=ey, -ex..=ex)
            .filter(|&(dz, dy, dx)| match spec.shape {
                WindowShape::Box => true,
                WindowShape::Ellipsoid => {
                    axis_term(dx, spec.radius_x)
                        + axis_term(dy, spec.radius_y)
                        + axis_term(dz, spec.radius_z)
                        <= 1.0
                }
            })
            .map(|(dz, dy, dx)| Offset { dx, dy, dz })
            .collect();

        Self {
            offsets,
            extents: (ex, ey, ez),
        }
    }

    #[must_use]
    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Half-extents of the bounding box (x, y, z).
    #[must_use]
    pub const fn extents(&self) -> (i32, i32, i32) {
        self.extents
    }
}

// (d / r)^2, with a zero radius admitting only d == 0
fn axis_term(d: i32, radius: f32) -> f64 {
    if d == 0 {
        0.0
    } else if radius <= 0.0 {
        f64::INFINITY
    } else {
        let ratio = f64::from(d) / f64::from(radius);
        ratio * ratio
    }
}
