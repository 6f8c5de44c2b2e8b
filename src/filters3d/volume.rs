use crate::error::{FilterError, FilterResult};
use crate::utils::Sample;
use crate::Image;
use image::{ImageBuffer, Luma};

/// Storage depth of an image or volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    /// 8-bit unsigned grey
    Eight,
    /// 16-bit unsigned grey
    Sixteen,
    /// 32-bit float grey
    ThirtyTwo,
    /// 8-bit per channel RGB
    Rgb,
}

impl BitDepth {
    /// Number of bits per pixel, RGB counted as 24.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
            Self::ThirtyTwo => 32,
            Self::Rgb => 24,
        }
    }
}

/// A stack of equally sized single-channel planes.
///
/// Samples are stored plane-major: the index of `(x, y, z)` is
/// `(z * height + y) * width + x`. Slabs of consecutive planes are therefore
/// contiguous sub-slices, which is what the slab scheduler splits on.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T> {
    width: u32,
    height: u32,
    depth: u32,
    data: Vec<T>,
}

impl<T: Sample> Volume<T> {
    /// Creates a zero-filled volume.
    #[must_use]
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        let len = width as usize * height as usize * depth as usize;
        Self {
            width,
            height,
            depth,
            data: vec![T::zero(); len],
        }
    }

    /// Wraps an existing buffer.
    ///
    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - if `data` does not hold exactly
    ///   `width * height * depth` samples
    pub fn from_raw(width: u32, height: u32, depth: u32, data: Vec<T>) -> FilterResult<Self> {
        let expected = width as usize * height as usize * depth as usize;
        if data.len() != expected {
            return Err(FilterError::invalid(format!(
                "buffer holds {} samples, {}x{}x{} needs {}",
                data.len(),
                width,
                height,
                depth,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            depth,
            data,
        })
    }

    /// Builds a volume by evaluating `f(x, y, z)` at every voxel.
    pub fn from_fn<F>(width: u32, height: u32, depth: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32, u32) -> T,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize * depth as usize);
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    data.push(f(x, y, z));
                }
            }
        }
        Self {
            width,
            height,
            depth,
            data,
        }
    }

    /// Copies a sequence of planes into one volume.
    ///
    /// # Errors
    ///
    /// * `FilterError::InvalidParameter` - if there are no planes
    /// * `FilterError::DimensionMismatch` - if the planes differ in size
    pub fn from_planes<'a, I>(planes: I) -> FilterResult<Self>
    where
        I: IntoIterator<Item = &'a Image<Luma<T>>>,
    {
        let mut planes = planes.into_iter().peekable();
        let (width, height) = planes
            .peek()
            .map(|plane| plane.dimensions())
            .ok_or_else(|| FilterError::invalid("a volume needs at least one plane"))?;

        let mut data = Vec::new();
        let mut depth = 0u32;
        for plane in planes {
            if plane.dimensions() != (width, height) {
                let (w, h) = plane.dimensions();
                return Err(FilterError::DimensionMismatch {
                    expected: (width, height, depth + 1),
                    actual: (w, h, depth + 1),
                });
            }
            data.extend_from_slice(plane.as_raw());
            depth += 1;
        }

        Ok(Self {
            width,
            height,
            depth,
            data,
        })
    }

    /// Splits the volume back into planes.
    #[must_use]
    pub fn into_planes(self) -> Vec<Image<Luma<T>>> {
        let plane_len = self.plane_len();
        if plane_len == 0 {
            return (0..self.depth)
                .map(|_| ImageBuffer::new(self.width, self.height))
                .collect();
        }
        self.data
            .chunks_exact(plane_len)
            .filter_map(|chunk| ImageBuffer::from_raw(self.width, self.height, chunk.to_vec()))
            .collect()
    }

    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.depth)
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of samples in one plane.
    #[must_use]
    pub const fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    fn index(&self, x: u32, y: u32, z: u32) -> usize {
        (z as usize * self.height as usize + y as usize) * self.width as usize + x as usize
    }

    /// Sample at `(x, y, z)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside the volume.
    #[inline]
    #[must_use]
    pub fn get(&self, x: u32, y: u32, z: u32) -> T {
        assert!(
            x < self.width && y < self.height && z < self.depth,
            "voxel ({x}, {y}, {z}) outside {}x{}x{}",
            self.width,
            self.height,
            self.depth
        );
        self.data[self.index(x, y, z)]
    }

    /// Writes the sample at `(x, y, z)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside the volume.
    #[inline]
    pub fn put(&mut self, x: u32, y: u32, z: u32, value: T) {
        assert!(
            x < self.width && y < self.height && z < self.depth,
            "voxel ({x}, {y}, {z}) outside {}x{}x{}",
            self.width,
            self.height,
            self.depth
        );
        let idx = self.index(x, y, z);
        self.data[idx] = value;
    }

    /// Samples of plane `z`, row-major.
    #[must_use]
    pub fn plane(&self, z: u32) -> &[T] {
        let len = self.plane_len();
        let start = z as usize * len;
        &self.data[start..start + len]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[must_use]
    pub fn into_raw(self) -> Vec<T> {
        self.data
    }

    /// Applies `f` to every sample, producing a volume of another type.
    #[must_use]
    pub fn map<U, F>(&self, f: F) -> Volume<U>
    where
        U: Sample,
        F: Fn(T) -> U,
    {
        Volume {
            width: self.width,
            height: self.height,
            depth: self.depth,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Converts to the floating-point working representation.
    #[must_use]
    pub fn to_working(&self) -> Volume<f32> {
        self.map(Sample::to_working)
    }
}

/// A volume of any supported grey sample type
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeData {
    Gray8(Volume<u8>),
    Gray16(Volume<u16>),
    Gray32(Volume<f32>),
}

impl VolumeData {
    #[must_use]
    pub const fn bit_depth(&self) -> BitDepth {
        match self {
            Self::Gray8(_) => BitDepth::Eight,
            Self::Gray16(_) => BitDepth::Sixteen,
            Self::Gray32(_) => BitDepth::ThirtyTwo,
        }
    }

    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32, u32) {
        match self {
            Self::Gray8(v) => v.dimensions(),
            Self::Gray16(v) => v.dimensions(),
            Self::Gray32(v) => v.dimensions(),
        }
    }

    #[must_use]
    pub fn to_working(&self) -> Volume<f32> {
        match self {
            Self::Gray8(v) => v.to_working(),
            Self::Gray16(v) => v.to_working(),
            Self::Gray32(v) => v.clone(),
        }
    }

    /// Sample at `(x, y, z)` in working representation.
    #[must_use]
    pub fn get_working(&self, x: u32, y: u32, z: u32) -> f32 {
        match self {
            Self::Gray8(v) => v.get(x, y, z).to_working(),
            Self::Gray16(v) => v.get(x, y, z).to_working(),
            Self::Gray32(v) => v.get(x, y, z),
        }
    }
}

impl From<Volume<u8>> for VolumeData {
    fn from(volume: Volume<u8>) -> Self {
        Self::Gray8(volume)
    }
}

impl From<Volume<u16>> for VolumeData {
    fn from(volume: Volume<u16>) -> Self {
        Self::Gray16(volume)
    }
}

impl From<Volume<f32>> for VolumeData {
    fn from(volume: Volume<f32>) -> Self {
        Self::Gray32(volume)
    }
}
