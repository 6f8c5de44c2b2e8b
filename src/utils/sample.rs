//! Sample types a volume can hold, and their conversions to and from the
//! floating-point working representation used by the reducer.

use crate::filters3d::volume::BitDepth;
use image::Primitive;
use imageproc::definitions::Clamp;

/// A single-channel pixel sample that the filter engine can read and write.
///
/// Every reduction runs on `f32` working values; the conversion back to the
/// storage type happens only when an output voxel is written.
pub trait Sample: Primitive + Send + Sync + 'static {
    /// Bit depth reported for volumes of this sample type
    const BIT_DEPTH: BitDepth;

    /// Converts to the working representation.
    fn to_working(self) -> f32;

    /// Converts an averaged value back to the storage type.
    ///
    /// Integer types add 0.5 and truncate, then clamp to their range.
    /// Floats keep the exact value.
    fn from_mean(value: f64) -> Self;

    /// Converts an order statistic (min, max, median) back to the storage type.
    ///
    /// Order statistics are always one of the input samples, so the
    /// conversion is exact when input and output share a type.
    fn from_rank(value: f32) -> Self;

    /// Mirrors the value around the middle of the type's range.
    ///
    /// Used to normalize images shown through an inverted lookup table.
    fn invert(self) -> Self;
}

/// Rounds half up the way integer outputs expect: `+0.5`, then truncate.
#[inline]
fn round_half_up(value: f64) -> f32 {
    (value + 0.5).floor() as f32
}

impl Sample for u8 {
    const BIT_DEPTH: BitDepth = BitDepth::Eight;

    #[inline]
    fn to_working(self) -> f32 {
        f32::from(self)
    }

    #[inline]
    fn from_mean(value: f64) -> Self {
        <u8 as Clamp<f32>>::clamp(round_half_up(value))
    }

    #[inline]
    fn from_rank(value: f32) -> Self {
        <u8 as Clamp<f32>>::clamp(value)
    }

    #[inline]
    fn invert(self) -> Self {
        u8::MAX - self
    }
}

impl Sample for u16 {
    const BIT_DEPTH: BitDepth = BitDepth::Sixteen;

    #[inline]
    fn to_working(self) -> f32 {
        f32::from(self)
    }

    #[inline]
    fn from_mean(value: f64) -> Self {
        <u16 as Clamp<f32>>::clamp(round_half_up(value))
    }

    #[inline]
    fn from_rank(value: f32) -> Self {
        <u16 as Clamp<f32>>::clamp(value)
    }

    #[inline]
    fn invert(self) -> Self {
        u16::MAX - self
    }
}

impl Sample for f32 {
    const BIT_DEPTH: BitDepth = BitDepth::ThirtyTwo;

    #[inline]
    fn to_working(self) -> f32 {
        self
    }

    #[inline]
    fn from_mean(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn from_rank(value: f32) -> Self {
        value
    }

    // Float data has no fixed display range to mirror around.
    #[inline]
    fn invert(self) -> Self {
        self
    }
}
