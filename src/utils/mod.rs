//! Internal utility functions for filters3d.
//!
//! This module contains sample conversions and the parameter checks shared
//! by the reducer, the scheduler and the hyperstack walker.

mod sample;
pub use sample::Sample;

use crate::error::{FilterError, FilterResult};

/// Validates that a volume has non-zero dimensions.
///
/// # Arguments
///
/// * `dimensions` - The (width, height, depth) of the volume
/// * `context` - A description of the context for error messages
pub fn validate_non_empty_volume(dimensions: (u32, u32, u32), context: &str) -> FilterResult<()> {
    let (width, height, depth) = dimensions;
    if width == 0 || height == 0 || depth == 0 {
        Err(FilterError::invalid(format!(
            "{}: Volume dimensions must be non-zero, got {}x{}x{}",
            context, width, height, depth
        )))
    } else {
        Ok(())
    }
}

/// Validates a single filter radius.
///
/// Radii must be finite and non-negative.
pub fn validate_radius(value: f32, axis: &str) -> FilterResult<()> {
    if !value.is_finite() {
        return Err(FilterError::invalid(format!(
            "radius_{} must be finite, got {}",
            axis, value
        )));
    }
    if value < 0.0 {
        return Err(FilterError::invalid(format!(
            "radius_{} must be >= 0, got {}",
            axis, value
        )));
    }
    Ok(())
}

/// Clamps a requested worker count to at least one.
#[inline]
pub fn clamp_workers(requested: usize) -> usize {
    requested.max(1)
}

/// Number of execution units available to the process, at least one.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_empty_volume() {
        assert!(validate_non_empty_volume((10, 10, 1), "test").is_ok());
        assert!(validate_non_empty_volume((1, 1, 1), "test").is_ok());
        assert!(validate_non_empty_volume((0, 10, 1), "test").is_err());
        assert!(validate_non_empty_volume((10, 0, 1), "test").is_err());
        assert!(validate_non_empty_volume((10, 10, 0), "test").is_err());
    }

    #[test]
    fn test_validate_radius() {
        assert!(validate_radius(0.0, "x").is_ok());
        assert!(validate_radius(2.5, "y").is_ok());
        assert!(matches!(
            validate_radius(-1.0, "z"),
            Err(FilterError::InvalidParameter(_))
        ));
        assert!(validate_radius(f32::NAN, "x").is_err());
        assert!(validate_radius(f32::INFINITY, "x").is_err());
    }

    #[test]
    fn test_clamp_workers() {
        assert_eq!(clamp_workers(0), 1);
        assert_eq!(clamp_workers(1), 1);
        assert_eq!(clamp_workers(8), 8);
        assert!(available_workers() >= 1);
    }
}
