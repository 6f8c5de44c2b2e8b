//! Test utilities for filters3d
//!
//! Builders for small volumes and hyperstacks, and a progress monitor that
//! records what it was told. Only compiled when running tests.

use crate::filters3d::hyperstack::{Hyperstack, ProgressMonitor, StackPlanes};
use crate::filters3d::volume::Volume;
use crate::Image;
use image::{ImageBuffer, Luma};
use itertools::iproduct;
use std::cell::{Cell, RefCell};

/// Width of the planes built by [`gray8_stack`].
const STACK_WIDTH: u32 = 4;
/// Height of the planes built by [`gray8_stack`].
const STACK_HEIGHT: u32 = 3;

/// Builds a 4x3 8-bit hyperstack, evaluating `f(x, y, c, z, t)` per pixel.
pub fn gray8_stack<F>(channels: u32, slices: u32, frames: u32, f: F) -> Hyperstack
where
    F: Fn(u32, u32, u32, u32, u32) -> u8,
{
    let mut planes: Vec<Image<Luma<u8>>> = Vec::new();
    for (t, z, c) in iproduct!(0..frames, 0..slices, 0..channels) {
        planes.push(ImageBuffer::from_fn(STACK_WIDTH, STACK_HEIGHT, |x, y| {
            Luma([f(x, y, c, z, t)])
        }));
    }
    Hyperstack::new(channels, slices, frames, StackPlanes::Gray8(planes))
        .expect("test stack dimensions are consistent")
}

/// A volume with a single non-zero voxel.
pub fn impulse_volume(size: (u32, u32, u32), at: (u32, u32, u32), value: u8) -> Volume<u8> {
    let (w, h, d) = size;
    Volume::from_fn(w, h, d, |x, y, z| if (x, y, z) == at { value } else { 0 })
}

/// Records progress and status calls, and asks to stop once `limit`
/// pairs have been started.
pub struct CancelAfter {
    limit: usize,
    polls: Cell<usize>,
    progress: RefCell<Vec<f64>>,
    statuses: Cell<usize>,
}

impl CancelAfter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            polls: Cell::new(0),
            progress: RefCell::new(Vec::new()),
            statuses: Cell::new(0),
        }
    }

    pub fn never() -> Self {
        Self::new(usize::MAX)
    }

    pub fn progress_seen(&self) -> Vec<f64> {
        self.progress.borrow().clone()
    }

    pub fn statuses(&self) -> usize {
        self.statuses.get()
    }
}

impl ProgressMonitor for CancelAfter {
    fn progress(&self, fraction: f64) {
        self.progress.borrow_mut().push(fraction);
    }

    fn status(&self, _message: &str) {
        self.statuses.set(self.statuses.get() + 1);
    }

    fn stop_requested(&self) -> bool {
        let polls = self.polls.get() + 1;
        self.polls.set(polls);
        polls > self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray8_stack_orders_channels_fastest() {
        let stack = gray8_stack(2, 2, 1, |_, _, c, z, _| (c + 10 * z) as u8);
        let StackPlanes::Gray8(planes) = stack.planes() else {
            panic!("expected 8-bit planes");
        };
        let values: Vec<u8> = planes.iter().map(|p| p.get_pixel(0, 0)[0]).collect();
        assert_eq!(values, vec![0, 1, 10, 11]);
    }

    #[test]
    fn impulse_volume_has_one_voxel() {
        let volume = impulse_volume((3, 3, 3), (1, 2, 0), 9);
        assert_eq!(volume.get(1, 2, 0), 9);
        assert_eq!(volume.as_slice().iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn cancel_after_stops_on_the_right_poll() {
        let monitor = CancelAfter::new(2);
        assert!(!monitor.stop_requested());
        assert!(!monitor.stop_requested());
        assert!(monitor.stop_requested());
        assert!(!CancelAfter::never().stop_requested());
    }
}
