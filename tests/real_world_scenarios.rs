//! End-to-end scenarios with known answers
//!
//! Small volumes whose filtered values can be worked out by hand.

use filters3d::{
    filter, ChannelFrameSelection, Filter3D, FilterConfig, FilterError, FilterOutcome,
    Hyperstack, NeighborhoodSpec, NoProgress, ProgressMonitor, ReductionKind, StackPlanes,
    Volume, VolumeData,
};
use image::{ImageBuffer, Luma};
use imageproc::gray_image;
use itertools::iproduct;
use std::cell::Cell;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn constant_volume_mean_and_variance() {
    init_logging();
    let volume = Volume::<u8>::from_fn(5, 5, 5, |_, _, _| 10);

    let mean = volume
        .filter_3d(&NeighborhoodSpec::new(1.0, 1.0, 1.0, ReductionKind::Mean), 4)
        .unwrap();
    let VolumeData::Gray8(mean) = mean else {
        panic!("mean keeps 8-bit depth");
    };
    assert!(mean.as_slice().iter().all(|&v| v == 10));

    let variance = volume
        .filter_3d(&NeighborhoodSpec::new(1.0, 1.0, 1.0, ReductionKind::Variance), 4)
        .unwrap();
    let VolumeData::Gray32(variance) = variance else {
        panic!("variance is always float");
    };
    assert_eq!(variance.dimensions(), (5, 5, 5));
    assert!(variance.as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn median_of_three_by_three_image() {
    init_logging();
    let plane = gray_image!(
        1, 2, 3;
        4, 5, 6;
        7, 8, 9);
    let mut stack = Hyperstack::new(1, 1, 1, StackPlanes::Gray8(vec![plane])).unwrap();
    let config = FilterConfig::new(ReductionKind::Median, 1.0, 1.0, 0.0).with_threads(2);
    let outcome = filter(&mut stack, &config, &NoProgress).unwrap();
    assert_eq!(outcome, FilterOutcome::Replaced { pairs: 1 });

    let StackPlanes::Gray8(planes) = stack.planes() else {
        panic!("expected 8-bit planes");
    };
    assert_eq!(planes[0].get_pixel(1, 1)[0], 5);
}

#[test]
fn variance_of_known_window() {
    // 1D row 2, 4, 6, 8 with radius 1: windows {2,4} {2,4,6} {4,6,8} {6,8}
    let volume = Volume::<u8>::from_fn(4, 1, 1, |x, _, _| (2 * x + 2) as u8);
    let VolumeData::Gray32(out) = volume
        .filter_3d(&NeighborhoodSpec::new(1.0, 0.0, 0.0, ReductionKind::Variance), 1)
        .unwrap()
    else {
        panic!("variance is always float");
    };
    let expected = [1.0, 8.0 / 3.0, 8.0 / 3.0, 1.0];
    for (x, want) in expected.iter().enumerate() {
        assert!((out.get(x as u32, 0, 0) - want).abs() < 1e-6);
    }
}

#[test]
fn median_even_window_reports_lower_value() {
    // corner window {1, 2, 4, 5} after truncation
    let volume = Volume::<u8>::from_fn(3, 3, 1, |x, y, _| (3 * y + x + 1) as u8);
    let VolumeData::Gray8(out) = volume
        .filter_3d(&NeighborhoodSpec::new(1.0, 1.0, 0.0, ReductionKind::Median), 1)
        .unwrap()
    else {
        panic!("median keeps depth");
    };
    assert_eq!(out.get(0, 0, 0), 2);
    assert_eq!(out.get(2, 2, 0), 5);
}

/// Asks to stop after a fixed number of pairs.
struct StopAfter {
    pairs: usize,
    polls: Cell<usize>,
}

impl ProgressMonitor for StopAfter {
    fn stop_requested(&self) -> bool {
        let polls = self.polls.get();
        self.polls.set(polls + 1);
        polls >= self.pairs
    }
}

fn three_frame_stack() -> Hyperstack {
    let planes: Vec<ImageBuffer<Luma<u8>, Vec<u8>>> = iproduct!(0..3u32, 0..2u32)
        .map(|(t, z)| ImageBuffer::from_fn(4, 4, |x, y| Luma([((x + y + z) * 10 + t) as u8])))
        .collect();
    Hyperstack::new(1, 2, 3, StackPlanes::Gray8(planes)).unwrap()
}

#[test]
fn cancellation_keeps_first_pair_only() {
    init_logging();
    let mut stack = three_frame_stack();
    let original = stack.clone();
    let config = FilterConfig::new(ReductionKind::Max, 1.0, 1.0, 1.0).with_threads(2);
    let monitor = StopAfter {
        pairs: 1,
        polls: Cell::new(0),
    };

    let err = filter(&mut stack, &config, &monitor).unwrap_err();
    assert_eq!(
        err,
        FilterError::Cancelled {
            completed: 1,
            total: 3,
            partial: None
        }
    );

    let (StackPlanes::Gray8(now), StackPlanes::Gray8(before)) = (stack.planes(), original.planes())
    else {
        panic!("expected 8-bit planes");
    };
    for z in 0..2 {
        assert_ne!(now[stack.stack_index(0, z, 0)], before[stack.stack_index(0, z, 0)]);
        for t in 1..3 {
            let idx = stack.stack_index(0, z, t);
            assert_eq!(now[idx], before[idx], "frame {t} slice {z} must be untouched");
        }
    }
}

#[test]
fn cancelled_variance_publishes_completed_pairs() {
    let mut stack = three_frame_stack();
    let original = stack.clone();
    let config = FilterConfig::new(ReductionKind::Variance, 1.0, 1.0, 1.0);
    let monitor = StopAfter {
        pairs: 2,
        polls: Cell::new(0),
    };

    let Err(FilterError::Cancelled {
        completed: 2,
        total: 3,
        partial: Some(partial),
    }) = filter(&mut stack, &config, &monitor)
    else {
        panic!("expected a cancelled run with a partial stack");
    };
    assert_eq!(stack, original);

    let spec = NeighborhoodSpec::new(1.0, 1.0, 1.0, ReductionKind::Variance);
    for t in 0..2 {
        let expected = original.volume(0, t).unwrap().filter_3d(&spec, 1).unwrap();
        assert_eq!(partial.volume(0, t).unwrap(), expected, "frame {t} was filtered");
    }
    assert_eq!(
        partial.volume(0, 2).unwrap(),
        VolumeData::Gray32(original.volume(0, 2).unwrap().to_working())
    );
}

#[test]
fn current_frame_only() {
    let mut stack = three_frame_stack();
    let original = stack.clone();
    let config = FilterConfig::new(ReductionKind::Min, 1.0, 1.0, 1.0)
        .with_selection(ChannelFrameSelection::all().only_frame(2));
    assert_eq!(
        filter(&mut stack, &config, &NoProgress).unwrap(),
        FilterOutcome::Replaced { pairs: 1 }
    );

    let (StackPlanes::Gray8(now), StackPlanes::Gray8(before)) = (stack.planes(), original.planes())
    else {
        panic!("expected 8-bit planes");
    };
    for z in 0..2 {
        for t in 0..2 {
            let idx = stack.stack_index(0, z, t);
            assert_eq!(now[idx], before[idx]);
        }
        let idx = stack.stack_index(0, z, 2);
        // min over the window around (3, 3) reaches (2, 2) on slice 0
        assert_eq!(now[idx].get_pixel(3, 3)[0], 42);
    }
}
