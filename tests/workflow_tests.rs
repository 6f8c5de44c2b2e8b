//! Integration tests for filters3d workflows
//!
//! These tests drive the public entry points the way a caller would:
//! build a stack, configure a filter, run it, and chain results.

use filters3d::{
    filter, BitDepth, ChannelFrameSelection, Filter3D, FilterConfig, FilterOutcome, Hyperstack,
    NeighborhoodSpec, NoProgress, ReductionKind, StackPlanes, Volume, VolumeData, WindowShape,
};
use image::{ImageBuffer, Luma};
use itertools::iproduct;

/// Two-channel, three-slice, two-frame 16-bit stack with a distinct ramp per pair
fn create_test_stack() -> Hyperstack {
    let planes: Vec<ImageBuffer<Luma<u16>, Vec<u16>>> = iproduct!(0..2u32, 0..3u32, 0..2u32)
        .map(|(t, z, c)| {
            ImageBuffer::from_fn(6, 5, |x, y| {
                Luma([(x * 100 + y * 10 + z + c * 1000 + t * 5000) as u16])
            })
        })
        .collect();
    Hyperstack::new(2, 3, 2, StackPlanes::Gray16(planes)).expect("consistent stack")
}

fn gray16_planes(stack: &Hyperstack) -> &[ImageBuffer<Luma<u16>, Vec<u16>>] {
    match stack.planes() {
        StackPlanes::Gray16(p) => p,
        other => panic!("expected 16-bit planes, got {:?}", other.bit_depth()),
    }
}

#[test]
fn hyperstack_filter_matches_per_volume_filter() {
    // Workflow: filter a whole stack, then compare each pair with a direct
    // volume filter of the same pair
    let original = create_test_stack();
    let mut stack = original.clone();
    let config = FilterConfig::new(ReductionKind::Median, 1.0, 2.0, 1.0).with_threads(3);

    let outcome = filter(&mut stack, &config, &NoProgress).expect("filter succeeds");
    assert_eq!(outcome, FilterOutcome::Replaced { pairs: 4 });
    assert_eq!(stack.bit_depth(), BitDepth::Sixteen);

    for (c, t) in iproduct!(0..2, 0..2) {
        let expected = original
            .volume(c, t)
            .unwrap()
            .filter_3d(&config.spec(), 1)
            .unwrap();
        assert_eq!(stack.volume(c, t).unwrap(), expected, "pair ({c}, {t})");
    }
}

#[test]
fn variance_then_mean_on_created_stack() {
    // Workflow: variance produces a float stack which is then smoothed in place
    let mut stack = create_test_stack();
    let original = stack.clone();
    let variance = FilterConfig::new(ReductionKind::Variance, 1.0, 1.0, 1.0);

    let FilterOutcome::Created(mut created) =
        filter(&mut stack, &variance, &NoProgress).expect("variance succeeds")
    else {
        panic!("variance must create a new stack");
    };
    assert_eq!(stack, original);
    assert_eq!(created.bit_depth(), BitDepth::ThirtyTwo);
    assert_eq!(created.dimensions(), (6, 5));

    let smooth = FilterConfig::new(ReductionKind::Mean, 1.0, 1.0, 0.0);
    let outcome = filter(&mut created, &smooth, &NoProgress).expect("mean succeeds");
    assert_eq!(outcome, FilterOutcome::Replaced { pairs: 4 });
    assert_eq!(created.bit_depth(), BitDepth::ThirtyTwo);
}

#[test]
fn single_pair_selection_leaves_the_rest() {
    let mut stack = create_test_stack();
    let original = stack.clone();
    let config = FilterConfig::new(ReductionKind::Max, 2.0, 2.0, 1.0).with_selection(
        ChannelFrameSelection::all()
            .only_channel(1)
            .only_frame(0),
    );

    assert_eq!(
        filter(&mut stack, &config, &NoProgress).unwrap(),
        FilterOutcome::Replaced { pairs: 1 }
    );

    let (now, before) = (gray16_planes(&stack), gray16_planes(&original));
    for (c, z, t) in iproduct!(0..2, 0..3, 0..2) {
        let idx = stack.stack_index(c, z, t);
        if (c, t) == (1, 0) {
            assert_ne!(now[idx], before[idx], "selected plane {idx} must change");
        } else {
            assert_eq!(now[idx], before[idx], "unselected plane {idx} must not change");
        }
    }
}

#[test]
fn min_then_max_is_an_opening() {
    // Workflow: min followed by max removes an isolated bright voxel
    let volume = Volume::<u8>::from_fn(7, 7, 7, |x, y, z| if (x, y, z) == (3, 3, 3) { 250 } else { 20 });
    let spec = NeighborhoodSpec::new(1.0, 1.0, 1.0, ReductionKind::Min);

    let eroded = volume.filter_3d(&spec, 4).unwrap();
    let opened = eroded
        .filter_3d(
            &NeighborhoodSpec {
                kind: ReductionKind::Max,
                ..spec
            },
            4,
        )
        .unwrap();
    let VolumeData::Gray8(opened) = opened else {
        panic!("max keeps 8-bit depth");
    };
    assert!(opened.as_slice().iter().all(|&v| v == 20));
}

#[test]
fn ellipsoid_window_is_narrower_than_box() {
    // The box corner (1, 1, 1) lies outside the unit ellipsoid
    let volume = Volume::<u8>::from_fn(3, 3, 3, |x, y, z| if (x, y, z) == (0, 0, 0) { 90 } else { 0 });
    let boxed = NeighborhoodSpec::new(1.0, 1.0, 1.0, ReductionKind::Max);
    let ellipsoid = boxed.with_shape(WindowShape::Ellipsoid);

    let VolumeData::Gray8(by_box) = volume.filter_3d(&boxed, 2).unwrap() else {
        panic!("max keeps 8-bit depth");
    };
    let VolumeData::Gray8(by_ellipsoid) = volume.filter_3d(&ellipsoid, 2).unwrap() else {
        panic!("max keeps 8-bit depth");
    };
    assert_eq!(by_box.get(1, 1, 1), 90);
    assert_eq!(by_ellipsoid.get(1, 1, 1), 0);
    assert_eq!(by_ellipsoid.get(1, 0, 0), 90);
}

#[test]
fn volume_round_trips_through_hyperstack() {
    let volume = Volume::<f32>::from_fn(4, 4, 3, |x, y, z| (x * y + z) as f32 * 0.5);
    let stack = Hyperstack::from_volume(volume.clone().into()).unwrap();
    assert_eq!((stack.channels(), stack.slices(), stack.frames()), (1, 3, 1));
    assert_eq!(stack.volume(0, 0).unwrap(), VolumeData::Gray32(volume));
}

#[test]
fn worker_count_does_not_change_the_result() {
    let base = create_test_stack();
    let mut results = Vec::new();
    for threads in [1, 2, 3, 8] {
        let mut stack = base.clone();
        let config = FilterConfig::new(ReductionKind::Mean, 1.5, 1.0, 1.0).with_threads(threads);
        filter(&mut stack, &config, &NoProgress).unwrap();
        results.push(stack);
    }
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}
