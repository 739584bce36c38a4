//! End-to-end exercises of the scene/transfer-function pipeline that cross
//! module boundaries: tree + transform composition feeding a draw list, and
//! dataset changes flowing through the worker into consumable color buffers.
//! Everything here runs without a GPU.

use std::sync::Arc;

use aster_core::{
    Anchor, ColorMode, Dataset, DirectTransfer, FieldChannel, GaussianTransfer, MaterialID,
    MeshID, MeshInstance, RenderTarget, SceneNode, SceneNodeData, SciVis, Scene,
    TransferFunction, TransferFunctionKind, TriangularGaussianTransfer, Vector3, tf,
};

fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

#[test]
fn anchored_scaled_node_lands_in_the_draw_list_with_its_world_matrix() {
    init_logger();
    let mut scene = Scene::new();
    let root = scene.root();

    let mut cube = SceneNode::named(
        "cube",
        SceneNodeData::Mesh(MeshInstance { mesh: MeshID::new() }),
    );
    cube.material = MaterialID::new();
    let cube = scene.spawn(root, cube);

    scene.set_default_bounds(cube, Vector3::zero(), Vector3::one());
    scene.set_anchor(cube, Anchor::Center);
    scene.set_scale(cube, Vector3::splat(2.0));
    scene.set_position(cube, Vector3::new(1.0, 0.0, 0.0));

    let mut target = RenderTarget::new(256, 256);
    scene.update(&mut target);

    assert_eq!(target.draw_list().len(), 1);
    let model = target.draw_list()[0].model;
    // The unit cube's center maps to world (1, 0, 0) at scale 2.
    let center = model.transform_point3(glam::Vec3::splat(0.5));
    assert!((center - glam::Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
}

#[test]
fn transform_links_compose_across_the_draw_pass() {
    init_logger();
    let mut scene = Scene::new();
    let root = scene.root();
    let anchor = scene.spawn_named(root, "rig", SceneNodeData::Node);

    let mut probe = SceneNode::named(
        "probe",
        SceneNodeData::Mesh(MeshInstance { mesh: MeshID::new() }),
    );
    probe.material = MaterialID::new();
    let probe = scene.spawn(root, probe);

    scene.set_apply_transformation(probe, anchor);
    scene.set_position(probe, Vector3::new(0.0, 1.0, 0.0));
    scene.set_position(anchor, Vector3::new(4.0, 0.0, 0.0));

    let mut target = RenderTarget::new(64, 64);
    scene.update(&mut target);
    let origin = target.draw_list()[0]
        .model
        .transform_point3(glam::Vec3::ZERO);
    assert_eq!(origin, glam::Vec3::new(4.0, 1.0, 0.0));

    // Detaching drops the rig's contribution on the next frame.
    target.clear_draw_list();
    scene.set_apply_transformation(probe, aster_core::NodeID::nil());
    scene.update(&mut target);
    let origin = target.draw_list()[0]
        .model
        .transform_point3(glam::Vec3::ZERO);
    assert_eq!(origin, glam::Vec3::new(0.0, 1.0, 0.0));
}

#[test]
fn tf_change_produces_exactly_one_consumable_buffer() {
    init_logger();
    let mut ds = Dataset::new();
    ds.push_channel(FieldChannel::new("pressure", vec![1.0, 2.0, 3.0, 4.0]));
    let mut vis = SciVis::new(
        Arc::new(ds),
        DirectTransfer::new(ColorMode::Grayscale).into(),
    );

    vis.on_tf_changed();
    // A burst of change events while the first recompute may still be in
    // flight is dropped, not queued.
    vis.on_tf_changed();
    vis.on_tf_changed();

    let mut delivered = None;
    for _ in 0..2000 {
        if let Some(buffer) = vis.take_colors() {
            delivered = Some(buffer);
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    let buffer = delivered.expect("a recompute must complete");
    assert_eq!(buffer.elements, 4);
    assert_eq!(&buffer.data[0..4], &[0, 0, 0, 255]);

    // Once the burst has settled, at most one superseding result remains and
    // the single-slot mailbox then stays empty.
    std::thread::sleep(std::time::Duration::from_millis(50));
    let _ = vis.take_colors();
    assert!(vis.take_colors().is_none());
}

#[test]
fn gradient_aware_tf_suppresses_flat_regions_end_to_end() {
    init_logger();
    let mut ds = Dataset::new();
    ds.push_channel(FieldChannel::new("density", vec![0.0, 5.0, 10.0]));
    // Gradient magnitude: the middle element sits in a flat region.
    ds.push_channel(FieldChannel::with_range(
        "gradient",
        vec![1.0, 0.0, 1.0],
        0.0,
        1.0,
    ));

    let base = GaussianTransfer::new(
        ColorMode::CyclicHue,
        vec![true, true],
        vec![1.0, 1.0],
        vec![0.5, 0.5],
        1.0,
    )
    .unwrap();
    let tf: TransferFunctionKind = TriangularGaussianTransfer::new(base).unwrap().into();

    let buffer = aster_core::scivis::compute_element_colors(&ds, &tf, None).unwrap();
    let alpha = |e: usize| buffer.data[e * 4 + 3];
    assert_eq!(alpha(1), 0, "flat region must be fully transparent");
    assert!(alpha(0) > 0);
    assert!(alpha(2) > 0);
}

#[test]
fn lut_generation_matches_tf_evaluation() {
    init_logger();
    let tf: TransferFunctionKind = GaussianTransfer::uniform(ColorMode::DivergingMsh, 2, 2.0, 0.8)
        .unwrap()
        .into();
    let buf = tf::generate(&[8, 8], &tf).unwrap();
    assert_eq!(buf.len(), 4 * 64);

    // Spot-check one interior cell against a direct evaluation.
    let (x, y) = (3u32, 5u32);
    let idx = ((y * 8 + x) * 4) as usize;
    let expected = tf.compute_rgba(&[x as f32 / 8.0, y as f32 / 8.0]);
    assert_eq!(&buf[idx..idx + 4], &expected.to_bytes());
}
