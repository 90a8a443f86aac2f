// End-to-end runs against in-process pose/sink fakes

use std::collections::HashSet;
use std::path::Path;

use anamorph_engine::gateway::FixedPose;
use anamorph_engine::{
    BlockPos, CatalogLoadError, ColorCatalog, CommandSink, DepthPolarity, DepthRange, DispatchReport, GatewayError,
    LuminanceDepth, Pipeline, PipelineError, PlacementInstruction, PoseProvider, PoseUnavailableError, SynthesisOptions,
    Vec3, ViewerPose,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

#[derive(Default)]
struct RecordingSink {
    batches: Vec<Vec<PlacementInstruction>>,
}

impl CommandSink for RecordingSink {
    fn dispatch(&mut self, instructions: &[PlacementInstruction]) -> Result<DispatchReport, GatewayError> {
        self.batches.push(instructions.to_vec());
        Ok(DispatchReport { sent: instructions.len(), failed: 0 })
    }
}

struct NoPose;

impl PoseProvider for NoPose {
    fn viewer_pose(&mut self) -> Result<ViewerPose, PoseUnavailableError> {
        Err(PoseUnavailableError::Query("player offline".into()))
    }
}

fn red_blue() -> ColorCatalog {
    ColorCatalog::from_json_str(r#"{"red_block": [255, 0, 0], "blue_block": [0, 0, 255]}"#).unwrap()
}

fn origin() -> ViewerPose {
    ViewerPose::new(Vec3::ZERO, 0.0, 0.0)
}

fn write_png(path: &Path, img: &RgbaImage) {
    img.save_with_format(path, ImageFormat::Png).unwrap();
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn solid_red_square_lands_five_blocks_ahead() {
    init_logging();
    let catalog = red_blue();
    // Red luma is 76: 7 - 76/255 * 7 = 4.91, rounds to 5
    let estimator = LuminanceDepth::new(DepthRange::new(0, 7).unwrap(), DepthPolarity::NearBright);
    let pipeline = Pipeline::new(&catalog, estimator);

    let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
    let plan = pipeline.plan(origin(), DynamicImage::ImageRgba8(img)).unwrap();
    let insts = &plan.synthesis.instructions;

    assert_eq!(insts.len(), 4);
    assert!(insts.iter().all(|i| i.material.as_str() == "red_block"));

    let cells: HashSet<BlockPos> = insts.iter().map(|i| i.position).collect();
    let expected: HashSet<BlockPos> =
        [(1, 1), (0, 1), (1, 0), (0, 0)].into_iter().map(|(x, y)| BlockPos::new(x, y, 5)).collect();
    assert_eq!(cells, expected);
}

#[test]
fn transparent_pixel_is_skipped() {
    let catalog = red_blue();
    let pipeline = Pipeline::new(&catalog, LuminanceDepth::new(DepthRange::new(5, 5).unwrap(), DepthPolarity::NearBright));

    let mut img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
    img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
    let plan = pipeline.plan(origin(), DynamicImage::ImageRgba8(img)).unwrap();

    assert_eq!(plan.synthesis.instructions.len(), 3);
    assert_eq!(plan.synthesis.report.transparent, 1);
    assert!(plan.synthesis.instructions.iter().all(|i| i.material.as_str() == "blue_block"));
}

#[test]
fn out_of_range_catalog_produces_nothing() {
    let err = ColorCatalog::from_json_str(r#"{"red_block": [300, 0, 0], "blue_block": [0, 0, 255]}"#).unwrap_err();
    assert!(matches!(err, CatalogLoadError::ChannelOutOfRange { value: 300, .. }));
    let as_pipeline: PipelineError = err.into();
    assert!(matches!(as_pipeline, PipelineError::Catalog(_)));
}

#[test]
fn coordinates_are_unique_for_noisy_image() {
    let catalog = red_blue();
    let pipeline = Pipeline::new(&catalog, LuminanceDepth::new(DepthRange::new(10, 30).unwrap(), DepthPolarity::NearDark))
        .with_reference_depth(30.0)
        .with_scale(0.7)
        .with_options(SynthesisOptions::default().with_far_fill(DepthRange::new(10, 30).unwrap(), 0.5));

    let img = RgbaImage::from_fn(24, 16, |x, y| {
        let v = ((x * 37 + y * 91) % 256) as u8;
        Rgba([v, 255 - v, (x * 10) as u8, if (x + y) % 7 == 0 { 0 } else { 255 }])
    });
    let pose = ViewerPose::new(Vec3::new(100.0, 65.62, -40.0), 215.0, 30.0);
    let plan = pipeline.plan(pose, DynamicImage::ImageRgba8(img)).unwrap();

    let cells: HashSet<BlockPos> = plan.synthesis.instructions.iter().map(|i| i.position).collect();
    assert_eq!(cells.len(), plan.synthesis.instructions.len());
    assert!(!cells.is_empty());
}

#[test]
fn full_run_dispatches_once() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.png");
    write_png(&path, &RgbaImage::from_pixel(3, 3, Rgba([250, 10, 10, 255])));

    let catalog = red_blue();
    let pipeline = Pipeline::new(&catalog, LuminanceDepth::new(DepthRange::new(4, 4).unwrap(), DepthPolarity::NearBright));
    let mut sink = RecordingSink::default();
    let pose = ViewerPose::new(Vec3::new(10.0, 64.0, 10.0), 0.0, 0.0);

    let report = pipeline.run(&mut FixedPose(pose), &path, &mut sink).unwrap();
    assert_eq!(report.width, 3);
    assert_eq!(report.dispatch.sent, 9);
    assert_eq!(sink.batches.len(), 1);
    // Center pixel straight ahead
    assert!(sink.batches[0].iter().any(|i| i.position == BlockPos::new(10, 64, 14)));
}

#[test]
fn missing_pose_aborts_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.png");
    write_png(&path, &RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255])));

    let catalog = red_blue();
    let pipeline = Pipeline::new(&catalog, LuminanceDepth::new(DepthRange::default(), DepthPolarity::NearBright));
    let mut sink = RecordingSink::default();

    let err = pipeline.run(&mut NoPose, &path, &mut sink).unwrap_err();
    assert!(matches!(err, PipelineError::Pose(_)));
    assert!(sink.batches.is_empty());
}

#[test]
fn undecodable_image_aborts_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.png");
    std::fs::write(&path, b"not a png").unwrap();

    let catalog = red_blue();
    let pipeline = Pipeline::new(&catalog, LuminanceDepth::new(DepthRange::default(), DepthPolarity::NearBright));
    let mut sink = RecordingSink::default();

    let err = pipeline.run(&mut FixedPose(origin()), &path, &mut sink).unwrap_err();
    assert!(matches!(err, PipelineError::Image(_)));
    assert!(sink.batches.is_empty());
}

#[test]
fn replanning_is_deterministic() {
    let catalog = red_blue();
    let pipeline = Pipeline::new(&catalog, LuminanceDepth::new(DepthRange::new(3, 12).unwrap(), DepthPolarity::NearBright));
    let img = RgbaImage::from_fn(5, 4, |x, y| Rgba([(x * 50) as u8, 0, (y * 60) as u8, 255]));
    let pose = ViewerPose::new(Vec3::new(0.5, 1.62, 0.5), 45.0, -10.0);

    let a = pipeline.plan(pose, DynamicImage::ImageRgba8(img.clone())).unwrap();
    let b = pipeline.plan(pose, DynamicImage::ImageRgba8(img)).unwrap();
    assert_eq!(a.synthesis.instructions, b.synthesis.instructions);
}
