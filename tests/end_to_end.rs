mod common;

use std::fs;
use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use common::*;
use opencv::{imgcodecs, prelude::*};
use plate_track::config::{Config, PipelineConfig, RenderConfig};
use plate_track::frame::{MemorySink, MemorySource};
use plate_track::media::MediaInput;
use plate_track::render::LabelPlacement;
use plate_track::{
    interpolate, select_best, BBox, FramePipeline, OutputPaths, OverlayRenderer, Session,
    TrackId,
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("plate-track-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_three_frame_video() {
    let mut models = models(
        vec![
            Some(vec![det([100.0, 200.0, 300.0, 350.0], 0.9, CAR)]),
            Some(vec![]),
            Some(vec![det([120.0, 200.0, 320.0, 350.0], 0.9, CAR)]),
        ],
        vec![
            Some(vec![det([150.0, 300.0, 230.0, 320.0], 0.7, 0)]),
            Some(vec![]),
            Some(vec![det([170.0, 300.0, 250.0, 320.0], 0.7, 0)]),
        ],
        vec![Some(("AB123CD", 0.8)), Some(("AB123CD", 0.95))],
    );

    let config = PipelineConfig::default();
    let mut source = MemorySource::new(frames(3));
    let mut pipeline = FramePipeline::new(&mut models, &config);
    pipeline.run(&mut source).unwrap();
    let (store, stats) = pipeline.finish();

    assert_eq!(stats.frames, 3);
    assert_eq!(store.len(), 2);

    let table = interpolate(&store);
    let track = table.track(TrackId(1)).unwrap();
    assert_eq!(track.len(), 3);

    let middle = track.rows[1];
    assert_eq!(middle.frame_number, 1);
    assert!(middle.interpolated);
    assert_eq!(middle.vehicle_bbox, BBox::ltrb(110.0, 200.0, 310.0, 350.0));
    assert_eq!(middle.plate_bbox, BBox::ltrb(160.0, 300.0, 240.0, 320.0));

    let best = select_best(table.rows());
    assert_eq!(best.len(), 1);
    let reading = best.get(TrackId(1)).unwrap();
    assert_eq!(reading.frame_number, 2);
    assert_eq!(reading.reading(), Some(("AB123CD", 0.95)));

    let renderer = OverlayRenderer::new(RenderConfig::default());
    let mut sink = MemorySink::default();
    let summary = renderer
        .render_video(&mut source, &mut sink, &table, &best)
        .unwrap();

    assert_eq!(summary.frames, 3);
    assert_eq!(sink.frames.len(), 3);
    assert_eq!(summary.boxes, 3);
    assert_eq!(summary.skipped_overlays, 0);
    assert_eq!(
        summary.labels,
        vec![LabelPlacement {
            frame_number: 2,
            track_id: TrackId(1),
            text: "AB123CD".to_string(),
        }]
    );
}

#[test]
fn test_report_survives_reload() {
    let mut models = models(
        vec![
            Some(vec![det([100.0, 200.0, 300.0, 350.0], 0.9, CAR)]),
            Some(vec![]),
            Some(vec![]),
            Some(vec![det([130.0, 200.0, 330.0, 350.0], 0.9, CAR)]),
        ],
        vec![
            Some(vec![det([150.0, 300.0, 230.0, 320.0], 0.7, 0)]),
            Some(vec![]),
            Some(vec![]),
            Some(vec![det([180.0, 300.0, 260.0, 320.0], 0.7, 0)]),
        ],
        vec![Some(("XY987ZT", 0.6)), Some(("XY987ZT", 0.4))],
    );

    let config = PipelineConfig::default();
    let mut source = MemorySource::new(frames(4));
    let mut pipeline = FramePipeline::new(&mut models, &config);
    pipeline.run(&mut source).unwrap();
    let (store, _) = pipeline.finish();

    let mut report = Vec::new();
    store.write_report(&mut report).unwrap();
    let reloaded = plate_track::DetectionStore::read_report(report.as_slice()).unwrap();

    let table = interpolate(&reloaded);
    assert_eq!(table.len(), 4);

    let third = table.rows_for_frame(2).next().unwrap();
    assert_abs_diff_eq!(third.vehicle_bbox.left(), 120.0, epsilon = 1e-4);
    assert_eq!(third.reading(), Some(("XY987ZT", 0.6)));

    let best = select_best(table.rows());
    assert_eq!(best.key_frame(TrackId(1)), Some(0));
}

#[test]
fn test_still_image_session() {
    let dir = scratch_dir("still");
    let image_path = dir.join("upload.png");
    imgcodecs::imwrite(
        image_path.to_str().unwrap(),
        &black_frame(400, 400),
        &opencv::core::Vector::new(),
    )
    .unwrap();

    let mut models = models(
        vec![Some(vec![det([100.0, 200.0, 300.0, 350.0], 0.9, CAR)])],
        vec![Some(vec![det([150.0, 300.0, 230.0, 320.0], 0.7, 0)])],
        vec![Some(("AB123CD", 0.9))],
    );

    let input = MediaInput::new(&image_path).unwrap();
    let outputs = OutputPaths::in_dir(&dir, &input);
    let config = Config::default();

    let report = Session::new(&config)
        .run(&input, &mut models, &outputs)
        .unwrap();

    assert_eq!(report.pipeline.rows, 1);
    assert_eq!(report.table.len(), 1);
    assert_eq!(report.best.len(), 1);
    assert_eq!(
        report.best.get(TrackId(1)),
        report.table.rows().first()
    );
    assert_eq!(report.render.labels.len(), 1);

    assert!(outputs.results_report.exists());
    assert!(outputs.interpolated_report.exists());
    assert!(report.annotated.exists());
    assert_eq!(report.processed_frame.as_ref(), Some(&outputs.processed_frame));
    assert!(outputs.processed_frame.exists());

    let annotated = imgcodecs::imread(
        report.annotated.to_str().unwrap(),
        imgcodecs::IMREAD_COLOR,
    )
    .unwrap();
    assert_eq!(annotated.rows(), 400);

    let results = fs::read_to_string(&outputs.results_report).unwrap();
    assert!(results.starts_with("frame_number,car_id,car_bbox,"));
    assert!(results.contains("AB123CD"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_failed_render_writes_no_report() {
    let dir = scratch_dir("render-fails");
    let image_path = dir.join("upload.png");
    imgcodecs::imwrite(
        image_path.to_str().unwrap(),
        &black_frame(400, 400),
        &opencv::core::Vector::new(),
    )
    .unwrap();

    let mut models = models(
        vec![Some(vec![det([100.0, 200.0, 300.0, 350.0], 0.9, CAR)])],
        vec![Some(vec![det([150.0, 300.0, 230.0, 320.0], 0.7, 0)])],
        vec![Some(("AB123CD", 0.9))],
    );

    let input = MediaInput::new(&image_path).unwrap();
    let missing = dir.join("missing");
    let outputs = OutputPaths {
        annotated: missing.join("annotated.png"),
        processed_frame: missing.join("processed_frame.png"),
        ..OutputPaths::in_dir(&dir, &input)
    };
    let config = Config::default();

    assert!(Session::new(&config)
        .run(&input, &mut models, &outputs)
        .is_err());
    assert!(!outputs.results_report.exists());
    assert!(!outputs.interpolated_report.exists());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_unsupported_input_is_rejected() {
    assert!(MediaInput::new("upload.gif").is_err());
}
