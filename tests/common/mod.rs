#![allow(dead_code)]

use std::collections::VecDeque;

use opencv::{
    core::{Mat, Scalar, CV_8UC3},
    prelude::*,
};
use plate_track::error::Error;
use plate_track::pipeline::Models;
use plate_track::{
    BBox, Detection, ObjectDetector, PlateReader, PlateReading, TrackedBox, Tracking,
};

pub const CAR: i32 = 2;
pub const PERSON: i32 = 0;

pub fn black_frame(rows: i32, cols: i32) -> Mat {
    Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0)).unwrap()
}

pub fn frames(count: usize) -> Vec<Mat> {
    (0..count).map(|_| black_frame(400, 400)).collect()
}

pub fn det(bbox: [f32; 4], confidence: f32, class: i32) -> Detection {
    Detection {
        bbox: BBox::from(bbox),
        confidence,
        class,
    }
}

/// Replays one scripted answer per frame; `None` makes the call fail.
pub struct ScriptedDetector {
    script: VecDeque<Option<Vec<Detection>>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Option<Vec<Detection>>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &Mat) -> Result<Vec<Detection>, Error> {
        match self.script.pop_front() {
            Some(Some(dets)) => Ok(dets),
            Some(None) => Err(Error::Detector("scripted failure".to_string())),
            None => Ok(Vec::new()),
        }
    }
}

/// Numbers detections in input order, starting at 1.
#[derive(Default)]
pub struct IndexTracker {
    pub calls: usize,
}

impl Tracking for IndexTracker {
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<TrackedBox>, Error> {
        self.calls += 1;

        Ok(detections
            .iter()
            .enumerate()
            .map(|(i, d)| TrackedBox::new(d.bbox, i as i64 + 1))
            .collect())
    }
}

/// Replays scripted readings; the call numbered `fail_on` (from 0) errors
/// without consuming the script.
pub struct ScriptedReader {
    script: VecDeque<Option<PlateReading>>,
    fail_on: Option<usize>,
    calls: usize,
}

impl ScriptedReader {
    pub fn new(script: Vec<Option<(&str, f32)>>) -> Self {
        Self {
            script: script
                .into_iter()
                .map(|r| r.map(|(text, score)| PlateReading::new(text, score)))
                .collect(),
            fail_on: None,
            calls: 0,
        }
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }
}

impl PlateReader for ScriptedReader {
    fn read(&mut self, binarized: &Mat) -> Result<Option<PlateReading>, Error> {
        assert!(binarized.rows() > 0 && binarized.cols() > 0);

        let call = self.calls;
        self.calls += 1;
        if self.fail_on == Some(call) {
            return Err(Error::Ocr("scripted failure".to_string()));
        }

        Ok(self.script.pop_front().flatten())
    }
}

pub fn models_with_reader(
    vehicles: Vec<Option<Vec<Detection>>>,
    plates: Vec<Option<Vec<Detection>>>,
    reader: ScriptedReader,
) -> Models {
    Models {
        vehicle_detector: Box::new(ScriptedDetector::new(vehicles)),
        plate_detector: Box::new(ScriptedDetector::new(plates)),
        tracker: Box::new(IndexTracker::default()),
        reader: Box::new(reader),
    }
}

pub fn models(
    vehicles: Vec<Option<Vec<Detection>>>,
    plates: Vec<Option<Vec<Detection>>>,
    readings: Vec<Option<(&str, f32)>>,
) -> Models {
    models_with_reader(vehicles, plates, ScriptedReader::new(readings))
}
