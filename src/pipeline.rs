use log::{debug, trace, warn};
use opencv::{core::Mat, prelude::*};

use crate::bbox::BBox;
use crate::config::PipelineConfig;
use crate::detection::{PlateReading, TrackedBox};
use crate::detector::{self, ObjectDetector, PlateReader};
use crate::error::Error;
use crate::frame::FrameSource;
use crate::store::{DetectionRow, DetectionStore};
use crate::tracker;
use crate::Tracking;

/// External models driven by the pipeline.
pub struct Models {
    pub vehicle_detector: Box<dyn ObjectDetector>,
    pub plate_detector: Box<dyn ObjectDetector>,
    pub tracker: Box<dyn Tracking>,
    pub reader: Box<dyn PlateReader>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingFrame,
    Detecting,
    Tracking,
    Associating,
    Recording,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u32,
    pub rows: usize,
    pub association_misses: usize,
    pub ocr_failures: usize,
    /// Plates whose box is degenerate or leaves the frame.
    pub unreadable_plates: usize,
    /// Frames dropped because a detector, the tracker or the OCR engine failed.
    pub failed_frames: usize,
}

pub struct FramePipeline<'a> {
    models: &'a mut Models,
    config: &'a PipelineConfig,
    stage: Stage,
    store: DetectionStore,
    stats: PipelineStats,
}

impl<'a> FramePipeline<'a> {
    pub fn new(models: &'a mut Models, config: &'a PipelineConfig) -> Self {
        Self {
            models,
            config,
            stage: Stage::AwaitingFrame,
            store: DetectionStore::new(),
            stats: PipelineStats::default(),
        }
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[inline]
    pub fn store(&self) -> &DetectionStore {
        &self.store
    }

    #[inline]
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn finish(self) -> (DetectionStore, PipelineStats) {
        (self.store, self.stats)
    }

    fn enter(&mut self, stage: Stage) {
        trace!("{:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    /// Reads frames until the source is exhausted. Failures of the external
    /// models drop the current frame only; read errors end the run.
    pub fn run(&mut self, source: &mut dyn FrameSource) -> Result<(), Error> {
        let mut frame_number = 0u32;

        loop {
            self.enter(Stage::AwaitingFrame);

            let frame = match source.read_frame()? {
                Some(frame) => frame,
                None => break,
            };

            if let Err(err) = self.step(frame_number, &frame) {
                if !err.is_frame_local() {
                    return Err(err);
                }

                warn!("frame {} dropped: {}", frame_number, err);
                self.stats.failed_frames += 1;
            }

            self.stats.frames += 1;
            frame_number += 1;
        }

        self.enter(Stage::Done);
        debug!("pipeline done: {:?}", self.stats);

        Ok(())
    }

    /// Processes one frame and records its rows. Rows are only appended once
    /// every model call for the frame has succeeded and every row is valid.
    pub fn step(&mut self, frame_number: u32, frame: &Mat) -> Result<(), Error> {
        let rows = self.process_frame(frame_number, frame)?;

        self.enter(Stage::Recording);
        self.stats.rows += self.store.extend_checked(rows)?;

        Ok(())
    }

    fn process_frame(
        &mut self,
        frame_number: u32,
        frame: &Mat,
    ) -> Result<Vec<DetectionRow>, Error> {
        self.enter(Stage::Detecting);
        let detections = self.models.vehicle_detector.detect(frame)?;
        let vehicles = detector::filter_classes(detections, &self.config.vehicle_classes);

        self.enter(Stage::Tracking);
        let tracks = self.models.tracker.update(&vehicles)?;

        self.enter(Stage::Detecting);
        let plates = self.models.plate_detector.detect(frame)?;

        self.enter(Stage::Associating);
        let mut rows: Vec<DetectionRow> = Vec::new();

        for plate in plates {
            if !plate.bbox.is_valid() {
                debug!("frame {}: degenerate plate box {}", frame_number, plate.bbox);
                self.stats.unreadable_plates += 1;
                continue;
            }

            let vehicle = tracker::get_vehicle(&plate.bbox, &tracks);
            if !vehicle.track_id.is_assigned() {
                debug!(
                    "frame {}: plate {} outside every tracked vehicle",
                    frame_number, plate.bbox
                );
                self.stats.association_misses += 1;
                continue;
            }

            let reading = match self.read_plate(frame, &plate.bbox)? {
                Some(reading) => reading,
                None => continue,
            };

            let row = make_row(frame_number, &vehicle, plate.bbox, plate.confidence, reading);

            // one row per vehicle and frame, a later plate replaces an earlier one
            match rows.iter_mut().find(|r| r.track_id == row.track_id) {
                Some(existing) => {
                    debug!(
                        "frame {}: second plate for track {}, replacing",
                        frame_number, row.track_id
                    );
                    *existing = row;
                }
                None => rows.push(row),
            }
        }

        Ok(rows)
    }

    fn read_plate(&mut self, frame: &Mat, plate: &BBox) -> Result<Option<PlateReading>, Error> {
        let rect = match plate.to_rect_within(frame.cols(), frame.rows()) {
            Some(rect) => rect,
            None => {
                debug!("plate {} leaves the frame", plate);
                self.stats.unreadable_plates += 1;
                return Ok(None);
            }
        };

        let crop = detector::crop(frame, rect)?;
        let binarized = detector::binarize(&crop, self.config.binarize_threshold)?;

        // empty text can not be told apart from no text once written to the report
        let reading = self
            .models
            .reader
            .read(&binarized)?
            .filter(|r| !r.text.is_empty());
        if reading.is_none() {
            debug!("no text on plate {}", plate);
            self.stats.ocr_failures += 1;
        }

        Ok(reading)
    }
}

fn make_row(
    frame_number: u32,
    vehicle: &TrackedBox,
    plate_bbox: BBox,
    plate_bbox_score: f32,
    reading: PlateReading,
) -> DetectionRow {
    DetectionRow {
        frame_number,
        track_id: vehicle.track_id,
        vehicle_bbox: vehicle.bbox,
        plate_bbox,
        plate_bbox_score,
        plate_text: Some(reading.text),
        plate_text_score: Some(reading.confidence),
        interpolated: false,
    }
}
