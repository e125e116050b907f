use opencv::{
    core::{Mat, Rect},
    imgproc,
    prelude::*,
};

use crate::detection::{Detection, PlateReading};
use crate::error::Error;

/// COCO class ids treated as vehicles: car, motorbike, bus, truck.
pub const VEHICLE_CLASSES: [i32; 4] = [2, 3, 5, 7];

/// Object detector model, invoked once per frame.
pub trait ObjectDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, Error>;
}

/// OCR engine. `Ok(None)` or empty text means the engine produced no text
/// for the crop; any other text, whatever its content or score, is a reading.
pub trait PlateReader {
    fn read(&mut self, binarized: &Mat) -> Result<Option<PlateReading>, Error>;
}

pub fn filter_classes(detections: Vec<Detection>, classes: &[i32]) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| classes.contains(&d.class))
        .collect()
}

/// Owned copy of the `rect` region of `frame`.
pub fn crop(frame: &Mat, rect: Rect) -> Result<Mat, Error> {
    let roi = Mat::roi(frame, rect)?;

    Ok(roi.try_clone()?)
}

/// BGR to grayscale conversion followed by a fixed-threshold inverse binary filter.
pub fn binarize(crop: &Mat, threshold: f64) -> Result<Mat, Error> {
    let mut grey = Mat::default();
    imgproc::cvt_color(crop, &mut grey, imgproc::COLOR_BGR2GRAY, 0)?;

    let mut binary = Mat::default();
    imgproc::threshold(&grey, &mut binary, threshold, 255.0, imgproc::THRESH_BINARY_INV)?;

    Ok(binary)
}
