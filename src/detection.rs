use crate::bbox::BBox;
use crate::track::TrackId;

/// One raw detector output: `(x1, y1, x2, y2, score, class_id)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class: i32,
}

impl Detection {
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class: i32) -> Self {
        Self {
            bbox: BBox::ltrb(x1, y1, x2, y2),
            confidence,
            class,
        }
    }
}

/// One box as emitted by the multi-object tracker: `(x1, y1, x2, y2, track_id)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedBox {
    pub bbox: BBox,
    pub track_id: TrackId,
}

impl TrackedBox {
    #[inline]
    pub fn new(bbox: BBox, track_id: impl Into<TrackId>) -> Self {
        Self {
            bbox,
            track_id: track_id.into(),
        }
    }
}

/// Text recognized on a plate crop together with the recognizer's confidence
#[derive(Debug, Clone, PartialEq)]
pub struct PlateReading {
    pub text: String,
    pub confidence: f32,
}

impl PlateReading {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}
