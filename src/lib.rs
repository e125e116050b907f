pub mod bbox;
pub mod best;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame;
pub mod interpolate;
pub mod media;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod store;
pub mod tracker;

mod track;

pub use bbox::BBox;
pub use best::{select_best, BestReadings};
pub use config::Config;
pub use detection::{Detection, PlateReading, TrackedBox};
pub use detector::{ObjectDetector, PlateReader};
pub use frame::{FrameSink, FrameSource};
pub use interpolate::{interpolate, DenseTable};
pub use pipeline::{FramePipeline, Models};
pub use render::OverlayRenderer;
pub use session::{OutputPaths, Session};
pub use store::{DetectionRow, DetectionStore};
pub use track::{Track, TrackId};

use error::Error;

/// Multi-object tracker. Stateful across calls; must be called once per frame,
/// in frame order, with that frame's vehicle detections (possibly none).
pub trait Tracking {
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<TrackedBox>, Error>;
}
