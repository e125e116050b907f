use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("OpenCV Error: {0}")]
    OpenCvError(#[from] opencv::Error),

    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Report Error: {0}")]
    ReportError(#[from] csv::Error),

    #[error("Config Error: {0}")]
    ConfigError(#[from] serde_json::Error),

    #[error("Invalid bbox {0:?}: {1}")]
    InvalidBBox(String, &'static str),

    #[error("Unsupported media file: {0}")]
    UnsupportedMedia(String),

    #[error("Unable to open media: {0}")]
    MediaOpen(String),

    #[error("Detector Error: {0}")]
    Detector(String),

    #[error("Tracker Error: {0}")]
    Tracker(String),

    #[error("OCR Error: {0}")]
    Ocr(String),

    #[error("Overlay geometry: {0}")]
    OverlayGeometry(String),
}

impl Error {
    /// Errors confined to the frame being processed: failures of the external
    /// models and boxes they produced that can not be recorded.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Error::Detector(_)
                | Error::Tracker(_)
                | Error::Ocr(_)
                | Error::OpenCvError(_)
                | Error::InvalidBBox(..)
        )
    }
}
