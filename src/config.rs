//! Run configuration

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use opencv::core::Scalar;
use serde_derive::{Deserialize, Serialize};

use crate::detector::VEHICLE_CLASSES;
use crate::error::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub render: RenderConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);

        Ok(serde_json::from_reader(reader)?)
    }
}

/// Frame pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detector class ids kept as vehicles.
    pub vehicle_classes: Vec<i32>,
    /// Gray level used by the inverse binary filter ahead of OCR.
    pub binarize_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vehicle_classes: VEHICLE_CLASSES.to_vec(),
            binarize_threshold: 64.0,
        }
    }
}

/// BGR color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub f64, pub f64, pub f64);

impl From<Color> for Scalar {
    fn from(c: Color) -> Self {
        Scalar::new(c.0, c.1, c.2, 0.0)
    }
}

/// Overlay renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Thumbnail height as a fraction of the frame height. Gaps, text size and
    /// line widths all scale with it.
    pub thumbnail_ratio: f64,
    pub vehicle_color: Color,
    pub plate_color: Color,
    pub band_color: Color,
    pub text_color: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            thumbnail_ratio: 0.107,
            vehicle_color: Color(0.0, 0.0, 255.0),
            plate_color: Color(0.0, 255.0, 0.0),
            band_color: Color(255.0, 255.0, 255.0),
            text_color: Color(0.0, 0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "render": { "thumbnail_ratio": 0.2 } }"#).unwrap();

        assert_eq!(config.render.thumbnail_ratio, 0.2);
        assert_eq!(config.render.vehicle_color, Color(0.0, 0.0, 255.0));
        assert_eq!(config.pipeline.vehicle_classes, vec![2, 3, 5, 7]);
        assert_eq!(config.pipeline.binarize_threshold, 64.0);
    }

    #[test]
    fn test_color_array_form() {
        let config: RenderConfig =
            serde_json::from_str(r#"{ "plate_color": [255, 0, 0] }"#).unwrap();

        assert_eq!(config.plate_color, Color(255.0, 0.0, 0.0));
    }
}
