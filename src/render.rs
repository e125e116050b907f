//! Overlay rendering: vehicle/plate borders on every row of the dense table and,
//! on the frame of each track's best reading, a plate thumbnail with the decoded
//! text on a solid band above the vehicle.
//!
//! All overlay dimensions are expressed relative to the thumbnail height, which
//! itself is `thumbnail_ratio * frame_height`, so annotations look the same at
//! every frame size.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use opencv::{
    core::{self, Mat, Point, Rect, Size},
    imgproc,
    prelude::*,
};

use crate::bbox::BBox;
use crate::best::BestReadings;
use crate::config::RenderConfig;
use crate::detector;
use crate::error::Error;
use crate::frame::{FrameSink, FrameSource};
use crate::interpolate::DenseTable;
use crate::store::DetectionRow;
use crate::track::TrackId;

// Reference proportions, for a 400px thumbnail.
const REFERENCE_HEIGHT: f64 = 400.0;
const REFERENCE_FONT_SCALE: f64 = 4.3;
const REFERENCE_TEXT_THICKNESS: f64 = 17.0;
const REFERENCE_BORDER_THICKNESS: f64 = 12.0;

const FONT: i32 = imgproc::FONT_HERSHEY_SIMPLEX;

#[inline]
pub fn thumbnail_height(frame_height: i32, ratio: f64) -> i32 {
    (frame_height as f64 * ratio).round() as i32
}

#[inline]
fn scaled_thickness(reference: f64, thumb_height: i32) -> i32 {
    ((reference * thumb_height as f64 / REFERENCE_HEIGHT).round() as i32).max(1)
}

/// Border line width for a frame of `frame_height` rows.
pub fn border_thickness(frame_height: i32, ratio: f64) -> i32 {
    scaled_thickness(
        REFERENCE_BORDER_THICKNESS,
        thumbnail_height(frame_height, ratio),
    )
}

/// Thumbnail size for `plate`: fixed height, width keeping the plate's aspect ratio.
pub fn thumbnail_size(frame_height: i32, plate: &BBox, ratio: f64) -> Result<Size, Error> {
    if !plate.is_valid() {
        return Err(Error::OverlayGeometry(format!("degenerate plate box {}", plate)));
    }

    let height = thumbnail_height(frame_height, ratio);
    let width = (plate.width() as f64 * height as f64 / plate.height() as f64).round() as i32;

    if height <= 0 || width <= 0 {
        return Err(Error::OverlayGeometry(format!(
            "thumbnail size {}x{} for plate {}",
            width, height, plate
        )));
    }

    Ok(Size::new(width, height))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    pub thumbnail: Rect,
    pub band: Rect,
    pub font_scale: f64,
    pub thickness: i32,
}

impl OverlayLayout {
    /// Thumbnail centered over the vehicle box with a quarter-height gap above
    /// the vehicle; the text band, three quarters of the thumbnail height, sits
    /// right on top of it. Fails if any part would leave the frame.
    pub fn compute(frame: Size, vehicle: &BBox, thumb: Size) -> Result<Self, Error> {
        if thumb.width <= 0 || thumb.height <= 0 {
            return Err(Error::OverlayGeometry(format!(
                "empty thumbnail {}x{}",
                thumb.width, thumb.height
            )));
        }

        let gap = thumb.height / 4;
        let band_height = thumb.height * 3 / 4;

        let x = (vehicle.center_x() as f64 - thumb.width as f64 / 2.0).floor() as i32;
        let thumb_bottom = vehicle.top().floor() as i32 - gap;
        let thumb_top = thumb_bottom - thumb.height;
        let band_top = thumb_top - band_height;

        if x < 0 || x + thumb.width > frame.width || band_top < 0 || thumb_bottom > frame.height {
            return Err(Error::OverlayGeometry(format!(
                "overlay at x={} y={}..{} width {} does not fit a {}x{} frame",
                x, band_top, thumb_bottom, thumb.width, frame.width, frame.height
            )));
        }

        Ok(Self {
            thumbnail: Rect::new(x, thumb_top, thumb.width, thumb.height),
            band: Rect::new(x, band_top, thumb.width, band_height),
            font_scale: REFERENCE_FONT_SCALE * thumb.height as f64 / REFERENCE_HEIGHT,
            thickness: scaled_thickness(REFERENCE_TEXT_THICKNESS, thumb.height),
        })
    }
}

/// Crops `plate` out of `frame` and resizes it to the thumbnail size.
pub fn capture_thumbnail(frame: &Mat, plate: &BBox, ratio: f64) -> Result<Mat, Error> {
    let rect = plate.to_rect_within(frame.cols(), frame.rows()).ok_or_else(|| {
        Error::OverlayGeometry(format!(
            "plate {} outside a {}x{} frame",
            plate,
            frame.cols(),
            frame.rows()
        ))
    })?;

    let size = thumbnail_size(frame.rows(), plate, ratio)?;
    let crop = detector::crop(frame, rect)?;

    let mut thumb = Mat::default();
    imgproc::resize(&crop, &mut thumb, size, 0.0, 0.0, imgproc::INTER_LINEAR)?;

    Ok(thumb)
}

pub fn draw_border(
    frame: &mut Mat,
    bbox: &BBox,
    color: core::Scalar,
    thickness: i32,
) -> Result<(), Error> {
    imgproc::rectangle(frame, bbox.to_rect(), color, thickness, imgproc::LINE_8, 0)?;

    Ok(())
}

/// Composites the thumbnail and the centered text above `vehicle`. Nothing is
/// drawn when the layout does not fit the frame.
pub fn add_overlay(
    frame: &mut Mat,
    vehicle: &BBox,
    thumb: &Mat,
    text: &str,
    config: &RenderConfig,
) -> Result<OverlayLayout, Error> {
    let layout = OverlayLayout::compute(
        Size::new(frame.cols(), frame.rows()),
        vehicle,
        Size::new(thumb.cols(), thumb.rows()),
    )?;

    let mut base_line = 0;
    let text_size = imgproc::get_text_size(
        text,
        FONT,
        layout.font_scale,
        layout.thickness,
        &mut base_line,
    )?;

    let mut roi = Mat::roi(frame, layout.thumbnail)?;
    thumb.copy_to(&mut roi)?;

    imgproc::rectangle(
        frame,
        layout.band,
        config.band_color.into(),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;

    let origin = Point::new(
        layout.band.x + (layout.band.width - text_size.width) / 2,
        layout.band.y + (layout.band.height + text_size.height) / 2,
    );

    imgproc::put_text(
        frame,
        text,
        origin,
        FONT,
        layout.font_scale,
        config.text_color.into(),
        layout.thickness,
        imgproc::LINE_AA,
        false,
    )?;

    Ok(layout)
}

pub struct PlateThumbnail {
    pub image: Mat,
    pub text: String,
}

pub type Thumbnails = HashMap<TrackId, PlateThumbnail>;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlacement {
    pub frame_number: u32,
    pub track_id: TrackId,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderSummary {
    pub frames: u32,
    pub boxes: usize,
    pub labels: Vec<LabelPlacement>,
    pub skipped_overlays: usize,
}

/// Rendered still image: `processed` has borders only, `annotated` also carries
/// the plate overlays.
pub struct StillRender {
    pub processed: Mat,
    pub annotated: Mat,
    pub summary: RenderSummary,
}

pub struct OverlayRenderer {
    config: RenderConfig,
}

impl OverlayRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Captures thumbnails for every best reading made on `frame_number`.
    fn capture_on_frame(
        &self,
        frame: &Mat,
        wanted: &[(TrackId, &DetectionRow)],
        thumbs: &mut Thumbnails,
        summary: &mut RenderSummary,
    ) {
        for &(track_id, row) in wanted {
            let text = match &row.plate_text {
                Some(text) => text.clone(),
                None => continue,
            };

            match capture_thumbnail(frame, &row.plate_bbox, self.config.thumbnail_ratio) {
                Ok(image) => {
                    thumbs.insert(track_id, PlateThumbnail { image, text });
                }
                Err(err) => {
                    warn!(
                        "plate crop for track {} on frame {} failed: {}",
                        track_id, row.frame_number, err
                    );
                    summary.skipped_overlays += 1;
                }
            }
        }
    }

    /// First pass: walks the source once and collects the plate thumbnail of
    /// every track's best reading.
    pub fn capture_thumbnails(
        &self,
        source: &mut dyn FrameSource,
        best: &BestReadings,
        summary: &mut RenderSummary,
    ) -> Result<Thumbnails, Error> {
        let mut wanted: BTreeMap<u32, Vec<(TrackId, &DetectionRow)>> = BTreeMap::new();
        for (track_id, row) in best.iter() {
            wanted
                .entry(row.frame_number)
                .or_default()
                .push((track_id, row));
        }

        let mut thumbs = Thumbnails::new();
        let last = match wanted.keys().next_back() {
            Some(&last) => last,
            None => return Ok(thumbs),
        };

        let mut frame_number = 0u32;
        while let Some(frame) = source.read_frame()? {
            if let Some(rows) = wanted.get(&frame_number) {
                self.capture_on_frame(&frame, rows, &mut thumbs, summary);
            }

            if frame_number == last {
                break;
            }
            frame_number += 1;
        }

        Ok(thumbs)
    }

    pub fn draw_boxes(
        &self,
        frame: &mut Mat,
        frame_number: u32,
        table: &DenseTable,
        summary: &mut RenderSummary,
    ) -> Result<(), Error> {
        let thickness = border_thickness(frame.rows(), self.config.thumbnail_ratio);

        for row in table.rows_for_frame(frame_number) {
            draw_border(frame, &row.vehicle_bbox, self.config.vehicle_color.into(), thickness)?;
            draw_border(frame, &row.plate_bbox, self.config.plate_color.into(), thickness)?;
            summary.boxes += 1;
        }

        Ok(())
    }

    /// Adds the plate overlay of every track whose best reading was made on
    /// `frame_number`. A failing overlay is logged and skipped.
    pub fn draw_overlays(
        &self,
        frame: &mut Mat,
        frame_number: u32,
        table: &DenseTable,
        best: &BestReadings,
        thumbs: &Thumbnails,
        summary: &mut RenderSummary,
    ) {
        for row in table.rows_for_frame(frame_number) {
            if !best.is_key_frame(row.track_id, frame_number) {
                continue;
            }

            let thumb = match thumbs.get(&row.track_id) {
                Some(thumb) => thumb,
                None => {
                    debug!("no thumbnail for track {}", row.track_id);
                    continue;
                }
            };

            match add_overlay(frame, &row.vehicle_bbox, &thumb.image, &thumb.text, &self.config) {
                Ok(_) => summary.labels.push(LabelPlacement {
                    frame_number,
                    track_id: row.track_id,
                    text: thumb.text.clone(),
                }),
                Err(err) => {
                    warn!(
                        "overlay for track {} on frame {} skipped: {}",
                        row.track_id, frame_number, err
                    );
                    summary.skipped_overlays += 1;
                }
            }
        }
    }

    /// Two passes over `source`: thumbnails first, then every frame annotated
    /// and written to `sink` in order.
    pub fn render_video(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        table: &DenseTable,
        best: &BestReadings,
    ) -> Result<RenderSummary, Error> {
        let mut summary = RenderSummary::default();

        source.rewind()?;
        let thumbs = self.capture_thumbnails(source, best, &mut summary)?;
        source.rewind()?;

        let mut frame_number = 0u32;
        while let Some(mut frame) = source.read_frame()? {
            self.draw_boxes(&mut frame, frame_number, table, &mut summary)?;
            self.draw_overlays(&mut frame, frame_number, table, best, &thumbs, &mut summary);
            sink.write_frame(&frame)?;

            frame_number += 1;
        }

        summary.frames = frame_number;
        debug!(
            "rendered {} frames, {} labels, {} overlays skipped",
            summary.frames,
            summary.labels.len(),
            summary.skipped_overlays
        );

        Ok(summary)
    }

    pub fn render_still(
        &self,
        frame: &Mat,
        table: &DenseTable,
        best: &BestReadings,
    ) -> Result<StillRender, Error> {
        let mut summary = RenderSummary {
            frames: 1,
            ..Default::default()
        };

        let wanted: Vec<(TrackId, &DetectionRow)> = best
            .iter()
            .filter(|(_, row)| row.frame_number == 0)
            .collect();
        let mut thumbs = Thumbnails::new();
        self.capture_on_frame(frame, &wanted, &mut thumbs, &mut summary);

        let mut processed = frame.try_clone()?;
        self.draw_boxes(&mut processed, 0, table, &mut summary)?;

        let mut annotated = processed.try_clone()?;
        self.draw_overlays(&mut annotated, 0, table, best, &thumbs, &mut summary);

        Ok(StillRender {
            processed,
            annotated,
            summary,
        })
    }
}
