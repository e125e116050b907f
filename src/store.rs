//! Frame-indexed table of per-track plate observations and its delimited report form.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::bbox::{report_format, BBox};
use crate::error::Error;
use crate::track::{Track, TrackId};

/// One observed or interpolated per-frame, per-track record.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRow {
    pub frame_number: u32,
    pub track_id: TrackId,
    pub vehicle_bbox: BBox,
    pub plate_bbox: BBox,
    pub plate_bbox_score: f32,
    pub plate_text: Option<String>,
    pub plate_text_score: Option<f32>,
    /// Synthesized by the gap interpolator rather than observed. Not persisted.
    pub interpolated: bool,
}

impl DetectionRow {
    /// The text and its score, if this row carries a reading.
    #[inline]
    pub fn reading(&self) -> Option<(&str, f32)> {
        match (&self.plate_text, self.plate_text_score) {
            (Some(text), Some(score)) => Some((text.as_str(), score)),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if !self.vehicle_bbox.is_valid() {
            return Err(Error::InvalidBBox(
                self.vehicle_bbox.to_string(),
                "vehicle box is degenerate",
            ));
        }

        if !self.plate_bbox.is_valid() {
            return Err(Error::InvalidBBox(
                self.plate_bbox.to_string(),
                "plate box is degenerate",
            ));
        }

        Ok(())
    }
}

/// Append-only store; rows live in one arena and every track keeps an
/// index list into it sorted by frame number.
#[derive(Debug, Clone, Default)]
pub struct DetectionStore {
    rows: Vec<DetectionRow>,
    tracks: BTreeMap<TrackId, Vec<usize>>,
}

impl DetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: DetectionRow) -> Result<(), Error> {
        row.validate()?;

        let idx = self.rows.len();
        let frame = row.frame_number;
        let index = self.tracks.entry(row.track_id).or_default();
        self.rows.push(row);

        // rows normally arrive in frame order, keep the index sorted when they don't
        let rows = &self.rows;
        let pos = index.partition_point(|&i| rows[i].frame_number <= frame);
        index.insert(pos, idx);

        Ok(())
    }

    /// Appends a whole batch, or nothing if any row is invalid.
    pub fn extend_checked(&mut self, rows: Vec<DetectionRow>) -> Result<usize, Error> {
        for row in &rows {
            row.validate()?;
        }

        let count = rows.len();
        for row in rows {
            self.push(row)?;
        }

        Ok(count)
    }

    pub fn from_rows<I: IntoIterator<Item = DetectionRow>>(rows: I) -> Result<Self, Error> {
        let mut store = Self::new();
        for row in rows {
            store.push(row)?;
        }

        Ok(store)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in insertion order.
    #[inline]
    pub fn rows(&self) -> &[DetectionRow] {
        &self.rows
    }

    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.keys().copied()
    }

    pub fn track(&self, track_id: TrackId) -> Option<Track<'_>> {
        let index = self.tracks.get(&track_id)?;

        Some(Track {
            track_id,
            rows: index.iter().map(|&i| &self.rows[i]).collect(),
        })
    }

    /// Tracks in ascending id order.
    pub fn tracks(&self) -> impl Iterator<Item = Track<'_>> + '_ {
        self.tracks.iter().map(move |(&track_id, index)| Track {
            track_id,
            rows: index.iter().map(|&i| &self.rows[i]).collect(),
        })
    }

    pub fn frame_rows(&self, frame_number: u32) -> impl Iterator<Item = &DetectionRow> + '_ {
        self.rows
            .iter()
            .filter(move |r| r.frame_number == frame_number)
    }

    pub fn write_report<W: Write>(&self, writer: W) -> Result<(), Error> {
        write_rows(writer, self.rows.iter())
    }

    pub fn read_report<R: Read>(reader: R) -> Result<Self, Error> {
        Self::from_rows(read_rows(reader)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        self.write_report(File::create(path)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::read_report(File::open(path)?)
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct ReportRecord {
    frame_number: u32,
    car_id: TrackId,
    #[serde(with = "report_format")]
    car_bbox: BBox,
    #[serde(with = "report_format")]
    license_plate_bbox: BBox,
    license_plate_bbox_score: f32,
    license_number: Option<String>,
    license_number_score: Option<f32>,
}

impl From<&DetectionRow> for ReportRecord {
    fn from(row: &DetectionRow) -> Self {
        Self {
            frame_number: row.frame_number,
            car_id: row.track_id,
            car_bbox: row.vehicle_bbox,
            license_plate_bbox: row.plate_bbox,
            license_plate_bbox_score: row.plate_bbox_score,
            license_number: row.plate_text.clone(),
            license_number_score: row.plate_text_score,
        }
    }
}

impl From<ReportRecord> for DetectionRow {
    fn from(rec: ReportRecord) -> Self {
        let plate_text = rec.license_number.filter(|t| !t.is_empty());
        let plate_text_score = plate_text.as_ref().and(rec.license_number_score);

        Self {
            frame_number: rec.frame_number,
            track_id: rec.car_id,
            vehicle_bbox: rec.car_bbox,
            plate_bbox: rec.license_plate_bbox,
            plate_bbox_score: rec.license_plate_bbox_score,
            plate_text,
            plate_text_score,
            interpolated: false,
        }
    }
}

pub(crate) fn write_rows<'a, W, I>(writer: W, rows: I) -> Result<(), Error>
where
    W: Write,
    I: Iterator<Item = &'a DetectionRow>,
{
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    // the header must be present even for an empty report
    wtr.write_record([
        "frame_number",
        "car_id",
        "car_bbox",
        "license_plate_bbox",
        "license_plate_bbox_score",
        "license_number",
        "license_number_score",
    ])?;

    for row in rows {
        wtr.serialize(ReportRecord::from(row))?;
    }

    wtr.flush()?;

    Ok(())
}

pub(crate) fn read_rows<R: Read>(reader: R) -> Result<Vec<DetectionRow>, Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    rdr.deserialize::<ReportRecord>()
        .map(|rec| rec.map(DetectionRow::from).map_err(Error::from))
        .collect()
}
