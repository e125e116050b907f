//! Gap filling between the observed frames of every track.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

use log::debug;

use crate::error::Error;
use crate::store::{read_rows, write_rows, DetectionRow, DetectionStore};
use crate::track::{Track, TrackId};

/// Per-track, per-frame table: one row for every frame between the first and
/// the last observation of a track. Rows are grouped by track id (ascending)
/// and ordered by frame inside a group.
#[derive(Debug, Clone, Default)]
pub struct DenseTable {
    rows: Vec<DetectionRow>,
    spans: BTreeMap<TrackId, Range<usize>>,
    by_frame: BTreeMap<u32, Vec<usize>>,
}

impl DenseTable {
    fn from_grouped(rows: Vec<DetectionRow>) -> Self {
        let mut spans: BTreeMap<TrackId, Range<usize>> = BTreeMap::new();
        let mut by_frame: BTreeMap<u32, Vec<usize>> = BTreeMap::new();

        for (idx, row) in rows.iter().enumerate() {
            spans
                .entry(row.track_id)
                .and_modify(|r| r.end = idx + 1)
                .or_insert(idx..idx + 1);
            by_frame.entry(row.frame_number).or_default().push(idx);
        }

        Self {
            rows,
            spans,
            by_frame,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn rows(&self) -> &[DetectionRow] {
        &self.rows
    }

    pub fn track(&self, track_id: TrackId) -> Option<Track<'_>> {
        let span = self.spans.get(&track_id)?;

        Some(Track {
            track_id,
            rows: self.rows[span.clone()].iter().collect(),
        })
    }

    pub fn tracks(&self) -> impl Iterator<Item = Track<'_>> + '_ {
        self.spans.iter().map(move |(&track_id, span)| Track {
            track_id,
            rows: self.rows[span.clone()].iter().collect(),
        })
    }

    /// Rows to draw on `frame_number`, in track id order.
    pub fn rows_for_frame(&self, frame_number: u32) -> impl Iterator<Item = &DetectionRow> + '_ {
        self.by_frame
            .get(&frame_number)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.rows[idx])
    }

    pub fn frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_frame.keys().copied()
    }

    pub fn write_report<W: Write>(&self, writer: W) -> Result<(), Error> {
        write_rows(writer, self.rows.iter())
    }

    /// Loads an already interpolated report. The interpolated flag is not
    /// persisted, so every loaded row reads as observed.
    pub fn read_report<R: Read>(reader: R) -> Result<Self, Error> {
        let mut rows = read_rows(reader)?;
        rows.sort_by_key(|r| (r.track_id, r.frame_number));

        Ok(Self::from_grouped(rows))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        self.write_report(File::create(path)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::read_report(File::open(path)?)
    }
}

/// Builds the dense table from the store. Box coordinates of missing frames are
/// linearly interpolated between the two surrounding observations; text and
/// scores are carried forward from the preceding observation.
pub fn interpolate(store: &DetectionStore) -> DenseTable {
    let mut rows = Vec::with_capacity(store.len());

    for track in store.tracks() {
        fill_track(&track, &mut rows);
    }

    DenseTable::from_grouped(rows)
}

fn fill_track(track: &Track<'_>, out: &mut Vec<DetectionRow>) {
    let mut prev: Option<&DetectionRow> = None;

    for &curr in &track.rows {
        if let Some(prev) = prev {
            if curr.frame_number == prev.frame_number {
                debug!(
                    "track {}: duplicate observation at frame {}, keeping the first",
                    track.track_id, curr.frame_number
                );
                continue;
            }

            let (f0, f1) = (prev.frame_number, curr.frame_number);
            for f in f0 + 1..f1 {
                out.push(DetectionRow {
                    frame_number: f,
                    track_id: track.track_id,
                    vehicle_bbox: prev.vehicle_bbox.interpolate(f0, &curr.vehicle_bbox, f1, f),
                    plate_bbox: prev.plate_bbox.interpolate(f0, &curr.plate_bbox, f1, f),
                    plate_bbox_score: prev.plate_bbox_score,
                    plate_text: prev.plate_text.clone(),
                    plate_text_score: prev.plate_text_score,
                    interpolated: true,
                });
            }
        }

        out.push(curr.clone());
        prev = Some(curr);
    }
}

/// Standalone gap-filling stage: results report in, interpolated report out.
pub fn interpolate_report<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<DenseTable, Error> {
    let store = DetectionStore::load(input)?;
    let table = interpolate(&store);
    table.save(output)?;

    Ok(table)
}
