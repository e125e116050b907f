use std::collections::BTreeMap;

use crate::store::DetectionRow;
use crate::track::TrackId;

/// Highest-confidence reading of every track that has at least one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BestReadings(BTreeMap<TrackId, DetectionRow>);

impl BestReadings {
    #[inline]
    pub fn get(&self, track_id: TrackId) -> Option<&DetectionRow> {
        self.0.get(&track_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &DetectionRow)> + '_ {
        self.0.iter().map(|(&id, row)| (id, row))
    }

    /// Frame on which the best reading of `track_id` was made.
    #[inline]
    pub fn key_frame(&self, track_id: TrackId) -> Option<u32> {
        self.0.get(&track_id).map(|r| r.frame_number)
    }

    #[inline]
    pub fn is_key_frame(&self, track_id: TrackId, frame_number: u32) -> bool {
        self.key_frame(track_id) == Some(frame_number)
    }
}

/// Picks, per track, the row with the maximum text score. Rows without text
/// never compete. Equal scores resolve to the earlier frame, independent of
/// the order rows are given in.
pub fn select_best<'a, I>(rows: I) -> BestReadings
where
    I: IntoIterator<Item = &'a DetectionRow>,
{
    let mut best: BTreeMap<TrackId, DetectionRow> = BTreeMap::new();

    for row in rows {
        let score = match row.reading() {
            Some((_, score)) => score,
            None => continue,
        };

        match best.get(&row.track_id) {
            Some(curr) => {
                let curr_score = curr.plate_text_score.unwrap_or(f32::NEG_INFINITY);
                if score > curr_score
                    || (score == curr_score && row.frame_number < curr.frame_number)
                {
                    best.insert(row.track_id, row.clone());
                }
            }
            None => {
                best.insert(row.track_id, row.clone());
            }
        }
    }

    BestReadings(best)
}
