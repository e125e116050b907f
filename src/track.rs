use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::store::DetectionRow;

/// Identity assigned by the tracker to one vehicle across frames.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl TrackId {
    /// A plate that could not be matched to any tracked vehicle.
    pub const UNASSIGNED: TrackId = TrackId(-1);

    #[inline]
    pub fn is_assigned(&self) -> bool {
        *self != Self::UNASSIGNED
    }
}

impl From<i64> for TrackId {
    fn from(v: i64) -> Self {
        TrackId(v)
    }
}

impl From<i32> for TrackId {
    fn from(v: i32) -> Self {
        TrackId(v as i64)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rows of a single track, ordered by frame number.
#[derive(Debug, Clone)]
pub struct Track<'a> {
    pub track_id: TrackId,
    pub rows: Vec<&'a DetectionRow>,
}

impl<'a> Track<'a> {
    #[inline]
    pub fn first_frame(&self) -> Option<u32> {
        self.rows.first().map(|r| r.frame_number)
    }

    #[inline]
    pub fn last_frame(&self) -> Option<u32> {
        self.rows.last().map(|r| r.frame_number)
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
    pub fn iter(&self) -> impl Iterator<Item = &'a DetectionRow> + '_ {
        self.rows.iter().copied()
    }
}
