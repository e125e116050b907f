use crate::bbox::BBox;
use crate::detection::TrackedBox;
use crate::track::TrackId;

/// First tracked vehicle, in tracker output order, whose box fully contains
/// the plate box.
pub fn associate<'a>(plate: &BBox, tracks: &'a [TrackedBox]) -> Option<&'a TrackedBox> {
    tracks.iter().find(|t| t.bbox.contains(plate))
}

/// Same as [`associate`] but returns the sentinel `(-1, -1, -1, -1, -1)`
/// box when no tracked vehicle contains the plate.
pub fn get_vehicle(plate: &BBox, tracks: &[TrackedBox]) -> TrackedBox {
    associate(plate, tracks)
        .copied()
        .unwrap_or_else(TrackedBox::unassigned)
}

impl TrackedBox {
    #[inline]
    pub fn unassigned() -> Self {
        TrackedBox {
            bbox: BBox::ltrb(-1.0, -1.0, -1.0, -1.0),
            track_id: TrackId::UNASSIGNED,
        }
    }
}
