use std::fmt;
use std::str::FromStr;

use nalgebra as na;
use opencv::core::Rect;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Left-top-right-bottom box in pixel coordinates
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct BBox([f32; 4]);

impl From<BBox> for [f32; 4] {
    fn from(bbox: BBox) -> Self {
        bbox.0
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        BBox(v)
    }
}

impl BBox {
    #[inline]
    pub fn ltrb(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        BBox([x1, y1, x2, y2])
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2] - self.0[0]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3] - self.0[1]
    }

    #[inline]
    pub fn center_x(&self) -> f32 {
        (self.0[0] + self.0[2]) / 2.0
    }

    /// `x1 < x2 && y1 < y2`, and every coordinate is finite.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|v| v.is_finite()) && self.0[0] < self.0[2] && self.0[1] < self.0[3]
    }

    /// Non-strict containment: the edges of `inner` may touch the edges of `self`.
    pub fn contains(&self, inner: &BBox) -> bool {
        self.left() <= inner.left()
            && self.top() <= inner.top()
            && self.right() >= inner.right()
            && self.bottom() >= inner.bottom()
    }

    /// Component-wise linear interpolation between the box observed at frame `f0`
    /// and `other` observed at frame `f1`, evaluated at frame `f`.
    pub fn interpolate(&self, f0: u32, other: &BBox, f1: u32, f: u32) -> BBox {
        if f1 == f0 {
            return *self;
        }

        let v0 = na::Vector4::from(self.0);
        let v1 = na::Vector4::from(other.0);
        let num = f as f32 - f0 as f32;
        let den = f1 as f32 - f0 as f32;
        let v = v0 + (v1 - v0) * num / den;

        BBox([v[0], v[1], v[2], v[3]])
    }

    /// Integer pixel rect covering the box, truncated like array slicing does.
    /// `None` if it does not lie completely inside a `width`x`height` frame or is empty.
    pub fn to_rect_within(&self, width: i32, height: i32) -> Option<Rect> {
        if !self.0.iter().all(|v| v.is_finite()) {
            return None;
        }

        let (x1, y1) = (self.left() as i32, self.top() as i32);
        let (x2, y2) = (self.right() as i32, self.bottom() as i32);

        if x1 < 0 || y1 < 0 || x2 > width || y2 > height || x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    #[inline]
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.left() as i32,
            self.top() as i32,
            self.width() as i32,
            self.height() as i32,
        )
    }
}

/// Serialized as `[x1 y1 x2 y2]`, the form stored in the report.
impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {} {}]", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// Accepts the report form and its common variants: `[x1 y1 x2 y2]`,
/// `[ x1   y1 x2 y2 ]`, `(x1, y1, x2, y2)` or a bare `x1,y1,x2,y2`.
impl FromStr for BBox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = match (trimmed.chars().next(), trimmed.chars().last()) {
            (Some('['), Some(']')) | (Some('('), Some(')')) => &trimmed[1..trimmed.len() - 1],
            _ => trimmed,
        };

        let mut coords = [0.0f32; 4];
        let mut count = 0;

        for token in inner
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            if count == 4 {
                return Err(Error::InvalidBBox(s.to_string(), "more than 4 coordinates"));
            }

            coords[count] = token
                .parse()
                .map_err(|_| Error::InvalidBBox(s.to_string(), "coordinate is not a number"))?;
            count += 1;
        }

        if count != 4 {
            return Err(Error::InvalidBBox(s.to_string(), "expected 4 coordinates"));
        }

        Ok(BBox(coords))
    }
}

pub(crate) mod report_format {
    use super::BBox;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bbox: &BBox, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(bbox)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BBox, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse_report_forms() {
        let expected = BBox::ltrb(1.5, 2.0, 30.25, 40.0);

        assert_eq!("[1.5 2 30.25 40]".parse::<BBox>().unwrap(), expected);
        assert_eq!("[ 1.5   2  30.25 40 ]".parse::<BBox>().unwrap(), expected);
        assert_eq!("(1.5, 2, 30.25, 40)".parse::<BBox>().unwrap(), expected);
        assert_eq!("1.5,2,30.25,40".parse::<BBox>().unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("[1 2 3]".parse::<BBox>().is_err());
        assert!("[1 2 3 4 5]".parse::<BBox>().is_err());
        assert!("[1 2 x 4]".parse::<BBox>().is_err());
        assert!("".parse::<BBox>().is_err());
    }

    #[test]
    fn test_format_parse_round_trip() {
        let bbox = BBox::ltrb(1385.3721, 624.1162, 1672.0079, 841.55707);
        let parsed: BBox = bbox.to_string().parse().unwrap();

        for (a, b) in bbox.as_slice().iter().zip(parsed.as_slice()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_contains_is_inclusive() {
        let car = BBox::ltrb(0.0, 0.0, 100.0, 100.0);

        assert!(car.contains(&BBox::ltrb(10.0, 10.0, 20.0, 20.0)));
        assert!(car.contains(&BBox::ltrb(0.0, 0.0, 100.0, 100.0)));
        assert!(!car.contains(&BBox::ltrb(90.0, 90.0, 110.0, 95.0)));
        assert!(!car.contains(&BBox::ltrb(200.0, 200.0, 210.0, 210.0)));
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = BBox::ltrb(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltrb(10.0, 10.0, 20.0, 20.0);

        assert_eq!(a.interpolate(0, &b, 10, 5), BBox::ltrb(5.0, 5.0, 15.0, 15.0));
        assert_eq!(a.interpolate(0, &b, 10, 0), a);
        assert_eq!(a.interpolate(0, &b, 10, 10), b);
    }

    #[test]
    fn test_rect_within_frame() {
        let bbox = BBox::ltrb(10.7, 20.2, 50.9, 40.0);
        assert_eq!(bbox.to_rect_within(100, 100), Some(Rect::new(10, 20, 40, 20)));
        assert_eq!(bbox.to_rect_within(45, 100), None);
        assert_eq!(BBox::ltrb(-1.0, 0.0, 5.0, 5.0).to_rect_within(100, 100), None);
        assert_eq!(BBox::ltrb(5.0, 5.0, 5.5, 9.0).to_rect_within(100, 100), None);
    }

    #[test]
    fn test_validity() {
        assert!(BBox::ltrb(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!BBox::ltrb(1.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!BBox::ltrb(0.0, f32::NAN, 1.0, 1.0).is_valid());
    }
}
