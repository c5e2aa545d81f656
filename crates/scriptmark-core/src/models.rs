//! Annotation values placed on scanned pages.
//!
//! A [`Mark`] is a plain value: it has no identity beyond its fields and its
//! position in the page list that holds it.

use serde::{Deserialize, Serialize};

use crate::errors::{MarkingError, MarkingResult};

/// Position/size sentinel for marks that have no location on the page.
pub const NO_POSITION: i32 = -1;

/// The kinds of mark a grader can place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkKind {
    /// Page acknowledged as reviewed. Position-less.
    Strike,
    /// A part score in the margin.
    Score,
    /// Closes a question and holds the sum of the part scores before it.
    Tally,
    Circle,
    Justify,
    LeftArrow,
    RightArrow,
    /// Freehand ink stroke.
    Touch,
}

impl MarkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkKind::Strike => "strike",
            MarkKind::Score => "score",
            MarkKind::Tally => "tally",
            MarkKind::Circle => "circle",
            MarkKind::Justify => "justify",
            MarkKind::LeftArrow => "leftarrow",
            MarkKind::RightArrow => "rightarrow",
            MarkKind::Touch => "touch",
        }
    }
}

impl std::fmt::Display for MarkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point of a freehand stroke in page-pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}

/// One annotation on a page.
///
/// `x`/`y` is the centre of the mark and `w`/`h` its bounding box, all in
/// page-pixel space. `stroke_points` is non-empty exactly when `kind` is
/// [`MarkKind::Touch`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub kind: MarkKind,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stroke_points: Vec<StrokePoint>,
}

impl Mark {
    fn placed(kind: MarkKind, x: i32, y: i32, w: i32, h: i32, score: Option<i64>) -> Self {
        Self {
            kind,
            x,
            y,
            w,
            h,
            score,
            stroke_points: Vec::new(),
        }
    }

    pub fn strike() -> Self {
        Self::placed(
            MarkKind::Strike,
            NO_POSITION,
            NO_POSITION,
            NO_POSITION,
            NO_POSITION,
            None,
        )
    }

    pub fn score(x: i32, y: i32, w: i32, h: i32, value: i64) -> Self {
        Self::placed(MarkKind::Score, x, y, w, h, Some(value))
    }

    /// A tally point. Its score is filled in by the next tally pass.
    pub fn tally(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::placed(MarkKind::Tally, x, y, w, h, Some(-1))
    }

    pub fn circle(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::placed(MarkKind::Circle, x, y, w, h, None)
    }

    pub fn justify(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::placed(MarkKind::Justify, x, y, w, h, None)
    }

    pub fn left_arrow(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::placed(MarkKind::LeftArrow, x, y, w, h, None)
    }

    pub fn right_arrow(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::placed(MarkKind::RightArrow, x, y, w, h, None)
    }

    /// A freehand stroke. Fails when `points` is empty.
    pub fn touch(points: Vec<StrokePoint>) -> MarkingResult<Self> {
        if points.is_empty() {
            return Err(MarkingError::InvalidMark(
                "touch mark needs at least one stroke point".to_string(),
            ));
        }
        Ok(Self {
            kind: MarkKind::Touch,
            x: NO_POSITION,
            y: NO_POSITION,
            w: NO_POSITION,
            h: NO_POSITION,
            score: None,
            stroke_points: points,
        })
    }

    /// Score value, treating a missing score as zero.
    pub fn score_value(&self) -> i64 {
        self.score.unwrap_or(0)
    }

    /// Check the stroke-point invariant.
    pub fn validate(&self) -> MarkingResult<()> {
        let is_touch = self.kind == MarkKind::Touch;
        if is_touch == self.stroke_points.is_empty() {
            return Err(MarkingError::InvalidMark(format!(
                "{} mark has {} stroke points",
                self.kind,
                self.stroke_points.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "kind:{} x:{} y:{} h:{} w:{} score:{:?}",
            self.kind, self.x, self.y, self.h, self.w, self.score
        )
    }
}

/// The marks on one page. Order is not meaningful until a tally pass sorts it.
pub type PageMarks = Vec<Mark>;
