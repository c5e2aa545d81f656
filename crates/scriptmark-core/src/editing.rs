//! Pointer-driven mark editing: hit-testing a press against the marks on a
//! page and turning it into an add, modify or remove.
//!
//! A press either lands on an existing mark, which is pulled out of the page
//! list and edited or dropped, or on an empty spot, where the configured
//! [`InputMapping`](crate::config::InputMapping) decides what to create. The
//! caller re-tallies and persists after every outcome other than
//! [`EditOutcome::Unchanged`].

use tracing::debug;

use crate::candidate::toggle_strike;
use crate::config::{PointerButton, PressAction, SessionConfig};
use crate::models::{Mark, MarkKind, PageMarks};

/// A pointer press in page-pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Press {
    pub x: i32,
    pub y: i32,
    pub button: PointerButton,
    pub shift: bool,
}

impl Press {
    pub fn new(x: i32, y: i32, button: PointerButton) -> Self {
        Self {
            x,
            y,
            button,
            shift: false,
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// What a press did to the page.
#[derive(Clone, Debug, PartialEq)]
pub enum EditOutcome {
    Added(Mark),
    Modified { before: Mark, after: Mark },
    Removed(Mark),
    StrikeToggled { struck: bool },
    Unchanged,
}

impl EditOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, EditOutcome::Unchanged)
    }
}

/// Whether `(x, y)` falls inside the mark's hit region.
///
/// Strikes are never hit. Circles use `h / 2` as the radius; strokes are hit
/// within `touch_radius` of any vertex. Everything else uses the box the mark
/// is drawn in: `w` wide, `h` tall.
pub fn hits(mark: &Mark, x: f64, y: f64, touch_radius: f64) -> bool {
    let dx = f64::from(mark.x) - x;
    let dy = f64::from(mark.y) - y;
    match mark.kind {
        MarkKind::Strike => false,
        MarkKind::Circle => {
            let r = f64::from(mark.h) / 2.0;
            dx * dx + dy * dy <= r * r
        }
        MarkKind::Touch => mark
            .stroke_points
            .iter()
            .any(|p| p.distance_squared(x, y) <= touch_radius * touch_radius),
        MarkKind::Score
        | MarkKind::Tally
        | MarkKind::Justify
        | MarkKind::LeftArrow
        | MarkKind::RightArrow => {
            dx.abs() < f64::from(mark.w) / 2.0 && dy.abs() < f64::from(mark.h) / 2.0
        }
    }
}

/// Remove and return the first mark, in list order, hit by `(x, y)`.
pub fn extract_mark_at(marks: &mut PageMarks, x: f64, y: f64, touch_radius: f64) -> Option<Mark> {
    let idx = marks
        .iter()
        .position(|mark| hits(mark, x, y, touch_radius))?;
    Some(marks.remove(idx))
}

/// Sizes of newly created marks, all derived from the margin width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkSizes {
    pub score: (i32, i32),
    pub circle: (i32, i32),
    pub justify: (i32, i32),
    pub arrow: (i32, i32),
}

impl MarkSizes {
    pub fn for_margin(margin_x: i32) -> Self {
        let scale = f64::from(margin_x);
        let size = |w: f64, h: f64| (w as i32, h as i32);
        Self {
            score: size(scale / 3.0 * 1.25, scale / 3.0),
            circle: size(scale / 3.0, scale / 3.0),
            justify: size(scale / 2.0, scale / 3.5),
            arrow: size(scale / 2.0, scale / 3.0),
        }
    }
}

/// Applies presses to a page under one configuration.
pub struct Editor<'a> {
    config: &'a SessionConfig,
    sizes: MarkSizes,
    /// The margin region only exists while a mark scheme is loaded.
    margin_enabled: bool,
}

impl<'a> Editor<'a> {
    pub fn new(config: &'a SessionConfig, margin_enabled: bool) -> Self {
        Self {
            config,
            sizes: MarkSizes::for_margin(config.margin_x),
            margin_enabled,
        }
    }

    pub fn in_margin(&self, x: i32) -> bool {
        self.margin_enabled && x <= self.config.margin_x
    }

    /// Apply one press to a page's marks.
    pub fn apply(&self, marks: &mut PageMarks, press: Press) -> EditOutcome {
        let in_margin = self.in_margin(press.x);
        // Margin marks line up in the middle of the margin.
        let x = if in_margin {
            self.config.margin_x / 2
        } else {
            press.x
        };
        let y = press.y;

        let outcome = match extract_mark_at(
            marks,
            f64::from(x),
            f64::from(y),
            self.config.touch_hit_radius,
        ) {
            None => self.create(marks, in_margin, x, y, press),
            Some(old) => match self.edit(&old, in_margin, x, y, press) {
                Some(new) => {
                    marks.push(new.clone());
                    if new == old {
                        EditOutcome::Unchanged
                    } else {
                        EditOutcome::Modified {
                            before: old,
                            after: new,
                        }
                    }
                }
                None => EditOutcome::Removed(old),
            },
        };

        match &outcome {
            EditOutcome::Added(mark) => debug!("Added mark: {mark}"),
            EditOutcome::Modified { before, after } => {
                debug!("Modified mark: {before} -> {after}")
            }
            EditOutcome::Removed(mark) => debug!("Removed mark: {mark}"),
            EditOutcome::StrikeToggled { struck } => debug!("Strike toggled, state={struck}"),
            EditOutcome::Unchanged => {}
        }
        outcome
    }

    fn create(
        &self,
        marks: &mut PageMarks,
        in_margin: bool,
        x: i32,
        y: i32,
        press: Press,
    ) -> EditOutcome {
        let mapping = if in_margin {
            &self.config.input.margin
        } else {
            &self.config.input.body
        };
        let (sw, sh) = self.sizes.score;
        let (aw, ah) = self.sizes.arrow;
        let mark = match mapping.action(press.button) {
            PressAction::Score { value, shift_value } => {
                let value = if press.shift { shift_value } else { value };
                Mark::score(x, y, sw, sh, value)
            }
            PressAction::Tally => Mark::tally(x, y, sw, sh),
            PressAction::Circle => {
                let (w, h) = self.sizes.circle;
                Mark::circle(x, y, w, h)
            }
            PressAction::Justify => {
                let (w, h) = self.sizes.justify;
                Mark::justify(x, y, w, h)
            }
            PressAction::LeftArrow => Mark::left_arrow(x, y, aw, ah),
            PressAction::RightArrow => Mark::right_arrow(x, y, aw, ah),
            PressAction::ToggleStrike => {
                return EditOutcome::StrikeToggled {
                    struck: toggle_strike(marks),
                }
            }
            PressAction::Nothing => return EditOutcome::Unchanged,
        };
        marks.push(mark.clone());
        EditOutcome::Added(mark)
    }

    /// The replacement for a hit mark, or `None` to drop it.
    fn edit(&self, old: &Mark, in_margin: bool, x: i32, y: i32, press: Press) -> Option<Mark> {
        let input = &self.config.input;
        let mut mark = old.clone();
        match mark.kind {
            MarkKind::Score if in_margin => {
                let step = if press.shift { self.config.bulk_step } else { 1 };
                if press.button == input.increase {
                    mark.score = Some(mark.score_value() + step);
                } else if press.button == input.decrease {
                    let value = mark.score_value() - step;
                    if value < 0 {
                        return None;
                    }
                    mark.score = Some(value);
                }
                Some(mark)
            }
            MarkKind::Circle => {
                let scale = self.config.circle_scale.max(1);
                if press.button == input.increase {
                    let max = self.config.circle_max_size;
                    let grown = mark.w.checked_mul(scale).zip(mark.h.checked_mul(scale));
                    if let Some((w, h)) = grown.filter(|&(w, h)| w <= max && h <= max) {
                        mark.w = w;
                        mark.h = h;
                    }
                } else if press.button == input.decrease {
                    mark.w /= scale;
                    mark.h /= scale;
                    let min = self.config.circle_min_size;
                    if mark.w <= min || mark.h <= min {
                        return None;
                    }
                }
                Some(mark)
            }
            MarkKind::LeftArrow if press.button == input.flip => {
                let (w, h) = self.sizes.arrow;
                Some(Mark::right_arrow(x, y, w, h))
            }
            MarkKind::RightArrow if press.button == input.flip => {
                let (w, h) = self.sizes.arrow;
                Some(Mark::left_arrow(x, y, w, h))
            }
            _ => None,
        }
    }
}
