//! Session configuration: marking directories, mark geometry and the
//! pointer-button mapping.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::MarkingResult;

/// Directory under the scripts directory holding per-candidate page images
/// and the mark store.
pub const INTERNAL_DIR_NAME: &str = "_scriptmark-internal";
pub const STORE_FILE_NAME: &str = "marks.sqlite3";
pub const SCHEME_FILE_NAME: &str = "fullmarks.json";

pub const DEFAULT_MARGIN_X: i32 = 300;
pub const DEFAULT_TOUCH_HIT_RADIUS: f64 = 30.0;
pub const DEFAULT_CIRCLE_MIN_SIZE: i32 = 150;
pub const DEFAULT_CIRCLE_MAX_SIZE: i32 = 3200;
pub const DEFAULT_CIRCLE_SCALE: i32 = 2;
pub const DEFAULT_BULK_STEP: i64 = 5;

/// Pointer buttons the editor distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Primary,
    Secondary,
    Back,
    Forward,
}

/// What a press on an empty spot does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressAction {
    /// New score mark; `shift_value` is used while shift is held.
    Score { value: i64, shift_value: i64 },
    Tally,
    Circle,
    Justify,
    LeftArrow,
    RightArrow,
    ToggleStrike,
    Nothing,
}

/// Button-to-action table for one page region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMapping {
    pub primary: PressAction,
    pub secondary: PressAction,
    pub back: PressAction,
    pub forward: PressAction,
}

impl RegionMapping {
    pub fn action(&self, button: PointerButton) -> PressAction {
        match button {
            PointerButton::Primary => self.primary,
            PointerButton::Secondary => self.secondary,
            PointerButton::Back => self.back,
            PointerButton::Forward => self.forward,
        }
    }
}

/// The full pointer mapping: new-mark tables for the margin and body regions,
/// and the buttons that edit an existing mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputMapping {
    pub margin: RegionMapping,
    pub body: RegionMapping,
    /// Raises a score mark / grows a circle.
    pub increase: PointerButton,
    /// Lowers a score mark / shrinks a circle.
    pub decrease: PointerButton,
    /// Turns an arrow around.
    pub flip: PointerButton,
}

impl Default for InputMapping {
    fn default() -> Self {
        Self {
            margin: RegionMapping {
                primary: PressAction::Score {
                    value: 1,
                    shift_value: DEFAULT_BULK_STEP,
                },
                secondary: PressAction::Score {
                    value: 0,
                    shift_value: 0,
                },
                back: PressAction::Tally,
                forward: PressAction::Nothing,
            },
            body: RegionMapping {
                primary: PressAction::Circle,
                secondary: PressAction::ToggleStrike,
                back: PressAction::Justify,
                forward: PressAction::RightArrow,
            },
            increase: PointerButton::Primary,
            decrease: PointerButton::Secondary,
            flip: PointerButton::Forward,
        }
    }
}

/// Configuration for a marking session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the raw scripts and the mark scheme.
    pub scripts_dir: PathBuf,
    /// Page-space x below which a press lands in the margin. Also the base
    /// size of new marks.
    pub margin_x: i32,
    pub touch_hit_radius: f64,
    /// A shrinking circle is removed once its width or height is at most this.
    pub circle_min_size: i32,
    /// A growing circle stays as it is once its next size would exceed this.
    pub circle_max_size: i32,
    pub circle_scale: i32,
    /// Score step while shift is held on an existing score mark.
    pub bulk_step: i64,
    pub input: InputMapping,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("."),
            margin_x: DEFAULT_MARGIN_X,
            touch_hit_radius: DEFAULT_TOUCH_HIT_RADIUS,
            circle_min_size: DEFAULT_CIRCLE_MIN_SIZE,
            circle_max_size: DEFAULT_CIRCLE_MAX_SIZE,
            circle_scale: DEFAULT_CIRCLE_SCALE,
            bulk_step: DEFAULT_BULK_STEP,
            input: InputMapping::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `SCRIPTMARK_*` environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            scripts_dir: std::env::var_os("SCRIPTMARK_SCRIPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.scripts_dir),
            margin_x: env_parse("SCRIPTMARK_MARGIN_X").unwrap_or(default.margin_x),
            touch_hit_radius: env_parse("SCRIPTMARK_TOUCH_HIT_RADIUS")
                .unwrap_or(default.touch_hit_radius),
            circle_min_size: env_parse("SCRIPTMARK_CIRCLE_MIN_SIZE")
                .unwrap_or(default.circle_min_size),
            circle_max_size: env_parse("SCRIPTMARK_CIRCLE_MAX_SIZE")
                .unwrap_or(default.circle_max_size),
            circle_scale: env_parse("SCRIPTMARK_CIRCLE_SCALE").unwrap_or(default.circle_scale),
            bulk_step: env_parse("SCRIPTMARK_BULK_STEP").unwrap_or(default.bulk_step),
            input: default.input,
        }
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> MarkingResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn internal_dir(&self) -> PathBuf {
        self.scripts_dir.join(INTERNAL_DIR_NAME)
    }

    pub fn store_path(&self) -> PathBuf {
        self.internal_dir().join(STORE_FILE_NAME)
    }

    pub fn scheme_path(&self) -> PathBuf {
        self.scripts_dir.join(SCHEME_FILE_NAME)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let mapping = InputMapping::default();
        assert_eq!(mapping.body.action(PointerButton::Primary), PressAction::Circle);
        assert_eq!(
            mapping.body.action(PointerButton::Secondary),
            PressAction::ToggleStrike
        );
        assert_eq!(mapping.margin.action(PointerButton::Back), PressAction::Tally);
        assert_eq!(mapping.margin.action(PointerButton::Forward), PressAction::Nothing);
    }

    #[test]
    fn test_derived_paths() {
        let config = SessionConfig::new("/exams/maths");
        assert_eq!(
            config.store_path(),
            PathBuf::from("/exams/maths/_scriptmark-internal/marks.sqlite3")
        );
        assert_eq!(config.scheme_path(), PathBuf::from("/exams/maths/fullmarks.json"));
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"margin_x": 240, "input": {"flip": "back", "body": {
                "primary": "justify", "secondary": "toggle_strike",
                "back": "left_arrow", "forward": "nothing"}}}"#,
        )
        .unwrap();
        let config = SessionConfig::from_file(&path).unwrap();
        assert_eq!(config.margin_x, 240);
        assert_eq!(config.circle_min_size, DEFAULT_CIRCLE_MIN_SIZE);
        assert_eq!(config.circle_max_size, DEFAULT_CIRCLE_MAX_SIZE);
        assert_eq!(config.input.flip, PointerButton::Back);
        assert_eq!(config.input.body.back, PressAction::LeftArrow);
        assert_eq!(config.input.margin, InputMapping::default().margin);
    }

    #[test]
    fn test_from_file_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{margin_x: }").unwrap();
        assert!(SessionConfig::from_file(&path).is_err());
    }
}
