//! Python bindings for a view layer driving the core.

use std::path::PathBuf;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::{PointerButton, SessionConfig};
use crate::editing::{EditOutcome, Press};
use crate::errors::MarkingError;
use crate::export::ExportGate;
use crate::models::StrokePoint;
use crate::navigation::NavState;
use crate::scheme::MarkScheme;
use crate::session::Session;

fn parse_button(button: &str) -> PyResult<PointerButton> {
    match button {
        "primary" => Ok(PointerButton::Primary),
        "secondary" => Ok(PointerButton::Secondary),
        "back" => Ok(PointerButton::Back),
        "forward" => Ok(PointerButton::Forward),
        other => Err(PyValueError::new_err(format!("unknown pointer button {other:?}"))),
    }
}

fn position(state: Option<NavState>) -> Option<(usize, usize)> {
    state.map(|s| (s.candidate, s.page))
}

#[pyclass(name = "MarkScheme", frozen)]
pub struct PyMarkScheme {
    inner: MarkScheme,
}

#[pymethods]
impl PyMarkScheme {
    #[staticmethod]
    fn from_json(text: &str) -> PyResult<Self> {
        Ok(Self {
            inner: MarkScheme::from_json_str(text)?,
        })
    }

    #[staticmethod]
    fn load(path: PathBuf) -> PyResult<Self> {
        Ok(Self {
            inner: MarkScheme::load(&path)?,
        })
    }

    #[getter]
    fn question_max(&self) -> Vec<i64> {
        self.inner.question_max().to_vec()
    }

    #[getter]
    fn total_max(&self) -> i64 {
        self.inner.total_max()
    }

    fn part_max(&self, index: usize) -> Vec<i64> {
        self.inner.part_max(index)
    }

    fn summary(&self) -> String {
        self.inner.summary()
    }

    fn __repr__(&self) -> String {
        format!(
            "MarkScheme(questions={}, total_max={})",
            self.inner.question_count(),
            self.inner.total_max()
        )
    }
}

#[pyclass(name = "Session")]
pub struct PySession {
    inner: Session,
}

#[pymethods]
impl PySession {
    /// Open the scripts directory. Without `config_path`, settings come from
    /// `SCRIPTMARK_*` environment variables.
    #[new]
    #[pyo3(signature = (scripts_dir, config_path=None))]
    fn new(scripts_dir: PathBuf, config_path: Option<PathBuf>) -> PyResult<Self> {
        let mut config = match config_path {
            Some(path) => SessionConfig::from_file(&path)?,
            None => SessionConfig::from_env(),
        };
        config.scripts_dir = scripts_dir;
        Ok(Self {
            inner: Session::open(config)?,
        })
    }

    #[getter]
    fn candidate_names(&self) -> Vec<String> {
        self.inner.candidate_names()
    }

    /// `(candidate_index, page_index)`, or `None` with no candidates.
    #[getter]
    fn position(&self) -> Option<(usize, usize)> {
        position(self.inner.position())
    }

    #[getter]
    fn current_name(&self) -> Option<String> {
        self.inner.current().map(|c| c.name().to_string())
    }

    #[getter]
    fn page_image(&self) -> Option<PathBuf> {
        self.inner.current_page_image()
    }

    /// Marks on the current page as a JSON list.
    fn page_marks_json(&self) -> PyResult<Option<String>> {
        let Some(marks) = self.inner.current_page_marks() else {
            return Ok(None);
        };
        let text = serde_json::to_string(marks).map_err(MarkingError::from)?;
        Ok(Some(text))
    }

    fn select(&mut self, name: &str, page: usize) -> PyResult<()> {
        Ok(self.inner.select(name, page)?)
    }

    /// Apply a press; returns `"added"`, `"modified"`, `"removed"`,
    /// `"strike"` or `"unchanged"`.
    #[pyo3(signature = (x, y, button, shift=false))]
    fn press(&mut self, x: i32, y: i32, button: &str, shift: bool) -> PyResult<&'static str> {
        let mut press = Press::new(x, y, parse_button(button)?);
        press.shift = shift;
        let outcome = self.inner.press(press)?;
        Ok(match outcome {
            EditOutcome::Added(_) => "added",
            EditOutcome::Modified { .. } => "modified",
            EditOutcome::Removed(_) => "removed",
            EditOutcome::StrikeToggled { .. } => "strike",
            EditOutcome::Unchanged => "unchanged",
        })
    }

    fn toggle_strike(&mut self) -> PyResult<bool> {
        Ok(self.inner.toggle_strike()?)
    }

    fn clear_page(&mut self) -> PyResult<usize> {
        Ok(self.inner.clear_page()?)
    }

    fn add_stroke(&mut self, points: Vec<(f64, f64)>) -> PyResult<()> {
        let points = points
            .into_iter()
            .map(|(x, y)| StrokePoint::new(x, y))
            .collect();
        Ok(self.inner.add_stroke(points)?)
    }

    fn step_page(&mut self, step: i64) -> PyResult<Option<(usize, usize)>> {
        Ok(position(self.inner.step_page(step)?))
    }

    fn step_candidate(&mut self, step: i64) -> PyResult<Option<(usize, usize)>> {
        Ok(position(self.inner.step_candidate(step)?))
    }

    fn jump_to_first_incomplete(&mut self) -> PyResult<Option<String>> {
        Ok(self.inner.jump_to_first_incomplete()?)
    }

    /// `(is_complete, total, breakdown, status)` for the current candidate.
    fn check_current(&mut self) -> Option<(bool, i64, String, String)> {
        self.inner
            .check_current()
            .map(|r| (r.is_complete(), r.total, r.breakdown.clone(), r.status()))
    }

    fn status_panel(&mut self) -> String {
        self.inner.status_panel()
    }

    fn take_warnings(&mut self) -> Vec<String> {
        self.inner.take_warnings()
    }

    /// `{"status": "ready", "files": {name: text}}`, `{"status": "blocked",
    /// "candidate": name}` or `{"status": "no_scheme"}`.
    fn export_tables<'py>(&mut self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let result = PyDict::new(py);
        match self.inner.export_tables()? {
            ExportGate::Ready(tables) => {
                result.set_item("status", "ready")?;
                let files = PyDict::new(py);
                for (name, text) in tables.files() {
                    files.set_item(name, text)?;
                }
                result.set_item("files", files)?;
            }
            ExportGate::Blocked { candidate } => {
                result.set_item("status", "blocked")?;
                result.set_item("candidate", candidate)?;
            }
            ExportGate::NoScheme => {
                result.set_item("status", "no_scheme")?;
            }
        }
        Ok(result)
    }

    fn close(&mut self) -> PyResult<()> {
        Ok(self.inner.close()?)
    }
}

#[pymodule]
fn _scriptmark_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyMarkScheme>()?;
    m.add_class::<PySession>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
