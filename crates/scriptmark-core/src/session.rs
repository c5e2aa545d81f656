//! The marking session: the single current candidate, navigation over the
//! cohort, and every mutation a grader can make.
//!
//! Every mutation re-tallies and persists the current candidate before
//! returning. A failed save restores the marks to their state before the
//! edit, so a half-applied change is never observable.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::candidate::{Candidate, CheckReport};
use crate::config::SessionConfig;
use crate::editing::{EditOutcome, Editor, Press};
use crate::errors::{MarkingError, MarkingResult};
use crate::export::{ExportGate, ExportRow, ExportTables};
use crate::ingest::{discover_candidates, CandidateEntry};
use crate::models::{Mark, PageMarks, StrokePoint};
use crate::navigation::{self, NavState, PageEntry};
use crate::scheme::MarkScheme;
use crate::store::database::{META_LAST_CANDIDATE, META_LAST_OUTPUT_DIR, META_LAST_PAGE};
use crate::store::MarkStore;

pub struct Session {
    config: SessionConfig,
    store: MarkStore,
    scheme: Option<MarkScheme>,
    candidates: IndexMap<String, CandidateEntry>,
    current: Option<Candidate>,
    nav: NavState,
    warnings: Vec<String>,
}

impl Session {
    /// Open a session, loading the mark scheme from the scripts directory if
    /// one is present. A scheme file that fails to parse is fatal.
    pub fn open(config: SessionConfig) -> MarkingResult<Self> {
        let scheme_path = config.scheme_path();
        let scheme = if scheme_path.is_file() {
            Some(MarkScheme::load(&scheme_path)?)
        } else {
            info!("No mark scheme at {}; scoring disabled", scheme_path.display());
            None
        };
        Self::with_scheme(config, scheme)
    }

    /// Open a session with an explicitly supplied scheme.
    pub fn with_scheme(config: SessionConfig, scheme: Option<MarkScheme>) -> MarkingResult<Self> {
        let store = MarkStore::open(config.store_path())?;
        let mut candidates = IndexMap::new();
        for entry in discover_candidates(&config.internal_dir())? {
            store.register_candidate(&entry.name, entry.page_count)?;
            candidates.insert(entry.name.clone(), entry);
        }

        let mut session = Self {
            config,
            store,
            scheme,
            candidates,
            current: None,
            nav: NavState::default(),
            warnings: Vec::new(),
        };
        if let Some(state) = session.restored_position()? {
            session.go_to(state)?;
        }
        info!(
            candidates = session.candidates.len(),
            scheme = session.scheme.is_some(),
            "Session opened"
        );
        Ok(session)
    }

    fn restored_position(&self) -> MarkingResult<Option<NavState>> {
        if self.candidates.is_empty() {
            return Ok(None);
        }
        let last = self.store.get_meta(META_LAST_CANDIDATE)?;
        let page = self
            .store
            .get_meta(META_LAST_PAGE)?
            .and_then(|p| p.parse::<usize>().ok())
            .unwrap_or(0);
        let state = match last.and_then(|name| self.candidates.get_index_of(&name)) {
            Some(index) => navigation::clamp_state(NavState::new(index, page), &self.page_counts()),
            None => NavState::default(),
        };
        Ok(Some(state))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn scheme(&self) -> Option<&MarkScheme> {
        self.scheme.as_ref()
    }

    pub fn store(&self) -> &MarkStore {
        &self.store
    }

    pub fn candidate_names(&self) -> Vec<String> {
        self.candidates.keys().cloned().collect()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn current(&self) -> Option<&Candidate> {
        self.current.as_ref()
    }

    /// Current position, or `None` with no candidates.
    pub fn position(&self) -> Option<NavState> {
        self.current.as_ref().map(|_| self.nav)
    }

    pub fn current_page_marks(&self) -> Option<&PageMarks> {
        self.current.as_ref()?.page(self.nav.page)
    }

    pub fn current_page_image(&self) -> Option<PathBuf> {
        if self.current.is_none() {
            return None;
        }
        let (_, entry) = self.candidates.get_index(self.nav.candidate)?;
        Some(entry.page_path(self.nav.page))
    }

    fn page_counts(&self) -> Vec<usize> {
        self.candidates.values().map(|e| e.page_count).collect()
    }

    // -----------------------------------------------------------------------
    // Selection and navigation
    // -----------------------------------------------------------------------

    /// Make `name` current at `page` (0-based).
    pub fn select(&mut self, name: &str, page: usize) -> MarkingResult<()> {
        let (index, _, entry) = self
            .candidates
            .get_full(name)
            .ok_or_else(|| MarkingError::Navigation(format!("unknown candidate {name}")))?;
        if page >= entry.page_count {
            return Err(MarkingError::Navigation(format!(
                "page {} out of range for {name} ({} pages)",
                page + 1,
                entry.page_count
            )));
        }
        let switching = self.current.as_ref().map_or(true, |c| c.name() != name);
        if switching {
            let entry = entry.clone();
            self.current = Some(self.load_recovering(&entry));
        }
        self.nav = NavState::new(index, page);
        debug!("Set candidate page: {name} {page}");
        self.persist_position()
    }

    fn go_to(&mut self, state: NavState) -> MarkingResult<()> {
        let name = self
            .candidates
            .get_index(state.candidate)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| {
                MarkingError::Navigation(format!("no candidate at index {}", state.candidate))
            })?;
        self.select(&name, state.page)
    }

    /// Step `step` pages, spilling over into the neighbouring candidate at
    /// either end.
    pub fn step_page(&mut self, step: i64) -> MarkingResult<Option<NavState>> {
        if self.current.is_none() {
            return Ok(None);
        }
        let target = navigation::step_page(self.nav, step, &self.page_counts());
        self.go_to(target)?;
        Ok(Some(self.nav))
    }

    /// Step `step` candidates, clamped to the list.
    pub fn step_candidate(&mut self, step: i64) -> MarkingResult<Option<NavState>> {
        if self.current.is_none() {
            return Ok(None);
        }
        let target =
            navigation::step_candidate(self.nav, step, &self.page_counts(), PageEntry::First);
        self.go_to(target)?;
        Ok(Some(self.nav))
    }

    /// Select the first candidate, in list order, whose stored marks are not
    /// complete. Returns its name, or `None` when everything checks out or no
    /// scheme is loaded.
    pub fn jump_to_first_incomplete(&mut self) -> MarkingResult<Option<String>> {
        let Some(scheme) = self.scheme.clone() else {
            return Ok(None);
        };
        let entries: Vec<CandidateEntry> = self.candidates.values().cloned().collect();
        for entry in &entries {
            let mut candidate = self.load_recovering(entry);
            if !candidate.check_complete(&scheme).is_complete() {
                self.select(&entry.name, 0)?;
                info!("First incomplete candidate: {}", entry.name);
                return Ok(Some(entry.name.clone()));
            }
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Apply a pointer press to the current page.
    pub fn press(&mut self, press: Press) -> MarkingResult<EditOutcome> {
        let editor = Editor::new(&self.config, self.scheme.is_some());
        let page = self.nav.page;
        let candidate = self.current.as_mut().ok_or_else(no_candidate)?;
        apply_edit(&self.store, candidate, page, |c| {
            c.page_mut(page).map(|marks| editor.apply(marks, press))
        })
    }

    /// Toggle the current page's strike. Returns whether it is now struck.
    pub fn toggle_strike(&mut self) -> MarkingResult<bool> {
        let page = self.nav.page;
        let candidate = self.current.as_mut().ok_or_else(no_candidate)?;
        let struck = apply_edit(&self.store, candidate, page, |c| c.toggle_strike(page))?;
        debug!("Strike toggled, state={struck}");
        Ok(struck)
    }

    /// Remove every mark on the current page. Returns how many were removed.
    pub fn clear_page(&mut self) -> MarkingResult<usize> {
        let page = self.nav.page;
        let candidate = self.current.as_mut().ok_or_else(no_candidate)?;
        let removed = apply_edit(&self.store, candidate, page, |c| c.clear_page(page))?;
        debug!("Removed all {removed} marks on current page");
        Ok(removed)
    }

    /// Add a freehand stroke to the current page.
    pub fn add_stroke(&mut self, points: Vec<StrokePoint>) -> MarkingResult<()> {
        let mark = Mark::touch(points)?;
        let page = self.nav.page;
        let candidate = self.current.as_mut().ok_or_else(no_candidate)?;
        apply_edit(&self.store, candidate, page, |c| {
            c.page_mut(page).map(|marks| marks.push(mark))
        })
    }

    // -----------------------------------------------------------------------
    // Checking and display
    // -----------------------------------------------------------------------

    /// Consistency check of the current candidate, when a scheme is loaded.
    pub fn check_current(&mut self) -> Option<CheckReport> {
        let scheme = self.scheme.as_ref()?;
        Some(self.current.as_mut()?.check_complete(scheme))
    }

    /// Text for the status panel beside the page view.
    pub fn status_panel(&mut self) -> String {
        let Some(candidate) = self.current.as_ref() else {
            return "No candidates found.\n".to_string();
        };
        let mut text = format!("Filename: {} \n", candidate.name());
        text.push_str(&format!(
            "Candidate: {}/{} \n",
            self.nav.candidate + 1,
            self.candidates.len()
        ));
        text.push_str(&format!(
            "Page: {}/{} \n\n\n",
            self.nav.page + 1,
            candidate.page_count()
        ));
        if let Some(report) = self.check_current() {
            if let Some(scheme) = self.scheme.as_ref() {
                let total_max = scheme.total_max();
                let percent = if total_max > 0 {
                    100.0 * report.total as f64 / total_max as f64
                } else {
                    0.0
                };
                text.push_str(&format!(
                    "Score: {}/{} = {:.0}%\n",
                    report.total, total_max, percent
                ));
                text.push_str(&report.breakdown);
                text.push_str("\n\n");
                text.push_str(&report.status());
                text.push_str("\n\n");
                text.push_str(&format!("Max: {total_max}\n"));
                text.push_str(&scheme.summary());
            }
        }
        text
    }

    /// Storage recoveries since the last call.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    /// Build the score tables, or select the first incomplete candidate and
    /// report it.
    pub fn export_tables(&mut self) -> MarkingResult<ExportGate> {
        let Some(scheme) = self.scheme.clone() else {
            return Ok(ExportGate::NoScheme);
        };
        let entries: Vec<CandidateEntry> = self.candidates.values().cloned().collect();
        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            let mut candidate = self.load_recovering(entry);
            if !candidate.check_complete(&scheme).is_complete() {
                self.select(&entry.name, 0)?;
                info!("Export blocked: {} is incomplete", entry.name);
                return Ok(ExportGate::Blocked {
                    candidate: entry.name.clone(),
                });
            }
            rows.push(ExportRow::from_candidate(&mut candidate));
        }
        info!(candidates = rows.len(), "Built export tables");
        Ok(ExportGate::Ready(ExportTables::build(&scheme, &rows)))
    }

    pub fn last_output_dir(&self) -> MarkingResult<Option<PathBuf>> {
        Ok(self.store.get_meta(META_LAST_OUTPUT_DIR)?.map(PathBuf::from))
    }

    pub fn set_last_output_dir(&self, dir: &Path) -> MarkingResult<()> {
        self.store
            .set_meta(META_LAST_OUTPUT_DIR, &dir.to_string_lossy())
    }

    /// Persist the current marks and position.
    pub fn close(&mut self) -> MarkingResult<()> {
        if let Some(candidate) = self.current.as_ref() {
            self.store.save_candidate(candidate)?;
            self.persist_position()?;
        }
        info!("Session closed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn persist_position(&self) -> MarkingResult<()> {
        let Some(candidate) = self.current.as_ref() else {
            return Ok(());
        };
        self.store.set_meta(META_LAST_CANDIDATE, candidate.name())?;
        self.store
            .set_meta(META_LAST_PAGE, &self.nav.page.to_string())
    }

    /// Load a candidate from the store, falling back to an unmarked script
    /// when the stored blob is unusable. The fallback is recorded as a
    /// warning.
    fn load_recovering(&mut self, entry: &CandidateEntry) -> Candidate {
        let problem = match self.store.load_candidate(&entry.name) {
            Ok(candidate) if candidate.page_count() == entry.page_count => return candidate,
            Ok(candidate) => format!(
                "{} stored pages but {} page images",
                candidate.page_count(),
                entry.page_count
            ),
            Err(e) => e.to_string(),
        };
        let message = format!(
            "Marks for {} could not be loaded ({problem}); starting unmarked",
            entry.name
        );
        warn!("{message}");
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
        Candidate::unmarked(entry.name.clone(), entry.page_count)
    }
}

fn no_candidate() -> MarkingError {
    MarkingError::Navigation("no candidate selected".to_string())
}

/// Run `edit` on the candidate, then re-tally and save. `edit` returns `None`
/// when `page` does not exist. The candidate is restored if saving fails.
fn apply_edit<R>(
    store: &MarkStore,
    candidate: &mut Candidate,
    page: usize,
    edit: impl FnOnce(&mut Candidate) -> Option<R>,
) -> MarkingResult<R> {
    let snapshot = candidate.pages().to_vec();
    let result = edit(candidate).ok_or_else(|| {
        MarkingError::Navigation(format!("page {} out of range", page + 1))
    })?;
    candidate.tally();
    if let Err(e) = store.save_candidate(candidate) {
        candidate.replace_pages(snapshot);
        return Err(e);
    }
    Ok(result)
}
