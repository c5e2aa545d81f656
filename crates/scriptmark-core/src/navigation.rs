//! Candidate/page navigation over a fixed, ordered candidate list.
//!
//! Both steps are pure functions of the current position and the page count
//! of every candidate; the session applies the result.

use serde::{Deserialize, Serialize};

/// Current position: candidate index into the ordered list, 0-based page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavState {
    pub candidate: usize,
    pub page: usize,
}

impl NavState {
    pub fn new(candidate: usize, page: usize) -> Self {
        Self { candidate, page }
    }
}

/// Which page a newly entered candidate opens at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageEntry {
    First,
    Last,
}

impl PageEntry {
    fn page(self, page_count: usize) -> usize {
        match self {
            PageEntry::First => 0,
            PageEntry::Last => page_count.saturating_sub(1),
        }
    }
}

/// Move by `step` candidates, clamped to the list. The page is only reset
/// when the candidate actually changes.
pub fn step_candidate(
    state: NavState,
    step: i64,
    page_counts: &[usize],
    entry: PageEntry,
) -> NavState {
    let Some(last) = page_counts.len().checked_sub(1) else {
        return state;
    };
    let target = clamp_index((state.candidate as i64).saturating_add(step), last);
    if target == state.candidate {
        return state;
    }
    NavState::new(target, entry.page(page_counts[target]))
}

/// Move by `step` pages within the current candidate. Stepping past either
/// end moves one candidate over instead: to its first page going forward, its
/// last page going back.
pub fn step_page(state: NavState, step: i64, page_counts: &[usize]) -> NavState {
    let Some(&page_count) = page_counts.get(state.candidate) else {
        return state;
    };
    let target = (state.page as i64).saturating_add(step);
    if target < 0 {
        step_candidate(state, -1, page_counts, PageEntry::Last)
    } else if target as usize >= page_count {
        step_candidate(state, 1, page_counts, PageEntry::First)
    } else {
        NavState::new(state.candidate, target as usize)
    }
}

/// Clamp a restored position into range, falling back to the first page.
pub fn clamp_state(state: NavState, page_counts: &[usize]) -> NavState {
    match page_counts.get(state.candidate) {
        Some(&count) if state.page < count => state,
        Some(_) => NavState::new(state.candidate, 0),
        None => NavState::default(),
    }
}

fn clamp_index(index: i64, last: usize) -> usize {
    index.clamp(0, last as i64) as usize
}
