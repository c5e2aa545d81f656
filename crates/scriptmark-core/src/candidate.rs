//! One candidate's script: the per-page mark lists and the scoring passes
//! over them.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::models::{Mark, MarkKind, PageMarks};
use crate::scheme::{breakdown_line, MarkScheme};

/// Path of page `index` (0-based) inside a candidate directory.
pub fn page_image_path(candidate_dir: &Path, index: usize) -> PathBuf {
    candidate_dir.join(format!("{index:03}.jpg"))
}

/// Question and part scores read off a freshly tallied candidate.
///
/// `part_scores` always has one more bucket than `question_scores`: the last
/// bucket holds part marks entered after the final tally point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Collation {
    pub question_scores: Vec<i64>,
    pub part_scores: Vec<Vec<i64>>,
}

impl Collation {
    pub fn total(&self) -> i64 {
        self.question_scores.iter().sum()
    }

    /// Part marks after the final tally point.
    pub fn trailing_parts(&self) -> &[i64] {
        self.part_scores.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Buckets closed by a tally point.
    pub fn closed_parts(&self) -> &[Vec<i64>] {
        let closed = self.part_scores.len().saturating_sub(1);
        &self.part_scores[..closed]
    }
}

/// Why a script is not completely marked. Reported in priority order: only
/// the first failing rule is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncompleteReason {
    TooManyQuestions { found: usize, expected: usize },
    PartMarksAfterFinalTally,
    TooManyParts { question: usize, found: usize, expected: usize },
    PartExceedsMax { question: usize, part: usize, score: i64, max: i64 },
    TooFewParts { question: usize, found: usize, expected: usize },
    TooFewQuestions { found: usize, expected: usize },
    StrikeMissing { page: usize },
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteReason::TooManyQuestions { found, expected } => {
                write!(f, "Too many questions ({found} vs {expected})")
            }
            IncompleteReason::PartMarksAfterFinalTally => {
                write!(f, "Part marks after final tally point")
            }
            IncompleteReason::TooManyParts {
                question,
                found,
                expected,
            } => write!(f, "Q{question} too many parts ({found} vs {expected})"),
            IncompleteReason::PartExceedsMax {
                question,
                part,
                score,
                max,
            } => write!(f, "Q{question} part {part} exceeds max ({score}/{max})"),
            IncompleteReason::TooFewParts {
                question,
                found,
                expected,
            } => write!(f, "Q{question} too few parts ({found} vs {expected})"),
            IncompleteReason::TooFewQuestions { found, expected } => {
                write!(f, "Too few questions ({found} vs {expected})")
            }
            IncompleteReason::StrikeMissing { page } => {
                write!(f, "Strike missing on page {page}")
            }
        }
    }
}

/// Outcome of the consistency check. Question, part and page numbers in
/// reasons are 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Incomplete(IncompleteReason),
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completeness::Complete)
    }

    /// Status text for display.
    pub fn status(&self) -> String {
        match self {
            Completeness::Complete => "Complete.\n\n".to_string(),
            Completeness::Incomplete(reason) => format!("Incomplete:\n  {reason}"),
        }
    }
}

/// Result of [`Candidate::check_complete`]. `total` is the running total even
/// when the script is incomplete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckReport {
    pub completeness: Completeness,
    pub total: i64,
    pub breakdown: String,
}

impl CheckReport {
    pub fn is_complete(&self) -> bool {
        self.completeness.is_complete()
    }

    pub fn status(&self) -> String {
        self.completeness.status()
    }
}

/// A candidate's script: one mark list per page, in page order.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    name: String,
    pages: Vec<PageMarks>,
}

impl Candidate {
    pub fn new(name: impl Into<String>, pages: Vec<PageMarks>) -> Self {
        Self {
            name: name.into(),
            pages,
        }
    }

    /// A freshly ingested script with no marks.
    pub fn unmarked(name: impl Into<String>, page_count: usize) -> Self {
        Self::new(name, vec![Vec::new(); page_count])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PageMarks] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&PageMarks> {
        self.pages.get(index)
    }

    pub fn page_mut(&mut self, index: usize) -> Option<&mut PageMarks> {
        self.pages.get_mut(index)
    }

    pub(crate) fn replace_pages(&mut self, pages: Vec<PageMarks>) {
        self.pages = pages;
    }

    /// Sort every page top to bottom and recompute each tally point as the
    /// sum of the score marks since the previous one.
    ///
    /// The running sum carries across page boundaries, so a tally point may
    /// close a question that started on an earlier page. The sorted order
    /// becomes the canonical order of each page.
    pub fn tally(&mut self) {
        for page in &mut self.pages {
            page.sort_by_key(|mark| mark.y);
        }
        let mut running = 0;
        for mark in self.pages.iter_mut().flatten() {
            match mark.kind {
                MarkKind::Score => running += mark.score_value(),
                MarkKind::Tally => {
                    mark.score = Some(running);
                    running = 0;
                }
                _ => {}
            }
        }
    }

    /// Tally, then read the question and part scores off in page order.
    pub fn collate(&mut self) -> Collation {
        self.tally();
        let mut collation = Collation {
            question_scores: Vec::new(),
            part_scores: vec![Vec::new()],
        };
        for mark in self.pages.iter().flatten() {
            match mark.kind {
                MarkKind::Score => {
                    if let Some(bucket) = collation.part_scores.last_mut() {
                        bucket.push(mark.score_value());
                    }
                }
                MarkKind::Tally => {
                    collation.question_scores.push(mark.score_value());
                    collation.part_scores.push(Vec::new());
                }
                _ => {}
            }
        }
        debug_assert_eq!(
            collation.part_scores.len(),
            collation.question_scores.len() + 1
        );
        collation
    }

    /// Check whether the marks form a complete scoring against `scheme`.
    pub fn check_complete(&mut self, scheme: &MarkScheme) -> CheckReport {
        let collation = self.collate();
        let breakdown = breakdown_text(&collation, scheme);
        let completeness = self.completeness(&collation, scheme);
        if completeness.is_complete() {
            for (score, parts) in collation
                .question_scores
                .iter()
                .zip(collation.closed_parts())
            {
                debug_assert_eq!(*score, parts.iter().sum::<i64>());
            }
        }
        CheckReport {
            completeness,
            total: collation.total(),
            breakdown,
        }
    }

    fn completeness(&self, collation: &Collation, scheme: &MarkScheme) -> Completeness {
        use IncompleteReason::*;

        let found = collation.question_scores.len();
        let expected = scheme.question_count();
        if found > expected {
            return Completeness::Incomplete(TooManyQuestions { found, expected });
        }
        if found >= expected && !collation.trailing_parts().is_empty() {
            return Completeness::Incomplete(PartMarksAfterFinalTally);
        }

        let closed = collation.closed_parts();
        for (i, parts) in closed.iter().enumerate() {
            let expected = scheme.part_count(i);
            if parts.len() > expected {
                return Completeness::Incomplete(TooManyParts {
                    question: i + 1,
                    found: parts.len(),
                    expected,
                });
            }
        }
        for (i, parts) in closed.iter().enumerate() {
            let maxima = scheme.part_max(i);
            for (j, (&score, &max)) in parts.iter().zip(&maxima).enumerate() {
                if score > max {
                    return Completeness::Incomplete(PartExceedsMax {
                        question: i + 1,
                        part: j + 1,
                        score,
                        max,
                    });
                }
            }
        }
        for (i, parts) in closed.iter().enumerate() {
            let expected = scheme.part_count(i);
            if parts.len() < expected {
                return Completeness::Incomplete(TooFewParts {
                    question: i + 1,
                    found: parts.len(),
                    expected,
                });
            }
        }
        if found < expected {
            return Completeness::Incomplete(TooFewQuestions { found, expected });
        }

        if let Some(page) = (0..self.pages.len()).find(|&page| !self.has_strike(page)) {
            return Completeness::Incomplete(StrikeMissing { page: page + 1 });
        }
        Completeness::Complete
    }

    /// Remove the page's strike if it has one, otherwise add one. Returns
    /// whether the page is struck afterwards. `None` for an unknown page.
    pub fn toggle_strike(&mut self, page: usize) -> Option<bool> {
        let marks = self.pages.get_mut(page)?;
        Some(toggle_strike(marks))
    }

    /// Remove every mark on a page. Returns how many were removed.
    pub fn clear_page(&mut self, page: usize) -> Option<usize> {
        let marks = self.pages.get_mut(page)?;
        let removed = marks.len();
        marks.clear();
        Some(removed)
    }

    pub fn has_strike(&self, page: usize) -> bool {
        self.pages
            .get(page)
            .is_some_and(|marks| marks.iter().any(|m| m.kind == MarkKind::Strike))
    }
}

/// Toggle the strike on one page's mark list.
pub(crate) fn toggle_strike(marks: &mut PageMarks) -> bool {
    match marks.iter().position(|m| m.kind == MarkKind::Strike) {
        Some(idx) => {
            marks.remove(idx);
            false
        }
        None => {
            marks.push(Mark::strike());
            true
        }
    }
}

/// Per-question listing padded to the scheme's question count.
fn breakdown_text(collation: &Collation, scheme: &MarkScheme) -> String {
    let mut text = String::new();
    let mut lines = 0;
    for (i, (score, parts)) in collation
        .question_scores
        .iter()
        .zip(&collation.part_scores)
        .enumerate()
    {
        text.push_str(&breakdown_line(i + 1, &score.to_string(), parts));
        lines += 1;
    }
    let trailing = collation.trailing_parts();
    if !trailing.is_empty() {
        text.push_str(&breakdown_line(
            collation.question_scores.len() + 1,
            "- ",
            trailing,
        ));
        lines += 1;
    }
    for _ in lines..scheme.question_count() {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrokePoint;

    fn score(value: i64, y: i32) -> Mark {
        Mark::score(150, y, 125, 100, value)
    }

    fn tally(y: i32) -> Mark {
        Mark::tally(150, y, 125, 100)
    }

    fn scheme(text: &str) -> MarkScheme {
        MarkScheme::from_json_str(text).unwrap()
    }

    #[test]
    fn test_tally_sums_in_reading_order() {
        let mut c = Candidate::new("c", vec![vec![tally(30), score(3, 20), score(2, 10)]]);
        c.tally();
        let page = c.page(0).unwrap();
        assert_eq!(page[0].score, Some(2));
        assert_eq!(page[1].score, Some(3));
        assert_eq!(page[2].kind, MarkKind::Tally);
        assert_eq!(page[2].score, Some(5));
    }

    #[test]
    fn test_collate_single_question() {
        let mut c = Candidate::new("c", vec![vec![score(3, 20), tally(30), score(2, 10)]]);
        let collation = c.collate();
        assert_eq!(collation.question_scores, vec![5]);
        assert_eq!(collation.part_scores, vec![vec![2, 3], vec![]]);
        assert_eq!(collation.total(), 5);
    }

    #[test]
    fn test_tally_carries_across_pages() {
        let mut c = Candidate::new(
            "c",
            vec![
                vec![score(1, 10), tally(20), score(4, 900)],
                vec![score(2, 5), tally(50)],
            ],
        );
        let collation = c.collate();
        assert_eq!(collation.question_scores, vec![1, 6]);
        assert_eq!(collation.part_scores, vec![vec![1], vec![4, 2], vec![]]);
    }

    #[test]
    fn test_tally_is_idempotent() {
        let mut c = Candidate::new(
            "c",
            vec![
                vec![tally(80), score(2, 10), Mark::circle(900, 40, 100, 100), score(1, 60)],
                vec![Mark::strike(), score(5, 30), tally(70)],
            ],
        );
        c.tally();
        let once = c.clone();
        c.tally();
        assert_eq!(c, once);
    }

    #[test]
    fn test_collation_shape_without_tally() {
        let mut c = Candidate::new("c", vec![vec![score(1, 10)], vec![]]);
        let collation = c.collate();
        assert!(collation.question_scores.is_empty());
        assert_eq!(collation.part_scores, vec![vec![1]]);
        assert_eq!(collation.trailing_parts(), &[1]);
        assert!(collation.closed_parts().is_empty());
    }

    #[test]
    fn test_touch_marks_sort_to_top() {
        let stroke = Mark::touch(vec![StrokePoint::new(500.0, 700.0)]).unwrap();
        let mut c = Candidate::new("c", vec![vec![score(1, 10), stroke]]);
        c.tally();
        assert_eq!(c.page(0).unwrap()[0].kind, MarkKind::Touch);
    }

    #[test]
    fn test_too_few_questions() {
        let mut c = Candidate::new(
            "c",
            vec![
                vec![Mark::strike(), score(2, 10), tally(20)],
                vec![Mark::strike()],
            ],
        );
        let report = c.check_complete(&scheme(r#"[["a 2"], ["a 5"]]"#));
        assert!(!report.is_complete());
        assert_eq!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::TooFewQuestions {
                found: 1,
                expected: 2
            })
        );
        assert!(report.status().ends_with("Too few questions (1 vs 2)"));
        assert_eq!(report.total, 2);
    }

    #[test]
    fn test_complete_script() {
        let mut c = Candidate::new(
            "c",
            vec![
                vec![Mark::strike(), score(2, 10), score(3, 20), tally(30)],
                vec![score(5, 10), tally(40), Mark::strike()],
            ],
        );
        let report = c.check_complete(&scheme(r#"[["a 2","b 3"], ["a 5"]]"#));
        assert!(report.is_complete());
        assert_eq!(report.total, 10);
        assert!(report.status().starts_with("Complete."));
    }

    #[test]
    fn test_too_many_questions_reported_before_too_many_parts() {
        let mut c = Candidate::new(
            "c",
            vec![vec![
                score(1, 10),
                score(1, 20),
                score(1, 30),
                tally(40),
                score(1, 50),
                tally(60),
            ]],
        );
        let report = c.check_complete(&scheme(r#"[["a 2"]]"#));
        assert_eq!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::TooManyQuestions {
                found: 2,
                expected: 1
            })
        );
    }

    #[test]
    fn test_part_marks_after_final_tally() {
        let mut c = Candidate::new(
            "c",
            vec![vec![Mark::strike(), score(2, 10), tally(20), score(1, 30)]],
        );
        let report = c.check_complete(&scheme(r#"[["a 2"]]"#));
        assert_eq!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::PartMarksAfterFinalTally)
        );
        assert!(report.breakdown.contains("Q2 :  -   [1]"));
    }

    #[test]
    fn test_trailing_parts_tolerated_while_questions_remain() {
        let mut c = Candidate::new(
            "c",
            vec![vec![Mark::strike(), score(2, 10), tally(20), score(1, 30)]],
        );
        let report = c.check_complete(&scheme(r#"[["a 2"], ["a 5"]]"#));
        assert_eq!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::TooFewQuestions {
                found: 1,
                expected: 2
            })
        );
    }

    #[test]
    fn test_too_many_parts_names_first_question() {
        let mut c = Candidate::new(
            "c",
            vec![vec![score(1, 10), tally(20), score(1, 30), score(1, 40), tally(50)]],
        );
        let report = c.check_complete(&scheme(r#"[["a 2"], ["a 5"]]"#));
        assert_eq!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::TooManyParts {
                question: 2,
                found: 2,
                expected: 1
            })
        );
    }

    #[test]
    fn test_too_many_parts_before_part_exceeding_max() {
        let mut c = Candidate::new(
            "c",
            vec![vec![score(9, 10), tally(20), score(1, 30), score(1, 40), tally(50)]],
        );
        let report = c.check_complete(&scheme(r#"[["a 2"], ["a 5"]]"#));
        assert!(matches!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::TooManyParts { question: 2, .. })
        ));
    }

    #[test]
    fn test_part_exceeds_max() {
        let mut c = Candidate::new(
            "c",
            vec![vec![score(2, 10), score(4, 20), tally(30)]],
        );
        let report = c.check_complete(&scheme(r#"[["a 2","b 3"]]"#));
        assert_eq!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::PartExceedsMax {
                question: 1,
                part: 2,
                score: 4,
                max: 3
            })
        );
        assert!(report.status().ends_with("Q1 part 2 exceeds max (4/3)"));
    }

    #[test]
    fn test_part_exceeding_max_before_too_few_parts() {
        let mut c = Candidate::new(
            "c",
            vec![vec![score(1, 10), tally(20), score(9, 30), tally(40)]],
        );
        let report = c.check_complete(&scheme(r#"[["a 2","b 3"], ["a 5"]]"#));
        assert!(matches!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::PartExceedsMax { question: 2, .. })
        ));
    }

    #[test]
    fn test_too_few_parts() {
        let mut c = Candidate::new("c", vec![vec![score(1, 10), tally(20)]]);
        let report = c.check_complete(&scheme(r#"[["a 2","b 3"]]"#));
        assert_eq!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::TooFewParts {
                question: 1,
                found: 1,
                expected: 2
            })
        );
    }

    #[test]
    fn test_strike_missing_names_first_page() {
        let mut c = Candidate::new(
            "c",
            vec![
                vec![Mark::strike(), score(2, 10), tally(20)],
                vec![],
                vec![],
            ],
        );
        let report = c.check_complete(&scheme(r#"[["a 2"]]"#));
        assert_eq!(
            report.completeness,
            Completeness::Incomplete(IncompleteReason::StrikeMissing { page: 2 })
        );
        assert!(report.status().ends_with("Strike missing on page 2"));
    }

    #[test]
    fn test_breakdown_padded_to_scheme() {
        let mut c = Candidate::new("c", vec![vec![score(2, 10), tally(20)]]);
        let report = c.check_complete(&scheme(r#"[["a 2"], ["a 5"], ["a 1"]]"#));
        assert!(report.breakdown.starts_with("Q1 :  2   [2]"));
        assert!(report.breakdown.ends_with("\n\n\n"));
    }

    #[test]
    fn test_sum_invariant_for_complete_scripts() {
        let mut c = Candidate::new(
            "c",
            vec![
                vec![Mark::strike(), score(1, 10), score(0, 20), tally(30), score(4, 40)],
                vec![Mark::strike(), score(2, 5), tally(15)],
            ],
        );
        let s = scheme(r#"[["a 2","b 3"], ["a 5","b 2"]]"#);
        assert!(c.check_complete(&s).is_complete());
        let collation = c.collate();
        for (score, parts) in collation
            .question_scores
            .iter()
            .zip(collation.closed_parts())
        {
            assert_eq!(*score, parts.iter().sum::<i64>());
        }
    }

    #[test]
    fn test_toggle_strike_and_clear_page() {
        let mut c = Candidate::unmarked("c", 2);
        assert_eq!(c.toggle_strike(1), Some(true));
        assert!(c.has_strike(1));
        assert_eq!(c.toggle_strike(1), Some(false));
        assert!(!c.has_strike(1));
        assert_eq!(c.toggle_strike(5), None);

        c.page_mut(0).unwrap().push(score(1, 10));
        c.page_mut(0).unwrap().push(Mark::strike());
        assert_eq!(c.clear_page(0), Some(2));
        assert!(c.page(0).unwrap().is_empty());
    }

    #[test]
    fn test_page_image_path_is_zero_padded() {
        let path = page_image_path(Path::new("/scripts/alice"), 7);
        assert_eq!(path, PathBuf::from("/scripts/alice/007.jpg"));
    }
}
