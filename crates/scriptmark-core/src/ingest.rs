//! Discovery of candidate directories and their page images.
//!
//! Each candidate is a directory under the internal directory holding one
//! `NNN.jpg` image per page. Producing those images from the raw scripts is
//! done outside this crate.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::candidate::page_image_path;
use crate::errors::{MarkingError, MarkingResult};

const PAGE_IMAGE_PATTERN: &str = r"^(\d{3})\.jpg$";

/// A discovered candidate directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateEntry {
    pub name: String,
    pub dir: PathBuf,
    pub page_count: usize,
}

impl CandidateEntry {
    /// Path of page `index` (0-based).
    pub fn page_path(&self, index: usize) -> PathBuf {
        page_image_path(&self.dir, index)
    }
}

fn page_image_regex() -> MarkingResult<Regex> {
    Regex::new(PAGE_IMAGE_PATTERN).map_err(|e| MarkingError::Ingest(e.to_string()))
}

/// Count the page images directly inside `dir`.
///
/// Pages are numbered from `000` without gaps; images past the first missing
/// index are not counted.
pub fn count_pages(dir: &Path) -> MarkingResult<usize> {
    let page_re = page_image_regex()?;
    count_pages_with(dir, &page_re)
}

fn count_pages_with(dir: &Path, page_re: &Regex) -> MarkingResult<usize> {
    let mut indices = BTreeSet::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| MarkingError::Ingest(format!("{}: {e}", dir.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if let Some(index) = page_re
            .captures(&file_name)
            .and_then(|caps| caps[1].parse::<usize>().ok())
        {
            indices.insert(index);
        }
    }
    let count = indices
        .iter()
        .enumerate()
        .take_while(|&(expected, &index)| expected == index)
        .count();
    if count < indices.len() {
        warn!(
            "Page {count:03}.jpg missing in {}; ignoring {} later page(s)",
            dir.display(),
            indices.len() - count
        );
    }
    Ok(count)
}

/// List candidate directories under `internal_dir`, sorted by name.
///
/// Directories without any page image are skipped. A missing `internal_dir`
/// yields an empty list.
pub fn discover_candidates(internal_dir: &Path) -> MarkingResult<Vec<CandidateEntry>> {
    if !internal_dir.is_dir() {
        debug!("No internal directory at {}", internal_dir.display());
        return Ok(Vec::new());
    }
    let page_re = page_image_regex()?;

    let mut entries = Vec::new();
    for entry in WalkDir::new(internal_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            MarkingError::Ingest(format!("{}: {e}", internal_dir.display()))
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let page_count = count_pages_with(entry.path(), &page_re)?;
        if page_count == 0 {
            warn!("Skipping candidate directory {name}: no page images");
            continue;
        }
        entries.push(CandidateEntry {
            name,
            dir: entry.into_path(),
            page_count,
        });
    }
    info!(
        count = entries.len(),
        "Discovered candidates in {}",
        internal_dir.display()
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candidate(root: &Path, name: &str, pages: usize) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..pages {
            std::fs::write(page_image_path(&dir, i), b"jpg").unwrap();
        }
        dir
    }

    #[test]
    fn test_discover_sorted_and_counted() {
        let root = tempfile::tempdir().unwrap();
        make_candidate(root.path(), "smith", 3);
        make_candidate(root.path(), "adams", 2);
        std::fs::write(root.path().join("marks.sqlite3"), b"").unwrap();

        let found = discover_candidates(root.path()).unwrap();
        let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["adams", "smith"]);
        assert_eq!(found[0].page_count, 2);
        assert_eq!(found[1].page_count, 3);
        assert!(found[1].page_path(2).ends_with("smith/002.jpg"));
    }

    #[test]
    fn test_skips_directories_without_pages() {
        let root = tempfile::tempdir().unwrap();
        make_candidate(root.path(), "empty", 0);
        let odd = make_candidate(root.path(), "odd", 1);
        std::fs::write(odd.join("cover.jpg"), b"jpg").unwrap();
        std::fs::write(odd.join("0001.jpg"), b"jpg").unwrap();

        let found = discover_candidates(root.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "odd");
        assert_eq!(found[0].page_count, 1);
    }

    #[test]
    fn test_missing_internal_dir_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let found = discover_candidates(&root.path().join("nope")).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_page_gap_stops_count() {
        let root = tempfile::tempdir().unwrap();
        let dir = make_candidate(root.path(), "gappy", 2);
        std::fs::write(page_image_path(&dir, 3), b"jpg").unwrap();
        assert_eq!(count_pages(&dir).unwrap(), 2);

        let late = root.path().join("late");
        std::fs::create_dir_all(&late).unwrap();
        std::fs::write(page_image_path(&late, 1), b"jpg").unwrap();

        let found = discover_candidates(root.path()).unwrap();
        let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["gappy"]);
        assert!(found[0].page_path(found[0].page_count - 1).is_file());
    }

    #[test]
    fn test_count_pages() {
        let root = tempfile::tempdir().unwrap();
        let dir = make_candidate(root.path(), "c", 4);
        assert_eq!(count_pages(&dir).unwrap(), 4);
    }
}
