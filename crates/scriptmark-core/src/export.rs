//! CSV score tables for a fully marked cohort.
//!
//! Tables are built from [`Candidate::collate`] output only. Where they are
//! written, and any marked-PDF composition, is up to the caller.

use crate::candidate::Candidate;
use crate::scheme::MarkScheme;

pub const TOTALS_FILE_NAME: &str = "out_totals.csv";
pub const QUESTIONS_FILE_NAME: &str = "out_qs.csv";
pub const PARTS_FILE_NAME: &str = "out_part_qs.csv";
pub const UPLOAD_FILE_NAME: &str = "out_upload_format.csv";

/// Outcome of an export request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportGate {
    Ready(ExportTables),
    /// The named candidate is not completely marked.
    Blocked { candidate: String },
    /// Scores cannot be tabulated without a mark scheme.
    NoScheme,
}

/// Collated scores of one candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportRow {
    pub name: String,
    pub question_scores: Vec<i64>,
    /// Part scores of every question, flattened in order.
    pub part_scores: Vec<i64>,
    pub total: i64,
}

impl ExportRow {
    pub fn from_candidate(candidate: &mut Candidate) -> Self {
        let collation = candidate.collate();
        Self {
            name: candidate.name().to_string(),
            total: collation.total(),
            part_scores: collation.part_scores.iter().flatten().copied().collect(),
            question_scores: collation.question_scores,
        }
    }
}

/// The four CSV texts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportTables {
    /// `Candidate,Total,`
    pub totals: String,
    /// `Candidate,Q1,Q2,...,Total,`
    pub questions: String,
    /// `Candidate,1a,1b,2a,...,Total,`
    pub parts: String,
    /// `name,total` with no header.
    pub upload: String,
}

impl ExportTables {
    pub fn build(scheme: &MarkScheme, rows: &[ExportRow]) -> Self {
        let mut question_header = String::new();
        let mut part_header = String::new();
        for (i, parts) in scheme.questions().iter().enumerate() {
            question_header.push_str(&format!("Q{},", i + 1));
            for part in parts {
                part_header.push_str(&format!("{}{},", i + 1, part.label));
            }
        }

        let mut tables = Self {
            totals: "Candidate,Total,\n".to_string(),
            questions: format!("Candidate,{question_header}Total,\n"),
            parts: format!("Candidate,{part_header}Total,\n"),
            upload: String::new(),
        };
        for row in rows {
            let name = &row.name;
            let total = row.total;
            tables.totals.push_str(&format!("{name},{total},\n"));
            tables.questions.push_str(&format!(
                "{name},{},{total},\n",
                join(&row.question_scores)
            ));
            tables
                .parts
                .push_str(&format!("{name},{},{total},\n", join(&row.part_scores)));
            tables.upload.push_str(&format!("{name},{total}\n"));
        }
        tables
    }

    /// File name and contents of each table.
    pub fn files(&self) -> [(&'static str, &str); 4] {
        [
            (TOTALS_FILE_NAME, self.totals.as_str()),
            (QUESTIONS_FILE_NAME, self.questions.as_str()),
            (PARTS_FILE_NAME, self.parts.as_str()),
            (UPLOAD_FILE_NAME, self.upload.as_str()),
        ]
    }
}

fn join(values: &[i64]) -> String {
    values
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mark;

    fn candidate(name: &str, parts: &[&[i64]]) -> Candidate {
        let mut marks = vec![Mark::strike()];
        let mut y = 100;
        for question in parts {
            for &value in *question {
                marks.push(Mark::score(150, y, 125, 100, value));
                y += 100;
            }
            marks.push(Mark::tally(150, y, 125, 100));
            y += 100;
        }
        Candidate::new(name, vec![marks])
    }

    #[test]
    fn test_row_from_candidate() {
        let mut c = candidate("adams", &[&[2, 1], &[4]]);
        let row = ExportRow::from_candidate(&mut c);
        assert_eq!(row.question_scores, vec![3, 4]);
        assert_eq!(row.part_scores, vec![2, 1, 4]);
        assert_eq!(row.total, 7);
    }

    #[test]
    fn test_tables_layout() {
        let scheme = MarkScheme::from_json_str(r#"[["a 2","b 3"], [". 5"]]"#).unwrap();
        let rows = vec![
            ExportRow::from_candidate(&mut candidate("adams", &[&[2, 1], &[4]])),
            ExportRow::from_candidate(&mut candidate("brown", &[&[0, 3], &[5]])),
        ];
        let tables = ExportTables::build(&scheme, &rows);
        assert_eq!(tables.totals, "Candidate,Total,\nadams,7,\nbrown,8,\n");
        assert_eq!(
            tables.questions,
            "Candidate,Q1,Q2,Total,\nadams,3,4,7,\nbrown,3,5,8,\n"
        );
        assert_eq!(
            tables.parts,
            "Candidate,1a,1b,2.,Total,\nadams,2,1,4,7,\nbrown,0,3,5,8,\n"
        );
        assert_eq!(tables.upload, "adams,7\nbrown,8\n");
        assert_eq!(tables.files()[3].0, UPLOAD_FILE_NAME);
    }
}
