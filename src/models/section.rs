//! Paper sections and the typed section table
//!
//! A prelim paper is split into three independently numbered sections. The
//! printed document numbers them contiguously, storage numbers each from 1.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult};

/// Paper section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    /// Paper 1 Booklet A (multiple choice)
    P1A,
    /// Paper 1 Booklet B (short answer)
    P1B,
    /// Paper 2 (short + long answer)
    P2,
}

impl Section {
    /// Storage code, also the answer-key prefix
    pub fn code(self) -> &'static str {
        match self {
            Section::P1A => "P1A",
            Section::P1B => "P1B",
            Section::P2 => "P2",
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Section::P1A => "Paper 1 Booklet A",
            Section::P1B => "Paper 1 Booklet B",
            Section::P2 => "Paper 2",
        }
    }

    /// Parse a storage code (case-insensitive)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "P1A" => Some(Section::P1A),
            "P1B" => Some(Section::P1B),
            "P2" => Some(Section::P2),
            _ => None,
        }
    }

    /// The section that follows this one in the printed document
    pub fn next(self) -> Option<Self> {
        match self {
            Section::P1A => Some(Section::P1B),
            Section::P1B => Some(Section::P2),
            Section::P2 => None,
        }
    }

    /// Sort position (P1A, P1B, P2)
    pub fn order(self) -> u8 {
        match self {
            Section::P1A => 0,
            Section::P1B => 1,
            Section::P2 => 2,
        }
    }

    pub fn all() -> [Section; 3] {
        [Section::P1A, Section::P1B, Section::P2]
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Role of a page as decided by the page classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRole {
    Mcq,
    ShortAnswer,
    LongAnswer,
    AnswerKey,
    Skip,
}

impl PageRole {
    /// Section a question page belongs to before identity normalization
    pub fn section(self) -> Option<Section> {
        match self {
            PageRole::Mcq => Some(Section::P1A),
            PageRole::ShortAnswer => Some(Section::P1B),
            PageRole::LongAnswer => Some(Section::P2),
            PageRole::AnswerKey | PageRole::Skip => None,
        }
    }

    pub fn is_question_page(self) -> bool {
        self.section().is_some()
    }

    pub fn label(self) -> &'static str {
        match self {
            PageRole::Mcq => "MCQ",
            PageRole::ShortAnswer => "SHORT_ANSWER",
            PageRole::LongAnswer => "LONG_ANSWER",
            PageRole::AnswerKey => "ANSWER_KEY",
            PageRole::Skip => "SKIP",
        }
    }
}

impl fmt::Display for PageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Default marks for a contiguous run of question numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkRange {
    pub start: u32,
    pub end: u32,
    pub marks: u32,
}

impl MarkRange {
    pub const fn new(start: u32, end: u32, marks: u32) -> Self {
        Self { start, end, marks }
    }

    pub fn contains(&self, number: u32) -> bool {
        (self.start..=self.end).contains(&number)
    }
}

/// Static description of one section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpec {
    pub section: Section,
    pub name: &'static str,
    /// Highest section-local question number
    pub max_questions: u32,
    /// How far the printed numbering runs ahead of the stored numbering
    pub numbering_offset: u32,
    /// Mark policy for questions with no explicit mark annotation
    pub mark_ranges: Vec<MarkRange>,
}

impl SectionSpec {
    /// Default marks for a printed question number
    ///
    /// Numbers past the last range take the last range's marks.
    pub fn default_marks(&self, number: u32) -> u32 {
        self.mark_ranges
            .iter()
            .find(|r| r.contains(number))
            .or_else(|| self.mark_ranges.last())
            .map(|r| r.marks)
            .unwrap_or(1)
    }

    fn validate(&self) -> AppResult<()> {
        let code = self.section.code();
        if self.max_questions == 0 {
            return Err(AppError::invalid_section(code, "max_questions must be positive"));
        }
        let mut expected_start = 1;
        for range in &self.mark_ranges {
            if range.start != expected_start {
                return Err(AppError::invalid_section(
                    code,
                    format!(
                        "mark range starts at {} but {} was expected",
                        range.start, expected_start
                    ),
                ));
            }
            if range.end < range.start {
                return Err(AppError::invalid_section(
                    code,
                    format!("mark range {}..={} is empty", range.start, range.end),
                ));
            }
            if range.marks == 0 {
                return Err(AppError::invalid_section(
                    code,
                    format!("mark range {}..={} awards 0 marks", range.start, range.end),
                ));
            }
            expected_start = range.end + 1;
        }
        if expected_start != self.max_questions + 1 {
            return Err(AppError::invalid_section(
                code,
                format!(
                    "mark ranges cover 1..={} but the section has {} questions",
                    expected_start.saturating_sub(1),
                    self.max_questions
                ),
            ));
        }
        Ok(())
    }
}

/// All sections of a paper, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTable {
    specs: Vec<SectionSpec>,
}

impl SectionTable {
    /// Construct and validate a table
    pub fn new(specs: Vec<SectionSpec>) -> AppResult<Self> {
        for section in Section::all() {
            let count = specs.iter().filter(|s| s.section == section).count();
            if count != 1 {
                return Err(AppError::invalid_section(
                    section.code(),
                    format!("expected exactly one spec, found {}", count),
                ));
            }
        }
        for spec in &specs {
            spec.validate()?;
        }
        Ok(Self { specs })
    }

    /// P6 prelim layout: P1A 15 MCQ, P1B 15 printed as 16-30, P2 17
    pub fn standard() -> Self {
        Self {
            specs: vec![
                SectionSpec {
                    section: Section::P1A,
                    name: Section::P1A.name(),
                    max_questions: 15,
                    numbering_offset: 0,
                    mark_ranges: vec![MarkRange::new(1, 10, 1), MarkRange::new(11, 15, 2)],
                },
                SectionSpec {
                    section: Section::P1B,
                    name: Section::P1B.name(),
                    max_questions: 15,
                    numbering_offset: 15,
                    mark_ranges: vec![MarkRange::new(1, 15, 2)],
                },
                SectionSpec {
                    section: Section::P2,
                    name: Section::P2.name(),
                    max_questions: 17,
                    numbering_offset: 0,
                    mark_ranges: vec![MarkRange::new(1, 17, 3)],
                },
            ],
        }
    }

    pub fn spec(&self, section: Section) -> &SectionSpec {
        // `new` and `standard` guarantee one spec per section
        self.specs
            .iter()
            .find(|s| s.section == section)
            .unwrap_or(&self.specs[0])
    }

    pub fn specs(&self) -> &[SectionSpec] {
        &self.specs
    }
}

impl Default for SectionTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_is_valid() {
        let table = SectionTable::standard();
        assert!(SectionTable::new(table.specs().to_vec()).is_ok());
    }

    #[test]
    fn test_default_marks() {
        let table = SectionTable::standard();
        let p1a = table.spec(Section::P1A);
        assert_eq!(p1a.default_marks(1), 1);
        assert_eq!(p1a.default_marks(10), 1);
        assert_eq!(p1a.default_marks(11), 2);
        // printed numbers beyond the section fall back to the last range
        assert_eq!(p1a.default_marks(18), 2);
        assert_eq!(table.spec(Section::P1B).default_marks(21), 2);
        assert_eq!(table.spec(Section::P2).default_marks(9), 3);
    }

    #[test]
    fn test_gap_is_rejected() {
        let mut specs = SectionTable::standard().specs().to_vec();
        specs[0].mark_ranges = vec![MarkRange::new(1, 10, 1), MarkRange::new(12, 15, 2)];
        let err = SectionTable::new(specs).unwrap_err();
        assert!(err.to_string().contains("P1A"));
    }

    #[test]
    fn test_short_coverage_is_rejected() {
        let mut specs = SectionTable::standard().specs().to_vec();
        specs[2].mark_ranges = vec![MarkRange::new(1, 12, 3)];
        assert!(SectionTable::new(specs).is_err());
    }

    #[test]
    fn test_missing_section_is_rejected() {
        let specs = SectionTable::standard().specs()[..2].to_vec();
        assert!(SectionTable::new(specs).is_err());
    }

    #[test]
    fn test_page_role_section() {
        assert_eq!(PageRole::Mcq.section(), Some(Section::P1A));
        assert_eq!(PageRole::LongAnswer.section(), Some(Section::P2));
        assert!(!PageRole::AnswerKey.is_question_page());
        assert_eq!(Section::from_code("p1b"), Some(Section::P1B));
        assert_eq!(Section::P1A.next(), Some(Section::P1B));
    }
}
