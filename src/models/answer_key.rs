//! Candidate answers extracted from answer-key pages
//!
//! The keyspace is built once per document and is read-only during
//! reconciliation. Keys are `{SECTION}_{number}{part}` (e.g. `P2_6a`).

use std::collections::HashMap;

use crate::models::section::Section;

/// An answer as printed in the answer key, not yet checked against the question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAnswer {
    pub key: String,
    pub section: Section,
    pub document_question_number: u32,
    pub part_letter: Option<char>,
    pub answer_text: String,
    /// Working shown in the key, when the key printed any
    pub working_text: Option<String>,
    pub source_page: u32,
}

impl CandidateAnswer {
    pub fn new(
        section: Section,
        document_question_number: u32,
        part_letter: Option<char>,
        answer_text: impl Into<String>,
        source_page: u32,
    ) -> Self {
        let part_letter = part_letter.map(|c| c.to_ascii_lowercase());
        Self {
            key: keyspace_key(section, document_question_number, part_letter),
            section,
            document_question_number,
            part_letter,
            answer_text: answer_text.into(),
            working_text: None,
            source_page,
        }
    }

    pub fn with_working(mut self, working: Option<String>) -> Self {
        self.working_text = working.filter(|w| !w.trim().is_empty());
        self
    }
}

/// Canonical keyspace spelling
pub fn keyspace_key(section: Section, number: u32, part: Option<char>) -> String {
    match part {
        Some(p) => format!("{}_{}{}", section.code(), number, p.to_ascii_lowercase()),
        None => format!("{}_{}", section.code(), number),
    }
}

/// Candidate answers of one document
#[derive(Debug, Clone, Default)]
pub struct AnswerKey {
    entries: HashMap<String, CandidateAnswer>,
}

impl AnswerKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate; a later entry for the same key replaces the earlier one
    pub fn insert(&mut self, candidate: CandidateAnswer) {
        self.entries.insert(candidate.key.clone(), candidate);
    }

    pub fn extend(&mut self, candidates: impl IntoIterator<Item = CandidateAnswer>) {
        for candidate in candidates {
            self.insert(candidate);
        }
    }

    pub fn get(&self, key: &str) -> Option<&CandidateAnswer> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the candidate for a question
    ///
    /// # Arguments
    /// * `section` - normalized section
    /// * `stored_number` - section-local number
    /// * `document_number` - number as printed
    /// * `part` - part letter, if the draft is one part of a question
    ///
    /// # Returns
    /// The first hit over the key spellings in priority order. A whole-question
    /// lookup with no base key falls back to the combined parts.
    pub fn lookup(
        &self,
        section: Section,
        stored_number: u32,
        document_number: u32,
        part: Option<char>,
    ) -> Option<CandidateAnswer> {
        let code = section.code();
        let mut numbers = vec![document_number];
        if stored_number != document_number {
            numbers.push(stored_number);
        }
        if section == Section::P1B {
            let continued = stored_number + P1B_KEY_OFFSET;
            if !numbers.contains(&continued) {
                numbers.push(continued);
            }
        }

        // stored keys are always lowercase (`CandidateAnswer::new`)
        let mut probes: Vec<String> = Vec::new();
        if let Some(p) = part {
            let p = p.to_ascii_lowercase();
            probes.extend(numbers.iter().map(|n| format!("{}_{}{}", code, n, p)));
        }
        probes.extend(numbers.iter().map(|n| format!("{}_{}", code, n)));

        if let Some(hit) = probes.iter().find_map(|k| self.entries.get(k)) {
            return Some(hit.clone());
        }

        if part.is_none() {
            return numbers
                .iter()
                .find_map(|n| self.combine_parts(section, *n));
        }
        None
    }

    /// Combine part entries (`P2_6a`, `P2_6b`, ...) into one composite answer
    ///
    /// Returns `None` when the question has no part entries.
    pub fn combine_parts(&self, section: Section, number: u32) -> Option<CandidateAnswer> {
        let mut parts: Vec<&CandidateAnswer> = self
            .entries
            .values()
            .filter(|c| {
                c.section == section
                    && c.document_question_number == number
                    && c.part_letter.is_some()
            })
            .collect();
        if parts.is_empty() {
            return None;
        }
        parts.sort_by_key(|c| c.part_letter);

        let answer = parts
            .iter()
            .filter_map(|c| c.part_letter.map(|p| format!("({}) {}", p, c.answer_text)))
            .collect::<Vec<_>>()
            .join(" ");
        let working = parts
            .iter()
            .filter_map(|c| {
                let p = c.part_letter?;
                c.working_text.as_ref().map(|w| format!("({}) {}", p, w))
            })
            .collect::<Vec<_>>();

        let source_page = parts.first().map(|c| c.source_page).unwrap_or(0);
        let combined = CandidateAnswer::new(section, number, None, answer, source_page);
        Some(combined.with_working(Some(working.join("\n"))))
    }

    /// Entries sorted by key, for logging and summaries
    pub fn sorted(&self) -> Vec<&CandidateAnswer> {
        let mut all: Vec<&CandidateAnswer> = self.entries.values().collect();
        all.sort_by(|a, b| {
            (a.section.order(), a.document_question_number, a.part_letter).cmp(&(
                b.section.order(),
                b.document_question_number,
                b.part_letter,
            ))
        });
        all
    }
}

/// Keys for Booklet B are sometimes written with the printed (continued) number
const P1B_KEY_OFFSET: u32 = 15;

#[cfg(test)]
mod tests {
    use super::*;

    fn key_with(entries: &[(Section, u32, Option<char>, &str)]) -> AnswerKey {
        let mut key = AnswerKey::new();
        for (section, n, part, answer) in entries {
            key.insert(CandidateAnswer::new(*section, *n, *part, *answer, 20));
        }
        key
    }

    #[test]
    fn test_part_lookup() {
        let key = key_with(&[
            (Section::P2, 6, Some('a'), "109°"),
            (Section::P2, 6, Some('b'), "72°"),
        ]);
        let hit = key.lookup(Section::P2, 6, 6, Some('a')).unwrap();
        assert_eq!(hit.answer_text, "109°");
        assert_eq!(hit.key, "P2_6a");
    }

    #[test]
    fn test_whole_question_combines_parts() {
        let key = key_with(&[
            (Section::P2, 6, Some('b'), "72°"),
            (Section::P2, 6, Some('a'), "109°"),
        ]);
        let hit = key.lookup(Section::P2, 6, 6, None).unwrap();
        assert_eq!(hit.answer_text, "(a) 109° (b) 72°");
        assert_eq!(hit.key, "P2_6");
    }

    #[test]
    fn test_p1b_lookup_by_printed_or_stored_number() {
        let printed = key_with(&[(Section::P1B, 21, None, "3/4")]);
        assert_eq!(
            printed.lookup(Section::P1B, 6, 21, None).unwrap().answer_text,
            "3/4"
        );
        // printed number unknown to the caller: stored + offset still hits
        assert_eq!(
            printed.lookup(Section::P1B, 6, 6, None).unwrap().answer_text,
            "3/4"
        );

        let stored = key_with(&[(Section::P1B, 6, None, "12")]);
        assert_eq!(
            stored.lookup(Section::P1B, 6, 21, None).unwrap().answer_text,
            "12"
        );
    }

    #[test]
    fn test_p1b_whole_question_combines_parts_under_printed_number() {
        let key = key_with(&[
            (Section::P1B, 21, Some('a'), "11/12"),
            (Section::P1B, 21, Some('b'), "30"),
        ]);
        // drafted with the local number only
        let hit = key.lookup(Section::P1B, 6, 6, None).unwrap();
        assert_eq!(hit.answer_text, "(a) 11/12 (b) 30");
        assert_eq!(hit.key, "P1B_21");
    }

    #[test]
    fn test_part_letter_case_is_ignored() {
        let key = key_with(&[(Section::P2, 6, Some('A'), "109°")]);
        assert_eq!(key.get("P2_6a").unwrap().answer_text, "109°");
        let hit = key.lookup(Section::P2, 6, 6, Some('A')).unwrap();
        assert_eq!(hit.key, "P2_6a");
    }

    #[test]
    fn test_part_falls_back_to_base_key() {
        let key = key_with(&[(Section::P2, 9, None, "$45")]);
        let hit = key.lookup(Section::P2, 9, 9, Some('b')).unwrap();
        assert_eq!(hit.answer_text, "$45");
    }

    #[test]
    fn test_miss() {
        let key = key_with(&[(Section::P2, 6, Some('a'), "109°")]);
        assert!(key.lookup(Section::P2, 9, 9, None).is_none());
        assert!(key.lookup(Section::P1A, 6, 6, None).is_none());
    }

    #[test]
    fn test_later_entry_wins() {
        let key = key_with(&[(Section::P1A, 3, None, "A"), (Section::P1A, 3, None, "D")]);
        assert_eq!(key.len(), 1);
        assert_eq!(key.get("P1A_3").unwrap().answer_text, "D");
    }
}
