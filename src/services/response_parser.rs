//! Response parser
//!
//! Turns a question page's transcription into `QuestionDraft`s. The oracle
//! writes one block per question, separated by `---` lines. Two block shapes:
//!
//! - multi-part: `Main:` plus `(a):` .. `(e):` fields, one draft per part
//! - flat: `Text:` with optional `Type:` and `A:` .. `D:` options
//!
//! Missing fields degrade to fewer fields; a block without text is dropped.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::question::QuestionDraft;
use crate::models::section::{PageRole, Section, SectionTable};
use crate::services::text_normalizer::{is_placeholder, normalize_text};

static BLOCK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\n)---+\s*\n?").expect("valid regex"));
static QUESTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:QUESTION|Q)\s*(\d+)").expect("valid regex"));

static DIAGRAM_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Diagram:").expect("valid regex"));
static MAIN_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Main:").expect("valid regex"));
static TEXT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bText:").expect("valid regex"));
static TYPE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Type:\s*(\w+)").expect("valid regex"));
static ANY_PART_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\([a-z]\):").expect("valid regex"));
static PART_LABELS: LazyLock<Vec<(char, Regex)>> = LazyLock::new(|| {
    PART_LETTERS
        .iter()
        .map(|&letter| {
            let re = Regex::new(&format!(r"(?i)\({}\):", letter)).expect("valid regex");
            (letter, re)
        })
        .collect()
});
static OPTION_LABELS: LazyLock<Vec<(char, Regex)>> = LazyLock::new(|| {
    OPTION_LETTERS
        .iter()
        .map(|&letter| {
            let re = Regex::new(&format!(r"(?m)^{}:", letter)).expect("valid regex");
            (letter, re)
        })
        .collect()
});

// Field terminators
static NEXT_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\n\([a-z]\):").expect("valid regex"));
static DIAGRAM_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Diagram:").expect("valid regex"));
static NEXT_DIAGRAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\nDiagram:").expect("valid regex"));
static NEXT_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\nText:").expect("valid regex"));
static NEXT_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n---").expect("valid regex"));
static NEXT_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*[A-D]:").expect("valid regex"));
static NEXT_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\nType:").expect("valid regex"));
static NEXT_FLAT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\n(?:Type|Options|Diagram|A:)").expect("valid regex"));

static MARKS_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\((\d+)\s*marks?\)").expect("valid regex"));
static MARKS_STRIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\(\d+\s*marks?\)").expect("valid regex"));

const PART_LETTERS: [char; 5] = ['a', 'b', 'c', 'd', 'e'];
const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];
/// Marks for a part or single question with no annotation
const DEFAULT_PART_MARKS: u32 = 2;

/// Parse one page transcription
///
/// # Arguments
/// * `response` - raw oracle text
/// * `role` - classified role of the page; non-question roles yield nothing
/// * `page_number` - recorded on each draft
/// * `sections` - mark policy for flat questions
///
/// # Returns
/// Drafts in block order
pub fn parse_page_response(
    response: &str,
    role: PageRole,
    page_number: u32,
    sections: &SectionTable,
) -> Vec<QuestionDraft> {
    let Some(section) = role.section() else {
        return Vec::new();
    };

    let mut drafts = Vec::new();
    for block in BLOCK_SEPARATOR.split(response) {
        if block.trim().is_empty() {
            continue;
        }
        let Some(number) = question_number(block) else {
            debug!("[page {}] block without question number dropped", page_number);
            continue;
        };

        let ctx = BlockCtx {
            block,
            number,
            section,
            page_number,
            diagram: diagram_description(block),
        };
        let parsed = if MAIN_LABEL.is_match(block) || ANY_PART_LABEL.is_match(block) {
            parse_multi_part(&ctx)
        } else {
            parse_flat(&ctx, sections).into_iter().collect()
        };

        if parsed.is_empty() {
            debug!("[page {}] Q{} yielded no text, dropped", page_number, number);
        }
        drafts.extend(parsed);
    }
    drafts
}

struct BlockCtx<'a> {
    block: &'a str,
    number: u32,
    section: Section,
    page_number: u32,
    diagram: Option<String>,
}

impl BlockCtx<'_> {
    fn draft(&self, text: String, marks: u32) -> QuestionDraft {
        QuestionDraft {
            document_question_number: self.number,
            section: self.section,
            part_letter: None,
            text,
            options: None,
            diagram_description: self.diagram.clone(),
            marks,
            shared_context: None,
            page_number: self.page_number,
        }
    }
}

fn parse_multi_part(ctx: &BlockCtx<'_>) -> Vec<QuestionDraft> {
    let main = field(ctx.block, &MAIN_LABEL, &[&NEXT_PART, &NEXT_TEXT, &DIAGRAM_ANYWHERE])
        .filter(|m| !is_placeholder(m))
        .unwrap_or_default();

    let parts: Vec<(char, String, u32)> = PART_LABELS
        .iter()
        .filter_map(|(letter, label)| {
            let raw = field(ctx.block, label, &[&NEXT_PART, &NEXT_DIAGRAM, &NEXT_SEPARATOR])?;
            if is_placeholder(raw) {
                return None;
            }
            let (text, marks) = split_marks(raw);
            (!text.is_empty()).then(|| (*letter, text, marks.unwrap_or(DEFAULT_PART_MARKS)))
        })
        .collect();

    if parts.is_empty() {
        // No usable parts: a single question with a shared stem
        let body = field(ctx.block, &TEXT_LABEL, &[&NEXT_DIAGRAM, &NEXT_SEPARATOR])
            .filter(|t| !is_placeholder(t));
        let (text, marks) = match body {
            Some(raw) => {
                let (text, marks) = split_marks(raw);
                let text = if main.is_empty() {
                    text
                } else {
                    format!("{}\n\n{}", main, text)
                };
                (text, marks.unwrap_or(DEFAULT_PART_MARKS))
            }
            None => {
                let (text, marks) = split_marks(main);
                (text, marks.unwrap_or(DEFAULT_PART_MARKS))
            }
        };
        let text = normalize_text(&text, None);
        if text.is_empty() {
            return Vec::new();
        }
        return vec![ctx.draft(text, marks)];
    }

    let shared_context = Some(normalize_text(main, None)).filter(|m| !m.is_empty());
    parts
        .into_iter()
        .filter_map(|(letter, text, marks)| {
            let cleaned = normalize_text(&text, Some(true));
            if cleaned.is_empty() {
                return None;
            }
            let mut draft = ctx.draft(format!("({}) {}", letter, cleaned), marks);
            draft.part_letter = Some(letter);
            draft.shared_context = shared_context.clone();
            Some(draft)
        })
        .collect()
}

fn parse_flat(ctx: &BlockCtx<'_>, sections: &SectionTable) -> Option<QuestionDraft> {
    let raw = field(ctx.block, &TEXT_LABEL, &[&NEXT_FLAT_FIELD]).unwrap_or_default();
    let (text, explicit_marks) = split_marks(raw);
    let text = normalize_text(&text, None);
    if text.is_empty() {
        return None;
    }

    let question_type = TYPE_FIELD
        .captures(ctx.block)
        .map(|c| c[1].to_ascii_lowercase())
        .unwrap_or_default();
    let options = if question_type.contains("mcq") || ctx.section == Section::P1A {
        extract_options(ctx.block)
    } else {
        None
    };

    let marks = explicit_marks
        .unwrap_or_else(|| sections.spec(ctx.section).default_marks(ctx.number));
    let mut draft = ctx.draft(text, marks);
    draft.options = options;
    Some(draft)
}

/// `LETTER: text` options
///
/// An option runs until the next option label, a diagram marker, a `Type:`
/// line or the end of the block, so wrapped options keep every line.
fn extract_options(block: &str) -> Option<BTreeMap<String, String>> {
    let options: BTreeMap<String, String> = OPTION_LABELS
        .iter()
        .filter_map(|(letter, label)| {
            let raw = field(block, label, &[&NEXT_OPTION, &DIAGRAM_ANYWHERE, &NEXT_TYPE])?;
            let value = normalize_text(raw, None);
            (!value.is_empty()).then(|| (letter.to_string(), value))
        })
        .collect();
    (!options.is_empty()).then_some(options)
}

fn question_number(block: &str) -> Option<u32> {
    QUESTION_NUMBER
        .captures(block)
        .and_then(|c| c[1].parse().ok())
}

/// Everything after `Diagram:` unless it is a placeholder
fn diagram_description(block: &str) -> Option<String> {
    let raw = field(block, &DIAGRAM_LABEL, &[&NEXT_SEPARATOR])?;
    if is_placeholder(raw) {
        return None;
    }
    Some(normalize_text(raw, None)).filter(|d| !d.is_empty())
}

/// Value of a labelled field
///
/// Starts right after the first `label` match and stops at the earliest
/// terminator match (or the end of the block). Returns the trimmed value.
fn field<'a>(block: &'a str, label: &Regex, terminators: &[&Regex]) -> Option<&'a str> {
    let start = label.find(block)?.end();
    let rest = &block[start..];
    let end = terminators
        .iter()
        .filter_map(|t| t.find(rest).map(|m| m.start()))
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Strip `(N marks)` annotations, returning the first annotated value
fn split_marks(text: &str) -> (String, Option<u32>) {
    let marks = MARKS_ANNOTATION
        .captures(text)
        .and_then(|c| c[1].parse().ok());
    let stripped = MARKS_STRIP.replace_all(text, "").trim().to_string();
    (stripped, marks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(response: &str, role: PageRole) -> Vec<QuestionDraft> {
        parse_page_response(response, role, 7, &SectionTable::standard())
    }

    #[test]
    fn test_flat_mcq_with_options() {
        let response = "Q3:\nText: Which of the following is the largest?\nType: mcq\nA: 0.5\nB: 0.05\nC: 5.01\nD: 0.55\nDiagram: None\n---\nQ12:\nText: What is 3/4 of 20?\nA: 5\nB: 15\nC: 12\nD: 16";
        let drafts = parse(response, PageRole::Mcq);
        assert_eq!(drafts.len(), 2);

        let q3 = &drafts[0];
        assert_eq!(q3.document_question_number, 3);
        assert_eq!(q3.section, Section::P1A);
        assert_eq!(q3.text, "Which of the following is the largest?");
        assert_eq!(q3.marks, 1);
        assert!(q3.diagram_description.is_none());
        let options = q3.options.as_ref().unwrap();
        assert_eq!(options.len(), 4);
        assert_eq!(options["C"], "5.01");
        assert_eq!(q3.page_number, 7);

        assert_eq!(drafts[1].marks, 2);
        assert_eq!(drafts[1].options.as_ref().unwrap()["B"], "15");
    }

    #[test]
    fn test_wrapped_option_keeps_every_line() {
        let response = "Q5:\nText: Which fraction of the figure is shaded?\nA: 3/8 of the\nwhole figure\nB: 1/2\nC: 5/8\nD: 3/4 Diagram: Square cut into 8 equal parts";
        let drafts = parse(response, PageRole::Mcq);
        assert_eq!(drafts.len(), 1);

        let options = drafts[0].options.as_ref().unwrap();
        assert_eq!(options["A"], "3/8 of the\nwhole figure");
        assert_eq!(options["B"], "1/2");
        assert_eq!(options["C"], "5/8");
        assert_eq!(options["D"], "3/4");
        assert_eq!(
            drafts[0].diagram_description.as_deref(),
            Some("Square cut into 8 equal parts")
        );
    }

    #[test]
    fn test_multi_part_block() {
        let response = "Q6:\nMain: The figure shows a rhombus ABCD.\n(a): Find angle x. (2 marks)\n(b): Find angle y. (3 marks)\n(c): None\nDiagram: Rhombus with diagonal AC";
        let drafts = parse(response, PageRole::LongAnswer);
        assert_eq!(drafts.len(), 2);

        let a = &drafts[0];
        assert_eq!(a.part_letter, Some('a'));
        assert_eq!(a.text, "(a) Find angle x.");
        assert_eq!(a.marks, 2);
        assert_eq!(
            a.shared_context.as_deref(),
            Some("The figure shows a rhombus ABCD.")
        );
        assert_eq!(
            a.diagram_description.as_deref(),
            Some("Rhombus with diagonal AC")
        );

        let b = &drafts[1];
        assert_eq!(b.part_letter, Some('b'));
        assert_eq!(b.marks, 3);
        assert_eq!(b.shared_context, a.shared_context);
    }

    #[test]
    fn test_part_marks_default_to_two() {
        let response = "Q9\nMain: Ben saved $45.\n(a): How much did he spend?";
        let drafts = parse(response, PageRole::LongAnswer);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].marks, 2);
    }

    #[test]
    fn test_main_with_text_and_no_parts() {
        let response = "Q14\nMain: A tank is filled with water.\nText: How much water is in the tank? (4 marks)\nDiagram: N/A";
        let drafts = parse(response, PageRole::LongAnswer);
        assert_eq!(drafts.len(), 1);
        let q = &drafts[0];
        assert_eq!(q.part_letter, None);
        assert_eq!(
            q.text,
            "A tank is filled with water.\n\nHow much water is in the tank?"
        );
        assert_eq!(q.marks, 4);
        assert!(q.diagram_description.is_none());
    }

    #[test]
    fn test_flat_long_answer_uses_section_marks() {
        let drafts = parse("Question 2\nText: Find the perimeter of the figure.", PageRole::LongAnswer);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].marks, 3);
        assert!(drafts[0].options.is_none());
    }

    #[test]
    fn test_empty_blocks_dropped() {
        let response = "Q1\nText: None\n---\nno number here\n---\nQ2\nText: Round 4.56 to 1 decimal place.";
        let drafts = parse(response, PageRole::ShortAnswer);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].document_question_number, 2);
        assert_eq!(drafts[0].marks, 2);
    }

    #[test]
    fn test_non_question_role_yields_nothing() {
        assert!(parse("Q1\nText: anything", PageRole::AnswerKey).is_empty());
        assert!(parse("Q1\nText: anything", PageRole::Skip).is_empty());
    }

    #[test]
    fn test_field_stops_at_earliest_terminator() {
        let block = "Text: first\nDiagram: x\n(a): y";
        assert_eq!(field(block, &TEXT_LABEL, &[&NEXT_PART, &NEXT_DIAGRAM]), Some("first"));
        assert_eq!(field(block, &MAIN_LABEL, &[&NEXT_PART]), None);
    }
}
