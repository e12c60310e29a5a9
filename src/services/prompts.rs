//! Prompt templates
//!
//! Placeholders are `{qnum}`, `{answer}`, `{question_text}` and `{options}`;
//! fill them with the helpers at the bottom.

use std::collections::BTreeMap;

/// Booklet A pages: flat blocks with options
pub const MCQ_EXTRACTION: &str = r#"This is a Multiple Choice Questions page from a P6 Math exam.

Extract EVERY MCQ question visible. For each question:
1. Question number
2. Complete question text (use LaTeX for math expressions)
3. All four options A, B, C, D with their full content
4. Describe any diagrams/figures

Format each question as:
---
Q[number]:
Text: [question with $LaTeX$ math]
A: [option A]
B: [option B]
C: [option C]
D: [option D]
Diagram: [description or "None"]
---

Be precise with numbers, fractions, and mathematical notation."#;

/// Booklet B and Paper 2 pages: main stem plus parts
pub const MULTI_PART_EXTRACTION: &str = r#"Extract ALL questions from this P6 Math exam page.

IMPORTANT: Many questions have MULTIPLE PARTS - (a), (b), (c). You MUST extract ALL parts.

For EACH question:
1. Question NUMBER (e.g., 6, 7, 8)
2. MAIN question text (the problem statement/stem that applies to all parts)
3. SUB-PARTS if any
4. Marks for each part if shown
5. Diagram description if present

Format EXACTLY like this:
---
Q[number]:
Main: [main question/problem statement - include ALL context, tables, given values]
(a): [part a question text] ([marks] marks)
(b): [part b question text] ([marks] marks)
Diagram: [detailed description or "None"]
---

If a question has NO sub-parts, use:
---
Q[number]:
Main: None
Text: [the complete question]
Diagram: [description or "None"]
---

Do NOT skip any sub-parts. Use LaTeX for math: $\frac{1}{2}$, $x^2$."#;

/// Answer-key pages: flat JSON keyed by section-prefixed question ids
pub const EXTRACT_ANSWERS: &str = r#"This is an ANSWER KEY page from a P6 Math exam.

Extract ALL answers into JSON format WITH SECTION PREFIXES.

SECTION DETECTION RULES:
1. "Paper 1 Booklet A" or "Paper 1A" header -> "P1A_" prefix
2. "Paper 1 Booklet B" or "Paper 1B" header -> "P1B_" prefix
3. "Paper 2" header -> "P2_" prefix
4. No header visible:
   - Q1-Q15 in a grid with single answers (1,2,3,4 or A,B,C,D) -> P1A_
   - Q16-Q30 -> P1B_
   - Q1-Q17 with parts (a), (b), (c) showing working -> P2_

MULTI-PART QUESTIONS: create a SEPARATE key for EACH part, with a lowercase
part letter: "P1B_21a", "P1B_21b", "P2_6a", "P2_6b".

OUTPUT FORMAT:
{
  "P1A_1": "4",
  "P1B_16": "324",
  "P1B_21a": "11/12",
  "P1B_21b": "30",
  "P2_6a": "109°",
  "P2_6b": "72°"
}

Include units ("$159.50", "1600ml", "92.36 cm²"). When working is shown,
give ONLY the final answer value. Extract EVERY answer visible on the page.

Return ONLY valid JSON, no other text."#;

/// Solve first, then compare with a candidate
pub const VERIFY: &str = r#"Look at this math question image.

IMPORTANT: This is Question {qnum}.
The question asks: "{question_text}"

STEP 1: SOLVE that question yourself. Show your working.
STEP 2: COMPARE your answer to this candidate answer: {answer}
STEP 3: Report your verdict.

FORMAT YOUR RESPONSE:

MY_SOLUTION:
[Your step-by-step working]

MY_ANSWER: [Your calculated answer]

CANDIDATE: {answer}

VERDICT: [MATCH or MISMATCH]

If MISMATCH, explain briefly why the candidate is wrong."#;

/// Direct solve for Booklet A and B questions; the page may hold several
pub const SOLVE: &str = r#"This is Question {qnum} on this page of a P6 Math exam.

Question text: "{question_text}"
{options}
The page may show other questions. Solve ONLY Question {qnum}, step by step.

Show your working clearly, then state the final answer.
For a multiple choice question, answer with the option letter.

FORMAT:
WORKING:
[step by step solution]

ANSWER: [final answer with units]"#;

/// Paper 2 solve, aware of parts
pub const SOLVE_LONG_ANSWER: &str = r#"This is Question {qnum} from Paper 2.

IMPORTANT: This question may have MULTIPLE PARTS (a), (b), (c), etc.
Look carefully at ALL parts and solve EACH one.

Solve step by step, showing working for EACH part.

FORMAT:
WORKING:
Part (a): [working for part a]
Part (b): [working for part b]
...

ANSWER:
(a) [answer with units]
(b) [answer with units]
...

If the question has only ONE part (no (a), (b)), just solve normally:
WORKING:
[step by step solution]

ANSWER: [final answer with units]"#;

/// Last resort: the bare answer value only
pub const SOLVE_LENIENT: &str = r#"Look at this math question image and solve it.

Just give me the final answer. If there are multiple parts, format as:
(a) [answer]
(b) [answer]

If just one answer:
[answer]"#;

/// Question text longer than this is cut in the solve and verify prompts
const QUESTION_TEXT_LIMIT: usize = 200;

pub fn solve_long_answer_prompt(qnum: u32) -> String {
    SOLVE_LONG_ANSWER.replace("{qnum}", &qnum.to_string())
}

pub fn solve_prompt(
    qnum: u32,
    question_text: &str,
    options: Option<&BTreeMap<String, String>>,
) -> String {
    let options = match options {
        Some(options) if !options.is_empty() => {
            let lines: Vec<String> = options
                .iter()
                .map(|(letter, text)| format!("{}: {}", letter, text))
                .collect();
            format!("Options:\n{}\n", lines.join("\n"))
        }
        _ => String::new(),
    };
    SOLVE
        .replace("{qnum}", &qnum.to_string())
        .replace("{question_text}", &cut_question_text(question_text))
        .replace("{options}", &options)
}

pub fn verify_prompt(qnum: u32, question_text: &str, candidate: &str) -> String {
    VERIFY
        .replace("{qnum}", &qnum.to_string())
        .replace("{question_text}", &cut_question_text(question_text))
        .replace("{answer}", candidate)
}

fn cut_question_text(question_text: &str) -> String {
    if question_text.chars().count() > QUESTION_TEXT_LIMIT {
        let cut: String = question_text.chars().take(QUESTION_TEXT_LIMIT).collect();
        format!("{}...", cut)
    } else {
        question_text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_filled() {
        let prompt = solve_long_answer_prompt(9);
        assert!(prompt.starts_with("This is Question 9 from Paper 2."));
        assert!(!prompt.contains("{qnum}"));

        let verify = verify_prompt(6, &"x".repeat(300), "109°");
        assert!(verify.contains("CANDIDATE: 109°"));
        assert!(verify.contains(&format!("\"{}...\"", "x".repeat(200))));
        assert!(!verify.contains('{'));
    }

    #[test]
    fn test_solve_prompt_names_its_question() {
        let options: BTreeMap<String, String> = [("A", "10"), ("B", "12"), ("C", "15"), ("D", "16")]
            .iter()
            .map(|(l, t)| (l.to_string(), t.to_string()))
            .collect();

        let prompt = solve_prompt(4, "What is 3/4 of 20?", Some(&options));
        assert!(prompt.starts_with("This is Question 4 on this page"));
        assert!(prompt.contains("Solve ONLY Question 4"));
        assert!(prompt.contains("\"What is 3/4 of 20?\""));
        assert!(prompt.contains("Options:\nA: 10\nB: 12\nC: 15\nD: 16\n"));
        assert!(!prompt.contains('{'));

        let open = solve_prompt(17, "Find the value of 18 x 18.", None);
        assert!(!open.contains("Options:"));
        assert!(!open.contains('{'));
    }
}
