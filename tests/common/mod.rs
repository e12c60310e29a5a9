#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use exam_bank::error::OracleError;
use exam_bank::models::document::{DocumentInput, ImageSource, PageImage, PageInput};
use exam_bank::services::prompts;
use exam_bank::{Config, ModelOracle};

pub const MCQ_PAGE: &str = include_str!("../fixtures/mcq_page.txt");
pub const SHORT_ANSWER_PAGE: &str = include_str!("../fixtures/short_answer_page.txt");
pub const MULTIPART_PAGE: &str = include_str!("../fixtures/multipart_page.txt");
pub const ANSWER_KEY_JSON: &str = include_str!("../fixtures/answer_key_json.txt");
pub const ANSWER_KEY_LINES: &str = include_str!("../fixtures/answer_key_lines.txt");

/// Fake oracle
///
/// Page transcriptions are keyed by image bytes and can be repeated; every
/// other prompt (solve, verify, lenient) consumes the next scripted reply.
pub struct ScriptedOracle {
    pages: HashMap<Vec<u8>, String>,
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    prompts: Mutex<Vec<String>>,
    cancel_on_solve: Option<Arc<AtomicBool>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            cancel_on_solve: None,
        }
    }

    pub fn page(mut self, image: &[u8], transcription: &str) -> Self {
        self.pages.insert(image.to_vec(), transcription.to_string());
        self
    }

    pub fn reply(self, reply: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.to_string()));
        self
    }

    /// Raise `flag` on the first solve call, which then fails
    pub fn cancel_on_solve(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_on_solve = Some(flag);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn solve_calls(&self) -> usize {
        self.prompts().iter().filter(|p| !is_page_prompt(p)).count()
    }
}

fn is_page_prompt(prompt: &str) -> bool {
    prompt == prompts::MCQ_EXTRACTION
        || prompt == prompts::MULTI_PART_EXTRACTION
        || prompt == prompts::EXTRACT_ANSWERS
}

#[async_trait]
impl ModelOracle for ScriptedOracle {
    async fn transcribe(&self, image: &PageImage, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if is_page_prompt(prompt) {
            return self
                .pages
                .get(&image.bytes)
                .cloned()
                .ok_or_else(|| OracleError::EmptyContent {
                    model: "scripted".to_string(),
                });
        }

        if let Some(flag) = &self.cancel_on_solve {
            flag.store(true, Ordering::SeqCst);
            return Err(OracleError::Timeout { seconds: 180 });
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(OracleError::EmptyResponse {
                model: "scripted".to_string(),
            }))
    }
}

fn page(number: u32, text_hint: &str) -> PageInput {
    PageInput {
        page_number: number,
        text_hint: text_hint.to_string(),
        image: ImageSource::Memory(Arc::new(PageImage::png(vec![number as u8]))),
    }
}

/// Five pages: cover, Booklet A, Booklet B, Paper 2, answer key
pub fn sample_document() -> DocumentInput {
    DocumentInput::new(
        "Tao Nan",
        2025,
        vec![
            page(1, "Tao Nan School Prelim"),
            page(
                2,
                "Paper 1 Booklet A. Questions 1 to 10 carry 1 mark each. Shade the correct oval.",
            ),
            page(
                3,
                "Paper 1 Booklet B. Questions 16 to 30. Show your working clearly in the space provided.",
            ),
            page(4, "Paper 2. Show all working clearly.\nAns: ________"),
            page(5, "Answer Key\nPaper 2"),
        ],
    )
}

/// Oracle that transcribes every page of `sample_document`
pub fn sample_oracle() -> ScriptedOracle {
    ScriptedOracle::new()
        .page(&[2], MCQ_PAGE)
        .page(&[3], SHORT_ANSWER_PAGE)
        .page(&[4], MULTIPART_PAGE)
        .page(&[5], ANSWER_KEY_JSON)
}

/// Config writing its review file and run log under `dir`
pub fn test_config(dir: &Path) -> Config {
    Config {
        review_file: dir.join("review.txt").to_string_lossy().to_string(),
        output_log_file: dir.join("output.txt").to_string_lossy().to_string(),
        bank_file: dir.join("bank.toml").to_string_lossy().to_string(),
        documents_folder: dir.join("documents").to_string_lossy().to_string(),
        ..Config::default()
    }
}
