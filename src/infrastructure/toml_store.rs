use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::infrastructure::store::{
    Bank, QuestionFields, QuestionRecord, QuestionStore, RecordFilter, UpsertOutcome,
};
use crate::models::question::QuestionIdentity;

/// Question bank in a single TOML file
///
/// Loaded once on open, rewritten after every upsert that changed it.
pub struct TomlStore {
    path: PathBuf,
    bank: Mutex<Bank>,
}

impl TomlStore {
    /// Open the bank, starting empty when the file does not exist yet
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let bank = match tokio::fs::read_to_string(&path).await {
            Ok(content) => toml::from_str::<Bank>(&content).map_err(|source| {
                StorageError::DecodeFailed {
                    path: path.display().to_string(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📦 New question bank: {}", path.display());
                Bank::new()
            }
            Err(source) => {
                return Err(StorageError::ReadFailed {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        debug!("bank {} holds {} questions", path.display(), bank.questions.len());

        Ok(Self {
            path,
            bank: Mutex::new(bank),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, bank: &Bank) -> Result<(), StorageError> {
        let content = toml::to_string_pretty(bank)?;
        let tmp = self.path.with_extension("toml.tmp");
        let write_failed = |source: std::io::Error| StorageError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };
        tokio::fs::write(&tmp, content).await.map_err(write_failed)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(write_failed)?;
        Ok(())
    }
}

#[async_trait]
impl QuestionStore for TomlStore {
    async fn upsert(
        &self,
        identity: &QuestionIdentity,
        fields: &QuestionFields,
        overwrite: bool,
    ) -> Result<UpsertOutcome, StorageError> {
        let mut bank = self.bank.lock().await;
        let before = bank.clone();
        let outcome = bank.upsert(identity, fields, overwrite);
        if *bank != before {
            self.save(&bank).await?;
        }
        Ok(outcome)
    }

    async fn get(&self, identity: &QuestionIdentity) -> Result<Option<QuestionRecord>, StorageError> {
        Ok(self.bank.lock().await.get(identity))
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<QuestionRecord>, StorageError> {
        Ok(self.bank.lock().await.list(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::AnswerFields;
    use crate::models::question::Provenance;
    use crate::models::section::Section;
    use std::collections::BTreeMap;

    fn mcq_fields() -> QuestionFields {
        let mut options = BTreeMap::new();
        options.insert("A".to_string(), "0.5".to_string());
        options.insert("B".to_string(), "0.05".to_string());
        QuestionFields {
            pdf_question_num: 3,
            page_number: 3,
            marks: 1,
            text: "Which is the largest?".to_string(),
            options: Some(options),
            diagram_description: None,
            shared_context: None,
            answer: Some(AnswerFields {
                answer_text: "A".to_string(),
                working_text: None,
                provenance: Provenance::AnswerKey,
                low_confidence: false,
            }),
        }
    }

    #[tokio::test]
    async fn test_bank_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.toml");
        let mcq = QuestionIdentity::new("Catholic High", 2024, Section::P1A, 3, None);
        let part = QuestionIdentity::new("Catholic High", 2024, Section::P2, 6, Some('a'));

        {
            let store = TomlStore::open(&path).await.unwrap();
            store.upsert(&mcq, &mcq_fields(), false).await.unwrap();
            let mut p2 = mcq_fields();
            p2.options = None;
            p2.shared_context = Some("A rhombus".to_string());
            p2.answer = None;
            store.upsert(&part, &p2, false).await.unwrap();
        }

        let reopened = TomlStore::open(&path).await.unwrap();
        let record = reopened.get(&mcq).await.unwrap().unwrap();
        assert_eq!(record.answer_text, "A");
        assert_eq!(record.provenance, Some(Provenance::AnswerKey));
        assert_eq!(record.options.as_ref().unwrap()["B"], "0.05");

        let listed = reopened.list(&RecordFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].identity.part_letter, Some('a'));

        // ids keep counting after reopen
        let next = QuestionIdentity::new("Catholic High", 2024, Section::P2, 7, None);
        let outcome = reopened.upsert(&next, &mcq_fields(), false).await.unwrap();
        assert_eq!(outcome.id, 3);
    }

    #[tokio::test]
    async fn test_corrupt_bank_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.toml");
        std::fs::write(&path, "questions = 5").unwrap();
        let err = TomlStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StorageError::DecodeFailed { .. }));
    }
}
