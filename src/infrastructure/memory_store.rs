use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::infrastructure::store::{
    Bank, QuestionFields, QuestionRecord, QuestionStore, RecordFilter, UpsertOutcome,
};
use crate::models::question::QuestionIdentity;

/// Question bank held in memory (tests and dry runs)
#[derive(Debug, Default)]
pub struct MemoryStore {
    bank: Mutex<Bank>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            bank: Mutex::new(Bank::new()),
        }
    }

    /// Copy of the whole bank
    pub async fn snapshot(&self) -> Bank {
        self.bank.lock().await.clone()
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn upsert(
        &self,
        identity: &QuestionIdentity,
        fields: &QuestionFields,
        overwrite: bool,
    ) -> Result<UpsertOutcome, StorageError> {
        Ok(self.bank.lock().await.upsert(identity, fields, overwrite))
    }

    async fn get(&self, identity: &QuestionIdentity) -> Result<Option<QuestionRecord>, StorageError> {
        Ok(self.bank.lock().await.get(identity))
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<QuestionRecord>, StorageError> {
        Ok(self.bank.lock().await.list(filter))
    }
}
