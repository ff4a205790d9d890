//! Batch Application Service
//!
//! Creation and read access for batches and their calls.

use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use callwave::{Batch, BatchRepository, Call, CallRepository, DomainError, NewCall};

pub struct BatchService<C: CallRepository, B: BatchRepository> {
    calls: Arc<C>,
    batches: Arc<B>,
}

impl<C: CallRepository, B: BatchRepository> BatchService<C, B> {
    pub fn new(calls: Arc<C>, batches: Arc<B>) -> Self {
        Self { calls, batches }
    }

    /// Create a batch with one queued call per entry
    pub async fn create(
        &self,
        name: String,
        message: Option<String>,
        entries: Vec<NewCall>,
    ) -> Result<(Batch, Vec<Call>), DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::Validation("Batch name is required".to_string()));
        }
        if entries.is_empty() {
            return Err(DomainError::Validation(
                "A batch needs at least one call".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(entries.len());
        for entry in entries {
            let phone_number = entry.phone_number.trim().to_string();
            if phone_number.is_empty() {
                return Err(DomainError::Validation(
                    "Phone number must not be empty".to_string(),
                ));
            }
            if !seen.insert(phone_number.clone()) {
                return Err(DomainError::Validation(format!(
                    "Duplicate phone number in batch: {phone_number}"
                )));
            }
            normalized.push(NewCall {
                phone_number,
                reg_no: entry.reg_no.filter(|r| !r.trim().is_empty()),
                message: entry.message.filter(|m| !m.trim().is_empty()),
            });
        }

        let batch = Batch::new(name, message, normalized.len() as i32);
        // Distinct creation times keep dispatch in submission order
        let calls: Vec<Call> = normalized
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let mut call = Call::new(batch.id, entry);
                call.created_at = batch.created_at + Duration::microseconds(i as i64);
                call
            })
            .collect();

        let saved = self.batches.create(&batch, &calls).await?;

        tracing::info!(
            "📋 Created batch: {} ({}) with {} calls",
            saved.name,
            saved.id,
            calls.len()
        );

        Ok((saved, calls))
    }

    pub async fn list(&self) -> Result<Vec<Batch>, DomainError> {
        self.batches.find_all().await
    }

    /// Batch with its calls
    pub async fn get(&self, id: Uuid) -> Result<Option<(Batch, Vec<Call>)>, DomainError> {
        let batch = match self.batches.find_by_id(id).await? {
            Some(b) => b,
            None => return Ok(None),
        };
        let calls = self.calls.find_by_batch(id).await?;
        Ok(Some((batch, calls)))
    }

    pub async fn get_call(&self, id: Uuid) -> Result<Option<Call>, DomainError> {
        self.calls.find_by_id(id).await
    }
}
