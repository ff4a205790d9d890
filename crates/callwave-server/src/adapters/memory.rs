//! In-memory store and scripted provider for service tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use callwave::{
    Batch, BatchRepository, BatchStatus, Call, CallDetails, CallRepository, CallStatus, ChangeFeed,
    CounterDelta, DomainError, NewCall, ProviderGateway, StoreChange, TriggerRequest,
};

/// Both repositories plus the change feed over plain maps
pub struct MemoryStore {
    calls: Mutex<HashMap<Uuid, Call>>,
    batches: Mutex<HashMap<Uuid, Batch>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            calls: Mutex::new(HashMap::new()),
            batches: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Create a batch with one queued call per phone number
    pub async fn seed_batch(&self, phones: &[&str]) -> (Batch, Vec<Call>) {
        let batch = Batch::new(
            "test batch".to_string(),
            Some("Hello from the test".to_string()),
            phones.len() as i32,
        );
        let calls: Vec<Call> = phones
            .iter()
            .map(|phone| {
                Call::new(
                    batch.id,
                    NewCall {
                        phone_number: phone.to_string(),
                        reg_no: None,
                        message: None,
                    },
                )
            })
            .collect();
        let batch = self.create(&batch, &calls).await.unwrap();
        (batch, calls)
    }

    pub fn call(&self, id: Uuid) -> Call {
        self.calls.lock().unwrap()[&id].clone()
    }

    pub fn batch(&self, id: Uuid) -> Batch {
        self.batches.lock().unwrap()[&id].clone()
    }

    /// Overwrite a call directly, bypassing the version check
    pub fn put_call(&self, call: Call) {
        self.calls.lock().unwrap().insert(call.id, call);
    }

    fn publish_batch(&self, batch: &Batch) {
        let _ = self.changes.send(StoreChange::Batch {
            id: batch.id,
            status: batch.status,
            successful_calls: batch.successful_calls,
            failed_calls: batch.failed_calls,
        });
    }

    fn sorted(mut calls: Vec<Call>) -> Vec<Call> {
        calls.sort_by_key(|c| (c.created_at, c.id));
        calls
    }
}

#[async_trait]
impl CallRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError> {
        Ok(self.calls.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_external_id(
        &self,
        external_call_id: &str,
    ) -> Result<Option<Call>, DomainError> {
        Ok(self
            .calls
            .lock()
            .unwrap()
            .values()
            .find(|c| c.external_call_id.as_deref() == Some(external_call_id))
            .cloned())
    }

    async fn find_latest_open_by_reg_no(&self, reg_no: &str) -> Result<Option<Call>, DomainError> {
        Ok(self
            .calls
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.reg_no.as_deref() == Some(reg_no) && !c.is_terminal())
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn find_by_batch(&self, batch_id: Uuid) -> Result<Vec<Call>, DomainError> {
        let calls = self
            .calls
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.batch_id == batch_id)
            .cloned()
            .collect();
        Ok(Self::sorted(calls))
    }

    async fn find_by_batch_and_status(
        &self,
        batch_id: Uuid,
        statuses: &[CallStatus],
    ) -> Result<Vec<Call>, DomainError> {
        let calls = self
            .calls
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.batch_id == batch_id && statuses.contains(&c.status))
            .cloned()
            .collect();
        Ok(Self::sorted(calls))
    }

    async fn find_stale(
        &self,
        batch_id: Option<Uuid>,
        statuses: &[CallStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Call>, DomainError> {
        let calls = self
            .calls
            .lock()
            .unwrap()
            .values()
            .filter(|c| batch_id.map_or(true, |id| c.batch_id == id))
            .filter(|c| statuses.contains(&c.status))
            .filter(|c| c.started_at.unwrap_or(c.created_at) < older_than)
            .cloned()
            .collect();
        Ok(Self::sorted(calls))
    }

    async fn update_if_version(&self, call: &Call) -> Result<bool, DomainError> {
        let mut calls = self.calls.lock().unwrap();
        match calls.get_mut(&call.id) {
            Some(stored) if stored.version == call.version => {
                *stored = Call {
                    version: call.version + 1,
                    ..call.clone()
                };
                let _ = self.changes.send(StoreChange::Call {
                    id: call.id,
                    batch_id: call.batch_id,
                    status: call.status,
                });
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl BatchRepository for MemoryStore {
    async fn create(&self, batch: &Batch, calls: &[Call]) -> Result<Batch, DomainError> {
        self.batches.lock().unwrap().insert(batch.id, batch.clone());
        let mut stored = self.calls.lock().unwrap();
        for call in calls {
            stored.insert(call.id, call.clone());
        }
        Ok(batch.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Batch>, DomainError> {
        Ok(self.batches.lock().unwrap().get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Batch>, DomainError> {
        let mut batches: Vec<Batch> = self.batches.lock().unwrap().values().cloned().collect();
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }

    async fn find_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>, DomainError> {
        Ok(self
            .batches
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect())
    }

    async fn mark_dispatching(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut batches = self.batches.lock().unwrap();
        match batches.get_mut(&id) {
            Some(batch) if batch.status == BatchStatus::Created => {
                batch.status = BatchStatus::Dispatching;
                self.publish_batch(batch);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_counters(&self, id: Uuid, delta: CounterDelta) -> Result<(), DomainError> {
        let mut batches = self.batches.lock().unwrap();
        let batch = batches
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Batch", id))?;
        if batch.resolved_calls() + delta.success + delta.failure > batch.total_calls {
            return Err(DomainError::Repository(
                "batch_counters_bounded violated".to_string(),
            ));
        }
        batch.successful_calls += delta.success;
        batch.failed_calls += delta.failure;
        self.publish_batch(batch);
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        successful_calls: i32,
        failed_calls: i32,
    ) -> Result<bool, DomainError> {
        let mut batches = self.batches.lock().unwrap();
        match batches.get_mut(&id) {
            Some(batch) if batch.status != BatchStatus::Completed => {
                batch.status = BatchStatus::Completed;
                batch.successful_calls = successful_calls;
                batch.failed_calls = failed_calls;
                batch.completed_at = Some(Utc::now());
                self.publish_batch(batch);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl ChangeFeed for MemoryStore {
    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// Provider double: succeeds with `ext-<phone>` unless a failure is queued
pub struct FakeGateway {
    pub configured: bool,
    trigger_failures: Mutex<HashMap<String, VecDeque<DomainError>>>,
    details: Mutex<HashMap<String, CallDetails>>,
    fail_cancels: bool,
    pub triggered: Mutex<Vec<TriggerRequest>>,
    pub canceled: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            configured: true,
            trigger_failures: Mutex::new(HashMap::new()),
            details: Mutex::new(HashMap::new()),
            fail_cancels: false,
            triggered: Mutex::new(Vec::new()),
            canceled: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn with_failing_cancels() -> Self {
        Self {
            fail_cancels: true,
            ..Self::new()
        }
    }

    /// Queue an error for the next trigger of `phone`
    pub fn fail_next_trigger(&self, phone: &str, error: DomainError) {
        self.trigger_failures
            .lock()
            .unwrap()
            .entry(phone.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn set_details(&self, external_call_id: &str, details: CallDetails) {
        self.details
            .lock()
            .unwrap()
            .insert(external_call_id.to_string(), details);
    }

    pub fn trigger_count(&self) -> usize {
        self.triggered.lock().unwrap().len()
    }

    pub fn canceled_ids(&self) -> Vec<String> {
        self.canceled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderGateway for FakeGateway {
    async fn trigger(&self, request: &TriggerRequest) -> Result<String, DomainError> {
        self.triggered.lock().unwrap().push(request.clone());
        let queued = self
            .trigger_failures
            .lock()
            .unwrap()
            .get_mut(&request.phone_number)
            .and_then(VecDeque::pop_front);
        match queued {
            Some(error) => Err(error),
            None => Ok(format!("ext-{}", request.phone_number)),
        }
    }

    async fn cancel(&self, external_call_id: &str) -> Result<(), DomainError> {
        self.canceled
            .lock()
            .unwrap()
            .push(external_call_id.to_string());
        if self.fail_cancels {
            return Err(DomainError::ProviderUnavailable("cancel refused".to_string()));
        }
        Ok(())
    }

    async fn fetch_details(&self, external_call_id: &str) -> Result<CallDetails, DomainError> {
        Ok(self
            .details
            .lock()
            .unwrap()
            .get(external_call_id)
            .cloned()
            .unwrap_or_default())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}
