//! In-memory backend for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::backend::GenerativeBackend;
use super::error::ModelError;
use super::types::{GenerateRequest, ModelDescriptor};

/// Backend with a fixed catalog and scripted generation results.
pub(crate) struct FakeBackend {
    catalog: Vec<ModelDescriptor>,
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    catalog_calls: AtomicUsize,
    system_instruction: bool,
}

impl FakeBackend {
    pub(crate) fn new(catalog: Vec<ModelDescriptor>) -> Self {
        Self {
            catalog,
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            catalog_calls: AtomicUsize::new(0),
            system_instruction: true,
        }
    }

    /// Results returned by successive `generate` calls.
    pub(crate) fn with_replies<I>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ModelError>>,
    {
        self.replies.lock().unwrap().extend(replies);
        self
    }

    /// Report every model as lacking the system instruction field.
    pub(crate) fn without_system_instruction(mut self) -> Self {
        self.system_instruction = false;
        self
    }

    pub(crate) fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn generate_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl GenerativeBackend for FakeBackend {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ModelError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.catalog.clone())
    }

    async fn generate(
        &self,
        _model: &ModelDescriptor,
        request: &GenerateRequest,
    ) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Remote("no scripted reply".into())))
    }

    fn supports_system_instruction(&self, model: &ModelDescriptor) -> bool {
        self.system_instruction && model.supports_system_instruction()
    }
}
