//! Mock validator for testing
//!
//! Returns scripted validation results without a gateway.
//! Essential for refinement-loop tests and CI pipelines.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{ValidationResult, WorkflowValidator};
use crate::error::{Result, WeaveError};

/// Mock validator that returns predefined results
pub struct MockValidator {
    /// Queue of results to return (FIFO)
    responses: Arc<Mutex<VecDeque<ValidationResult>>>,
    /// Returned once the queue is drained
    default_response: ValidationResult,
    /// Every YAML text passed to `validate` (for assertions)
    requests: Arc<Mutex<Vec<String>>>,
    /// Simulate a transport failure on every call
    fail: bool,
}

impl MockValidator {
    /// Always reports the workflow as valid
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    /// Queue of results; after the queue drains the last queued result repeats
    pub fn with_responses(responses: Vec<ValidationResult>) -> Self {
        let default_response = responses.last().cloned().unwrap_or_else(ValidationResult::ok);
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            default_response,
            requests: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Every call fails as if the gateway were down
    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Set the result returned when the queue is empty
    pub fn with_default(mut self, response: ValidationResult) -> Self {
        self.default_response = response;
        self
    }

    /// Add a result to the queue
    pub fn queue_response(&self, response: ValidationResult) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// All YAML texts validated so far
    pub fn get_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowValidator for MockValidator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn validate(&self, yaml: &str) -> Result<ValidationResult> {
        self.requests.lock().unwrap().push(yaml.to_string());

        if self.fail {
            return Err(WeaveError::GatewayStatus {
                status: 503,
                body: "mock gateway unavailable".to_string(),
            });
        }

        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.default_response.clone()))
    }
}
