use std::sync::Arc;

use crate::repository::FeedbackRepository;
use crate::retry::RetryableOperation;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn FeedbackRepository>,
    pub retry: RetryableOperation,
}

impl AppState {
    pub fn new(repo: Arc<dyn FeedbackRepository>, retry: RetryableOperation) -> Self {
        Self { repo, retry }
    }
}
