//! Scripted client for tests and offline runs
//!
//! Returns canned responses in order, then repeats the last one. A delay can
//! be injected to exercise deadline handling.

use crate::client::{LlmClient, LlmError, LlmRequest, LlmResult};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub struct ScriptedClient {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long before answering; lets tests trip the deadline.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts seen so far, for assertions.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt);
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front());
        match next {
            Some(response) => {
                if let Ok(mut last) = self.last.lock() {
                    *last = Some(response.clone());
                }
                Ok(response)
            }
            None => self
                .last
                .lock()
                .ok()
                .and_then(|l| l.clone())
                .ok_or_else(|| LlmError::RequestFailed("script exhausted".to_string())),
        }
    }
}
