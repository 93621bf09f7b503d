//! Scripted dispatcher for engine tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use switchyard_ai::{Completion, Dispatch, DispatchRequest, Termination};
use switchyard_catalog::{ErrorKind, ModelDescriptor};

type Responder = Box<dyn Fn(usize, &str) -> String + Send + Sync>;

/// Counts calls, fails at chosen call indices, answers from a closure.
pub(crate) struct ScriptedDispatch {
    calls: AtomicUsize,
    fail_on: HashSet<usize>,
    responder: Responder,
    seen: Mutex<Vec<(String, DispatchRequest)>>,
}

impl ScriptedDispatch {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: HashSet::new(),
            responder: Box::new(|_, prompt| format!("answer to {prompt}")),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_at(mut self, calls: &[usize]) -> Self {
        self.fail_on = calls.iter().copied().collect();
        self
    }

    /// Answer with `f(call_index, user_prompt)`.
    pub(crate) fn responding(
        mut self,
        f: impl Fn(usize, &str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.responder = Box::new(f);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|(_, r)| r.user_prompt).collect()
    }

    pub(crate) fn models(&self) -> Vec<String> {
        self.requests().into_iter().map(|(m, _)| m).collect()
    }

    pub(crate) fn requests(&self) -> Vec<(String, DispatchRequest)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Dispatch for ScriptedDispatch {
    async fn dispatch(&self, model: &ModelDescriptor, request: &DispatchRequest) -> Completion {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((model.id.clone(), request.clone()));
        }

        if self.fail_on.contains(&index) {
            return Completion::failed(
                ErrorKind::Backend,
                format!("scripted failure at call {index}"),
                Duration::from_millis(1),
            );
        }

        let text = (self.responder)(index, &request.user_prompt);
        Completion {
            input_tokens: switchyard_local::estimate_tokens(&request.user_prompt),
            output_tokens: switchyard_local::estimate_tokens(&text),
            text,
            duration_ms: 10,
            termination: Termination::Normal,
        }
    }
}
