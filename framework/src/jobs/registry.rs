use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::traits::{Job, JobResult};

type HandlerFn<S> =
    dyn Fn(serde_json::Value, Arc<S>) -> Pin<Box<dyn Future<Output = JobResult> + Send>> + Send + Sync;

pub(crate) type BoxedHandler<S> = Arc<HandlerFn<S>>;

/// Maps queue names to deserialization + execution logic.
///
/// Register each [`Job`] type before passing the registry to a [`Worker`](super::Worker).
/// A queue holds a single job type, registering a second type for the same
/// queue replaces the first.
pub struct JobRegistry<S: Send + Sync + 'static> {
    handlers: HashMap<&'static str, BoxedHandler<S>>,
}

impl<S: Send + Sync + 'static> JobRegistry<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a [`Job`] type so the worker can deserialize and execute it.
    pub fn register<J: Job<Context = S>>(mut self) -> Self {
        let handler: BoxedHandler<S> = Arc::new(move |payload, ctx| {
            Box::pin(async move {
                let job: J = serde_json::from_value(payload)?;
                job.perform(&ctx).await
            })
        });
        if self.handlers.insert(J::QUEUE, handler).is_some() {
            tracing::warn!(queue = J::QUEUE, "replacing handler for queue");
        }
        self
    }

    /// Registered queue names, sorted.
    pub fn queues(&self) -> Vec<&'static str> {
        let mut queues: Vec<_> = self.handlers.keys().copied().collect();
        queues.sort_unstable();
        queues
    }

    pub fn contains(&self, queue: &str) -> bool {
        self.handlers.contains_key(queue)
    }

    pub(crate) fn get(&self, queue: &str) -> Option<&BoxedHandler<S>> {
        self.handlers.get(queue)
    }
}

impl<S: Send + Sync + 'static> Default for JobRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
