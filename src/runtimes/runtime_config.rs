use crate::clients::RetryPolicy;

/// Per-run engine knobs supplied alongside a turn request.
///
/// Thread and user identity arrive as run arguments; this config carries
/// the knobs that are usually shared across turns: which chat model to
/// ask for, how many node executions one run may spend, how large the
/// event queue is, and how external calls are retried.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Chat model identifier forwarded to the injected model client.
    pub model: String,
    /// Maximum node executions per run before the run is forced to pause.
    pub step_budget: u32,
    /// Capacity of the bounded per-run event queue.
    pub event_capacity: usize,
    /// Timeout and retry bounds for every external client call.
    pub retry: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: Self::resolve_model(None),
            step_budget: 24,
            event_capacity: 64,
            retry: RetryPolicy::default(),
        }
    }
}

impl RunConfig {
    fn resolve_model(provided: Option<String>) -> String {
        if let Some(model) = provided {
            return model;
        }
        dotenvy::dotenv().ok();
        std::env::var("TUTORGRAPH_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string())
    }

    #[must_use]
    pub fn new(model: Option<String>) -> Self {
        Self {
            model: Self::resolve_model(model),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_step_budget(mut self, step_budget: u32) -> Self {
        self.step_budget = step_budget;
        self
    }

    #[must_use]
    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
