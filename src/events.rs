use std::collections::HashMap;

use crate::pipeline::types::{ProcessingStep, Stage};

/// Lifecycle events emitted by a Super Mode run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Run accepted, before the first stage
    RunStarted,
    /// Stage entered; its step is in `processing`
    StageStarted,
    /// Stage finished cleanly
    StageCompleted,
    /// Stage raised an error; the run is over
    StageFailed,
    /// Analysis payload could not be decoded and the fallback was used
    AnalysisFallback,
    /// Run produced a result
    RunCompleted,
    /// Run stopped by its cancellation token
    RunCancelled,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::RunStarted => "RunStarted",
            Event::StageStarted => "StageStarted",
            Event::StageCompleted => "StageCompleted",
            Event::StageFailed => "StageFailed",
            Event::AnalysisFallback => "AnalysisFallback",
            Event::RunCompleted => "RunCompleted",
            Event::RunCancelled => "RunCancelled",
        }
    }
}

/// Context data that flows through events
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub run_id: String,
    pub stage: Option<Stage>,
    /// Snapshot of the step the event refers to
    pub step: Option<ProcessingStep>,
    pub error: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl EventContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_step(mut self, step: ProcessingStep) -> Self {
        self.stage = Some(step.stage);
        self.step = Some(step);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Handler for events - will be called when events fire
pub type EventHandler = Box<dyn Fn(Event, &EventContext) + Send + Sync>;

/// Manager for dispatching events
#[derive(Default)]
pub struct EventManager {
    handlers: HashMap<Event, Vec<EventHandler>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event
    pub fn on<F>(&mut self, event: Event, handler: F)
    where
        F: Fn(Event, &EventContext) + Send + Sync + 'static,
    {
        self.handlers
            .entry(event)
            .or_default()
            .push(Box::new(handler));
    }

    /// Register one handler for several events
    pub fn on_each<F>(&mut self, events: &[Event], handler: F)
    where
        F: Fn(Event, &EventContext) + Clone + Send + Sync + 'static,
    {
        for event in events {
            self.on(*event, handler.clone());
        }
    }

    /// Fire an event and call all registered handlers
    pub fn fire(&self, event: Event, context: &EventContext) {
        if let Some(handlers) = self.handlers.get(&event) {
            for handler in handlers {
                handler(event, context);
            }
        }
    }

    pub fn has_handlers(&self, event: Event) -> bool {
        self.handlers.get(&event).is_some_and(|h| !h.is_empty())
    }

    pub fn clear(&mut self, event: Event) {
        self.handlers.remove(&event);
    }
}
