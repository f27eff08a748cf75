//! Lifecycle events for pipeline runs.
//!
//! Sinks are injected into the pipeline and the crew explicitly; there is
//! no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use std::sync::Arc;
use uuid::Uuid;

/// Emits events for one run, stamping the run id and pipeline name.
#[derive(Clone)]
pub struct RunEmitter {
    sink: Arc<dyn EventSink>,
    run_id: Uuid,
    pipeline: String,
}

impl RunEmitter {
    /// Creates a new emitter.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, run_id: Uuid, pipeline: impl Into<String>) -> Self {
        Self {
            sink,
            run_id,
            pipeline: pipeline.into(),
        }
    }

    /// Emits an event, enriching object payloads with run metadata.
    pub fn emit(&self, event_type: &str, data: serde_json::Value) {
        let mut enriched = data;
        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
            map.insert("pipeline".to_string(), serde_json::json!(&self.pipeline));
        }
        self.sink.try_emit(event_type, Some(enriched));
    }
}

impl std::fmt::Debug for RunEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEmitter")
            .field("run_id", &self.run_id)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_enriches_payload() {
        let sink = Arc::new(CollectingEventSink::new());
        let run_id = Uuid::new_v4();
        let emitter = RunEmitter::new(sink.clone(), run_id, "story");

        emitter.emit("stage.started", serde_json::json!({"stage": "skeleton"}));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let data = events[0].1.as_ref().unwrap();
        assert_eq!(data["stage"], "skeleton");
        assert_eq!(data["pipeline"], "story");
        assert_eq!(data["run_id"], run_id.to_string());
    }
}
