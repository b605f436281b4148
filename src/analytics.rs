//! Fire-and-forget product analytics.
//!
//! Services report events through the [`Analytics`] trait. Tracking never
//! fails and never blocks the caller; delivery to a vendor is outside this
//! crate, so the default sink writes events to the log.

use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub user_id: String,
    pub event: String,
    pub properties: Value,
}

pub trait Analytics: Send + Sync {
    fn track(&self, event: AnalyticsEvent);
}

/// Logs every event at `info` under the `analytics` target.
#[derive(Debug, Default)]
pub struct LogAnalytics;

impl Analytics for LogAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        tracing::info!(
            target: "analytics",
            user_id = %event.user_id,
            event = %event.event,
            properties = %event.properties,
            "track"
        );
    }
}

/// Keeps events in memory, in the order they were tracked.
#[derive(Debug, Default)]
pub struct MemoryAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event).collect()
    }
}

impl Analytics for MemoryAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_analytics_keeps_order() {
        let sink = MemoryAnalytics::new();
        for name in ["a", "b", "c"] {
            sink.track(AnalyticsEvent {
                user_id: "u1".to_string(),
                event: name.to_string(),
                properties: json!({}),
            });
        }
        assert_eq!(sink.event_names(), vec!["a", "b", "c"]);
    }
}
