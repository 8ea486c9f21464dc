use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Counters of observed watch events, labeled by resource kind and
/// operation.
///
/// The registry is injected by the caller; nothing here is process-global.
#[derive(Clone, Debug, Default)]
pub struct EventMetrics {
    events: Family<EventLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct EventLabels {
    kind: String,
    op: String,
}

impl EventMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let events = Family::default();
        prom.register(
            "watch_events",
            "Count of observed resource watch events",
            events.clone(),
        );
        Self { events }
    }

    pub(crate) fn incr(&self, kind: &str, op: &str) {
        self.events
            .get_or_create(&EventLabels {
                kind: kind.to_string(),
                op: op.to_string(),
            })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn get(&self, kind: &str, op: &str) -> u64 {
        self.events
            .get_or_create(&EventLabels {
                kind: kind.to_string(),
                op: op.to_string(),
            })
            .get()
    }
}
