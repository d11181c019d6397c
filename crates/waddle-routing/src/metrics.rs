//! Routing metrics.
//!
//! Uses the global OpenTelemetry meter provider, which must be initialized
//! by the host application. Without one, recording is a no-op.

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

static METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    METER.get_or_init(|| opentelemetry::global::meter("waddle-routing"))
}

/// Counter for routing decisions, by stanza kind and decision.
pub fn routing_decisions() -> Counter<u64> {
    meter()
        .u64_counter("xmpp.routing.decisions")
        .with_description("Total routing decisions made for inbound stanzas")
        .with_unit("stanza")
        .build()
}

/// Counter for resources delivered to.
pub fn routing_deliveries() -> Counter<u64> {
    meter()
        .u64_counter("xmpp.routing.deliveries")
        .with_description("Total stanza copies enqueued on local sessions")
        .with_unit("stanza")
        .build()
}

/// Record a routing decision.
pub fn record_decision(stanza_kind: &str, decision: &str) {
    routing_decisions().add(
        1,
        &[
            KeyValue::new("kind", stanza_kind.to_string()),
            KeyValue::new("decision", decision.to_string()),
        ],
    );
}

/// Record the result of delivering to local resources.
pub fn record_deliveries(stanza_kind: &str, delivered: usize, failed: usize) {
    let counter = routing_deliveries();
    if delivered > 0 {
        counter.add(
            delivered as u64,
            &[
                KeyValue::new("kind", stanza_kind.to_string()),
                KeyValue::new("result", "sent"),
            ],
        );
    }
    if failed > 0 {
        counter.add(
            failed as u64,
            &[
                KeyValue::new("kind", stanza_kind.to_string()),
                KeyValue::new("result", "failed"),
            ],
        );
    }
}
