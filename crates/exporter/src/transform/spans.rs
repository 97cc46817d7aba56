//! SpanData → ResourceSpans

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use contracts::{
    EventRecord, Resource, ResourceSpans, ScopeSpans, SpanData, SpanKind, SpanRecord, Status,
    StatusCode, StatusRecord, WireSpanKind,
};

/// Group spans by resource, then by instrumentation scope, preserving
/// first-seen order. Spans with an invalid context are skipped.
pub fn spans(batch: &[SpanData]) -> Vec<ResourceSpans> {
    let mut groups: Vec<(Arc<Resource>, Vec<ScopeSpans>)> = Vec::new();

    for span in batch.iter().filter(|s| s.span_context.is_valid()) {
        let idx = match groups
            .iter()
            .position(|(resource, _)| same_resource(resource, &span.resource))
        {
            Some(idx) => idx,
            None => {
                groups.push((Arc::clone(&span.resource), Vec::new()));
                groups.len() - 1
            }
        };
        let scopes = &mut groups[idx].1;
        match scopes.iter_mut().find(|s| s.scope == span.scope) {
            Some(scope) => scope.spans.push(span_record(span)),
            None => scopes.push(ScopeSpans {
                scope: span.scope.clone(),
                spans: vec![span_record(span)],
            }),
        }
    }

    groups
        .into_iter()
        .map(|(resource, scope_spans)| ResourceSpans {
            resource: Resource::clone(&resource),
            scope_spans,
        })
        .collect()
}

fn same_resource(a: &Arc<Resource>, b: &Arc<Resource>) -> bool {
    Arc::ptr_eq(a, b) || a.equivalence_key() == b.equivalence_key()
}

fn span_record(span: &SpanData) -> SpanRecord {
    let parent_span_id = if span.parent_span_id.is_valid() {
        span.parent_span_id.to_hex()
    } else {
        String::new()
    };

    SpanRecord {
        trace_id: span.span_context.trace_id.to_hex(),
        span_id: span.span_context.span_id.to_hex(),
        parent_span_id,
        name: span.name.clone(),
        kind: wire_kind(span.kind),
        start_time_unix_nano: unix_nanos(span.start_time),
        end_time_unix_nano: unix_nanos(span.end_time),
        attributes: span.attributes.clone(),
        dropped_attributes_count: span.dropped_attributes_count,
        events: span
            .events
            .iter()
            .map(|event| EventRecord {
                name: event.name.clone(),
                time_unix_nano: unix_nanos(event.timestamp),
                attributes: event.attributes.clone(),
            })
            .collect(),
        status: match &span.status {
            Status::Unset => StatusRecord {
                code: StatusCode::StatusCodeUnset,
                message: String::new(),
            },
            Status::Ok => StatusRecord {
                code: StatusCode::StatusCodeOk,
                message: String::new(),
            },
            Status::Error { description } => StatusRecord {
                code: StatusCode::StatusCodeError,
                message: description.clone(),
            },
        },
    }
}

fn wire_kind(kind: SpanKind) -> WireSpanKind {
    match kind {
        SpanKind::Internal => WireSpanKind::SpanKindInternal,
        SpanKind::Server => WireSpanKind::SpanKindServer,
        SpanKind::Client => WireSpanKind::SpanKindClient,
        SpanKind::Producer => WireSpanKind::SpanKindProducer,
        SpanKind::Consumer => WireSpanKind::SpanKindConsumer,
    }
}

/// Nanoseconds since the Unix epoch; pre-epoch times clamp to 0
pub(crate) fn unix_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
