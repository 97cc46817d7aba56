//! TracerProvider, Tracer and Span

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, warn};

use contracts::{
    normalize_attributes, BatchConfig, Event, InstrumentationScope, KeyValue, Resource,
    SpanContext, SpanData, SpanExporter, SpanId, SpanKind, Status, TraceId,
};

use super::batch::BatchSpanProcessor;
use super::processor::SpanProcessor;
use crate::error::SdkError;

/// Default cap on attributes per span
pub const DEFAULT_MAX_ATTRIBUTES: usize = 128;

struct ProviderInner {
    resource: Arc<Resource>,
    processors: Vec<Arc<dyn SpanProcessor>>,
    max_attributes: usize,
    is_shutdown: AtomicBool,
}

/// Creates tracers and owns the span processors they report to
///
/// Cheap to clone; clones share processors and shutdown state.
#[derive(Clone)]
pub struct TracerProvider {
    inner: Arc<ProviderInner>,
}

impl std::fmt::Debug for TracerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracerProvider")
            .field("resource", &self.inner.resource)
            .field("processors", &self.inner.processors.len())
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Default for TracerProvider {
    /// A provider without processors: spans are created and discarded
    fn default() -> Self {
        TracerProvider::builder().build()
    }
}

impl TracerProvider {
    pub fn builder() -> TracerProviderBuilder {
        TracerProviderBuilder::default()
    }

    /// Tracer for an instrumentation library
    pub fn tracer(&self, name: impl Into<String>) -> Tracer {
        self.tracer_with_scope(InstrumentationScope::new(name))
    }

    pub fn tracer_with_scope(&self, scope: InstrumentationScope) -> Tracer {
        Tracer {
            provider: self.clone(),
            scope,
        }
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.inner.resource
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::Acquire)
    }

    /// Flush every processor, returning the first error
    pub async fn force_flush(&self) -> Result<(), SdkError> {
        let mut result = Ok(());
        for processor in &self.inner.processors {
            if let Err(e) = processor.force_flush().await {
                warn!(processor = processor.name(), error = %e, "Flush failed");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Shut down every processor once; later calls are no-ops
    pub async fn shutdown(&self) -> Result<(), SdkError> {
        if self.inner.is_shutdown.swap(true, Ordering::AcqRel) {
            debug!("TracerProvider already shut down");
            return Ok(());
        }
        let mut result = Ok(());
        for processor in &self.inner.processors {
            if let Err(e) = processor.shutdown().await {
                warn!(processor = processor.name(), error = %e, "Processor shutdown failed");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn on_end(&self, span: SpanData) {
        match self.inner.processors.split_last() {
            None => {}
            Some((last, rest)) => {
                for processor in rest {
                    processor.on_end(span.clone());
                }
                last.on_end(span);
            }
        }
    }
}

/// Builder for [`TracerProvider`]
#[derive(Default)]
pub struct TracerProviderBuilder {
    resource: Option<Resource>,
    processors: Vec<Arc<dyn SpanProcessor>>,
    max_attributes: Option<usize>,
}

impl TracerProviderBuilder {
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_span_processor(mut self, processor: impl SpanProcessor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Register `exporter` behind a [`BatchSpanProcessor`]
    ///
    /// Spawns the processor worker, so this must run inside a tokio runtime.
    pub fn with_batch_exporter<E>(self, exporter: Arc<E>, config: BatchConfig) -> Self
    where
        E: SpanExporter + Send + Sync + 'static,
    {
        let name = format!("batch-{}", self.processors.len());
        self.with_span_processor(BatchSpanProcessor::spawn(name, exporter, config))
    }

    pub fn with_max_attributes(mut self, max: usize) -> Self {
        self.max_attributes = Some(max);
        self
    }

    pub fn build(self) -> TracerProvider {
        TracerProvider {
            inner: Arc::new(ProviderInner {
                resource: Arc::new(self.resource.unwrap_or_else(Resource::empty)),
                processors: self.processors,
                max_attributes: self.max_attributes.unwrap_or(DEFAULT_MAX_ATTRIBUTES),
                is_shutdown: AtomicBool::new(false),
            }),
        }
    }
}

/// Named tracer bound to one instrumentation scope
#[derive(Clone, Debug)]
pub struct Tracer {
    provider: TracerProvider,
    scope: InstrumentationScope,
}

impl Tracer {
    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Start a root span in a new trace
    pub fn start(&self, name: impl Into<String>) -> Span {
        self.build_span(name.into(), SpanKind::Internal, None)
    }

    pub fn start_with_kind(&self, name: impl Into<String>, kind: SpanKind) -> Span {
        self.build_span(name.into(), kind, None)
    }

    /// Start a span in the parent's trace
    pub fn start_child(&self, name: impl Into<String>, parent: &SpanContext) -> Span {
        self.build_span(name.into(), SpanKind::Internal, Some(*parent))
    }

    fn build_span(&self, name: String, kind: SpanKind, parent: Option<SpanContext>) -> Span {
        let (trace_id, parent_span_id, sampled) = match parent.filter(SpanContext::is_valid) {
            Some(parent) => (parent.trace_id, parent.span_id, parent.sampled),
            None => (random_trace_id(), SpanId::INVALID, true),
        };
        let span_context = SpanContext {
            trace_id,
            span_id: random_span_id(),
            sampled,
        };

        // Spans from a shut down provider are not recorded
        let data = (!self.provider.is_shutdown()).then(|| SpanData {
            span_context,
            parent_span_id,
            name,
            kind,
            start_time: SystemTime::now(),
            end_time: SystemTime::UNIX_EPOCH,
            attributes: Vec::new(),
            events: Vec::new(),
            status: Status::Unset,
            dropped_attributes_count: 0,
            resource: Arc::clone(&self.provider.inner.resource),
            scope: self.scope.clone(),
        });

        Span {
            span_context,
            data,
            provider: self.provider.clone(),
        }
    }
}

/// In-flight span; ends on [`Span::end`] or drop
pub struct Span {
    span_context: SpanContext,
    data: Option<SpanData>,
    provider: TracerProvider,
}

impl Span {
    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Still recording (not ended, provider not shut down)
    pub fn is_recording(&self) -> bool {
        self.data.is_some()
    }

    pub fn set_attribute(&mut self, attribute: KeyValue) {
        let max = self.provider.inner.max_attributes;
        if let Some(data) = self.data.as_mut() {
            match data.attributes.iter().position(|kv| kv.key == attribute.key) {
                Some(idx) => data.attributes[idx].value = attribute.value,
                None if data.attributes.len() < max => data.attributes.push(attribute),
                None => data.dropped_attributes_count += 1,
            }
        }
    }

    pub fn add_event(&mut self, name: impl Into<String>, attributes: Vec<KeyValue>) {
        if let Some(data) = self.data.as_mut() {
            data.events.push(Event {
                name: name.into(),
                timestamp: SystemTime::now(),
                attributes: normalize_attributes(attributes),
            });
        }
    }

    pub fn set_status(&mut self, status: Status) {
        if let Some(data) = self.data.as_mut() {
            // Ok is final
            if data.status != Status::Ok {
                data.status = status;
            }
        }
    }

    pub fn end(mut self) {
        self.end_at(SystemTime::now());
    }

    pub fn end_with_timestamp(mut self, timestamp: SystemTime) {
        self.end_at(timestamp);
    }

    fn end_at(&mut self, timestamp: SystemTime) {
        if let Some(mut data) = self.data.take() {
            data.end_time = timestamp.max(data.start_time);
            data.attributes = normalize_attributes(std::mem::take(&mut data.attributes));
            self.provider.on_end(data);
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.end_at(SystemTime::now());
    }
}

fn random_trace_id() -> TraceId {
    let mut bytes: [u8; 16] = rand::random();
    if bytes == [0; 16] {
        bytes[15] = 1;
    }
    TraceId(bytes)
}

fn random_span_id() -> SpanId {
    let mut bytes: [u8; 8] = rand::random();
    if bytes == [0; 8] {
        bytes[7] = 1;
    }
    SpanId(bytes)
}
