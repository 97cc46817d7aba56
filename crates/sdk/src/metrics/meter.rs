//! Meter, instruments and the accumulator they record into

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use contracts::{
    attribute_set_key, normalize_attributes, Aggregation, Descriptor, InstrumentKind,
    InstrumentationScope, KeyValue, NumberKind,
};

use super::aggregator::Aggregator;
use super::selector::AggregatorSelector;

/// One collected (instrument, attribute set) value, before temporality is
/// applied
#[derive(Debug, Clone)]
pub struct Accumulation {
    pub descriptor: Arc<Descriptor>,
    pub attributes: Vec<KeyValue>,
    pub aggregation: Aggregation,
}

type ObserverCallback = Arc<dyn Fn(&ObserverResult) + Send + Sync>;

struct SyncEntry {
    descriptor: Arc<Descriptor>,
    attributes: Vec<KeyValue>,
    aggregator: Aggregator,
    /// Updated since the last collection
    updated: bool,
}

#[derive(Default)]
struct AccumulatorState {
    instruments: HashMap<(InstrumentationScope, String), Arc<Descriptor>>,
    sync: HashMap<(Arc<Descriptor>, String), SyncEntry>,
    observers: Vec<(Arc<Descriptor>, ObserverCallback)>,
}

/// Shared state behind every meter of a controller
pub struct Accumulator {
    selector: Arc<dyn AggregatorSelector>,
    state: Mutex<AccumulatorState>,
}

impl Accumulator {
    pub fn new(selector: Arc<dyn AggregatorSelector>) -> Self {
        Self {
            selector,
            state: Mutex::new(AccumulatorState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, AccumulatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn sync_len(&self) -> usize {
        self.state().sync.len()
    }

    /// Register an instrument; re-registering a name in the same scope
    /// returns the first descriptor
    fn register(&self, descriptor: Descriptor) -> Arc<Descriptor> {
        let key = (descriptor.scope.clone(), descriptor.name.clone());
        let mut state = self.state();
        let registered = state
            .instruments
            .entry(key)
            .or_insert_with(|| Arc::new(descriptor.clone()));
        if registered.instrument_kind != descriptor.instrument_kind {
            warn!(
                instrument = %descriptor.name,
                registered = ?registered.instrument_kind,
                requested = ?descriptor.instrument_kind,
                "Instrument already registered with a different kind"
            );
        }
        Arc::clone(registered)
    }

    fn record(&self, descriptor: &Arc<Descriptor>, value: f64, attributes: &[KeyValue]) {
        let attributes = normalize_attributes(attributes.iter().cloned());
        let key = (Arc::clone(descriptor), attribute_set_key(&attributes));
        let mut state = self.state();
        let entry = state.sync.entry(key).or_insert_with(|| SyncEntry {
            descriptor: Arc::clone(descriptor),
            aggregator: self.selector.aggregator_for(descriptor),
            attributes,
            updated: false,
        });
        entry.aggregator.update(value);
        entry.updated = true;
    }

    /// Checkpoint every synchronous instrument updated since the last call
    /// and run every observer callback.
    ///
    /// Attribute sets idle for a whole interval are dropped; recording into
    /// them again starts a fresh aggregator.
    pub fn collect(&self) -> Vec<Accumulation> {
        let (mut out, observers) = {
            let mut state = self.state();
            state.sync.retain(|_, entry| entry.updated);
            let out: Vec<Accumulation> = state
                .sync
                .values_mut()
                .map(|entry| {
                    entry.updated = false;
                    Accumulation {
                        descriptor: Arc::clone(&entry.descriptor),
                        attributes: entry.attributes.clone(),
                        aggregation: entry.aggregator.checkpoint(),
                    }
                })
                .collect();
            (out, state.observers.clone())
        };

        // Callbacks run without the lock so they may record synchronously
        for (descriptor, callback) in observers {
            let result = ObserverResult {
                descriptor: Arc::clone(&descriptor),
                observations: Mutex::new(Vec::new()),
            };
            callback(&result);
            let observations = result
                .observations
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner);

            let mut grouped: Vec<(String, Vec<KeyValue>, Aggregator)> = Vec::new();
            for (attributes, value) in observations {
                let key = attribute_set_key(&attributes);
                let idx = match grouped.iter().position(|(k, _, _)| *k == key) {
                    Some(idx) => idx,
                    None => {
                        let aggregator = if descriptor.instrument_kind.precomputed_sum() {
                            // Observed sums are already totals: the last one wins
                            Aggregator::last_value()
                        } else {
                            self.selector.aggregator_for(&descriptor)
                        };
                        grouped.push((key, attributes.clone(), aggregator));
                        grouped.len() - 1
                    }
                };
                grouped[idx].2.update(value);
            }

            for (_, attributes, aggregator) in grouped {
                let aggregation = match aggregator.to_aggregation() {
                    Aggregation::LastValue(Some((value, _)))
                        if descriptor.instrument_kind.precomputed_sum() =>
                    {
                        Aggregation::Sum(value)
                    }
                    aggregation => aggregation,
                };
                out.push(Accumulation {
                    descriptor: Arc::clone(&descriptor),
                    attributes,
                    aggregation,
                });
            }
        }
        out
    }
}

/// Handle passed to observer callbacks
pub struct ObserverResult {
    descriptor: Arc<Descriptor>,
    observations: Mutex<Vec<(Vec<KeyValue>, f64)>>,
}

impl ObserverResult {
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn observe(&self, value: f64, attributes: &[KeyValue]) {
        let attributes = normalize_attributes(attributes.iter().cloned());
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((attributes, value));
    }
}

/// Creates instruments for one instrumentation scope
#[derive(Clone)]
pub struct Meter {
    scope: InstrumentationScope,
    accumulator: Arc<Accumulator>,
}

impl Meter {
    pub fn new(scope: InstrumentationScope, accumulator: Arc<Accumulator>) -> Self {
        Self { scope, accumulator }
    }

    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    fn descriptor(&self, name: impl Into<String>, kind: InstrumentKind) -> Descriptor {
        Descriptor::new(name, kind, NumberKind::F64).with_scope(self.scope.clone())
    }

    /// Register a synchronous instrument from a full descriptor; the scope is
    /// replaced with this meter's
    pub fn sync_instrument(&self, descriptor: Descriptor) -> SyncInstrument {
        SyncInstrument {
            descriptor: self
                .accumulator
                .register(descriptor.with_scope(self.scope.clone())),
            accumulator: Arc::clone(&self.accumulator),
        }
    }

    pub fn counter(&self, name: impl Into<String>) -> Counter {
        Counter(self.sync_instrument(self.descriptor(name, InstrumentKind::Counter)))
    }

    pub fn up_down_counter(&self, name: impl Into<String>) -> UpDownCounter {
        UpDownCounter(self.sync_instrument(self.descriptor(name, InstrumentKind::UpDownCounter)))
    }

    pub fn histogram(&self, name: impl Into<String>) -> Histogram {
        Histogram(self.sync_instrument(self.descriptor(name, InstrumentKind::Histogram)))
    }

    /// Register an asynchronous instrument; `callback` runs on every collection
    pub fn observer<F>(&self, descriptor: Descriptor, callback: F) -> Arc<Descriptor>
    where
        F: Fn(&ObserverResult) + Send + Sync + 'static,
    {
        let descriptor = self
            .accumulator
            .register(descriptor.with_scope(self.scope.clone()));
        self.accumulator
            .state()
            .observers
            .push((Arc::clone(&descriptor), Arc::new(callback)));
        descriptor
    }

    pub fn sum_observer<F>(&self, name: impl Into<String>, callback: F) -> Arc<Descriptor>
    where
        F: Fn(&ObserverResult) + Send + Sync + 'static,
    {
        self.observer(self.descriptor(name, InstrumentKind::SumObserver), callback)
    }

    pub fn up_down_sum_observer<F>(&self, name: impl Into<String>, callback: F) -> Arc<Descriptor>
    where
        F: Fn(&ObserverResult) + Send + Sync + 'static,
    {
        self.observer(
            self.descriptor(name, InstrumentKind::UpDownSumObserver),
            callback,
        )
    }

    pub fn value_observer<F>(&self, name: impl Into<String>, callback: F) -> Arc<Descriptor>
    where
        F: Fn(&ObserverResult) + Send + Sync + 'static,
    {
        self.observer(self.descriptor(name, InstrumentKind::ValueObserver), callback)
    }
}

/// Synchronous instrument handle
#[derive(Clone)]
pub struct SyncInstrument {
    descriptor: Arc<Descriptor>,
    accumulator: Arc<Accumulator>,
}

impl SyncInstrument {
    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.descriptor
    }

    pub fn record(&self, value: f64, attributes: &[KeyValue]) {
        self.accumulator.record(&self.descriptor, value, attributes);
    }
}

/// Monotonic synchronous sum
#[derive(Clone)]
pub struct Counter(SyncInstrument);

impl Counter {
    pub fn add(&self, value: f64, attributes: &[KeyValue]) {
        if value < 0.0 {
            warn!(instrument = %self.0.descriptor.name, value, "Negative counter increment ignored");
            return;
        }
        self.0.record(value, attributes);
    }
}

/// Non-monotonic synchronous sum
#[derive(Clone)]
pub struct UpDownCounter(SyncInstrument);

impl UpDownCounter {
    pub fn add(&self, value: f64, attributes: &[KeyValue]) {
        self.0.record(value, attributes);
    }
}

/// Synchronous distribution
#[derive(Clone)]
pub struct Histogram(SyncInstrument);

impl Histogram {
    pub fn record(&self, value: f64, attributes: &[KeyValue]) {
        self.0.record(value, attributes);
    }
}
