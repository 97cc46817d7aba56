//! AggregationProcessor - applies export temporality to accumulations
//!
//! Synchronous instruments report deltas and observers of sums report
//! totals. The processor keeps whatever memory the configured
//! [`ExportKindSelector`] needs to turn either into the requested kind, and
//! produces a [`ProcessorCheckpoint`] for the exporter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use contracts::{
    attribute_set_key, Aggregation, CheckpointSet, Descriptor, ExportKind, ExportKindSelector,
    KeyValue, Record, Resource, TransformError,
};

use super::aggregator::{merge, subtract};
use super::meter::Accumulation;

struct StateEntry {
    descriptor: Arc<Descriptor>,
    attributes: Vec<KeyValue>,
    /// Running total (cumulative output of delta input)
    cumulative: Option<Aggregation>,
    /// Previous total (delta output of precomputed sums)
    previous: Option<Aggregation>,
}

/// Stateful temporality processor
///
/// Only (instrument, attribute set) pairs whose export kind needs memory
/// across collections are kept: cumulative synchronous instruments and delta
/// precomputed sums.
pub struct AggregationProcessor {
    selector: Arc<dyn ExportKindSelector>,
    start_time: SystemTime,
    last_collection: SystemTime,
    state: HashMap<(Arc<Descriptor>, String), StateEntry>,
}

impl AggregationProcessor {
    pub fn new(selector: Arc<dyn ExportKindSelector>) -> Self {
        let now = SystemTime::now();
        Self {
            selector,
            start_time: now,
            last_collection: now,
            state: HashMap::new(),
        }
    }

    pub fn selector(&self) -> &Arc<dyn ExportKindSelector> {
        &self.selector
    }

    #[cfg(test)]
    fn state_len(&self) -> usize {
        self.state.len()
    }

    /// Fold one collection into a checkpoint stamped `now`
    pub fn checkpoint(
        &mut self,
        accumulations: Vec<Accumulation>,
        resource: &Arc<Resource>,
        now: SystemTime,
    ) -> ProcessorCheckpoint {
        let interval_start = self.last_collection;
        let mut records = Vec::with_capacity(accumulations.len());
        let mut reported = std::collections::HashSet::new();

        for acc in accumulations {
            let export_kind = self
                .selector
                .export_kind_for(&acc.descriptor, acc.aggregation.kind());
            let instrument_kind = acc.descriptor.instrument_kind;

            let (aggregation, start_time) = if export_kind.memory_required(instrument_kind) {
                let key = (Arc::clone(&acc.descriptor), attribute_set_key(&acc.attributes));
                let entry = self.state.entry(key.clone()).or_insert_with(|| StateEntry {
                    descriptor: Arc::clone(&acc.descriptor),
                    attributes: acc.attributes.clone(),
                    cumulative: None,
                    previous: None,
                });
                reported.insert(key);

                if instrument_kind.synchronous() {
                    let total = match &entry.cumulative {
                        Some(total) => merge(total, &acc.aggregation),
                        None => acc.aggregation,
                    };
                    entry.cumulative = Some(total.clone());
                    (total, self.start_time)
                } else {
                    let delta = entry
                        .previous
                        .as_ref()
                        .and_then(|previous| subtract(&acc.aggregation, previous))
                        .unwrap_or_else(|| acc.aggregation.clone());
                    entry.previous = Some(acc.aggregation);
                    (delta, interval_start)
                }
            } else {
                // Passed through as collected; nothing kept for the next interval
                let start = match export_kind {
                    ExportKind::Cumulative => self.start_time,
                    ExportKind::Delta => interval_start,
                };
                (acc.aggregation, start)
            };

            records.push((
                export_kind,
                Record {
                    descriptor: acc.descriptor,
                    attributes: acc.attributes,
                    resource: Arc::clone(resource),
                    aggregation,
                    start_time,
                    end_time: now,
                },
            ));
        }

        // Cumulative totals keep reporting when nothing changed this interval
        for (key, entry) in &self.state {
            if reported.contains(key) {
                continue;
            }
            if let Some(total) = &entry.cumulative {
                records.push((
                    ExportKind::Cumulative,
                    Record {
                        descriptor: Arc::clone(&entry.descriptor),
                        attributes: entry.attributes.clone(),
                        resource: Arc::clone(resource),
                        aggregation: total.clone(),
                        start_time: self.start_time,
                        end_time: now,
                    },
                ));
            }
        }

        self.last_collection = now;
        ProcessorCheckpoint { records }
    }
}

/// Owned checkpoint produced by [`AggregationProcessor::checkpoint`]
#[derive(Debug, Clone, Default)]
pub struct ProcessorCheckpoint {
    records: Vec<(ExportKind, Record)>,
}

impl ProcessorCheckpoint {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().map(|(_, record)| record)
    }
}

impl CheckpointSet for ProcessorCheckpoint {
    fn for_each(
        &self,
        selector: &dyn ExportKindSelector,
        f: &mut dyn FnMut(&Record) -> Result<(), TransformError>,
    ) -> Result<(), TransformError> {
        for (computed, record) in &self.records {
            let requested =
                selector.export_kind_for(&record.descriptor, record.aggregation.kind());
            if requested != *computed {
                return Err(TransformError::IncompatibleExportKind {
                    name: record.descriptor.name.clone(),
                    computed: *computed,
                    requested,
                });
            }
            f(record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        CumulativeExportKindSelector, DeltaExportKindSelector, InstrumentKind, NumberKind,
    };

    fn acc(kind: InstrumentKind, value: f64) -> Accumulation {
        Accumulation {
            descriptor: Arc::new(Descriptor::new("m", kind, NumberKind::F64)),
            attributes: Vec::new(),
            aggregation: Aggregation::Sum(value),
        }
    }

    fn acc_with(kind: InstrumentKind, value: f64, attributes: Vec<KeyValue>) -> Accumulation {
        Accumulation {
            attributes,
            ..acc(kind, value)
        }
    }

    fn sums(checkpoint: &ProcessorCheckpoint) -> Vec<f64> {
        checkpoint
            .records()
            .map(|r| match r.aggregation {
                Aggregation::Sum(v) => v,
                _ => panic!("expected sum"),
            })
            .collect()
    }

    #[test]
    fn test_cumulative_counter_accumulates() {
        let mut processor = AggregationProcessor::new(Arc::new(CumulativeExportKindSelector));
        let resource = Arc::new(Resource::empty());

        let first = processor.checkpoint(
            vec![acc(InstrumentKind::Counter, 2.0)],
            &resource,
            SystemTime::now(),
        );
        assert_eq!(sums(&first), vec![2.0]);

        let second = processor.checkpoint(
            vec![acc(InstrumentKind::Counter, 3.0)],
            &resource,
            SystemTime::now(),
        );
        assert_eq!(sums(&second), vec![5.0]);

        // No update: the total is still reported
        let third = processor.checkpoint(Vec::new(), &resource, SystemTime::now());
        assert_eq!(sums(&third), vec![5.0]);
    }

    #[test]
    fn test_delta_precomputed_sum_subtracts() {
        let mut processor = AggregationProcessor::new(Arc::new(DeltaExportKindSelector));
        let resource = Arc::new(Resource::empty());

        let first = processor.checkpoint(
            vec![acc(InstrumentKind::SumObserver, 10.0)],
            &resource,
            SystemTime::now(),
        );
        assert_eq!(sums(&first), vec![10.0]);

        let second = processor.checkpoint(
            vec![acc(InstrumentKind::SumObserver, 14.0)],
            &resource,
            SystemTime::now(),
        );
        assert_eq!(sums(&second), vec![4.0]);

        // Delta records are not repeated
        let third = processor.checkpoint(Vec::new(), &resource, SystemTime::now());
        assert!(third.is_empty());
    }

    #[test]
    fn test_for_each_rejects_other_export_kind() {
        let mut processor = AggregationProcessor::new(Arc::new(DeltaExportKindSelector));
        let checkpoint = processor.checkpoint(
            vec![acc(InstrumentKind::Counter, 1.0)],
            &Arc::new(Resource::empty()),
            SystemTime::now(),
        );

        let mut seen = 0;
        checkpoint
            .for_each(&DeltaExportKindSelector, &mut |_: &Record| {
                seen += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, 1);

        let err = checkpoint
            .for_each(&CumulativeExportKindSelector, &mut |_: &Record| Ok(()))
            .unwrap_err();
        assert_eq!(
            err,
            TransformError::IncompatibleExportKind {
                name: "m".into(),
                computed: ExportKind::Delta,
                requested: ExportKind::Cumulative,
            }
        );
    }

    #[test]
    fn test_stateless_kinds_keep_no_memory() {
        let resource = Arc::new(Resource::empty());

        let mut delta = AggregationProcessor::new(Arc::new(DeltaExportKindSelector));
        for i in 0..50 {
            let attributes = vec![KeyValue::new("request.id", i as i64)];
            delta.checkpoint(
                vec![
                    acc_with(InstrumentKind::Counter, 1.0, attributes.clone()),
                    acc_with(InstrumentKind::ValueObserver, 1.0, attributes),
                ],
                &resource,
                SystemTime::now(),
            );
        }
        assert_eq!(delta.state_len(), 0);

        let mut cumulative = AggregationProcessor::new(Arc::new(CumulativeExportKindSelector));
        for i in 0..50 {
            let attributes = vec![KeyValue::new("request.id", i as i64)];
            cumulative.checkpoint(
                vec![
                    acc_with(InstrumentKind::SumObserver, 1.0, attributes.clone()),
                    acc_with(InstrumentKind::ValueObserver, 1.0, attributes),
                ],
                &resource,
                SystemTime::now(),
            );
        }
        assert_eq!(cumulative.state_len(), 0);
    }

    #[test]
    fn test_stateful_kinds_keep_one_entry_per_series() {
        let resource = Arc::new(Resource::empty());

        let mut cumulative = AggregationProcessor::new(Arc::new(CumulativeExportKindSelector));
        let mut delta = AggregationProcessor::new(Arc::new(DeltaExportKindSelector));
        for _ in 0..3 {
            cumulative.checkpoint(
                vec![acc(InstrumentKind::Counter, 1.0)],
                &resource,
                SystemTime::now(),
            );
            delta.checkpoint(
                vec![acc(InstrumentKind::SumObserver, 1.0)],
                &resource,
                SystemTime::now(),
            );
        }
        assert_eq!(cumulative.state_len(), 1);
        assert_eq!(delta.state_len(), 1);
    }

    #[test]
    fn test_lookalike_attribute_sets_stay_separate() {
        let mut processor = AggregationProcessor::new(Arc::new(CumulativeExportKindSelector));
        let resource = Arc::new(Resource::empty());
        let accumulations = vec![
            acc_with(InstrumentKind::Counter, 1.0, vec![KeyValue::new("code", 200i64)]),
            acc_with(InstrumentKind::Counter, 10.0, vec![KeyValue::new("code", "200")]),
            acc_with(InstrumentKind::Counter, 100.0, vec![KeyValue::new("a", "1,b=2")]),
            acc_with(
                InstrumentKind::Counter,
                1000.0,
                vec![KeyValue::new("a", "1"), KeyValue::new("b", "2")],
            ),
        ];

        processor.checkpoint(accumulations, &resource, SystemTime::now());
        let repeated = processor.checkpoint(Vec::new(), &resource, SystemTime::now());

        let mut totals = sums(&repeated);
        totals.sort_by(f64::total_cmp);
        assert_eq!(totals, vec![1.0, 10.0, 100.0, 1000.0]);
    }
}
