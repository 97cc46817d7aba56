//! CheckpointSet → ResourceMetrics

use std::sync::Arc;

use contracts::{
    Aggregation, AggregationKind, AggregationTemporality, CheckpointSet, ExportKind,
    ExportKindSelector, HistogramDataPoint, MetricData, MetricRecord, NumberDataPoint,
    NumberKind, NumberValue, Record, Resource, ResourceMetrics, ScopeMetrics, SummaryDataPoint,
    TransformError, ValueAtQuantile,
};

use super::spans::unix_nanos;

/// Convert every record of `set` into wire metrics grouped by resource and
/// instrumentation scope.
///
/// `selector` is queried once per record and also passed to
/// [`CheckpointSet::for_each`]. Conversion is spread over `workers` scoped
/// threads when `workers > 1`; the output order does not depend on it. The
/// first failing record aborts the transform.
pub fn checkpoint_set(
    selector: &dyn ExportKindSelector,
    set: &dyn CheckpointSet,
    workers: usize,
) -> Result<Vec<ResourceMetrics>, TransformError> {
    let mut records: Vec<Record> = Vec::new();
    set.for_each(selector, &mut |record: &Record| {
        if !record.aggregation.is_empty() {
            records.push(record.clone());
        }
        Ok(())
    })?;

    let converted = convert_all(selector, &records, workers)?;
    Ok(group(&records, converted))
}

fn convert_all(
    selector: &dyn ExportKindSelector,
    records: &[Record],
    workers: usize,
) -> Result<Vec<MetricRecord>, TransformError> {
    if workers <= 1 || records.len() <= 1 {
        return records.iter().map(|r| metric_record(selector, r)).collect();
    }

    let chunk_size = records.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = records
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|r| metric_record(selector, r))
                        .collect::<Result<Vec<_>, _>>()
                })
            })
            .collect();

        let mut out = Vec::with_capacity(records.len());
        for handle in handles {
            match handle.join() {
                Ok(chunk) => out.extend(chunk?),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        Ok(out)
    })
}

/// Group converted records (parallel to `records`) by resource then scope
fn group(records: &[Record], converted: Vec<MetricRecord>) -> Vec<ResourceMetrics> {
    let mut groups: Vec<(Arc<Resource>, String, Vec<ScopeMetrics>)> = Vec::new();

    for (record, metric) in records.iter().zip(converted) {
        let key = record.resource.equivalence_key();
        let idx = match groups.iter().position(|(_, k, _)| *k == key) {
            Some(idx) => idx,
            None => {
                groups.push((Arc::clone(&record.resource), key, Vec::new()));
                groups.len() - 1
            }
        };
        let scopes = &mut groups[idx].2;
        let scope = &record.descriptor.scope;
        match scopes.iter_mut().find(|s| s.scope == *scope) {
            Some(existing) => existing.metrics.push(metric),
            None => scopes.push(ScopeMetrics {
                scope: scope.clone(),
                metrics: vec![metric],
            }),
        }
    }

    groups
        .into_iter()
        .map(|(resource, _, scope_metrics)| ResourceMetrics {
            resource: Resource::clone(&resource),
            scope_metrics,
        })
        .collect()
}

fn temporality(kind: ExportKind) -> AggregationTemporality {
    match kind {
        ExportKind::Cumulative => AggregationTemporality::AggregationTemporalityCumulative,
        ExportKind::Delta => AggregationTemporality::AggregationTemporalityDelta,
    }
}

fn number(kind: NumberKind, value: f64) -> NumberValue {
    match kind {
        NumberKind::I64 => NumberValue::AsInt(value as i64),
        NumberKind::F64 => NumberValue::AsDouble(value),
    }
}

fn metric_record(
    selector: &dyn ExportKindSelector,
    record: &Record,
) -> Result<MetricRecord, TransformError> {
    let descriptor = &record.descriptor;
    let kind = record.aggregation.kind();
    let export_kind = selector.export_kind_for(descriptor, kind);
    let start = unix_nanos(record.start_time);
    let end = unix_nanos(record.end_time);
    let attributes = record.attributes.clone();

    let data = match &record.aggregation {
        Aggregation::Sum(value) => MetricData::Sum {
            data_points: vec![NumberDataPoint {
                attributes,
                start_time_unix_nano: start,
                time_unix_nano: end,
                value: number(descriptor.number_kind, *value),
            }],
            aggregation_temporality: temporality(export_kind),
            is_monotonic: descriptor.instrument_kind.monotonic(),
        },
        Aggregation::LastValue(Some((value, observed_at))) => MetricData::Gauge {
            data_points: vec![NumberDataPoint {
                attributes,
                start_time_unix_nano: start,
                time_unix_nano: unix_nanos(*observed_at),
                value: number(descriptor.number_kind, *value),
            }],
        },
        Aggregation::MinMaxSumCount {
            min,
            max,
            sum,
            count,
        } => MetricData::Summary {
            data_points: vec![SummaryDataPoint {
                attributes,
                start_time_unix_nano: start,
                time_unix_nano: end,
                count: *count,
                sum: *sum,
                quantile_values: vec![
                    ValueAtQuantile {
                        quantile: 0.0,
                        value: *min,
                    },
                    ValueAtQuantile {
                        quantile: 1.0,
                        value: *max,
                    },
                ],
            }],
        },
        Aggregation::Histogram {
            boundaries,
            counts,
            sum,
            count,
        } => {
            if counts.len() != boundaries.len() + 1 {
                return Err(TransformError::UnsupportedAggregation {
                    name: descriptor.name.clone(),
                    kind: AggregationKind::Histogram,
                });
            }
            MetricData::Histogram {
                data_points: vec![HistogramDataPoint {
                    attributes,
                    start_time_unix_nano: start,
                    time_unix_nano: end,
                    count: *count,
                    sum: *sum,
                    bucket_counts: counts.clone(),
                    explicit_bounds: boundaries.clone(),
                }],
                aggregation_temporality: temporality(export_kind),
            }
        }
        Aggregation::LastValue(None) => {
            return Err(TransformError::UnsupportedAggregation {
                name: descriptor.name.clone(),
                kind,
            })
        }
    };

    Ok(MetricRecord {
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        unit: descriptor.unit.clone(),
        data,
    })
}
