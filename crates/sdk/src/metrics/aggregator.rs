//! Aggregators - fold recorded measurements into one value per collection

use std::time::SystemTime;

use contracts::{Aggregation, AggregationKind};

/// Mutable aggregation state for one (instrument, attribute set)
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregator {
    Sum(f64),
    LastValue(Option<(f64, SystemTime)>),
    MinMaxSumCount {
        min: f64,
        max: f64,
        sum: f64,
        count: u64,
    },
    Histogram {
        boundaries: Vec<f64>,
        counts: Vec<u64>,
        sum: f64,
        count: u64,
    },
}

impl Aggregator {
    pub fn sum() -> Self {
        Aggregator::Sum(0.0)
    }

    pub fn last_value() -> Self {
        Aggregator::LastValue(None)
    }

    pub fn min_max_sum_count() -> Self {
        Aggregator::MinMaxSumCount {
            min: 0.0,
            max: 0.0,
            sum: 0.0,
            count: 0,
        }
    }

    /// `boundaries` must be strictly increasing
    pub fn histogram(boundaries: &[f64]) -> Self {
        Aggregator::Histogram {
            boundaries: boundaries.to_vec(),
            counts: vec![0; boundaries.len() + 1],
            sum: 0.0,
            count: 0,
        }
    }

    pub fn kind(&self) -> AggregationKind {
        match self {
            Aggregator::Sum(_) => AggregationKind::Sum,
            Aggregator::LastValue(_) => AggregationKind::LastValue,
            Aggregator::MinMaxSumCount { .. } => AggregationKind::MinMaxSumCount,
            Aggregator::Histogram { .. } => AggregationKind::Histogram,
        }
    }

    pub fn update(&mut self, value: f64) {
        match self {
            Aggregator::Sum(sum) => *sum += value,
            Aggregator::LastValue(last) => *last = Some((value, SystemTime::now())),
            Aggregator::MinMaxSumCount {
                min,
                max,
                sum,
                count,
            } => {
                if *count == 0 {
                    *min = value;
                    *max = value;
                } else {
                    *min = min.min(value);
                    *max = max.max(value);
                }
                *sum += value;
                *count += 1;
            }
            Aggregator::Histogram {
                boundaries,
                counts,
                sum,
                count,
            } => {
                // Bucket i holds values <= boundaries[i]; the last bucket is overflow
                let bucket = boundaries.partition_point(|bound| *bound < value);
                counts[bucket] += 1;
                *sum += value;
                *count += 1;
            }
        }
    }

    /// Snapshot the current value and reset for the next collection
    pub fn checkpoint(&mut self) -> Aggregation {
        let snapshot = self.to_aggregation();
        match self {
            Aggregator::Sum(sum) => *sum = 0.0,
            Aggregator::LastValue(last) => *last = None,
            Aggregator::MinMaxSumCount { .. } => *self = Aggregator::min_max_sum_count(),
            Aggregator::Histogram {
                counts, sum, count, ..
            } => {
                counts.iter_mut().for_each(|c| *c = 0);
                *sum = 0.0;
                *count = 0;
            }
        }
        snapshot
    }

    pub fn to_aggregation(&self) -> Aggregation {
        match self {
            Aggregator::Sum(sum) => Aggregation::Sum(*sum),
            Aggregator::LastValue(last) => Aggregation::LastValue(*last),
            Aggregator::MinMaxSumCount {
                min,
                max,
                sum,
                count,
            } => Aggregation::MinMaxSumCount {
                min: *min,
                max: *max,
                sum: *sum,
                count: *count,
            },
            Aggregator::Histogram {
                boundaries,
                counts,
                sum,
                count,
            } => Aggregation::Histogram {
                boundaries: boundaries.clone(),
                counts: counts.clone(),
                sum: *sum,
                count: *count,
            },
        }
    }
}

/// Combine two deltas of the same kind into their sum.
///
/// Mismatched kinds (an instrument re-registered with another aggregator)
/// resolve to `delta`.
pub fn merge(acc: &Aggregation, delta: &Aggregation) -> Aggregation {
    match (acc, delta) {
        (Aggregation::Sum(a), Aggregation::Sum(b)) => Aggregation::Sum(a + b),
        (Aggregation::LastValue(a), Aggregation::LastValue(b)) => {
            Aggregation::LastValue(b.or(*a))
        }
        (
            Aggregation::MinMaxSumCount {
                min: amin,
                max: amax,
                sum: asum,
                count: acount,
            },
            Aggregation::MinMaxSumCount {
                min: bmin,
                max: bmax,
                sum: bsum,
                count: bcount,
            },
        ) => {
            if *acount == 0 {
                return delta.clone();
            }
            if *bcount == 0 {
                return acc.clone();
            }
            Aggregation::MinMaxSumCount {
                min: amin.min(*bmin),
                max: amax.max(*bmax),
                sum: asum + bsum,
                count: acount + bcount,
            }
        }
        (
            Aggregation::Histogram {
                boundaries: ab,
                counts: ac,
                sum: asum,
                count: acount,
            },
            Aggregation::Histogram {
                boundaries: bb,
                counts: bc,
                sum: bsum,
                count: bcount,
            },
        ) if ab == bb && ac.len() == bc.len() => Aggregation::Histogram {
            boundaries: ab.clone(),
            counts: ac.iter().zip(bc).map(|(a, b)| a + b).collect(),
            sum: asum + bsum,
            count: acount + bcount,
        },
        _ => delta.clone(),
    }
}

/// Difference between two cumulative sums; `None` for non-sum values
pub fn subtract(current: &Aggregation, previous: &Aggregation) -> Option<Aggregation> {
    match (current, previous) {
        (Aggregation::Sum(c), Aggregation::Sum(p)) => Some(Aggregation::Sum(c - p)),
        _ => None,
    }
}
