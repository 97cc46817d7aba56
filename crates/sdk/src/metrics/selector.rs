//! Aggregator selection per instrument kind

use contracts::{Descriptor, InstrumentKind};

use super::aggregator::Aggregator;

/// Default histogram boundaries
pub const DEFAULT_HISTOGRAM_BOUNDARIES: [f64; 10] =
    [5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 1000.0, 2500.0];

/// Chooses the aggregator for a new (instrument, attribute set)
pub trait AggregatorSelector: Send + Sync {
    fn aggregator_for(&self, descriptor: &Descriptor) -> Aggregator;
}

/// Sums for adding instruments, last value for value observers and
/// min/max/sum/count for histograms
#[derive(Debug, Clone, Copy, Default)]
pub struct InexpensiveDistribution;

impl AggregatorSelector for InexpensiveDistribution {
    fn aggregator_for(&self, descriptor: &Descriptor) -> Aggregator {
        match descriptor.instrument_kind {
            InstrumentKind::ValueObserver => Aggregator::last_value(),
            InstrumentKind::Histogram => Aggregator::min_max_sum_count(),
            _ => Aggregator::sum(),
        }
    }
}

/// Like [`InexpensiveDistribution`] but histograms keep bucket counts
#[derive(Debug, Clone)]
pub struct ExplicitHistogram {
    boundaries: Vec<f64>,
}

impl ExplicitHistogram {
    pub fn new(boundaries: Vec<f64>) -> Self {
        Self { boundaries }
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }
}

impl Default for ExplicitHistogram {
    fn default() -> Self {
        Self::new(DEFAULT_HISTOGRAM_BOUNDARIES.to_vec())
    }
}

impl AggregatorSelector for ExplicitHistogram {
    fn aggregator_for(&self, descriptor: &Descriptor) -> Aggregator {
        match descriptor.instrument_kind {
            InstrumentKind::ValueObserver => Aggregator::last_value(),
            InstrumentKind::Histogram => Aggregator::histogram(&self.boundaries),
            _ => Aggregator::sum(),
        }
    }
}
