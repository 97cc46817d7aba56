//! Metric instruments, aggregations and checkpoint records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::{InstrumentationScope, KeyValue, Resource};

/// Number representation of an instrument
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberKind {
    I64,
    #[default]
    F64,
}

/// Instrument kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Synchronous, monotonic sum
    Counter,
    /// Synchronous, non-monotonic sum
    UpDownCounter,
    /// Synchronous, grouping distribution
    Histogram,
    /// Asynchronous, monotonic precomputed sum
    SumObserver,
    /// Asynchronous, non-monotonic precomputed sum
    UpDownSumObserver,
    /// Asynchronous, grouping observation
    ValueObserver,
}

impl InstrumentKind {
    pub fn synchronous(&self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter | InstrumentKind::UpDownCounter | InstrumentKind::Histogram
        )
    }

    pub fn asynchronous(&self) -> bool {
        !self.synchronous()
    }

    /// Instrument reports values that are summed
    pub fn adding(&self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter
                | InstrumentKind::UpDownCounter
                | InstrumentKind::SumObserver
                | InstrumentKind::UpDownSumObserver
        )
    }

    /// Instrument reports values that are grouped into a distribution
    pub fn grouping(&self) -> bool {
        !self.adding()
    }

    pub fn monotonic(&self) -> bool {
        matches!(self, InstrumentKind::Counter | InstrumentKind::SumObserver)
    }

    /// Observations are already cumulative sums
    pub fn precomputed_sum(&self) -> bool {
        self.adding() && self.asynchronous()
    }
}

/// Instrument descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub name: String,
    pub instrument_kind: InstrumentKind,
    pub number_kind: NumberKind,
    pub description: String,
    pub unit: String,
    pub scope: InstrumentationScope,
}

impl Descriptor {
    pub fn new(
        name: impl Into<String>,
        instrument_kind: InstrumentKind,
        number_kind: NumberKind,
    ) -> Self {
        Self {
            name: name.into(),
            instrument_kind,
            number_kind,
            description: String::new(),
            unit: String::new(),
            scope: InstrumentationScope::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_scope(mut self, scope: InstrumentationScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Aggregator kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationKind {
    Sum,
    LastValue,
    MinMaxSumCount,
    Histogram,
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationKind::Sum => "sum",
            AggregationKind::LastValue => "last_value",
            AggregationKind::MinMaxSumCount => "min_max_sum_count",
            AggregationKind::Histogram => "histogram",
        };
        f.write_str(name)
    }
}

/// Checkpointed aggregation value
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Sum(f64),
    LastValue(Option<(f64, SystemTime)>),
    MinMaxSumCount {
        min: f64,
        max: f64,
        sum: f64,
        count: u64,
    },
    Histogram {
        /// Upper bounds, strictly increasing
        boundaries: Vec<f64>,
        /// `boundaries.len() + 1` bucket counts
        counts: Vec<u64>,
        sum: f64,
        count: u64,
    },
}

impl Aggregation {
    pub fn kind(&self) -> AggregationKind {
        match self {
            Aggregation::Sum(_) => AggregationKind::Sum,
            Aggregation::LastValue(_) => AggregationKind::LastValue,
            Aggregation::MinMaxSumCount { .. } => AggregationKind::MinMaxSumCount,
            Aggregation::Histogram { .. } => AggregationKind::Histogram,
        }
    }

    /// Nothing was recorded into this aggregation
    pub fn is_empty(&self) -> bool {
        match self {
            Aggregation::Sum(_) | Aggregation::Histogram { .. } => false,
            Aggregation::LastValue(v) => v.is_none(),
            Aggregation::MinMaxSumCount { count, .. } => *count == 0,
        }
    }
}

/// One exportable (instrument, attribute set) value
#[derive(Debug, Clone)]
pub struct Record {
    pub descriptor: Arc<Descriptor>,
    pub attributes: Vec<KeyValue>,
    pub resource: Arc<Resource>,
    pub aggregation: Aggregation,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
}
