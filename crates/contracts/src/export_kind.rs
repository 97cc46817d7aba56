//! Export kind (aggregation temporality) policy.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AggregationKind, Descriptor, InstrumentKind};

/// Temporality of an exported value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    /// Value accumulated since the instrument's start time
    Cumulative,
    /// Value accumulated since the previous collection
    Delta,
}

impl ExportKind {
    /// Whether producing this kind for `kind` requires keeping state across
    /// collections: cumulative output from delta input, or delta output from
    /// precomputed sums.
    pub fn memory_required(&self, kind: InstrumentKind) -> bool {
        match self {
            ExportKind::Cumulative => kind.synchronous(),
            ExportKind::Delta => kind.precomputed_sum(),
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::Cumulative => f.write_str("cumulative"),
            ExportKind::Delta => f.write_str("delta"),
        }
    }
}

/// Maps an instrument and its aggregation to an export kind
///
/// Implementations must be pure: the transform queries the selector once per
/// record on every export, possibly from several threads.
pub trait ExportKindSelector: Send + Sync {
    fn export_kind_for(&self, descriptor: &Descriptor, aggregation: AggregationKind)
        -> ExportKind;
}

impl<F> ExportKindSelector for F
where
    F: Fn(&Descriptor, AggregationKind) -> ExportKind + Send + Sync,
{
    fn export_kind_for(
        &self,
        descriptor: &Descriptor,
        aggregation: AggregationKind,
    ) -> ExportKind {
        self(descriptor, aggregation)
    }
}

/// Cumulative for every instrument (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct CumulativeExportKindSelector;

impl ExportKindSelector for CumulativeExportKindSelector {
    fn export_kind_for(&self, _: &Descriptor, _: AggregationKind) -> ExportKind {
        ExportKind::Cumulative
    }
}

/// Delta for every instrument
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaExportKindSelector;

impl ExportKindSelector for DeltaExportKindSelector {
    fn export_kind_for(&self, _: &Descriptor, _: AggregationKind) -> ExportKind {
        ExportKind::Delta
    }
}

/// Kind that needs no memory: cumulative for precomputed sums, delta otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct StatelessExportKindSelector;

impl ExportKindSelector for StatelessExportKindSelector {
    fn export_kind_for(
        &self,
        descriptor: &Descriptor,
        aggregation: AggregationKind,
    ) -> ExportKind {
        if aggregation == AggregationKind::Sum && descriptor.instrument_kind.precomputed_sum() {
            ExportKind::Cumulative
        } else {
            ExportKind::Delta
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NumberKind;

    fn descriptor(kind: InstrumentKind) -> Descriptor {
        Descriptor::new("test", kind, NumberKind::F64)
    }

    #[test]
    fn test_stateless_selector() {
        let sel = StatelessExportKindSelector;
        assert_eq!(
            sel.export_kind_for(&descriptor(InstrumentKind::SumObserver), AggregationKind::Sum),
            ExportKind::Cumulative
        );
        assert_eq!(
            sel.export_kind_for(&descriptor(InstrumentKind::Counter), AggregationKind::Sum),
            ExportKind::Delta
        );
        assert_eq!(
            sel.export_kind_for(
                &descriptor(InstrumentKind::ValueObserver),
                AggregationKind::LastValue
            ),
            ExportKind::Delta
        );
    }

    #[test]
    fn test_memory_required() {
        assert!(ExportKind::Cumulative.memory_required(InstrumentKind::Counter));
        assert!(!ExportKind::Cumulative.memory_required(InstrumentKind::SumObserver));
        assert!(ExportKind::Delta.memory_required(InstrumentKind::SumObserver));
        assert!(!ExportKind::Delta.memory_required(InstrumentKind::Histogram));
    }

    #[test]
    fn test_closure_selector() {
        let sel = |d: &Descriptor, _: AggregationKind| {
            if d.name.starts_with("delta.") {
                ExportKind::Delta
            } else {
                ExportKind::Cumulative
            }
        };
        let d = Descriptor::new("delta.requests", InstrumentKind::Counter, NumberKind::I64);
        assert_eq!(sel.export_kind_for(&d, AggregationKind::Sum), ExportKind::Delta);
    }
}
