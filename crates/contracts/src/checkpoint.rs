//! CheckpointSet - Processor output
//!
//! A snapshot of every reportable (instrument, attribute set) value at export
//! time.

use crate::{ExportKindSelector, Record, TransformError};

/// Snapshot of aggregated metric values
pub trait CheckpointSet: Send + Sync {
    /// Visit every record.
    ///
    /// `selector` is the export kind policy the caller intends to apply; the
    /// set fails with [`TransformError::IncompatibleExportKind`] when it did
    /// not compute a record with that temporality. Iteration stops at the
    /// first error returned by `f`.
    fn for_each(
        &self,
        selector: &dyn ExportKindSelector,
        f: &mut dyn FnMut(&Record) -> Result<(), TransformError>,
    ) -> Result<(), TransformError>;
}
