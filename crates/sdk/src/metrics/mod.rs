//! Metrics SDK: meters, aggregation, temporality and the push controller

mod aggregator;
mod controller;
mod meter;
mod processor;
mod selector;

pub use aggregator::{merge, subtract, Aggregator};
pub use controller::{
    BasicController, ControllerBuilder, DEFAULT_COLLECT_PERIOD, DEFAULT_COLLECT_TIMEOUT,
};
pub use meter::{
    Accumulation, Accumulator, Counter, Histogram, Meter, ObserverResult, SyncInstrument,
    UpDownCounter,
};
pub use processor::{AggregationProcessor, ProcessorCheckpoint};
pub use selector::{
    AggregatorSelector, ExplicitHistogram, InexpensiveDistribution, DEFAULT_HISTOGRAM_BOUNDARIES,
};
