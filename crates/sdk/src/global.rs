//! Process-wide tracer provider slot

use std::sync::{PoisonError, RwLock};

use crate::trace::{Tracer, TracerProvider};

static GLOBAL_TRACER_PROVIDER: RwLock<Option<TracerProvider>> = RwLock::new(None);

/// Install `provider` globally, returning the one it replaces
pub fn set_tracer_provider(provider: TracerProvider) -> Option<TracerProvider> {
    GLOBAL_TRACER_PROVIDER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(provider)
}

/// The installed provider, or a provider that discards every span
pub fn tracer_provider() -> TracerProvider {
    GLOBAL_TRACER_PROVIDER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_default()
}

/// Tracer from the global provider
pub fn tracer(name: impl Into<String>) -> Tracer {
    tracer_provider().tracer(name)
}

/// Remove the global provider; callers shut it down themselves
pub fn take_tracer_provider() -> Option<TracerProvider> {
    GLOBAL_TRACER_PROVIDER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}
