//! OneShotGate - runs a body at most once across concurrent callers
//!
//! Every caller waits until the body has completed and then observes its
//! result. The body is never re-run, not even when the caller executing it is
//! dropped mid-flight; the gate then resolves with a fallback value.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::OnceCell;

/// How a caller passed the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GateOutcome<T> {
    /// This caller ran the body
    Executed(T),
    /// Another caller ran (or abandoned) the body
    Observed(T),
}

impl<T> GateOutcome<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            GateOutcome::Executed(v) | GateOutcome::Observed(v) => v,
        }
    }
}

pub(crate) struct OneShotGate<T> {
    result: OnceCell<T>,
    /// Set when some caller entered the body
    entered: AtomicBool,
}

impl<T: Clone> OneShotGate<T> {
    pub(crate) fn new() -> Self {
        Self {
            result: OnceCell::new(),
            entered: AtomicBool::new(false),
        }
    }

    /// Result of the body, once it has completed
    #[cfg(test)]
    pub(crate) fn get(&self) -> Option<T> {
        self.result.get().cloned()
    }

    /// Pass the gate.
    ///
    /// The first caller runs `body`; everyone else waits for it. If the body's
    /// caller is dropped before completion, the next waiter resolves the gate
    /// with `abandoned()` instead of running `body` again.
    pub(crate) async fn pass<F, Fut>(&self, body: F, abandoned: impl FnOnce() -> T) -> GateOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut executed = false;
        let executed_flag = &mut executed;
        let entered = &self.entered;

        let value = self
            .result
            .get_or_init(move || async move {
                if entered.swap(true, Ordering::AcqRel) {
                    return abandoned();
                }
                *executed_flag = true;
                body().await
            })
            .await
            .clone();

        if executed {
            GateOutcome::Executed(value)
        } else {
            GateOutcome::Observed(value)
        }
    }
}
