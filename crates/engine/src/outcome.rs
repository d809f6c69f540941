//! Results of best-effort batch operations.

use serde::Serialize;

use crate::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedItem<T> {
    pub item: T,
    pub reason: String,
}

/// Items that went through and items that did not. The operation itself
/// succeeded either way.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchOutcome<S, F = S> {
    pub succeeded: Vec<S>,
    pub failed: Vec<FailedItem<F>>,
}

impl<S, F> Default for BatchOutcome<S, F> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<S, F> BatchOutcome<S, F> {
    pub(crate) fn push_ok(&mut self, item: S) {
        self.succeeded.push(item);
    }

    pub(crate) fn push_err(&mut self, item: F, err: &EngineError) {
        self.failed.push(FailedItem {
            item,
            reason: err.to_string(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
