//! Navigation sink that records every replace call.

use std::sync::{Mutex, MutexGuard, PoisonError};

use spk_query::NavigationSink;

/// A [`NavigationSink`] that appends every replaced query to a list so
/// tests can assert on navigation count and content.
#[derive(Default)]
pub struct RecordingSink {
    replaced: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query pushed so far, in order.
    pub fn replaced(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.replaced.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NavigationSink for RecordingSink {
    fn replace(&self, query: &str) {
        self.lock().push(query.to_owned());
    }
}
