//! Sensor sources and telemetry sinks for the tempsense daemon.

pub mod sensor;
pub mod telemetry;

use std::sync::{Arc, Mutex, PoisonError};

/// Convenience helper for keeping every value handed to a dummy device, for example the
/// measurement batches a [`telemetry::DummySink`] received. Clones share the same storage, so a
/// test can keep one while the device is moved into the pipeline.
pub struct Recorder<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone> Recorder<T> {
    /// Appends `value`.
    pub fn push(&self, value: T) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(value);
    }

    /// Gets a copy of everything recorded so far.
    pub fn all(&self) -> Vec<T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Gets the most recently recorded value.
    pub fn last(&self) -> Option<T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }
}

#[test]
fn test_recorder_shares_storage() {
    let recorder = Recorder::default();
    let handle = recorder.clone();

    recorder.push(1);
    recorder.push(2);

    assert_eq!(handle.all(), vec![1, 2]);
    assert_eq!(handle.last(), Some(2));
    assert_eq!(handle.len(), 2);
}
