//! Browser engine abstraction
//!
//! The map lives in an embedded browser owned by the UI toolkit. Everything
//! the core sends to it goes through [`MapEngine`], whose implementation is
//! responsible for marshalling onto the browser's UI thread.

use crate::error::EngineError;
use parking_lot::Mutex;

/// Script execution in the embedded browser map.
pub trait MapEngine: Send + Sync {
    /// Executes a script, ignoring its result.
    fn execute_script(&self, script: &str) -> Result<(), EngineError>;

    /// Evaluates a script and returns its string result, if any.
    fn evaluate_script(&self, script: &str) -> Result<Option<String>, EngineError>;

    /// True once the map page has loaded and its script API is callable.
    fn is_initialized(&self) -> bool;
}

/// Engine that records every executed script instead of running it.
///
/// Used by the headless binary and by tests. Evaluations answer from a
/// queue of canned results.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    initialized: Mutex<bool>,
    scripts: Mutex<Vec<String>>,
    evaluations: Mutex<Vec<String>>,
}

impl RecordingEngine {
    /// Creates an initialized recording engine.
    pub fn new() -> Self {
        Self {
            initialized: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn set_initialized(&self, initialized: bool) {
        *self.initialized.lock() = initialized;
    }

    /// Queues a result for the next `evaluate_script` call.
    pub fn push_evaluation(&self, result: impl Into<String>) {
        self.evaluations.lock().push(result.into());
    }

    /// Every script executed so far.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    /// Removes and returns the scripts executed so far.
    pub fn take_scripts(&self) -> Vec<String> {
        std::mem::take(&mut *self.scripts.lock())
    }
}

impl MapEngine for RecordingEngine {
    fn execute_script(&self, script: &str) -> Result<(), EngineError> {
        if !*self.initialized.lock() {
            return Err(EngineError::Unavailable);
        }
        self.scripts.lock().push(script.to_string());
        Ok(())
    }

    fn evaluate_script(&self, script: &str) -> Result<Option<String>, EngineError> {
        if !*self.initialized.lock() {
            return Err(EngineError::Unavailable);
        }
        self.scripts.lock().push(script.to_string());
        let mut evaluations = self.evaluations.lock();
        if evaluations.is_empty() {
            Ok(None)
        } else {
            Ok(Some(evaluations.remove(0)))
        }
    }

    fn is_initialized(&self) -> bool {
        *self.initialized.lock()
    }
}
