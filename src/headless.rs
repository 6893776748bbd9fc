//! Headless map engine
//!
//! Stands in for the embedded browser when the map runs without a UI: every
//! script is logged and optionally echoed to stdout, one per line, so another
//! process can replay them into a real page.

use mapbridge_core::engine::MapEngine;
use mapbridge_core::error::EngineError;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

pub struct HeadlessEngine {
    echo: bool,
    executed: AtomicU64,
    stdout: Mutex<std::io::Stdout>,
}

impl HeadlessEngine {
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            executed: AtomicU64::new(0),
            stdout: Mutex::new(std::io::stdout()),
        }
    }

    /// Number of scripts executed so far.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    fn emit(&self, script: &str) -> Result<(), EngineError> {
        self.executed.fetch_add(1, Ordering::Relaxed);
        trace!(script, "Script");
        if self.echo {
            let mut stdout = self.stdout.lock();
            writeln!(stdout, "{}", script).map_err(|e| EngineError::script_failed(e.to_string()))?;
        }
        Ok(())
    }
}

impl MapEngine for HeadlessEngine {
    fn execute_script(&self, script: &str) -> Result<(), EngineError> {
        self.emit(script)
    }

    fn evaluate_script(&self, script: &str) -> Result<Option<String>, EngineError> {
        // nothing answers, so probes time out and polls come back empty
        self.emit(script)?;
        debug!("Headless evaluation returns no value");
        Ok(None)
    }

    fn is_initialized(&self) -> bool {
        true
    }
}
