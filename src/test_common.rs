#![cfg(test)]

use std::sync::{Arc, Once};

use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

use crate::diagnostic::{Diagnostic, DiagnosticSink};
use crate::flag::FeatureFlag;
use crate::registry::Registry;

pub const TEST_FLAGS_JSON: &str = r#"[
    {"name": "maxUploads", "tier": "", "type": "int:max", "value": 10},
    {"name": "minAge", "tier": "eu", "type": "int:min", "value": 16},
    {"name": "build", "tier": "qa", "type": "int", "value": 1234},
    {"name": "newCheckout", "tier": "beta", "type": "allow", "value": true},
    {"name": "newCheckout", "tier": "", "type": "allow", "value": false},
    {"name": "seats", "tier": "enterprise", "type": "int:max", "value": null},
    {"name": "seats", "tier": "trial", "type": "int:min", "value": null}
]"#;

pub fn test_flags() -> Vec<FeatureFlag> {
    serde_json::from_str(TEST_FLAGS_JSON).unwrap()
}

#[derive(Default)]
pub struct InMemoryDiagnosticSink {
    pub diagnostics: Mutex<Vec<Diagnostic>>,
}

impl InMemoryDiagnosticSink {
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }
}

impl DiagnosticSink for InMemoryDiagnosticSink {
    fn record(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().push(diagnostic);
    }
}

/// A registry loaded with [test_flags], along with the sink it reports to.
pub fn test_registry() -> (Registry, Arc<InMemoryDiagnosticSink>) {
    let sink = Arc::new(InMemoryDiagnosticSink::default());
    let registry = Registry::with_sink(sink.clone());
    registry.load(test_flags());
    (registry, sink)
}

static CAPTURED_LOGS: Mutex<Vec<(Level, String)>> = parking_lot::const_mutex(Vec::new());
static CAPTURING_LOGGER: CapturingLogger = CapturingLogger;
static INSTALL_LOGGER: Once = Once::new();

struct CapturingLogger;

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED_LOGS
            .lock()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

/// Installs a process-wide logger that keeps every record in memory. Tests run in parallel and
/// share it, so callers look up their own records by a string only they log.
pub fn install_capturing_logger() {
    INSTALL_LOGGER.call_once(|| {
        log::set_logger(&CAPTURING_LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
}

pub fn captured_logs_containing(needle: &str) -> Vec<(Level, String)> {
    CAPTURED_LOGS
        .lock()
        .iter()
        .filter(|(_, message)| message.contains(needle))
        .cloned()
        .collect()
}
