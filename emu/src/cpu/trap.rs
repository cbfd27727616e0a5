//! Where undefined encodings end up.
//!
//! Reporting never changes CPU state: the executor skips the instruction and
//! execution continues at the next one.

use std::sync::{Arc, Mutex, PoisonError};

pub trait TrapSink {
    /// A bit pattern with no defined meaning.
    fn report_undefined(&mut self, diagnostic: &str);

    /// A well formed but reserved instruction, such as THUMB condition 14.
    fn report_undefined_trap(&mut self);
}

/// Default sink, forwards every report to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTrapSink;

impl TrapSink for TracingTrapSink {
    fn report_undefined(&mut self, diagnostic: &str) {
        tracing::warn!("undefined instruction: {diagnostic}");
    }

    fn report_undefined_trap(&mut self) {
        tracing::warn!("undefined instruction trap");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapReport {
    Undefined(String),
    Trap,
}

/// Keeps every report so it can be inspected after the fact. Clones share
/// the same log.
#[derive(Debug, Default, Clone)]
pub struct TrapRecorder {
    reports: Arc<Mutex<Vec<TrapReport>>>,
}

impl TrapRecorder {
    #[must_use]
    pub fn reports(&self) -> Vec<TrapReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, report: TrapReport) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
    }
}

impl TrapSink for TrapRecorder {
    fn report_undefined(&mut self, diagnostic: &str) {
        tracing::debug!("recorded undefined instruction: {diagnostic}");
        self.push(TrapReport::Undefined(diagnostic.to_owned()));
    }

    fn report_undefined_trap(&mut self) {
        self.push(TrapReport::Trap);
    }
}
