//! Structured, non-fatal messages attached to computation results.

use std::fmt::Display;

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Information,
    Warning,
}

/// The stage of a computation that produced a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    DefineDate,
    Observability,
    UVSupport,
    ObservableUV,
    VisSynthesis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub phase: Phase,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.phase, self.message)
    }
}

/// An append-only list of [`Diagnostic`]s. The owning computation adds to it;
/// consumers can only read.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub(crate) fn warn<S: Into<String>>(&mut self, phase: Phase, message: S) {
        let message = message.into();
        warn!("{message}");
        self.0.push(Diagnostic {
            severity: Severity::Warning,
            phase,
            message,
        });
    }

    pub(crate) fn inform<S: Into<String>>(&mut self, phase: Phase, message: S) {
        let message = message.into();
        info!("{message}");
        self.0.push(Diagnostic {
            severity: Severity::Information,
            phase,
            message,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
