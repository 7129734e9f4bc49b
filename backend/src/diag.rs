// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used by the emission engine and the
// schedule rewrite passes. Diagnostics are collected, never printed or
// panicked from library code.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0701`, `W0701`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different semantic
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable diagnostic codes for the back end.
pub mod codes {
    use super::DiagCode;

    /// Operation kind outside the supported emission vocabulary.
    pub const E0701: DiagCode = DiagCode("E0701");
    /// Value type with no HLS C++ lowering.
    pub const E0702: DiagCode = DiagCode("E0702");
    /// Function body is not a single block.
    pub const E0703: DiagCode = DiagCode("E0703");
    /// Function body does not end in a return terminator.
    pub const E0704: DiagCode = DiagCode("E0704");
    /// Loop bound is not a compile-time constant.
    pub const E0705: DiagCode = DiagCode("E0705");
    /// Structured construct recognized but emitted without a body.
    pub const W0701: DiagCode = DiagCode("W0701");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Locus ────────────────────────────────────────────────────────────────

/// Where in the input module a diagnostic originates.
///
/// Kernel modules arrive as in-memory graphs rather than source text, so a
/// locus names a structural position instead of a byte span. `Op` paths are
/// operation indices from the function body downward, one index per nesting
/// level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Locus {
    /// The module as a whole.
    Module,
    /// A named function.
    Function(String),
    /// An operation inside a function body.
    Op { func: String, path: Vec<usize> },
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locus::Module => write!(f, "module"),
            Locus::Function(name) => write!(f, "fn {}", name),
            Locus::Op { func, path } => {
                write!(f, "fn {}, op ", func)?;
                for (i, idx) in path.iter().enumerate() {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", idx)?;
                }
                Ok(())
            }
        }
    }
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by any back-end phase.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub locus: Locus,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code or hint.
    pub fn new(level: DiagLevel, locus: Locus, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            locus,
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        write!(f, "\n  at: {}", self.locus)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}
