//! Compiler output classification.
//!
//! The compiler's exit code is advisory; diagnostics are recognised by the
//! literal `error:` marker in stdout, matched case-insensitively.

use serde::{Deserialize, Serialize};

use crate::runner::ProcessResult;

const ERROR_MARKER: &str = "error:";

/// How the compiler's stdout was judged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputClass {
    /// stdout carries an `error:` diagnostic.
    SemanticError,
    /// stdout is non-empty and carries no diagnostic.
    Success,
    /// stdout is empty.
    Silent,
}

/// Classification of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileVerdict {
    pub class: OutputClass,
    /// stderr is reported independently of `class`; both may be present.
    pub has_stderr: bool,
}

impl CompileVerdict {
    pub fn evaluate(result: &ProcessResult) -> Self {
        Self {
            class: classify_stdout(&result.stdout),
            has_stderr: !result.stderr.is_empty(),
        }
    }

    /// Whether anything error-like was reported.
    pub fn has_errors(&self) -> bool {
        self.class == OutputClass::SemanticError || self.has_stderr
    }
}

pub fn classify_stdout(stdout: &str) -> OutputClass {
    if stdout.is_empty() {
        OutputClass::Silent
    } else if stdout.to_lowercase().contains(ERROR_MARKER) {
        OutputClass::SemanticError
    } else {
        OutputClass::Success
    }
}
