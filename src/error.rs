use std::fmt;

use thiserror::Error;

/// The category of a preprocessor failure.
///
/// These mirror the error surface a C preprocessor core is expected to
/// raise: malformed tokens, malformed directives, argument-count mismatches,
/// constant-expression failures, and include-resolution failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreprocessorErrorKind {
    /// Malformed token: an unterminated string literal or a stray character.
    Lex,
    /// Malformed directive: missing name after `#define`, unclosed parameter list, etc.
    Syntax,
    /// Function-like macro invoked with the wrong number of arguments.
    Arity,
    /// Constant-expression evaluation failure (divide-by-zero, malformed expression).
    Eval,
    /// Include file not found and `ignore_missing_includes` is false.
    Include,
    /// Recursive include of a path already being processed.
    IncludeCycle,
    /// `#elif`/`#else`/`#endif` without a matching `#if`, or unterminated conditional at EOF.
    Conditional,
    /// Macro expansion or include recursion exceeded its configured depth limit.
    DepthExceeded,
}

impl fmt::Display for PreprocessorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PreprocessorErrorKind::Lex => "lex error",
            PreprocessorErrorKind::Syntax => "syntax error",
            PreprocessorErrorKind::Arity => "arity error",
            PreprocessorErrorKind::Eval => "evaluation error",
            PreprocessorErrorKind::Include => "include error",
            PreprocessorErrorKind::IncludeCycle => "include cycle",
            PreprocessorErrorKind::Conditional => "conditional error",
            PreprocessorErrorKind::DepthExceeded => "depth exceeded",
        };
        f.write_str(label)
    }
}

/// A tagged preprocessor error carrying its category, a human-readable
/// message, and the file/line it occurred at when known.
///
/// Display is generated by thiserror from the format string below; the
/// file/line suffix is folded into `message` by [`with_location`] rather
/// than interpolated conditionally, since a single `#[error("...")]`
/// format string can't branch on whether the location is known.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct PreprocessorError {
    pub kind: PreprocessorErrorKind,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl PreprocessorError {
    pub fn new(kind: PreprocessorErrorKind, message: impl Into<String>) -> Self {
        PreprocessorError {
            kind,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    /// Records where the error occurred and appends a human-readable
    /// `(file:line)` suffix to the message.
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        let file = file.into();
        self.message = format!("{} ({}:{})", self.message, file, line);
        self.file = Some(file);
        self.line = Some(line);
        self
    }

    pub fn lex(message: impl Into<String>) -> Self {
        Self::new(PreprocessorErrorKind::Lex, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(PreprocessorErrorKind::Syntax, message)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::new(PreprocessorErrorKind::Arity, message)
    }

    pub fn eval(message: impl Into<String>) -> Self {
        Self::new(PreprocessorErrorKind::Eval, message)
    }

    pub fn include(message: impl Into<String>) -> Self {
        Self::new(PreprocessorErrorKind::Include, message)
    }

    pub fn include_cycle(message: impl Into<String>) -> Self {
        Self::new(PreprocessorErrorKind::IncludeCycle, message)
    }

    pub fn conditional(message: impl Into<String>) -> Self {
        Self::new(PreprocessorErrorKind::Conditional, message)
    }

    pub fn depth_exceeded(message: impl Into<String>) -> Self {
        Self::new(PreprocessorErrorKind::DepthExceeded, message)
    }
}

pub type Result<T> = std::result::Result<T, PreprocessorError>;
