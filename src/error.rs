//! Error types for template parsing, expansion and rendering
//!
//! Each stage that can fail before a job exists has its own error enum.
//! Glue code (engine, executor, CLI) wraps these in `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning raw text into a [`crate::template::Template`]
#[derive(Debug, Error)]
pub enum ParseError {
    /// Two input slots share a name
    #[error("duplicate input slot name: {0}")]
    DuplicateInput(String),

    /// An unnamed output slot needs exactly one input slot to refer to
    #[error("unnamed output slot requires exactly one input slot, found {inputs}")]
    AmbiguousOutput {
        /// Number of input slots in the template
        inputs: usize,
    },

    /// An output slot names an input slot that does not exist
    #[error("output slot refers to unknown input slot: {0}")]
    UnknownSlotReference(String),

    /// A token stack function that is not one of the built-ins
    #[error("unknown stack function: {0}")]
    UnknownFunction(String),

    /// A render filter that is not one of the built-ins
    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    /// Filter text that cannot be parsed
    #[error("invalid filter syntax: {0}")]
    InvalidFilterSyntax(String),

    /// Malformed `range(...)` shorthand
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Slot expansion failed while building the expansion
    #[error(transparent)]
    Stack(#[from] StackError),
}

/// Errors raised by the token stack processor while evaluating an expression
#[derive(Debug, Error)]
pub enum StackError {
    /// A function needed a value but the stack was empty
    #[error("stack underflow in '{function}'")]
    Underflow {
        /// Function that tried to pop
        function: &'static str,
    },

    /// Invalid glob syntax
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A glob match could not be read
    #[error("glob error: {0}")]
    Glob(#[from] glob::GlobError),

    /// `read` could not open its file
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Errors raised while rendering one binding into a command line
#[derive(Debug, Error)]
pub enum RenderError {
    /// The two glob patterns given to `globmap` have different wildcard shapes
    #[error("glob patterns '{from}' and '{to}' have different wildcards")]
    GlobMismatch {
        /// Source pattern
        from: String,
        /// Target pattern
        to: String,
    },

    /// The value does not match the source pattern of `globmap`
    #[error("'{value}' does not match pattern '{pattern}'")]
    NoMatch {
        /// Value being mapped
        value: String,
        /// Source pattern
        pattern: String,
    },

    /// A filter was called without a required argument
    #[error("filter '{0}' is missing an argument")]
    MissingArgument(&'static str),

    /// A slot refers to a name with no value in the binding
    #[error("no value bound for slot '{0}'")]
    Unbound(String),

    /// Path resolution failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the saved-template store
#[derive(Debug, Error)]
pub enum StoreError {
    /// No template saved under that name
    #[error("no saved template named '{0}'")]
    NotFound(String),

    /// Names must be a single path component
    #[error("invalid template name: '{0}'")]
    InvalidName(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
