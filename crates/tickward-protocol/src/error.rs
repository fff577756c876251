//! Error types for the protocol layer.
//!
//! Each crate in Tickward defines its own error enum. A `ProtocolError`
//! always means a message could not be rendered: the template and its
//! arguments disagree.

/// Errors that can occur while rendering a [`Template`](crate::Template).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The template has a different number of placeholders than arguments
    /// were supplied.
    #[error("template expects {expected} argument(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// An argument does not fit the placeholder at the same position,
    /// e.g. a string passed for `{INT}`.
    #[error("argument {index} does not match placeholder {{{expected}}}")]
    PlaceholderKind { index: usize, expected: &'static str },
}
