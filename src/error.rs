use thiserror::Error;

/// Engine errors. Capacity-exceeded conditions are never represented here:
/// hitting a cap produces `Truncated`/`LoadMore` nodes or a `truncated`
/// flag, and a superseded search reports `canceled` — those are normal
/// outcomes, not failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed JSON text, rejected at the parse boundary. The engine core
    /// never sees a malformed value.
    #[error("invalid JSON: {0}")]
    Parse(String),
    #[error("no document loaded")]
    NoDocument,
    /// A pointer that does not resolve in the current document. Indicates a
    /// host/engine state desync, not a data condition.
    #[error("invalid pointer: {0:?}")]
    InvalidPointer(String),
    #[error("bad search query: {0}")]
    BadQuery(String),
}
