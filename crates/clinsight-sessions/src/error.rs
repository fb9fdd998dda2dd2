use thiserror::Error;

/// Errors surfaced by the session store and its queries.
///
/// Per-record and per-field problems are never errors: a malformed record
/// decodes to a session with absent fields and aggregates exclude it.
#[derive(Error, Debug)]
pub enum SessionsError {
    /// Transport failure or non-success HTTP status while fetching the dataset.
    #[error("session fetch failed: {0}")]
    Fetch(String),

    /// The response body was not a JSON array of records.
    #[error("session data decode failed: {0}")]
    Decode(String),

    /// A query argument or derived computation was given unusable input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
