use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised while loading input files or solving.  Anything
/// recoverable (unreachable nodes, zero weights, empty flows) is handled
/// locally by the solver and never surfaces here.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed or incomplete input in a TNTP or settings file.
    #[error("{path}: {message}")]
    Format { path: PathBuf, message: String },

    /// Origin and destination are reported 1-based, as they appear in the
    /// trip file.
    #[error("negative demand from origin {origin} to destination {dest}")]
    NegativeDemand { origin: usize, dest: usize },

    #[error("invalid solver parameter: {0}")]
    Parameter(String),

    /// A reasonable-link subgraph failed to sort topologically.  The strict
    /// label inequality should make this impossible, so hitting it means an
    /// upstream logic bug rather than bad input.
    #[error("bush for origin {origin} contains a cycle")]
    CyclicBush { origin: usize },
}
