// Errors surfaced to callers of the pipeline.
// Compilation failures and runtime faults are data, not errors; see
// `CompilationResult` and `InvocationResult`.

use std::path::PathBuf;
use thiserror::Error;

/// Misuse of the API or an unusable host setup, detected before any
/// compilation or invocation starts.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("source code must not be empty")]
    EmptySource,
    #[error("path must not be empty")]
    EmptyPath,
    #[error("snippet file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no compiled unit was supplied")]
    MissingUnit,
    #[error("base module '{module}' could not be loaded: {reason}")]
    BaseModuleUnavailable { module: String, reason: String },
}

/// Why an entry point could not be turned into a callable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdaptError {
    #[error("unsupported signature for '{entry_point}': {reason}")]
    UnsupportedShape { entry_point: String, reason: String },
    #[error("'{entry_point}' takes {count} parameters; at most {max} are supported")]
    ArityExceeded {
        entry_point: String,
        count: usize,
        max: usize,
    },
    #[error("'{entry_point}' has shape {actual}, not the requested {requested}")]
    CastMismatch {
        entry_point: String,
        requested: String,
        actual: String,
    },
}
