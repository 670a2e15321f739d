//! Linker error types.

use std::path::PathBuf;

/// Why a specifier could not be turned into a module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionFailure {
    /// No configured rule matches the resolved path
    #[error("no matching module rules")]
    NoMatchingRules,

    /// Code supplied as a raw string has no location to resolve against
    #[error("imports are not allowed from raw string scripts")]
    RawStringReferrer,

    /// A concurrent import of the same path already failed to load it
    #[error("module failed to load in a concurrent import")]
    ConcurrentLoadFailed,
}

/// Errors reported by the execution context collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
    /// Source failed to compile
    #[error("Compile error: {0}")]
    Compile(String),

    /// Module graph failed to link
    #[error("Link error: {0}")]
    Link(String),

    /// Evaluation threw
    #[error("Evaluation error: {0}")]
    Evaluate(String),

    /// The context cannot perform the requested operation
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Errors that can occur while resolving and linking modules.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Specifier could not be resolved to a module
    #[error("Unable to resolve \"{specifier}\" imported from \"{referrer}\": {reason}")]
    Resolution {
        referrer: String,
        specifier: String,
        reason: ResolutionFailure,
    },

    /// CommonJS rewrite broke an internal invariant
    #[error("Unable to transform {} (\"{specifier}\" imported from \"{referrer}\"): {message}", path.display())]
    Transform {
        referrer: String,
        specifier: String,
        path: PathBuf,
        message: String,
    },

    /// Rule names a type outside the supported set
    #[error("Unsupported module type \"{0}\"")]
    UnsupportedModuleType(String),

    /// WebAssembly bytes failed to compile
    #[error("Unable to compile {} (\"{specifier}\" imported from \"{referrer}\"): {message}", path.display())]
    Compilation {
        referrer: String,
        specifier: String,
        path: PathBuf,
        message: String,
    },

    /// Execution context lacks module support
    #[error("{0}")]
    Capability(String),

    /// Module content could not be read
    #[error("Unable to read {} (\"{specifier}\" imported from \"{referrer}\"): {source}", path.display())]
    Io {
        referrer: String,
        specifier: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Execution context refused to build a module record
    #[error("Unable to link \"{specifier}\" imported from \"{referrer}\": {source}")]
    Context {
        referrer: String,
        specifier: String,
        #[source]
        source: ContextError,
    },

    /// Invalid rule configuration
    #[error("Invalid module rules: {0}")]
    Config(String),
}

impl LinkError {
    /// Build a resolution error for `specifier` imported from `referrer`.
    pub fn resolution(referrer: &str, specifier: &str, reason: ResolutionFailure) -> Self {
        LinkError::Resolution {
            referrer: referrer.to_string(),
            specifier: specifier.to_string(),
            reason,
        }
    }

    /// The specifier being resolved when the error occurred, if any.
    pub fn specifier(&self) -> Option<&str> {
        match self {
            LinkError::Resolution { specifier, .. }
            | LinkError::Transform { specifier, .. }
            | LinkError::Compilation { specifier, .. }
            | LinkError::Io { specifier, .. }
            | LinkError::Context { specifier, .. } => Some(specifier),
            LinkError::UnsupportedModuleType(_)
            | LinkError::Capability(_)
            | LinkError::Config(_) => None,
        }
    }

    /// The importing module's identifier, if any.
    pub fn referrer(&self) -> Option<&str> {
        match self {
            LinkError::Resolution { referrer, .. }
            | LinkError::Transform { referrer, .. }
            | LinkError::Compilation { referrer, .. }
            | LinkError::Io { referrer, .. }
            | LinkError::Context { referrer, .. } => Some(referrer),
            LinkError::UnsupportedModuleType(_)
            | LinkError::Capability(_)
            | LinkError::Config(_) => None,
        }
    }
}

/// Outcome of a module runner that did not produce a namespace.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Evaluation was cancelled through an interrupt handle
    #[error("Execution interrupted")]
    Interrupted,

    /// Module graph failed to resolve or link
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Evaluation failed inside the context
    #[error(transparent)]
    Evaluation(#[from] ContextError),
}
