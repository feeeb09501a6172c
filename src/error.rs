//! Error taxonomies for the schema, generation, and supervision layers.
//!
//! Each layer owns one `thiserror` enum. Public APIs return the typed error
//! of their layer; the CLI binary converts to `anyhow` at the edge. Nothing
//! here retries: every failure propagates to the direct caller.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Configuration errors raised during model registration.
///
/// These fail fast: a model with missing metadata is never silently
/// defaulted into the registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no model metadata attached to handle {handle}")]
    MissingModelMetadata { handle: u64 },

    #[error("model '{model}' has no field metadata")]
    MissingFieldMetadata { model: String },
}

/// Errors raised by the code generation pipeline.
///
/// Any variant aborts the whole generation run; a failed run's output
/// directory must be treated as untrustworthy and regenerated after the
/// cause is fixed.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("failed to load templates from {dir:?}")]
    TemplateDir {
        dir: PathBuf,
        #[source]
        source: tera::Error,
    },

    #[error("built-in template '{name}' is invalid")]
    TemplateCompile {
        name: &'static str,
        #[source]
        source: tera::Error,
    },

    #[error("failed to render template '{name}'")]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("failed to create directory {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the local backend supervisor.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("backend toolchain '{program}' is not available: {reason}")]
    ToolchainNotFound { program: String, reason: String },

    #[error("dependency install failed ({status})")]
    DependencyInstall { status: ExitStatus },

    #[error("backend process did not signal readiness within {timeout_secs}s")]
    StartupTimeout { timeout_secs: u64 },

    #[error("backend process exited before signaling readiness ({status})")]
    PrematureExit { status: ExitStatus },

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("supervisor I/O failure: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ServerError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
