use std::path::PathBuf;

use kiln_path::ProjectPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project root is not a directory: {path}")]
    InvalidRoot { path: PathBuf },

    #[error("no such path in project: {path}")]
    MissingPath { path: ProjectPath },

    #[error("not a working file: {path}")]
    NotAFile { path: ProjectPath },

    #[error("not a directory: {path}")]
    NotADirectory { path: ProjectPath },

    #[error("unknown backend: {name}")]
    UnknownSpec { name: String },

    #[error("no backend enabled for this project")]
    NoActiveSpec,

    #[error("no enabled backend can package {path}")]
    PackageUnsupported { path: ProjectPath },

    #[error("{path} is already covered by dependency group {group}")]
    AlreadyGrouped {
        path: ProjectPath,
        group: ProjectPath,
    },

    #[error("{path} contains already-registered dependency group {group}")]
    ContainsGroup {
        path: ProjectPath,
        group: ProjectPath,
    },

    #[error("missing cooked output for {path}; cook before packaging")]
    DependencyMissing { path: ProjectPath },

    #[error("backend {name} failed: {source}")]
    SpecFailed {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] kiln_config::ConfigError),

    #[error(transparent)]
    Path(#[from] kiln_path::PathError),
}

impl ProjectError {
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;
