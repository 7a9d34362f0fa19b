use std::path::PathBuf;
use thiserror::Error;

/// Taxonomy of failures shared by every component. Each variant already
/// carries the component/operation pair so callers never have to
/// reconstruct "where did this happen" from a bare string.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid input in {component}::{operation}: {detail}")]
    InvalidInput {
        component: &'static str,
        operation: &'static str,
        detail: String,
    },

    #[error("out of range in {component}::{operation}: {detail}")]
    OutOfRange {
        component: &'static str,
        operation: &'static str,
        detail: String,
    },

    #[error("corrupt archive {path:?} in {component}::{operation}: {detail}")]
    CorruptArchive {
        component: &'static str,
        operation: &'static str,
        path: PathBuf,
        detail: String,
    },

    #[error("corrupt internal state in {component}::{operation}: {detail}")]
    CorruptInternalState {
        component: &'static str,
        operation: &'static str,
        detail: String,
    },

    #[error("insufficient memory in {component}::{operation}: {detail}")]
    InsufficientMemory {
        component: &'static str,
        operation: &'static str,
        detail: String,
    },

    #[error("storage error in {component}::{operation}: {source}")]
    StorageError {
        component: &'static str,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported in {component}::{operation}: {detail}")]
    Unsupported {
        component: &'static str,
        operation: &'static str,
        detail: String,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid_input(component: &'static str, operation: &'static str, detail: impl Into<String>) -> Self {
        CoreError::InvalidInput { component, operation, detail: detail.into() }
    }

    pub fn out_of_range(component: &'static str, operation: &'static str, detail: impl Into<String>) -> Self {
        CoreError::OutOfRange { component, operation, detail: detail.into() }
    }

    pub fn corrupt_archive(
        component: &'static str,
        operation: &'static str,
        path: impl Into<PathBuf>,
        detail: impl Into<String>,
    ) -> Self {
        CoreError::CorruptArchive { component, operation, path: path.into(), detail: detail.into() }
    }

    pub fn corrupt_internal_state(component: &'static str, operation: &'static str, detail: impl Into<String>) -> Self {
        CoreError::CorruptInternalState { component, operation, detail: detail.into() }
    }

    pub fn insufficient_memory(component: &'static str, operation: &'static str, detail: impl Into<String>) -> Self {
        CoreError::InsufficientMemory { component, operation, detail: detail.into() }
    }

    pub fn storage_error(component: &'static str, operation: &'static str, source: std::io::Error) -> Self {
        CoreError::StorageError { component, operation, source }
    }

    pub fn unsupported(component: &'static str, operation: &'static str, detail: impl Into<String>) -> Self {
        CoreError::Unsupported { component, operation, detail: detail.into() }
    }
}
