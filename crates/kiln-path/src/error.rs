use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("absolute path not allowed in project: {raw}")]
    Absolute { raw: String },

    #[error("path escapes the project root: {raw}")]
    EscapesRoot { raw: String },
}

pub type Result<T> = std::result::Result<T, PathError>;
