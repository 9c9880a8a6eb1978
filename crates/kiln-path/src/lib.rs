//! Path model for kiln projects.
//!
//! Every resource a project tracks is addressed by a [`ProjectPath`]: a
//! normalized path relative to the project root. Normalized paths compare by
//! value and are usable as map keys, which is what the rest of the pipeline
//! builds on. The absolute anchor for one project instance is a
//! [`ProjectRootPath`].

#![deny(unsafe_code)]

mod error;
mod path;
mod root;

pub use error::{PathError, Result};
pub use path::ProjectPath;
pub use root::{CONFIG_DIR, ProjectRootPath, find_project_root};
