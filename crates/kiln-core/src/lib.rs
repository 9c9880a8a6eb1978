//! Project orchestrator for the kiln asset pipeline.
//!
//! A [`Project`] is a long-lived handle over one working directory: it owns
//! the persisted registration state (tracked paths, dependency groups,
//! enabled backends), drives cook passes over the working tree, builds the
//! package dependency graph, and streams cooked outputs to a backend's
//! packager. Backends come from a [`SpecRegistry`] and are otherwise opaque;
//! the orchestrator only knows the [`DataSpec`] capability surface.
//!
//! [`SpecRegistry`]: kiln_spec::SpecRegistry
//! [`DataSpec`]: kiln_spec::DataSpec

#![deny(unsafe_code)]

mod cook;
mod error;
mod fingerprint;
mod graph;
mod interrupt;
mod package;
mod project;

pub use cook::{CookOptions, CookOutcome, CookStats};
pub use error::{ProjectError, Result};
pub use fingerprint::file_fingerprint;
pub use interrupt::{interrupt_requested, request_interrupt, reset_interrupt};
pub use package::PackageOutcome;
pub use project::{Project, ProjectDataSpec};
