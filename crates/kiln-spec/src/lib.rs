//! Backend contract for the kiln asset pipeline.
//!
//! A backend ("data spec") teaches the pipeline how to extract, cook, and
//! package resources for one target system. Backends register a
//! [`DataSpecEntry`] in a [`SpecRegistry`] at startup and implement
//! [`DataSpec`]; the pipeline core drives them without knowing their cooked
//! formats. This crate also defines the object model backends cook through
//! ([`SourceObject`]), the dependency graph structure packaging traverses
//! ([`PackageDepsgraph`]), and the collaborator interfaces the core consumes
//! (progress sinks, worker pools, image writers).

#![deny(unsafe_code)]

mod cache;
mod contract;
mod depsgraph;
mod entry;
mod image;
mod object;
mod progress;
mod workers;

pub use cache::BridgeCache;
pub use contract::{DataSpec, ExtractPassInfo, ExtractReport};
pub use depsgraph::{Node, NodeId, NodeKind, PackageDepsgraph};
pub use entry::{DataSpecEntry, SpecContext, SpecFactory, SpecRegistry, ToolMode};
pub use image::ImageBuilder;
pub use object::{
    DataEndianness, DataPlatform, DataSink, DepCollector, FourCc, PlainObject, SourceObject,
};
pub use progress::{NullProgress, ProgressSink};
pub use workers::{Job, ScopedPool, WorkerPool};
