//! Persistent, lockable line stores.
//!
//! A kiln project keeps its registration state (tracked paths, dependency
//! groups, enabled backends) in small line-delimited text files under the
//! hidden project directory. Several tool invocations may target the same
//! project concurrently, so every mutation happens inside a
//! [`ConfigTransaction`]: an exclusive cross-process lock is taken, the
//! current contents are read, edits are applied in memory, and `commit`
//! writes the result back atomically. Dropping the transaction without
//! committing discards the edits.

#![deny(unsafe_code)]

mod error;
mod store;

pub use error::{ConfigError, Result};
pub use store::{ConfigFile, ConfigTransaction};
