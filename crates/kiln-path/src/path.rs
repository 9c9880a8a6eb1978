//! Normalized project-relative paths.

use std::fmt;

use crate::error::{PathError, Result};

/// A path expressed relative to the project root.
///
/// Construction normalizes the raw text: separators become `/`, empty and
/// `.` segments are dropped, and `..` segments are resolved lexically. Two
/// paths are equal iff their normalized forms are equal, so `ProjectPath`
/// works as a map key throughout the pipeline.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProjectPath {
    rel: String,
}

impl ProjectPath {
    /// Normalize `raw` into a project-relative path.
    ///
    /// Absolute paths are rejected, as are paths whose `..` segments would
    /// climb above the project root.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref();
        if is_absolute(raw) {
            return Err(PathError::Absolute {
                raw: raw.to_string(),
            });
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(PathError::EscapesRoot {
                            raw: raw.to_string(),
                        });
                    }
                }
                other => segments.push(other),
            }
        }

        Ok(Self {
            rel: segments.join("/"),
        })
    }

    /// The project root itself (the empty relative path).
    pub fn project_root() -> Self {
        Self::default()
    }

    /// True for the empty path addressing the project root.
    pub fn is_root(&self) -> bool {
        self.rel.is_empty()
    }

    /// Append `segment` and renormalize.
    pub fn join(&self, segment: impl AsRef<str>) -> Result<Self> {
        if self.rel.is_empty() {
            return Self::new(segment);
        }
        Self::new(format!("{}/{}", self.rel, segment.as_ref()))
    }

    /// The containing directory, or `None` for the project root.
    pub fn parent(&self) -> Option<Self> {
        if self.rel.is_empty() {
            return None;
        }
        let rel = match self.rel.rfind('/') {
            Some(idx) => self.rel[..idx].to_string(),
            None => String::new(),
        };
        Some(Self { rel })
    }

    /// Final path segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        if self.rel.is_empty() {
            return None;
        }
        Some(match self.rel.rfind('/') {
            Some(idx) => &self.rel[idx + 1..],
            None => &self.rel,
        })
    }

    /// Final segment with its extension removed.
    pub fn file_stem(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(0) | None => Some(name),
            Some(idx) => Some(&name[..idx]),
        }
    }

    /// Extension of the final segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    /// True when `ancestor` is this path, or a directory containing it.
    ///
    /// The project root contains every path.
    pub fn starts_with(&self, ancestor: &ProjectPath) -> bool {
        if ancestor.rel.is_empty() {
            return true;
        }
        if self.rel == ancestor.rel {
            return true;
        }
        self.rel.len() > ancestor.rel.len()
            && self.rel.starts_with(&ancestor.rel)
            && self.rel.as_bytes()[ancestor.rel.len()] == b'/'
    }

    /// Iterate the normalized segments.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.rel.split('/').filter(|s| !s.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.rel
    }
}

fn is_absolute(raw: &str) -> bool {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return true;
    }
    // Windows drive prefix, e.g. `C:\` or `C:/`.
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rel)
    }
}

impl fmt::Debug for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectPath({:?})", self.rel)
    }
}
