//! Object model: one trackable working resource.

use std::fmt;
use std::sync::Arc;

use kiln_path::ProjectPath;

/// Packed four-character type tag assigned by backends.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const NULL: FourCc = FourCc(*b"NULL");

    pub const fn new(tag: &[u8; 4]) -> Self {
        Self(*tag)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            let ch = if byte.is_ascii_graphic() {
                byte as char
            } else {
                '?'
            };
            write!(f, "{ch}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

/// Byte-order of the target system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataEndianness {
    #[default]
    None,
    Big,
    Little,
}

/// Data-format family of the target system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataPlatform {
    #[default]
    None,
    /// Scanline textures and portable shader bundles.
    Generic,
    /// Tiled textures and register-level buffers.
    Tiled,
    /// Swizzled textures and precompiled shader objects.
    Swizzled,
}

/// Sink receiving cooked bytes; an object pushes zero or more chunks and
/// never owns the output buffer.
pub type DataSink<'a> = dyn FnMut(&[u8]) + 'a;

/// Collector invoked once per direct dependency.
pub type DepCollector<'a> = dyn FnMut(Arc<dyn SourceObject>) + 'a;

/// One trackable working resource: an authored file or a logical sub-object
/// of one.
///
/// Objects are produced by their backend's [`DataSpec::load_object`] hook in
/// response to a tracked path, never constructed directly by pipeline
/// callers. Both capabilities default to no-ops so most objects need only a
/// path and type tag.
///
/// [`DataSpec::load_object`]: crate::DataSpec::load_object
pub trait SourceObject: Send + Sync {
    /// Project-relative path of the working resource.
    fn path(&self) -> &ProjectPath;

    fn type_tag(&self) -> FourCc {
        FourCc::NULL
    }

    /// Push cooked bytes into `sink`.
    ///
    /// Returning false signals a recoverable cook failure for this object
    /// only; the pipeline logs it and continues with other objects unless
    /// the caller asked for fail-fast.
    fn cook_object(
        &self,
        _sink: &mut DataSink<'_>,
        _endianness: DataEndianness,
        _platform: DataPlatform,
    ) -> bool {
        true
    }

    /// Invoke `collect` once per direct dependency.
    ///
    /// Non-recursive: the pipeline walks the resulting edges itself and
    /// breaks cycles, so an object is never asked to gather twice within one
    /// traversal.
    fn gather_deps(&self, _collect: &mut DepCollector<'_>) {}
}

/// An object with no cook or dependency behavior of its own.
///
/// Default result of [`DataSpec::load_object`], and sufficient for backends
/// that implement cooking directly against the filesystem.
///
/// [`DataSpec::load_object`]: crate::DataSpec::load_object
pub struct PlainObject {
    path: ProjectPath,
    tag: FourCc,
}

impl PlainObject {
    pub fn new(path: ProjectPath, tag: FourCc) -> Self {
        Self { path, tag }
    }
}

impl SourceObject for PlainObject {
    fn path(&self) -> &ProjectPath {
        &self.path
    }

    fn type_tag(&self) -> FourCc {
        self.tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCc::new(b"MESH").to_string(), "MESH");
        assert_eq!(FourCc::NULL.to_string(), "NULL");
        assert_eq!(FourCc::new(&[0x00, b'A', b'B', 0xff]).to_string(), "?AB?");
    }

    #[test]
    fn test_plain_object_defaults() {
        let object = PlainObject::new(
            ProjectPath::new("models/foo.mesh").unwrap(),
            FourCc::new(b"MESH"),
        );
        let mut chunks = 0usize;
        assert!(object.cook_object(
            &mut |_| chunks += 1,
            DataEndianness::Little,
            DataPlatform::Generic,
        ));
        assert_eq!(chunks, 0);

        let mut deps = 0usize;
        object.gather_deps(&mut |_| deps += 1);
        assert_eq!(deps, 0);
    }
}
