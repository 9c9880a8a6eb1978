//! Final disc/archive image emission.

use std::path::Path;

use crate::progress::ProgressSink;

/// Leaf writer turning a directory of packaged files into a distributable
/// image.
///
/// The directory's contents are produced by a packaging run and are already
/// in depsgraph order; the writer is expected to preserve that layout.
pub trait ImageBuilder {
    /// Bytes the image for `dir` would occupy, or an error if the layout is
    /// not imageable.
    fn estimate_size(&self, dir: &Path) -> anyhow::Result<u64>;

    /// Emit the image for `dir`.
    fn build(&self, dir: &Path, progress: &dyn ProgressSink) -> anyhow::Result<()>;
}
