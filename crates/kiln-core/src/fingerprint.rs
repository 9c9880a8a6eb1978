//! Content fingerprints for source change detection.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Compute the content fingerprint of a working file.
///
/// Uses buffered reading so large authored sources don't land in memory at
/// once. The fingerprint is a hex-encoded SHA-256 digest.
pub fn file_fingerprint(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_known_digest() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Hello, World!").unwrap();
        file.flush().unwrap();

        assert_eq!(
            file_fingerprint(file.path()).unwrap(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_changes_with_content() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"one").unwrap();
        file.flush().unwrap();
        let first = file_fingerprint(file.path()).unwrap();

        file.write_all(b" two").unwrap();
        file.flush().unwrap();
        let second = file_fingerprint(file.path()).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(file_fingerprint(Path::new("/nonexistent/file")).is_err());
    }
}
