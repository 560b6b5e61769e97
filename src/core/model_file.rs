/// Model file resolution and header sniffing.
///
/// This is a boundary check only: it rejects files that are obviously not a
/// model bundle before the engine spends memory trying to map them.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Smallest file accepted as a model bundle.
pub const MIN_MODEL_BYTES: u64 = 500_000_000;

const HEADER_LEN: usize = 16;

/// Container format recognised from the first bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// `.task` bundle stored as a ZIP archive.
    ZipBundle,
    /// Bare flatbuffer.
    FlatBuffer,
    /// TFLite model.
    TfLite,
}

/// Why a model file was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ModelFileError {
    #[error("model file inaccessible: {path}: {source}")]
    Inaccessible {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("model file too small: {0} bytes")]
    TooSmall(u64),
    #[error("cannot read model file header")]
    HeaderUnreadable,
    #[error("model file is corrupted (all zero header)")]
    ZeroHeader,
    #[error("unknown model header: {0}")]
    UnknownHeader(String),
}

/// Find the model file for `requested`.
///
/// `requested` wins if it names a file; otherwise each directory is tried in
/// order with `requested` joined onto it.
pub fn resolve(requested: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    let direct = Path::new(requested);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }

    for dir in search_dirs {
        let candidate = dir.join(requested);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "Resolved model file");
            return Some(candidate);
        }
    }

    warn!(requested, "Model not found");
    for dir in search_dirs {
        warn!(checked = %dir.join(requested).display(), "Model search path");
    }
    None
}

/// Check size and header of a model file.
pub fn validate(path: &Path) -> Result<ModelFormat, ModelFileError> {
    validate_with_min_size(path, MIN_MODEL_BYTES)
}

/// [`validate`] with a caller-chosen size threshold.
pub fn validate_with_min_size(path: &Path, min_bytes: u64) -> Result<ModelFormat, ModelFileError> {
    let inaccessible = |source| ModelFileError::Inaccessible {
        path: path.to_path_buf(),
        source,
    };

    let len = std::fs::metadata(path).map_err(inaccessible)?.len();
    debug!(path = %path.display(), size_mb = len / (1024 * 1024), "Model file size");
    if len < min_bytes {
        return Err(ModelFileError::TooSmall(len));
    }

    let mut header = [0u8; HEADER_LEN];
    let mut file = File::open(path).map_err(inaccessible)?;
    let read = file.read(&mut header).map_err(inaccessible)?;
    if read < 4 {
        return Err(ModelFileError::HeaderUnreadable);
    }

    sniff(&header[..read])
}

/// Identify a model bundle from its leading bytes.
pub fn sniff(header: &[u8]) -> Result<ModelFormat, ModelFileError> {
    let Some(sig) = header.get(..4) else {
        return Err(ModelFileError::HeaderUnreadable);
    };

    if sig.iter().all(|b| *b == 0) {
        return Err(ModelFileError::ZeroHeader);
    }

    match sig {
        [0x50, 0x4B, 0x03, 0x04] => Ok(ModelFormat::ZipBundle),
        [0x1C, 0x00, _, _] => Ok(ModelFormat::FlatBuffer),
        [0x54, 0x46, 0x4C, _] => Ok(ModelFormat::TfLite),
        _ => Err(ModelFileError::UnknownHeader(hex(sig))),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn sniff_recognises_known_signatures() {
        assert_eq!(sniff(b"PK\x03\x04rest").unwrap(), ModelFormat::ZipBundle);
        assert_eq!(sniff(&[0x1C, 0x00, 0x00, 0x00]).unwrap(), ModelFormat::FlatBuffer);
        assert_eq!(sniff(b"TFL3").unwrap(), ModelFormat::TfLite);
    }

    #[test]
    fn sniff_rejects_zero_and_unknown_headers() {
        assert!(matches!(sniff(&[0, 0, 0, 0, 1]), Err(ModelFileError::ZeroHeader)));
        match sniff(b"GGUF") {
            Err(ModelFileError::UnknownHeader(hex)) => assert_eq!(hex, "47 47 55 46"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(sniff(b"PK"), Err(ModelFileError::HeaderUnreadable)));
    }

    #[test]
    fn validate_enforces_minimum_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "tiny.task", b"PK\x03\x04");
        assert!(matches!(validate(&path), Err(ModelFileError::TooSmall(4))));
    }

    #[test]
    fn validate_reads_header_of_large_enough_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "model.task", b"PK\x03\x04 zipped model bytes");
        assert_eq!(validate_with_min_size(&path, 8).unwrap(), ModelFormat::ZipBundle);

        let short = write_file(dir.path(), "short.task", b"PK");
        assert!(matches!(
            validate_with_min_size(&short, 0),
            Err(ModelFileError::HeaderUnreadable)
        ));
    }

    #[test]
    fn validate_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.task");
        assert!(matches!(validate(&missing), Err(ModelFileError::Inaccessible { .. })));
    }

    #[test]
    fn resolve_prefers_direct_path_then_search_order() {
        let primary = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        let dirs = vec![primary.path().to_path_buf(), fallback.path().to_path_buf()];

        assert_eq!(resolve("model.task", &dirs), None);

        let in_fallback = write_file(fallback.path(), "model.task", b"x");
        assert_eq!(resolve("model.task", &dirs), Some(in_fallback));

        let in_primary = write_file(primary.path(), "model.task", b"x");
        assert_eq!(resolve("model.task", &dirs), Some(in_primary.clone()));

        let direct = in_primary.to_string_lossy().into_owned();
        assert_eq!(resolve(&direct, &[]), Some(in_primary));
    }
}
