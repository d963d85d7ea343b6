//! Input resolution: validate a user-supplied PDF path.
//!
//! We validate the PDF magic bytes (`%PDF`) before handing the path to
//! pdfium so callers get a meaningful error rather than a cryptic
//! rendering failure on a mislabelled file.

use crate::error::IngestError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve a local file path, validating existence and PDF magic bytes.
pub fn resolve_input(path_str: impl AsRef<Path>) -> Result<PathBuf, IngestError> {
    let path = path_str.as_ref().to_path_buf();

    if !path.exists() {
        return Err(IngestError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(IngestError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IngestError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(IngestError::FileNotFound { path });
        }
    }

    debug!("Resolved PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/a/real/file.pdf").unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"hello world")
            .unwrap();

        let err = resolve_input(&path).unwrap_err();
        match err {
            IngestError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn pdf_magic_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"%PDF-1.7\n%fake")
            .unwrap();

        let resolved = resolve_input(&path).unwrap();
        assert_eq!(resolved, path);
    }
}
