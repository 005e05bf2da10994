use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Content-addressed variant storage rooted at an output directory.
///
/// Layout: `<root>/<source name>/<resolution>/<content hash>.<ext>`.
pub struct VariantStorage {
    output_directory: PathBuf,
}

impl VariantStorage {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    /// Deterministic location of a variant.
    pub fn variant_path(
        &self,
        source_name: &str,
        resolution: u32,
        content_hash: &str,
        extension: &str,
    ) -> PathBuf {
        self.output_directory
            .join(source_name)
            .join(resolution.to_string())
            .join(format!("{}.{}", content_hash, extension))
    }

    /// Writes an encoded variant, returning the path it was written to.
    ///
    /// The path depends only on the inputs, so rewriting identical bytes
    /// to the same location is harmless.
    pub fn store(
        &self,
        content: &[u8],
        source_name: &str,
        resolution: u32,
        content_hash: &str,
        extension: &str,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.variant_path(source_name, resolution, content_hash, extension);
        if let Some(dir) = file_path.parent() {
            ensure_directory(dir)?;
        }

        std::fs::write(&file_path, content).map_err(|e| StorageError::WriteFile {
            path: file_path.clone(),
            source: e,
        })?;

        Ok(file_path)
    }
}

/// `create_dir_all` already treats an existing directory as success, which
/// makes concurrent creation of the same directory safe.
pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reads a whole source file.
pub fn read_source(path: &Path) -> Result<Vec<u8>, StorageError> {
    std::fs::read(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Deletes a file. A file that is already gone counts as removed.
pub fn remove_file(path: &Path) -> Result<(), StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::RemoveFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Copies `source` into `directory` under a unique name, returning the copy.
/// Used to stage transient uploads.
pub fn stage_copy(source: &Path, directory: &Path) -> Result<PathBuf, StorageError> {
    ensure_directory(directory)?;

    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let staged = directory.join(format!("{}-{}", uuid::Uuid::new_v4(), file_name));

    std::fs::copy(source, &staged).map_err(|e| StorageError::WriteFile {
        path: staged.clone(),
        source: e,
    })?;

    Ok(staged)
}

/// Renders a path with forward slashes regardless of platform.
pub fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
