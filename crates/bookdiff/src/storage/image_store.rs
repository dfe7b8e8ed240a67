//! Local filesystem object store for uploaded page images.
//!
//! Path references are opaque strings of the form
//! `{project_id}/{role}/{filename}`, scoped by project and folder role.
//! Consumers hold only the reference; the store maps it back to a file
//! under its root directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::StorageError;

/// Which side of the comparison an image belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FolderRole {
    Old,
    New,
}

impl FolderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderRole::Old => "old",
            FolderRole::New => "new",
        }
    }
}

impl std::fmt::Display for FolderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores one image and returns its opaque path reference.
    ///
    /// The write uses atomic create-new semantics; a name collision gets a
    /// numbered suffix instead of overwriting an existing upload.
    pub fn upload(
        &self,
        project_id: &str,
        role: FolderRole,
        filename: &str,
        content: &[u8],
    ) -> Result<String, StorageError> {
        validate_segment(project_id, "project id")?;
        validate_segment(filename, "filename")?;

        let dir = self.root.join(project_id).join(role.as_str());
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;

        let stored_name = self.write_with_atomic_creation(&dir, filename, content)?;
        Ok(format!("{}/{}/{}", project_id, role, stored_name))
    }

    /// Writes content using atomic file creation, trying numbered variants
    /// on collision. Returns the filename actually used.
    fn write_with_atomic_creation(
        &self,
        dir: &Path,
        filename: &str,
        content: &[u8],
    ) -> Result<String, StorageError> {
        let (base, ext) = match filename.rfind('.') {
            Some(dot) => (&filename[..dot], Some(&filename[dot..])),
            None => (filename, None),
        };

        for counter in 1..=1000 {
            let try_name = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };

            let try_path = dir.join(&try_name);

            // create_new fails if the file exists - atomic check-and-create
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    return Ok(try_name);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(dir.join(filename)))
    }

    /// Reads back the bytes of a previously uploaded image.
    pub fn download(&self, path_ref: &str) -> Result<Vec<u8>, StorageError> {
        let rel = validate_ref(path_ref)?;
        let path = self.root.join(rel);
        if !path.is_file() {
            return Err(StorageError::NotFound(path_ref.to_string()));
        }
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }

    /// Bulk-uploads a local directory of page images for one side of a
    /// project. Files are taken in filename order (which is page order for
    /// scanned books) and stored with a zero-padded index prefix so the
    /// returned references preserve that order.
    ///
    /// Only image files and PDFs are accepted; anything else is skipped.
    pub fn import_folder(
        &self,
        project_id: &str,
        role: FolderRole,
        dir: &Path,
    ) -> Result<Vec<String>, StorageError> {
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StorageError::ScanFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if is_page_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        let mut refs = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            let original_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("page_{}", index + 1));
            let content = std::fs::read(path).map_err(|e| StorageError::ReadFile {
                path: path.clone(),
                source: e,
            })?;
            let stored = self.upload(
                project_id,
                role,
                &format!("{:04}_{}", index + 1, original_name),
                &content,
            )?;
            refs.push(stored);
        }

        log::info!(
            "Imported {} page images into {}/{}",
            refs.len(),
            project_id,
            role
        );

        Ok(refs)
    }
}

/// Accepts image files and PDFs, by extension.
fn is_page_file(path: &Path) -> bool {
    match mime_guess::from_path(path).first() {
        Some(mime) => mime.type_() == mime_guess::mime::IMAGE || mime == mime_guess::mime::APPLICATION_PDF,
        None => false,
    }
}

/// Validates a single path-ref segment: no separators, no traversal, not
/// empty after trimming dots.
fn validate_segment(segment: &str, what: &str) -> Result<(), StorageError> {
    if segment.trim_matches('.').is_empty() {
        return Err(StorageError::InvalidPathRef {
            path_ref: segment.to_string(),
            reason: format!("{} is empty or dots-only", what),
        });
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err(StorageError::InvalidPathRef {
            path_ref: segment.to_string(),
            reason: format!("{} contains path separators", what),
        });
    }
    if segment.contains("..") {
        return Err(StorageError::InvalidPathRef {
            path_ref: segment.to_string(),
            reason: format!("{} contains path traversal", what),
        });
    }
    Ok(())
}

/// Validates a full path reference and returns it as a relative path.
fn validate_ref(path_ref: &str) -> Result<&Path, StorageError> {
    let path = Path::new(path_ref);
    if path.is_absolute() {
        return Err(StorageError::InvalidPathRef {
            path_ref: path_ref.to_string(),
            reason: "reference is an absolute path".to_string(),
        });
    }
    if path_ref.contains("..") {
        return Err(StorageError::InvalidPathRef {
            path_ref: path_ref.to_string(),
            reason: "reference contains path traversal".to_string(),
        });
    }
    if path_ref.contains('\\') {
        return Err(StorageError::InvalidPathRef {
            path_ref: path_ref.to_string(),
            reason: "reference contains backslashes".to_string(),
        });
    }
    Ok(path)
}
