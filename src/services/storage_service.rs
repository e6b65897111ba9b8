use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

/// Writes uploaded resumes under `<root>/resumes` and hands back the
/// reference stored on the application.
#[derive(Clone)]
pub struct ResumeStorage {
    root: PathBuf,
}

impl ResumeStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Validates type and size, then persists the file. Returns a reference
    /// relative to the uploads root, e.g. `resumes/<uuid>.pdf`.
    pub async fn store(&self, filename: &str, data: &[u8]) -> Result<String> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(Error::InvalidArgument(
                "Invalid file type. Only PDF and Word documents are allowed.".into(),
            ));
        }
        if data.len() > MAX_RESUME_BYTES {
            return Err(Error::InvalidArgument(
                "File size too large. Maximum size is 5MB.".into(),
            ));
        }
        if ext == "pdf" && !data.starts_with(b"%PDF") {
            return Err(Error::InvalidArgument("Invalid PDF file content".into()));
        }

        let dir = self.root.join("resumes");
        fs::create_dir_all(&dir).await?;

        let reference = format!("resumes/{}.{}", Uuid::new_v4(), ext);
        fs::write(self.root.join(&reference), data).await.map_err(|e| {
            tracing::error!("Failed to write resume file: {}", e);
            Error::Internal(format!("Failed to save file: {}", e))
        })?;

        Ok(reference)
    }

    /// Deletes a previously stored file. Used to drop the upload when the
    /// submission it belonged to is rejected.
    pub async fn remove(&self, reference: &str) {
        if let Err(e) = fs::remove_file(self.root.join(reference)).await {
            tracing::warn!(reference, "Failed to remove orphaned resume: {}", e);
        }
    }
}
