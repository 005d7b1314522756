//! Turning a local text file into a chat prompt.

use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Only text files are supported.")]
    Unsupported { mime: String },
    #[error("Could not read file '{name}'.")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Build the prompt text for a file, or reject it by MIME type.
pub fn ingest(name: &str, mime: &str, bytes: &[u8]) -> Result<String, IngestError> {
    if !mime.starts_with("text/") {
        return Err(IngestError::Unsupported {
            mime: mime.to_string(),
        });
    }
    let content = String::from_utf8_lossy(bytes);
    Ok(format!(
        "Here is the content of the file '{}':\n\n{}",
        name, content
    ))
}

/// MIME type guessed from the file name; unknown types count as binary.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Read `path` and build its prompt. The type is checked before reading.
pub async fn ingest_path(path: &Path) -> Result<String, IngestError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let mime = guess_mime(path);
    if !mime.starts_with("text/") {
        return Err(IngestError::Unsupported { mime });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| IngestError::Read {
            name: name.clone(),
            source,
        })?;
    debug!(file = %name, %mime, bytes = bytes.len(), "ingested file");
    ingest(&name, &mime, &bytes)
}
