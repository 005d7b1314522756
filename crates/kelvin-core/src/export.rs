use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::state::{ChatMessage, ChatRole};

/// Format the conversation as a markdown transcript.
pub fn transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let who = match m.role {
                ChatRole::User => "You",
                ChatRole::Assistant => "Kelvin",
            };
            // Two trailing spaces keep the line break in rendered markdown
            format!("**{}:** {}", who, m.content.replace('\n', "  \n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `kelvin-chat-<unix millis>.md`
pub fn export_file_name(timestamp_millis: i64) -> String {
    format!("kelvin-chat-{}.md", timestamp_millis)
}

/// Write the transcript into `dir`, returning the file's path.
pub fn write_transcript(messages: &[ChatMessage], dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(export_file_name(chrono::Utc::now().timestamp_millis()));
    fs::write(&path, transcript(messages))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), messages = messages.len(), "exported conversation");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_format() {
        let messages = vec![
            ChatMessage::assistant("Hi"),
            ChatMessage::user("line one\nline two"),
        ];
        assert_eq!(
            transcript(&messages),
            "**Kelvin:** Hi\n\n**You:** line one  \nline two"
        );
    }

    #[test]
    fn test_transcript_empty() {
        assert_eq!(transcript(&[]), "");
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name(1700000000123), "kelvin-chat-1700000000123.md");
    }

    #[test]
    fn test_write_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_transcript(&[ChatMessage::user("hey")], dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("kelvin-chat-") && name.ends_with(".md"));
        assert_eq!(fs::read_to_string(path).unwrap(), "**You:** hey");
    }
}
