//! Mail-source adapter boundary.
//!
//! The ingestion pipeline only needs an enumerable backlog of
//! (message ID, attachments) tuples; where they come from is the adapter's
//! business. The original deployment drove a desktop mail client over COM
//! automation. That stays outside this crate; [`DirSource`] is the shipped
//! implementation, reading a directory of already-exported attachment files,
//! and is what the integration tests drive the pipeline with.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// One raw attachment as handed over by the mail source.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Attachment file name, used to pick the payload container format
    pub filename: String,
    /// Raw attachment bytes
    pub bytes: Vec<u8>,
}

/// One message with its attachments.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Stable message identifier, the dedup key in the ledger
    pub id: String,
    /// Report attachments carried by the message
    pub attachments: Vec<Attachment>,
}

/// A finite, stably-ordered backlog of report mails.
pub trait MailSource {
    /// Enumerates the backlog in the source's configured order, already
    /// offset past any configured starting position.
    fn messages(&self) -> Result<Vec<MailMessage>>;
}

/// Mail source backed by a directory of attachment files.
///
/// Every regular file is one message; the file name doubles as the message
/// ID and the attachment filename. Enumeration order is by file name,
/// newest-first (reverse lexicographic) by default to match the original
/// mailbox walk, oldest-first when requested.
pub struct DirSource {
    dir: PathBuf,
    oldest_first: bool,
    start_at: Option<usize>,
}

impl DirSource {
    pub fn new(dir: PathBuf, oldest_first: bool, start_at: Option<usize>) -> Self {
        DirSource {
            dir,
            oldest_first,
            start_at,
        }
    }
}

impl MailSource for DirSource {
    fn messages(&self) -> Result<Vec<MailMessage>> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read mail folder {}", self.dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();

        names.sort();
        if !self.oldest_first {
            names.reverse();
        }

        let skip = self.start_at.unwrap_or(0);
        names
            .into_iter()
            .skip(skip)
            .map(|name| {
                let bytes = std::fs::read(self.dir.join(&name))
                    .with_context(|| format!("Failed to read attachment {name}"))?;
                Ok(MailMessage {
                    id: name.clone(),
                    attachments: vec![Attachment {
                        filename: name,
                        bytes,
                    }],
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_files(dir: &TempDir, names: &[&str]) {
        for name in names {
            std::fs::write(dir.path().join(name), b"payload").unwrap();
        }
    }

    #[test]
    fn test_newest_first_by_default() {
        let dir = TempDir::new().unwrap();
        write_files(&dir, &["a.xml", "b.xml", "c.xml"]);

        let source = DirSource::new(dir.path().to_path_buf(), false, None);
        let ids: Vec<_> = source.messages().unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["c.xml", "b.xml", "a.xml"]);
    }

    #[test]
    fn test_oldest_first_when_configured() {
        let dir = TempDir::new().unwrap();
        write_files(&dir, &["a.xml", "b.xml", "c.xml"]);

        let source = DirSource::new(dir.path().to_path_buf(), true, None);
        let ids: Vec<_> = source.messages().unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a.xml", "b.xml", "c.xml"]);
    }

    #[test]
    fn test_start_offset_skips_messages() {
        let dir = TempDir::new().unwrap();
        write_files(&dir, &["a.xml", "b.xml", "c.xml"]);

        let source = DirSource::new(dir.path().to_path_buf(), true, Some(2));
        let ids: Vec<_> = source.messages().unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["c.xml"]);
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let source = DirSource::new(PathBuf::from("/nonexistent/mail/folder"), false, None);
        assert!(source.messages().is_err());
    }
}
