//! Archive Intake & Expansion
//!
//! Turns an uploaded zip payload into an isolated, per-request [`Workspace`]:
//! the archive bytes are persisted to a uniquely named temporary file, then
//! expanded into a freshly created, uniquely named directory. Entry names
//! are validated against path traversal before anything is written, so no
//! archive can place files outside its own workspace. The workspace owns its
//! directory and reclaims it on drop, whether the request succeeds or fails.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::error::IntakeError;

/// An isolated directory holding one request's expanded archive contents.
///
/// Exclusively owned by one request; the backing directory is deleted when
/// the workspace is dropped.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    root: TempDir,
}

impl Workspace {
    fn create(scratch_dir: Option<&Path>) -> Result<Self, IntakeError> {
        let id = Uuid::new_v4();
        let mut builder = tempfile::Builder::new();
        let prefix = format!("hsds-workspace-{id}-");
        builder.prefix(&prefix);
        let root = match scratch_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self { id, root })
    }

    /// Request-scoped identifier, used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Root of the expanded file tree.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Delete the workspace now, surfacing any cleanup failure. Dropping the
    /// workspace reclaims it too; this is for callers that want the error.
    pub fn close(self) -> io::Result<()> {
        self.root.close()
    }
}

/// Accepts uploaded archives and expands them into workspaces.
#[derive(Debug, Clone)]
pub struct ArchiveIntake {
    scratch_dir: Option<PathBuf>,
    max_archive_bytes: u64,
}

/// Expanded contents may legitimately exceed the compressed payload; beyond
/// this ratio the archive is treated as hostile.
const MAX_EXPANSION_RATIO: u64 = 10;

impl ArchiveIntake {
    pub fn new(scratch_dir: Option<PathBuf>, max_archive_mb: u64) -> Self {
        Self {
            scratch_dir,
            max_archive_bytes: max_archive_mb.saturating_mul(1024 * 1024),
        }
    }

    /// Persist and expand an uploaded archive into a fresh workspace.
    pub async fn expand(&self, payload: Vec<u8>) -> Result<Workspace, IntakeError> {
        if payload.is_empty() {
            return Err(IntakeError::EmptyPayload);
        }
        if payload.len() as u64 > self.max_archive_bytes {
            return Err(IntakeError::TooLarge {
                limit_mb: self.max_archive_bytes / (1024 * 1024),
            });
        }

        let intake = self.clone();
        tokio::task::spawn_blocking(move || intake.expand_blocking(&payload))
            .await
            .map_err(|e| IntakeError::Io(io::Error::other(format!("intake task failed: {e}"))))?
    }

    fn expand_blocking(&self, payload: &[u8]) -> Result<Workspace, IntakeError> {
        // Persist to a per-request unique temporary file first; concurrent
        // requests must never share an archive path.
        let mut builder = tempfile::Builder::new();
        let prefix = format!("hsds-archive-{}-", Uuid::new_v4());
        builder.prefix(&prefix).suffix(".zip");
        let mut archive_file = match &self.scratch_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        archive_file.write_all(payload)?;
        archive_file.flush()?;
        archive_file.seek(SeekFrom::Start(0))?;

        let mut archive = zip::ZipArchive::new(archive_file).map_err(|e| {
            IntakeError::NotAnArchive {
                details: e.to_string(),
            }
        })?;

        let workspace = Workspace::create(self.scratch_dir.as_deref())?;
        tracing::debug!(
            workspace = %workspace.id(),
            entries = archive.len(),
            "expanding archive"
        );

        let expansion_budget = self
            .max_archive_bytes
            .saturating_mul(MAX_EXPANSION_RATIO);
        let mut expanded_bytes: u64 = 0;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| IntakeError::Extraction {
                entry: format!("#{index}"),
                details: e.to_string(),
            })?;
            let raw_name = entry.name().to_string();

            // Reject absolute paths and any `..` component before touching
            // the filesystem.
            let Some(relative) = entry.enclosed_name() else {
                return Err(IntakeError::PathTraversal { entry: raw_name });
            };
            let destination = workspace.path().join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&destination)?;
                continue;
            }

            expanded_bytes = expanded_bytes.saturating_add(entry.size());
            if expanded_bytes > expansion_budget {
                return Err(IntakeError::TooLarge {
                    limit_mb: expansion_budget / (1024 * 1024),
                });
            }

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut output = File::create(&destination)?;
            io::copy(&mut entry, &mut output).map_err(|e| IntakeError::Extraction {
                entry: raw_name,
                details: e.to_string(),
            })?;
        }

        Ok(workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = SimpleFileOptions::default();
            for (name, contents) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn intake() -> ArchiveIntake {
        ArchiveIntake::new(None, 16)
    }

    #[tokio::test]
    async fn test_expand_writes_entries_into_workspace() {
        let payload = build_zip(&[
            ("contact.csv", "id,name\nc1,Jane\n"),
            ("nested/notes.txt", "hello"),
        ]);
        let workspace = intake().expand(payload).await.unwrap();

        assert!(workspace.path().join("contact.csv").is_file());
        assert!(workspace.path().join("nested/notes.txt").is_file());
        let contents = fs::read_to_string(workspace.path().join("contact.csv")).unwrap();
        assert!(contents.starts_with("id,name"));
    }

    #[tokio::test]
    async fn test_workspace_reclaimed_on_drop() {
        let payload = build_zip(&[("contact.csv", "id\nc1\n")]);
        let workspace = intake().expand(payload).await.unwrap();
        let root = workspace.path().to_path_buf();
        assert!(root.exists());
        drop(workspace);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let err = intake().expand(Vec::new()).await.unwrap_err();
        match err {
            IntakeError::EmptyPayload => (),
            other => panic!("expected EmptyPayload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_payload_rejected() {
        let err = intake().expand(b"definitely not a zip".to_vec()).await.unwrap_err();
        match err {
            IntakeError::NotAnArchive { .. } => (),
            other => panic!("expected NotAnArchive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_path_traversal_entry_rejected() {
        let payload = build_zip(&[("../evil.csv", "id\nx\n")]);
        let err = intake().expand(payload).await.unwrap_err();
        match err {
            IntakeError::PathTraversal { entry } => assert_eq!(entry, "../evil.csv"),
            other => panic!("expected PathTraversal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let small = ArchiveIntake::new(None, 0);
        let err = small.expand(vec![0u8; 128]).await.unwrap_err();
        match err {
            IntakeError::TooLarge { .. } => (),
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_expansions_use_distinct_workspaces() {
        let a = build_zip(&[("contact.csv", "id\na1\n")]);
        let b = build_zip(&[("contact.csv", "id\nb1\n")]);
        let intake = intake();

        let (ws_a, ws_b) = tokio::join!(intake.expand(a), intake.expand(b));
        let ws_a = ws_a.unwrap();
        let ws_b = ws_b.unwrap();

        assert_ne!(ws_a.path(), ws_b.path());
        assert_ne!(ws_a.id(), ws_b.id());
        let a_contents = fs::read_to_string(ws_a.path().join("contact.csv")).unwrap();
        let b_contents = fs::read_to_string(ws_b.path().join("contact.csv")).unwrap();
        assert!(a_contents.contains("a1"));
        assert!(b_contents.contains("b1"));
    }

    #[tokio::test]
    async fn test_scratch_dir_is_used() {
        let scratch = tempfile::tempdir().unwrap();
        let intake = ArchiveIntake::new(Some(scratch.path().to_path_buf()), 16);
        let payload = build_zip(&[("taxonomy.csv", "id,name\nt1,Food\n")]);
        let workspace = intake.expand(payload).await.unwrap();
        assert!(workspace.path().starts_with(scratch.path()));
    }
}
