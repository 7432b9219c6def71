//! Report file handle.
//!
//! All report writes go through one [`ReportFile`]. Each update is a
//! read-modify-write done under an async mutex and persisted by writing a
//! sibling temp file and renaming it over the report, so a reader never
//! sees a half-written file and concurrent updates are applied one at a
//! time.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

use loyalty_monitor_core::section::SectionEditor;

pub struct ReportFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReportFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read report: {}", self.path.display()))
    }

    /// Current body of the section headed `name`, if present.
    pub async fn section(&self, editor: &SectionEditor, name: &str) -> Result<Option<String>> {
        Ok(editor.extract(&self.read().await?, name))
    }

    /// Replace the body of section `name` and persist the report.
    ///
    /// Returns `Ok(false)` and leaves the file untouched when the heading
    /// is not found.
    pub async fn apply_update(
        &self,
        editor: &SectionEditor,
        name: &str,
        body: &str,
    ) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let current = self.read().await?;
        let updated = match editor.replace(&current, name, body) {
            Some(text) => text,
            None => return Ok(false),
        };

        self.write_atomic(&updated).await?;
        info!(section = name, report = %self.path.display(), "updated report section");
        Ok(true)
    }

    async fn write_atomic(&self, contents: &str) -> Result<()> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| anyhow!("Report path has no file name: {}", self.path.display()))?;
        let tmp = self.path.with_file_name(format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            uuid::Uuid::new_v4()
        ));

        tokio::fs::write(&tmp, contents)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e)
                .with_context(|| format!("Failed to replace report: {}", self.path.display()));
        }
        Ok(())
    }
}
