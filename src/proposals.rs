//! Proposal review ledger.
//!
//! Proposed section updates from pipeline runs are kept in a JSON file
//! until someone approves or rejects them. Approving applies the update to
//! the report through [`ReportFile`]; if that fails the proposal stays
//! pending. The ledger file is always replaced whole, via a temp file and
//! a rename, so a failed save leaves the previous ledger intact.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use loyalty_monitor_core::models::{ProposedUpdate, UpdateStatus};
use loyalty_monitor_core::section::SectionEditor;

use crate::report::ReportFile;

pub struct ProposalLedger {
    path: PathBuf,
    proposals: Vec<ProposedUpdate>,
}

impl ProposalLedger {
    /// Load the ledger at `path`; a missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        let proposals = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read proposals: {}", path.display()))?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse proposals: {}", path.display()))?
            }
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            proposals,
        })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create ledger directory: {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(&self.proposals)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write proposals: {}", tmp.display()))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e)
                .with_context(|| format!("Failed to write proposals: {}", self.path.display()));
        }
        Ok(())
    }

    pub fn all(&self) -> &[ProposedUpdate] {
        &self.proposals
    }

    pub fn pending(&self) -> impl Iterator<Item = &ProposedUpdate> {
        self.proposals
            .iter()
            .filter(|p| p.status == UpdateStatus::Pending)
    }

    /// Add new proposals. A new proposal supersedes any pending one for
    /// the same metric; reviewed proposals are kept as history.
    pub fn merge(&mut self, new: Vec<ProposedUpdate>) -> usize {
        let added = new.len();
        for proposal in new {
            self.proposals.retain(|p| {
                !(p.status == UpdateStatus::Pending && same_metric(&p.metric, &proposal.metric))
            });
            self.proposals.push(proposal);
        }
        added
    }

    fn pending_index(&self, metric: &str) -> Result<usize> {
        match self
            .proposals
            .iter()
            .position(|p| p.status == UpdateStatus::Pending && same_metric(&p.metric, metric))
        {
            Some(i) => Ok(i),
            None => bail!("No pending proposal for metric '{}'", metric),
        }
    }

    /// Apply the pending proposal for `metric` to the report, mark it
    /// approved, and save the ledger.
    ///
    /// The ledger is saved once before the report is touched, so an
    /// unwritable ledger fails the approval with the report unchanged. If
    /// the final save still fails after the report was rewritten, the error
    /// says so and the file keeps the proposal pending.
    pub async fn approve(
        &mut self,
        metric: &str,
        report: &ReportFile,
        editor: &SectionEditor,
    ) -> Result<ProposedUpdate> {
        let i = self.pending_index(metric)?;
        self.save()
            .context("Proposal ledger is not writable; report left unchanged")?;
        let proposal = &self.proposals[i];

        let applied = report
            .apply_update(editor, &proposal.metric, &proposal.update_text)
            .await
            .with_context(|| format!("Failed to apply update for '{}'", proposal.metric))?;
        if !applied {
            bail!(
                "Section '{}' not found in {}; proposal left pending",
                proposal.metric,
                report.path().display()
            );
        }

        self.proposals[i].status = UpdateStatus::Approved;
        if let Err(e) = self.save() {
            self.proposals[i].status = UpdateStatus::Pending;
            return Err(e.context(format!(
                "Report updated for '{}' but the approval was not recorded",
                self.proposals[i].metric
            )));
        }
        Ok(self.proposals[i].clone())
    }

    /// Mark the pending proposal for `metric` rejected.
    pub fn reject(&mut self, metric: &str) -> Result<ProposedUpdate> {
        let i = self.pending_index(metric)?;
        self.proposals[i].status = UpdateStatus::Rejected;
        Ok(self.proposals[i].clone())
    }
}

fn same_metric(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn proposal(metric: &str, text: &str) -> ProposedUpdate {
        ProposedUpdate {
            id: uuid::Uuid::new_v4().to_string(),
            metric: metric.to_string(),
            update_text: text.to_string(),
            source: "q4.pdf".to_string(),
            status: UpdateStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_load_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        let ledger = ProposalLedger::load(&tmp.path().join("p.json")).unwrap();
        assert!(ledger.all().is_empty());
    }

    #[test]
    fn test_merge_supersedes_pending_and_saves() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/p.json");
        let mut ledger = ProposalLedger::load(&path).unwrap();
        ledger.merge(vec![proposal("Retention", "v1"), proposal("Churn", "c1")]);
        ledger.reject("churn").unwrap();
        ledger.merge(vec![proposal("retention", "v2"), proposal("Churn", "c2")]);
        ledger.save().unwrap();

        let reloaded = ProposalLedger::load(&path).unwrap();
        let pending: Vec<&str> = reloaded.pending().map(|p| p.update_text.as_str()).collect();
        assert_eq!(pending, vec!["v2", "c2"]);
        assert_eq!(reloaded.all().len(), 3);
        assert_eq!(reloaded.all()[0].status, UpdateStatus::Rejected);
    }

    #[tokio::test]
    async fn test_approve_applies_to_report() {
        let tmp = TempDir::new().unwrap();
        let report_path = tmp.path().join("report.md");
        std::fs::write(&report_path, "### A. Retention\nOld.\n\n### B. Churn\nOld.\n").unwrap();
        let report = ReportFile::new(&report_path);

        let mut ledger = ProposalLedger::load(&tmp.path().join("p.json")).unwrap();
        ledger.merge(vec![proposal("Retention", "Fell 15% (q4.pdf).")]);

        let approved = ledger
            .approve("Retention", &report, &SectionEditor::default())
            .await
            .unwrap();
        assert_eq!(approved.status, UpdateStatus::Approved);
        assert_eq!(
            std::fs::read_to_string(&report_path).unwrap(),
            "### A. Retention\nFell 15% (q4.pdf).\n\n### B. Churn\nOld.\n"
        );
        assert!(ledger.reject("Retention").is_err());
    }

    #[tokio::test]
    async fn test_approve_missing_section_stays_pending() {
        let tmp = TempDir::new().unwrap();
        let report_path = tmp.path().join("report.md");
        std::fs::write(&report_path, "### A. Retention\nOld.\n").unwrap();
        let report = ReportFile::new(&report_path);

        let mut ledger = ProposalLedger::load(&tmp.path().join("p.json")).unwrap();
        ledger.merge(vec![proposal("Advocacy", "New.")]);
        assert!(ledger
            .approve("Advocacy", &report, &SectionEditor::default())
            .await
            .is_err());
        assert_eq!(ledger.pending().count(), 1);
    }

    #[tokio::test]
    async fn test_approve_is_saved() {
        let tmp = TempDir::new().unwrap();
        let report_path = tmp.path().join("report.md");
        std::fs::write(&report_path, "### A. Retention\nOld.\n").unwrap();
        let report = ReportFile::new(&report_path);
        let ledger_path = tmp.path().join("p.json");

        let mut ledger = ProposalLedger::load(&ledger_path).unwrap();
        ledger.merge(vec![proposal("Retention", "New.")]);
        ledger
            .approve("Retention", &report, &SectionEditor::default())
            .await
            .unwrap();

        let reloaded = ProposalLedger::load(&ledger_path).unwrap();
        assert_eq!(reloaded.pending().count(), 0);
        assert_eq!(reloaded.all()[0].status, UpdateStatus::Approved);
        assert!(!tmp.path().join("p.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_unwritable_ledger_leaves_report_untouched() {
        let tmp = TempDir::new().unwrap();
        let report_path = tmp.path().join("report.md");
        let original = "### A. Retention\nOld.\n";
        std::fs::write(&report_path, original).unwrap();
        let report = ReportFile::new(&report_path);

        let mut ledger = ProposalLedger::load(&tmp.path().join("state/p.json")).unwrap();
        ledger.merge(vec![proposal("Retention", "New.")]);
        // A plain file where the ledger directory should be.
        std::fs::write(tmp.path().join("state"), "").unwrap();

        let err = ledger
            .approve("Retention", &report, &SectionEditor::default())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("report left unchanged"));
        assert_eq!(std::fs::read_to_string(&report_path).unwrap(), original);
        assert_eq!(ledger.pending().count(), 1);
    }

    #[tokio::test]
    async fn test_approve_unreadable_report_stays_pending() {
        let tmp = TempDir::new().unwrap();
        let report = ReportFile::new(tmp.path().join("missing.md"));
        let mut ledger = ProposalLedger::load(&tmp.path().join("p.json")).unwrap();
        ledger.merge(vec![proposal("Retention", "New.")]);
        assert!(ledger
            .approve("Retention", &report, &SectionEditor::default())
            .await
            .is_err());
        assert_eq!(ledger.pending().count(), 1);
    }
}
