use std::fmt;

use siteswap_core::StepOutcome;

use crate::FileRelocation;

/// Workflow phases in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    ResolveStagingRoot,
    VerifySiteRoot,
    VerifySitesDirectory,
    EnsureBackupLocation,
    BackupPreservedFiles,
    UploadMaintenancePage,
    UploadStagedUpgrade,
    ClearStagedSitesSubdir,
    RelocateSitesSubdir,
    OptionalRestorePreservedFiles,
    RenameOldRootAway,
    RenameStagedRootIntoPlace,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 12] = [
        Self::ResolveStagingRoot,
        Self::VerifySiteRoot,
        Self::VerifySitesDirectory,
        Self::EnsureBackupLocation,
        Self::BackupPreservedFiles,
        Self::UploadMaintenancePage,
        Self::UploadStagedUpgrade,
        Self::ClearStagedSitesSubdir,
        Self::RelocateSitesSubdir,
        Self::OptionalRestorePreservedFiles,
        Self::RenameOldRootAway,
        Self::RenameStagedRootIntoPlace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResolveStagingRoot => "resolve_staging_root",
            Self::VerifySiteRoot => "verify_site_root",
            Self::VerifySitesDirectory => "verify_sites_directory",
            Self::EnsureBackupLocation => "ensure_backup_location",
            Self::BackupPreservedFiles => "backup_preserved_files",
            Self::UploadMaintenancePage => "upload_maintenance_page",
            Self::UploadStagedUpgrade => "upload_staged_upgrade",
            Self::ClearStagedSitesSubdir => "clear_staged_sites_subdir",
            Self::RelocateSitesSubdir => "relocate_sites_subdir",
            Self::OptionalRestorePreservedFiles => "optional_restore_preserved_files",
            Self::RenameOldRootAway => "rename_old_root_away",
            Self::RenameStagedRootIntoPlace => "rename_staged_root_into_place",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ResolveStagingRoot => "resolve upgrade root",
            Self::VerifySiteRoot => "verify site root",
            Self::VerifySitesDirectory => "verify sites directory",
            Self::EnsureBackupLocation => "create backup location",
            Self::BackupPreservedFiles => "back up customized files",
            Self::UploadMaintenancePage => "upload maintenance page",
            Self::UploadStagedUpgrade => "upload upgrade",
            Self::ClearStagedSitesSubdir => "clear upgrade sites directory",
            Self::RelocateSitesSubdir => "move sites directory",
            Self::OptionalRestorePreservedFiles => "restore customized files",
            Self::RenameOldRootAway => "rename old site root",
            Self::RenameStagedRootIntoPlace => "rename upgrade into place",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Presentation hooks; nothing here may influence the workflow's decisions.
pub trait StepReporter {
    fn step_started(&mut self, number: usize, title: &str);

    fn step_detail(&mut self, message: &str);

    fn step_finished(&mut self, number: usize, outcome: &StepOutcome);

    fn file_relocated(&mut self, relocation: &FileRelocation) {
        self.step_detail(&format!(
            "{} -> {}: {}",
            relocation.source, relocation.target, relocation.outcome
        ));
    }

    /// Starts a cosmetic indicator for a long blocking operation. It ends when the
    /// returned guard is dropped.
    fn start_activity(&mut self, _label: &str) -> Box<dyn Activity> {
        Box::new(NoActivity)
    }
}

pub trait Activity {
    fn advance(&mut self, completed: u64);
}

struct NoActivity;

impl Activity for NoActivity {
    fn advance(&mut self, _completed: u64) {}
}

/// Numbers steps consecutively and forwards them to a reporter.
pub struct StepSequencer<'r> {
    reporter: &'r mut dyn StepReporter,
    next: usize,
}

impl<'r> StepSequencer<'r> {
    pub fn new(reporter: &'r mut dyn StepReporter) -> Self {
        Self::starting_at(reporter, 1)
    }

    pub fn starting_at(reporter: &'r mut dyn StepReporter, first: usize) -> Self {
        Self {
            reporter,
            next: first.max(1),
        }
    }

    pub fn next_number(&self) -> usize {
        self.next
    }

    pub fn begin(&mut self, title: &str) -> usize {
        let number = self.next;
        self.next += 1;
        self.reporter.step_started(number, title);
        number
    }

    pub fn detail(&mut self, message: &str) {
        self.reporter.step_detail(message);
    }

    pub fn relocated(&mut self, relocation: &FileRelocation) {
        self.reporter.file_relocated(relocation);
    }

    pub fn finish(&mut self, number: usize, outcome: &StepOutcome) {
        self.reporter.step_finished(number, outcome);
    }

    pub fn activity(&mut self, label: &str) -> Box<dyn Activity> {
        self.reporter.start_activity(label)
    }
}
