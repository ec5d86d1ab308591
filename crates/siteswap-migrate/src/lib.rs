mod backup;
mod decisions;
mod delete;
mod error;
mod journal;
mod staging;
mod steps;
mod workflow;

pub use backup::{
    ensure_backup_location, preserve_files, restore_files, BackupLocation, FileRelocation,
    RelocationReport,
};
pub use decisions::{DecisionPoint, DecisionProvider};
pub use delete::{delete_tree, DeletionStats};
pub use error::{ErrorClass, WorkflowError};
pub use journal::{default_journal_path, JournalEvent, JournalingReporter, RunJournal};
pub use staging::{
    render_maintenance_htaccess, MaintenanceFiles, StagingArea, MAINTENANCE_PAGE,
};
pub use steps::{Activity, StepReporter, StepSequencer, WorkflowStep};
pub use workflow::{
    resolve_staging_root_name, SiteSwapWorkflow, SwapPhase, SwapReport, UpgradeContext,
};

#[cfg(test)]
mod tests;
