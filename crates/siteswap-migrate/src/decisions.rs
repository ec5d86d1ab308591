/// Points where the workflow needs an operator's yes/no.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPoint {
    /// The backup directory already exists; files in it may be overwritten.
    ReuseBackupLocation,
    /// Move the preserved files into the upgrade before it goes live.
    RestorePreservedFiles,
}

impl DecisionPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReuseBackupLocation => "reuse_backup_location",
            Self::RestorePreservedFiles => "restore_preserved_files",
        }
    }

    pub fn question(self) -> &'static str {
        match self {
            Self::ReuseBackupLocation => {
                "Backup directory already exists, existing content will be overwritten. Continue?"
            }
            Self::RestorePreservedFiles => {
                "Restore the backed up files into the upgrade before it goes live?"
            }
        }
    }
}

pub trait DecisionProvider {
    fn confirm(&mut self, point: DecisionPoint) -> bool;
}

impl<F> DecisionProvider for F
where
    F: FnMut(DecisionPoint) -> bool,
{
    fn confirm(&mut self, point: DecisionPoint) -> bool {
        self(point)
    }
}
