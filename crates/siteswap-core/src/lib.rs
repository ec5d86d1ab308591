mod archive;
mod config;
mod error;
mod outcome;
mod path;

pub use archive::ArchiveType;
pub use config::{
    ConfigFile, ConnectionSection, MaintenanceSettings, PreservedFileSet, SiteSection, SwapConfig,
};
pub use error::{RemoteError, RemoteErrorKind};
pub use outcome::StepOutcome;
pub use path::{RemotePath, TreeEntry};
