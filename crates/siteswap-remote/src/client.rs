use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use siteswap_core::{RemoteError, RemotePath, TreeEntry};

pub const DEFAULT_FTP_PORT: u16 = 21;

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl ConnectionSettings {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_FTP_PORT,
            username: username.into(),
            password: password.into(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    ChangeDirectory,
    List,
    FileStatus,
    Rename,
    DeleteFile,
    RemoveDirectory,
    MakeDirectory,
    Upload,
}

impl RemoteOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChangeDirectory => "change-directory",
            Self::List => "list",
            Self::FileStatus => "file-status",
            Self::Rename => "rename",
            Self::DeleteFile => "delete-file",
            Self::RemoveDirectory => "remove-directory",
            Self::MakeDirectory => "make-directory",
            Self::Upload => "upload",
        }
    }
}

/// Primitive operations offered by the remote file store. Every call blocks until the
/// server acknowledges it; retries and timeouts are the implementation's business.
pub trait RemoteTreeClient {
    fn change_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError>;

    fn list_directory(&mut self, path: &RemotePath) -> Result<Vec<TreeEntry>, RemoteError>;

    /// Whether a regular file exists at `path`. Hidden files count, unlike in a
    /// plain listing on most servers.
    fn file_exists(&mut self, path: &RemotePath) -> Result<bool, RemoteError>;

    fn rename_entry(&mut self, from: &RemotePath, to: &RemotePath) -> Result<(), RemoteError>;

    fn delete_file(&mut self, path: &RemotePath) -> Result<(), RemoteError>;

    /// Removes an empty directory.
    fn remove_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError>;

    fn make_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError>;

    fn upload_file(&mut self, local: &Path, remote: &RemotePath) -> Result<(), RemoteError>;

    /// Uploads `local_root` so that its contents appear under `remote_root`, calling
    /// `progress` with the running count of uploaded files. Returns that count.
    fn upload_tree(
        &mut self,
        local_root: &Path,
        remote_root: &RemotePath,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64, RemoteError> {
        let mut uploaded = 0_u64;
        upload_dir_recursive(self, local_root, remote_root, &mut uploaded, progress)?;
        Ok(uploaded)
    }
}

fn upload_dir_recursive<C: RemoteTreeClient + ?Sized>(
    client: &mut C,
    local_dir: &Path,
    remote_dir: &RemotePath,
    uploaded: &mut u64,
    progress: &mut dyn FnMut(u64),
) -> Result<(), RemoteError> {
    match client.make_directory(remote_dir) {
        Ok(()) | Err(RemoteError::AlreadyExists { .. }) => {}
        Err(err) => return Err(err),
    }

    let local_io_error = |err: std::io::Error| RemoteError::Io {
        path: remote_dir.clone(),
        message: format!("failed to read local directory {}: {err}", local_dir.display()),
    };
    let mut entries = fs::read_dir(local_dir)
        .map_err(local_io_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(local_io_error)?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let local_path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let remote_path = remote_dir.join(&name);
        let file_type = entry.file_type().map_err(local_io_error)?;
        if file_type.is_dir() {
            upload_dir_recursive(client, &local_path, &remote_path, uploaded, progress)?;
        } else if file_type.is_file() {
            client.upload_file(&local_path, &remote_path)?;
            *uploaded += 1;
            progress(*uploaded);
        } else {
            tracing::warn!(path = %local_path.display(), "skipping non-regular file during upload");
        }
    }
    Ok(())
}
