use crate::RemotePath;

/// Failure reported by a remote-store primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("remote path not found: {path}")]
    NotFound { path: RemotePath },

    #[error("remote path already occupied: {path}")]
    Collision { path: RemotePath },

    #[error("remote directory is not empty: {path}")]
    NotEmpty { path: RemotePath },

    #[error("remote directory already exists: {path}")]
    AlreadyExists { path: RemotePath },

    #[error("remote operation on {path} failed: {message}")]
    Io { path: RemotePath, message: String },

    #[error("server {host} rejected the credentials: {message}")]
    Auth { host: String, message: String },

    #[error("connection to {host} failed: {message}")]
    Connect { host: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    NotFound,
    Collision,
    NotEmpty,
    AlreadyExists,
    Io,
    Auth,
    Connect,
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            Self::NotFound { .. } => RemoteErrorKind::NotFound,
            Self::Collision { .. } => RemoteErrorKind::Collision,
            Self::NotEmpty { .. } => RemoteErrorKind::NotEmpty,
            Self::AlreadyExists { .. } => RemoteErrorKind::AlreadyExists,
            Self::Io { .. } => RemoteErrorKind::Io,
            Self::Auth { .. } => RemoteErrorKind::Auth,
            Self::Connect { .. } => RemoteErrorKind::Connect,
        }
    }

    /// Lost connection or rejected login; never tolerated by any step.
    pub fn is_fatal_transport(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Connect { .. })
    }

    pub fn is_not_found_at(&self, expected: &RemotePath) -> bool {
        matches!(self, Self::NotFound { path } if path == expected)
    }

    pub fn path(&self) -> Option<&RemotePath> {
        match self {
            Self::NotFound { path }
            | Self::Collision { path }
            | Self::NotEmpty { path }
            | Self::AlreadyExists { path }
            | Self::Io { path, .. } => Some(path),
            Self::Auth { .. } | Self::Connect { .. } => None,
        }
    }
}
