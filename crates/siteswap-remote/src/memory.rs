use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use siteswap_core::{RemoteError, RemotePath, TreeEntry};

use crate::client::{RemoteOperation, RemoteTreeClient};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Directory,
    File(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    ChangeDirectory(RemotePath),
    ListDirectory(RemotePath),
    FileStatus(RemotePath),
    Rename { from: RemotePath, to: RemotePath },
    DeleteFile(RemotePath),
    RemoveDirectory(RemotePath),
    MakeDirectory(RemotePath),
    UploadFile { local: PathBuf, remote: RemotePath },
}

impl RemoteCall {
    pub fn operation(&self) -> RemoteOperation {
        match self {
            Self::ChangeDirectory(_) => RemoteOperation::ChangeDirectory,
            Self::ListDirectory(_) => RemoteOperation::List,
            Self::FileStatus(_) => RemoteOperation::FileStatus,
            Self::Rename { .. } => RemoteOperation::Rename,
            Self::DeleteFile(_) => RemoteOperation::DeleteFile,
            Self::RemoveDirectory(_) => RemoteOperation::RemoveDirectory,
            Self::MakeDirectory(_) => RemoteOperation::MakeDirectory,
            Self::UploadFile { .. } => RemoteOperation::Upload,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::ChangeDirectory(_) | Self::ListDirectory(_) | Self::FileStatus(_)
        )
    }

    fn target(&self) -> &RemotePath {
        match self {
            Self::ChangeDirectory(path)
            | Self::ListDirectory(path)
            | Self::FileStatus(path)
            | Self::DeleteFile(path)
            | Self::RemoveDirectory(path)
            | Self::MakeDirectory(path) => path,
            Self::Rename { from, .. } => from,
            Self::UploadFile { remote, .. } => remote,
        }
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    operation: RemoteOperation,
    path: RemotePath,
    error: RemoteError,
}

/// Remote tree held in memory with the same failure semantics as an FTP server:
/// renames never overwrite, directories must be empty before removal, and every call
/// is recorded in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    nodes: BTreeMap<String, Node>,
    calls: Vec<RemoteCall>,
    failures: Vec<InjectedFailure>,
    hide_dotfiles: bool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory(mut self, path: &str) -> Self {
        self.add_directory(path);
        self
    }

    pub fn with_file(mut self, path: &str, contents: &[u8]) -> Self {
        self.add_file(path, contents);
        self
    }

    /// Leaves names starting with `.` out of listings, like an FTP server without `-a`.
    pub fn with_hidden_dotfiles(mut self) -> Self {
        self.hide_dotfiles = true;
        self
    }

    pub fn add_directory(&mut self, path: &str) {
        self.ensure_ancestors(path);
        self.nodes.insert(path.to_string(), Node::Directory);
    }

    pub fn add_file(&mut self, path: &str, contents: &[u8]) {
        self.ensure_ancestors(path);
        self.nodes
            .insert(path.to_string(), Node::File(contents.to_vec()));
    }

    /// Makes every `operation` against `path` fail with `error` until cleared.
    pub fn fail_on(&mut self, operation: RemoteOperation, path: &str, error: RemoteError) {
        self.failures.push(InjectedFailure {
            operation,
            path: RemotePath::new(path),
            error,
        });
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    pub fn calls(&self) -> &[RemoteCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn mutation_count(&self) -> usize {
        self.calls.iter().filter(|call| call.is_mutation()).count()
    }

    pub fn exists(&self, path: &str) -> bool {
        path.is_empty() || self.nodes.contains_key(path)
    }

    pub fn is_directory(&self, path: &str) -> bool {
        path.is_empty() || matches!(self.nodes.get(path), Some(Node::Directory))
    }

    pub fn file_contents(&self, path: &str) -> Option<&[u8]> {
        match self.nodes.get(path) {
            Some(Node::File(contents)) => Some(contents),
            _ => None,
        }
    }

    /// Every descendant of `root`, relative to it, directories suffixed with `/`.
    pub fn tree(&self, root: &str) -> Vec<String> {
        let prefix = if root.is_empty() {
            String::new()
        } else {
            format!("{root}/")
        };
        self.nodes
            .iter()
            .filter_map(|(path, node)| {
                let relative = path.strip_prefix(&prefix)?;
                Some(match node {
                    Node::Directory => format!("{relative}/"),
                    Node::File(_) => relative.to_string(),
                })
            })
            .collect()
    }

    fn ensure_ancestors(&mut self, path: &str) {
        let mut current = RemotePath::new(path).parent();
        while let Some(parent) = current {
            if parent.is_login_root() {
                break;
            }
            self.nodes
                .entry(parent.as_str().to_string())
                .or_insert(Node::Directory);
            current = parent.parent();
        }
    }

    fn record(&mut self, call: RemoteCall) -> Result<(), RemoteError> {
        let operation = call.operation();
        let target = call.target().clone();
        self.calls.push(call);
        match self
            .failures
            .iter()
            .find(|failure| failure.operation == operation && failure.path == target)
        {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(()),
        }
    }

    fn has_children(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        self.nodes
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }

    fn require_parent(&self, path: &RemotePath) -> Result<(), RemoteError> {
        match path.parent() {
            Some(parent) if !self.is_directory(parent.as_str()) => {
                Err(RemoteError::NotFound { path: parent })
            }
            _ => Ok(()),
        }
    }
}

impl RemoteTreeClient for MemoryRemote {
    fn change_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.record(RemoteCall::ChangeDirectory(path.clone()))?;
        if self.is_directory(path.as_str()) {
            return Ok(());
        }
        Err(RemoteError::NotFound { path: path.clone() })
    }

    fn list_directory(&mut self, path: &RemotePath) -> Result<Vec<TreeEntry>, RemoteError> {
        self.record(RemoteCall::ListDirectory(path.clone()))?;
        if !self.exists(path.as_str()) {
            return Err(RemoteError::NotFound { path: path.clone() });
        }
        if !self.is_directory(path.as_str()) {
            return Err(RemoteError::Io {
                path: path.clone(),
                message: "not a directory".to_string(),
            });
        }

        let prefix = if path.is_login_root() {
            String::new()
        } else {
            format!("{}/", path.as_str())
        };
        Ok(self
            .nodes
            .iter()
            .filter_map(|(key, node)| {
                let name = key.strip_prefix(&prefix)?;
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                if self.hide_dotfiles && name.starts_with('.') {
                    return None;
                }
                Some(TreeEntry {
                    name: name.to_string(),
                    is_directory: matches!(node, Node::Directory),
                })
            })
            .collect())
    }

    fn file_exists(&mut self, path: &RemotePath) -> Result<bool, RemoteError> {
        self.record(RemoteCall::FileStatus(path.clone()))?;
        Ok(matches!(self.nodes.get(path.as_str()), Some(Node::File(_))))
    }

    fn rename_entry(&mut self, from: &RemotePath, to: &RemotePath) -> Result<(), RemoteError> {
        self.record(RemoteCall::Rename {
            from: from.clone(),
            to: to.clone(),
        })?;
        if from.is_login_root() || !self.nodes.contains_key(from.as_str()) {
            return Err(RemoteError::NotFound { path: from.clone() });
        }
        if self.exists(to.as_str()) {
            return Err(RemoteError::Collision { path: to.clone() });
        }
        self.require_parent(to)?;
        if to.starts_with(from) {
            return Err(RemoteError::Io {
                path: to.clone(),
                message: format!("cannot move {from} inside itself"),
            });
        }

        let moved = self
            .nodes
            .keys()
            .filter(|key| RemotePath::new(key.as_str()).starts_with(from))
            .cloned()
            .collect::<Vec<_>>();
        for key in moved {
            if let Some(node) = self.nodes.remove(&key) {
                let renamed = format!("{}{}", to.as_str(), &key[from.as_str().len()..]);
                self.nodes.insert(renamed, node);
            }
        }
        Ok(())
    }

    fn delete_file(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.record(RemoteCall::DeleteFile(path.clone()))?;
        match self.nodes.get(path.as_str()) {
            None => Err(RemoteError::NotFound { path: path.clone() }),
            Some(Node::Directory) => Err(RemoteError::Io {
                path: path.clone(),
                message: "not a regular file".to_string(),
            }),
            Some(Node::File(_)) => {
                self.nodes.remove(path.as_str());
                Ok(())
            }
        }
    }

    fn remove_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.record(RemoteCall::RemoveDirectory(path.clone()))?;
        match self.nodes.get(path.as_str()) {
            None => Err(RemoteError::NotFound { path: path.clone() }),
            Some(Node::File(_)) => Err(RemoteError::Io {
                path: path.clone(),
                message: "not a directory".to_string(),
            }),
            Some(Node::Directory) if self.has_children(path.as_str()) => {
                Err(RemoteError::NotEmpty { path: path.clone() })
            }
            Some(Node::Directory) => {
                self.nodes.remove(path.as_str());
                Ok(())
            }
        }
    }

    fn make_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.record(RemoteCall::MakeDirectory(path.clone()))?;
        if self.exists(path.as_str()) {
            return Err(RemoteError::AlreadyExists { path: path.clone() });
        }
        self.require_parent(path)?;
        self.nodes.insert(path.as_str().to_string(), Node::Directory);
        Ok(())
    }

    fn upload_file(&mut self, local: &Path, remote: &RemotePath) -> Result<(), RemoteError> {
        self.record(RemoteCall::UploadFile {
            local: local.to_path_buf(),
            remote: remote.clone(),
        })?;
        self.require_parent(remote)?;
        if self.is_directory(remote.as_str()) {
            return Err(RemoteError::Io {
                path: remote.clone(),
                message: "a directory occupies the upload target".to_string(),
            });
        }
        let contents = fs::read(local).map_err(|err| RemoteError::Io {
            path: remote.clone(),
            message: format!("failed to read {}: {err}", local.display()),
        })?;
        self.nodes
            .insert(remote.as_str().to_string(), Node::File(contents));
        Ok(())
    }
}
