use std::io;
use std::path::Path;
use std::process::{Command, Output};

use siteswap_core::{RemoteError, RemotePath, TreeEntry};

use crate::client::{ConnectionSettings, RemoteOperation, RemoteTreeClient};
use crate::listing::parse_listing;

pub type CommandRunner = Box<dyn FnMut(&mut Command) -> io::Result<Output> + Send>;

/// FTP client that drives one `curl` invocation per primitive. Paths are relative to
/// the login directory; no session state is kept between calls.
pub struct CurlFtpClient {
    settings: ConnectionSettings,
    runner: CommandRunner,
}

impl CurlFtpClient {
    pub fn connect(settings: ConnectionSettings) -> Result<Self, RemoteError> {
        Self::connect_with_runner(settings, Box::new(|command: &mut Command| command.output()))
    }

    pub fn connect_with_runner(
        settings: ConnectionSettings,
        runner: CommandRunner,
    ) -> Result<Self, RemoteError> {
        let mut client = Self { settings, runner };
        let entries = client.list_directory(&RemotePath::login_root())?;
        tracing::info!(
            host = %client.settings.host,
            port = client.settings.port,
            entries = entries.len(),
            "connected to ftp server"
        );
        Ok(client)
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn run(
        &mut self,
        mut command: Command,
        operation: RemoteOperation,
        path: &RemotePath,
    ) -> Result<Output, RemoteError> {
        tracing::debug!(op = operation.as_str(), path = %path, "ftp primitive");
        let output = (self.runner)(&mut command).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                return RemoteError::Connect {
                    host: self.settings.host.clone(),
                    message: "required transfer tool 'curl' was not found on PATH".to_string(),
                };
            }
            RemoteError::Io {
                path: path.clone(),
                message: format!("failed launching curl: {err}"),
            }
        })?;
        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_curl_failure(
            operation,
            path,
            &self.settings.host,
            output.status.code(),
            stderr.trim(),
        ))
    }

    fn quote(
        &mut self,
        operation: RemoteOperation,
        path: &RemotePath,
        commands: &[String],
    ) -> Result<(), RemoteError> {
        let command = build_quote_command(&self.settings, commands);
        self.run(command, operation, path).map(|_| ())
    }
}

impl RemoteTreeClient for CurlFtpClient {
    fn change_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        let command = build_list_command(&self.settings, path);
        self.run(command, RemoteOperation::ChangeDirectory, path)
            .map(|_| ())
    }

    fn list_directory(&mut self, path: &RemotePath) -> Result<Vec<TreeEntry>, RemoteError> {
        let command = build_list_command(&self.settings, path);
        let output = self.run(command, RemoteOperation::List, path)?;
        Ok(parse_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn file_exists(&mut self, path: &RemotePath) -> Result<bool, RemoteError> {
        match self.quote(
            RemoteOperation::FileStatus,
            path,
            &[format!("MDTM {}", path.as_str())],
        ) {
            Ok(()) => Ok(true),
            Err(RemoteError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn rename_entry(&mut self, from: &RemotePath, to: &RemotePath) -> Result<(), RemoteError> {
        let commands = [format!("RNFR {}", from.as_str()), format!("RNTO {}", to.as_str())];
        self.quote(RemoteOperation::Rename, from, &commands)
            .map_err(|err| match err {
                RemoteError::Collision { .. } => RemoteError::Collision { path: to.clone() },
                other => other,
            })
    }

    fn delete_file(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.quote(
            RemoteOperation::DeleteFile,
            path,
            &[format!("DELE {}", path.as_str())],
        )
    }

    fn remove_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.quote(
            RemoteOperation::RemoveDirectory,
            path,
            &[format!("RMD {}", path.as_str())],
        )
    }

    fn make_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.quote(
            RemoteOperation::MakeDirectory,
            path,
            &[format!("MKD {}", path.as_str())],
        )
    }

    fn upload_file(&mut self, local: &Path, remote: &RemotePath) -> Result<(), RemoteError> {
        let command = build_upload_command(&self.settings, local, remote);
        self.run(command, RemoteOperation::Upload, remote).map(|_| ())
    }
}

fn base_curl_command(settings: &ConnectionSettings) -> Command {
    let mut command = Command::new("curl");
    command
        .arg("--silent")
        .arg("--show-error")
        .arg("--disable-epsv")
        .arg("--connect-timeout")
        .arg(settings.connect_timeout.as_secs().max(1).to_string())
        .arg("--user")
        .arg(format!("{}:{}", settings.username, settings.password));
    command
}

/// Lists with `LIST -a` so dotfiles are visible on servers that hide them by default.
pub(crate) fn build_list_command(settings: &ConnectionSettings, path: &RemotePath) -> Command {
    let mut command = base_curl_command(settings);
    command
        .arg("--request")
        .arg("LIST -a")
        .arg(ftp_url(settings, path, true));
    command
}

pub(crate) fn build_quote_command(settings: &ConnectionSettings, commands: &[String]) -> Command {
    let mut command = base_curl_command(settings);
    command.arg("--list-only");
    for quoted in commands {
        command.arg("--quote").arg(quoted);
    }
    command.arg(ftp_url(settings, &RemotePath::login_root(), true));
    command
}

pub(crate) fn build_upload_command(
    settings: &ConnectionSettings,
    local: &Path,
    remote: &RemotePath,
) -> Command {
    let mut command = base_curl_command(settings);
    command
        .arg("--upload-file")
        .arg(local)
        .arg(ftp_url(settings, remote, false));
    command
}

pub(crate) fn ftp_url(settings: &ConnectionSettings, path: &RemotePath, directory: bool) -> String {
    let mut url = format!("ftp://{}:{}/", settings.host, settings.port);
    url.push_str(
        &path
            .as_str()
            .split('/')
            .map(percent_encode_segment)
            .collect::<Vec<_>>()
            .join("/"),
    );
    if directory && !path.is_login_root() {
        url.push('/');
    }
    url
}

fn percent_encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// Maps a curl exit code plus the FTP reply code found in its stderr onto the
/// remote error taxonomy.
pub(crate) fn classify_curl_failure(
    operation: RemoteOperation,
    path: &RemotePath,
    host: &str,
    exit_code: Option<i32>,
    stderr: &str,
) -> RemoteError {
    let io = |message: String| RemoteError::Io {
        path: path.clone(),
        message,
    };
    let Some(code) = exit_code else {
        return io("curl terminated by signal".to_string());
    };

    match code {
        6 | 7 | 28 | 55 | 56 => RemoteError::Connect {
            host: host.to_string(),
            message: format!("curl exit {code}: {stderr}"),
        },
        67 => RemoteError::Auth {
            host: host.to_string(),
            message: stderr.to_string(),
        },
        9 | 78 => RemoteError::NotFound { path: path.clone() },
        21 => {
            let reply = ftp_reply_code(stderr);
            match (operation, reply) {
                (RemoteOperation::Rename, Some(553)) => RemoteError::Collision { path: path.clone() },
                (
                    RemoteOperation::Rename
                    | RemoteOperation::DeleteFile
                    | RemoteOperation::FileStatus,
                    Some(550),
                ) => {
                    RemoteError::NotFound { path: path.clone() }
                }
                (RemoteOperation::RemoveDirectory, Some(550)) => {
                    if stderr.to_ascii_lowercase().contains("not empty") {
                        RemoteError::NotEmpty { path: path.clone() }
                    } else {
                        RemoteError::NotFound { path: path.clone() }
                    }
                }
                // 550 also covers a missing parent; callers that care confirm with a
                // directory change.
                (RemoteOperation::MakeDirectory, Some(521 | 550 | 553)) => {
                    RemoteError::AlreadyExists { path: path.clone() }
                }
                _ => io(format!("{} rejected: {stderr}", operation.as_str())),
            }
        }
        25 => io(format!("upload failed: {stderr}")),
        other => io(format!("curl exit {other}: {stderr}")),
    }
}

pub(crate) fn ftp_reply_code(stderr: &str) -> Option<u16> {
    stderr.match_indices("with ").find_map(|(index, marker)| {
        let digits = stderr.get(index + marker.len()..index + marker.len() + 3)?;
        if digits.chars().all(|ch| ch.is_ascii_digit()) {
            digits.parse().ok()
        } else {
            None
        }
    })
}
