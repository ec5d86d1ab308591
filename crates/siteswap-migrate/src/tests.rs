use std::cell::{Ref, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use anyhow::anyhow;
use chrono::NaiveDate;
use siteswap_core::{
    ArchiveType, MaintenanceSettings, PreservedFileSet, RemoteError, RemotePath, StepOutcome,
    SwapConfig, TreeEntry,
};
use siteswap_remote::{MemoryRemote, RemoteCall, RemoteOperation, RemoteTreeClient};

use super::*;
use crate::staging::build_extract_commands;

const OLD_TREE: &str = "backup/drupal-old-2026-10-16";

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
}

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("file has parent")).expect("must create parent");
    fs::write(path, contents).expect("must write file");
}

fn live_site() -> MemoryRemote {
    MemoryRemote::new()
        .with_file("www/site/index.php", b"old index")
        .with_file("www/site/.htaccess", b"custom rules")
        .with_file("www/site/robots.txt", b"custom robots")
        .with_file("www/site/sites/default/settings.php", b"db credentials")
        .with_directory("www/site/sites/all/modules")
}

fn io_error(path: &str) -> RemoteError {
    RemoteError::Io {
        path: RemotePath::new(path),
        message: "550 permission denied".to_string(),
    }
}

fn connection_lost() -> RemoteError {
    RemoteError::Connect {
        host: "ftp.example.test".to_string(),
        message: "connection reset".to_string(),
    }
}

fn count_calls(remote: &MemoryRemote, operation: RemoteOperation) -> usize {
    remote
        .calls()
        .iter()
        .filter(|call| call.operation() == operation)
        .count()
}

fn always(answer: bool) -> impl FnMut(DecisionPoint) -> bool {
    move |_| answer
}

#[derive(Default)]
struct RecordingReporter {
    events: Vec<String>,
}

impl StepReporter for RecordingReporter {
    fn step_started(&mut self, number: usize, title: &str) {
        self.events.push(format!("start {number} {title}"));
    }

    fn step_detail(&mut self, message: &str) {
        self.events.push(format!("detail {message}"));
    }

    fn step_finished(&mut self, number: usize, outcome: &StepOutcome) {
        self.events.push(format!("finish {number} {outcome}"));
    }
}

/// Lets a test look at the remote between stepwise workflow calls.
#[derive(Clone, Default)]
struct SharedRemote(Rc<RefCell<MemoryRemote>>);

impl SharedRemote {
    fn new(remote: MemoryRemote) -> Self {
        Self(Rc::new(RefCell::new(remote)))
    }

    fn get(&self) -> Ref<'_, MemoryRemote> {
        self.0.borrow()
    }
}

impl RemoteTreeClient for SharedRemote {
    fn change_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.0.borrow_mut().change_directory(path)
    }

    fn list_directory(&mut self, path: &RemotePath) -> Result<Vec<TreeEntry>, RemoteError> {
        self.0.borrow_mut().list_directory(path)
    }

    fn file_exists(&mut self, path: &RemotePath) -> Result<bool, RemoteError> {
        self.0.borrow_mut().file_exists(path)
    }

    fn rename_entry(&mut self, from: &RemotePath, to: &RemotePath) -> Result<(), RemoteError> {
        self.0.borrow_mut().rename_entry(from, to)
    }

    fn delete_file(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.0.borrow_mut().delete_file(path)
    }

    fn remove_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.0.borrow_mut().remove_directory(path)
    }

    fn make_directory(&mut self, path: &RemotePath) -> Result<(), RemoteError> {
        self.0.borrow_mut().make_directory(path)
    }

    fn upload_file(&mut self, local: &Path, remote: &RemotePath) -> Result<(), RemoteError> {
        self.0.borrow_mut().upload_file(local, remote)
    }
}

struct Fixture {
    area: StagingArea,
    config: SwapConfig,
}

impl Fixture {
    /// Stages `files` (paths relative to the unpacked archive) for site root `www/site`.
    fn new(files: &[(&str, &str)]) -> Self {
        let area = StagingArea::create().expect("must create staging area");
        fs::create_dir_all(area.upgrade_dir()).expect("must create upgrade dir");
        for (relative, contents) in files {
            write_file(&area.upgrade_dir().join(relative), contents);
        }
        let config = SwapConfig::new("www/site").expect("valid config");
        Self { area, config }
    }

    fn newsite() -> Self {
        Self::new(&[
            ("newsite/index.php", "new index"),
            ("newsite/.htaccess", "new rules"),
            ("newsite/robots.txt", "new robots"),
            ("newsite/sites/default/default.settings.php", "template"),
        ])
    }

    fn context(&self) -> UpgradeContext {
        let maintenance = self
            .area
            .write_maintenance_files(&self.config.maintenance)
            .expect("must write maintenance files");
        UpgradeContext::new(&self.config, self.area.upgrade_dir(), maintenance, run_date())
    }

    fn run(
        &self,
        client: &mut dyn RemoteTreeClient,
        decisions: &mut dyn DecisionProvider,
    ) -> (Result<SwapReport, WorkflowError>, RecordingReporter) {
        let mut reporter = RecordingReporter::default();
        let result = SiteSwapWorkflow::new(
            self.config.clone(),
            self.context(),
            client,
            decisions,
            &mut reporter,
        )
        .run();
        (result, reporter)
    }
}

#[test]
fn delete_tree_on_empty_directory_removes_only_itself() {
    let mut remote = MemoryRemote::new().with_directory("tmp/empty");

    let stats = delete_tree(&mut remote, &RemotePath::new("tmp/empty")).expect("must delete");

    assert_eq!(stats.files_deleted, 0);
    assert_eq!(stats.directories_removed, 1);
    assert_eq!(count_calls(&remote, RemoteOperation::RemoveDirectory), 1);
    assert_eq!(count_calls(&remote, RemoteOperation::DeleteFile), 0);
    assert!(!remote.exists("tmp/empty"));
    assert!(remote.exists("tmp"));
}

#[test]
fn delete_tree_removes_every_descendant_exactly_once() {
    let mut remote = MemoryRemote::new()
        .with_file("old/a.txt", b"a")
        .with_file("old/b/c.txt", b"c")
        .with_file("old/b/d/e.txt", b"e")
        .with_directory("old/b/empty")
        .with_file("keep/f.txt", b"f");

    let stats = delete_tree(&mut remote, &RemotePath::new("old")).expect("must delete");

    assert_eq!(stats.files_deleted, 3);
    assert_eq!(stats.directories_removed, 4);
    assert!(remote.tree("old").is_empty());
    assert!(!remote.exists("old"));
    assert_eq!(remote.tree("keep"), vec!["f.txt"]);

    let mut touched = remote
        .calls()
        .iter()
        .filter(|call| call.is_mutation())
        .map(|call| format!("{call:?}"))
        .collect::<Vec<_>>();
    let total = touched.len();
    touched.sort();
    touched.dedup();
    assert_eq!(touched.len(), total, "no entry may be removed twice");
}

#[test]
fn delete_tree_empties_subdirectories_before_removing_them() {
    let mut remote = MemoryRemote::new().with_directory("old/x/y/z");

    delete_tree(&mut remote, &RemotePath::new("old")).expect("must delete");

    let removals = remote
        .calls()
        .iter()
        .filter_map(|call| match call {
            RemoteCall::RemoveDirectory(path) => Some(path.as_str().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(removals, vec!["old/x/y/z", "old/x/y", "old/x", "old"]);
}

#[test]
fn delete_tree_stops_at_first_failure() {
    let mut remote = MemoryRemote::new()
        .with_file("old/a.txt", b"a")
        .with_file("old/b.txt", b"b")
        .with_file("old/sub/c.txt", b"c");
    remote.fail_on(RemoteOperation::DeleteFile, "old/b.txt", io_error("old/b.txt"));

    let err = delete_tree(&mut remote, &RemotePath::new("old")).expect_err("must fail");

    assert_eq!(err, io_error("old/b.txt"));
    assert!(!remote.exists("old/a.txt"));
    assert!(remote.exists("old/b.txt"));
    assert!(remote.exists("old/sub/c.txt"));
    assert_eq!(count_calls(&remote, RemoteOperation::RemoveDirectory), 0);
}

#[test]
fn ensure_backup_location_reports_existing_on_second_call() {
    let mut remote = MemoryRemote::new();
    let backup = RemotePath::new("backup");

    let first = ensure_backup_location(&mut remote, &backup).expect("first call");
    let second = ensure_backup_location(&mut remote, &backup).expect("second call");

    assert_eq!(first, BackupLocation::Created);
    assert_eq!(second, BackupLocation::Existing);
    assert!(remote.is_directory("backup"));
}

#[test]
fn preserve_files_attempts_every_file_when_one_destination_collides() {
    let mut remote = live_site()
        .with_file("www/site/settings.local.php", b"local")
        .with_file("backup/robots.txt/occupied", b"x");
    let files = PreservedFileSet::new([".htaccess", "robots.txt", "settings.local.php"])
        .expect("valid set");

    let report = preserve_files(
        &mut remote,
        &RemotePath::new("www/site"),
        &RemotePath::new("backup"),
        &files,
    )
    .expect("per-file failures are not fatal");

    assert_eq!(report.relocations.len(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.relocations[1].name, "robots.txt");
    assert!(report.relocations[1].outcome.is_failed());
    assert_eq!(remote.file_contents("backup/.htaccess"), Some(&b"custom rules"[..]));
    assert_eq!(
        remote.file_contents("backup/settings.local.php"),
        Some(&b"local"[..])
    );
    assert!(remote.exists("www/site/robots.txt"));
}

#[test]
fn preserve_files_replaces_an_earlier_copy() {
    let mut remote = live_site().with_file("backup/.htaccess", b"stale");

    let report = preserve_files(
        &mut remote,
        &RemotePath::new("www/site"),
        &RemotePath::new("backup"),
        &PreservedFileSet::default(),
    )
    .expect("must preserve");

    assert!(report.is_clean());
    assert_eq!(remote.file_contents("backup/.htaccess"), Some(&b"custom rules"[..]));
    assert!(!remote.exists("www/site/.htaccess"));
}

#[test]
fn preserve_files_skips_files_missing_from_the_source() {
    let mut remote = MemoryRemote::new()
        .with_file("www/site/.htaccess", b"custom rules")
        .with_file("backup/robots.txt", b"saved earlier");

    let report = preserve_files(
        &mut remote,
        &RemotePath::new("www/site"),
        &RemotePath::new("backup"),
        &PreservedFileSet::default(),
    )
    .expect("must preserve");

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(
        remote.file_contents("backup/robots.txt"),
        Some(&b"saved earlier"[..])
    );
}

#[test]
fn preserve_files_aborts_on_transport_failure() {
    let mut remote = live_site().with_directory("backup");
    remote.fail_on(RemoteOperation::Rename, "www/site/.htaccess", connection_lost());

    let err = preserve_files(
        &mut remote,
        &RemotePath::new("www/site"),
        &RemotePath::new("backup"),
        &PreservedFileSet::default(),
    )
    .expect_err("transport failure must abort");

    assert!(err.is_fatal_transport());
    assert!(remote.exists("www/site/robots.txt"));
}

#[test]
fn backup_pass_twice_leaves_the_same_backup_contents() {
    let mut remote = live_site();
    let site_root = RemotePath::new("www/site");
    let backup = RemotePath::new("backup");
    let files = PreservedFileSet::default();

    assert_eq!(
        ensure_backup_location(&mut remote, &backup).expect("create"),
        BackupLocation::Created
    );
    preserve_files(&mut remote, &site_root, &backup, &files).expect("first pass");
    let after_first = remote.clone();

    assert_eq!(
        ensure_backup_location(&mut remote, &backup).expect("reuse"),
        BackupLocation::Existing
    );
    let second = preserve_files(&mut remote, &site_root, &backup, &files).expect("second pass");

    assert_eq!(second.skipped(), 2);
    assert_eq!(remote.tree("backup"), after_first.tree("backup"));
    for name in files.iter() {
        let path = format!("backup/{name}");
        assert_eq!(remote.file_contents(&path), after_first.file_contents(&path));
    }
}

#[test]
fn restore_files_moves_backups_over_the_upgrade_copies() {
    let mut remote = MemoryRemote::new()
        .with_file("backup/.htaccess", b"custom rules")
        .with_file("newsite/.htaccess", b"new rules")
        .with_file("newsite/robots.txt", b"new robots");

    let report = restore_files(
        &mut remote,
        &RemotePath::new("backup"),
        &RemotePath::new("newsite"),
        &PreservedFileSet::default(),
    )
    .expect("must restore");

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(remote.file_contents("newsite/.htaccess"), Some(&b"custom rules"[..]));
    assert_eq!(remote.file_contents("newsite/robots.txt"), Some(&b"new robots"[..]));
    assert!(!remote.exists("backup/.htaccess"));
}

#[test]
fn preserve_files_moves_dotfiles_left_out_of_listings() {
    let mut remote = live_site().with_hidden_dotfiles().with_directory("backup");

    let report = preserve_files(
        &mut remote,
        &RemotePath::new("www/site"),
        &RemotePath::new("backup"),
        &PreservedFileSet::default(),
    )
    .expect("must preserve");

    assert_eq!(report.succeeded(), 2);
    assert_eq!(remote.file_contents("backup/.htaccess"), Some(&b"custom rules"[..]));
    assert!(!remote.exists("www/site/.htaccess"));
}

#[cfg(unix)]
#[test]
fn preserve_files_over_ftp_moves_dotfiles_a_plain_listing_hides() {
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};
    use std::sync::{Arc, Mutex};

    use siteswap_remote::{CommandRunner, ConnectionSettings, CurlFtpClient};

    let on_server = ["www/site/.htaccess", "www/site/robots.txt"];
    let sent = Arc::new(Mutex::new(Vec::new()));
    let sent_by_runner = Arc::clone(&sent);
    let runner: CommandRunner = Box::new(move |command: &mut Command| {
        let args = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        let quotes = args
            .windows(2)
            .filter(|pair| pair[0] == "--quote")
            .map(|pair| pair[1].clone())
            .collect::<Vec<_>>();
        let reply = |code: i32, stdout: &[u8], stderr: &[u8]| Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.to_vec(),
            stderr: stderr.to_vec(),
        };
        let not_found = reply(21, b"", b"curl: (21) QUOT command failed with 550");

        if quotes.is_empty() {
            let request = args
                .windows(2)
                .find(|pair| pair[0] == "--request")
                .map(|pair| pair[1].clone())
                .unwrap_or_else(|| "LIST".to_string());
            sent_by_runner.lock().expect("lock").push(request);
            // Dotfiles are missing, as with a default vsftpd configuration.
            return Ok(reply(
                0,
                b"-rw-r--r-- 1 u g 13 Oct 16 10:15 robots.txt\r\n-rw-r--r-- 1 u g 9 Oct 16 10:15 index.php\r\n",
                b"",
            ));
        }
        sent_by_runner.lock().expect("lock").extend(quotes.iter().cloned());
        let first = quotes[0].as_str();
        if let Some(path) = first.strip_prefix("MDTM ") {
            return Ok(if on_server.iter().any(|known| *known == path) {
                reply(0, b"", b"")
            } else {
                not_found
            });
        }
        if first.starts_with("DELE ") {
            return Ok(not_found);
        }
        Ok(reply(0, b"", b""))
    });

    let mut client = CurlFtpClient::connect_with_runner(
        ConnectionSettings::new("ftp.example.test", "deploy", "s3cret"),
        runner,
    )
    .expect("must connect");
    let report = preserve_files(
        &mut client,
        &RemotePath::new("www/site"),
        &RemotePath::new("backup"),
        &PreservedFileSet::default(),
    )
    .expect("must preserve");

    assert_eq!(report.relocations[0].name, ".htaccess");
    assert_eq!(report.relocations[0].outcome, StepOutcome::Success);
    assert_eq!(report.succeeded(), 2);
    let sent = sent.lock().expect("lock");
    assert!(sent.contains(&"RNFR www/site/.htaccess".to_string()));
    assert!(sent.contains(&"RNTO backup/.htaccess".to_string()));
    let listings = sent
        .iter()
        .filter(|command| command.starts_with("LIST"))
        .collect::<Vec<_>>();
    assert!(!listings.is_empty());
    assert!(listings.iter().all(|command| *command == "LIST -a"));
}

#[test]
fn ensure_backup_location_reports_missing_directory_behind_a_refusal() {
    let mut remote = MemoryRemote::new();
    remote.fail_on(
        RemoteOperation::MakeDirectory,
        "backups/site1",
        RemoteError::AlreadyExists {
            path: RemotePath::new("backups/site1"),
        },
    );

    let err = ensure_backup_location(&mut remote, &RemotePath::new("backups/site1"))
        .expect_err("refusal without a directory must not count as existing");

    assert!(err.is_not_found_at(&RemotePath::new("backups/site1")));
}

#[test]
fn missing_backup_parent_stops_before_any_file_moves() {
    let mut fixture = Fixture::newsite();
    fixture.config = fixture
        .config
        .clone()
        .with_backup_dir("backups/site1")
        .expect("valid backup dir");
    let mut remote = live_site();
    // Servers that answer MKD with 550 for a missing parent look like a collision.
    remote.fail_on(
        RemoteOperation::MakeDirectory,
        "backups/site1",
        RemoteError::AlreadyExists {
            path: RemotePath::new("backups/site1"),
        },
    );
    let mut asked = Vec::new();
    let mut decide = |point: DecisionPoint| {
        asked.push(point);
        true
    };

    let (result, _) = fixture.run(&mut remote, &mut decide);
    let err = result.expect_err("must stop");

    assert!(matches!(
        err,
        WorkflowError::Precondition {
            step: WorkflowStep::EnsureBackupLocation,
            ..
        }
    ));
    assert!(err.to_string().contains("backups/site1"));
    assert!(err.left_remote_untouched());
    assert!(asked.is_empty());
    assert_eq!(count_calls(&remote, RemoteOperation::Rename), 0);
    assert_eq!(count_calls(&remote, RemoteOperation::Upload), 0);
    assert_eq!(remote.file_contents("www/site/.htaccess"), Some(&b"custom rules"[..]));

    let mut remote = live_site();
    let (result, _) = fixture.run(&mut remote, &mut always(true));
    assert!(matches!(
        result.expect_err("missing parent must stop"),
        WorkflowError::Precondition {
            step: WorkflowStep::EnsureBackupLocation,
            ..
        }
    ));
    assert!(!remote.exists("backups"));
}

#[test]
fn restore_leaves_backup_copies_from_earlier_runs_alone() {
    let fixture = Fixture::newsite();
    let mut remote = MemoryRemote::new()
        .with_file("www/site/index.php", b"old index")
        .with_file("www/site/.htaccess", b"custom rules")
        .with_file("www/site/sites/default/settings.php", b"db credentials")
        .with_file("backup/robots.txt", b"stale robots");

    let (result, _) = fixture.run(&mut remote, &mut always(true));
    let report = result.expect("run must succeed");

    assert_eq!(remote.file_contents("www/site/.htaccess"), Some(&b"custom rules"[..]));
    assert_eq!(remote.file_contents("www/site/robots.txt"), Some(&b"new robots"[..]));
    assert_eq!(remote.file_contents("backup/robots.txt"), Some(&b"stale robots"[..]));
    let restored = report.restored.expect("restore accepted");
    assert_eq!(restored.relocations.len(), 1);
    assert_eq!(restored.relocations[0].name, ".htaccess");
}

#[test]
fn full_run_swaps_in_the_upgrade_and_keeps_the_old_tree() {
    let fixture = Fixture::newsite();
    let mut remote = live_site();
    let mut decide = |point: DecisionPoint| point != DecisionPoint::RestorePreservedFiles;

    let (result, reporter) = fixture.run(&mut remote, &mut decide);
    let report = result.expect("run must succeed");

    assert_eq!(remote.file_contents("www/site/index.php"), Some(&b"new index"[..]));
    assert_eq!(remote.file_contents("www/site/.htaccess"), Some(&b"new rules"[..]));
    assert_eq!(
        remote.file_contents("www/site/sites/default/settings.php"),
        Some(&b"db credentials"[..])
    );
    assert!(remote.is_directory("www/site/sites/all/modules"));
    assert!(!remote.exists("www/site/sites/default/default.settings.php"));
    assert!(!remote.exists("newsite"));

    assert_eq!(
        remote.file_contents(&format!("{OLD_TREE}/index.php")),
        Some(&b"old index"[..])
    );
    assert!(remote.exists(&format!("{OLD_TREE}/maintenance.php")));
    assert!(!remote.exists(&format!("{OLD_TREE}/sites")));
    assert_eq!(remote.file_contents("backup/.htaccess"), Some(&b"custom rules"[..]));
    assert_eq!(remote.file_contents("backup/robots.txt"), Some(&b"custom robots"[..]));

    assert_eq!(report.old_tree_backup, RemotePath::new(OLD_TREE));
    assert_eq!(report.remote_staging_root, RemotePath::new("newsite"));
    assert_eq!(report.uploaded_files, 4);
    assert!(report.restored.is_none());
    assert!(!report.reused_backup_location);
    assert_eq!(report.preserved.succeeded(), 2);
    assert_eq!(report.steps.len(), WorkflowStep::ALL.len());
    assert_eq!(
        report
            .steps
            .iter()
            .map(|(step, _)| *step)
            .collect::<Vec<_>>(),
        WorkflowStep::ALL.to_vec()
    );
    assert_eq!(
        report.outcome_of(WorkflowStep::OptionalRestorePreservedFiles),
        Some(&StepOutcome::Skipped)
    );
    assert_eq!(reporter.events.first().map(String::as_str), Some("start 1 resolve upgrade root"));
    assert_eq!(
        reporter.events.last().map(String::as_str),
        Some("finish 12 success")
    );
}

#[test]
fn accepted_restore_puts_customized_files_into_the_new_site() {
    let fixture = Fixture::newsite();
    let mut remote = live_site();

    let (result, _) = fixture.run(&mut remote, &mut always(true));
    let report = result.expect("run must succeed");

    assert_eq!(remote.file_contents("www/site/.htaccess"), Some(&b"custom rules"[..]));
    assert_eq!(remote.file_contents("www/site/robots.txt"), Some(&b"custom robots"[..]));
    assert!(!remote.exists("backup/.htaccess"));
    assert_eq!(report.restored.map(|restored| restored.succeeded()), Some(2));
}

#[test]
fn two_top_level_directories_fail_before_any_remote_call() {
    let fixture = Fixture::new(&[("newsite/index.php", "new"), ("extra/readme.txt", "x")]);
    let mut remote = live_site();

    let (result, _) = fixture.run(&mut remote, &mut always(true));
    let err = result.expect_err("must fail");

    assert!(matches!(
        err,
        WorkflowError::Precondition {
            step: WorkflowStep::ResolveStagingRoot,
            ..
        }
    ));
    assert!(err.to_string().contains("extra, newsite"));
    assert!(err.left_remote_untouched());
    assert_eq!(remote.mutation_count(), 0);
    assert!(remote.calls().is_empty());
}

#[test]
fn staged_tree_without_directories_is_a_precondition_failure() {
    let fixture = Fixture::new(&[("readme.txt", "loose file")]);
    let mut remote = live_site();

    let (result, _) = fixture.run(&mut remote, &mut always(true));

    assert_eq!(
        result.expect_err("must fail").class(),
        ErrorClass::Precondition
    );
    assert!(remote.calls().is_empty());
}

#[test]
fn resolve_staging_root_name_ignores_top_level_files() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    write_file(&dir.path().join("README.txt"), "notes");
    write_file(&dir.path().join("drupal-7.99/index.php"), "php");

    assert_eq!(
        resolve_staging_root_name(dir.path()).expect("must resolve"),
        "drupal-7.99"
    );
}

#[test]
fn missing_site_root_stops_before_mutation() {
    let fixture = Fixture::newsite();
    let mut remote = MemoryRemote::new().with_directory("www");

    let (result, _) = fixture.run(&mut remote, &mut always(true));
    let err = result.expect_err("must fail");

    assert_eq!(err.step(), WorkflowStep::VerifySiteRoot);
    assert_eq!(err.class(), ErrorClass::Precondition);
    assert_eq!(remote.mutation_count(), 0);
}

#[test]
fn missing_sites_directory_stops_before_mutation() {
    let fixture = Fixture::newsite();
    let mut remote = MemoryRemote::new().with_file("www/site/index.php", b"old");

    let (result, _) = fixture.run(&mut remote, &mut always(true));
    let err = result.expect_err("must fail");

    assert_eq!(err.step(), WorkflowStep::VerifySitesDirectory);
    assert_eq!(remote.mutation_count(), 0);
}

#[test]
fn existing_remote_staging_root_is_rejected() {
    let fixture = Fixture::newsite();
    let mut remote = live_site().with_file("newsite/leftover.php", b"x");

    let (result, _) = fixture.run(&mut remote, &mut always(true));
    let err = result.expect_err("must fail");

    assert_eq!(err.step(), WorkflowStep::VerifySitesDirectory);
    assert!(err.to_string().contains("newsite already exists"));
    assert_eq!(remote.mutation_count(), 0);
}

#[test]
fn declining_backup_reuse_exits_without_touching_files() {
    let fixture = Fixture::newsite();
    let mut remote = live_site().with_file("backup/.htaccess", b"from last time");
    let mut asked = Vec::new();
    let mut decide = |point: DecisionPoint| {
        asked.push(point);
        false
    };

    let (result, reporter) = fixture.run(&mut remote, &mut decide);
    let err = result.expect_err("must stop");

    assert!(matches!(
        err,
        WorkflowError::Declined {
            step: WorkflowStep::EnsureBackupLocation
        }
    ));
    assert_eq!(err.class(), ErrorClass::Collision);
    assert!(err.left_remote_untouched());
    assert_eq!(asked, vec![DecisionPoint::ReuseBackupLocation]);
    assert_eq!(count_calls(&remote, RemoteOperation::Rename), 0);
    assert_eq!(count_calls(&remote, RemoteOperation::DeleteFile), 0);
    assert_eq!(
        remote.file_contents("backup/.htaccess"),
        Some(&b"from last time"[..])
    );
    assert!(reporter.events.contains(&"finish 4 skipped".to_string()));
}

#[test]
fn reused_backup_replaces_a_same_day_old_tree() {
    let fixture = Fixture::newsite();
    let mut remote = live_site().with_file(&format!("{OLD_TREE}/index.php"), b"first run");

    let (result, _) = fixture.run(&mut remote, &mut always(false));
    assert_eq!(
        result.expect_err("decline must stop").step(),
        WorkflowStep::EnsureBackupLocation
    );

    let mut remote = live_site().with_file(&format!("{OLD_TREE}/index.php"), b"first run");
    let mut decide = |point: DecisionPoint| point == DecisionPoint::ReuseBackupLocation;
    let (result, _) = fixture.run(&mut remote, &mut decide);
    let report = result.expect("run must succeed");

    assert!(report.reused_backup_location);
    assert_eq!(
        remote.file_contents(&format!("{OLD_TREE}/index.php")),
        Some(&b"old index"[..])
    );
}

#[test]
fn upgrade_without_sites_directory_skips_the_clear_step() {
    let fixture = Fixture::new(&[("newsite/index.php", "new index")]);
    let mut remote = live_site();

    let (result, _) = fixture.run(&mut remote, &mut always(false));

    let report = result.expect("run must succeed");
    assert_eq!(
        report.outcome_of(WorkflowStep::ClearStagedSitesSubdir),
        Some(&StepOutcome::Skipped)
    );
    assert_eq!(
        remote.file_contents("www/site/sites/default/settings.php"),
        Some(&b"db credentials"[..])
    );
}

#[test]
fn stepwise_run_exposes_each_intermediate_state() {
    let fixture = Fixture::newsite();
    let remote = SharedRemote::new(live_site());
    let mut client = remote.clone();
    let mut decide = always(false);
    let mut reporter = RecordingReporter::default();
    let mut workflow = SiteSwapWorkflow::new(
        fixture.config.clone(),
        fixture.context(),
        &mut client,
        &mut decide,
        &mut reporter,
    );

    workflow.prepare().expect("prepare");
    assert_eq!(workflow.phase(), SwapPhase::Staged);
    assert!(remote.get().is_directory("www/site/sites/default"));
    assert!(remote.get().exists("www/site/maintenance.php"));
    assert!(remote.get().is_directory("newsite"));
    assert!(!remote.get().exists("newsite/sites"));

    workflow.relocate_sites().expect("relocate");
    assert_eq!(workflow.phase(), SwapPhase::SitesRelocated);
    assert!(workflow.phase().in_swap_window());
    assert!(!remote.get().exists("www/site/sites"));
    assert!(remote.get().is_directory("newsite/sites/default"));

    workflow.offer_restore().expect("offer restore");
    workflow.vacate_site_root().expect("vacate");
    assert_eq!(workflow.phase(), SwapPhase::OldRootVacated);
    assert!(!remote.get().exists("www/site"));
    assert!(remote.get().is_directory(OLD_TREE));

    workflow.occupy_site_root().expect("occupy");
    assert_eq!(workflow.phase(), SwapPhase::Live);
    assert!(!workflow.phase().in_swap_window());
    assert!(remote.get().is_directory("www/site/sites/default"));
    assert!(!remote.get().exists("newsite"));
}

#[test]
fn steps_called_out_of_order_are_refused_without_remote_calls() {
    let fixture = Fixture::newsite();
    let remote = SharedRemote::new(live_site());
    let mut client = remote.clone();
    let mut decide = always(true);
    let mut reporter = RecordingReporter::default();
    let mut workflow = SiteSwapWorkflow::new(
        fixture.config.clone(),
        fixture.context(),
        &mut client,
        &mut decide,
        &mut reporter,
    );

    let err = workflow.vacate_site_root().expect_err("must refuse");
    assert!(matches!(
        err,
        WorkflowError::OutOfOrder {
            step: WorkflowStep::RenameOldRootAway,
            phase: SwapPhase::Untouched
        }
    ));
    assert!(remote.get().calls().is_empty());

    workflow.prepare().expect("prepare");
    workflow.relocate_sites().expect("relocate");
    assert!(matches!(
        workflow.vacate_site_root(),
        Err(WorkflowError::OutOfOrder { .. })
    ));
    assert!(matches!(
        workflow.prepare(),
        Err(WorkflowError::OutOfOrder { .. })
    ));
    assert!(remote.get().exists("newsite/sites"));
}

#[test]
fn failure_after_vacating_the_root_is_degraded_with_guidance() {
    let fixture = Fixture::newsite();
    let mut remote = live_site();
    remote.fail_on(RemoteOperation::Rename, "newsite", io_error("www/site"));

    let (result, _) = fixture.run(&mut remote, &mut always(false));
    let err = result.expect_err("must fail");

    assert!(err.is_degraded());
    assert_eq!(err.step(), WorkflowStep::RenameStagedRootIntoPlace);
    assert_eq!(err.class(), ErrorClass::TransientOperation);
    assert!(!err.left_remote_untouched());
    assert!(matches!(
        err,
        WorkflowError::Degraded {
            phase: SwapPhase::OldRootVacated,
            ..
        }
    ));
    assert!(err
        .guidance()
        .iter()
        .any(|line| line == "to finish: rename newsite to www/site"));
    assert!(remote.is_directory(OLD_TREE));
    assert!(remote.is_directory("newsite/sites"));
}

#[test]
fn connection_loss_inside_the_swap_window_is_degraded_transport_failure() {
    let fixture = Fixture::newsite();
    let mut remote = live_site();
    remote.fail_on(RemoteOperation::Rename, "www/site", connection_lost());

    let (result, _) = fixture.run(&mut remote, &mut always(false));
    let err = result.expect_err("must fail");

    assert!(err.is_degraded());
    assert_eq!(err.class(), ErrorClass::FatalTransport);
    assert!(err
        .guidance()
        .iter()
        .any(|line| line.contains("www/site has no sites directory")));
}

#[test]
fn failed_upload_is_transient_and_leaves_the_live_sites_directory() {
    let fixture = Fixture::newsite();
    let mut remote = live_site();
    remote.fail_on(RemoteOperation::Upload, "newsite/index.php", io_error("newsite/index.php"));

    let (result, _) = fixture.run(&mut remote, &mut always(false));
    let err = result.expect_err("must fail");

    assert!(matches!(
        err,
        WorkflowError::Transient {
            step: WorkflowStep::UploadStagedUpgrade,
            phase: SwapPhase::MaintenanceMode,
            ..
        }
    ));
    assert!(!err.is_degraded());
    assert!(err
        .guidance()
        .iter()
        .any(|line| line.contains("maintenance mode")));
    assert!(remote.is_directory("www/site/sites/default"));
}

/// Shared log of reporter events, including when an activity guard is dropped.
#[derive(Clone, Default)]
struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    fn push(&self, event: String) {
        self.0.borrow_mut().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    fn position(&self, predicate: impl Fn(&str) -> bool) -> usize {
        self.events()
            .iter()
            .position(|event| predicate(event))
            .expect("event must be logged")
    }
}

struct LoggedActivity {
    label: String,
    log: EventLog,
}

impl Activity for LoggedActivity {
    fn advance(&mut self, completed: u64) {
        self.log.push(format!("advance {} {completed}", self.label));
    }
}

impl Drop for LoggedActivity {
    fn drop(&mut self) {
        self.log.push(format!("dropped {}", self.label));
    }
}

struct ActivityReporter {
    log: EventLog,
}

impl StepReporter for ActivityReporter {
    fn step_started(&mut self, number: usize, title: &str) {
        self.log.push(format!("start {number} {title}"));
    }

    fn step_detail(&mut self, _message: &str) {}

    fn step_finished(&mut self, number: usize, outcome: &StepOutcome) {
        self.log.push(format!("finish {number} {outcome}"));
    }

    fn start_activity(&mut self, label: &str) -> Box<dyn Activity> {
        self.log.push(format!("started {label}"));
        Box::new(LoggedActivity {
            label: label.to_string(),
            log: self.log.clone(),
        })
    }
}

fn run_with_activity_log(
    fixture: &Fixture,
    remote: &mut MemoryRemote,
) -> (Result<SwapReport, WorkflowError>, EventLog) {
    let log = EventLog::default();
    let mut reporter = ActivityReporter { log: log.clone() };
    let mut decide = always(false);
    let result = SiteSwapWorkflow::new(
        fixture.config.clone(),
        fixture.context(),
        remote,
        &mut decide,
        &mut reporter,
    )
    .run();
    (result, log)
}

#[test]
fn upload_activity_ends_before_a_failed_upload_is_reported() {
    let fixture = Fixture::newsite();
    let mut remote = live_site();
    remote.fail_on(RemoteOperation::Upload, "newsite/index.php", io_error("newsite/index.php"));

    let (result, log) = run_with_activity_log(&fixture, &mut remote);

    assert!(matches!(
        result.expect_err("must fail"),
        WorkflowError::Transient {
            step: WorkflowStep::UploadStagedUpgrade,
            ..
        }
    ));
    let events = log.events();
    assert_eq!(
        events.iter().filter(|event| event.starts_with("started ")).count(),
        1
    );
    assert_eq!(
        events.iter().filter(|event| event.starts_with("dropped ")).count(),
        1
    );
    let started = log.position(|event| event == "started uploading to newsite");
    let advanced = log.position(|event| event == "advance uploading to newsite 1");
    let dropped = log.position(|event| event == "dropped uploading to newsite");
    let failed = log.position(|event| event.starts_with("finish 7 failed"));
    assert!(started < advanced && advanced < dropped && dropped < failed);
}

#[test]
fn upload_activity_ends_before_a_successful_upload_is_reported() {
    let fixture = Fixture::newsite();
    let mut remote = live_site();

    let (result, log) = run_with_activity_log(&fixture, &mut remote);

    assert_eq!(result.expect("run must succeed").uploaded_files, 4);
    let dropped = log.position(|event| event == "dropped uploading to newsite");
    let last_advance = log.position(|event| event == "advance uploading to newsite 4");
    let finished = log.position(|event| event == "finish 7 success");
    assert!(last_advance < dropped && dropped < finished);
    assert_eq!(
        log.events()
            .iter()
            .filter(|event| event.starts_with("dropped "))
            .count(),
        1
    );
}

#[test]
fn failed_sites_relocation_is_not_degraded() {
    let fixture = Fixture::newsite();
    let mut remote = live_site();
    remote.fail_on(RemoteOperation::Rename, "www/site/sites", io_error("newsite/sites"));

    let (result, _) = fixture.run(&mut remote, &mut always(false));
    let err = result.expect_err("must fail");

    assert_eq!(err.step(), WorkflowStep::RelocateSitesSubdir);
    assert!(matches!(
        err,
        WorkflowError::Transient {
            phase: SwapPhase::Staged,
            ..
        }
    ));
    assert!(remote.exists("www/site/index.php"));
}

#[test]
fn connection_loss_during_verification_leaves_remote_untouched() {
    let fixture = Fixture::newsite();
    let mut remote = live_site();
    remote.fail_on(RemoteOperation::ChangeDirectory, "www/site", connection_lost());

    let (result, _) = fixture.run(&mut remote, &mut always(true));
    let err = result.expect_err("must fail");

    assert!(matches!(err, WorkflowError::FatalTransport { .. }));
    assert!(err.left_remote_untouched());
    assert!(err.guidance().is_empty());
}

#[test]
fn plan_lines_list_every_remote_operation_in_order() {
    let fixture = Fixture::newsite();
    let mut context = fixture.context();

    let lines = context.plan_lines(&fixture.config).expect("must plan");

    assert_eq!(
        lines[0],
        "swap_plan site_root=www/site staging_root=newsite backup_dir=backup"
    );
    assert!(lines.contains(&"step=backup_preserved_files move www/site/.htaccess -> backup/.htaccess".to_string()));
    assert!(lines.contains(&"step=relocate_sites_subdir move www/site/sites -> newsite/sites".to_string()));
    assert_eq!(
        lines.last().map(String::as_str),
        Some("step=rename_staged_root_into_place move newsite -> www/site")
    );
    let vacate = lines
        .iter()
        .position(|line| line.starts_with("step=rename_old_root_away"))
        .expect("vacate line");
    assert_eq!(
        lines[vacate],
        format!("step=rename_old_root_away move www/site -> {OLD_TREE}")
    );
}

#[test]
fn upgrade_context_resolves_the_staging_root_once() {
    let fixture = Fixture::newsite();
    let config = fixture
        .config
        .clone()
        .with_staging_parent("uploads")
        .expect("valid parent");
    let maintenance = fixture
        .area
        .write_maintenance_files(&config.maintenance)
        .expect("maintenance files");
    let mut context = UpgradeContext::new(&config, fixture.area.upgrade_dir(), maintenance, run_date());

    assert_eq!(context.remote_staging_root(), None);
    assert_eq!(context.resolve_staging_root().expect("resolve"), "newsite");

    write_file(&fixture.area.upgrade_dir().join("late/file.txt"), "x");
    assert_eq!(context.resolve_staging_root().expect("cached"), "newsite");
    assert_eq!(context.remote_staging_root(), Some(RemotePath::new("uploads/newsite")));
    assert_eq!(context.old_tree_backup, RemotePath::new(OLD_TREE));
}

#[test]
fn maintenance_files_default_to_built_in_content() {
    let area = StagingArea::create().expect("staging area");

    let files = area
        .write_maintenance_files(&MaintenanceSettings::default())
        .expect("must write");

    let htaccess = fs::read_to_string(&files.htaccess).expect("read htaccess");
    assert!(htaccess.contains("RewriteRule ^ maintenance.php [L]"));
    assert!(!htaccess.contains("@PAGE@"));
    let page = fs::read_to_string(&files.page).expect("read page");
    assert!(page.contains("503"));
    assert!(page.contains("Retry-After"));
}

#[test]
fn maintenance_files_use_operator_replacements() {
    let area = StagingArea::create().expect("staging area");
    let custom = tempfile::tempdir().expect("temp dir");
    let page_source = custom.path().join("down.html");
    write_file(&page_source, "<p>back soon</p>");
    let settings = MaintenanceSettings {
        page_name: "down.php".to_string(),
        page_source: Some(page_source),
        ..MaintenanceSettings::default()
    };

    let files = area.write_maintenance_files(&settings).expect("must write");

    assert_eq!(
        fs::read_to_string(&files.page).expect("read page"),
        "<p>back soon</p>"
    );
    assert_eq!(
        fs::read_to_string(&files.htaccess).expect("read htaccess"),
        render_maintenance_htaccess("down.php")
    );
}

#[test]
fn staging_area_release_removes_local_files() {
    let area = StagingArea::create().expect("staging area");
    let root: PathBuf = area.path().to_path_buf();
    area.write_maintenance_files(&MaintenanceSettings::default())
        .expect("maintenance files");
    assert!(root.exists());

    area.release().expect("must release");

    assert!(!root.exists());
}

#[test]
fn materialize_archive_falls_back_to_the_next_extractor() {
    let area = StagingArea::create().expect("staging area");
    let archive = area.path().join("drupal.zip");
    write_file(&archive, "zip bytes");
    let mut attempted = Vec::new();

    let dst = area
        .materialize_archive_with_runner(&archive, ArchiveType::Zip, |command: &mut Command, _: &str| {
            let program = command.get_program().to_string_lossy().into_owned();
            attempted.push(program.clone());
            if program == "unzip" {
                return Err(anyhow!("unzip: command not found"));
            }
            Ok(())
        })
        .expect("tar fallback must succeed");

    assert_eq!(dst, area.upgrade_dir());
    assert!(dst.is_dir());
    assert_eq!(attempted, vec!["unzip", "tar"]);
}

#[test]
fn materialize_archive_reports_the_last_extractor_failure() {
    let area = StagingArea::create().expect("staging area");
    let archive = area.path().join("drupal.tar.gz");
    write_file(&archive, "gz bytes");

    let err = area
        .materialize_archive_with_runner(&archive, ArchiveType::TarGz, |_: &mut Command, context: &str| {
            Err(anyhow!("{context}: status=2"))
        })
        .expect_err("must fail");

    let message = format!("{err:#}");
    assert!(message.contains("failed to unpack"));
    assert!(message.contains("failed to extract tar.gz archive: status=2"));
}

#[test]
fn materialize_archive_requires_the_archive_file() {
    let area = StagingArea::create().expect("staging area");

    let err = area
        .materialize_archive_with_runner(
            &area.path().join("missing.zip"),
            ArchiveType::Zip,
            |_: &mut Command, _: &str| Ok(()),
        )
        .expect_err("must fail");

    assert!(err.to_string().contains("upgrade archive not found"));
}

#[test]
fn extract_commands_match_archive_compression() {
    let archive = Path::new("/tmp/drupal.tar.xz");
    let dst = Path::new("/tmp/out");

    let commands = build_extract_commands(archive, ArchiveType::TarXz, dst);

    assert_eq!(commands.len(), 1);
    let (command, _) = &commands[0];
    assert_eq!(command.get_program(), "tar");
    let args = command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(args, vec!["-xJf", "/tmp/drupal.tar.xz", "-C", "/tmp/out"]);
}

#[test]
fn step_sequencer_numbers_steps_consecutively() {
    let mut reporter = RecordingReporter::default();
    {
        let mut steps = StepSequencer::starting_at(&mut reporter, 3);
        let first = steps.begin("verify site root");
        steps.detail("cwd www/site");
        steps.finish(first, &StepOutcome::Success);
        let second = steps.begin("verify sites directory");
        steps.finish(second, &StepOutcome::failed("missing"));
        assert_eq!(steps.next_number(), 5);
    }

    assert_eq!(
        reporter.events,
        vec![
            "start 3 verify site root",
            "detail cwd www/site",
            "finish 3 success",
            "start 4 verify sites directory",
            "finish 4 failed: missing",
        ]
    );
}

#[test]
fn workflow_steps_have_distinct_identifiers() {
    let mut ids = WorkflowStep::ALL
        .iter()
        .map(|step| step.as_str())
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), WorkflowStep::ALL.len());
    assert_eq!(WorkflowStep::RelocateSitesSubdir.to_string(), "move sites directory");
}

#[test]
fn journal_records_steps_as_json_lines() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("runs").join("run.journal");
    let journal = RunJournal::open(&path).expect("must open journal");
    let mut reporter = JournalingReporter::new(RecordingReporter::default(), Some(journal));

    {
        let mut steps = StepSequencer::new(&mut reporter);
        let number = steps.begin("back up customized files");
        steps.relocated(&FileRelocation {
            name: "robots.txt".to_string(),
            source: RemotePath::new("www/site/robots.txt"),
            target: RemotePath::new("backup/robots.txt"),
            outcome: StepOutcome::failed("550 denied"),
        });
        steps.finish(number, &StepOutcome::Success);
    }

    assert_eq!(reporter.journal_path(), Some(path.as_path()));
    assert_eq!(reporter.inner().events.len(), 3);
    let raw = fs::read_to_string(&path).expect("read journal");
    let lines = raw
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).expect("valid json"))
        .collect::<Vec<_>>();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["seq"], 1);
    assert_eq!(lines[0]["event"], "step_started");
    assert_eq!(lines[0]["title"], "back up customized files");
    assert_eq!(lines[1]["event"], "file_relocated");
    assert_eq!(lines[1]["outcome"], "failed");
    assert_eq!(lines[1]["reason"], "550 denied");
    assert_eq!(lines[2]["event"], "step_finished");
    assert_eq!(lines[2]["outcome"], "success");
    assert!(lines[2].get("reason").is_none());
    assert!(lines[2]["at_unix"].as_i64().is_some());
}

#[test]
fn journaling_reporter_without_journal_still_forwards() {
    let mut reporter = JournalingReporter::new(RecordingReporter::default(), None);

    reporter.step_started(1, "verify site root");
    reporter.step_finished(1, &StepOutcome::Skipped);

    assert_eq!(reporter.journal_path(), None);
    assert_eq!(
        reporter.inner().events,
        vec!["start 1 verify site root", "finish 1 skipped"]
    );
}

#[test]
fn error_classes_follow_the_failure_taxonomy() {
    let degraded_io = WorkflowError::Degraded {
        step: WorkflowStep::RenameOldRootAway,
        phase: SwapPhase::SitesRelocated,
        source: io_error("www/site"),
        guidance: vec!["rename it back".to_string()],
    };
    assert_eq!(degraded_io.class(), ErrorClass::TransientOperation);
    assert_eq!(degraded_io.guidance(), ["rename it back".to_string()]);
    assert!(degraded_io.to_string().contains("sites_relocated"));

    let transient = WorkflowError::Transient {
        step: WorkflowStep::UploadMaintenancePage,
        phase: SwapPhase::BackupPrepared,
        source: io_error("www/site/.htaccess"),
        guidance: Vec::new(),
    };
    assert!(!transient.left_remote_untouched());

    let out_of_order = WorkflowError::OutOfOrder {
        step: WorkflowStep::RelocateSitesSubdir,
        phase: SwapPhase::Untouched,
    };
    assert_eq!(out_of_order.class(), ErrorClass::Precondition);
    assert!(out_of_order.guidance().is_empty());
}
