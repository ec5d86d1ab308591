use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use siteswap_migrate::{
    default_journal_path, JournalingReporter, RunJournal, SiteSwapWorkflow, StagingArea,
    UpgradeContext, WorkflowError,
};
use siteswap_remote::CurlFtpClient;

use crate::prompt::ConsoleDecisions;
use crate::render::{
    closing_reminders, format_failure_lines, format_report_lines, TerminalRenderer,
    TerminalReporter,
};
use crate::settings::{
    load_config_file, resolve_archive_type, resolve_connection, resolve_swap_config, PASSWORD_ENV,
};
use crate::Cli;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RunStatus {
    Completed,
    /// The operator said no before anything changed remotely.
    Declined,
    Previewed,
    Failed,
    Degraded,
}

impl RunStatus {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Completed | Self::Declined | Self::Previewed => 0,
            Self::Failed => 1,
            Self::Degraded => 2,
        }
    }

    pub(crate) fn from_error(err: &WorkflowError) -> Self {
        match err {
            WorkflowError::Declined { .. } => Self::Declined,
            _ if err.is_degraded() => Self::Degraded,
            _ => Self::Failed,
        }
    }
}

pub(crate) fn run_cli(cli: Cli, renderer: TerminalRenderer) -> Result<RunStatus> {
    let file = load_config_file(&cli)?;
    let config = resolve_swap_config(&cli, &file)?;
    let archive_type = resolve_archive_type(&cli)?;

    let staging = StagingArea::create()?;
    let staged_root = {
        let _spinner = renderer.start_spinner(&format!("unpacking {}", cli.upgrade_file.display()));
        staging.materialize_archive(&cli.upgrade_file, archive_type)?
    };
    let maintenance = staging.write_maintenance_files(&config.maintenance)?;
    let mut context = UpgradeContext::new(
        &config,
        staged_root,
        maintenance,
        Local::now().date_naive(),
    );

    if cli.dry_run {
        let lines = context.plan_lines(&config)?;
        renderer.print_lines(&lines);
        release_staging(staging);
        return Ok(RunStatus::Previewed);
    }

    let connection = resolve_connection(&cli, &file, std::env::var(PASSWORD_ENV).ok())?;
    let host = connection.host.clone();
    let mut client = {
        let _spinner = renderer.start_spinner(&format!("connecting to {host}"));
        CurlFtpClient::connect(connection)
    }
    .with_context(|| format!("failed to connect to {host}"))?;

    let journal = open_journal(&cli);
    let mut reporter = JournalingReporter::new(TerminalReporter::new(renderer), journal);
    let mut decisions = ConsoleDecisions::new(
        io::stdin().lock(),
        io::stdout(),
        cli.yes,
        cli.no_restore,
    );

    let outcome = SiteSwapWorkflow::new(
        config,
        context,
        &mut client,
        &mut decisions,
        &mut reporter,
    )
    .run();
    let journal_path = reporter.journal_path().map(Path::to_path_buf);
    release_staging(staging);

    match outcome {
        Ok(report) => {
            println!();
            renderer.print_lines(&format_report_lines(&report, renderer.style()));
            println!();
            renderer.print_lines(&closing_reminders(&report));
            Ok(RunStatus::Completed)
        }
        Err(err) => {
            println!();
            renderer.print_lines(&format_failure_lines(
                &err,
                journal_path.as_deref(),
                renderer.style(),
            ));
            Ok(RunStatus::from_error(&err))
        }
    }
}

/// The journal is diagnostic only, so failing to open it never stops a run.
fn open_journal(cli: &Cli) -> Option<RunJournal> {
    if cli.no_journal {
        return None;
    }
    let path: Result<PathBuf> = match &cli.journal {
        Some(path) => Ok(path.clone()),
        None => default_journal_path(),
    };
    match path.and_then(RunJournal::open) {
        Ok(journal) => {
            tracing::info!(path = %journal.path().display(), "recording run journal");
            Some(journal)
        }
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "run journal disabled");
            None
        }
    }
}

fn release_staging(staging: StagingArea) {
    if let Err(err) = staging.release() {
        tracing::warn!(error = %format!("{err:#}"), "local staging directory was not removed");
    }
}
