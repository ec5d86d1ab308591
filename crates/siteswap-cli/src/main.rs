use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

mod flow;
mod prompt;
mod render;
mod settings;

use flow::run_cli;
use render::TerminalRenderer;

#[derive(Parser, Debug)]
#[command(name = "siteswap")]
#[command(
    about = "Upgrade a Drupal site over FTP by swapping a freshly uploaded tree into place",
    long_about = None
)]
struct Cli {
    /// Upgrade archive (.zip, .tar.gz, .tar.bz2, .tar.xz or .tar)
    upgrade_file: PathBuf,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long, short = 'u')]
    username: Option<String>,
    /// Falls back to SITESWAP_PASSWORD, then [connection].password
    #[arg(long)]
    password: Option<String>,
    /// Remote site root, relative to the FTP login directory
    #[arg(long)]
    site_root: Option<String>,
    #[arg(long)]
    backup_dir: Option<String>,
    #[arg(long)]
    archive_type: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Answer yes to every prompt
    #[arg(long, short = 'y')]
    yes: bool,
    /// Leave the backed up files in the backup directory
    #[arg(long)]
    no_restore: bool,
    /// Unpack the archive and print the planned remote operations without connecting
    #[arg(long)]
    dry_run: bool,
    #[arg(long, conflicts_with = "no_journal")]
    journal: Option<PathBuf>,
    #[arg(long)]
    no_journal: bool,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let renderer = TerminalRenderer::current();
    match run_cli(cli, renderer) {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            renderer.print_status("error", &format!("{err:#}"));
            ExitCode::from(flow::RunStatus::Failed.code())
        }
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("SITESWAP_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
