use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use siteswap_core::StepOutcome;
use siteswap_migrate::{Activity, FileRelocation, StepReporter, SwapReport, WorkflowError};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        return OutputStyle::Plain;
    }
    OutputStyle::Rich
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    /// Spinner for one blocking operation; cleared when the guard drops.
    pub(crate) fn start_spinner(self, label: &str) -> SpinnerActivity {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
                progress_bar.set_style(style.tick_chars("|/-\\ "));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        SpinnerActivity {
            label: label.to_string(),
            progress_bar,
            started_at: Instant::now(),
        }
    }
}

pub(crate) struct SpinnerActivity {
    label: String,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl Activity for SpinnerActivity {
    fn advance(&mut self, completed: u64) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.set_message(format!("{} ({} files)", self.label, HumanCount(completed)));
        }
    }
}

impl Drop for SpinnerActivity {
    fn drop(&mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
            tracing::debug!(
                activity = %self.label,
                elapsed = %format_elapsed(self.started_at.elapsed()),
                "activity finished"
            );
        }
    }
}

/// Console presentation of workflow steps.
pub(crate) struct TerminalReporter {
    renderer: TerminalRenderer,
}

impl TerminalReporter {
    pub(crate) fn new(renderer: TerminalRenderer) -> Self {
        Self { renderer }
    }
}

impl StepReporter for TerminalReporter {
    fn step_started(&mut self, number: usize, title: &str) {
        println!("{}", render_step_header(self.renderer.style(), number, title));
    }

    fn step_detail(&mut self, message: &str) {
        println!("    {message}");
    }

    fn step_finished(&mut self, number: usize, outcome: &StepOutcome) {
        self.renderer.print_status(
            outcome_status(outcome),
            &format!("step {number}: {outcome}"),
        );
    }

    fn file_relocated(&mut self, relocation: &FileRelocation) {
        let status = match relocation.outcome {
            StepOutcome::Failed(_) => "warn",
            _ => outcome_status(&relocation.outcome),
        };
        println!(
            "    {}",
            render_status_line(
                self.renderer.style(),
                status,
                &format!(
                    "{} -> {}: {}",
                    relocation.source, relocation.target, relocation.outcome
                ),
            )
        );
    }

    fn start_activity(&mut self, label: &str) -> Box<dyn Activity> {
        Box::new(self.renderer.start_spinner(label))
    }
}

pub(crate) fn outcome_status(outcome: &StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Success => "ok",
        StepOutcome::Skipped => "skip",
        StepOutcome::Failed(_) => "error",
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("[{}] {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "OK",
        "warn" => "WARN",
        "error" => "ERR",
        "skip" => "SKIP",
        _ => "..",
    }
}

pub(crate) fn render_step_header(style: OutputStyle, number: usize, title: &str) -> String {
    let line = format!("Step {number}: {title}");
    match style {
        OutputStyle::Plain => line,
        OutputStyle::Rich => colorize(section_style(), &line),
    }
}

pub(crate) fn format_report_lines(report: &SwapReport, style: OutputStyle) -> Vec<String> {
    let preserved = &report.preserved;
    let mut lines = vec![
        render_status_line(
            style,
            "ok",
            &format!("{} now serves the upgrade", report.site_root),
        ),
        render_status_line(
            style,
            "info",
            &format!("previous site kept at {}", report.old_tree_backup),
        ),
        render_status_line(
            style,
            "info",
            &format!("uploaded {} files", HumanCount(report.uploaded_files)),
        ),
        render_status_line(
            style,
            if preserved.is_clean() { "ok" } else { "warn" },
            &format!(
                "customized files: {} backed up, {} not present, {} failed",
                preserved.succeeded(),
                preserved.skipped(),
                preserved.failed()
            ),
        ),
    ];
    lines.push(match &report.restored {
        Some(restored) => render_status_line(
            style,
            if restored.is_clean() { "ok" } else { "warn" },
            &format!(
                "restored {} customized files into {}",
                restored.succeeded(),
                report.site_root
            ),
        ),
        None => render_status_line(
            style,
            "skip",
            &format!("customized files left in {}", report.backup_dir),
        ),
    });
    lines
}

pub(crate) fn closing_reminders(report: &SwapReport) -> Vec<String> {
    let mut customized = report
        .preserved
        .relocations
        .iter()
        .map(|relocation| relocation.name.clone())
        .collect::<Vec<_>>();
    customized.push("sites/default/settings.php".to_string());
    vec![
        format!(
            "Re-apply any customizations to {} that the upgrade replaced.",
            customized.join(", ")
        ),
        format!(
            "Remove {} once the upgraded site is verified.",
            report.backup_dir
        ),
    ]
}

pub(crate) fn format_failure_lines(
    err: &WorkflowError,
    journal: Option<&Path>,
    style: OutputStyle,
) -> Vec<String> {
    let status = match err {
        WorkflowError::Declined { .. } => "skip",
        _ => "error",
    };
    let mut lines = vec![render_status_line(style, status, &err.to_string())];
    if err.left_remote_untouched() {
        lines.push(render_status_line(
            style,
            "info",
            "the remote site was not changed",
        ));
    } else if err.is_degraded() {
        lines.push(render_status_line(
            style,
            "warn",
            "the remote site is in a degraded state; finish or undo the swap by hand:",
        ));
    } else if !err.guidance().is_empty() {
        lines.push(render_status_line(
            style,
            "warn",
            "the remote site was partly changed:",
        ));
    }
    lines.extend(err.guidance().iter().map(|line| format!("  - {line}")));
    if let Some(path) = journal {
        lines.push(format!("run journal: {}", path.display()));
    }
    lines
}

pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
