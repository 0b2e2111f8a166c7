//! Terminal output: batch progress bar and styled result lines.

use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rvdiff::scheduler::{TestResult, TestStatus, TestSummary};

/// Progress bar for a batch of tests.
///
/// Result lines are printed through the bar so they never interleave with
/// its redraws.
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    /// A bar counting `total` tests. Hidden when stderr is not a terminal.
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        if let Ok(progress_style) =
            ProgressStyle::default_bar().template("{msg} [{bar:30.cyan/dim}] {pos}/{len}")
        {
            bar.set_style(progress_style.progress_chars("━╸━"));
        }
        bar.set_message("testing");
        Self { bar }
    }

    /// Print a finished test's line and advance the bar.
    pub fn report(&self, result: &TestResult) {
        let line = styled_line(result);
        self.bar.suspend(|| println!("{line}"));
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// `name ........ PASSED` with the status colored.
pub fn styled_line(result: &TestResult) -> String {
    let line = result.line();
    let Some(prefix) = line.strip_suffix(result.status.as_str()) else {
        return line;
    };
    let status = match result.status {
        TestStatus::Passed if result.is_suspicious() => style(result.status.as_str()).yellow(),
        TestStatus::Passed => style(result.status.as_str()).green(),
        TestStatus::Failed => style(result.status.as_str()).red().bold(),
    };
    format!("{prefix}{status}")
}

// ============================================================================
// Styled output helpers
// ============================================================================

pub fn info(message: &str) {
    eprintln!("{} {}", style("→").cyan(), message);
}

pub fn success(message: &str) {
    eprintln!("{} {}", style("✓").green().bold(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
}

/// Print a path output (like "→ /path/to/file").
pub fn path_output(path: &Path) {
    eprintln!("  {} {}", style("→").dim(), style(path.display()).dim());
}

/// Print the end-of-run summary.
pub fn print_summary(summary: &TestSummary, work_dir: &Path) {
    eprintln!();
    let totals = format!(
        "{} passed, {} failed ({} total)",
        summary.passed,
        summary.failed,
        summary.total()
    );
    if summary.all_passed() {
        success(&totals);
    } else {
        error(&totals);
    }
    if summary.suspicious > 0 {
        warning(&format!(
            "{} passed with no comparable events on either side",
            summary.suspicious
        ));
    }

    if !summary.failures.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failures:").bold());
        for failure in &summary.failures {
            eprintln!("  {} ({})", failure.name, failure.cause());
            path_output(&work_dir.join(&failure.name));
        }
    }
}
