//! rvdiff CLI - ISS vs RTL trace regression runner

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let metrics_handle = if cli.metrics {
        rvdiff::metrics::CliRecorder::new().install()
    } else {
        None
    };
    rvdiff::metrics::init();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.debug, std::env::var("RUST_LOG").ok()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = commands::run_command(&cli);

    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }

    std::process::exit(exit_code);
}

/// `RUST_LOG` when set and valid, otherwise `rvdiff=warn` (`rvdiff=debug` with `-d`).
fn log_filter(debug: bool, rust_log: Option<String>) -> EnvFilter {
    let default_level = if debug { "rvdiff=debug" } else { "rvdiff=warn" };
    rust_log
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_log_filter_defaults() {
        assert_eq!(log_filter(false, None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(true, None).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_rust_log_overrides_default() {
        let filter = log_filter(false, Some("rvdiff=trace".to_string()));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
        let filter = log_filter(true, Some("rvdiff=info".to_string()));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}
