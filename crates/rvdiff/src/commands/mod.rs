//! Command implementations.

mod compare;
mod run;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Run(args) => run::cmd_run(args, cli.debug),
        Commands::Compare {
            iss,
            rtl,
            name,
            merged,
        } => compare::cmd_compare(iss, rtl, name, merged.as_deref()),
    }
}
