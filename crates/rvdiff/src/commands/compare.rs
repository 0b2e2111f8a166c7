//! `rvdiff compare`: offline comparison of existing traces.

use std::io;
use std::path::Path;

use rvdiff::{TestStatus, compare_logs, summary_line};
use rvdiff_trace::AddressSpace;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

pub fn cmd_compare(iss: &Path, rtl: &Path, name: &str, merged: Option<&Path>) -> i32 {
    let space = AddressSpace::for_test(name);
    let comparison = match compare_logs(iss, rtl, &space, merged) {
        Ok(c) => c,
        Err(e) => {
            terminal::error(&e.to_string());
            return EXIT_FAILURE;
        }
    };

    let verdict = &comparison.verdict;
    println!("{}", summary_line(name, TestStatus::of(verdict)));
    if let Err(e) = verdict.write_report(&mut io::stderr().lock()) {
        terminal::error(&format!("cannot write report: {e}"));
    }
    if comparison.merge.merged > 0 {
        terminal::info(&format!(
            "merged {} split write(s), {} left unmerged",
            comparison.merge.merged, comparison.merge.unmerged
        ));
    }
    if let Some(path) = merged {
        terminal::path_output(path);
    }
    if verdict.is_suspicious() {
        terminal::warning("neither trace has comparable events");
    }

    if verdict.passed() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}
