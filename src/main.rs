//! Chain analyzer command line adapter.
//!
//! Reads JSON fact files, scans them as a batch and prints one JSON document
//! per application to `stdout`. Progress, warnings and finding descriptions go
//! to `stderr`.

#![forbid(anonymous_parameters, unsafe_code)]
#![warn(clippy::pedantic, missing_docs, unused_qualifications, unused_results)]

use anyhow::{Context, Result};
use chain_analyzer_core::{
    cli::generate_cli,
    facts::ApplicationFacts,
    initialize_config, initialize_logger, print_warning,
    scan::{scan_batch, ApplicationOutcome, CancellationToken},
    write_report,
};
use colored::Colorize;
use log::{error, info};
use std::{fs, io, path::Path, process::exit};

fn main() {
    if let Err(e) = run() {
        error!("{}", e);
        for cause in e.chain().skip(1) {
            error!("\tCaused by: {}", cause);
        }
        exit(1);
    }
}

/// Reads the facts of one application.
fn read_facts<P: AsRef<Path>>(path: P) -> Result<ApplicationFacts> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("could not read the fact file {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("the fact file {} is not valid", path.display()))
}

fn run() -> Result<()> {
    let cli = generate_cli().get_matches();
    initialize_logger(cli.is_present("verbose"))?;
    let config = initialize_config(&cli)?;
    let context = config.scan_context()?;

    let mut applications = Vec::new();
    for path in cli.values_of("facts").into_iter().flatten() {
        match read_facts(path) {
            Ok(facts) => applications.push(facts),
            Err(e) => print_warning(format!("{:#}. Skipping it.", e)),
        }
    }

    if !config.is_quiet() {
        info!(
            "Scanning {} application(s) with {} thread(s).",
            applications.len().to_string().bold(),
            context.threads().to_string().bold()
        );
    }

    let outcomes = scan_batch(applications, &context, &CancellationToken::new());
    let stdout = io::stdout();
    let mut report = stdout.lock();
    for outcome in outcomes {
        match outcome {
            ApplicationOutcome::Completed(results) => {
                write_report(&results, config.is_verbose(), &mut report, &mut io::stderr())?;
            }
            ApplicationOutcome::Failed(e) => print_warning(e.to_string()),
            ApplicationOutcome::Cancelled => {
                print_warning("the scan was cancelled before reaching this application")
            }
        }
    }

    Ok(())
}
