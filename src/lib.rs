//! Cross-component vulnerability correlation engine for Android applications.
//!
//! The engine takes the facts an extraction adapter pulled out of a decompiled
//! application (manifest components, data sources, sensitive sinks and
//! permissions), matches single-fact rules against them, links them into
//! multi-step exploit chains and returns a deterministic, ranked list of
//! findings.

#![forbid(anonymous_parameters, unsafe_code)]
#![warn(
    clippy::pedantic,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    variant_size_differences
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

pub mod chains;
pub mod cli;
mod config;
mod criticality;
mod error;
pub mod facts;
pub mod matcher;
pub mod results;
pub mod rules;
pub mod scan;
mod utils;

pub use crate::{
    config::Config,
    criticality::{Confidence, Criticality},
    error::{ErrorKind, ScanError},
    utils::{print_warning, write_finding, write_report},
};
use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use env_logger::Builder;
use log::LevelFilter;
use std::{env, io::Write, path::PathBuf};

/// Initialize the config with the config files and command line options.
///
/// An explicit `--config` file wins. Otherwise, on UNIX, if the local file
/// (`config.toml`) does not exist but the global one
/// (`/etc/chain-analyzer/config.toml`) does, the latter is used. Finally, if
/// none of the files could be loaded, the default config is used.
pub fn initialize_config(cli: &ArgMatches<'_>) -> Result<Config> {
    let config_path = PathBuf::from("config.toml");
    let global_config_path = PathBuf::from("/etc/chain-analyzer/config.toml");

    let mut config = if let Some(path) = cli.value_of("config") {
        Config::from_file(path)
            .with_context(|| format!("there was an error when reading the {} file", path))?
    } else if cfg!(target_family = "unix") && !config_path.exists() && global_config_path.exists()
    {
        Config::from_file(&global_config_path).context(
            "there was an error when reading the /etc/chain-analyzer/config.toml file",
        )?
    } else if config_path.exists() {
        Config::from_file(&config_path)
            .context("there was an error when reading the config.toml file")?
    } else {
        Config::default()
    };

    config
        .decorate_with_cli(cli)
        .context("there was an error reading config from CLI")?;

    Ok(config)
}

/// Initializes the logger.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
pub fn initialize_logger(is_verbose: bool) -> Result<()> {
    let log_level = if is_verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    let _ = builder.format(|buf, record| match record.level() {
        log::Level::Warn => writeln!(
            buf,
            "{}{}",
            "Warning: ".bold().yellow(),
            record.args().to_string().yellow()
        ),
        log::Level::Error => writeln!(
            buf,
            "{}{}",
            "Error: ".bold().red(),
            record.args().to_string().red()
        ),
        log::Level::Debug => writeln!(
            buf,
            "{}{}",
            "Debug: ".bold(),
            record.args().to_string().bold()
        ),
        log::Level::Info => writeln!(buf, "{}", record.args()),
        log::Level::Trace => writeln!(buf, "{}: {}", record.level(), record.args()),
    });

    if let Ok(env_log) = env::var("RUST_LOG") {
        let _ = builder.parse_filters(&env_log);
    } else {
        let _ = builder
            .filter(Some("chain_analyzer_core"), log_level)
            .filter(Some("chain_analyzer"), log_level);
    }

    builder
        .try_init()
        .context("could not initialize the logger")?;
    Ok(())
}
