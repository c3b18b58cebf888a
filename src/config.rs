//! Configuration module.
//!
//! Handles and configures the initial settings and variables needed to run the
//! analyzer. The configuration is read from a TOML file, and command line
//! options override it.
//!
//! A configuration file looks like this:
//!
//! ```toml
//! threads = 4
//! min_criticality = "low"
//! max_chain_depth = 5
//!
//! [severity]
//! permission-gap = "medium"
//!
//! [[rules]]
//! id = "debug-webview"
//! category = "webview-url-injection"
//! confidence = "low"
//! rationale = "Debug activities loading external URLs."
//! include_component = "\\.debug\\."
//! predicate = { fact = "sink", operations = ["webview-load-url"] }
//! ```

use crate::{
    chains::{builtin_templates, ChainTemplate, MAX_CHAIN_DEPTH, MIN_CHAIN_DEPTH},
    criticality::Criticality,
    error::ErrorKind,
    results::SeverityTable,
    rules::{Rule, RuleRegistry},
    scan::ScanContext,
};
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use log::debug;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

/// Default maximum number of hops of a chain template.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 5;

/// Configuration of the analyzer.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Boolean to represent `--verbose` mode.
    verbose: bool,
    /// Boolean to represent `--quiet` mode.
    quiet: bool,
    /// Number of threads of the batch scan.
    threads: usize,
    /// Minimum criticality of the rules and templates to load.
    min_criticality: Criticality,
    /// Maximum number of hops of a chain template.
    max_chain_depth: usize,
    /// Run the matcher and the linker of one application concurrently.
    parallel_phases: bool,
    /// Criticality overrides, by category name.
    severity: BTreeMap<String, Criticality>,
    /// Additional rules.
    rules: Vec<Rule>,
    /// Additional chain templates.
    templates: Vec<ChainTemplate>,
    /// Path of the loaded configuration file, if any.
    #[serde(skip)]
    loaded_file: Option<PathBuf>,
}

impl Config {
    /// Creates a new `Config` struct from a TOML file.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let toml = fs::read_to_string(config_path).with_context(|| {
            format!(
                "could not read the configuration file at {}",
                config_path.display()
            )
        })?;

        let mut config: Self = toml::from_str(&toml).with_context(|| {
            format!(
                "there was an error parsing the configuration file at {}",
                config_path.display()
            )
        })?;
        config.loaded_file = Some(config_path.to_path_buf());
        config.check()?;

        Ok(config)
    }

    /// Modifies the options from the CLI.
    pub fn decorate_with_cli(&mut self, cli: &ArgMatches<'_>) -> Result<()> {
        self.verbose = self.verbose || cli.is_present("verbose");
        self.quiet = self.quiet || cli.is_present("quiet");
        if self.verbose {
            self.quiet = false;
        }

        if let Some(threads) = cli.value_of("threads") {
            self.threads = threads
                .parse()
                .with_context(|| format!("invalid number of threads: `{}`", threads))?;
        }
        if let Some(criticality) = cli.value_of("min_criticality") {
            self.min_criticality = criticality
                .parse()
                .with_context(|| format!("invalid criticality: `{}`", criticality))?;
        }
        if let Some(depth) = cli.value_of("max_chain_depth") {
            self.max_chain_depth = depth
                .parse()
                .with_context(|| format!("invalid maximum chain depth: `{}`", depth))?;
        }
        if cli.is_present("parallel_phases") {
            self.parallel_phases = true;
        }

        self.check()
    }

    /// Checks the limits of the configuration.
    fn check(&self) -> Result<()> {
        if self.threads == 0 {
            bail!(ErrorKind::Config {
                message: "the number of threads must be at least 1".to_owned(),
            });
        }
        if self.max_chain_depth < MIN_CHAIN_DEPTH || self.max_chain_depth > MAX_CHAIN_DEPTH {
            bail!(ErrorKind::Config {
                message: format!(
                    "the maximum chain depth must be between {} and {}, found {}",
                    MIN_CHAIN_DEPTH, MAX_CHAIN_DEPTH, self.max_chain_depth
                ),
            });
        }
        Ok(())
    }

    /// Returns true if the application is running in `--verbose` mode, false otherwise.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Returns true if the application is running in `--quiet` mode, false otherwise.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Returns the `threads` field.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Returns the minimum criticality of loaded rules and templates.
    pub fn min_criticality(&self) -> Criticality {
        self.min_criticality
    }

    /// Returns the maximum number of hops of a chain template.
    pub fn max_chain_depth(&self) -> usize {
        self.max_chain_depth
    }

    /// Returns true if the phases of each scan run concurrently.
    pub fn parallel_phases(&self) -> bool {
        self.parallel_phases
    }

    /// Returns the path of the loaded configuration file.
    pub fn loaded_file(&self) -> Option<&Path> {
        self.loaded_file.as_deref()
    }

    /// Builds the severity table, with the overrides of the configuration.
    pub fn severity_table(&self) -> Result<SeverityTable, ErrorKind> {
        SeverityTable::default().with_overrides(&self.severity)
    }

    /// Builds the immutable scan context: rule registry, chain templates and
    /// severity table.
    pub fn scan_context(&self) -> Result<ScanContext, ErrorKind> {
        let severity = self.severity_table()?;

        let mut registry = RuleRegistry::builtin()?;
        registry.extend(self.rules.iter().cloned())?;
        registry.retain_min_criticality(&severity, self.min_criticality);

        let mut templates = Vec::new();
        for template in builtin_templates()? {
            if template.check_depth(self.max_chain_depth).is_err() {
                debug!(
                    "template `{}` is longer than the maximum chain depth, skipping it",
                    template.id()
                );
            } else {
                templates.push(template);
            }
        }
        for template in &self.templates {
            template.validate()?;
            template.check_depth(self.max_chain_depth)?;
            templates.push(template.clone());
        }

        let mut ids = BTreeSet::new();
        for template in &templates {
            if !ids.insert(template.id()) {
                return Err(ErrorKind::InvalidTemplate {
                    id: template.id().to_owned(),
                    message: "a template with the same identifier is already registered"
                        .to_owned(),
                });
            }
        }
        templates.retain(|template| {
            let keep = severity.criticality(template.category()) >= self.min_criticality;
            if !keep {
                debug!(
                    "template `{}` is below the minimum criticality, skipping it",
                    template.id()
                );
            }
            keep
        });

        Ok(ScanContext::new(registry, templates, severity)
            .with_threads(self.threads)
            .with_parallel_phases(self.parallel_phases))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            quiet: false,
            threads: num_cpus::get(),
            min_criticality: Criticality::Warning,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            parallel_phases: false,
            severity: BTreeMap::new(),
            rules: Vec::new(),
            templates: Vec::new(),
            loaded_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, DEFAULT_MAX_CHAIN_DEPTH};
    use crate::{cli::generate_cli, criticality::Criticality, results::Category};
    use std::{fs, path::Path};

    #[test]
    fn it_config() {
        let config = Config::default();

        assert!(!config.is_verbose());
        assert!(!config.is_quiet());
        assert_eq!(config.threads(), num_cpus::get());
        assert_eq!(config.min_criticality(), Criticality::Warning);
        assert_eq!(config.max_chain_depth(), DEFAULT_MAX_CHAIN_DEPTH);
        assert!(!config.parallel_phases());
        assert!(config.loaded_file().is_none());

        let context = config.scan_context().unwrap();
        assert_eq!(context.registry().len(), 13);
        assert_eq!(context.templates().len(), 6);
        assert_eq!(context.threads(), num_cpus::get());
    }

    #[test]
    fn it_decorate_with_cli() {
        let mut config = Config::default();
        let cli = generate_cli().get_matches_from(vec![
            "chain-analyzer",
            "-v",
            "-t",
            "3",
            "--min-criticality",
            "high",
            "--parallel-phases",
            "facts.json",
        ]);
        config.decorate_with_cli(&cli).unwrap();

        assert!(config.is_verbose());
        assert!(!config.is_quiet());
        assert_eq!(config.threads(), 3);
        assert_eq!(config.min_criticality(), Criticality::High);
        assert!(config.parallel_phases());

        let context = config.scan_context().unwrap();
        assert!(context.registry().get("exported-without-permission").is_none());
        assert!(context
            .templates()
            .iter()
            .all(|t| t.id() != "webview-bridge-to-sensitive-sink"));

        let mut config = Config::default();
        let cli = generate_cli().get_matches_from(vec!["chain-analyzer", "-t", "0", "f.json"]);
        assert!(config.decorate_with_cli(&cli).is_err());
    }

    #[test]
    fn it_max_chain_depth_skips_long_templates() {
        let config: Config = toml::from_str("max_chain_depth = 3").unwrap();
        let context = config.scan_context().unwrap();

        assert!(context.templates().iter().all(|t| t.steps().len() <= 3));
        assert_eq!(context.templates().len(), 4);
    }

    #[test]
    fn it_config_file() {
        let toml = r#"
            threads = 2
            min_criticality = "low"

            [severity]
            permission-gap = "high"

            [[rules]]
            id = "debug-webview"
            category = "webview-url-injection"
            confidence = "low"
            rationale = "Debug activities loading external URLs."
            include_component = "\\.debug\\."
            predicate = { fact = "sink", operations = ["webview-load-url"] }

            [[templates]]
            id = "broadcast-to-private-receiver"
            category = "implicit-intent-interception"
            description = "Intent data is broadcast to a private receiver."
            entry = { values = ["intent-extra"], exported = true }
            steps = [
                { edge = "flows-to", node = { fact = "sink", operations = ["broadcast-send"] } },
                { edge = "forwards-intent-to", node = { fact = "component", exported = false } },
            ]
        "#;

        let path = std::env::temp_dir().join("chain-analyzer-it-config-file.toml");
        fs::write(&path, toml).unwrap();
        let config = Config::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.threads(), 2);
        assert_eq!(config.min_criticality(), Criticality::Low);
        assert_eq!(config.loaded_file(), Some(path.as_path()));

        let context = config.scan_context().unwrap();
        assert_eq!(
            context.severity().criticality(Category::PermissionGap),
            Criticality::High
        );
        assert!(context.registry().get("debug-webview").is_some());
        assert!(context.registry().get("exported-without-permission").is_none());
        assert!(context
            .templates()
            .iter()
            .any(|t| t.id() == "broadcast-to-private-receiver"));
    }

    #[test]
    fn it_rejects_invalid_configs() {
        assert!(Config::from_file(Path::new("/nonexistent/chain-analyzer.toml")).is_err());

        let config: Config = toml::from_str(
            r#"
            [severity]
            not-a-category = "high"
            "#,
        )
        .unwrap();
        assert!(config.scan_context().is_err());

        let duplicated: Config = toml::from_str(
            r#"
            [[rules]]
            id = "intent-redirection"
            category = "intent-redirection"
            confidence = "high"
            rationale = "Duplicated."
            predicate = { fact = "unresolved-permission" }
            "#,
        )
        .unwrap();
        assert!(duplicated.scan_context().is_err());

        for depth in &[1, 6] {
            let config: Config = toml::from_str(&format!("max_chain_depth = {}", depth)).unwrap();
            assert!(config.check().is_err(), "depth {} was accepted", depth);
        }
        let deepest: Config = toml::from_str("max_chain_depth = 5").unwrap();
        assert!(deepest.check().is_ok());
    }

    #[test]
    fn it_config_sample() {
        let config = Config::from_file("config.toml.sample").unwrap();
        assert!(config.scan_context().is_ok());
    }
}
