//! Command line interface.

use clap::{crate_authors, crate_version, App, Arg};

/// Generates the command line interface.
pub fn generate_cli() -> App<'static, 'static> {
    App::new("chain-analyzer")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Links Android application facts into cross-component vulnerability chains.")
        .arg(
            Arg::with_name("facts")
                .help("JSON fact files of the applications to scan")
                .value_name("FACTS")
                .required(true)
                .multiple(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .conflicts_with("quiet")
                .help("If you'd like the auditor to talk more than necessary"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("If you'd like a zen auditor that won't talk unless it's 100% necessary"),
        )
        .arg(
            Arg::with_name("threads")
                .short("t")
                .long("threads")
                .value_name("THREADS")
                .takes_value(true)
                .help("Sets the number of threads used to scan applications"),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .value_name("FILE")
                .takes_value(true)
                .help("Uses the given configuration file"),
        )
        .arg(
            Arg::with_name("min_criticality")
                .long("min-criticality")
                .value_name("CRITICALITY")
                .takes_value(true)
                .possible_values(&["warning", "low", "medium", "high", "critical"])
                .help("Sets the minimum criticality of the rules and chains to check"),
        )
        .arg(
            Arg::with_name("max_chain_depth")
                .long("max-chain-depth")
                .value_name("DEPTH")
                .takes_value(true)
                .help("Sets the maximum number of hops of a chain template (2 to 5)"),
        )
        .arg(
            Arg::with_name("parallel_phases")
                .long("parallel-phases")
                .help("Runs rule matching and chain linking of each application concurrently"),
        )
}
