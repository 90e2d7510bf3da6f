// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `fcheck`: run a Proxy-Wasm plugin test suite and its benchmarks.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgAction, ArgGroup, Parser};
use filtercheck_runner::{
    apply_overrides, bench, load_suite, run_suite, ConfigLogLevel, Overrides, SuiteFormat,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "fcheck",
    author,
    version,
    about = "Dynamic test and benchmark runner for Proxy-Wasm HTTP plugins",
    long_about = None
)]
#[command(group = ArgGroup::new("suite").required(true).args(["proto", "yaml"]))]
struct Cli {
    /// Path to a textproto test suite
    #[arg(long, value_name = "PATH")]
    proto: Option<PathBuf>,

    /// Path to a YAML test suite
    #[arg(long, value_name = "PATH")]
    yaml: Option<PathBuf>,

    /// Override the plugin wasm path from the suite
    #[arg(long, value_name = "WASM_PATH")]
    plugin: Option<String>,

    /// Override the plugin config path from the suite
    #[arg(long, value_name = "CONFIG_PATH")]
    config: Option<String>,

    /// Emit plugin logs to this file, or "-" for stdout
    #[arg(long, value_name = "PATH")]
    logfile: Option<String>,

    /// Override the suite log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(long, value_name = "LEVEL", value_parser = parse_log_level)]
    loglevel: Option<ConfigLogLevel>,

    /// Run the config-requested functional tests
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    test: bool,

    /// Run the config-requested benchmarks
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    bench: bool,

    /// Number of additional streams to run in benchmarks
    #[arg(long, value_name = "N")]
    num_additional_streams: Option<u64>,

    /// Number of additional streams to advance per benchmark iteration
    #[arg(long, value_name = "N")]
    additional_stream_advance_rate: Option<u64>,
}

fn parse_log_level(raw: &str) -> Result<ConfigLogLevel, String> {
    ConfigLogLevel::from_str(raw).map_err(|err| err.to_string())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    std::process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let (path, format) = match (&cli.proto, &cli.yaml) {
        (Some(path), None) => (path.clone(), SuiteFormat::Textproto),
        (None, Some(path)) => (path.clone(), SuiteFormat::Yaml),
        // The clap group guarantees exactly one is present.
        _ => {
            eprintln!("Either --proto or --yaml is required.");
            return 1;
        }
    };

    let mut suite = match load_suite(&path, Some(format)) {
        Ok(suite) => suite,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    tracing::debug!(suite = %path.display(), tests = suite.tests.len(), "suite loaded");
    let overrides = Overrides {
        wasm_path: cli.plugin.clone(),
        config_path: cli.config.clone(),
        log_path: cli.logfile.clone(),
        log_level: cli.loglevel,
        num_additional_streams: cli.num_additional_streams,
        additional_stream_advance_rate: cli.additional_stream_advance_rate,
    };
    apply_overrides(&mut suite, &overrides);
    if suite.env.log_level == ConfigLogLevel::Trace {
        println!("TRACE from runner: final config:\n{suite:#?}");
    }

    let mut ok = true;
    if cli.test {
        let report = run_suite(&suite);
        for test in &report.reports {
            if test.passed() {
                println!("[ PASS ] {}", test.name);
            } else {
                println!("[ FAIL ] {}", test.name);
                for failure in &test.failures {
                    println!("    {failure}");
                }
            }
        }
        let total = report.reports.len();
        println!("{}/{total} tests passed", total - report.failed_count());
        ok = report.passed();
    } else {
        println!("Skipping tests due to --test=false");
    }

    if suite.tests.iter().any(|test| test.benchmark) {
        if cli.bench {
            match bench::run_benchmarks(&suite) {
                Ok(stats) => {
                    for stat in &stats {
                        println!("{stat}");
                    }
                }
                Err(err) => {
                    eprintln!("benchmark run failed: {err}");
                    ok = false;
                }
            }
        } else {
            println!("Skipping benchmarks due to --bench=false");
        }
    }

    i32::from(!ok)
}
