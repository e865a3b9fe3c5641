use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use czar_core::error::exit_code;
use czar_core::{BuildConfig, BuildMode, BuildReport, CzarError, build, clean};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding a log filter that overrides `-v`.
const LOG_ENV: &str = "CZAR_LOG";

/// Transpile a tree of .cz sources to C and build it
#[derive(Parser, Debug)]
#[command(name = "czar", version, about, long_about = None)]
struct Cli {
    #[arg(value_name = "ROOT", help = "Directory scanned recursively for .cz units")]
    root: PathBuf,

    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Path of the linked binary (defaults to a.out)"
    )]
    output: Option<PathBuf>,

    #[arg(long, help = "Stop after generating C sources and headers")]
    transpile_only: bool,

    #[arg(
        long,
        conflicts_with = "transpile_only",
        help = "Remove generated .c/.h/.o files and the output binary"
    )]
    clean: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let config = BuildConfig::from_env(&cli.root, cli.output);
    debug!(?config, "resolved configuration");

    if cli.clean {
        let removed = clean(&config)?;
        println!("removed {} artifact(s)", removed.len());
        return Ok(());
    }

    let mode = if cli.transpile_only {
        BuildMode::TranspileOnly
    } else {
        BuildMode::Full
    };
    let report = build(config, mode)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &BuildReport) {
    for (unit, module) in &report.unresolved_imports {
        eprintln!(
            "warning: {}: import \"{module}\" matched no generated headers",
            unit.display()
        );
    }
    for warning in &report.warnings {
        eprintln!("warning: {}:\n{}", warning.unit.display(), warning.message.trim_end());
    }
    match &report.output {
        Some(output) => println!(
            "built {} from {} unit(s)",
            output.display(),
            report.units.len()
        ),
        None => println!("transpiled {} unit(s)", report.units.len()),
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    let code = err
        .downcast_ref::<CzarError>()
        .map_or(exit_code::OTHER, CzarError::exit_code);
    u8::try_from(code).unwrap_or(1)
}
