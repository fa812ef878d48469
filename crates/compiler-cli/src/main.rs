use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use compiler_cli::{discovery, options::CompileOptions, pipeline};
use compiler_core::Severity;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// `optic`: whole-program optimizing compiler core driver.
#[derive(Parser, Debug)]
#[command(name = "optic", about = "optic: whole-program optimization over surface-IR fixtures", version)]
struct Cli {
    /// Individual surface-IR JSON files to compile (repeatable).
    #[arg(short = 'f', long = "file", value_name = "FILE", num_args = 1.., action = clap::ArgAction::Append)]
    files: Vec<String>,

    /// Directories to scan recursively for surface-IR JSON files (repeatable).
    #[arg(short = 'd', long = "dir", value_name = "DIR", num_args = 1.., action = clap::ArgAction::Append)]
    dirs: Vec<String>,

    #[command(flatten)]
    compile: CompileOptions,
}

fn run(cli: Cli) -> Result<()> {
    let total_start = Instant::now();

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    if cli.files.is_empty() && cli.dirs.is_empty() {
        bail!("no input given; pass --file or --dir");
    }

    let files = discovery::discover_files(&cli.files, &cli.dirs).context("discovering surface-IR input")?;
    let compiler_options = cli
        .compile
        .to_compiler_options()
        .map_err(|e| anyhow::anyhow!("invalid compiler options: {e}"))?;

    let report = pipeline::process_files(&files, compiler_options).context("running the pass pipeline")?;

    for diagnostic in report.cc.diagnostics.all() {
        let level = match diagnostic.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        eprintln!("{level}: {}{}", diagnostic.code, format_args(&diagnostic.args));
    }

    tracing::info!(
        errors = report.errors,
        warnings = report.warnings,
        "compilation finished"
    );
    eprintln!(
        "Total time: {:.2}s ({} errors, {} warnings)",
        total_start.elapsed().as_secs_f64(),
        report.errors,
        report.warnings
    );

    if report.errors > 0 {
        bail!("compilation produced {} error-severity diagnostic(s); output is not valid", report.errors);
    }

    Ok(())
}

fn format_args(args: &[String]) -> String {
    if args.is_empty() {
        String::new()
    } else {
        format!(" ({})", args.join(", "))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}
