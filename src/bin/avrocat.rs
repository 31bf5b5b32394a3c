//! avrocat - print the records of an Avro object container file
//!
//! Opens the file, decodes every record with the embedded writer schema,
//! and prints one line per record to stdout.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use avrocat::{ContainerFileReader, OutputFormat, ReaderConfig, RecordWriter};

#[derive(Parser, Debug)]
#[command(name = "avrocat")]
#[command(about = "Print the records of an Avro object container file")]
#[command(version)]
struct Cli {
    /// Input .avro file
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Print a row of field names first (tsv only)
    #[arg(long)]
    header: bool,

    /// Stop after this many records
    #[arg(short = 'n', long)]
    limit: Option<u64>,

    /// Print the writer schema as JSON and exit
    #[arg(long, conflicts_with = "metadata")]
    schema: bool,

    /// Print the header metadata as key<TAB>value lines and exit
    #[arg(long)]
    metadata: bool,

    /// Reject schemas with invalid names or unions instead of warning
    #[arg(long)]
    strict_schema: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Suppress all log output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    // Usage errors exit with status 2 from here
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_broken_pipe(&e) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Initialize logging to stderr. `RUST_LOG` overrides the verbosity flags.
fn init_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = ReaderConfig::new().with_strict_schema(cli.strict_schema);
    let mut reader = ContainerFileReader::open_with_config(&cli.input, config)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;

    let stdout = io::stdout().lock();
    let mut out = BufWriter::new(stdout);

    if cli.schema {
        writeln!(out, "{}", reader.header().schema_json())?;
        out.flush()?;
        return Ok(());
    }

    if cli.metadata {
        for (key, value) in reader.header().sorted_metadata() {
            writeln!(out, "{}\t{}", key, String::from_utf8_lossy(value))?;
        }
        out.flush()?;
        return Ok(());
    }

    let mut writer = RecordWriter::new(out, cli.format);
    if cli.header {
        writer = writer.with_header(reader.schema());
    }

    let limit = cli.limit.unwrap_or(u64::MAX);
    let mut printed: u64 = 0;
    while printed < limit {
        let Some(record) = reader.next() else {
            break;
        };
        let record = record.with_context(|| {
            format!(
                "Failed reading {} after {} records",
                cli.input.display(),
                printed
            )
        })?;
        writer.write_record(&record)?;
        printed += 1;
    }

    writer.finish()?;
    debug!(records = printed, blocks = reader.blocks_read(), "Done");
    reader.close();
    Ok(())
}

/// Downstream closed stdout, e.g. piping into `head`.
fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io| io.kind() == io::ErrorKind::BrokenPipe)
    })
}
