// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `echo-entries`: inspect streams written by `echo-entry-codec`.
//!
//! `dump` lists every entry of a binary or JSON stream without knowing its
//! schema; `hex` prints a file in the binary codec's hex rendering.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use echo_entry_codec::{
    BinaryDataReader, DataReader, EntryListing, JsonDataReader, LoggingPolicy, NameBinder,
    RecordingDebugContext, SerializationContext, dump_entries,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "echo-entries",
    author,
    version,
    about = "Inspect echo-entry-codec binary and JSON streams"
)]
struct Cli {
    /// Log verbosity (-v warnings, -vv info, -vvv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Exit with an error when the codec logs any error
    #[arg(long, global = true)]
    strict: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every entry of a stream
    Dump {
        /// Input file
        file: PathBuf,
        /// Stream encoding; `auto` reads `.json` files as JSON and anything else as binary
        #[arg(long, value_enum, default_value_t = Format::Auto)]
        format: Format,
        /// Print only the entry counts
        #[arg(long)]
        summary: bool,
    },
    /// Print a file in the binary codec's hex rendering
    Hex {
        /// Input file
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Auto,
    Binary,
    Json,
}

impl Format {
    fn resolve(self, path: &Path) -> Self {
        match self {
            Self::Auto if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) => {
                Self::Json
            }
            Self::Auto => Self::Binary,
            explicit => explicit,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let recorder = Arc::new(RecordingDebugContext::new());
    let policy = if cli.verbose > 0 {
        LoggingPolicy::LogWarningsAndErrors
    } else {
        LoggingPolicy::LogErrors
    };
    let context = SerializationContext::new(NameBinder)
        .with_debug_context(recorder.clone())
        .with_logging_policy(policy);

    let mut out = io::stdout().lock();
    match cli.command {
        Command::Dump { file, format, summary } => {
            let bytes = read_input(&file)?;
            let format = format.resolve(&file);
            debug!(?format, len = bytes.len(), "dumping entries");
            let listing = match format {
                Format::Json => dump_entries(&mut JsonDataReader::from_slice(&bytes, context)),
                Format::Binary | Format::Auto => {
                    dump_entries(&mut BinaryDataReader::from_slice(&bytes, context))
                }
            };
            info!(stats = %listing.stats, "dump complete");
            write_listing(&mut out, &listing, summary).context("failed to write listing")?;
        }
        Command::Hex { file } => {
            let bytes = read_input(&file)?;
            let reader = BinaryDataReader::from_slice(&bytes, context);
            writeln!(out, "{}", reader.data_dump()).context("failed to write hex dump")?;
        }
    }

    let errors = recorder.errors();
    if cli.strict
        && let Some(first) = errors.first()
    {
        bail!("{} codec error(s) logged; first: {first}", errors.len());
    }
    Ok(())
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_listing(out: &mut impl Write, listing: &EntryListing, summary: bool) -> io::Result<()> {
    if !summary {
        out.write_all(listing.text.as_bytes())?;
    }
    writeln!(out, "{}", listing.stats)
}
