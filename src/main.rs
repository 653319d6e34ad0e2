//! upak CLI - Command-line tool for Unreal Engine PAK archives.
//!
//! This is the main entry point for the upak command-line application.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use upak::{Error as PakError, MappedPakArchive, PakArchive};

/// upak - Unreal Engine PAK archive tool
#[derive(Parser)]
#[command(name = "upak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List contents of a PAK archive
    List {
        /// Path to the PAK file
        #[arg(short, long, env = "UPAK_INPUT")]
        pak: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Extract files from a PAK archive
    Extract {
        /// Path to the PAK file
        #[arg(short, long, env = "UPAK_INPUT")]
        pak: PathBuf,

        /// Output directory
        #[arg(short, long, env = "UPAK_OUTPUT")]
        output: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Write a single entry to stdout
    Cat {
        /// Path to the PAK file
        #[arg(short, long, env = "UPAK_INPUT")]
        pak: PathBuf,

        /// Entry name as stored in the index
        name: String,

        /// Decode the entry as Latin-1 text
        #[arg(short, long)]
        text: bool,
    },

    /// Show archive version, mount point and record count
    Info {
        /// Path to the PAK file
        #[arg(short, long, env = "UPAK_INPUT")]
        pak: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::List { pak, filter, detailed } => {
            cmd_list(&pak, filter.as_deref(), detailed)?;
        }
        Commands::Extract { pak, output, filter } => {
            cmd_extract(&pak, &output, filter.as_deref())?;
        }
        Commands::Cat { pak, name, text } => {
            cmd_cat(&pak, &name, text)?;
        }
        Commands::Info { pak } => {
            cmd_info(&pak)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_archive(path: &Path) -> Result<MappedPakArchive> {
    PakArchive::open(path).with_context(|| format!("Failed to open PAK archive {}", path.display()))
}

fn cmd_list(pak_path: &Path, filter: Option<&str>, detailed: bool) -> Result<()> {
    let filter = NameFilter::new(filter)?;
    let mut archive = open_archive(pak_path)?;

    let mut count = 0;
    if detailed {
        for entry in archive.entries().context("Failed to read PAK index")? {
            if !filter.matches(entry.name()) {
                continue;
            }

            let method = entry
                .compression_method()
                .map_or_else(|| format!("?{}", entry.compression_code()), |m| m.to_string());
            println!(
                "{:>12} {:>12} {:<12} {} {}",
                entry.compressed_size(),
                entry.decompressed_size(),
                method,
                if entry.is_encrypted() { "E" } else { " " },
                entry.name()
            );
            count += 1;
        }
    } else {
        for name in archive.list_names().context("Failed to read PAK index")? {
            if !filter.matches(name) {
                continue;
            }
            println!("{}", name);
            count += 1;
        }
    }

    println!("\nTotal: {} entries", count);

    Ok(())
}

fn cmd_extract(pak_path: &Path, output: &Path, filter: Option<&str>) -> Result<()> {
    let filter = NameFilter::new(filter)?;
    println!("Opening PAK archive: {}", pak_path.display());

    let start = Instant::now();
    let mut archive = open_archive(pak_path)?;

    let names: Vec<String> = archive
        .list_names()
        .context("Failed to read PAK index")?
        .iter()
        .filter(|name| filter.matches(name))
        .cloned()
        .collect();

    println!(
        "Indexed {} entries in {:?}",
        archive.record_count()?,
        start.elapsed()
    );
    println!("Extracting {} entries...", names.len());

    let pb = ProgressBar::new(names.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    fs::create_dir_all(output)?;

    let start = Instant::now();
    let mut extracted = 0;
    let mut skipped = 0;

    for name in &names {
        let entry = archive
            .entry(name)
            .with_context(|| format!("Failed to read record for {}", name))?;
        let output_path = output.join(entry.output_path());

        match archive.extract(name) {
            Ok(data) => {
                if let Some(parent) = output_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&output_path, data)
                    .with_context(|| format!("Failed to write {}", output_path.display()))?;
                debug!(name = %name, path = %output_path.display(), "extracted");
                extracted += 1;
            }
            // Per-entry failures do not abort the run.
            Err(e @ (PakError::UnsupportedCompression { .. } | PakError::PayloadDecode(_))) => {
                pb.suspend(|| warn!(name = %name, error = %e, "skipping entry"));
                skipped += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to extract {}", name)),
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!(
        "Extracted {} entries in {:?} ({} skipped)",
        extracted,
        start.elapsed(),
        skipped
    );

    Ok(())
}

fn cmd_cat(pak_path: &Path, name: &str, text: bool) -> Result<()> {
    let mut archive = open_archive(pak_path)?;

    let mut stdout = io::stdout().lock();
    if text {
        let contents = archive
            .extract_text(name)
            .with_context(|| format!("Failed to extract {}", name))?;
        stdout.write_all(contents.as_bytes())?;
    } else {
        let data = archive
            .extract(name)
            .with_context(|| format!("Failed to extract {}", name))?;
        stdout.write_all(&data)?;
    }
    stdout.flush()?;

    Ok(())
}

fn cmd_info(pak_path: &Path) -> Result<()> {
    let mut archive = open_archive(pak_path)?;

    println!("Archive:     {}", pak_path.display());
    println!("Version:     {}", archive.version().context("Failed to read PAK footer")?);
    println!("Mount point: {}", archive.mount_point()?);
    println!("Records:     {}", archive.record_count()?);

    Ok(())
}

/// Case-insensitive entry name filter.
///
/// Patterns containing glob metacharacters must match the whole name; plain
/// text matches anywhere in the name. Backslashes in names count as `/`.
enum NameFilter {
    All,
    Glob(Pattern),
    Substring(String),
}

impl NameFilter {
    fn new(pattern: Option<&str>) -> Result<Self> {
        let Some(pattern) = pattern else {
            return Ok(Self::All);
        };

        if pattern.contains(['*', '?', '[']) {
            let glob = Pattern::new(&pattern.replace('\\', "/"))
                .with_context(|| format!("Invalid filter pattern {}", pattern))?;
            Ok(Self::Glob(glob))
        } else {
            Ok(Self::Substring(pattern.to_lowercase().replace('\\', "/")))
        }
    }

    fn matches(&self, name: &str) -> bool {
        let name = name.replace('\\', "/");
        match self {
            Self::All => true,
            Self::Glob(pattern) => pattern.matches_with(&name, MATCH_OPTIONS),
            Self::Substring(text) => name.to_lowercase().contains(text.as_str()),
        }
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};
