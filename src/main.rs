//! `hicmat`: a small CLI around the Cool/MCool/SCool and HIC contact
//! matrix engine, for smoke-testing files from the shell.
//!
//! Usage: hicmat <COMMAND> [OPTIONS]

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use hicmat::config::CacheConfig;
use hicmat::cool::{CoolFile, Query};

#[derive(Parser)]
#[command(name = "hicmat")]
#[command(author = "Manish Kumar Bobbili")]
#[command(version)]
#[command(about = "Inspect and validate Cool/MCool/SCool and HIC contact matrix files", long_about = None)]
struct Cli {
    /// Emit debug-level tracing to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a Cool or HIC file and report structural problems
    Validate {
        /// Path to a .cool/.mcool/.scool or .hic file
        path: PathBuf,

        /// Treat the path as a HIC file regardless of its extension
        #[arg(long)]
        hic: bool,
    },

    /// Print the chromosomes stored in a Cool or HIC file
    DumpChroms {
        /// Path to a .cool or .hic file
        path: PathBuf,

        /// Treat the path as a HIC file regardless of its extension
        #[arg(long)]
        hic: bool,
    },

    /// Print every pixel in a Cool file as "bin1 bin2 count"
    DumpPixels {
        /// Path to a .cool file
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "hicmat=debug" } else { "hicmat=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate { path, hic } => run_validate(path, hic),
        Commands::DumpChroms { path, hic } => run_dump_chroms(path, hic),
        Commands::DumpPixels { path } => run_dump_pixels(path),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn looks_like_hic(path: &PathBuf, hic_flag: bool) -> bool {
    hic_flag || path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("hic"))
}

fn run_validate(path: PathBuf, hic_flag: bool) -> Result<(), String> {
    if looks_like_hic(&path, hic_flag) {
        let report = hicmat::hic::validate(&path);
        for message in &report.messages {
            eprintln!("{message}");
        }
        if report.is_valid {
            println!("OK: {} is a valid HIC file", path.display());
            Ok(())
        } else {
            Err(format!("{} failed validation", path.display()))
        }
    } else {
        let file = CoolFile::open_read_only(path.to_string_lossy().as_ref(), CacheConfig::default(), false)
            .map_err(|e| e.to_string())?;
        match hicmat::cool::validate::validate_structure(&file) {
            Ok(()) => {
                println!("OK: {} is a structurally valid Cool file", path.display());
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

fn run_dump_chroms(path: PathBuf, hic_flag: bool) -> Result<(), String> {
    if looks_like_hic(&path, hic_flag) {
        let file = hicmat::hic::HicFile::open_read_only(&path).map_err(|e| e.to_string())?;
        for chrom in file.reference().iter() {
            println!("{}\t{}", chrom.name(), chrom.size());
        }
    } else {
        let file = CoolFile::open_read_only(path.to_string_lossy().as_ref(), CacheConfig::default(), false)
            .map_err(|e| e.to_string())?;
        for chrom in file.reference().iter() {
            println!("{}\t{}", chrom.name(), chrom.size());
        }
    }
    Ok(())
}

fn run_dump_pixels(path: PathBuf) -> Result<(), String> {
    let file = CoolFile::open_read_only(path.to_string_lossy().as_ref(), CacheConfig::default(), false)
        .map_err(|e| e.to_string())?;
    let query = Query::whole_matrix(file.bin_table());
    let pixels = file.fetch(Some(query), None).map_err(|e| e.to_string())?;
    for pixel in pixels {
        println!("{}\t{}\t{}", pixel.bin1_id, pixel.bin2_id, pixel.count);
    }
    Ok(())
}
