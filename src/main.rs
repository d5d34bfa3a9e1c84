//! disklayout - compute partition tables for operating-system images
//!
//! Reads a partitioning customization and prints the finalized table as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use disklayout::config::options::default_required_dir_sizes;
use disklayout::config::policy::{check_partitioning_policy, mountpoint_policies};
use disklayout::config::{BootMode, CustomPartitionTableOptions, PartitioningCustomization};
use disklayout::disk::layouts::print_table_summary;
use disklayout::disk::{
    base_template, new_custom_partition_table, new_partition_table, FsType, PartitionTable,
    PartitioningMode, TableType,
};
use disklayout::utils::datasize::parse_data_size;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "disklayout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a customization file (JSON or TOML)
    Validate {
        /// Path to customization file
        file: String,

        /// Also check mountpoints against the default allow-list
        #[arg(long)]
        policy: bool,
    },

    /// Build a partition table from a customization
    Generate {
        /// Path to customization file; only boot partitions and / without one
        #[arg(short, long)]
        customization: Option<String>,

        /// Boot mode: none, legacy, uefi or hybrid
        #[arg(short, long, default_value = "hybrid")]
        boot_mode: BootMode,

        /// Partition table type: gpt or dos
        #[arg(short, long)]
        table_type: Option<TableType>,

        /// Filesystem type for entries that do not name one
        #[arg(short = 'f', long, default_value = "xfs")]
        default_fs: FsType,

        /// Minimum image size (e.g. "10 GiB")
        #[arg(short, long)]
        size: Option<String>,

        /// Fail instead of growing when the image size is too small
        #[arg(long)]
        strict: bool,

        /// Seed for generated identifiers
        #[arg(long, env = "DISKLAYOUT_SEED")]
        seed: Option<u64>,

        /// Print a human-readable summary instead of JSON
        #[arg(long)]
        summary: bool,
    },

    /// Instantiate the built-in base template
    Template {
        /// Minimum image size (e.g. "10 GiB")
        #[arg(short, long)]
        size: Option<String>,

        /// Seed for generated identifiers
        #[arg(long, env = "DISKLAYOUT_SEED")]
        seed: Option<u64>,

        /// Print a human-readable summary instead of JSON
        #[arg(long)]
        summary: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Validate { file, policy } => cmd_validate(&file, policy)?,
        Commands::Generate {
            customization,
            boot_mode,
            table_type,
            default_fs,
            size,
            strict,
            seed,
            summary,
        } => {
            let mode = if strict {
                PartitioningMode::Strict
            } else {
                PartitioningMode::Grow
            };
            let options = CustomPartitionTableOptions {
                default_fs_type: Some(default_fs),
                boot_mode,
                table_type,
                required_min_sizes: default_required_dir_sizes(),
                mode,
            };
            cmd_generate(customization.as_deref(), &options, size.as_deref(), seed, summary)?;
        }
        Commands::Template { size, seed, summary } => {
            cmd_template(size.as_deref(), seed, summary)?;
        }
    }

    Ok(())
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => {
            info!("Using identifier seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    }
}

fn print_table(pt: &PartitionTable, summary: bool) -> Result<()> {
    if summary {
        print_table_summary(pt);
    } else {
        println!("{}", serde_json::to_string_pretty(pt)?);
    }
    Ok(())
}

fn cmd_validate(path: &str, policy: bool) -> Result<()> {
    let customization = PartitioningCustomization::from_file(path)
        .with_context(|| format!("failed to load {}", path))?;
    customization.validate()?;
    if policy {
        check_partitioning_policy(Some(&customization), &mountpoint_policies())?;
    }
    println!("✓ Customization is valid");
    Ok(())
}

fn cmd_generate(
    path: Option<&str>,
    options: &CustomPartitionTableOptions,
    size: Option<&str>,
    seed: Option<u64>,
    summary: bool,
) -> Result<()> {
    let mut customization = match path {
        Some(path) => {
            info!("Loading customization from {}", path);
            PartitioningCustomization::from_file(path)
                .with_context(|| format!("failed to load {}", path))?
        }
        None => PartitioningCustomization::default(),
    };
    if let Some(size) = size {
        customization.minsize = customization.minsize.max(parse_data_size(size)?);
    }

    let mut rng = rng_from_seed(seed);
    let pt = new_custom_partition_table(Some(&customization), options, &mut rng)?;
    print_table(&pt, summary)
}

fn cmd_template(size: Option<&str>, seed: Option<u64>, summary: bool) -> Result<()> {
    let image_size = size.map(parse_data_size).transpose()?.unwrap_or(0);
    let mut rng = rng_from_seed(seed);
    let pt = new_partition_table(
        &base_template(),
        &[],
        image_size,
        PartitioningMode::Grow,
        &default_required_dir_sizes(),
        &mut rng,
    )?;
    print_table(&pt, summary)
}
