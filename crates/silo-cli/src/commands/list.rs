//! `silo snapshot list` - list snapshots of files and directories.

use clap::Args;

use silo_snapshot::{list_snapshots, SnapshotListOptions};

use crate::units::bytes_string_base10;
use crate::Config;

/// Arguments for `silo snapshot list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// File or directory to show history of.
    #[arg(value_name = "source")]
    pub path: Option<String>,

    /// Include incomplete snapshots.
    #[arg(long, short = 'i')]
    pub incomplete: bool,

    /// Show raw byte counts instead of human-readable units.
    #[arg(long)]
    pub raw_sizes: bool,

    /// Include manifest item IDs.
    #[arg(long, short = 'm')]
    pub manifest_id: bool,

    /// Maximum number of results per source.
    #[arg(long, default_value_t = 1000)]
    pub max_results: usize,
}

/// Runs the list command.
///
/// # Errors
///
/// Fails on unparseable source specs and storage errors; the process
/// exits non-zero.
pub async fn execute(args: &ListArgs, config: &Config) -> anyhow::Result<()> {
    let (policies, manifests) = crate::commands::open_stores(config)?;

    let groups = list_snapshots(
        &policies,
        &manifests,
        args.path.as_deref(),
        &config.hostname,
        &config.username,
        &SnapshotListOptions {
            max_results: args.max_results,
            include_incomplete: args.incomplete,
        },
    )
    .await?;

    let mut separator = "";
    for group in &groups {
        print!("{separator}{}", group.source);
        if group.relative_path.is_empty() {
            println!();
        } else {
            println!(" (showing {})", group.relative_path);
        }
        separator = "\n";

        for manifest in &group.snapshots {
            let mut bits = Vec::new();

            if manifest.is_incomplete() {
                bits.push(format!("incomplete:{}", manifest.incomplete_reason));
            }

            if args.raw_sizes {
                bits.push(manifest.stats.total_file_size.to_string());
            } else {
                bits.push(bytes_string_base10(manifest.stats.total_file_size));
            }

            if args.manifest_id {
                bits.push(format!("manifest:{}", manifest.id));
            }

            if !manifest.retention_reasons.is_empty() {
                bits.push(format!("retention:{}", manifest.retention_reasons.join(",")));
            }

            println!(
                "  {} {} {}",
                manifest.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
                manifest.root_object_id,
                bits.join(" ")
            );
        }
    }

    Ok(())
}
