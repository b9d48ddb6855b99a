//! `silo snapshot expire` - remove old snapshots according to policy.

use clap::Args;

use silo_snapshot::{expire, ExpireRequest, ExpireSelection};

use crate::Config;

/// Whether to actually delete snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DeleteMode {
    /// Delete the candidates.
    Yes,
    /// Dry run: report what would be deleted.
    #[default]
    No,
}

/// Arguments for `silo snapshot expire`.
#[derive(Debug, Args)]
pub struct ExpireArgs {
    /// Expire snapshots for the given paths only.
    #[arg(value_name = "path")]
    pub paths: Vec<String>,

    /// Expire all snapshots.
    #[arg(long)]
    pub all: bool,

    /// Expire snapshots from a given host.
    #[arg(long)]
    pub host: Option<String>,

    /// Expire snapshots from a given user.
    #[arg(long)]
    pub user: Option<String>,

    /// Whether to actually delete snapshots.
    #[arg(long, value_enum, default_value = "no")]
    pub delete: DeleteMode,
}

/// Runs the expire command.
///
/// # Errors
///
/// Fails on invalid selections, unparseable source specs, and storage
/// errors; the process exits non-zero.
pub async fn execute(args: ExpireArgs, config: &Config) -> anyhow::Result<()> {
    if !args.all && args.paths.is_empty() {
        anyhow::bail!("must specify paths to expire or --all");
    }

    let selection = if args.all {
        eprintln!("Scanning all active snapshots...");
        ExpireSelection::All
    } else {
        ExpireSelection::Paths(args.paths)
    };

    let (policies, manifests) = crate::commands::open_stores(config)?;

    let summary = expire(
        &policies,
        &manifests,
        &ExpireRequest {
            selection,
            host: args.host,
            user: args.user,
            delete: args.delete == DeleteMode::Yes,
            default_host: config.hostname.clone(),
            default_user: config.username.clone(),
        },
    )
    .await?;

    for entry in &summary.sources {
        if entry.policy_missing {
            eprintln!("Skipped {} (no effective policy).", entry.source);
        } else if entry.candidates.is_empty() {
            eprintln!("Nothing to delete for {}.", entry.source);
        } else {
            println!(
                "Would delete {}/{} snapshots for {}",
                entry.candidates.len(),
                entry.total,
                entry.source
            );
        }
    }

    eprint!("\n*** ");

    let candidates = summary.candidate_total();
    if candidates == 0 {
        eprintln!("Nothing to delete.");
    } else if args.delete == DeleteMode::Yes {
        eprintln!("Deleted {} of {candidates} snapshot(s).", summary.deleted_total());
    } else {
        eprintln!("{candidates} snapshot(s) would be deleted. Pass --delete=yes to do it.");
    }

    if !summary.errors.is_empty() {
        for error in &summary.errors {
            eprintln!("error: {error}");
        }
        anyhow::bail!("expiration finished with {} error(s)", summary.errors.len());
    }

    Ok(())
}
