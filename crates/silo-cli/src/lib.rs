//! # silo-cli
//!
//! Command-line interface for the silo backup system.
//!
//! ## Commands
//!
//! - `silo snapshot list` - List snapshots of files and directories
//! - `silo snapshot expire` - Remove old snapshots according to
//!   retention policies
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `SILO_REPOSITORY` - Repository directory
//! - `SILO_HOSTNAME` - Hostname used when parsing source specs
//! - `SILO_USERNAME` - Username used when parsing source specs

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;
pub mod units;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// silo - snapshot-oriented content-addressed backups.
#[derive(Debug, Parser)]
#[command(name = "silo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Repository directory.
    #[arg(long, env = "SILO_REPOSITORY")]
    pub repository: PathBuf,

    /// Hostname used when parsing source specs.
    #[arg(long, env = "SILO_HOSTNAME")]
    pub hostname: Option<String>,

    /// Username used when parsing source specs.
    #[arg(long, env = "SILO_USERNAME")]
    pub username: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            repository: self.repository.clone(),
            hostname: self.hostname.clone().unwrap_or_else(default_hostname),
            username: self.username.clone().unwrap_or_else(default_username),
        }
    }
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn default_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Snapshot operations.
    Snapshot(SnapshotArgs),
}

/// `silo snapshot` subcommands.
#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// The snapshot operation.
    #[command(subcommand)]
    pub command: SnapshotCommands,
}

/// Snapshot operations.
#[derive(Debug, Subcommand)]
pub enum SnapshotCommands {
    /// List snapshots of files and directories.
    #[command(alias = "ls")]
    List(commands::list::ListArgs),
    /// Remove old snapshots according to defined expiration policies.
    Expire(commands::expire::ExpireArgs),
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository directory.
    pub repository: PathBuf,
    /// Hostname used when parsing source specs.
    pub hostname: String,
    /// Username used when parsing source specs.
    pub username: String,
}
