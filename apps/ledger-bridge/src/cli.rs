//! Command-line interface.
//!
//! Every job subcommand takes its defaults from the `[jobs]` config section;
//! flags given here override them for one run.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ledger_sync::{ImportOptions, JobSettings, PullOptions, PushOptions};

#[derive(Debug, Parser)]
#[command(name = "ledger-bridge", version, about = "Contact ledger bridge between the ERP and the messaging platform")]
pub struct Cli {
    /// Config file (defaults to the platform config dir's bridge.toml)
    #[arg(long, global = true, env = "LEDGER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pull ERP contacts into the ledger
    ErpPull {
        #[arg(long)]
        batch_size: Option<u32>,
        /// Stop after this many rows (0 = unlimited)
        #[arg(long)]
        max_total: Option<u32>,
    },

    /// Push pending ledger rows to the messaging platform
    MessagingPush {
        #[arg(long)]
        limit: Option<u32>,
        /// Also retry rows in error
        #[arg(long)]
        retry_errors: bool,
    },

    /// Import messaging contacts missing from the ledger
    MessagingImport {
        #[arg(long)]
        page_size: Option<u32>,
        /// Pages to read (0 = until the listing ends)
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Show ledger counts per sync status
    Status,

    /// Serve the HTTP search API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Command {
    pub fn pull_options(jobs: &JobSettings, batch_size: Option<u32>, max_total: Option<u32>) -> PullOptions {
        PullOptions {
            batch_size: batch_size.unwrap_or(jobs.erp_pull_batch_size),
            max_total: max_total.unwrap_or(jobs.erp_pull_max_total),
        }
    }

    pub fn push_options(jobs: &JobSettings, limit: Option<u32>, retry_errors: bool) -> PushOptions {
        PushOptions {
            limit: limit.unwrap_or(jobs.push_limit),
            retry_errors: retry_errors || jobs.push_retry_errors,
            fallback_name: jobs.fallback_name.clone(),
        }
    }

    pub fn import_options(jobs: &JobSettings, page_size: Option<u32>, max_pages: Option<u32>) -> ImportOptions {
        ImportOptions {
            page_size: page_size.unwrap_or(jobs.import_page_size),
            max_pages: max_pages.unwrap_or(jobs.import_max_pages),
            fallback_name: jobs.fallback_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_job_settings() {
        let cli = Cli::parse_from(["ledger-bridge", "erp-pull", "--batch-size", "50"]);
        let Command::ErpPull { batch_size, max_total } = cli.command else {
            panic!("expected erp-pull");
        };

        let options = Command::pull_options(&JobSettings::default(), batch_size, max_total);
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.max_total, 0);
    }

    #[test]
    fn test_push_and_import_defaults() {
        let jobs = JobSettings::default();

        let push = Command::push_options(&jobs, None, false);
        assert_eq!(push.limit, 150);
        assert!(!push.retry_errors);
        assert_eq!(push.fallback_name, "Sin nombre");

        let import = Command::import_options(&jobs, Some(20), Some(0));
        assert_eq!(import.page_size, 20);
        assert_eq!(import.max_pages, 0);
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["ledger-bridge", "status", "--config", "/tmp/bridge.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/bridge.toml")));
        assert!(matches!(cli.command, Command::Status));
    }
}
