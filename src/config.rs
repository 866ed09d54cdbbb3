//! Command-line and environment configuration

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::controller::RequeueConfig;
use crate::Error;

/// Converges VolumeGroupSnapshots into per-volume CSI VolumeSnapshots
#[derive(Parser, Debug)]
#[command(name = "volumegroup-controller", version, about, long_about = None)]
pub struct Cli {
    /// Stdout log format
    #[arg(long, value_enum, env = "VOLUMEGROUP_LOG_FORMAT", default_value_t = LogFormat::Json, global = true)]
    pub log_format: LogFormat,

    /// Controller settings
    #[command(flatten)]
    pub controller: ControllerArgs,

    /// Subcommand, `run` when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level subcommands
#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run both controllers (default)
    Run,
    /// Print the CRDs this controller owns as YAML and exit
    Crd,
}

impl Cli {
    /// Subcommand to execute, `run` when none was given
    pub fn resolved_command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

/// Stdout log format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines
    Text,
}

/// Settings for `run`
#[derive(Args, Clone, Debug)]
pub struct ControllerArgs {
    /// Restrict watches to one namespace; all namespaces when unset
    #[arg(long, env = "VOLUMEGROUP_NAMESPACE")]
    pub namespace: Option<String>,

    /// Requeue after progress and the first not-ready poll
    #[arg(long, env = "VOLUMEGROUP_POLL_INTERVAL_SECS", default_value_t = 5)]
    pub poll_interval_secs: u64,

    /// Upper bound for repeated not-ready polls
    #[arg(long, env = "VOLUMEGROUP_MAX_POLL_INTERVAL_SECS", default_value_t = 60)]
    pub max_poll_interval_secs: u64,

    /// First requeue after a failed pass
    #[arg(long, env = "VOLUMEGROUP_ERROR_BACKOFF_SECS", default_value_t = 5)]
    pub error_backoff_secs: u64,

    /// Upper bound for the error backoff
    #[arg(long, env = "VOLUMEGROUP_MAX_ERROR_BACKOFF_SECS", default_value_t = 300)]
    pub max_error_backoff_secs: u64,

    /// Disable requeue jitter
    #[arg(long, env = "VOLUMEGROUP_NO_JITTER")]
    pub no_jitter: bool,

    /// Server-side apply the owned CRDs on startup
    #[arg(long, env = "VOLUMEGROUP_INSTALL_CRDS")]
    pub install_crds: bool,
}

impl Default for ControllerArgs {
    fn default() -> Self {
        Self {
            namespace: None,
            poll_interval_secs: 5,
            max_poll_interval_secs: 60,
            error_backoff_secs: 5,
            max_error_backoff_secs: 300,
            no_jitter: false,
            install_crds: false,
        }
    }
}

impl ControllerArgs {
    /// Validate intervals and build the requeue policy
    pub fn requeue_config(&self) -> Result<RequeueConfig, Error> {
        if self.poll_interval_secs == 0 || self.error_backoff_secs == 0 {
            return Err(Error::config("requeue intervals must be at least one second"));
        }
        if self.max_poll_interval_secs < self.poll_interval_secs {
            return Err(Error::config(format!(
                "max poll interval {}s is below poll interval {}s",
                self.max_poll_interval_secs, self.poll_interval_secs
            )));
        }
        if self.max_error_backoff_secs < self.error_backoff_secs {
            return Err(Error::config(format!(
                "max error backoff {}s is below error backoff {}s",
                self.max_error_backoff_secs, self.error_backoff_secs
            )));
        }

        Ok(RequeueConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_poll_interval: Duration::from_secs(self.max_poll_interval_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            max_error_backoff: Duration::from_secs(self.max_error_backoff_secs),
            jitter: !self.no_jitter,
        })
    }
}
