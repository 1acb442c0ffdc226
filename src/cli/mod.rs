use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use duration_string::DurationString;

#[derive(Parser)]
#[command(name = "converge")]
#[command(about = "Wait for cloud resources to reach a steady state", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML file with wait and retry settings
    #[arg(long, global = true, env = "CONVERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides the region from the config file and the AWS environment
    #[arg(long, global = true)]
    pub region: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll resources until they reach CONDITION
    Wait {
        /// Resource kind, e.g. acm-certificate or s3-bucket
        kind: String,

        /// Condition to wait for, e.g. issued or deleted
        condition: String,

        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        #[arg(long, value_parser = parse_duration)]
        interval: Option<Duration>,
    },

    /// Delete resources and wait until they are gone
    Delete {
        kind: String,

        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,
    },

    /// Print the effective configuration
    Config,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    DurationString::from_string(s.to_string())
        .map(Into::into)
        .map_err(|e| e.to_string())
}
