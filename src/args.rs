use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::analysis::DEFAULT_LOG_PATH;
use crate::query::QueryMode;

#[derive(Parser, Debug)]
#[command(
    name = "dnscl",
    about = "Analyze BIND DNS query data from syslog file input",
    version,
    long_about = None
)]
pub struct Args {
    /// Path to the syslog file to analyze
    #[arg(short, long, global = true, default_value = DEFAULT_LOG_PATH)]
    pub file: PathBuf,

    /// Print the report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Omit the summary and query time lines
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Number of top ranked entries to display
    #[arg(long, global = true)]
    pub top: Option<usize>,

    /// Only analyze the last N lines of the log
    #[arg(short = 'n', long = "lines", global = true)]
    pub lines: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Domains queried by an ip address
    Ip {
        /// IP address to search; all clients when omitted
        ip: Option<String>,

        /// Only count domains matching this pattern
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// IP addresses that queried a domain
    Domain {
        /// Domain pattern to search (case-insensitive); all domains when omitted
        domain: Option<String>,

        /// Only count queries from this ip address
        #[arg(short, long)]
        ip: Option<String>,
    },

    /// RPZ names hit by a client, or clients that hit RPZ names
    Rpz {
        /// RPZ names hit by this ip address
        #[arg(short, long, conflicts_with = "domain")]
        ip: Option<String>,

        /// Clients whose queries hit RPZ names matching this pattern
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Record types queried
    Type {
        /// Domains queried with this record type
        #[arg(short = 't', long = "type", conflicts_with_all = ["ip", "domain"])]
        record_type: Option<String>,

        /// Record types queried by this ip address
        #[arg(short, long, conflicts_with = "domain")]
        ip: Option<String>,

        /// Record types queried for domains matching this pattern
        #[arg(short, long)]
        domain: Option<String>,
    },
}

impl Command {
    pub fn to_mode(&self) -> QueryMode {
        match self.clone() {
            Command::Ip { ip, domain } => QueryMode::ByIp {
                ip: ip.unwrap_or_default(),
                domain,
            },
            Command::Domain { domain, ip } => QueryMode::ByDomain {
                domain: domain.unwrap_or_default(),
                ip,
            },
            Command::Rpz {
                domain: Some(domain),
                ..
            } => QueryMode::RpzByDomain { domain },
            Command::Rpz { ip, .. } => QueryMode::RpzByIp {
                ip: ip.unwrap_or_default(),
            },
            Command::Type {
                record_type: Some(record_type),
                ..
            } => QueryMode::ByRecordType { record_type },
            Command::Type { ip: Some(ip), .. } => QueryMode::RecordTypeByIp { ip },
            Command::Type { domain, .. } => QueryMode::RecordTypeByDomain {
                domain: domain.unwrap_or_default(),
            },
        }
    }
}
