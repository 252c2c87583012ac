//! Command-line argument definitions.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;
use oftrace_core::{EndpointFilter, StreamConfig, OFP_TCP_PORT};

use super::OutputFormat;

/// Print the OpenFlow messages exchanged in a packet capture.
#[derive(Parser, Debug)]
#[command(name = "oftrace")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Capture file (pcap, pcapng, optionally gzipped); `-` reads stdin
    #[arg(value_name = "FILE", default_value = "-")]
    pub file: PathBuf,

    /// Only follow connections to or from this controller address
    #[arg(short = 'c', long = "controller", value_name = "IP")]
    pub controller: Option<Ipv4Addr>,

    /// Controller TCP port
    #[arg(short = 'p', long = "port", default_value_t = OFP_TCP_PORT)]
    pub port: u16,

    /// Follow TCP connections on any port
    #[arg(long = "any-port")]
    pub any_port: bool,

    /// Output format for stdout
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Show how far through the capture we are
    #[arg(long = "progress")]
    pub progress: bool,

    /// Dump per-session backlog to stderr when done
    #[arg(long = "backlog")]
    pub backlog: bool,

    /// Queued fragments per session before skipping unframeable data
    #[arg(long = "max-backlog", default_value_t = 64, value_name = "FRAGMENTS")]
    pub max_backlog: usize,

    /// Largest OpenFlow message length accepted as valid
    #[arg(long = "max-message-len", default_value_t = 8192, value_name = "BYTES")]
    pub max_message_len: usize,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Whether the capture comes from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.file.as_os_str() == "-"
    }

    pub fn filter(&self) -> EndpointFilter {
        EndpointFilter {
            addr: self.controller,
            port: (!self.any_port).then_some(self.port),
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            max_backlog: self.max_backlog,
            max_message_len: self.max_message_len,
            ..StreamConfig::default()
        }
    }
}
