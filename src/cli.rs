//! Command line interface for the `relaylink` binary.
//!
//! Also compiled by the build script to render the man page, so it depends
//! on nothing but `clap`.

use std::net::{Ipv4Addr, SocketAddr};

use clap::{Parser, ValueEnum};

/// Wire framing selectable from the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FramingArg {
    /// Four-byte big-endian length prefix.
    #[default]
    Length,
    /// Newline-terminated messages.
    Line,
    /// One message per read burst, for legacy relays.
    Burst,
}

/// Command line arguments for the `relaylink` binary.
#[derive(Debug, Parser)]
#[command(
    name = "relaylink",
    version,
    about = "Connect to a relay, print inbound messages and send stdin lines",
    after_long_help = "Log verbosity follows RUST_LOG, for example RUST_LOG=relaylink=debug. \
                       Logs go to stderr so stdout carries only relay messages."
)]
pub struct Cli {
    /// Relay host name or IP address.
    #[arg(long, env = "RELAYLINK_HOST")]
    pub host: String,

    /// Relay TCP port.
    #[arg(short, long, env = "RELAYLINK_PORT")]
    pub port: u16,

    /// Local IPv4 address announced at registration.
    #[arg(long)]
    pub local_ip: Option<Ipv4Addr>,

    /// Port this device listens on, announced at registration.
    #[arg(long, default_value_t = 8080)]
    pub listen_port: u16,

    /// How messages are delimited on the wire.
    #[arg(long, value_enum, default_value_t)]
    pub framing: FramingArg,

    /// Number of connect attempts before giving up.
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,

    /// Milliseconds to wait between connect attempts.
    #[arg(long, default_value_t = 2000)]
    pub backoff_ms: u64,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}
