//! Command line relay client.
//!
//! Connects to the relay given on the command line, prints every inbound
//! message to stdout and sends each line read from stdin.

mod cli;

use std::{error::Error, time::Duration};

use clap::Parser;
use cli::{Cli, FramingArg};
use relaylink::{
    ClientConfig,
    DeviceContext,
    Framing,
    RelayClient,
    client::RetryPolicy,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

impl From<FramingArg> for Framing {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Length => Framing::LengthPrefixed,
            FramingArg::Line => Framing::Delimited(b'\n'),
            FramingArg::Burst => Framing::Burst,
        }
    }
}

fn config_from(cli: &Cli) -> ClientConfig {
    let mut device = DeviceContext::default().listen_port(cli.listen_port);
    if let Some(ip) = cli.local_ip {
        device = device.local_ip(ip);
    }
    ClientConfig::new(cli.host.clone(), cli.port)
        .framing(cli.framing.into())
        .retry(RetryPolicy {
            attempts: cli.attempts,
            backoff: Duration::from_millis(cli.backoff_ms),
        })
        .device(device)
}

#[cfg(feature = "metrics")]
fn install_metrics(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "serving metrics");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if cli.metrics_addr.is_some() {
        warn!("built without the metrics feature, ignoring --metrics-addr");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    install_metrics(&cli)?;

    let client = RelayClient::new(config_from(&cli), |text: String| println!("{text}"));
    client.init();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Err(e) = client.send_message(line).await {
                        warn!(error = %e, "message not sent");
                    }
                }
                None => break,
            },
        }
    }
    client.destroy();
    Ok(())
}
