//! astra-server binary.
//!
//! Usage: `astra-server [tcp_port] [udp_port] [--network]`
//!
//! `--network` binds 0.0.0.0 instead of loopback. The environment variables
//! `ASTRA_SERVER_PORT_TCP` and `ASTRA_SERVER_PORT_UDP` override the compiled
//! defaults; explicit CLI ports override both. SIGINT/SIGTERM trigger a
//! graceful shutdown.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::error;

use astra_server::config;
use astra_server::server::{GameServer, ServerOptions};

#[derive(Debug, Parser)]
#[command(
    name = "astra-server",
    about = "Authoritative game server (scrolling shooter + cell arena)"
)]
struct Cli {
    /// TCP control port.
    tcp_port: Option<u16>,
    /// UDP data port.
    udp_port: Option<u16>,
    /// Bind on 0.0.0.0 instead of 127.0.0.1.
    #[arg(long)]
    network: bool,
    /// Directory holding wave/level JSON files.
    #[arg(long, default_value = "assets")]
    assets: PathBuf,
}

fn env_port(var: &str) -> Option<u16> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // -h/--help exits 0; anything malformed exits 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) =>
        {
            print!("{err}");
            std::process::exit(0);
        }
        Err(err) => {
            eprint!("{err}");
            std::process::exit(1);
        }
    };

    let options = ServerOptions {
        tcp_port: cli
            .tcp_port
            .or_else(|| env_port("ASTRA_SERVER_PORT_TCP"))
            .unwrap_or(config::DEFAULT_TCP_PORT),
        udp_port: cli
            .udp_port
            .or_else(|| env_port("ASTRA_SERVER_PORT_UDP"))
            .unwrap_or(config::DEFAULT_UDP_PORT),
        public: cli.network,
        assets_dir: cli.assets,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&shutdown)) {
            error!(%err, signal, "failed to register signal handler");
            std::process::exit(1);
        }
    }

    let server = match GameServer::start(options, shutdown) {
        Ok(server) => server,
        Err(err) => {
            error!("startup failed: {err:#}");
            std::process::exit(1);
        }
    };
    if let Err(err) = server.run() {
        error!("server error: {err:#}");
        std::process::exit(1);
    }
}
