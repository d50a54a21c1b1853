use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::Level;

use crate::config::Config;

pub mod client;
pub mod config;
pub mod defaults;
pub mod llrp;
pub mod manager;
pub mod network;
pub mod objects;
pub mod server;
pub mod simulator;

/// A mock LLRP-based logical reader emulator for RFID tags.
#[derive(Parser)]
#[command(name = "llrpmock", version)]
#[command(about = "A mock LLRP-based logical reader emulator for RFID tags.")]
struct Cli {
    /// Enable debug mode.
    #[arg(short = 'v', long, global = true)]
    debug: bool,

    /// LLRP listening address.
    #[arg(short = 'a', long, global = true, default_value = defaults::DEFAULT_LISTEN_IP)]
    ip: IpAddr,

    /// LLRP listening port.
    #[arg(short = 'p', long, global = true, default_value_t = defaults::DEFAULT_LLRP_PORT)]
    port: u16,

    /// The maximum size of an LLRP PDU.
    #[arg(short = 'm', long, global = true, default_value_t = defaults::DEFAULT_MAX_PDU)]
    pdu: usize,

    /// The interval of RO_ACCESS_REPORT emission in milliseconds.
    #[arg(short = 'i', long = "reportInterval", global = true, default_value_t = defaults::DEFAULT_REPORT_INTERVAL_MS)]
    report_interval: u64,

    /// LLRP keepalive interval in seconds, 0 to disable.
    #[arg(short = 'k', long, global = true, default_value_t = defaults::DEFAULT_KEEPALIVE_SECONDS)]
    keepalive: u64,

    /// The initial messageID to start from.
    #[arg(long = "initialMessageID", global = true, default_value_t = defaults::DEFAULT_INITIAL_MESSAGE_ID)]
    initial_message_id: u32,

    /// The initial keepaliveID to start from.
    #[arg(long = "initialKeepaliveID", global = true, default_value_t = defaults::DEFAULT_INITIAL_KEEPALIVE_ID)]
    initial_keepalive_id: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as an LLRP tag stream server.
    Server {
        /// The port for the API endpoint.
        #[arg(long = "apiPort", default_value_t = defaults::DEFAULT_API_PORT)]
        api_port: u16,

        /// The file containing tag data.
        #[arg(short = 'f', long, default_value = defaults::DEFAULT_TAG_FILE)]
        file: String,
    },
    /// Run as an LLRP client; connect to an LLRP server and receive events.
    Client,
    /// Run in the simulator mode.
    Simulate {
        /// The directory containing tags for each event cycle.
        simulation_dir: PathBuf,
    },
}

fn main() {
    let _ = dotenv();
    let cli = Cli::parse();
    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let config = Arc::new(Config {
        ip: cli.ip,
        port: cli.port,
        max_pdu: cli.pdu,
        report_interval_ms: cli.report_interval,
        keepalive_seconds: cli.keepalive,
        initial_message_id: cli.initial_message_id,
        initial_keepalive_id: cli.initial_keepalive_id,
    });

    let code = match cli.command {
        Commands::Server { api_port, file } => server::run(config, api_port, file),
        Commands::Client => client::run(&config),
        Commands::Simulate { simulation_dir } => simulator::run(config, &simulation_dir),
    };
    process::exit(code);
}
