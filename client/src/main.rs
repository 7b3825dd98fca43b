mod game;
mod network;

use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name sent with the connection request
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Mark ready as soon as connected
    #[arg(long)]
    auto_ready: bool,

    /// Steer toward the next checkpoint while racing
    #[arg(long)]
    autopilot: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    if args.autopilot {
        info!("Autopilot enabled");
    }

    let options = network::ClientOptions {
        name: args.name,
        fake_ping_ms: args.fake_ping,
        auto_ready: args.auto_ready,
        autopilot: args.autopilot,
    };
    let mut client = network::Client::new(&args.server, options).await?;

    client.run().await?;

    Ok(())
}
