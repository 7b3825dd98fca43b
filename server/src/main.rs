mod ai;
mod client_manager;
mod config;
mod network;
mod session;
mod track;
mod world;

use clap::Parser;
use config::SessionConfig;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = shared::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Maximum number of remote clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Number of AI racers
    #[arg(long, default_value = "0")]
    ai_racers: usize,

    /// Number of AI pursuers
    #[arg(long, default_value = "0")]
    ai_pursuers: usize,

    /// Countdown in seconds when one participant is ready
    #[arg(long, default_value = "3")]
    intermission_single: f64,

    /// Countdown in seconds when several participants are ready
    #[arg(long, default_value = "10")]
    intermission_multi: f64,

    /// Seconds before a dead racer respawns; omit to eliminate on death
    #[arg(long)]
    respawn_delay: Option<f64>,

    /// End races after this many seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// Checkpoints per generated track
    #[arg(long, default_value = "8")]
    checkpoints: usize,

    /// Seed for track generation
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_rate: self.tick_rate,
            intermission_single_player: self.intermission_single,
            intermission_multi_player: self.intermission_multi,
            respawn_delay: self.respawn_delay,
            race_time_limit: self.time_limit,
            checkpoint_count: self.checkpoints.max(1),
            seed: self.seed,
            ..SessionConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let config = args.session_config();

    info!("Starting race server...");
    info!("Tick rate: {}Hz", config.tick_rate);
    info!("Max clients: {}", args.max_clients);
    if args.ai_racers + args.ai_pursuers > 0 {
        info!(
            "AI: {} racers, {} pursuers",
            args.ai_racers, args.ai_pursuers
        );
    }

    let mut server = network::Server::new(&addr, config, args.max_clients).await?;
    server.add_agents(args.ai_racers, args.ai_pursuers).await;

    server.run().await?;

    Ok(())
}
