// ABOUTME: Minimal example demonstrating connection and the hello handshake
// ABOUTME: Connects, prints the negotiated stream once hello_ack arrives, then exits

use std::sync::Arc;

use clap::Parser;
use sendspin::audio::output::CpalOutput;
use sendspin::config::RuntimeConfig;
use sendspin::recent_servers::InMemoryRecentServers;
use sendspin::sync::SharedTimeFilter;
use sendspin::Session;

#[derive(Parser, Debug)]
#[command(name = "basic_client")]
#[command(about = "Test connection to a Sendspin server", long_about = None)]
struct Args {
    /// WebSocket URL of the Sendspin server
    #[arg(short, long, default_value = "ws://localhost:8927/sendspin")]
    server: String,

    /// Client name sent in `hello`
    #[arg(short, long, default_value = "Sendspin-RS Basic Client")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = RuntimeConfig {
        client_id: uuid::Uuid::new_v4().to_string(),
        client_name: args.name,
        ..RuntimeConfig::default()
    };

    let clock = Arc::new(SharedTimeFilter::default());
    let session = Session::new(
        config,
        clock,
        Box::new(CpalOutput::new()),
        Arc::new(InMemoryRecentServers::new()),
    );

    println!("Connecting to {}...", args.server);
    session.connect(&args.server).await?;
    println!("Connected. Stream descriptor: {:?}", session.observable().stream.get());

    Ok(())
}
