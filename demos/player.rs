// ABOUTME: End-to-end player example: connects, renders synchronized audio, logs live telemetry
// ABOUTME: All decode/jitter/scheduling work happens inside Session; this just wires observers

use std::sync::Arc;

use clap::Parser;
use sendspin::audio::output::CpalOutput;
use sendspin::config::RuntimeConfig;
use sendspin::observable::Observer;
use sendspin::recent_servers::InMemoryRecentServers;
use sendspin::sync::SharedTimeFilter;
use sendspin::Session;

#[derive(Parser, Debug)]
#[command(name = "player")]
#[command(about = "Connect to a Sendspin server and play synchronized audio", long_about = None)]
struct Args {
    /// WebSocket URL of the Sendspin server
    #[arg(short, long, default_value = "ws://localhost:8927/sendspin")]
    server: String,

    /// Client name sent in `hello`
    #[arg(short, long, default_value = "Sendspin-RS Player")]
    name: String,

    /// Signed playout delay in milliseconds (negative catches up, positive delays)
    #[arg(long, default_value_t = -300)]
    playout_offset_ms: i64,
}

struct LoggingObserver {
    label: &'static str,
}

impl<T: std::fmt::Debug> Observer<T> for LoggingObserver {
    fn on_change(&self, value: &T) {
        log::info!("{}: {:?}", self.label, value);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = RuntimeConfig {
        client_id: uuid::Uuid::new_v4().to_string(),
        client_name: args.name,
        playout_offset_ms: args.playout_offset_ms,
        ..RuntimeConfig::default()
    };
    config.validate()?;

    let clock = Arc::new(SharedTimeFilter::default());
    let session = Session::new(
        config,
        clock,
        Box::new(CpalOutput::new()),
        Arc::new(InMemoryRecentServers::new()),
    );

    session
        .observable()
        .connection
        .subscribe(Arc::new(LoggingObserver { label: "connection" }));
    session
        .observable()
        .stream
        .subscribe(Arc::new(LoggingObserver { label: "stream" }));
    session
        .observable()
        .metadata
        .subscribe(Arc::new(LoggingObserver { label: "metadata" }));
    session
        .observable()
        .buffer_stats
        .subscribe(Arc::new(LoggingObserver { label: "buffer_stats" }));

    println!("Connecting to {}...", args.server);
    session.connect(&args.server).await?;
    println!("Connected. Playing until Ctrl+C.");

    tokio::signal::ctrl_c().await?;
    session.disconnect().await;
    Ok(())
}
