use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use venue_hours::error::{Error, HoursResult};
use venue_hours::feed::config::Config;
use venue_hours::feed::feed::{Feed, FeedState};
use venue_hours::server::server::Server;

/// Initialize logging with environment-based configuration
fn init_logging() -> HoursResult<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))
}

#[tokio::main]
async fn main() -> HoursResult<()> {
    init_logging()?;

    let config = Config::load()?;
    let state = FeedState::shared();
    let feed = Feed::setup(&config, state.clone())?;
    let server = Server::setup(state);

    tokio::spawn(async move {
        feed.run().await;
    });

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Serving venue status");

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(%err, "could not accept connection");
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let server_clone = server.clone();
        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, server_clone)
                .await
            {
                warn!(%err, "connection error");
            }
        });
    }
}
