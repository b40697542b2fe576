use actix::prelude::*;
use arena::lobby::Lobby;
use arena::{server, AppError, ServerConfig};
use tokio::net::TcpListener;
use tracing::error;

mod telemetry;

#[actix::main]
async fn main() {
    telemetry::init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "[SERVER] fatal");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Environment variables must be set by the runtime environment.
    let config = ServerConfig::from_env()?;
    let lobby = Lobby::new(config.lobby.clone()).start();
    let listener = TcpListener::bind(config.bind_addr()).await?;
    server::serve(listener, config.channel, lobby).await
}
