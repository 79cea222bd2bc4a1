mod config;
mod error;
mod forwarder;
mod relay;

use clap::Parser;
use config::Config;
use forwarder::Forwarder;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    let forwarder = match Forwarder::bind(&config).await {
        Ok(forwarder) => forwarder,
        Err(err) => {
            log::error!("{}", err);
            process::exit(1);
        }
    };

    match forwarder.local_addr() {
        Ok(addr) => log::info!(
            "forwarding connections from {} to {}",
            addr,
            forwarder.remote_address()
        ),
        Err(_) => log::info!(
            "forwarding connections from {} to {}",
            config.listen_address,
            forwarder.remote_address()
        ),
    }

    forwarder
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => log::info!("received SIGINT, shutting down"),
                Err(err) => {
                    log::warn!("unable to listen for SIGINT: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;
}
