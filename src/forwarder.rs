use crate::{
    config::Config,
    error::{ForwardError, Result},
    relay,
};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::{
    io,
    net::{TcpListener, TcpStream},
    time::Duration,
};

/// Accepts connections on a local listener and relays each one to a fixed
/// remote address.
pub struct Forwarder {
    listener: TcpListener,
    remote_address: Arc<str>,
    idle_timeout: Option<Duration>,
}

impl Forwarder {
    pub async fn bind(config: &Config) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|source| ForwardError::Bind {
                addr: config.listen_address.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            remote_address: Arc::from(config.remote_address.as_str()),
            idle_timeout: config.idle_timeout(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    /// Runs the accept loop until `shutdown` resolves. Connections already
    /// being relayed are left running.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("stopped accepting connections for {}", self.remote_address);
                    return;
                },
                res = self.listener.accept() => {
                    match res {
                        Ok((connection, client_addr)) => {
                            let remote_address = Arc::clone(&self.remote_address);
                            let idle_timeout = self.idle_timeout;
                            tokio::spawn(async move {
                                handle_connection(connection, client_addr, &remote_address, idle_timeout)
                                    .await;
                            });
                        }
                        Err(err) => {
                            log::error!("failed to accept connection: {}", err);
                        }
                    }
                }
            }
        }
    }
}

async fn dial(remote_address: &str) -> Result<TcpStream> {
    TcpStream::connect(remote_address)
        .await
        .map_err(|source| ForwardError::Dial {
            addr: remote_address.to_owned(),
            source,
        })
}

async fn handle_connection(
    inbound: TcpStream,
    client_addr: SocketAddr,
    remote_address: &str,
    idle_timeout: Option<Duration>,
) {
    // on failure the inbound connection is dropped here, which closes it
    let outbound = match dial(remote_address).await {
        Ok(stream) => stream,
        Err(err) => {
            log::warn!("client: {}, error: {}", client_addr, err);
            return;
        }
    };

    log::info!("connected {} -> {}", client_addr, remote_address);

    let outcome = relay::run(inbound, outbound, idle_timeout).await;

    if let Err(err) = &outcome.upstream {
        log::warn!(
            "client: {}, error: client -> {}: {}",
            client_addr,
            remote_address,
            err
        );
    }
    if let Err(err) = &outcome.downstream {
        log::warn!(
            "client: {}, error: {} -> client: {}",
            client_addr,
            remote_address,
            err
        );
    }

    log::info!(
        "closed {} -> {} ({} bytes sent, {} bytes received)",
        client_addr,
        remote_address,
        outcome.stats.inbound_to_outbound,
        outcome.stats.outbound_to_inbound,
    );
}
