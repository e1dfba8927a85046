//! Server network layer: TCP accept loop and per-connection line pumps

use crate::channel::{PlayerChannel, RemoteEnd, INBOUND_CAPACITY};
use crate::config::ServerConfig;
use crate::lobby::Lobby;
use crate::session::serve_player;
use crate::store::SessionStore;
use crate::turn::RandomRoller;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Accepts players and hands each connection to its own task.
pub struct Server {
    listener: TcpListener,
    lobby: Arc<Lobby>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.address()).await?;
        info!(
            "Server listening on {} (quantum={}s)",
            listener.local_addr()?,
            config.quantum.as_secs()
        );

        Ok(Server {
            listener,
            lobby: Arc::new(Lobby::new(SessionStore::new(), config)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn lobby(&self) -> Arc<Lobby> {
        Arc::clone(&self.lobby)
    }

    /// Runs the accept loop forever.
    pub async fn run(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let lobby = Arc::clone(&self.lobby);
                    tokio::spawn(handle_connection(lobby, stream, addr));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Pumps socket lines into a [`PlayerChannel`] and its output back out,
/// while the session runs against the channel.
async fn handle_connection(lobby: Arc<Lobby>, stream: TcpStream, addr: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }
    let (read_half, mut write_half) = stream.into_split();
    let (channel, remote) = PlayerChannel::pair(INBOUND_CAPACITY);
    let RemoteEnd { lines, mut output } = remote;

    let reader = tokio::spawn(async move {
        let mut incoming = BufReader::new(read_half);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match incoming.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    // Bytes that are not UTF-8 become unparseable input, not a hangup.
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(&['\r', '\n'][..])
                        .to_string();
                    if lines.send(line).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Read error from {}: {}", addr, e);
                    break;
                }
            }
        }
    });

    let writer = tokio::spawn(async move {
        while let Some(text) = output.recv().await {
            if let Err(e) = write_half.write_all(text.as_bytes()).await {
                warn!("Write error to {}: {}", addr, e);
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    let player = serve_player(lobby, channel, Box::new(RandomRoller::from_entropy())).await;

    reader.abort();
    if let Err(e) = writer.await {
        error!("Writer task for {} failed: {}", addr, e);
    }
    match player {
        Some(id) => info!("Player {} ({}) disconnected", id + 1, addr),
        None => info!("Connection {} closed without joining", addr),
    }
}
