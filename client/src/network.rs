use log::{debug, info, warn};
use std::net::SocketAddr;
use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Terminal client for the Yahtzee server.
///
/// Everything the server sends is copied to the output as-is; every input
/// line is forwarded to the server. The session ends when the server closes
/// the connection.
pub struct Client {
    stream: TcpStream,
    server_addr: SocketAddr,
}

impl Client {
    pub async fn connect(server: &str) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to server...");
        let stream = TcpStream::connect(server).await?;
        stream.set_nodelay(true)?;
        let server_addr = stream.peer_addr()?;
        info!("Connected to {}", server_addr);
        Ok(Self {
            stream,
            server_addr,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Runs against the process's stdin and stdout.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let copied = self.pump(io::stdin(), io::stdout()).await?;
        debug!("Received {} bytes from server", copied);
        info!("Server closed the connection");
        Ok(())
    }

    /// Forwards `input` lines to the server and server bytes to `output`
    /// until the server closes. Returns how many bytes the server sent.
    pub async fn pump<I, O>(self, input: I, mut output: O) -> io::Result<u64>
    where
        I: AsyncRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin,
    {
        let (mut from_server, mut to_server) = self.stream.into_split();

        let forward = tokio::spawn(async move {
            let mut lines = BufReader::new(input).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let mut message = line.into_bytes();
                        message.push(b'\n');
                        if let Err(e) = to_server.write_all(&message).await {
                            warn!("Failed to send input: {}", e);
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Input closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
            let _ = to_server.shutdown().await;
        });

        let copied = io::copy(&mut from_server, &mut output).await;
        output.flush().await?;
        forward.abort();
        copied
    }
}
