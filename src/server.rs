//! TCP Server
//!
//! Binds the listening socket and runs the accept loop, spawning one
//! [`ConnectionHandler`](crate::connection::ConnectionHandler) task per
//! accepted client. Connection tasks share only the storage engine.
//!
//! Transient accept failures (a client resetting before we accept it, an
//! interrupted syscall) are logged and the loop continues. Any other accept
//! error ends [`Server::run`] with an error.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::StorageEngine;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Settings for a server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `127.0.0.1:7070`
    pub bind_address: String,
    /// Lifetime of every stored entry; also the sweep interval
    pub ttl: Duration,
    /// Upper bound on concurrently served connections (`None` = unbounded)
    pub max_connections: Option<usize>,
    /// Close connections that send nothing for this long (`None` = never)
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("{}:{}", crate::DEFAULT_HOST, crate::DEFAULT_PORT),
            ttl: crate::DEFAULT_TTL,
            max_connections: None,
            idle_timeout: None,
        }
    }
}

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// A bound, not yet running, cache server.
pub struct Server {
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    limit: Option<Arc<Semaphore>>,
    idle_timeout: Option<Duration>,
}

impl Server {
    /// Binds the listening socket.
    ///
    /// The storage engine is injected so callers own its lifetime and can
    /// run the expiry sweeper against the same instance.
    pub async fn bind(
        config: &ServerConfig,
        storage: Arc<StorageEngine>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_address)
            .await
            .map_err(|source| ServerError::Bind {
                address: config.bind_address.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            storage,
            stats: Arc::new(ConnectionStats::new()),
            limit: config.max_connections.map(|n| Arc::new(Semaphore::new(n))),
            idle_timeout: config.idle_timeout,
        })
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Runs the accept loop until a fatal accept error.
    pub async fn run(self) -> Result<(), ServerError> {
        if let Ok(addr) = self.local_addr() {
            info!("Listening on {}", addr);
        }

        loop {
            // Wait for a free slot before accepting, so excess clients queue
            // in the kernel backlog instead of holding a task.
            let permit = match &self.limit {
                Some(limit) => match Arc::clone(limit).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return Ok(()),
                },
                None => None,
            };

            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let handler = CommandHandler::new(Arc::clone(&self.storage));
                    let stats = Arc::clone(&self.stats);
                    let idle_timeout = self.idle_timeout;

                    tokio::spawn(async move {
                        handle_connection(stream, addr, handler, stats, idle_timeout).await;
                        drop(permit);
                    });
                }
                Err(e) if is_transient(&e) => {
                    warn!(error = %e, "Transient accept error, continuing");
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    return Err(ServerError::Accept(e));
                }
            }
        }
    }

    /// Runs the accept loop until `shutdown` completes or a fatal error.
    ///
    /// Connections already being served keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                debug!("Shutdown signal received, accept loop stopped");
                Ok(())
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn start_server(
        config: ServerConfig,
    ) -> (SocketAddr, Arc<StorageEngine>, oneshot::Sender<()>) {
        let storage = Arc::new(StorageEngine::new(config.ttl));
        let server = Server::bind(&config, Arc::clone(&storage)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        (addr, storage, tx)
    }

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..Default::default()
        }
    }

    async fn send(reader: &mut BufReader<TcpStream>, line: &str) -> String {
        reader.get_mut().write_all(line.as_bytes()).await.unwrap();
        let mut response = String::new();
        reader.read_line(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_protocol_scenario_over_tcp() {
        let (addr, _, _shutdown) = start_server(local_config()).await;
        let mut conn = BufReader::new(TcpStream::connect(addr).await.unwrap());

        assert_eq!(send(&mut conn, "1 SET a hello\n").await, "1 OK\n");
        assert_eq!(send(&mut conn, "2 GET a\n").await, "2 OK hello\n");
        assert_eq!(send(&mut conn, "3 GET missing\n").await, "3 ERROR NOT FOUND\n");
        assert_eq!(send(&mut conn, "4 DEL a\n").await, "4 OK\n");
        assert_eq!(send(&mut conn, "5 FOO a\n").await, "5 ERROR UNKNOWN COMMAND\n");
        assert_eq!(send(&mut conn, "oops\n").await, "ERROR\n");
    }

    #[tokio::test]
    async fn test_connections_share_storage() {
        let (addr, storage, _shutdown) = start_server(local_config()).await;

        let mut first = BufReader::new(TcpStream::connect(addr).await.unwrap());
        let mut second = BufReader::new(TcpStream::connect(addr).await.unwrap());

        assert_eq!(send(&mut first, "1 SET shared from-first\n").await, "1 OK\n");
        assert_eq!(
            send(&mut second, "1 GET shared\n").await,
            "1 OK from-first\n"
        );
        assert_eq!(storage.get("shared"), Some("from-first".to_string()));
    }

    #[tokio::test]
    async fn test_broken_client_does_not_affect_others() {
        let (addr, _, _shutdown) = start_server(local_config()).await;

        let mut healthy = BufReader::new(TcpStream::connect(addr).await.unwrap());
        {
            let mut broken = TcpStream::connect(addr).await.unwrap();
            broken.write_all(b"1 SET half-writ").await.unwrap();
        }

        assert_eq!(send(&mut healthy, "1 SET k v\n").await, "1 OK\n");
        assert_eq!(send(&mut healthy, "2 GET k\n").await, "2 OK v\n");
    }

    #[tokio::test]
    async fn test_max_connections() {
        let config = ServerConfig {
            max_connections: Some(1),
            ..local_config()
        };
        let (addr, _, _shutdown) = start_server(config).await;

        let mut first = BufReader::new(TcpStream::connect(addr).await.unwrap());
        assert_eq!(send(&mut first, "1 SET k v\n").await, "1 OK\n");

        // Connects at TCP level (backlog) but is not served yet
        let mut second = BufReader::new(TcpStream::connect(addr).await.unwrap());
        second.get_mut().write_all(b"1 GET k\n").await.unwrap();
        let mut line = String::new();
        let waited =
            tokio::time::timeout(Duration::from_millis(100), second.read_line(&mut line)).await;
        assert!(waited.is_err());

        // Freeing the slot lets the queued client through
        drop(first);
        tokio::time::timeout(Duration::from_secs(2), second.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line, "1 OK v\n");
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let storage = Arc::new(StorageEngine::default());
        let server = Server::bind(&local_config(), storage).await.unwrap();
        let stats = server.stats();
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_bind_error() {
        let storage = Arc::new(StorageEngine::default());
        let first = Server::bind(&local_config(), Arc::clone(&storage)).await.unwrap();
        let taken = ServerConfig {
            bind_address: first.local_addr().unwrap().to_string(),
            ..Default::default()
        };

        let result = Server::bind(&taken, storage).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
