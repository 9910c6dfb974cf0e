//! Control server
//!
//! Binds the hub's control socket and spawns a [`Connection`] per accepted
//! stream.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};

use crate::error::Result;
use crate::hub::Broadcaster;
use crate::server::config::HubConfig;
use crate::server::connection::Connection;

/// Local control endpoint of a hub
pub struct ControlServer {
    config: HubConfig,
    hub: Arc<Broadcaster>,
    listener: UnixListener,
    socket_path: PathBuf,
    next_connection_id: AtomicU64,
}

impl ControlServer {
    /// Bind `<socket_dir>/<name>`.
    ///
    /// A leftover socket file from a previous run is replaced. If another
    /// hub is still accepting on it, binding fails with `AddrInUse`.
    pub fn bind(config: HubConfig, hub: Arc<Broadcaster>) -> Result<Self> {
        let socket_path = config.control_socket_path();

        if let Some(parent) = socket_path.parent() {
            fs::create_dir_all(parent)?;
        }
        remove_stale_socket(&socket_path)?;

        let listener = UnixListener::bind(&socket_path)?;
        tracing::info!(
            hub = %hub.name(),
            socket = %socket_path.display(),
            "Control server listening"
        );

        Ok(Self {
            config,
            hub,
            listener,
            socket_path,
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// Path of the bound control socket
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.accept_loop().await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop() => result,
        }
    }

    async fn accept_loop(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, _addr)) => self.handle_connection(socket),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: UnixStream) {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection_id = connection_id, "New control connection");

        let hub = Arc::clone(&self.hub);
        let max_frame_size = self.config.max_frame_size;

        tokio::spawn(async move {
            let mut connection = Connection::new(connection_id, socket, hub, max_frame_size);

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    connection_id = connection_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(connection_id = connection_id, "Control connection closed");
        });
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.socket_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove control socket"
                );
            }
        }
    }
}

/// Remove a socket file nobody is accepting on
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }

    match std::os::unix::net::UnixStream::connect(path) {
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("{} is in use by a running hub", path.display()),
        )),
        Err(_) => {
            tracing::debug!(socket = %path.display(), "Removing stale control socket");
            fs::remove_file(path)
        }
    }
}
