//! Unix datagram socket transport
//!
//! A listener publishes its receive endpoint by binding a datagram socket at
//! `<socket_dir>/<hub>-<id>`. The hub opens it by connecting an unbound
//! datagram socket to that path. Sends use a write timeout so a listener
//! whose receive queue is full costs at most the timeout.
//!
//! Invalidation is discovered on send: once the listener's socket is gone
//! the kernel refuses the datagram and the endpoint notifies the hub.
//! Listeners that exit while idle are released by the control server when
//! their control stream closes.

use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;

use super::Transport;
use crate::endpoint::{EndpointKey, InvalidationNotifier, ListenerEndpoint, RemoteEndpoint};
use crate::error::{SendError, TransportError};

/// `set_write_timeout` rejects a zero duration
const MIN_WRITE_TIMEOUT: Duration = Duration::from_millis(1);

/// Transport over Unix datagram sockets in one directory
#[derive(Debug, Clone)]
pub struct UnixTransport {
    socket_dir: PathBuf,
}

impl UnixTransport {
    pub fn new(socket_dir: impl Into<PathBuf>) -> Self {
        Self {
            socket_dir: socket_dir.into(),
        }
    }

    /// Filesystem path of the endpoint published under `name`
    pub fn socket_path(&self, name: &str) -> PathBuf {
        self.socket_dir.join(name)
    }
}

impl Transport for UnixTransport {
    fn open_remote(&self, name: &str) -> Result<ListenerEndpoint, TransportError> {
        let path = self.socket_path(name);

        let socket = UnixDatagram::unbound().map_err(|source| TransportError::Connect {
            path: path.clone(),
            source,
        })?;

        if let Err(source) = socket.connect(&path) {
            return Err(match source.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
                    TransportError::EndpointNotFound(name.to_string())
                }
                _ => TransportError::Connect { path, source },
            });
        }

        tracing::trace!(path = %path.display(), "Opened listener socket");

        Ok(ListenerEndpoint::new(UnixEndpoint {
            key: EndpointKey::allocate(),
            name: name.to_string(),
            socket,
            write_timeout: Mutex::new(None),
            notifier: Mutex::new(None),
        }))
    }
}

#[derive(Debug)]
struct UnixEndpoint {
    key: EndpointKey,
    name: String,
    socket: UnixDatagram,
    /// Last timeout applied to the socket
    write_timeout: Mutex<Option<Duration>>,
    notifier: Mutex<Option<InvalidationNotifier>>,
}

impl UnixEndpoint {
    fn apply_timeout(&self, timeout: Duration) -> io::Result<()> {
        let timeout = timeout.max(MIN_WRITE_TIMEOUT);
        let mut current = self.write_timeout.lock();
        if *current != Some(timeout) {
            self.socket.set_write_timeout(Some(timeout))?;
            *current = Some(timeout);
        }
        Ok(())
    }

    fn invalidate(&self) {
        if let Some(notifier) = self.notifier.lock().take() {
            tracing::debug!(endpoint = %self.name, "Listener socket is gone");
            notifier.notify();
        }
    }
}

impl RemoteEndpoint for UnixEndpoint {
    fn key(&self) -> EndpointKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, data: &[u8], timeout: Duration) -> Result<(), SendError> {
        self.apply_timeout(timeout)?;

        match self.socket.send(data) {
            Ok(_) => Ok(()),
            Err(e) => match e.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Err(SendError::Timeout),
                io::ErrorKind::ConnectionRefused
                | io::ErrorKind::NotFound
                | io::ErrorKind::NotConnected
                | io::ErrorKind::BrokenPipe => {
                    self.invalidate();
                    Err(SendError::Invalidated)
                }
                _ => Err(SendError::Io(e)),
            },
        }
    }

    fn set_invalidation_notifier(&self, notifier: InvalidationNotifier) {
        *self.notifier.lock() = Some(notifier);
    }
}
