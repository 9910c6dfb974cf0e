//! Spy listener
//!
//! The listener-process side of the hub protocol.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixDatagram, UnixStream};

use crate::error::{Error, Result};
use crate::protocol::constants::{IDENTIFIER_SIZE, MAX_BROADCAST_SIZE};
use crate::protocol::{
    decode_identifier_reply, decode_reply, encode_message, listener_endpoint_name, ControlMessage,
};
use crate::registry::{Channel, ListenerId};

use super::config::ClientConfig;

/// A listener attached to a hub
///
/// # Example
/// ```no_run
/// use midi_spy_hub::client::{ClientConfig, SpyListener};
///
/// # async fn example() -> midi_spy_hub::error::Result<()> {
/// let mut listener = SpyListener::connect(ClientConfig::new("midi-spy")).await?;
/// listener.connect_channel(0).await?;
///
/// loop {
///     let data = listener.recv().await?;
///     println!("{:02X?}", &data[..]);
/// }
/// # }
/// ```
pub struct SpyListener {
    id: ListenerId,
    control: UnixStream,
    socket: UnixDatagram,
    socket_path: PathBuf,
}

impl SpyListener {
    /// Attach to the hub.
    ///
    /// Requests an identifier, binds the receive endpoint under
    /// `<hub>-<id>` and announces it to the hub.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let mut control = UnixStream::connect(config.control_socket_path()).await?;

        let id = tokio::time::timeout(
            config.request_timeout,
            request_identifier(&mut control),
        )
        .await
        .map_err(|_| Error::Timeout("listener identifier"))??;

        let socket_path = config
            .socket_dir
            .join(listener_endpoint_name(&config.hub_name, id));
        if socket_path.exists() {
            fs::remove_file(&socket_path)?;
        }
        let socket = UnixDatagram::bind(&socket_path)?;

        let mut listener = Self {
            id,
            control,
            socket,
            socket_path,
        };
        listener.send(ControlMessage::AddListener { id }).await?;

        tracing::debug!(listener_id = %id, hub = %config.hub_name, "Attached to hub");
        Ok(listener)
    }

    /// Identifier assigned by the hub
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Path of the bound receive endpoint
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Start receiving broadcasts for `channel`
    pub async fn connect_channel(&mut self, channel: impl Into<Channel>) -> Result<()> {
        let id = self.id;
        self.send(ControlMessage::ConnectChannel {
            id,
            channel: channel.into(),
        })
        .await
    }

    /// Stop receiving broadcasts for `channel`
    pub async fn disconnect_channel(&mut self, channel: impl Into<Channel>) -> Result<()> {
        let id = self.id;
        self.send(ControlMessage::DisconnectChannel {
            id,
            channel: channel.into(),
        })
        .await
    }

    /// Wait for the next broadcast payload
    pub async fn recv(&self) -> Result<Bytes> {
        let mut buf = vec![0u8; MAX_BROADCAST_SIZE];
        let n = self.socket.recv(&mut buf).await?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    /// Wait for the next broadcast payload, up to `timeout`
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Bytes> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| Error::Timeout("broadcast"))?
    }

    async fn send(&mut self, message: ControlMessage) -> Result<()> {
        self.control.write_all(&encode_message(&message)).await?;
        Ok(())
    }
}

impl Drop for SpyListener {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.socket_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove listener socket"
                );
            }
        }
    }
}

async fn request_identifier(control: &mut UnixStream) -> Result<ListenerId> {
    control
        .write_all(&encode_message(&ControlMessage::GetNextIdentifier))
        .await?;

    let mut buf = BytesMut::with_capacity(IDENTIFIER_SIZE * 2);
    loop {
        if let Some(body) = decode_reply(&mut buf, IDENTIFIER_SIZE)? {
            return Ok(decode_identifier_reply(&body)?);
        }

        if control.read_buf(&mut buf).await? == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "hub closed the control connection",
            )));
        }
    }
}
