//! Control connection
//!
//! One per accepted control stream. Reads request frames, executes them
//! against the hub and writes a reply frame for requests that have one.
//!
//! A listener keeps its control stream open for as long as it runs, so the
//! stream closing is the first sign it has exited. Listeners announced on
//! the stream are released from the hub at that point, even if nothing was
//! ever sent to them.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::error::{Error, Result};
use crate::hub::Broadcaster;
use crate::protocol::{decode_request, encode_reply, ControlMessage, RequestFrame};
use crate::registry::ListenerId;

const READ_BUFFER_SIZE: usize = 256;

/// A control stream from one listener process
pub struct Connection {
    id: u64,
    socket: UnixStream,
    hub: Arc<Broadcaster>,
    max_frame_size: usize,
    read_buf: BytesMut,
    /// Listeners announced through `AddListener` on this stream
    announced: Vec<ListenerId>,
}

impl Connection {
    pub fn new(id: u64, socket: UnixStream, hub: Arc<Broadcaster>, max_frame_size: usize) -> Self {
        Self {
            id,
            socket,
            hub,
            max_frame_size,
            read_buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            announced: Vec::new(),
        }
    }

    /// Serve requests until the peer closes the stream, then release the
    /// listeners announced on it.
    ///
    /// An oversize frame ends the connection with an error; the stream
    /// cannot be resynchronized after it.
    pub async fn run(&mut self) -> Result<()> {
        let result = self.serve().await;
        self.release_announced().await;
        result
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            while let Some(frame) = decode_request(&mut self.read_buf, self.max_frame_size)? {
                self.handle_frame(frame).await?;
            }

            let n = self.socket.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if !self.read_buf.is_empty() {
                    tracing::debug!(
                        connection_id = self.id,
                        pending = self.read_buf.len(),
                        "Peer closed mid-frame"
                    );
                }
                return Ok(());
            }
        }
    }

    async fn handle_frame(&mut self, frame: RequestFrame) -> Result<()> {
        tracing::trace!(
            connection_id = self.id,
            msg_id = frame.msg_id,
            len = frame.body.len(),
            "Control request"
        );

        if let Ok(ControlMessage::AddListener { id }) =
            ControlMessage::decode(frame.msg_id, &frame.body)
        {
            if !self.announced.contains(&id) {
                self.announced.push(id);
            }
        }

        // The hub lock may be held by a broadcast for a while
        let hub = Arc::clone(&self.hub);
        let reply = tokio::task::spawn_blocking(move || hub.handle_control(frame.msg_id, &frame.body))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        if let Some(body) = reply {
            self.socket.write_all(&encode_reply(&body)).await?;
        }

        Ok(())
    }

    async fn release_announced(&mut self) {
        if self.announced.is_empty() {
            return;
        }

        let ids = std::mem::take(&mut self.announced);
        let hub = Arc::clone(&self.hub);
        let connection_id = self.id;

        let released = tokio::task::spawn_blocking(move || {
            ids.into_iter()
                .filter_map(|id| hub.release_listener(id))
                .count()
        })
        .await;

        match released {
            Ok(count) => tracing::debug!(
                connection_id = connection_id,
                released = count,
                "Released listeners of closed control stream"
            ),
            Err(e) => tracing::warn!(
                connection_id = connection_id,
                error = %e,
                "Failed to release listeners"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::protocol::constants::*;
    use crate::protocol::{decode_identifier_reply, decode_reply, frame::encode_request};
    use crate::server::HubConfig;
    use crate::transport::MemoryTransport;

    fn connection(max_frame_size: usize) -> (Arc<Broadcaster>, Connection, UnixStream) {
        connection_over(MemoryTransport::new(), max_frame_size)
    }

    fn connection_over(
        transport: MemoryTransport,
        max_frame_size: usize,
    ) -> (Arc<Broadcaster>, Connection, UnixStream) {
        let (hub, _monitor) = Broadcaster::new(&HubConfig::new("spy"), transport);
        let (server_side, client_side) = UnixStream::pair().unwrap();
        let conn = Connection::new(1, server_side, Arc::clone(&hub), max_frame_size);
        (hub, conn, client_side)
    }

    /// Next reply; replies beyond it stay in `buf` for the next call
    async fn read_reply(client: &mut UnixStream, buf: &mut BytesMut) -> Bytes {
        loop {
            if let Some(body) = decode_reply(buf, 64).unwrap() {
                return body;
            }
            assert_ne!(client.read_buf(buf).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_identifier_request_gets_reply() {
        let (_hub, mut conn, mut client) = connection(DEFAULT_MAX_FRAME_SIZE);
        let task = tokio::spawn(async move { conn.run().await });

        let mut replies = BytesMut::new();
        for expected in 1..=2u32 {
            client
                .write_all(&encode_request(MSG_GET_NEXT_LISTENER_IDENTIFIER, &[]))
                .await
                .unwrap();
            let reply = read_reply(&mut client, &mut replies).await;
            assert_eq!(decode_identifier_reply(&reply).unwrap().get(), expected);
        }

        drop(client);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_split_and_batched_frames() {
        let (hub, mut conn, mut client) = connection(DEFAULT_MAX_FRAME_SIZE);
        let task = tokio::spawn(async move { conn.run().await });

        let request = encode_request(MSG_GET_NEXT_LISTENER_IDENTIFIER, &[]);
        client.write_all(&request[..3]).await.unwrap();
        client.flush().await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(&request[3..]).await.unwrap();

        // Malformed request followed by a valid one in the same write
        let mut batch = encode_request(MSG_ADD_LISTENER, &[1, 2]).to_vec();
        batch.extend_from_slice(&request);
        client.write_all(&batch).await.unwrap();

        // Both replies may arrive in a single read
        let mut replies = BytesMut::new();
        let first = read_reply(&mut client, &mut replies).await;
        let second = read_reply(&mut client, &mut replies).await;
        assert_eq!(decode_identifier_reply(&first).unwrap().get(), 1);
        assert_eq!(decode_identifier_reply(&second).unwrap().get(), 2);

        drop(client);
        task.await.unwrap().unwrap();
        assert_eq!(hub.stats().dropped_requests, 1);
    }

    #[tokio::test]
    async fn test_oversize_frame_closes_connection() {
        let (hub, mut conn, mut client) = connection(16);
        let task = tokio::spawn(async move { conn.run().await });

        client
            .write_all(&encode_request(MSG_CONNECT_CHANNEL, &[0u8; 64]))
            .await
            .unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::Protocol(_))));
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_stream_releases_announced_listeners() {
        let transport = MemoryTransport::new();
        let (hub, mut conn, mut client) = connection_over(transport.clone(), DEFAULT_MAX_FRAME_SIZE);
        // Published endpoint that never receives anything
        let _rx = transport.publish("spy-1");
        let _other = transport.publish("spy-2");

        // A listener announced on another stream must survive
        hub.next_listener_identifier();
        hub.next_listener_identifier();
        assert!(hub.add_listener(ListenerId::new(2)));

        let task = tokio::spawn(async move { conn.run().await });

        client
            .write_all(&encode_request(MSG_ADD_LISTENER, &1u32.to_ne_bytes()))
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(1);
        while hub.listener_count() != 2 {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        drop(client);
        task.await.unwrap().unwrap();

        assert_eq!(hub.listener_ids(), vec![ListenerId::new(2)]);
        assert_eq!(hub.stats().listeners_removed, 1);
    }
}
