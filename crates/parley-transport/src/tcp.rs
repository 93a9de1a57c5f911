//! TCP transport implementation with length-prefixed framing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::{Connection, ConnectionId, FrameCodec, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// A TCP-based [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    codec: FrameCodec,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            codec: FrameCodec::new(),
        })
    }

    /// Sets the largest frame payload accepted from or sent to peers.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.codec = FrameCodec::with_max_frame_len(max_frame_len);
        self
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(stream, addr, self.codec);
        tracing::debug!(
            id = %conn.id(),
            %addr,
            max_frame_len = self.codec.max_frame_len(),
            "accepted TCP connection"
        );
        Ok(conn)
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener.local_addr().map_err(TransportError::AcceptFailed)
    }
}

/// A single framed TCP connection.
///
/// The socket is split so the read loop and the writer never contend for
/// the same lock. The write half sits behind its own mutex, which makes
/// each [`send`](Connection::send) an atomic frame write.
pub struct TcpConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: Mutex<FramedRead<OwnedReadHalf, FrameCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
}

impl TcpConnection {
    /// Opens a client connection to `addr` using the default frame limit.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))?;
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))?;
        Ok(Self::from_stream(stream, peer_addr, FrameCodec::new()))
    }

    fn from_stream(stream: TcpStream, peer_addr: SocketAddr, codec: FrameCodec) -> Self {
        // Chat frames are small; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "failed to set TCP_NODELAY");
        }
        let (read_half, write_half) = stream.into_split();
        Self {
            id: next_connection_id(),
            peer_addr,
            reader: Mutex::new(FramedRead::new(read_half, codec)),
            writer: Mutex::new(FramedWrite::new(write_half, codec)),
        }
    }

    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .send(Bytes::copy_from_slice(data))
            .await
            .map_err(|e| match e {
                TransportError::Io(io) => TransportError::SendFailed(io),
                other => other,
            })
    }

    async fn recv(&self) -> Result<Option<Bytes>, Self::Error> {
        match self.reader.lock().await.next().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(TransportError::Io(io))) => Err(TransportError::ReceiveFailed(io)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        SinkExt::<Bytes>::close(&mut *writer)
            .await
            .map_err(|e| match e {
                TransportError::Io(io) => TransportError::SendFailed(io),
                other => other,
            })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
