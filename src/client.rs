use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::PeerError;
use crate::handshake::Handshake;
use crate::message::{Frame, Message, MessageId};
use crate::{HANDSHAKE_BYTES_LEN, SHA1_HASH_LEN};

/// Connected peer
///
/// Owns the underlying stream; dropping the client closes the connection.
pub struct Client<T> {
    socket: T,
    /// Identifier the remote peer sent in its handshake
    remote_peer_id: [u8; 20],
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Exchange handshakes with a peer over an already-open stream
    pub async fn new(
        mut socket: T,
        info_hash: [u8; SHA1_HASH_LEN],
        peer_id: [u8; 20],
    ) -> Result<Client<T>, PeerError> {
        let remote_peer_id = Client::handshake(&mut socket, info_hash, peer_id)
            .await
            .map_err(PeerError::HandshakeFailed)?;
        debug!("Handshake complete, remote peer id {}", hex::encode(remote_peer_id));
        Ok(Client {
            socket,
            remote_peer_id,
        })
    }

    /// Send our handshake and read the peer's, returning its peer id
    ///
    /// The peer's protocol string and info hash are taken as-is.
    async fn handshake(
        socket: &mut T,
        info_hash: [u8; SHA1_HASH_LEN],
        peer_id: [u8; 20],
    ) -> std::io::Result<[u8; 20]> {
        let initial_handshake = Handshake::new(info_hash, peer_id);
        socket.write_all(&initial_handshake.serialise()).await?;
        socket.flush().await?;

        let mut response_handshake = [0; HANDSHAKE_BYTES_LEN];
        socket.read_exact(&mut response_handshake).await?;
        Ok(Handshake::deserialise(&response_handshake).peer_id)
    }

    pub fn remote_peer_id(&self) -> &[u8; 20] {
        &self.remote_peer_id
    }

    /// Write a whole framed message to the peer
    pub async fn send(&mut self, message: &Message) -> Result<(), PeerError> {
        trace!("Sending message: {}", message);
        self.socket.write_all(&message.serialise()).await?;
        self.socket.flush().await?;
        Ok(())
    }

    /// Receive the next message, skipping keep-alives and ids outside the base protocol
    pub async fn receive(&mut self) -> Result<Message, PeerError> {
        loop {
            match Message::deserialise(&mut self.socket).await? {
                Frame::Message(message) => {
                    trace!("Received message: {}", message);
                    return Ok(message);
                }
                Frame::KeepAlive => trace!("Received keep-alive"),
                Frame::Unknown(id) => debug!("Skipping message with unknown id {}", id),
            }
        }
    }

    /// Receive messages until one with the given id arrives, discarding all others
    pub async fn wait_for(&mut self, id: MessageId) -> Result<Message, PeerError> {
        loop {
            let message = self.receive().await?;
            if message.id == id {
                return Ok(message);
            }
            debug!("Waiting for {:?}, discarding {}", id, message);
        }
    }
}
