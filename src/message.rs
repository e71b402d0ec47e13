use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::PeerError;

/// Frames longer than this are rejected instead of buffered
pub const MAX_FRAME_LEN: u32 = 1 << 21;

const LENGTH_PREFIX_LEN: usize = 4;
const ID_LEN: usize = 1;
const REQUEST_PAYLOAD_LEN: usize = 12;
const PIECE_HEADER_LEN: usize = 8;

/// Peer message types, by wire id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    /// Index of a piece the sender has completed and checked the hash of
    Have = 4,
    /// Which pieces (by index) the sender has
    Bitfield = 5,
    /// Request a subset of a piece (a block)
    Request = 6,
    /// Send a subset of a piece (a block)
    Piece = 7,
    /// Cancel a request for a block
    Cancel = 8,
}

impl TryFrom<u8> for MessageId {
    type Error = u8;

    fn try_from(id: u8) -> Result<MessageId, u8> {
        match id {
            0 => Ok(MessageId::Choke),
            1 => Ok(MessageId::Unchoke),
            2 => Ok(MessageId::Interested),
            3 => Ok(MessageId::NotInterested),
            4 => Ok(MessageId::Have),
            5 => Ok(MessageId::Bitfield),
            6 => Ok(MessageId::Request),
            7 => Ok(MessageId::Piece),
            8 => Ok(MessageId::Cancel),
            other => Err(other),
        }
    }
}

/// Peer message: an id and a payload whose layout depends on the id
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub payload: Bytes,
}

/// A single length-prefixed frame read from a peer
#[derive(Debug, PartialEq)]
pub enum Frame {
    /// Zero-length frame
    KeepAlive,
    Message(Message),
    /// Frame with an id outside the base protocol; payload already discarded
    Unknown(u8),
}

impl Message {
    pub fn new(id: MessageId, payload: impl Into<Bytes>) -> Message {
        Message {
            id,
            payload: payload.into(),
        }
    }

    /// Message carrying no payload, e.g. `interested`
    pub fn empty(id: MessageId) -> Message {
        Message::new(id, Bytes::new())
    }

    /// Serialise [`Message`] to raw bytes: length prefix, id, payload
    pub fn serialise(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + ID_LEN + self.payload.len());
        buf.put_u32((ID_LEN + self.payload.len()) as u32);
        buf.put_u8(self.id as u8);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Read exactly one frame from the socket
    pub async fn deserialise<T>(socket: &mut T) -> Result<Frame, PeerError>
    where
        T: AsyncRead + Unpin,
    {
        let len = socket.read_u32().await.map_err(PeerError::from_read)?;
        if len == 0 {
            return Ok(Frame::KeepAlive);
        }
        if len > MAX_FRAME_LEN {
            return Err(PeerError::ProtocolViolation(format!(
                "frame length {} exceeds limit of {}",
                len, MAX_FRAME_LEN
            )));
        }

        let id = socket.read_u8().await.map_err(PeerError::from_read)?;
        let mut payload = vec![0; len as usize - ID_LEN];
        socket
            .read_exact(&mut payload)
            .await
            .map_err(PeerError::from_read)?;

        match MessageId::try_from(id) {
            Ok(id) => Ok(Frame::Message(Message::new(id, payload))),
            Err(id) => Ok(Frame::Unknown(id)),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({} byte payload)", self.id, self.payload.len())
    }
}

/// Request for one block of a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    /// Index of the piece the block belongs to
    pub index: u32,
    /// Byte offset of the block within the piece
    pub begin: u32,
    /// Number of bytes requested
    pub length: u32,
}

impl From<BlockRequest> for Message {
    fn from(request: BlockRequest) -> Message {
        let mut payload = BytesMut::with_capacity(REQUEST_PAYLOAD_LEN);
        payload.put_u32(request.index);
        payload.put_u32(request.begin);
        payload.put_u32(request.length);
        Message::new(MessageId::Request, payload.freeze())
    }
}

/// Block of piece data carried by a `piece` message
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub index: u32,
    pub begin: u32,
    pub data: Bytes,
}

impl TryFrom<&Message> for Block {
    type Error = PeerError;

    fn try_from(message: &Message) -> Result<Block, PeerError> {
        if message.id != MessageId::Piece {
            return Err(PeerError::ProtocolViolation(format!(
                "expected piece message, got {:?}",
                message.id
            )));
        }
        if message.payload.len() < PIECE_HEADER_LEN {
            return Err(PeerError::ProtocolViolation(format!(
                "piece payload of {} bytes is shorter than its header",
                message.payload.len()
            )));
        }
        let mut payload = message.payload.clone();
        let index = payload.get_u32();
        let begin = payload.get_u32();
        Ok(Block {
            index,
            begin,
            data: payload,
        })
    }
}
