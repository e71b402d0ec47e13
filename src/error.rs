use thiserror::Error;

/// Errors raised by the bencode codec
#[derive(Debug, Error, PartialEq)]
pub enum BencodeError {
    /// Input could not be parsed; `offset` is where parsing gave up
    #[error("malformed bencode input at byte {offset}")]
    MalformedInput { offset: usize },

    /// A foreign value has no bencode counterpart
    #[error("unsupported type for bencode: {0}")]
    UnsupportedType(String),
}

/// Errors raised while deriving torrent metainfo
#[derive(Debug, Error, PartialEq)]
pub enum MetainfoError {
    #[error("invalid metainfo, key missing or of the wrong type: {0}")]
    MissingField(&'static str),

    #[error("invalid metainfo, value out of range for key: {0}")]
    InvalidField(&'static str),

    #[error("invalid piece table, length {0} is not a multiple of 20")]
    InvalidPieceTable(usize),

    #[error(transparent)]
    Bencode(#[from] BencodeError),
}

/// Errors raised while talking to a peer
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("piece {index} failed integrity check: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        index: u32,
        expected: String,
        actual: String,
    },
}

impl PeerError {
    /// Map a read error, treating a truncated stream as a closed connection
    pub(crate) fn from_read(err: std::io::Error) -> PeerError {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => PeerError::ConnectionClosed,
            _ => PeerError::Io(err),
        }
    }
}

/// Errors raised while querying a tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid tracker url: {0}")]
    Url(#[from] url::ParseError),

    #[error("tracker request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tracker responded with failure: {0}")]
    Failure(String),

    #[error("invalid tracker response, key missing or of the wrong type: {0}")]
    MissingField(&'static str),

    #[error("invalid compact peer list, length {0} is not a multiple of 6")]
    InvalidPeerList(usize),

    #[error(transparent)]
    Bencode(#[from] BencodeError),
}
