pub mod bencode;
pub mod client;
pub mod decode;
pub mod download;
pub mod encode;
pub mod error;
pub mod handshake;
pub mod message;
pub mod metainfo;
pub mod piece;
pub mod tracker;

pub use bencode::BencodeValue;

/// Protocol identifier sent in the handshake
pub const PSTR: &str = "BitTorrent protocol";
/// Default identifier this client announces to trackers and peers
pub const PEER_ID: &str = "-ABC123-abcd12345678";
/// Size of a handshake message in either direction
pub const HANDSHAKE_BYTES_LEN: usize = 68;
/// Length of a SHA1 digest in bytes
pub const SHA1_HASH_LEN: usize = 20;
