use bytes::{BufMut, BytesMut};

use crate::{HANDSHAKE_BYTES_LEN, PSTR, SHA1_HASH_LEN};

const PROTOCOL_ID_LEN: u8 = 0x13;
const RESERVED_BYTES_LEN: usize = 8;
const PEER_ID_LEN: usize = 20;

/// BitTorrent handshake
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    /// SHA1 hash of bencoded `info` dict of file
    pub info_hash: [u8; SHA1_HASH_LEN],
    /// Identifier of peer
    pub peer_id: [u8; PEER_ID_LEN],
}

impl Handshake {
    pub fn new(info_hash: [u8; SHA1_HASH_LEN], peer_id: [u8; PEER_ID_LEN]) -> Handshake {
        Handshake { info_hash, peer_id }
    }

    /// Serialise handshake data
    pub fn serialise(&self) -> [u8; HANDSHAKE_BYTES_LEN] {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_BYTES_LEN);
        buf.put_u8(PROTOCOL_ID_LEN);
        buf.put_slice(PSTR.as_bytes());
        buf.put_bytes(0x00, RESERVED_BYTES_LEN);
        buf.put_slice(&self.info_hash);
        buf.put_slice(&self.peer_id);
        let mut output = [0; HANDSHAKE_BYTES_LEN];
        output.copy_from_slice(&buf);
        output
    }

    /// Deserialise a handshake received from a peer
    ///
    /// The protocol string and reserved bytes are not checked.
    pub fn deserialise(data: &[u8; HANDSHAKE_BYTES_LEN]) -> Handshake {
        let info_hash_start = 1 + PSTR.len() + RESERVED_BYTES_LEN;
        let peer_id_start = info_hash_start + SHA1_HASH_LEN;
        let mut info_hash = [0; SHA1_HASH_LEN];
        info_hash.copy_from_slice(&data[info_hash_start..peer_id_start]);
        let mut peer_id = [0; PEER_ID_LEN];
        peer_id.copy_from_slice(&data[peer_id_start..]);
        Handshake { info_hash, peer_id }
    }
}

/// Convert a configured peer id string into the 20 raw bytes sent on the wire
pub fn peer_id_bytes(peer_id: &str) -> Option<[u8; PEER_ID_LEN]> {
    peer_id.as_bytes().try_into().ok()
}
