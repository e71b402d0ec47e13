use crate::error::PeerError;
use crate::message::{Block, BlockRequest};
use crate::SHA1_HASH_LEN;

/// Nominal size of a requested block
pub const DEFAULT_BLOCK_SIZE: u32 = 2u32.pow(14);

/// Downloaded and verified piece
#[derive(Debug, PartialEq)]
pub struct Piece {
    /// Index of piece within file
    pub index: u32,
    /// Piece data
    pub buf: Vec<u8>,
}

/// Split a piece into block requests covering `[0, piece_length)`
///
/// Every block is `block_size` bytes except the last, which is shortened to whatever
/// remains of the piece.
pub fn block_requests(index: u32, piece_length: u32, block_size: u32) -> Vec<BlockRequest> {
    (0..piece_length)
        .step_by(block_size as usize)
        .map(|begin| BlockRequest {
            index,
            begin,
            length: block_size.min(piece_length - begin),
        })
        .collect()
}

/// Buffer a piece is assembled into as its blocks arrive
pub struct PieceBuffer {
    index: u32,
    buf: Vec<u8>,
}

impl PieceBuffer {
    pub fn new(index: u32, piece_length: u32) -> PieceBuffer {
        PieceBuffer {
            index,
            buf: vec![0; piece_length as usize],
        }
    }

    /// Copy a received block into the buffer at its offset
    pub fn insert(&mut self, block: &Block) -> Result<(), PeerError> {
        if block.index != self.index {
            return Err(PeerError::ProtocolViolation(format!(
                "unexpected piece index, expected {}, got {}",
                self.index, block.index
            )));
        }
        let start = block.begin as usize;
        let end = start + block.data.len();
        if end > self.buf.len() {
            return Err(PeerError::ProtocolViolation(format!(
                "block {}..{} overruns piece of length {}",
                start,
                end,
                self.buf.len()
            )));
        }
        self.buf[start..end].copy_from_slice(&block.data);
        Ok(())
    }

    /// Check the SHA1 hash of the assembled piece, handing it out only if it matches
    pub fn verify(self, expected_hash: &[u8; SHA1_HASH_LEN]) -> Result<Piece, PeerError> {
        let hash = sha1_smol::Sha1::from(&self.buf).digest().bytes();
        if hash != *expected_hash {
            return Err(PeerError::IntegrityCheckFailed {
                index: self.index,
                expected: hex::encode(expected_hash),
                actual: hex::encode(hash),
            });
        }
        Ok(Piece {
            index: self.index,
            buf: self.buf,
        })
    }
}
