use crate::bencode::BencodeValue;
use crate::error::MetainfoError;
use crate::SHA1_HASH_LEN;

const ANNOUNCE_KEY: &str = "announce";
const INFO_KEY: &str = "info";
const NAME_KEY: &str = "name";
const LENGTH_KEY: &str = "length";
const PIECE_LENGTH_KEY: &str = "piece length";
const PIECES_KEY: &str = "pieces";

/// Metainfo (`.torrent`) file
#[derive(Debug, Clone, PartialEq)]
pub struct Metainfo {
    /// URL of the tracker
    pub announce: String,
    pub info: Info,
    /// SHA1 hash of the bencoded `info` dict
    pub info_hash: [u8; SHA1_HASH_LEN],
}

impl Metainfo {
    /// Decode and derive metainfo from the raw bytes of a `.torrent` file
    pub fn from_bytes(data: &[u8]) -> Result<Metainfo, MetainfoError> {
        let (value, _) = crate::decode::decode(data)?;
        Metainfo::new(&value)
    }

    pub fn new(data: &BencodeValue) -> Result<Metainfo, MetainfoError> {
        if data.as_dict().is_none() {
            return Err(MetainfoError::MissingField(INFO_KEY));
        }
        let announce = data
            .get(ANNOUNCE_KEY)
            .and_then(BencodeValue::as_str)
            .ok_or(MetainfoError::MissingField(ANNOUNCE_KEY))?
            .to_string();
        let info_value = data
            .get(INFO_KEY)
            .filter(|value| value.as_dict().is_some())
            .ok_or(MetainfoError::MissingField(INFO_KEY))?;
        let info = Info::new(info_value)?;

        // Hash the whole dict as decoded, including keys not interpreted here
        let bencoded_info = crate::encode::encode(info_value);
        let info_hash = sha1_smol::Sha1::from(bencoded_info).digest().bytes();

        Ok(Metainfo {
            announce,
            info,
            info_hash,
        })
    }
}

/// Info dict within metainfo file
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    /// Suggested name of the file
    pub name: Option<String>,
    /// Length of the file in bytes
    pub length: u64,
    /// Length of a piece of the file in bytes
    pub piece_length: u32,
    /// Concatenated SHA1 hashes of all pieces
    pub pieces: Vec<u8>,
}

impl Info {
    fn new(data: &BencodeValue) -> Result<Info, MetainfoError> {
        let name = data
            .get(NAME_KEY)
            .and_then(BencodeValue::as_str)
            .map(str::to_string);

        let length = data
            .get(LENGTH_KEY)
            .and_then(BencodeValue::as_integer)
            .ok_or(MetainfoError::MissingField(LENGTH_KEY))?;
        let length = u64::try_from(length).map_err(|_| MetainfoError::InvalidField(LENGTH_KEY))?;

        let piece_length = data
            .get(PIECE_LENGTH_KEY)
            .and_then(BencodeValue::as_integer)
            .ok_or(MetainfoError::MissingField(PIECE_LENGTH_KEY))?;
        let piece_length = u32::try_from(piece_length)
            .ok()
            .filter(|len| *len > 0)
            .ok_or(MetainfoError::InvalidField(PIECE_LENGTH_KEY))?;

        let pieces = data
            .get(PIECES_KEY)
            .and_then(BencodeValue::as_bytes)
            .ok_or(MetainfoError::MissingField(PIECES_KEY))?;
        if pieces.len() % SHA1_HASH_LEN != 0 {
            return Err(MetainfoError::InvalidPieceTable(pieces.len()));
        }

        Ok(Info {
            name,
            length,
            piece_length,
            pieces: pieces.to_vec(),
        })
    }

    /// Iterate over the SHA1 hash of each piece, in piece order
    pub fn pieces(&self) -> impl Iterator<Item = &[u8]> {
        self.pieces.chunks_exact(SHA1_HASH_LEN)
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len() / SHA1_HASH_LEN
    }

    /// Expected SHA1 hash of the piece with the given index
    pub fn piece_hash(&self, index: u32) -> Option<[u8; SHA1_HASH_LEN]> {
        let index = usize::try_from(index).ok()?;
        self.pieces().nth(index)?.try_into().ok()
    }

    /// Size in bytes of the piece with the given index; the last piece may be short
    pub fn piece_size(&self, index: u32) -> Option<u32> {
        if usize::try_from(index).ok()? >= self.piece_count() {
            return None;
        }
        let start = u64::from(index) * u64::from(self.piece_length);
        let remaining = self.length.checked_sub(start).filter(|len| *len > 0)?;
        Some(remaining.min(u64::from(self.piece_length)) as u32)
    }
}
